//! Controller de acciones del conductor
//!
//! Accept/start/complete del trip asignado y reporte de incidentes. La
//! identidad del conductor viene del colaborador de identidad; el chequeo
//! de actor lo hace el servicio, no esta capa.

use uuid::Uuid;
use validator::Validate;

use crate::dto::incident_dto::{IncidentResponse, ReportIncidentRequest};
use crate::models::caller::CallerContext;
use crate::services::trip_lifecycle_service::TripLifecycleService;
use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};

pub struct DriverTripController {
    lifecycle: TripLifecycleService,
}

impl DriverTripController {
    pub fn new(state: &AppState) -> Self {
        Self {
            lifecycle: TripLifecycleService::new(state.pool.clone(), state.notifier.clone()),
        }
    }

    pub async fn accept_trip(&self, ctx: &CallerContext, trip_id: Uuid) -> AppResult<()> {
        self.lifecycle.driver_accept(ctx, trip_id).await
    }

    pub async fn start_trip(&self, ctx: &CallerContext, trip_id: Uuid) -> AppResult<()> {
        self.lifecycle.start_trip(ctx, trip_id).await
    }

    pub async fn complete_trip(&self, ctx: &CallerContext, trip_id: Uuid) -> AppResult<()> {
        self.lifecycle.complete_trip(ctx, trip_id).await
    }

    pub async fn report_incident(
        &self,
        ctx: &CallerContext,
        request: ReportIncidentRequest,
    ) -> AppResult<IncidentResponse> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        let incident = self
            .lifecycle
            .report_incident(
                ctx,
                request.trip_id,
                request.driver_id,
                request.description,
                request.severity,
            )
            .await?;
        Ok(IncidentResponse::from(incident))
    }
}
