//! Controller de despacho
//!
//! Orquesta las operaciones del coordinador: cola de pendientes,
//! sugerencias, asignación/desasignación, cancelación, dashboard y
//! resolución de incidentes.

use uuid::Uuid;
use validator::Validate;

use crate::dto::dispatch_dto::{
    AssignRequest, AssignmentOutcome, AvailabilityQuery, CancelTripRequest, DashboardQuery,
    DispatchDashboardResponse, PendingTripResponse, PendingTripsQuery, RankedCandidates,
    ResourceAvailabilityResponse, TripDetailResponse, UnassignRequest,
};
use crate::dto::incident_dto::{IncidentResponse, ResolveIncidentRequest};
use crate::models::caller::CallerContext;
use crate::models::trip::TimeWindow;
use crate::services::availability_service::AvailabilityService;
use crate::services::dashboard_service::DashboardService;
use crate::services::dispatch_service::DispatchService;
use crate::services::ranking_service::RankingService;
use crate::services::trip_lifecycle_service::TripLifecycleService;
use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation::parse_datetime;

pub struct DispatchController {
    dispatch: DispatchService,
    ranking: RankingService,
    dashboard: DashboardService,
    lifecycle: TripLifecycleService,
    availability: AvailabilityService,
}

impl DispatchController {
    pub fn new(state: &AppState) -> Self {
        Self {
            dispatch: DispatchService::new(
                state.pool.clone(),
                state.config.clone(),
                state.notifier.clone(),
            ),
            ranking: RankingService::new(state.pool.clone(), state.config.clone()),
            dashboard: DashboardService::new(state.pool.clone(), state.config.clone()),
            lifecycle: TripLifecycleService::new(state.pool.clone(), state.notifier.clone()),
            availability: AvailabilityService::new(state.pool.clone()),
        }
    }

    pub async fn driver_availability(
        &self,
        ctx: &CallerContext,
        driver_id: Uuid,
        query: &AvailabilityQuery,
    ) -> AppResult<ResourceAvailabilityResponse> {
        ctx.ensure_dispatcher()?;
        let window = TimeWindow::new(parse_datetime(&query.from)?, parse_datetime(&query.to)?)?;
        let result = self
            .availability
            .check_driver(driver_id, &window, None)
            .await?;
        Ok(ResourceAvailabilityResponse {
            resource_id: driver_id,
            available: result.available,
            blocking_trip_id: result.blocking_trip_id,
        })
    }

    pub async fn vehicle_availability(
        &self,
        ctx: &CallerContext,
        vehicle_id: Uuid,
        query: &AvailabilityQuery,
    ) -> AppResult<ResourceAvailabilityResponse> {
        ctx.ensure_dispatcher()?;
        let window = TimeWindow::new(parse_datetime(&query.from)?, parse_datetime(&query.to)?)?;
        let result = self
            .availability
            .check_vehicle(vehicle_id, &window, None)
            .await?;
        Ok(ResourceAvailabilityResponse {
            resource_id: vehicle_id,
            available: result.available,
            blocking_trip_id: result.blocking_trip_id,
        })
    }

    pub async fn pending_trips(
        &self,
        ctx: &CallerContext,
        query: &PendingTripsQuery,
    ) -> AppResult<Vec<PendingTripResponse>> {
        ctx.ensure_dispatcher()?;
        self.dashboard.pending_trips(query).await
    }

    pub async fn suggestions(
        &self,
        ctx: &CallerContext,
        trip_id: Uuid,
    ) -> AppResult<RankedCandidates> {
        ctx.ensure_dispatcher()?;
        self.ranking.suggestions(trip_id).await
    }

    pub async fn assign(
        &self,
        ctx: &CallerContext,
        request: AssignRequest,
    ) -> AppResult<AssignmentOutcome> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        self.dispatch.assign(ctx, &request).await
    }

    pub async fn reassign(
        &self,
        ctx: &CallerContext,
        request: AssignRequest,
    ) -> AppResult<AssignmentOutcome> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        self.dispatch.reassign(ctx, &request).await
    }

    pub async fn unassign(
        &self,
        ctx: &CallerContext,
        trip_id: Uuid,
        request: UnassignRequest,
    ) -> AppResult<()> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        self.dispatch.unassign(ctx, trip_id, &request.reason).await
    }

    pub async fn cancel_trip(
        &self,
        ctx: &CallerContext,
        trip_id: Uuid,
        request: CancelTripRequest,
    ) -> AppResult<()> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        self.lifecycle.cancel_trip(ctx, trip_id, &request.reason).await
    }

    pub async fn dashboard(
        &self,
        ctx: &CallerContext,
        query: &DashboardQuery,
    ) -> AppResult<DispatchDashboardResponse> {
        ctx.ensure_dispatcher()?;
        self.dashboard.dashboard(query).await
    }

    pub async fn trip_detail(&self, trip_id: Uuid) -> AppResult<TripDetailResponse> {
        self.dashboard.trip_detail(trip_id).await
    }

    pub async fn resolve_incident(
        &self,
        ctx: &CallerContext,
        incident_id: Uuid,
        request: ResolveIncidentRequest,
    ) -> AppResult<IncidentResponse> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        let incident = self
            .lifecycle
            .resolve_incident(ctx, incident_id, request.action, request.note)
            .await?;
        Ok(IncidentResponse::from(incident))
    }
}
