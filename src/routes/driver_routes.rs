//! Rutas de acciones del conductor

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::driver_trip_controller::DriverTripController;
use crate::dto::dispatch_dto::ApiResponse;
use crate::dto::incident_dto::{IncidentResponse, ReportIncidentRequest};
use crate::middleware::identity::caller_from_headers;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_driver_router() -> Router<AppState> {
    Router::new()
        .route("/trips/:id/accept", post(accept_trip))
        .route("/trips/:id/start", post(start_trip))
        .route("/trips/:id/complete", post(complete_trip))
        .route("/incidents", post(report_incident))
}

async fn accept_trip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DriverTripController::new(&state);
    controller.accept_trip(&ctx, id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Trip aceptado"
    })))
}

async fn start_trip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DriverTripController::new(&state);
    controller.start_trip(&ctx, id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Trip iniciado"
    })))
}

async fn complete_trip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DriverTripController::new(&state);
    controller.complete_trip(&ctx, id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Trip completado"
    })))
}

async fn report_incident(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ReportIncidentRequest>,
) -> Result<Json<ApiResponse<IncidentResponse>>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DriverTripController::new(&state);
    let incident = controller.report_incident(&ctx, request).await?;
    Ok(Json(ApiResponse::success_with_message(
        incident,
        "Incidente registrado".to_string(),
    )))
}
