//! Rutas del coordinador de despacho

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::dispatch_controller::DispatchController;
use crate::dto::dispatch_dto::{
    ApiResponse, AssignRequest, AssignmentOutcome, AvailabilityQuery, CancelTripRequest,
    DashboardQuery, DispatchDashboardResponse, PendingTripResponse, PendingTripsQuery,
    RankedCandidates, ResourceAvailabilityResponse, TripDetailResponse, UnassignRequest,
};
use crate::dto::incident_dto::{IncidentResponse, ResolveIncidentRequest};
use crate::middleware::identity::caller_from_headers;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_dispatch_router() -> Router<AppState> {
    Router::new()
        .route("/pending", get(pending_trips))
        .route("/dashboard", get(dashboard))
        .route("/trips/:id", get(trip_detail))
        .route("/trips/:id/suggestions", get(suggestions))
        .route("/availability/drivers/:id", get(driver_availability))
        .route("/availability/vehicles/:id", get(vehicle_availability))
        .route("/assign", post(assign))
        .route("/reassign", post(reassign))
        .route("/trips/:id/unassign", post(unassign))
        .route("/trips/:id/cancel", post(cancel_trip))
        .route("/incidents/:id/resolve", post(resolve_incident))
}

async fn pending_trips(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PendingTripsQuery>,
) -> Result<Json<Vec<PendingTripResponse>>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    let response = controller.pending_trips(&ctx, &query).await?;
    Ok(Json(response))
}

async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DispatchDashboardResponse>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    let response = controller.dashboard(&ctx, &query).await?;
    Ok(Json(response))
}

async fn trip_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<TripDetailResponse>, AppError> {
    caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    let response = controller.trip_detail(id).await?;
    Ok(Json(response))
}

async fn suggestions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<RankedCandidates>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    let response = controller.suggestions(&ctx, id).await?;
    Ok(Json(response))
}

async fn driver_availability(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ResourceAvailabilityResponse>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    let response = controller.driver_availability(&ctx, id, &query).await?;
    Ok(Json(response))
}

async fn vehicle_availability(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ResourceAvailabilityResponse>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    let response = controller.vehicle_availability(&ctx, id, &query).await?;
    Ok(Json(response))
}

async fn assign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AssignRequest>,
) -> Result<Json<ApiResponse<AssignmentOutcome>>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    let outcome = controller.assign(&ctx, request).await?;
    Ok(Json(ApiResponse::success_with_message(
        outcome,
        "Asignación confirmada".to_string(),
    )))
}

async fn reassign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AssignRequest>,
) -> Result<Json<ApiResponse<AssignmentOutcome>>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    let outcome = controller.reassign(&ctx, request).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

async fn unassign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UnassignRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    controller.unassign(&ctx, id, request).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Trip desasignado"
    })))
}

async fn cancel_trip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelTripRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    controller.cancel_trip(&ctx, id, request).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Trip cancelado"
    })))
}

async fn resolve_incident(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveIncidentRequest>,
) -> Result<Json<ApiResponse<IncidentResponse>>, AppError> {
    let ctx = caller_from_headers(&headers)?;
    let controller = DispatchController::new(&state);
    let incident = controller.resolve_incident(&ctx, id, request).await?;
    Ok(Json(ApiResponse::success_with_message(
        incident,
        "Incidente resuelto".to_string(),
    )))
}
