//! DTOs del subsistema de despacho
//!
//! Requests y responses de la API de despacho. Los sub-scores de los
//! candidatos se exponen al operador para que la sugerencia sea
//! explicable, no una caja negra.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::booking::BookingStatus;
use crate::models::trip::TripStatus;

// Response genérica
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: Some(data),
        }
    }
}

/// Request para asignar conductor+vehículo a trips de un booking
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignRequest {
    pub booking_id: Uuid,
    #[validate(length(min = 1, message = "trip_ids must not be empty"))]
    pub trip_ids: Vec<Uuid>,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// Request para desasignar un trip
#[derive(Debug, Deserialize, Validate)]
pub struct UnassignRequest {
    #[validate(length(min = 1, max = 500, message = "reason is required"))]
    pub reason: String,
}

/// Request para cancelar un trip
#[derive(Debug, Deserialize, Validate)]
pub struct CancelTripRequest {
    #[validate(length(min = 1, max = 500, message = "reason is required"))]
    pub reason: String,
}

/// Información de un trip tras la asignación
#[derive(Debug, Serialize)]
pub struct AssignedTripInfo {
    pub trip_id: Uuid,
    pub trip_status: TripStatus,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    /// true cuando el trip ya tenía exactamente este emparejamiento y la
    /// operación fue un no-op idempotente.
    pub already_assigned: bool,
}

/// Resultado de una operación de asignación
#[derive(Debug, Serialize)]
pub struct AssignmentOutcome {
    pub booking_id: Uuid,
    pub trips: Vec<AssignedTripInfo>,
}

/// Trip pendiente de despacho (cola del coordinador)
#[derive(Debug, Serialize)]
pub struct PendingTripResponse {
    pub trip_id: Uuid,
    pub booking_id: Uuid,
    pub branch_id: Uuid,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub start_location: String,
    pub end_location: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub booking_status: BookingStatus,
    pub required_seats: i32,
}

/// Resumen del trip para sugerencias y detalle
#[derive(Debug, Serialize)]
pub struct TripSummary {
    pub trip_id: Uuid,
    pub booking_id: Uuid,
    pub branch_id: Uuid,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub start_location: String,
    pub end_location: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub status: TripStatus,
    pub required_category: String,
    pub required_seats: i32,
}

/// Sub-scores normalizados de un candidato conductor (0..1, mayor es mejor)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DriverScoreBreakdown {
    pub priority: f64,
    pub workload: f64,
    pub rating: f64,
}

/// Candidato conductor evaluado para un trip
#[derive(Debug, Serialize)]
pub struct DriverCandidate {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub license_class: String,
    pub rating: Decimal,
    /// Trips asignados en el período circundante (métrica de carga).
    pub workload: i64,
    pub eligible: bool,
    pub reasons: Vec<String>,
    pub scores: DriverScoreBreakdown,
    pub total_score: f64,
}

/// Sub-scores normalizados de un candidato vehículo (0..1, mayor es mejor)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VehicleScoreBreakdown {
    pub capacity_fit: f64,
    pub odometer: f64,
    pub maintenance: f64,
}

/// Candidato vehículo evaluado para un trip
#[derive(Debug, Serialize)]
pub struct VehicleCandidate {
    pub id: Uuid,
    pub license_plate: String,
    pub model: Option<String>,
    pub capacity: i32,
    pub category_name: String,
    pub eligible: bool,
    pub reasons: Vec<String>,
    pub scores: VehicleScoreBreakdown,
    pub total_score: f64,
}

/// Pareja conductor+vehículo sugerida
#[derive(Debug, Serialize)]
pub struct PairSuggestion {
    pub driver_id: Uuid,
    pub driver_name: String,
    pub vehicle_id: Uuid,
    pub vehicle_plate: String,
    pub score: f64,
}

/// Candidatos rankeados para un trip; listas vacías son un resultado
/// válido ("no hay recurso elegible"), no un error.
#[derive(Debug, Serialize)]
pub struct RankedCandidates {
    pub trip: TripSummary,
    pub drivers: Vec<DriverCandidate>,
    pub vehicles: Vec<VehicleCandidate>,
    pub pairs: Vec<PairSuggestion>,
    pub recommended_driver_id: Option<Uuid>,
    pub recommended_vehicle_id: Option<Uuid>,
}

/// Dashboard diario por sucursal
#[derive(Debug, Serialize)]
pub struct DispatchDashboardResponse {
    pub branch_id: Uuid,
    pub pending_count: i64,
    pub assigned_count: i64,
    pub ongoing_count: i64,
    pub completed_count: i64,
    pub cancelled_count: i64,
    pub pending_trips: Vec<PendingTripResponse>,
}

/// Detalle de un trip con su asignación activa
#[derive(Debug, Serialize)]
pub struct TripDetailResponse {
    pub trip: TripSummary,
    pub distance_km: Decimal,
    pub driver_id: Option<Uuid>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub vehicle_id: Option<Uuid>,
    pub vehicle_plate: Option<String>,
    pub vehicle_model: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub open_incidents: Vec<super::incident_dto::IncidentResponse>,
}

/// Consulta de disponibilidad de un recurso
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// RFC3339, inicio de la ventana propuesta.
    pub from: String,
    /// RFC3339, fin de la ventana propuesta (exclusivo).
    pub to: String,
}

/// Respuesta de disponibilidad; en conflicto incluye el trip bloqueante.
#[derive(Debug, Serialize)]
pub struct ResourceAvailabilityResponse {
    pub resource_id: Uuid,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_trip_id: Option<Uuid>,
}

/// Filtros de la cola de pendientes
#[derive(Debug, Deserialize)]
pub struct PendingTripsQuery {
    pub branch_id: Uuid,
    /// RFC3339; por defecto el inicio del día actual.
    pub from: Option<String>,
    /// RFC3339; por defecto from + 7 días.
    pub to: Option<String>,
}

/// Filtros del dashboard
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub branch_id: Uuid,
    /// YYYY-MM-DD; por defecto el día actual.
    pub date: Option<String>,
}
