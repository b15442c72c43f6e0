//! Modelo de Incident
//!
//! Incidente reportado por un conductor durante un trip. Reportar no
//! cambia el estado del trip; una resolución con vehículo/conductor de
//! reemplazo reabre el ciclo de despacho para ese trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Severidad del incidente - mapea al ENUM incident_severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "incident_severity", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Acción de resolución - mapea al ENUM resolution_action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resolution_action", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionAction {
    NoAction,
    ReplacementDispatched,
    TripCancelled,
}

/// Incident principal - mapea a la tabla trip_incidents
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Incident {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub description: String,
    pub severity: IncidentSeverity,
    pub reported_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolution_action: Option<ResolutionAction>,
    pub resolution_note: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}
