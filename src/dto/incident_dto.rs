//! DTOs de incidentes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::incident::{Incident, IncidentSeverity, ResolutionAction};

/// Request para reportar un incidente durante un trip
#[derive(Debug, Deserialize, Validate)]
pub struct ReportIncidentRequest {
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    #[validate(length(min = 3, max = 2000))]
    pub description: String,
    pub severity: IncidentSeverity,
}

/// Request para resolver un incidente
#[derive(Debug, Deserialize, Validate)]
pub struct ResolveIncidentRequest {
    pub action: ResolutionAction,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// Response de incidente para la API
#[derive(Debug, Serialize)]
pub struct IncidentResponse {
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

impl From<Incident> for IncidentResponse {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.id,
            trip_id: incident.trip_id,
            driver_id: incident.driver_id,
            description: incident.description,
            severity: incident.severity,
            reported_at: incident.reported_at,
            resolved: incident.resolved,
            resolution_action: incident.resolution_action,
            resolution_note: incident.resolution_note,
            resolved_at: incident.resolved_at,
        }
    }
}
