//! Modelo de Assignment
//!
//! Registro de qué conductor y vehículo sirven un trip. Es historial
//! inmutable: desasignar marca el registro con removed_at/removed_reason
//! en lugar de borrarlo, preservando la trazabilidad.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::trip::TimeWindow;

/// Ventana ocupada por un trip activo de un recurso (driver o vehicle).
/// Es la entrada del índice de disponibilidad.
#[derive(Debug, Clone, Copy)]
pub struct BusyWindow {
    pub trip_id: Uuid,
    pub window: TimeWindow,
}

/// Assignment principal - mapea a la tabla trip_assignments
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    /// Rol del conductor en el trip, p. ej. "main".
    pub role: String,
    pub note: Option<String>,
    pub assigned_at: DateTime<Utc>,
    /// Momento en que el conductor aceptó el trip (etapa driver-accepted).
    pub accepted_at: Option<DateTime<Utc>>,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_reason: Option<String>,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.removed_at.is_none()
    }

    /// ¿Este registro ya representa el emparejamiento solicitado?
    /// Base del assign idempotente.
    pub fn matches_pair(&self, driver_id: Uuid, vehicle_id: Uuid) -> bool {
        self.is_active() && self.driver_id == driver_id && self.vehicle_id == vehicle_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(driver_id: Uuid, vehicle_id: Uuid, removed: bool) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            driver_id,
            vehicle_id,
            role: "main".to_string(),
            note: None,
            assigned_at: Utc::now(),
            accepted_at: None,
            removed_at: removed.then(Utc::now),
            removed_reason: removed.then(|| "test".to_string()),
        }
    }

    #[test]
    fn removed_assignment_never_matches() {
        let d = Uuid::new_v4();
        let v = Uuid::new_v4();
        assert!(assignment(d, v, false).matches_pair(d, v));
        assert!(!assignment(d, v, true).matches_pair(d, v));
        assert!(!assignment(d, v, false).matches_pair(v, d));
    }
}
