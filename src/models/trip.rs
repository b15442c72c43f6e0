//! Modelo de Trip
//!
//! Un trip pertenece a exactamente un booking y ocupa una ventana de tiempo
//! semiabierta [start, end). La ventana es inmutable una vez asignado el
//! trip; cambiarla requiere desasignar primero.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::errors::{AppError, AppResult};

/// Estado del trip - mapea al ENUM trip_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "trip_status", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Scheduled,
    Assigned,
    Ongoing,
    Completed,
    Cancelled,
}

impl TripStatus {
    /// COMPLETED y CANCELLED son terminales: ninguna transición sale de ellos.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Estados en los que el trip ocupa a su driver/vehicle.
    pub fn occupies_resources(&self) -> bool {
        matches!(self, TripStatus::Assigned | TripStatus::Ongoing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Scheduled => "SCHEDULED",
            TripStatus::Assigned => "ASSIGNED",
            TripStatus::Ongoing => "ONGOING",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Ventana de tiempo semiabierta [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::ValidationError(format!(
                "time window start ({}) must be before end ({})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Test de solapamiento para ventanas semiabiertas:
    /// `a.start < b.end && a.end > b.start`
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// ¿La ventana cubre el instante dado?
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Trip principal - mapea a la tabla trips
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub branch_id: Uuid,
    pub start_location: String,
    pub end_location: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub distance_km: Decimal,
    pub required_category_id: Uuid,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

impl Trip {
    /// Ventana del trip. Las filas persistidas siempre cumplen start < end
    /// (validado al crear el trip), así que no repetimos la validación aquí.
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.window_start,
            end: self.window_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap()
    }

    #[test]
    fn window_rejects_inverted_bounds() {
        assert!(TimeWindow::new(at(11), at(9)).is_err());
        assert!(TimeWindow::new(at(9), at(9)).is_err());
        assert!(TimeWindow::new(at(9), at(11)).is_ok());
    }

    #[test]
    fn overlap_is_half_open() {
        let morning = TimeWindow::new(at(9), at(11)).unwrap();
        let late = TimeWindow::new(at(10), at(12)).unwrap();
        let adjacent = TimeWindow::new(at(11), at(13)).unwrap();

        assert!(morning.overlaps(&late));
        assert!(late.overlaps(&morning));
        // [9,11) y [11,13) comparten solo el límite: no hay conflicto
        assert!(!morning.overlaps(&adjacent));
        assert!(!adjacent.overlaps(&morning));
    }

    #[test]
    fn covers_excludes_end() {
        let w = TimeWindow::new(at(9), at(11)).unwrap();
        assert!(w.covers(at(9)));
        assert!(w.covers(at(10)));
        assert!(!w.covers(at(11)));
    }

    #[test]
    fn terminal_states() {
        assert!(TripStatus::Completed.is_terminal());
        assert!(TripStatus::Cancelled.is_terminal());
        assert!(!TripStatus::Assigned.is_terminal());
        assert!(TripStatus::Assigned.occupies_resources());
        assert!(TripStatus::Ongoing.occupies_resources());
        assert!(!TripStatus::Scheduled.occupies_resources());
    }
}
