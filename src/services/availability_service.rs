//! Índice de disponibilidad
//!
//! Responde "¿está el recurso X libre durante la ventana [a, b)?" contra
//! las asignaciones existentes. Sin efectos secundarios: se usa igual
//! para el ranking y para la re-validación al confirmar.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::assignment::BusyWindow;
use crate::models::trip::TimeWindow;
use crate::repositories::assignment_repository::AssignmentRepository;
use crate::utils::errors::AppResult;

/// Resultado de la consulta de disponibilidad. En conflicto incluye el
/// trip bloqueante para diagnóstico.
#[derive(Debug, Clone, Copy)]
pub struct ResourceAvailability {
    pub available: bool,
    pub blocking_trip_id: Option<Uuid>,
}

impl ResourceAvailability {
    fn free() -> Self {
        Self {
            available: true,
            blocking_trip_id: None,
        }
    }

    fn blocked(trip_id: Uuid) -> Self {
        Self {
            available: false,
            blocking_trip_id: Some(trip_id),
        }
    }
}

/// Núcleo puro del índice: primer trip que solapa la ventana propuesta.
/// Con varios bloqueantes devuelve el de salida más temprana (ID como
/// desempate) para que el diagnóstico sea determinista.
pub fn find_blocking_trip(busy: &[BusyWindow], proposed: &TimeWindow) -> Option<Uuid> {
    busy.iter()
        .filter(|b| b.window.overlaps(proposed))
        .min_by_key(|b| (b.window.start, b.trip_id))
        .map(|b| b.trip_id)
}

pub struct AvailabilityService {
    assignments: AssignmentRepository,
}

impl AvailabilityService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            assignments: AssignmentRepository::new(pool),
        }
    }

    pub async fn check_driver(
        &self,
        driver_id: Uuid,
        window: &TimeWindow,
        exclude_trip: Option<Uuid>,
    ) -> AppResult<ResourceAvailability> {
        let busy = self
            .assignments
            .busy_windows_for_driver(driver_id, exclude_trip)
            .await?;
        Ok(match find_blocking_trip(&busy, window) {
            Some(trip_id) => ResourceAvailability::blocked(trip_id),
            None => ResourceAvailability::free(),
        })
    }

    pub async fn check_vehicle(
        &self,
        vehicle_id: Uuid,
        window: &TimeWindow,
        exclude_trip: Option<Uuid>,
    ) -> AppResult<ResourceAvailability> {
        let busy = self
            .assignments
            .busy_windows_for_vehicle(vehicle_id, exclude_trip)
            .await?;
        Ok(match find_blocking_trip(&busy, window) {
            Some(trip_id) => ResourceAvailability::blocked(trip_id),
            None => ResourceAvailability::free(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap()
    }

    fn busy(trip_id: Uuid, start: u32, end: u32) -> BusyWindow {
        BusyWindow {
            trip_id,
            window: TimeWindow {
                start: at(start),
                end: at(end),
            },
        }
    }

    #[test]
    fn detects_overlap() {
        let blocking = Uuid::new_v4();
        let windows = vec![busy(blocking, 9, 11)];
        let proposed = TimeWindow {
            start: at(10),
            end: at(12),
        };
        assert_eq!(find_blocking_trip(&windows, &proposed), Some(blocking));
    }

    #[test]
    fn adjacent_windows_do_not_conflict() {
        let windows = vec![busy(Uuid::new_v4(), 9, 11)];
        let proposed = TimeWindow {
            start: at(11),
            end: at(13),
        };
        assert_eq!(find_blocking_trip(&windows, &proposed), None);
    }

    #[test]
    fn earliest_blocker_wins() {
        let early = Uuid::new_v4();
        let late = Uuid::new_v4();
        // Orden de entrada invertido a propósito
        let windows = vec![busy(late, 12, 14), busy(early, 9, 11)];
        let proposed = TimeWindow {
            start: at(10),
            end: at(13),
        };
        assert_eq!(find_blocking_trip(&windows, &proposed), Some(early));
    }

    #[test]
    fn empty_index_is_always_free() {
        let proposed = TimeWindow {
            start: at(9),
            end: at(11),
        };
        assert_eq!(find_blocking_trip(&[], &proposed), None);
    }
}
