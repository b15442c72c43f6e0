//! Máquina de estados del trip
//!
//! SCHEDULED -> ASSIGNED -> ONGOING -> COMPLETED, con CANCELLED accesible
//! desde SCHEDULED o ASSIGNED y la vuelta ASSIGNED -> SCHEDULED vía
//! desasignación. Las acciones de conductor (accept/start/complete) solo
//! puede ejecutarlas el conductor asignado al trip. Un incidente no
//! cambia el estado por sí mismo; su resolución con reemplazo reabre el
//! despacho del trip.

use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::assignment::Assignment;
use crate::models::caller::CallerContext;
use crate::models::incident::{Incident, IncidentSeverity, ResolutionAction};
use crate::models::trip::{Trip, TripStatus};
use crate::repositories::assignment_repository::AssignmentRepository;
use crate::repositories::incident_repository::IncidentRepository;
use crate::repositories::trip_repository::TripRepository;
use crate::services::notification_service::DispatchNotifier;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation::require_not_empty;

/// Tabla de transiciones válidas. Función pura; el resto del servicio
/// solo añade autorización y persistencia.
pub fn ensure_transition(from: TripStatus, to: TripStatus) -> AppResult<()> {
    use TripStatus::*;

    let allowed = matches!(
        (from, to),
        (Scheduled, Assigned)
            | (Assigned, Ongoing)
            | (Ongoing, Completed)
            | (Assigned, Scheduled)
            | (Scheduled, Cancelled)
            | (Assigned, Cancelled)
    );

    if allowed {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "transition {} -> {} is not allowed",
            from.as_str(),
            to.as_str()
        )))
    }
}

pub struct TripLifecycleService {
    trips: TripRepository,
    assignments: AssignmentRepository,
    incidents: IncidentRepository,
    notifier: Arc<dyn DispatchNotifier>,
}

impl TripLifecycleService {
    pub fn new(pool: PgPool, notifier: Arc<dyn DispatchNotifier>) -> Self {
        Self {
            trips: TripRepository::new(pool.clone()),
            assignments: AssignmentRepository::new(pool.clone()),
            incidents: IncidentRepository::new(pool),
            notifier,
        }
    }

    /// El conductor asignado confirma que tomará el trip. No cambia el
    /// estado del trip (sigue ASSIGNED); deja constancia en el registro
    /// de asignación. Idempotente.
    pub async fn driver_accept(&self, ctx: &CallerContext, trip_id: Uuid) -> AppResult<()> {
        let (trip, assignment) = self.load_for_driver_action(ctx, trip_id).await?;

        if trip.status != TripStatus::Assigned {
            return Err(AppError::InvalidTransition(format!(
                "trip {} is in {} status, only ASSIGNED trips can be accepted",
                trip.id,
                trip.status.as_str()
            )));
        }

        self.assignments.mark_accepted(assignment.id, Utc::now()).await?;
        tracing::info!("🤝 Driver {} aceptó el trip {}", assignment.driver_id, trip_id);
        Ok(())
    }

    /// ASSIGNED -> ONGOING, iniciado por el conductor asignado.
    pub async fn start_trip(&self, ctx: &CallerContext, trip_id: Uuid) -> AppResult<()> {
        let (trip, assignment) = self.load_for_driver_action(ctx, trip_id).await?;
        ensure_transition(trip.status, TripStatus::Ongoing)?;

        self.assignments.mark_started(&trip, &assignment).await?;
        tracing::info!("🚐 Trip {} iniciado por driver {}", trip_id, assignment.driver_id);
        Ok(())
    }

    /// ONGOING -> COMPLETED, iniciado por el conductor asignado. Libera
    /// los recursos que no tengan otra asignación activa.
    pub async fn complete_trip(&self, ctx: &CallerContext, trip_id: Uuid) -> AppResult<()> {
        let (trip, assignment) = self.load_for_driver_action(ctx, trip_id).await?;
        ensure_transition(trip.status, TripStatus::Completed)?;

        self.assignments.mark_completed(&trip, &assignment).await?;
        tracing::info!("🏁 Trip {} completado por driver {}", trip_id, assignment.driver_id);
        Ok(())
    }

    /// Cancelación por personal de operaciones; solo desde SCHEDULED o
    /// ASSIGNED. Estado terminal.
    pub async fn cancel_trip(
        &self,
        ctx: &CallerContext,
        trip_id: Uuid,
        reason: &str,
    ) -> AppResult<()> {
        ctx.ensure_dispatcher()?;
        require_not_empty(reason, "reason")?;

        let trip = self.trips.get_by_id(trip_id).await?;
        ensure_transition(trip.status, TripStatus::Cancelled)?;

        self.assignments.cancel_trip(&trip, reason).await?;
        tracing::info!("🚫 Trip {} cancelado: {}", trip_id, reason);
        Ok(())
    }

    /// Reporte de incidente en ruta. Solo el conductor asignado al trip
    /// puede reportar; el estado del trip no cambia aquí.
    pub async fn report_incident(
        &self,
        ctx: &CallerContext,
        trip_id: Uuid,
        driver_id: Uuid,
        description: String,
        severity: IncidentSeverity,
    ) -> AppResult<Incident> {
        let caller_driver = ctx.ensure_driver()?;
        if caller_driver != driver_id {
            return Err(AppError::Unauthorized(
                "cannot report an incident on behalf of another driver".to_string(),
            ));
        }
        require_not_empty(&description, "description")?;

        let trip = self.trips.get_by_id(trip_id).await?;
        let assignment = self
            .assignments
            .find_active_by_trip(trip.id)
            .await?
            .ok_or_else(|| {
                AppError::InvalidTransition(format!("trip {} has no active assignment", trip.id))
            })?;
        if assignment.driver_id != driver_id {
            return Err(AppError::NotAssignedDriver(format!(
                "driver {} is not assigned to trip {}",
                driver_id, trip.id
            )));
        }

        let incident = self
            .incidents
            .create(trip.id, driver_id, description, severity)
            .await?;

        tracing::warn!(
            "⚠️ Incidente {:?} reportado en trip {} por driver {}",
            severity,
            trip.id,
            driver_id
        );
        self.notifier
            .incident_reported(trip.id, driver_id, severity)
            .await;

        Ok(incident)
    }

    /// Resolver un incidente. ReplacementDispatched devuelve el trip a
    /// SCHEDULED (retirando la asignación) para que el motor de
    /// asignación pueda correr un ciclo nuevo; TripCancelled cancela el
    /// trip; NoAction solo registra la resolución.
    pub async fn resolve_incident(
        &self,
        ctx: &CallerContext,
        incident_id: Uuid,
        action: ResolutionAction,
        note: Option<String>,
    ) -> AppResult<Incident> {
        ctx.ensure_dispatcher()?;

        let incident = self.incidents.get_by_id(incident_id).await?;
        if incident.resolved {
            return Err(AppError::InvalidTransition(format!(
                "incident {} is already resolved",
                incident.id
            )));
        }

        let trip = self.trips.get_by_id(incident.trip_id).await?;

        match action {
            ResolutionAction::ReplacementDispatched => {
                if !trip.status.occupies_resources() {
                    return Err(AppError::InvalidTransition(format!(
                        "trip {} is in {} status, nothing to replace",
                        trip.id,
                        trip.status.as_str()
                    )));
                }
                let retired = self
                    .assignments
                    .reopen_trip(&trip, "incident replacement")
                    .await?;
                tracing::info!(
                    "🔁 Trip {} reabierto para re-despacho ({} asignaciones retiradas)",
                    trip.id,
                    retired.len()
                );
                self.notifier
                    .trip_unassigned(trip.id, "incident replacement")
                    .await;
            }
            ResolutionAction::TripCancelled => {
                if !trip.status.is_terminal() {
                    // Desde ONGOING también se permite: el incidente es
                    // justamente lo que interrumpe el trip en curso
                    if trip.status == TripStatus::Ongoing {
                        self.assignments
                            .reopen_trip(&trip, "incident: trip cancelled")
                            .await?;
                        let reopened = self.trips.get_by_id(trip.id).await?;
                        self.assignments
                            .cancel_trip(&reopened, "incident: trip cancelled")
                            .await?;
                    } else {
                        self.assignments
                            .cancel_trip(&trip, "incident: trip cancelled")
                            .await?;
                    }
                }
            }
            ResolutionAction::NoAction => {}
        }

        self.incidents
            .resolve(incident_id, action, note, Utc::now())
            .await
    }

    /// Cargar trip + asignación activa y verificar que el llamante es el
    /// conductor asignado. El chequeo de actor va antes que el de estado
    /// en la autorización pero después de confirmar que existe una
    /// asignación que comparar.
    async fn load_for_driver_action(
        &self,
        ctx: &CallerContext,
        trip_id: Uuid,
    ) -> AppResult<(Trip, Assignment)> {
        let caller_driver = ctx.ensure_driver()?;
        let trip = self.trips.get_by_id(trip_id).await?;

        let assignment = self
            .assignments
            .find_active_by_trip(trip.id)
            .await?
            .ok_or_else(|| {
                AppError::InvalidTransition(format!(
                    "trip {} has no active assignment",
                    trip.id
                ))
            })?;

        if assignment.driver_id != caller_driver {
            return Err(AppError::NotAssignedDriver(format!(
                "driver {} is not assigned to trip {}",
                caller_driver, trip.id
            )));
        }

        Ok((trip, assignment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use TripStatus::*;
        assert!(ensure_transition(Scheduled, Assigned).is_ok());
        assert!(ensure_transition(Assigned, Ongoing).is_ok());
        assert!(ensure_transition(Ongoing, Completed).is_ok());
    }

    #[test]
    fn unassign_and_cancel_paths() {
        use TripStatus::*;
        assert!(ensure_transition(Assigned, Scheduled).is_ok());
        assert!(ensure_transition(Scheduled, Cancelled).is_ok());
        assert!(ensure_transition(Assigned, Cancelled).is_ok());
    }

    #[test]
    fn terminal_states_admit_nothing() {
        use TripStatus::*;
        for target in [Scheduled, Assigned, Ongoing, Completed, Cancelled] {
            assert!(ensure_transition(Completed, target).is_err());
            assert!(ensure_transition(Cancelled, target).is_err());
        }
    }

    #[test]
    fn no_skipping_states() {
        use TripStatus::*;
        assert!(ensure_transition(Scheduled, Ongoing).is_err());
        assert!(ensure_transition(Scheduled, Completed).is_err());
        assert!(ensure_transition(Assigned, Completed).is_err());
        assert!(ensure_transition(Ongoing, Cancelled).is_err());
        assert!(ensure_transition(Ongoing, Scheduled).is_err());
    }
}
