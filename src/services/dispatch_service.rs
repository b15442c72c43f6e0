//! Motor de asignación
//!
//! Valida y confirma un emparejamiento conductor+vehículo sobre uno o más
//! trips de un booking. La validación es una función pura sobre un
//! snapshot cargado explícitamente; la confirmación re-valida dentro de
//! una transacción para cerrar la ventana de carrera entre sugerencia y
//! commit. Re-enviar un emparejamiento ya vigente es un no-op exitoso.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::environment::EnvironmentConfig;
use crate::dto::dispatch_dto::{AssignRequest, AssignedTripInfo, AssignmentOutcome};
use crate::models::assignment::{Assignment, BusyWindow};
use crate::models::booking::{Booking, BookingStatus};
use crate::models::caller::CallerContext;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::trip::{Trip, TripStatus};
use crate::models::vehicle::{Vehicle, VehicleCategory, VehicleStatus};
use crate::repositories::assignment_repository::{
    AssignmentCommit, AssignmentRepository, CommitFailure,
};
use crate::repositories::booking_repository::BookingRepository;
use crate::repositories::driver_repository::DriverRepository;
use crate::repositories::trip_repository::TripRepository;
use crate::repositories::vehicle_repository::VehicleRepository;
use crate::services::availability_service::find_blocking_trip;
use crate::services::notification_service::DispatchNotifier;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation::{require_not_empty, require_not_empty_list};

/// Valores de política que condicionan la asignación.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub min_deposit_ratio: Decimal,
    pub allow_cross_branch: bool,
}

/// Snapshot cargado deliberadamente para validar una asignación. Sin
/// grafos perezosos: todo lo que la validación necesita está aquí.
pub struct AssignmentSnapshot {
    pub booking: Booking,
    /// Trips solicitados, en orden de request y sin duplicados.
    pub trips: Vec<Trip>,
    pub driver: Driver,
    pub vehicle: Vehicle,
    pub vehicle_category: VehicleCategory,
    pub driver_busy: Vec<BusyWindow>,
    pub vehicle_busy: Vec<BusyWindow>,
    pub active_assignments: HashMap<Uuid, Assignment>,
}

/// Resultado de la validación: qué trips se confirman y cuáles ya tenían
/// exactamente este emparejamiento (no-op idempotente).
#[derive(Debug)]
pub struct AssignmentPlan {
    pub to_assign: Vec<Uuid>,
    pub already_current: Vec<Uuid>,
}

/// Validación completa de la asignación. Función pura: el mismo snapshot
/// produce siempre el mismo veredicto.
pub fn validate_assignment(
    snapshot: &AssignmentSnapshot,
    policy: &DispatchPolicy,
) -> AppResult<AssignmentPlan> {
    if snapshot.trips.is_empty() {
        return Err(AppError::ValidationError(
            "trip_ids must not be empty".to_string(),
        ));
    }

    let booking = &snapshot.booking;
    if !booking.dispatch_eligible(policy.min_deposit_ratio) {
        let detail = if !matches!(
            booking.status,
            BookingStatus::Confirmed | BookingStatus::InProgress
        ) {
            format!(
                "booking {} is not confirmed (status {:?})",
                booking.id, booking.status
            )
        } else {
            format!(
                "booking {} deposit ratio {} is below the required {}",
                booking.id,
                booking.deposit_ratio().round_dp(2),
                policy.min_deposit_ratio
            )
        };
        return Err(AppError::TripNotDispatchable(detail));
    }

    let driver = &snapshot.driver;
    if matches!(driver.status, DriverStatus::Inactive | DriverStatus::DayOff) {
        return Err(AppError::ValidationError(format!(
            "driver {} cannot be dispatched (status {:?})",
            driver.id, driver.status
        )));
    }

    let vehicle = &snapshot.vehicle;
    if matches!(
        vehicle.status,
        VehicleStatus::Maintenance | VehicleStatus::Inactive
    ) {
        return Err(AppError::ValidationError(format!(
            "vehicle {} cannot be dispatched (status {:?})",
            vehicle.id, vehicle.status
        )));
    }

    let mut plan = AssignmentPlan {
        to_assign: Vec::new(),
        already_current: Vec::new(),
    };
    let mut planned_windows: Vec<(Uuid, crate::models::trip::TimeWindow)> = Vec::new();

    for trip in &snapshot.trips {
        if trip.booking_id != booking.id {
            return Err(AppError::ValidationError(format!(
                "trip {} does not belong to booking {}",
                trip.id, booking.id
            )));
        }

        // Idempotencia: si el emparejamiento vigente ya es exactamente
        // este, el trip no se toca
        if let Some(active) = snapshot.active_assignments.get(&trip.id) {
            if active.matches_pair(driver.id, vehicle.id) {
                plan.already_current.push(trip.id);
                continue;
            }
        }

        if trip.status != TripStatus::Scheduled {
            return Err(AppError::TripNotDispatchable(format!(
                "trip {} is in {} status; unassign it first",
                trip.id,
                trip.status.as_str()
            )));
        }

        if vehicle.category_id != trip.required_category_id {
            return Err(AppError::CategoryMismatch(format!(
                "vehicle {} is not of the category required by trip {}",
                vehicle.license_plate, trip.id
            )));
        }

        if !driver.can_drive_seats(snapshot.vehicle_category.seats) {
            return Err(AppError::LicenseIncompatible(format!(
                "license class {} does not cover a {}-seat vehicle",
                driver.license_class, snapshot.vehicle_category.seats
            )));
        }
        if !driver.license_valid_on(trip.window_start.date_naive()) {
            return Err(AppError::LicenseIncompatible(format!(
                "driver {} license expired on {}",
                driver.id, driver.license_expiry
            )));
        }

        if driver.branch_id != trip.branch_id && !driver.cross_branch && !policy.allow_cross_branch
        {
            return Err(AppError::ValidationError(format!(
                "driver {} belongs to another branch and cross-branch dispatch is not allowed",
                driver.id
            )));
        }
        if vehicle.branch_id != trip.branch_id
            && !vehicle.cross_branch
            && !policy.allow_cross_branch
        {
            return Err(AppError::ValidationError(format!(
                "vehicle {} belongs to another branch and cross-branch dispatch is not allowed",
                vehicle.id
            )));
        }

        let window = trip.window();
        if let Some(blocking) = find_blocking_trip(&snapshot.driver_busy, &window) {
            return Err(AppError::ResourceConflict {
                resource: format!("driver {}", driver.id),
                blocking_trip_id: blocking,
            });
        }
        if let Some(blocking) = find_blocking_trip(&snapshot.vehicle_busy, &window) {
            return Err(AppError::ResourceConflict {
                resource: format!("vehicle {}", vehicle.id),
                blocking_trip_id: blocking,
            });
        }

        // Los trips del propio lote también compiten entre sí por el
        // mismo conductor y vehículo
        if let Some((other_id, _)) = planned_windows
            .iter()
            .find(|(_, other)| other.overlaps(&window))
        {
            return Err(AppError::ResourceConflict {
                resource: format!("driver {}", driver.id),
                blocking_trip_id: *other_id,
            });
        }

        planned_windows.push((trip.id, window));
        plan.to_assign.push(trip.id);
    }

    Ok(plan)
}

pub struct DispatchService {
    bookings: BookingRepository,
    trips: TripRepository,
    drivers: DriverRepository,
    vehicles: VehicleRepository,
    assignments: AssignmentRepository,
    config: EnvironmentConfig,
    notifier: Arc<dyn DispatchNotifier>,
}

impl DispatchService {
    pub fn new(
        pool: PgPool,
        config: EnvironmentConfig,
        notifier: Arc<dyn DispatchNotifier>,
    ) -> Self {
        Self {
            bookings: BookingRepository::new(pool.clone()),
            trips: TripRepository::new(pool.clone()),
            drivers: DriverRepository::new(pool.clone()),
            vehicles: VehicleRepository::new(pool.clone()),
            assignments: AssignmentRepository::new(pool),
            config,
            notifier,
        }
    }

    fn policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            min_deposit_ratio: self.config.min_deposit_ratio,
            allow_cross_branch: self.config.allow_cross_branch,
        }
    }

    /// Asignar conductor+vehículo a los trips indicados del booking.
    /// La contención transitoria sobre la guarda optimista se reintenta
    /// una vez antes de reportar conflicto.
    pub async fn assign(
        &self,
        ctx: &CallerContext,
        request: &AssignRequest,
    ) -> AppResult<AssignmentOutcome> {
        ctx.ensure_dispatcher()?;
        require_not_empty_list(&request.trip_ids, "trip_ids")?;

        let policy = self.policy();
        let mut retried = false;

        loop {
            let snapshot = self.load_snapshot(request).await?;
            let plan = validate_assignment(&snapshot, &policy)?;

            if plan.to_assign.is_empty() {
                tracing::info!(
                    "♻️ Assign idempotente: booking {} ya tiene este emparejamiento",
                    request.booking_id
                );
                return Ok(build_outcome(&snapshot, &plan));
            }

            let now = Utc::now();
            let trips_to_assign: Vec<&Trip> = snapshot
                .trips
                .iter()
                .filter(|t| plan.to_assign.contains(&t.id))
                .collect();
            let commit = AssignmentCommit {
                driver: &snapshot.driver,
                vehicle: &snapshot.vehicle,
                trips: trips_to_assign,
                note: request.note.clone(),
                now,
            };

            match self.assignments.commit_assignment(&commit).await {
                Ok(()) => {
                    tracing::info!(
                        "✅ Asignados {} trips del booking {} a driver {} / vehicle {}",
                        plan.to_assign.len(),
                        snapshot.booking.id,
                        snapshot.driver.id,
                        snapshot.vehicle.id
                    );
                    for trip_id in &plan.to_assign {
                        self.notifier
                            .trip_assigned(*trip_id, snapshot.driver.id, snapshot.vehicle.id)
                            .await;
                    }
                    return Ok(build_outcome(&snapshot, &plan));
                }
                Err(CommitFailure::Contention { trip_id }) => {
                    if !retried {
                        tracing::warn!(
                            "⚠️ Contención al asignar trip {}, reintentando una vez",
                            trip_id
                        );
                        retried = true;
                        continue;
                    }
                    return Err(AppError::ResourceConflict {
                        resource: format!("trip {}", trip_id),
                        blocking_trip_id: trip_id,
                    });
                }
                Err(CommitFailure::Conflict {
                    resource,
                    blocking_trip_id,
                }) => {
                    return Err(AppError::ResourceConflict {
                        resource,
                        blocking_trip_id,
                    });
                }
                Err(CommitFailure::Db(e)) => return Err(e),
            }
        }
    }

    /// Desasignar un trip: vuelve a SCHEDULED y retira el registro de
    /// asignación (historial, no borrado). Permitido salvo que el trip
    /// esté ONGOING o COMPLETED; sin asignación activa es un no-op.
    pub async fn unassign(
        &self,
        ctx: &CallerContext,
        trip_id: Uuid,
        reason: &str,
    ) -> AppResult<()> {
        ctx.ensure_dispatcher()?;
        require_not_empty(reason, "reason")?;

        let trip = self.trips.get_by_id(trip_id).await?;
        if matches!(trip.status, TripStatus::Ongoing | TripStatus::Completed) {
            return Err(AppError::InvalidTransition(format!(
                "cannot unassign trip {} in {} status",
                trip.id,
                trip.status.as_str()
            )));
        }

        let retired = self.assignments.unassign_trip(&trip, reason).await?;
        if retired.is_empty() {
            tracing::info!("♻️ Unassign de trip {} sin asignación activa: no-op", trip_id);
            return Ok(());
        }

        tracing::info!("↩️ Trip {} desasignado: {}", trip_id, reason);
        self.notifier.trip_unassigned(trip_id, reason).await;
        Ok(())
    }

    /// Reemplazar el emparejamiento de trips ya asignados: desasigna y
    /// asigna de nuevo en una sola llamada. Solo para trips que aún no
    /// empezaron.
    pub async fn reassign(
        &self,
        ctx: &CallerContext,
        request: &AssignRequest,
    ) -> AppResult<AssignmentOutcome> {
        ctx.ensure_dispatcher()?;
        require_not_empty_list(&request.trip_ids, "trip_ids")?;

        let reason = request.note.as_deref().unwrap_or("reassigned");
        let mut seen = HashSet::new();
        for trip_id in &request.trip_ids {
            if !seen.insert(*trip_id) {
                continue;
            }
            let trip = self.trips.get_by_id(*trip_id).await?;
            if matches!(
                trip.status,
                TripStatus::Ongoing | TripStatus::Completed | TripStatus::Cancelled
            ) {
                return Err(AppError::InvalidTransition(format!(
                    "cannot reassign trip {} in {} status",
                    trip.id,
                    trip.status.as_str()
                )));
            }
            self.assignments.unassign_trip(&trip, reason).await?;
        }

        self.assign(ctx, request).await
    }

    async fn load_snapshot(&self, request: &AssignRequest) -> AppResult<AssignmentSnapshot> {
        let booking = self.bookings.get_by_id(request.booking_id).await?;
        let driver = self.drivers.get_by_id(request.driver_id).await?;
        let vehicle = self.vehicles.get_by_id(request.vehicle_id).await?;
        let vehicle_category = self.vehicles.get_category(vehicle.category_id).await?;

        let mut seen = HashSet::new();
        let mut trips = Vec::new();
        for trip_id in &request.trip_ids {
            if seen.insert(*trip_id) {
                trips.push(self.trips.get_by_id(*trip_id).await?);
            }
        }

        let mut active_assignments = HashMap::new();
        for trip in &trips {
            if let Some(assignment) = self.assignments.find_active_by_trip(trip.id).await? {
                active_assignments.insert(trip.id, assignment);
            }
        }

        let driver_busy = self
            .assignments
            .busy_windows_for_driver(driver.id, None)
            .await?;
        let vehicle_busy = self
            .assignments
            .busy_windows_for_vehicle(vehicle.id, None)
            .await?;

        Ok(AssignmentSnapshot {
            booking,
            trips,
            driver,
            vehicle,
            vehicle_category,
            driver_busy,
            vehicle_busy,
            active_assignments,
        })
    }
}

fn build_outcome(snapshot: &AssignmentSnapshot, plan: &AssignmentPlan) -> AssignmentOutcome {
    let trips = snapshot
        .trips
        .iter()
        .map(|trip| {
            let already = plan.already_current.contains(&trip.id);
            AssignedTripInfo {
                trip_id: trip.id,
                trip_status: if already {
                    trip.status
                } else {
                    TripStatus::Assigned
                },
                driver_id: snapshot.driver.id,
                vehicle_id: snapshot.vehicle.id,
                already_assigned: already,
            }
        })
        .collect();

    AssignmentOutcome {
        booking_id: snapshot.booking.id,
        trips,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::TimeWindow;
    use chrono::{DateTime, NaiveDate, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap()
    }

    fn policy() -> DispatchPolicy {
        DispatchPolicy {
            min_deposit_ratio: Decimal::new(30, 2),
            allow_cross_branch: false,
        }
    }

    struct Fixture {
        branch_id: Uuid,
        category_id: Uuid,
        snapshot: AssignmentSnapshot,
    }

    fn fixture() -> Fixture {
        let branch_id = Uuid::new_v4();
        let category_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();

        let booking = Booking {
            id: booking_id,
            branch_id,
            customer_name: "Le Thi C".to_string(),
            customer_phone: Some("0901234567".to_string()),
            status: BookingStatus::Confirmed,
            estimated_cost: Decimal::from(100),
            deposit_paid: Decimal::from(50),
            created_at: at(0),
            version: 0,
        };

        let driver = Driver {
            id: Uuid::new_v4(),
            branch_id,
            full_name: "Pham Van D".to_string(),
            phone: None,
            status: DriverStatus::Available,
            license_class: "D".to_string(),
            license_expiry: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            priority_level: 1,
            rating: Decimal::from(4),
            cross_branch: false,
            created_at: at(0),
            version: 0,
        };

        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            branch_id,
            license_plate: "29B-55555".to_string(),
            model: Some("County".to_string()),
            category_id,
            capacity: 29,
            status: VehicleStatus::Available,
            odometer_km: Decimal::from(80_000),
            last_maintenance_at: Some(at(0)),
            cross_branch: false,
            created_at: at(0),
            version: 0,
        };

        let vehicle_category = VehicleCategory {
            id: category_id,
            name: "29 seats".to_string(),
            seats: 29,
        };

        let trip = trip_in(booking_id, branch_id, category_id, 9, 11);

        Fixture {
            branch_id,
            category_id,
            snapshot: AssignmentSnapshot {
                booking,
                trips: vec![trip],
                driver,
                vehicle,
                vehicle_category,
                driver_busy: vec![],
                vehicle_busy: vec![],
                active_assignments: HashMap::new(),
            },
        }
    }

    fn trip_in(booking_id: Uuid, branch_id: Uuid, category_id: Uuid, start: u32, end: u32) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            booking_id,
            branch_id,
            start_location: "Hanoi".to_string(),
            end_location: "Ninh Binh".to_string(),
            window_start: at(start),
            window_end: at(end),
            distance_km: Decimal::from(95),
            required_category_id: category_id,
            status: TripStatus::Scheduled,
            created_at: at(0),
            version: 0,
        }
    }

    #[test]
    fn valid_assignment_produces_plan() {
        let f = fixture();
        let plan = validate_assignment(&f.snapshot, &policy()).unwrap();
        assert_eq!(plan.to_assign.len(), 1);
        assert!(plan.already_current.is_empty());
    }

    #[test]
    fn pending_booking_is_not_dispatchable() {
        let mut f = fixture();
        f.snapshot.booking.status = BookingStatus::Pending;
        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        assert!(matches!(err, AppError::TripNotDispatchable(_)));
    }

    #[test]
    fn insufficient_deposit_blocks_dispatch() {
        let mut f = fixture();
        f.snapshot.booking.deposit_paid = Decimal::from(10);
        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        assert!(matches!(err, AppError::TripNotDispatchable(_)));
    }

    #[test]
    fn foreign_trip_is_rejected() {
        let mut f = fixture();
        let other_booking = Uuid::new_v4();
        f.snapshot.trips[0].booking_id = other_booking;
        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn already_current_pair_is_idempotent() {
        let mut f = fixture();
        let trip_id = f.snapshot.trips[0].id;
        f.snapshot.trips[0].status = TripStatus::Assigned;
        f.snapshot.active_assignments.insert(
            trip_id,
            Assignment {
                id: Uuid::new_v4(),
                trip_id,
                driver_id: f.snapshot.driver.id,
                vehicle_id: f.snapshot.vehicle.id,
                role: "main".to_string(),
                note: None,
                assigned_at: at(1),
                accepted_at: None,
                removed_at: None,
                removed_reason: None,
            },
        );

        let plan = validate_assignment(&f.snapshot, &policy()).unwrap();
        assert!(plan.to_assign.is_empty());
        assert_eq!(plan.already_current, vec![trip_id]);
    }

    #[test]
    fn assigned_trip_with_other_pair_needs_unassign_first() {
        let mut f = fixture();
        let trip_id = f.snapshot.trips[0].id;
        f.snapshot.trips[0].status = TripStatus::Assigned;
        f.snapshot.active_assignments.insert(
            trip_id,
            Assignment {
                id: Uuid::new_v4(),
                trip_id,
                driver_id: Uuid::new_v4(), // otro conductor
                vehicle_id: f.snapshot.vehicle.id,
                role: "main".to_string(),
                note: None,
                assigned_at: at(1),
                accepted_at: None,
                removed_at: None,
                removed_reason: None,
            },
        );

        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        assert!(matches!(err, AppError::TripNotDispatchable(_)));
    }

    #[test]
    fn overlapping_busy_window_names_blocking_trip() {
        // Trip T 09:00-11:00 ya asignado al conductor; T2 10:00-12:00
        // debe fallar con conflicto nombrando a T
        let mut f = fixture();
        let blocking_trip = Uuid::new_v4();
        f.snapshot.trips[0].window_start = at(10);
        f.snapshot.trips[0].window_end = at(12);
        f.snapshot.driver_busy = vec![BusyWindow {
            trip_id: blocking_trip,
            window: TimeWindow {
                start: at(9),
                end: at(11),
            },
        }];

        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        match err {
            AppError::ResourceConflict {
                blocking_trip_id, ..
            } => assert_eq!(blocking_trip_id, blocking_trip),
            other => panic!("expected ResourceConflict, got {:?}", other),
        }
    }

    #[test]
    fn adjacent_windows_are_fine() {
        let mut f = fixture();
        f.snapshot.driver_busy = vec![BusyWindow {
            trip_id: Uuid::new_v4(),
            window: TimeWindow {
                start: at(7),
                end: at(9),
            },
        }];
        assert!(validate_assignment(&f.snapshot, &policy()).is_ok());
    }

    #[test]
    fn category_mismatch_is_reported() {
        let mut f = fixture();
        f.snapshot.vehicle.category_id = Uuid::new_v4();
        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        assert!(matches!(err, AppError::CategoryMismatch(_)));
    }

    #[test]
    fn license_class_must_cover_category_seats() {
        let mut f = fixture();
        f.snapshot.driver.license_class = "B".to_string();
        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        assert!(matches!(err, AppError::LicenseIncompatible(_)));
    }

    #[test]
    fn expired_license_is_incompatible() {
        let mut f = fixture();
        f.snapshot.driver.license_expiry = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        assert!(matches!(err, AppError::LicenseIncompatible(_)));
    }

    #[test]
    fn intra_batch_overlap_conflicts() {
        let mut f = fixture();
        let second = trip_in(f.snapshot.booking.id, f.branch_id, f.category_id, 10, 12);
        f.snapshot.trips.push(second);
        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        match err {
            AppError::ResourceConflict {
                blocking_trip_id, ..
            } => assert_eq!(blocking_trip_id, f.snapshot.trips[0].id),
            other => panic!("expected ResourceConflict, got {:?}", other),
        }
    }

    #[test]
    fn two_disjoint_trips_assign_together() {
        let mut f = fixture();
        let second = trip_in(f.snapshot.booking.id, f.branch_id, f.category_id, 13, 15);
        f.snapshot.trips.push(second);
        let plan = validate_assignment(&f.snapshot, &policy()).unwrap();
        assert_eq!(plan.to_assign.len(), 2);
    }

    #[test]
    fn cross_branch_policy_gates_foreign_resources() {
        let mut f = fixture();
        f.snapshot.driver.branch_id = Uuid::new_v4();
        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let open_policy = DispatchPolicy {
            min_deposit_ratio: Decimal::new(30, 2),
            allow_cross_branch: true,
        };
        assert!(validate_assignment(&f.snapshot, &open_policy).is_ok());
    }

    #[test]
    fn empty_snapshot_is_a_validation_error() {
        let mut f = fixture();
        f.snapshot.trips.clear();
        let err = validate_assignment(&f.snapshot, &policy()).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
