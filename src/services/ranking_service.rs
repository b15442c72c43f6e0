//! Ranker de candidatos
//!
//! Produce la lista ordenada de conductores y vehículos elegibles para un
//! trip, mejor primero. El filtro de elegibilidad y la puntuación son
//! funciones puras sobre los hechos ya cargados; la parte async solo
//! carga datos y delega aquí. El mismo input produce siempre el mismo
//! orden: los empates se rompen por ID ascendente.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use num_traits::ToPrimitive;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::environment::EnvironmentConfig;
use crate::dto::dispatch_dto::{
    DriverCandidate, DriverScoreBreakdown, PairSuggestion, RankedCandidates, TripSummary,
    VehicleCandidate, VehicleScoreBreakdown,
};
use crate::models::driver::{Driver, DriverStatus};
use crate::models::trip::Trip;
use crate::models::vehicle::{Vehicle, VehicleCategory, VehicleStatus};
use crate::repositories::assignment_repository::AssignmentRepository;
use crate::repositories::booking_repository::BookingRepository;
use crate::repositories::driver_repository::DriverRepository;
use crate::repositories::trip_repository::TripRepository;
use crate::repositories::vehicle_repository::VehicleRepository;
use crate::services::availability_service::find_blocking_trip;
use crate::utils::errors::{AppError, AppResult};

// Pesos de la suma ponderada. Suman 1.0 por lado para que el score total
// quede en [0, 1].
const W_DRIVER_PRIORITY: f64 = 0.35;
const W_DRIVER_WORKLOAD: f64 = 0.40;
const W_DRIVER_RATING: f64 = 0.25;

const W_VEHICLE_CAPACITY: f64 = 0.40;
const W_VEHICLE_ODOMETER: f64 = 0.35;
const W_VEHICLE_MAINTENANCE: f64 = 0.25;

const MAX_PAIR_CANDIDATES: usize = 5;
const MAX_PAIR_SUGGESTIONS: usize = 10;

/// Hechos pre-cargados sobre un conductor para un trip concreto.
#[derive(Debug, Clone, Copy)]
pub struct DriverFacts {
    /// Asignaciones activas en el período circundante.
    pub workload: i64,
    /// Trip que bloquea la ventana del trip objetivo, si lo hay.
    pub blocking_trip_id: Option<Uuid>,
}

/// Hechos pre-cargados sobre un vehículo para un trip concreto.
#[derive(Debug, Clone, Copy)]
pub struct VehicleFacts {
    pub blocking_trip_id: Option<Uuid>,
}

/// Evaluar un conductor contra un trip. Función pura.
pub fn evaluate_driver(
    driver: &Driver,
    facts: &DriverFacts,
    trip: &Trip,
    required_seats: i32,
    allow_cross_branch: bool,
) -> DriverCandidate {
    let mut eligible = true;
    let mut reasons = Vec::new();

    if driver.status != DriverStatus::Available {
        eligible = false;
        reasons.push(format!("driver status is {:?}", driver.status));
    }

    if driver.branch_id != trip.branch_id && !driver.cross_branch && !allow_cross_branch {
        eligible = false;
        reasons.push("driver belongs to another branch".to_string());
    }

    let trip_date = trip.window_start.date_naive();
    if !driver.license_valid_on(trip_date) {
        eligible = false;
        reasons.push(format!("license expired on {}", driver.license_expiry));
    }

    if !driver.can_drive_seats(required_seats) {
        eligible = false;
        reasons.push(format!(
            "license class {} does not cover {} seats",
            driver.license_class, required_seats
        ));
    }

    if let Some(blocking) = facts.blocking_trip_id {
        eligible = false;
        reasons.push(format!("window overlaps trip {}", blocking));
    }

    // Sub-scores normalizados a (0, 1], mayor es mejor
    let priority = 1.0 / driver.priority_level.max(1) as f64;
    let workload = 1.0 / (1.0 + facts.workload as f64);
    let rating = (driver.rating.to_f64().unwrap_or(0.0) / 5.0).clamp(0.0, 1.0);

    let total_score =
        W_DRIVER_PRIORITY * priority + W_DRIVER_WORKLOAD * workload + W_DRIVER_RATING * rating;

    DriverCandidate {
        id: driver.id,
        name: driver.full_name.clone(),
        phone: driver.phone.clone(),
        license_class: driver.license_class.clone(),
        rating: driver.rating,
        workload: facts.workload,
        eligible,
        reasons,
        scores: DriverScoreBreakdown {
            priority,
            workload,
            rating,
        },
        total_score,
    }
}

/// Evaluar un vehículo contra un trip. Función pura.
pub fn evaluate_vehicle(
    vehicle: &Vehicle,
    facts: &VehicleFacts,
    trip: &Trip,
    category: &VehicleCategory,
    now: DateTime<Utc>,
    allow_cross_branch: bool,
) -> VehicleCandidate {
    let mut eligible = true;
    let mut reasons = Vec::new();

    if vehicle.status != VehicleStatus::Available {
        eligible = false;
        reasons.push(format!("vehicle status is {:?}", vehicle.status));
    }

    if vehicle.branch_id != trip.branch_id && !vehicle.cross_branch && !allow_cross_branch {
        eligible = false;
        reasons.push("vehicle belongs to another branch".to_string());
    }

    if vehicle.category_id != trip.required_category_id {
        eligible = false;
        reasons.push(format!("vehicle category does not match '{}'", category.name));
    }

    if vehicle.capacity < category.seats {
        eligible = false;
        reasons.push(format!(
            "capacity {} below required {} seats",
            vehicle.capacity, category.seats
        ));
    }

    if let Some(blocking) = facts.blocking_trip_id {
        eligible = false;
        reasons.push(format!("window overlaps trip {}", blocking));
    }

    // Preferir el vehículo con menos capacidad sobrante, menos kilómetros
    // y mantenimiento más reciente
    let slack = (vehicle.capacity - category.seats).max(0);
    let capacity_fit = 1.0 / (1.0 + slack as f64);
    let odometer = 1.0 / (1.0 + vehicle.odometer_km.to_f64().unwrap_or(0.0) / 100_000.0);
    let maintenance = match vehicle.last_maintenance_at {
        Some(at) => {
            let days = (now - at).num_days().max(0) as f64;
            1.0 / (1.0 + days / 180.0)
        }
        None => 0.0,
    };

    let total_score = W_VEHICLE_CAPACITY * capacity_fit
        + W_VEHICLE_ODOMETER * odometer
        + W_VEHICLE_MAINTENANCE * maintenance;

    VehicleCandidate {
        id: vehicle.id,
        license_plate: vehicle.license_plate.clone(),
        model: vehicle.model.clone(),
        capacity: vehicle.capacity,
        category_name: category.name.clone(),
        eligible,
        reasons,
        scores: VehicleScoreBreakdown {
            capacity_fit,
            odometer,
            maintenance,
        },
        total_score,
    }
}

/// Orden final: elegibles primero, score descendente, ID ascendente como
/// desempate determinista.
pub fn rank_driver_candidates(mut candidates: Vec<DriverCandidate>) -> Vec<DriverCandidate> {
    candidates.sort_by(|a, b| {
        b.eligible
            .cmp(&a.eligible)
            .then(b.total_score.total_cmp(&a.total_score))
            .then(a.id.cmp(&b.id))
    });
    candidates
}

pub fn rank_vehicle_candidates(mut candidates: Vec<VehicleCandidate>) -> Vec<VehicleCandidate> {
    candidates.sort_by(|a, b| {
        b.eligible
            .cmp(&a.eligible)
            .then(b.total_score.total_cmp(&a.total_score))
            .then(a.id.cmp(&b.id))
    });
    candidates
}

/// Combinar los mejores candidatos de cada lado en parejas sugeridas.
pub fn build_pair_suggestions(
    drivers: &[DriverCandidate],
    vehicles: &[VehicleCandidate],
) -> Vec<PairSuggestion> {
    let top_drivers: Vec<_> = drivers
        .iter()
        .filter(|d| d.eligible)
        .take(MAX_PAIR_CANDIDATES)
        .collect();
    let top_vehicles: Vec<_> = vehicles
        .iter()
        .filter(|v| v.eligible)
        .take(MAX_PAIR_CANDIDATES)
        .collect();

    let mut pairs = Vec::new();
    for driver in &top_drivers {
        for vehicle in &top_vehicles {
            pairs.push(PairSuggestion {
                driver_id: driver.id,
                driver_name: driver.name.clone(),
                vehicle_id: vehicle.id,
                vehicle_plate: vehicle.license_plate.clone(),
                score: driver.total_score + vehicle.total_score,
            });
        }
    }

    pairs.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.driver_id.cmp(&b.driver_id))
            .then(a.vehicle_id.cmp(&b.vehicle_id))
    });
    pairs.truncate(MAX_PAIR_SUGGESTIONS);
    pairs
}

pub struct RankingService {
    trips: TripRepository,
    bookings: BookingRepository,
    drivers: DriverRepository,
    vehicles: VehicleRepository,
    assignments: AssignmentRepository,
    config: EnvironmentConfig,
}

impl RankingService {
    pub fn new(pool: PgPool, config: EnvironmentConfig) -> Self {
        Self {
            trips: TripRepository::new(pool.clone()),
            bookings: BookingRepository::new(pool.clone()),
            drivers: DriverRepository::new(pool.clone()),
            vehicles: VehicleRepository::new(pool.clone()),
            assignments: AssignmentRepository::new(pool),
            config,
        }
    }

    /// Candidatos rankeados para un trip. Solo lectura: no compromete
    /// nada.
    pub async fn suggestions(&self, trip_id: Uuid) -> AppResult<RankedCandidates> {
        let trip = self.trips.get_by_id(trip_id).await?;
        let booking = self.bookings.get_by_id(trip.booking_id).await?;
        let category = self.vehicles.get_category(trip.required_category_id).await?;
        let window = trip.window();
        let now = Utc::now();

        let workload_from = trip.window_start - Duration::days(self.config.workload_window_days);
        let workload_to = trip.window_start + Duration::days(self.config.workload_window_days);

        let driver_pool = self.drivers.find_candidates_for_branch(trip.branch_id).await?;
        let vehicle_pool = self.vehicles.find_by_category(category.id).await?;

        tracing::info!(
            "🔎 Ranking trip {}: {} drivers y {} vehicles candidatos",
            trip.id,
            driver_pool.len(),
            vehicle_pool.len()
        );

        let driver_fact_futures = driver_pool.iter().map(|driver| async {
            let busy = self
                .assignments
                .busy_windows_for_driver(driver.id, Some(trip.id))
                .await?;
            let workload = self
                .assignments
                .driver_workload(driver.id, workload_from, workload_to)
                .await?;
            Ok::<DriverFacts, AppError>(DriverFacts {
                workload,
                blocking_trip_id: find_blocking_trip(&busy, &window),
            })
        });
        let driver_facts = join_all(driver_fact_futures)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let vehicle_fact_futures = vehicle_pool.iter().map(|vehicle| async {
            let busy = self
                .assignments
                .busy_windows_for_vehicle(vehicle.id, Some(trip.id))
                .await?;
            Ok::<VehicleFacts, AppError>(VehicleFacts {
                blocking_trip_id: find_blocking_trip(&busy, &window),
            })
        });
        let vehicle_facts = join_all(vehicle_fact_futures)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let drivers = rank_driver_candidates(
            driver_pool
                .iter()
                .zip(driver_facts.iter())
                .map(|(driver, facts)| {
                    evaluate_driver(
                        driver,
                        facts,
                        &trip,
                        category.seats,
                        self.config.allow_cross_branch,
                    )
                })
                .collect(),
        );

        let vehicles = rank_vehicle_candidates(
            vehicle_pool
                .iter()
                .zip(vehicle_facts.iter())
                .map(|(vehicle, facts)| {
                    evaluate_vehicle(
                        vehicle,
                        facts,
                        &trip,
                        &category,
                        now,
                        self.config.allow_cross_branch,
                    )
                })
                .collect(),
        );

        let pairs = build_pair_suggestions(&drivers, &vehicles);
        let recommended_driver_id = pairs.first().map(|p| p.driver_id);
        let recommended_vehicle_id = pairs.first().map(|p| p.vehicle_id);

        Ok(RankedCandidates {
            trip: TripSummary {
                trip_id: trip.id,
                booking_id: booking.id,
                branch_id: trip.branch_id,
                customer_name: booking.customer_name,
                customer_phone: booking.customer_phone,
                start_location: trip.start_location,
                end_location: trip.end_location,
                window_start: trip.window_start,
                window_end: trip.window_end,
                status: trip.status,
                required_category: category.name,
                required_seats: category.seats,
            },
            drivers,
            vehicles,
            pairs,
            recommended_driver_id,
            recommended_vehicle_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap()
    }

    fn trip(branch_id: Uuid, category_id: Uuid) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            branch_id,
            start_location: "Hanoi".to_string(),
            end_location: "Ha Long".to_string(),
            window_start: at(9),
            window_end: at(11),
            distance_km: Decimal::from(160),
            required_category_id: category_id,
            status: crate::models::trip::TripStatus::Scheduled,
            created_at: at(0),
            version: 0,
        }
    }

    fn driver(branch_id: Uuid, priority: i32, rating: i64) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            branch_id,
            full_name: "driver".to_string(),
            phone: None,
            status: DriverStatus::Available,
            license_class: "D".to_string(),
            license_expiry: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            priority_level: priority,
            rating: Decimal::from(rating),
            cross_branch: false,
            created_at: at(0),
            version: 0,
        }
    }

    fn vehicle(branch_id: Uuid, category_id: Uuid, capacity: i32, odometer: i64) -> Vehicle {
        Vehicle {
            id: Uuid::new_v4(),
            branch_id,
            license_plate: "29A-12345".to_string(),
            model: None,
            category_id,
            capacity,
            status: VehicleStatus::Available,
            odometer_km: Decimal::from(odometer),
            last_maintenance_at: Some(at(0)),
            cross_branch: false,
            created_at: at(0),
            version: 0,
        }
    }

    fn free() -> DriverFacts {
        DriverFacts {
            workload: 0,
            blocking_trip_id: None,
        }
    }

    #[test]
    fn busy_driver_scores_below_idle_driver() {
        let branch = Uuid::new_v4();
        let category = Uuid::new_v4();
        let t = trip(branch, category);

        let idle = evaluate_driver(&driver(branch, 1, 4), &free(), &t, 16, false);
        let busy = evaluate_driver(
            &driver(branch, 1, 4),
            &DriverFacts {
                workload: 3,
                blocking_trip_id: None,
            },
            &t,
            16,
            false,
        );
        assert!(idle.total_score > busy.total_score);
        assert!(busy.eligible);
    }

    #[test]
    fn overlap_makes_driver_ineligible() {
        let branch = Uuid::new_v4();
        let t = trip(branch, Uuid::new_v4());
        let blocking = Uuid::new_v4();
        let candidate = evaluate_driver(
            &driver(branch, 1, 5),
            &DriverFacts {
                workload: 1,
                blocking_trip_id: Some(blocking),
            },
            &t,
            16,
            false,
        );
        assert!(!candidate.eligible);
        assert!(candidate
            .reasons
            .iter()
            .any(|r| r.contains(&blocking.to_string())));
    }

    #[test]
    fn license_class_filters_large_vehicles() {
        let branch = Uuid::new_v4();
        let t = trip(branch, Uuid::new_v4());
        let mut d = driver(branch, 1, 5);
        d.license_class = "B".to_string();
        let candidate = evaluate_driver(&d, &free(), &t, 45, false);
        assert!(!candidate.eligible);
    }

    #[test]
    fn cross_branch_flag_allows_foreign_driver() {
        let t = trip(Uuid::new_v4(), Uuid::new_v4());
        let mut d = driver(Uuid::new_v4(), 1, 5);
        let rejected = evaluate_driver(&d, &free(), &t, 16, false);
        assert!(!rejected.eligible);

        d.cross_branch = true;
        let accepted = evaluate_driver(&d, &free(), &t, 16, false);
        assert!(accepted.eligible);
    }

    #[test]
    fn ranking_is_deterministic_with_id_tiebreak() {
        let branch = Uuid::new_v4();
        let category = Uuid::new_v4();
        let t = trip(branch, category);

        // Dos conductores idénticos: mismo score, desempate por ID
        let d1 = driver(branch, 2, 4);
        let d2 = driver(branch, 2, 4);
        let c1 = evaluate_driver(&d1, &free(), &t, 16, false);
        let c2 = evaluate_driver(&d2, &free(), &t, 16, false);
        assert_eq!(c1.total_score, c2.total_score);

        let ranked_a = rank_driver_candidates(vec![
            evaluate_driver(&d1, &free(), &t, 16, false),
            evaluate_driver(&d2, &free(), &t, 16, false),
        ]);
        let ranked_b = rank_driver_candidates(vec![
            evaluate_driver(&d2, &free(), &t, 16, false),
            evaluate_driver(&d1, &free(), &t, 16, false),
        ]);
        let ids_a: Vec<_> = ranked_a.iter().map(|c| c.id).collect();
        let ids_b: Vec<_> = ranked_b.iter().map(|c| c.id).collect();
        assert_eq!(ids_a, ids_b);
        assert!(ids_a[0] < ids_a[1]);
    }

    #[test]
    fn tight_capacity_fit_outranks_oversized_vehicle() {
        let branch = Uuid::new_v4();
        let category_id = Uuid::new_v4();
        let t = trip(branch, category_id);
        let category = VehicleCategory {
            id: category_id,
            name: "16 seats".to_string(),
            seats: 16,
        };
        let facts = VehicleFacts {
            blocking_trip_id: None,
        };

        let snug = evaluate_vehicle(
            &vehicle(branch, category_id, 16, 50_000),
            &facts,
            &t,
            &category,
            at(8),
            false,
        );
        let oversized = evaluate_vehicle(
            &vehicle(branch, category_id, 29, 50_000),
            &facts,
            &t,
            &category,
            at(8),
            false,
        );
        assert!(snug.total_score > oversized.total_score);
    }

    #[test]
    fn wrong_category_is_ineligible_but_still_scored() {
        let branch = Uuid::new_v4();
        let t = trip(branch, Uuid::new_v4());
        let other_category = Uuid::new_v4();
        let category = VehicleCategory {
            id: t.required_category_id,
            name: "9 seats".to_string(),
            seats: 9,
        };
        let candidate = evaluate_vehicle(
            &vehicle(branch, other_category, 9, 10_000),
            &VehicleFacts {
                blocking_trip_id: None,
            },
            &t,
            &category,
            at(8),
            false,
        );
        assert!(!candidate.eligible);
    }

    #[test]
    fn pairs_combine_top_candidates_only() {
        let branch = Uuid::new_v4();
        let category_id = Uuid::new_v4();
        let t = trip(branch, category_id);
        let category = VehicleCategory {
            id: category_id,
            name: "16 seats".to_string(),
            seats: 16,
        };

        let drivers = rank_driver_candidates(vec![
            evaluate_driver(&driver(branch, 1, 5), &free(), &t, 16, false),
            evaluate_driver(&driver(branch, 3, 2), &free(), &t, 16, false),
        ]);
        let vehicles = rank_vehicle_candidates(vec![evaluate_vehicle(
            &vehicle(branch, category_id, 16, 10_000),
            &VehicleFacts {
                blocking_trip_id: None,
            },
            &t,
            &category,
            at(8),
            false,
        )]);

        let pairs = build_pair_suggestions(&drivers, &vehicles);
        assert_eq!(pairs.len(), 2);
        // La mejor pareja lleva al mejor conductor
        assert_eq!(pairs[0].driver_id, drivers[0].id);
        assert!(pairs[0].score >= pairs[1].score);
    }

    #[test]
    fn empty_pools_produce_empty_result() {
        let pairs = build_pair_suggestions(&[], &[]);
        assert!(pairs.is_empty());
    }
}
