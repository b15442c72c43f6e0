//! Capa de consultas del despacho
//!
//! Vistas de solo lectura: cola de pendientes por sucursal, dashboard
//! diario con conteos por estado y detalle de trip. Nunca muta estado.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::environment::EnvironmentConfig;
use crate::dto::dispatch_dto::{
    DashboardQuery, DispatchDashboardResponse, PendingTripResponse, PendingTripsQuery,
    TripDetailResponse, TripSummary,
};
use crate::dto::incident_dto::IncidentResponse;
use crate::models::booking::{deposit_ratio_of, BookingStatus};
use crate::models::trip::TripStatus;
use crate::repositories::assignment_repository::AssignmentRepository;
use crate::repositories::booking_repository::BookingRepository;
use crate::repositories::driver_repository::DriverRepository;
use crate::repositories::incident_repository::IncidentRepository;
use crate::repositories::trip_repository::{PendingTripRow, TripRepository};
use crate::repositories::vehicle_repository::VehicleRepository;
use crate::utils::errors::AppResult;
use crate::utils::validation::{parse_date, parse_datetime};

/// ¿La fila pertenece a un booking despachable? Mismo criterio que el
/// motor de asignación: estado confirmado y depósito suficiente.
pub fn row_is_dispatchable(row: &PendingTripRow, min_deposit_ratio: Decimal) -> bool {
    matches!(
        row.booking_status,
        BookingStatus::Confirmed | BookingStatus::InProgress
    ) && deposit_ratio_of(row.estimated_cost, row.deposit_paid) >= min_deposit_ratio
}

pub struct DashboardService {
    trips: TripRepository,
    bookings: BookingRepository,
    drivers: DriverRepository,
    vehicles: VehicleRepository,
    assignments: AssignmentRepository,
    incidents: IncidentRepository,
    config: EnvironmentConfig,
}

impl DashboardService {
    pub fn new(pool: PgPool, config: EnvironmentConfig) -> Self {
        Self {
            trips: TripRepository::new(pool.clone()),
            bookings: BookingRepository::new(pool.clone()),
            drivers: DriverRepository::new(pool.clone()),
            vehicles: VehicleRepository::new(pool.clone()),
            assignments: AssignmentRepository::new(pool.clone()),
            incidents: IncidentRepository::new(pool),
            config,
        }
    }

    /// Cola de pendientes: trips SCHEDULED de bookings despachables sin
    /// asignación activa. Por defecto cubre los próximos 7 días.
    pub async fn pending_trips(
        &self,
        query: &PendingTripsQuery,
    ) -> AppResult<Vec<PendingTripResponse>> {
        let from = match &query.from {
            Some(raw) => parse_datetime(raw)?,
            None => start_of_today(),
        };
        let to = match &query.to {
            Some(raw) => parse_datetime(raw)?,
            None => from + Duration::days(7),
        };

        let rows = self.trips.find_pending(query.branch_id, from, to).await?;
        let min_ratio = self.config.min_deposit_ratio;

        Ok(rows
            .into_iter()
            .filter(|row| row_is_dispatchable(row, min_ratio))
            .map(pending_response)
            .collect())
    }

    /// Dashboard diario por sucursal: conteos por estado más la cola de
    /// pendientes del día.
    pub async fn dashboard(&self, query: &DashboardQuery) -> AppResult<DispatchDashboardResponse> {
        let date = match &query.date {
            Some(raw) => parse_date(raw)?,
            None => Utc::now().date_naive(),
        };
        let (from, to) = day_bounds(date);

        let counts = self.trips.count_by_status(query.branch_id, from, to).await?;
        let mut pending_count = 0;
        let mut assigned_count = 0;
        let mut ongoing_count = 0;
        let mut completed_count = 0;
        let mut cancelled_count = 0;
        for (status, count) in counts {
            match status {
                TripStatus::Scheduled => pending_count = count,
                TripStatus::Assigned => assigned_count = count,
                TripStatus::Ongoing => ongoing_count = count,
                TripStatus::Completed => completed_count = count,
                TripStatus::Cancelled => cancelled_count = count,
            }
        }

        let rows = self.trips.find_pending(query.branch_id, from, to).await?;
        let min_ratio = self.config.min_deposit_ratio;
        let pending_trips = rows
            .into_iter()
            .filter(|row| row_is_dispatchable(row, min_ratio))
            .map(pending_response)
            .collect();

        Ok(DispatchDashboardResponse {
            branch_id: query.branch_id,
            pending_count,
            assigned_count,
            ongoing_count,
            completed_count,
            cancelled_count,
            pending_trips,
        })
    }

    /// Detalle de un trip con su asignación activa e incidentes abiertos.
    pub async fn trip_detail(&self, trip_id: Uuid) -> AppResult<TripDetailResponse> {
        let trip = self.trips.get_by_id(trip_id).await?;
        let booking = self.bookings.get_by_id(trip.booking_id).await?;
        let category = self.vehicles.get_category(trip.required_category_id).await?;
        let assignment = self.assignments.find_active_by_trip(trip.id).await?;

        let mut driver_id = None;
        let mut driver_name = None;
        let mut driver_phone = None;
        let mut vehicle_id = None;
        let mut vehicle_plate = None;
        let mut vehicle_model = None;
        let mut accepted_at = None;

        if let Some(assignment) = &assignment {
            accepted_at = assignment.accepted_at;
            if let Some(driver) = self.drivers.find_by_id(assignment.driver_id).await? {
                driver_id = Some(driver.id);
                driver_name = Some(driver.full_name);
                driver_phone = driver.phone;
            }
            if let Some(vehicle) = self.vehicles.find_by_id(assignment.vehicle_id).await? {
                vehicle_id = Some(vehicle.id);
                vehicle_plate = Some(vehicle.license_plate);
                vehicle_model = vehicle.model;
            }
        }

        let open_incidents = self
            .incidents
            .find_open_by_trip(trip.id)
            .await?
            .into_iter()
            .map(IncidentResponse::from)
            .collect();

        Ok(TripDetailResponse {
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
            distance_km: trip.distance_km,
            driver_id,
            driver_name,
            driver_phone,
            vehicle_id,
            vehicle_plate,
            vehicle_model,
            accepted_at,
            open_incidents,
        })
    }
}

fn pending_response(row: PendingTripRow) -> PendingTripResponse {
    PendingTripResponse {
        trip_id: row.trip_id,
        booking_id: row.booking_id,
        branch_id: row.branch_id,
        customer_name: row.customer_name,
        customer_phone: row.customer_phone,
        start_location: row.start_location,
        end_location: row.end_location,
        window_start: row.window_start,
        window_end: row.window_end,
        booking_status: row.booking_status,
        required_seats: row.required_seats,
    }
}

fn start_of_today() -> DateTime<Utc> {
    let (from, _) = day_bounds(Utc::now().date_naive());
    from
}

fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(status: BookingStatus, cost: i64, paid: i64) -> PendingTripRow {
        PendingTripRow {
            trip_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            customer_name: "Hoang Van E".to_string(),
            customer_phone: None,
            start_location: "Hanoi".to_string(),
            end_location: "Sapa".to_string(),
            window_start: Utc.with_ymd_and_hms(2025, 3, 14, 6, 0, 0).unwrap(),
            window_end: Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap(),
            booking_status: status,
            required_seats: 16,
            estimated_cost: Decimal::from(cost),
            deposit_paid: Decimal::from(paid),
        }
    }

    #[test]
    fn deposit_filter_mirrors_assignment_gate() {
        let min = Decimal::new(30, 2);
        assert!(row_is_dispatchable(&row(BookingStatus::Confirmed, 100, 30), min));
        assert!(!row_is_dispatchable(&row(BookingStatus::Confirmed, 100, 10), min));
        assert!(!row_is_dispatchable(&row(BookingStatus::Pending, 100, 100), min));
        assert!(!row_is_dispatchable(&row(BookingStatus::Cancelled, 100, 100), min));
    }

    #[test]
    fn day_bounds_cover_one_day() {
        let (from, to) = day_bounds(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(to - from, Duration::days(1));
        assert_eq!(from.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }
}
