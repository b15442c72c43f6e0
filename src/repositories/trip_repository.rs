use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::booking::BookingStatus;
use crate::models::trip::{Trip, TripStatus};
use crate::utils::errors::{not_found_error, AppError, AppResult};

/// Fila de la cola de pendientes: trip SCHEDULED sin asignación activa,
/// con los datos del booking necesarios para el filtro de depósito.
#[derive(Debug, sqlx::FromRow)]
pub struct PendingTripRow {
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
    pub estimated_cost: Decimal,
    pub deposit_paid: Decimal,
}

pub struct TripRepository {
    pool: PgPool,
}

impl TripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Error finding trip: {}", e)))?;

        Ok(trip)
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Trip> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Trip", id))
    }

    pub async fn find_by_booking(&self, booking_id: Uuid) -> AppResult<Vec<Trip>> {
        let trips = sqlx::query_as::<_, Trip>(
            "SELECT * FROM trips WHERE booking_id = $1 ORDER BY window_start, id",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error listing booking trips: {}", e)))?;

        Ok(trips)
    }

    /// Cola de pendientes de una sucursal, ordenada como la original:
    /// mayor capacidad requerida primero y luego por hora de salida.
    pub async fn find_pending(
        &self,
        branch_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<PendingTripRow>> {
        let rows = sqlx::query_as::<_, PendingTripRow>(
            r#"
            SELECT t.id AS trip_id,
                   t.booking_id,
                   b.branch_id,
                   b.customer_name,
                   b.customer_phone,
                   t.start_location,
                   t.end_location,
                   t.window_start,
                   t.window_end,
                   b.status AS booking_status,
                   c.seats AS required_seats,
                   b.estimated_cost,
                   b.deposit_paid
            FROM trips t
            JOIN bookings b ON b.id = t.booking_id
            JOIN vehicle_categories c ON c.id = t.required_category_id
            WHERE b.branch_id = $1
              AND t.status = 'scheduled'
              AND t.window_start >= $2
              AND t.window_start < $3
              AND NOT EXISTS (
                  SELECT 1 FROM trip_assignments a
                  WHERE a.trip_id = t.id AND a.removed_at IS NULL
              )
            ORDER BY c.seats DESC, t.window_start ASC, t.id ASC
            "#,
        )
        .bind(branch_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error loading pending trips: {}", e)))?;

        Ok(rows)
    }

    /// Conteo de trips por estado para el dashboard de una sucursal.
    pub async fn count_by_status(
        &self,
        branch_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<(TripStatus, i64)>> {
        let counts = sqlx::query_as::<_, (TripStatus, i64)>(
            r#"
            SELECT t.status, COUNT(*)
            FROM trips t
            JOIN bookings b ON b.id = t.booking_id
            WHERE b.branch_id = $1
              AND t.window_start >= $2
              AND t.window_start < $3
            GROUP BY t.status
            "#,
        )
        .bind(branch_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error counting trips: {}", e)))?;

        Ok(counts)
    }
}
