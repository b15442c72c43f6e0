use sqlx::PgPool;
use uuid::Uuid;

use crate::models::booking::Booking;
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error finding booking: {}", e)))?;

        Ok(booking)
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Booking> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Booking", id))
    }
}
