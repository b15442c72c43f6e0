use sqlx::PgPool;
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub struct DriverRepository {
    pool: PgPool,
}

impl DriverRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Driver>> {
        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Error finding driver: {}", e)))?;

        Ok(driver)
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Driver> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Driver", id))
    }

    /// Conductores candidatos para una sucursal: los propios de la
    /// sucursal más los marcados como cross_branch. El filtrado fino de
    /// elegibilidad se hace en el ranking.
    pub async fn find_candidates_for_branch(&self, branch_id: Uuid) -> AppResult<Vec<Driver>> {
        let drivers = sqlx::query_as::<_, Driver>(
            r#"
            SELECT * FROM drivers
            WHERE branch_id = $1 OR cross_branch = TRUE
            ORDER BY id
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error listing drivers: {}", e)))?;

        Ok(drivers)
    }
}
