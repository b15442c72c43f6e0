use sqlx::PgPool;
use uuid::Uuid;

use crate::models::vehicle::{Vehicle, VehicleCategory};
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub struct VehicleRepository {
    pool: PgPool,
}

impl VehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Error finding vehicle: {}", e)))?;

        Ok(vehicle)
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Vehicle> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", id))
    }

    /// Vehículos de la categoría requerida por el trip. El filtrado de
    /// sucursal/estado/solape se hace en el ranking.
    pub async fn find_by_category(&self, category_id: Uuid) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE category_id = $1 ORDER BY id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error listing vehicles: {}", e)))?;

        Ok(vehicles)
    }

    pub async fn find_category(&self, id: Uuid) -> AppResult<Option<VehicleCategory>> {
        let category = sqlx::query_as::<_, VehicleCategory>(
            "SELECT * FROM vehicle_categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Error finding vehicle category: {}", e)))?;

        Ok(category)
    }

    pub async fn get_category(&self, id: Uuid) -> AppResult<VehicleCategory> {
        self.find_category(id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle category", id))
    }
}
