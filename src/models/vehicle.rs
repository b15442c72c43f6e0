//! Modelo de Vehicle
//!
//! Un vehículo pertenece a una sucursal y a una categoría (clase de
//! capacidad). Aplica el mismo invariante de no-solapamiento que el
//! conductor, limitado al vehículo.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Estado del vehículo - mapea al ENUM vehicle_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "vehicle_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Available,
    InUse,
    Maintenance,
    Inactive,
}

/// Categoría de vehículo (clase de capacidad)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VehicleCategory {
    pub id: Uuid,
    pub name: String,
    pub seats: i32,
}

/// Vehicle principal - mapea a la tabla vehicles
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub license_plate: String,
    pub model: Option<String>,
    pub category_id: Uuid,
    pub capacity: i32,
    pub status: VehicleStatus,
    pub odometer_km: Decimal,
    pub last_maintenance_at: Option<DateTime<Utc>>,
    /// Permite asignar a trips de otras sucursales.
    pub cross_branch: bool,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}
