//! Modelo de Driver
//!
//! Un conductor pertenece a una sucursal. Las ventanas de tiempo de todos
//! los trips asignados a un conductor nunca deben solaparse (invariante
//! verificado por el índice de disponibilidad y re-validado al confirmar).

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

/// Estado del conductor - mapea al ENUM driver_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "driver_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Available,
    OnTrip,
    DayOff,
    Inactive,
}

lazy_static! {
    /// Capacidad máxima (asientos) que cubre cada clase de licencia.
    /// B hasta 9 plazas, C hasta 16, D hasta 30, E sin límite.
    static ref LICENSE_SEAT_LIMITS: HashMap<&'static str, i32> = {
        let mut m = HashMap::new();
        m.insert("B", 9);
        m.insert("B1", 9);
        m.insert("B2", 9);
        m.insert("C", 16);
        m.insert("D", 30);
        m.insert("E", i32::MAX);
        m
    };
}

/// ¿La clase de licencia cubre un vehículo con esta cantidad de asientos?
/// Una clase desconocida no cubre nada.
pub fn license_covers_seats(license_class: &str, seats: i32) -> bool {
    LICENSE_SEAT_LIMITS
        .get(license_class.trim().to_uppercase().as_str())
        .map(|limit| seats <= *limit)
        .unwrap_or(false)
}

/// Driver principal - mapea a la tabla drivers
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Driver {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub status: DriverStatus,
    pub license_class: String,
    pub license_expiry: NaiveDate,
    /// Nivel de prioridad de despacho: menor número = mayor prioridad.
    pub priority_level: i32,
    pub rating: Decimal,
    /// Permite asignar a trips de otras sucursales.
    pub cross_branch: bool,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

impl Driver {
    pub fn license_valid_on(&self, date: NaiveDate) -> bool {
        self.license_expiry >= date
    }

    pub fn can_drive_seats(&self, seats: i32) -> bool {
        license_covers_seats(&self.license_class, seats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn license_matrix() {
        assert!(license_covers_seats("B", 4));
        assert!(license_covers_seats("B2", 9));
        assert!(!license_covers_seats("B", 16));
        assert!(license_covers_seats("D", 29));
        assert!(!license_covers_seats("D", 45));
        assert!(license_covers_seats("E", 45));
        assert!(license_covers_seats("e", 45));
        assert!(!license_covers_seats("X", 4));
    }

    #[test]
    fn expiry_is_inclusive() {
        let driver = Driver {
            id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            full_name: "Nguyen Van B".to_string(),
            phone: None,
            status: DriverStatus::Available,
            license_class: "D".to_string(),
            license_expiry: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            priority_level: 1,
            rating: Decimal::new(45, 1),
            cross_branch: false,
            created_at: Utc::now(),
            version: 0,
        };
        assert!(driver.license_valid_on(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()));
        assert!(!driver.license_valid_on(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()));
    }
}
