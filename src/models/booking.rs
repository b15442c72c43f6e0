//! Modelo de Booking
//!
//! Un booking agrupa uno o más trips de un cliente en una sucursal.
//! El importe de depósito (`deposit_paid`) lo mantiene el colaborador de
//! facturación; el despacho solo lo lee como precondición de asignación.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Estado del booking - mapea al ENUM booking_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

/// Booking principal - mapea a la tabla bookings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub status: BookingStatus,
    pub estimated_cost: Decimal,
    pub deposit_paid: Decimal,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

/// Fracción del coste estimado ya cobrada. Un booking sin coste estimado
/// se considera totalmente cubierto.
pub fn deposit_ratio_of(estimated_cost: Decimal, deposit_paid: Decimal) -> Decimal {
    if estimated_cost <= Decimal::ZERO {
        return Decimal::ONE;
    }
    deposit_paid / estimated_cost
}

impl Booking {
    pub fn deposit_ratio(&self) -> Decimal {
        deposit_ratio_of(self.estimated_cost, self.deposit_paid)
    }

    /// ¿Puede despacharse este booking? Requiere estado CONFIRMED o
    /// IN_PROGRESS y depósito por encima del umbral de política.
    pub fn dispatch_eligible(&self, min_deposit_ratio: Decimal) -> bool {
        matches!(
            self.status,
            BookingStatus::Confirmed | BookingStatus::InProgress
        ) && self.deposit_ratio() >= min_deposit_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(status: BookingStatus, cost: i64, paid: i64) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            customer_name: "Tran Van A".to_string(),
            customer_phone: None,
            status,
            estimated_cost: Decimal::from(cost),
            deposit_paid: Decimal::from(paid),
            created_at: Utc::now(),
            version: 0,
        }
    }

    #[test]
    fn deposit_ratio_gate() {
        let min = Decimal::new(30, 2); // 0.30
        assert!(booking(BookingStatus::Confirmed, 100, 30).dispatch_eligible(min));
        assert!(booking(BookingStatus::Confirmed, 100, 50).dispatch_eligible(min));
        assert!(!booking(BookingStatus::Confirmed, 100, 29).dispatch_eligible(min));
    }

    #[test]
    fn status_gate() {
        let min = Decimal::new(30, 2);
        assert!(!booking(BookingStatus::Pending, 100, 100).dispatch_eligible(min));
        assert!(!booking(BookingStatus::Cancelled, 100, 100).dispatch_eligible(min));
        assert!(booking(BookingStatus::InProgress, 100, 100).dispatch_eligible(min));
    }

    #[test]
    fn zero_cost_booking_passes() {
        let min = Decimal::new(30, 2);
        assert!(booking(BookingStatus::Confirmed, 0, 0).dispatch_eligible(min));
    }
}
