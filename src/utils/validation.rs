//! Utilidades de validación
//!
//! Funciones helper para validación de parámetros de la API de despacho.

use chrono::{DateTime, NaiveDate, Utc};

use crate::utils::errors::{AppError, AppResult};

/// Validar y convertir string a fecha (YYYY-MM-DD)
pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::ValidationError(format!("'{}' is not a valid date (expected YYYY-MM-DD)", value))
    })
}

/// Validar y convertir string a datetime RFC3339
pub fn parse_datetime(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            AppError::ValidationError(format!(
                "'{}' is not a valid timestamp (expected RFC3339)",
                value
            ))
        })
}

/// Validar que un string no esté vacío
pub fn require_not_empty(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Validar que una lista no esté vacía
pub fn require_not_empty_list<T>(values: &[T], field: &str) -> AppResult<()> {
    if values.is_empty() {
        return Err(AppError::ValidationError(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso() {
        assert!(parse_date("2025-03-14").is_ok());
        assert!(parse_date("14/03/2025").is_err());
    }

    #[test]
    fn parse_datetime_accepts_rfc3339() {
        assert!(parse_datetime("2025-03-14T09:00:00Z").is_ok());
        assert!(parse_datetime("2025-03-14 09:00").is_err());
    }

    #[test]
    fn empty_list_rejected() {
        let empty: Vec<i32> = vec![];
        assert!(require_not_empty_list(&empty, "trip_ids").is_err());
        assert!(require_not_empty_list(&[1], "trip_ids").is_ok());
    }
}
