//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del sistema de despacho
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Trip not dispatchable: {0}")]
    TripNotDispatchable(String),

    #[error("Scheduling conflict: {resource} is already occupied by trip {blocking_trip_id}")]
    ResourceConflict {
        resource: String,
        blocking_trip_id: Uuid,
    },

    #[error("Category mismatch: {0}")]
    CategoryMismatch(String),

    #[error("License incompatible: {0}")]
    LicenseIncompatible(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not the assigned driver: {0}")]
    NotAssignedDriver(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: "Not Found".to_string(),
                    message: msg,
                    details: None,
                    code: Some("NOT_FOUND".to_string()),
                },
            ),

            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Validation Error".to_string(),
                    message: msg,
                    details: None,
                    code: Some("VALIDATION_ERROR".to_string()),
                },
            ),

            AppError::InvalidTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: "Invalid Transition".to_string(),
                    message: msg,
                    details: None,
                    code: Some("INVALID_TRANSITION".to_string()),
                },
            ),

            AppError::TripNotDispatchable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: "Trip Not Dispatchable".to_string(),
                    message: msg,
                    details: None,
                    code: Some("TRIP_NOT_DISPATCHABLE".to_string()),
                },
            ),

            AppError::ResourceConflict {
                resource,
                blocking_trip_id,
            } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: "Resource Conflict".to_string(),
                    message: format!("{} is already occupied by an overlapping trip", resource),
                    details: Some(json!({ "blocking_trip_id": blocking_trip_id })),
                    code: Some("RESOURCE_CONFLICT".to_string()),
                },
            ),

            AppError::CategoryMismatch(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: "Category Mismatch".to_string(),
                    message: msg,
                    details: None,
                    code: Some("CATEGORY_MISMATCH".to_string()),
                },
            ),

            AppError::LicenseIncompatible(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: "License Incompatible".to_string(),
                    message: msg,
                    details: None,
                    code: Some("LICENSE_INCOMPATIBLE".to_string()),
                },
            ),

            AppError::Unauthorized(msg) => (
                StatusCode::FORBIDDEN,
                ErrorResponse {
                    error: "Unauthorized".to_string(),
                    message: msg,
                    details: None,
                    code: Some("UNAUTHORIZED".to_string()),
                },
            ),

            AppError::NotAssignedDriver(msg) => (
                StatusCode::FORBIDDEN,
                ErrorResponse {
                    error: "Not Assigned Driver".to_string(),
                    message: msg,
                    details: None,
                    code: Some("NOT_ASSIGNED_DRIVER".to_string()),
                },
            ),

            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Database Error".to_string(),
                        message: "An error occurred while accessing the database".to_string(),
                        details: Some(json!({ "sql_error": msg })),
                        code: Some("DB_ERROR".to_string()),
                    },
                )
            }

            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Internal Server Error".to_string(),
                        message: "An unexpected error occurred".to_string(),
                        details: Some(json!({ "internal_error": msg })),
                        code: Some("INTERNAL_ERROR".to_string()),
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::DatabaseError(other.to_string()),
        }
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409() {
        let err = AppError::ResourceConflict {
            resource: "driver".to_string(),
            blocking_trip_id: Uuid::nil(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_assigned_driver_maps_to_403() {
        let err = AppError::NotAssignedDriver("driver X".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_helper_includes_id() {
        let err = not_found_error("Trip", "abc");
        assert!(err.to_string().contains("abc"));
    }
}
