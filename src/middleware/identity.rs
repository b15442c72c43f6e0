//! Identidad del llamante desde headers
//!
//! El colaborador de identidad (gateway/auth) ya validó las credenciales
//! y propaga rol e identidad de conductor en headers. Aquí solo se
//! parsean; el despacho confía en ellos sin re-validar.

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::models::caller::{CallerContext, CallerRole};
use crate::utils::errors::{AppError, AppResult};

pub const ROLE_HEADER: &str = "x-caller-role";
pub const DRIVER_HEADER: &str = "x-caller-driver-id";

pub fn caller_from_headers(headers: &HeaderMap) -> AppResult<CallerContext> {
    let role_raw = headers
        .get(ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized(format!("missing {} header", ROLE_HEADER))
        })?;
    let role = CallerRole::parse(role_raw)?;

    let driver_id = match headers.get(DRIVER_HEADER).and_then(|v| v.to_str().ok()) {
        Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
            AppError::ValidationError(format!("{} is not a valid UUID", DRIVER_HEADER))
        })?),
        None => None,
    };

    Ok(CallerContext::new(role, driver_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_coordinator_without_driver_id() {
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_static("coordinator"));
        let ctx = caller_from_headers(&headers).unwrap();
        assert!(ctx.ensure_dispatcher().is_ok());
        assert!(ctx.driver_id.is_none());
    }

    #[test]
    fn parses_driver_with_id() {
        let driver_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_static("driver"));
        headers.insert(
            DRIVER_HEADER,
            HeaderValue::from_str(&driver_id.to_string()).unwrap(),
        );
        let ctx = caller_from_headers(&headers).unwrap();
        assert_eq!(ctx.ensure_driver().unwrap(), driver_id);
    }

    #[test]
    fn missing_role_is_unauthorized() {
        let headers = HeaderMap::new();
        assert!(matches!(
            caller_from_headers(&headers),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn malformed_driver_id_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_static("driver"));
        headers.insert(DRIVER_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            caller_from_headers(&headers),
            Err(AppError::ValidationError(_))
        ));
    }
}
