//! Identidad del llamante
//!
//! El colaborador de identidad entrega el rol y, para acciones de
//! conductor, la identidad de driver del llamante. El despacho confía en
//! esa identidad sin re-validar credenciales; los chequeos de capacidad
//! viven dentro de cada operación del core, no en la capa de transporte.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::errors::{AppError, AppResult};

/// Rol del llamante según el colaborador de identidad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerRole {
    Admin,
    Coordinator,
    Driver,
}

impl CallerRole {
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Ok(CallerRole::Admin),
            "coordinator" => Ok(CallerRole::Coordinator),
            "driver" => Ok(CallerRole::Driver),
            other => Err(AppError::Unauthorized(format!(
                "unknown caller role '{}'",
                other
            ))),
        }
    }
}

/// Contexto del llamante para las operaciones del core
#[derive(Debug, Clone, Copy)]
pub struct CallerContext {
    pub role: CallerRole,
    pub driver_id: Option<Uuid>,
}

impl CallerContext {
    pub fn new(role: CallerRole, driver_id: Option<Uuid>) -> Self {
        Self { role, driver_id }
    }

    /// Operaciones de despacho (assign/unassign/cancel/resolve) requieren
    /// personal de operaciones.
    pub fn ensure_dispatcher(&self) -> AppResult<()> {
        match self.role {
            CallerRole::Admin | CallerRole::Coordinator => Ok(()),
            CallerRole::Driver => Err(AppError::Unauthorized(
                "driver role cannot perform dispatch operations".to_string(),
            )),
        }
    }

    /// Acciones de conductor requieren identidad de driver.
    pub fn ensure_driver(&self) -> AppResult<Uuid> {
        if self.role != CallerRole::Driver {
            return Err(AppError::Unauthorized(
                "only drivers may perform this action".to_string(),
            ));
        }
        self.driver_id.ok_or_else(|| {
            AppError::Unauthorized("caller has no driver identity".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing() {
        assert_eq!(CallerRole::parse("coordinator").unwrap(), CallerRole::Coordinator);
        assert_eq!(CallerRole::parse(" Admin ").unwrap(), CallerRole::Admin);
        assert!(CallerRole::parse("accountant").is_err());
    }

    #[test]
    fn driver_cannot_dispatch() {
        let ctx = CallerContext::new(CallerRole::Driver, Some(Uuid::new_v4()));
        assert!(ctx.ensure_dispatcher().is_err());
        assert!(ctx.ensure_driver().is_ok());
    }

    #[test]
    fn coordinator_is_not_a_driver() {
        let ctx = CallerContext::new(CallerRole::Coordinator, None);
        assert!(ctx.ensure_dispatcher().is_ok());
        assert!(ctx.ensure_driver().is_err());
    }
}
