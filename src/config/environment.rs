//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y los valores de
//! política del despacho.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    /// Fracción mínima del coste estimado que debe estar cobrada para
    /// poder despachar un booking.
    pub min_deposit_ratio: Decimal,
    /// Política: permitir asignar recursos de otra sucursal aunque el
    /// recurso no tenga el flag cross_branch.
    pub allow_cross_branch: bool,
    /// Días alrededor del trip considerados al medir la carga de trabajo
    /// de un conductor para el ranking.
    pub workload_window_days: i64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            port: env_or("PORT", 3000),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            min_deposit_ratio: env::var("MIN_DEPOSIT_RATIO")
                .ok()
                .and_then(|v| Decimal::from_str(&v).ok())
                .unwrap_or_else(|| Decimal::new(30, 2)),
            allow_cross_branch: env_or("ALLOW_CROSS_BRANCH", false),
            workload_window_days: env_or("WORKLOAD_WINDOW_DAYS", 7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        let config = EnvironmentConfig::default();
        assert_eq!(config.min_deposit_ratio, Decimal::new(30, 2));
        assert_eq!(config.workload_window_days, 7);
    }
}
