//! Services module
//!
//! Este módulo contiene la lógica de negocio del despacho. Los núcleos de
//! decisión (solape, ranking, validación de asignación, tabla de
//! transiciones) son funciones puras; los servicios cargan datos por los
//! repositorios y delegan en ellas.

pub mod availability_service;
pub mod dashboard_service;
pub mod dispatch_service;
pub mod notification_service;
pub mod ranking_service;
pub mod trip_lifecycle_service;
