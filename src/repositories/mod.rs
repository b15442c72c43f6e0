//! Repositorios de acceso a datos
//!
//! Cada repositorio carga entidades de forma explícita por ID. Las
//! escrituras multi-entidad del despacho viven en AssignmentRepository,
//! que es el único que abre transacciones.

pub mod assignment_repository;
pub mod booking_repository;
pub mod driver_repository;
pub mod incident_repository;
pub mod trip_repository;
pub mod vehicle_repository;
