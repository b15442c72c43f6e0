//! Módulo de base de datos
//!
//! Maneja la conexión con PostgreSQL. El DDL de referencia del esquema
//! de despacho vive en migrations/.

pub mod connection;

pub use connection::create_pool;
