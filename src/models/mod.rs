//! Modelos del sistema
//!
//! Este módulo contiene las entidades del subsistema de despacho. Las
//! relaciones se expresan por referencia de ID y se cargan de forma
//! explícita por los repositorios (sin grafos de objetos perezosos).

pub mod assignment;
pub mod booking;
pub mod caller;
pub mod driver;
pub mod incident;
pub mod trip;
pub mod vehicle;
