//! Controllers de la API

pub mod dispatch_controller;
pub mod driver_trip_controller;
