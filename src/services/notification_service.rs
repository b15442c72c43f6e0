//! Puerto de notificaciones
//!
//! El despacho emite eventos "trip assigned" / "trip unassigned" /
//! "incident reported" hacia el colaborador de notificaciones. Es
//! fire-and-forget: un fallo de entrega nunca bloquea ni revierte la
//! operación de despacho, por eso los métodos no devuelven Result.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::incident::IncidentSeverity;

#[async_trait]
pub trait DispatchNotifier: Send + Sync {
    async fn trip_assigned(&self, trip_id: Uuid, driver_id: Uuid, vehicle_id: Uuid);

    async fn trip_unassigned(&self, trip_id: Uuid, reason: &str);

    async fn incident_reported(&self, trip_id: Uuid, driver_id: Uuid, severity: IncidentSeverity);
}

/// Implementación por defecto: registra el evento en el log. La entrega
/// real (websocket/push) es del colaborador de notificaciones.
pub struct LogNotifier;

#[async_trait]
impl DispatchNotifier for LogNotifier {
    async fn trip_assigned(&self, trip_id: Uuid, driver_id: Uuid, vehicle_id: Uuid) {
        tracing::info!(
            "📣 Notificación: trip {} asignado (driver {}, vehicle {})",
            trip_id,
            driver_id,
            vehicle_id
        );
    }

    async fn trip_unassigned(&self, trip_id: Uuid, reason: &str) {
        tracing::info!("📣 Notificación: trip {} desasignado ({})", trip_id, reason);
    }

    async fn incident_reported(&self, trip_id: Uuid, driver_id: Uuid, severity: IncidentSeverity) {
        tracing::warn!(
            "📣 Notificación: incidente {:?} en trip {} reportado por driver {}",
            severity,
            trip_id,
            driver_id
        );
    }
}
