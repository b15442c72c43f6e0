mod config;
mod controllers;
mod database;
mod dto;
mod middleware;
mod models;
mod repositories;
mod routes;
mod services;
mod state;
mod utils;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use dotenvy::dotenv;
use serde_json::json;
use std::net::SocketAddr;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use config::environment::EnvironmentConfig;
use database::create_pool;
use middleware::cors::{cors_middleware, cors_middleware_with_origins};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("🚌 Passenger Dispatch - Trip Dispatch & Assignment");
    info!("==================================================");

    // Inicializar base de datos
    let pool = match create_pool(None).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };

    let config = EnvironmentConfig::default();
    info!("⚙️ Entorno: {}", config.environment);

    // CORS abierto en desarrollo, restringido si hay orígenes configurados
    let cors = if config.cors_origins.is_empty() {
        cors_middleware()
    } else {
        cors_middleware_with_origins(config.cors_origins.clone())
    };

    let host = config.host.clone();
    let port = config.port;
    let app_state = AppState::new(pool, config);

    let app = Router::new()
        .route("/health", get(health_endpoint))
        .nest("/api/dispatch", routes::dispatch_routes::create_dispatch_router())
        .nest("/api/driver", routes::driver_routes::create_driver_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Health check");
    info!("🗓️ Endpoints de despacho:");
    info!("   GET  /api/dispatch/pending - Cola de trips pendientes");
    info!("   GET  /api/dispatch/dashboard - Dashboard diario por sucursal");
    info!("   GET  /api/dispatch/trips/:id - Detalle de trip");
    info!("   GET  /api/dispatch/trips/:id/suggestions - Candidatos rankeados");
    info!("   GET  /api/dispatch/availability/drivers/:id - Disponibilidad de conductor");
    info!("   GET  /api/dispatch/availability/vehicles/:id - Disponibilidad de vehículo");
    info!("   POST /api/dispatch/assign - Asignar conductor y vehículo");
    info!("   POST /api/dispatch/reassign - Reasignar conductor y vehículo");
    info!("   POST /api/dispatch/trips/:id/unassign - Desasignar trip");
    info!("   POST /api/dispatch/trips/:id/cancel - Cancelar trip");
    info!("   POST /api/dispatch/incidents/:id/resolve - Resolver incidente");
    info!("🚐 Endpoints del conductor:");
    info!("   POST /api/driver/trips/:id/accept - Aceptar trip asignado");
    info!("   POST /api/driver/trips/:id/start - Iniciar trip");
    info!("   POST /api/driver/trips/:id/complete - Completar trip");
    info!("   POST /api/driver/incidents - Reportar incidente");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("❌ Error del servidor: {}", e);
            anyhow::anyhow!("Server error: {}", e)
        })?;

    info!("👋 Servidor terminado");
    Ok(())
}

/// Health check del servicio
async fn health_endpoint() -> Json<serde_json::Value> {
    Json(json!({
        "service": "passenger-dispatch",
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
