//! Here we expose prometheus metrics about dinghook
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl TelemetryEndpointSettings {
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

async fn metrics_handler(Extension(registry): Extension<Registry>) -> impl IntoResponse {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => Ok(([(CONTENT_TYPE, encoder.format_type().to_owned())], buffer)),
        Err(err) => {
            tracing::error!("failed to encode metrics: {:?}", err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub fn router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(Extension(registry))
}

pub async fn run_telemetry_endpoint(
    settings: TelemetryEndpointSettings,
    registry: Registry,
) -> Result<()> {
    axum::Server::bind(&settings.to_socket_addr())
        .serve(router(registry).into_make_service())
        .await
        .context("telemetry endpoint crashed")
}
