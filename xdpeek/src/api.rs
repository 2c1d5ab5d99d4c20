use crate::stats::Stats;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub stats: Stats,
    pub registry: Registry,
    pub interface: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(stats: Stats, interface: String) -> Self {
        let mut registry = Registry::default();
        stats.register(&mut registry);
        Self {
            stats,
            registry,
            interface,
            start_time: Instant::now(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    interface: String,
    uptime_seconds: u64,
    records: u64,
    lost: u64,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        interface: state.interface.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        records: state.stats.total_records(),
        lost: state.stats.lost.get(),
    })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut buf = String::new();
    if let Err(e) = encode(&mut buf, &state.registry) {
        tracing::error!("failed to encode metrics: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buf,
    )
        .into_response()
}

/// Serve the router until the process exits.
pub async fn serve(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Metrics on http://0.0.0.0:{}/metrics", port);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdpeek_common::Protocol;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Stats::default(), "lo".to_string()))
    }

    #[tokio::test]
    async fn test_health_reports_counters() {
        let state = state();
        state.stats.record(Protocol::Tcp, 60);
        state.stats.lost.inc_by(2);

        let Json(health) = get_health(State(state)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.interface, "lo");
        assert_eq!(health.records, 1);
        assert_eq!(health.lost, 2);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders_registry() {
        let state = state();
        state.stats.record(Protocol::Udp, 128);

        let response = get_metrics(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("xdpeek_records_total{protocol=\"Udp\"} 1"));
        assert!(text.contains("xdpeek_bytes_total 128"));
    }
}
