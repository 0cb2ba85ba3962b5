//! `/health` and `/status` endpoints.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::warn;

use crate::store::PgStore;

pub const SERVICE_NAME: &str = "odds-alerts";

/// Consecutive failed sweeps before `/health` reports `degraded`.
const DEGRADED_AFTER: usize = 5;
/// Consecutive failed sweeps before `/health` answers 503.
const UNAVAILABLE_AFTER: usize = 10;

/// Service health state
#[derive(Clone, Default)]
pub struct HealthState {
    pub last_sweep_time: Arc<RwLock<Option<DateTime<Utc>>>>,
    pub last_sweep_reports: Arc<RwLock<usize>>,
    pub error_count: Arc<RwLock<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSnapshot {
    pub last_sweep: Option<DateTime<Utc>>,
    pub last_sweep_reports: usize,
    pub consecutive_errors: usize,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_success(&self, reports: usize) {
        *self.last_sweep_time.write().await = Some(Utc::now());
        *self.last_sweep_reports.write().await = reports;
        *self.error_count.write().await = 0;
    }

    pub async fn record_error(&self) {
        *self.error_count.write().await += 1;
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            last_sweep: *self.last_sweep_time.read().await,
            last_sweep_reports: *self.last_sweep_reports.read().await,
            consecutive_errors: *self.error_count.read().await,
        }
    }
}

pub fn health_payload(snapshot: &HealthSnapshot, database_ok: bool) -> (StatusCode, Value) {
    let errors = snapshot.consecutive_errors;

    let status = if !database_ok || errors > DEGRADED_AFTER {
        "degraded"
    } else {
        "ok"
    };

    let http_status = if !database_ok || errors > UNAVAILABLE_AFTER {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        http_status,
        json!({
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "status": status,
            "database": if database_ok { "connected" } else { "disconnected" },
            "last_sweep": snapshot.last_sweep.map(|t| t.to_rfc3339()),
            "last_sweep_reports": snapshot.last_sweep_reports,
            "consecutive_errors": errors,
        }),
    )
}

/// Shared state behind the health router.
#[derive(Clone)]
pub struct HealthContext {
    pub health: HealthState,
    pub store: PgStore,
    /// Static configuration summary shown on `/status`.
    pub config_summary: Value,
}

pub fn router(ctx: HealthContext) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(ctx)
}

/// Health check handler
async fn health_handler(State(ctx): State<HealthContext>) -> (StatusCode, Json<Value>) {
    let snapshot = ctx.health.snapshot().await;
    let database_ok = ctx.store.ping().await;
    let (status, body) = health_payload(&snapshot, database_ok);
    (status, Json(body))
}

async fn status_handler(State(ctx): State<HealthContext>) -> (StatusCode, Json<Value>) {
    let snapshot = ctx.health.snapshot().await;
    let database_ok = ctx.store.ping().await;
    let (status, mut body) = health_payload(&snapshot, database_ok);

    let statistics = if database_ok {
        match ctx.store.table_counts().await {
            Ok(counts) => json!(counts),
            Err(e) => {
                warn!("Failed to collect table counts: {}", e);
                json!({ "error": e.to_string() })
            }
        }
    } else {
        Value::Null
    };

    body["configuration"] = ctx.config_summary.clone();
    body["statistics"] = statistics;
    body["timestamp"] = json!(Utc::now().to_rfc3339());
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(errors: usize) -> HealthSnapshot {
        HealthSnapshot {
            last_sweep: None,
            last_sweep_reports: 3,
            consecutive_errors: errors,
        }
    }

    #[test]
    fn healthy_service_reports_ok() {
        let (status, body) = health_payload(&snapshot(0), true);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "connected");
        assert_eq!(body["last_sweep_reports"], 3);
        assert!(body["last_sweep"].is_null());
    }

    #[test]
    fn repeated_errors_degrade_then_fail() {
        let (status, body) = health_payload(&snapshot(6), true);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");

        let (status, _) = health_payload(&snapshot(11), true);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn database_outage_is_unavailable() {
        let (status, body) = health_payload(&snapshot(0), false);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["database"], "disconnected");
    }

    #[test]
    fn state_resets_errors_on_success() {
        let health = HealthState::new();
        tokio_test::block_on(async {
            health.record_error().await;
            health.record_error().await;
            assert_eq!(health.snapshot().await.consecutive_errors, 2);

            health.record_success(4).await;
            let snap = health.snapshot().await;
            assert_eq!(snap.consecutive_errors, 0);
            assert_eq!(snap.last_sweep_reports, 4);
            assert!(snap.last_sweep.is_some());
        });
    }
}
