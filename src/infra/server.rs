//! HTTP trigger for the scheduled rebuild plus a health probe.

use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::PricingTable;
use crate::infra::{builder::build_and_publish, content::GithubContent, publish::AnyPublisher};
use crate::util::{config::Config, now_rfc3339};

#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub pricing: Arc<PricingTable>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/update", get(update).post(update))
        .route("/api/health", get(health))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: ServerState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// A request is authorised only against a configured, non-empty secret.
fn authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == secret)
}

async fn update(State(state): State<ServerState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers, state.config.cron_secret.as_deref()) {
        tracing::warn!("rejected unauthorised update request");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        );
    }

    match rebuild(&state).await {
        Ok((url, timestamp)) => (
            StatusCode::OK,
            Json(json!({ "success": true, "url": url, "timestamp": timestamp })),
        ),
        Err(err) => {
            tracing::error!(error = %err, "update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}

async fn rebuild(state: &ServerState) -> anyhow::Result<(String, String)> {
    let source = GithubContent::from_config(&state.config)?;
    let publisher = AnyPublisher::from_config(&state.config)?;
    let receipt = build_and_publish(
        &source,
        &state.pricing,
        state.config.fetch_concurrency,
        &publisher,
    )
    .await?;
    Ok((receipt.url, receipt.timestamp))
}

#[derive(Debug, Serialize)]
struct Check {
    status: &'static str,
    detail: &'static str,
}

impl Check {
    fn new(ok: bool, detail: &'static str) -> Self {
        Self {
            status: if ok { "ok" } else { "missing" },
            detail,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthChecks {
    environment: Check,
    #[serde(rename = "cronSecret")]
    cron_secret: Check,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    timestamp: String,
    checks: HealthChecks,
    #[serde(rename = "responseTimeMs")]
    response_time_ms: u128,
}

async fn health(State(state): State<ServerState>) -> (StatusCode, Json<Health>) {
    let started = Instant::now();
    let checks = HealthChecks {
        environment: Check::new(
            state.config.publish_credentials_present(),
            "Publish target credentials",
        ),
        cron_secret: Check::new(state.config.cron_secret.is_some(), "Cron authentication"),
    };
    let healthy = checks.environment.status == "ok" && checks.cron_secret.status == "ok";
    let report = Health {
        status: if healthy { "healthy" } else { "degraded" },
        timestamp: now_rfc3339(),
        checks,
        response_time_ms: started.elapsed().as_millis(),
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}
