//! Axum-based HTTP façade over the router kernel.
//!
//! Maps terminal routing outcomes onto the wire contract: 200 for a
//! success, 400 for an empty prompt, 503 when every provider is exhausted,
//! 500 for anything unexpected. Request bodies are size-limited and every
//! request carries a server-side timeout.

use crate::config::Config;
use crate::journal::{sibling_options, JsonFileStore};
use crate::ledger::UsageLedger;
use crate::providers;
use crate::router::types::{
    GenerationRequest, ResponseEntry, ResponseJournal, RouteOutcome,
};
use crate::router::RouterKernel;
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use uuid::Uuid;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RouterKernel>,
    /// User-visible response history, distinct from the router's internal
    /// attempt journal.
    pub history: Arc<JsonFileStore>,
    /// The router's internal attempt journal; held here so the
    /// maintenance sweep can age-roll it.
    pub attempts: Arc<JsonFileStore>,
}

/// Assemble the application state from a validated config.
pub fn build_state(config: &Config) -> Result<AppState> {
    let provider_chain = providers::build_providers(config)?;
    let ledger = Arc::new(UsageLedger::new(config.router.provider_limits.clone()));

    let history = Arc::new(JsonFileStore::new(config.journal.clone()));
    let attempts = Arc::new(JsonFileStore::new(sibling_options(
        &config.journal,
        "-attempts",
    )));

    let router = Arc::new(RouterKernel::new(
        provider_chain,
        ledger,
        Arc::clone(&attempts),
        config.router.clone(),
    ));

    Ok(AppState {
        router,
        history,
        attempts,
    })
}

/// Build the axum application with middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_liveness))
        .route("/api/ai/generate", post(handle_generate))
        .route("/api/ai/status", get(handle_status))
        .route("/api/ai/spend", get(handle_spend))
        .route("/api/ai/health", post(handle_provider_health))
        .route("/api/ai/history", get(handle_history))
        .route("/api/ai/rollover", post(handle_rollover))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Run the HTTP gateway.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_port = listener.local_addr()?.port();

    let state = build_state(&config)?;
    state.history.ensure_file().await?;
    state.attempts.ensure_file().await?;

    spawn_maintenance(state.clone(), config.router.health_check_interval_secs);

    println!("🚦 promptgate listening on http://{host}:{actual_port}");
    println!("  POST /api/ai/generate  - {{\"prompt\": \"...\"}}");
    println!("  GET  /api/ai/status    - provider health + usage");
    println!("  GET  /api/ai/spend     - today's aggregate cost");
    println!("  GET  /api/ai/history   - response journal");
    println!("  Press Ctrl+C to stop.\n");

    let app = app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install ctrl-c handler: {e}");
    }
    tracing::info!("Shutdown signal received");
}

/// Periodic sweep: age/size-roll both journal documents even when the
/// gateway is idle, and snapshot provider status for the logs.
fn spawn_maintenance(state: AppState, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // The immediate first tick would sweep before anything happened
        ticker.tick().await;

        loop {
            ticker.tick().await;

            for store in [&state.history, &state.attempts] {
                match store.rollover_if_needed().await {
                    Ok(Some(archived)) => {
                        tracing::info!(archive = %archived.display(), "Scheduled journal rollover");
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Scheduled rollover check failed: {e}"),
                }
            }

            let statuses = state.router.provider_status().await;
            let healthy = statuses.iter().filter(|s| s.is_healthy).count();
            let report = state.router.ledger().weekly_report();
            tracing::debug!(
                healthy,
                total = statuses.len(),
                weekly_requests = report.total_requests,
                weekly_cost = report.total_cost,
                "Maintenance sweep complete"
            );
        }
    });
}

// ═════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ═════════════════════════════════════════════════════════════════════════

/// GET /health - process liveness, always public
async fn handle_liveness() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now(),
    }))
}

/// POST /api/ai/generate - route a prompt through the provider chain
async fn handle_generate(
    State(state): State<AppState>,
    body: Result<Json<GenerationRequest>, axum::extract::rejection::JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => {
            let err = serde_json::json!({
                "success": false,
                "error": format!("Invalid JSON: {e}. Expected: {{\"prompt\": \"...\"}}"),
            });
            return (StatusCode::BAD_REQUEST, Json(err));
        }
    };

    if request.prompt.trim().is_empty() {
        let err = serde_json::json!({
            "success": false,
            "error": "Prompt must not be empty",
        });
        return (StatusCode::BAD_REQUEST, Json(err));
    }

    let options = request.options();
    let outcome = state.router.route(&request.prompt, options).await;
    append_history(&state, &request, &outcome).await;

    match outcome {
        RouteOutcome::Success {
            content,
            provider,
            cost,
            duration_ms,
        } => {
            tracing::info!(provider, cost, duration_ms, "Generation succeeded");
            let body = serde_json::json!({
                "success": true,
                "content": content,
                "provider": provider,
                "cost": cost,
                "duration": duration_ms,
            });
            (StatusCode::OK, Json(body))
        }
        RouteOutcome::Failure {
            error,
            failed_providers,
            total_attempted_cost,
            duration_ms,
        } => {
            tracing::warn!(
                ?failed_providers,
                total_attempted_cost,
                duration_ms,
                "Generation failed on every provider"
            );
            let body = serde_json::json!({
                "success": false,
                "error": error,
                "failedProviders": failed_providers,
                "totalAttemptedCost": total_attempted_cost,
                "duration": duration_ms,
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body))
        }
    }
}

/// Append the user-visible outcome to the history document (best-effort).
async fn append_history(state: &AppState, request: &GenerationRequest, outcome: &RouteOutcome) {
    if !state.history.enabled() {
        return;
    }

    let entry = match outcome {
        RouteOutcome::Success {
            content,
            provider,
            cost,
            duration_ms,
        } => ResponseEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            prompt: request.prompt.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            model: request.model.clone(),
            success: true,
            provider: provider.clone(),
            content: content.clone(),
            error: String::new(),
            cost: *cost,
            duration_ms: *duration_ms,
        },
        RouteOutcome::Failure {
            error,
            total_attempted_cost,
            duration_ms,
            ..
        } => ResponseEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            prompt: request.prompt.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            model: request.model.clone(),
            success: false,
            provider: String::new(),
            content: String::new(),
            error: error.clone(),
            cost: *total_attempted_cost,
            duration_ms: *duration_ms,
        },
    };

    let mut document = match state.history.load::<ResponseJournal>().await {
        Ok(Some(document)) => document,
        Ok(None) => ResponseJournal::default(),
        Err(e) => {
            tracing::warn!("History unreadable, starting a fresh document: {e}");
            ResponseJournal::default()
        }
    };
    document.append(entry);

    if let Err(e) = state.history.write(&document).await {
        tracing::warn!("Failed to append to response history: {e}");
    }
}

/// GET /api/ai/status - per-provider health and usage
async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let statuses = state.router.provider_status().await;
    Json(statuses)
}

/// GET /api/ai/spend - today's aggregate cost across providers
async fn handle_spend(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.router.today_spend())
}

/// POST /api/ai/health - provider-chain health verdict
async fn handle_provider_health(State(state): State<AppState>) -> impl IntoResponse {
    let statuses = state.router.provider_status().await;
    let healthy = statuses.iter().filter(|s| s.is_healthy).count();
    let total = statuses.len();

    Json(serde_json::json!({
        "status": if healthy > 0 { "Healthy" } else { "Unhealthy" },
        "healthyProviders": healthy,
        "totalProviders": total,
        "timestamp": Utc::now(),
    }))
}

/// GET /api/ai/history - the user-visible response journal
async fn handle_history(State(state): State<AppState>) -> impl IntoResponse {
    match state.history.load::<ResponseJournal>().await {
        Ok(Some(document)) => (StatusCode::OK, Json(document)),
        Ok(None) => (StatusCode::OK, Json(ResponseJournal::default())),
        Err(e) => {
            tracing::error!("Failed to read response history: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ResponseJournal::default()),
            )
        }
    }
}

/// POST /api/ai/rollover - archive the history document now
async fn handle_rollover(State(state): State<AppState>) -> impl IntoResponse {
    match state.history.force_rollover().await {
        Ok(Some(archived)) => {
            tracing::info!(archive = %archived.display(), "Forced history rollover");
            let body = serde_json::json!({
                "message": format!("History rolled over to {}", archived.display()),
            });
            (StatusCode::OK, Json(body))
        }
        Ok(None) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "History journaling is disabled; nothing to roll over",
            })),
        ),
        Err(e) => {
            tracing::error!("Forced rollover failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"message": format!("Rollover failed: {e}")})),
            )
        }
    }
}
