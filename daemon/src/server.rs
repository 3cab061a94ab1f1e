//! HTTP trigger and admin API
//!
//! `POST /api/tick` runs one coordinator pass immediately; the rest manages
//! wallets and exposes state for a dashboard.

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use swapcycle_core::{Error, WalletConfig};
use swapcycle_engine::{wallet_balances, Coordinator, TickOutcome, WalletService};
use swapcycle_networking::{ChainRegistry, PriceFeed};
use swapcycle_persistence::sqlite::{self, BOT_ENABLED_KEY};
use swapcycle_persistence::Database;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<Database>,
    pub wallets: Arc<WalletService>,
    pub coordinator: Arc<Coordinator>,
    pub networks: Arc<ChainRegistry>,
    pub prices: Arc<PriceFeed>,
    pub api_token: Option<String>,
}

/// Domain errors mapped onto HTTP status codes
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::WalletNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidData(_)
        | Error::InvalidTradeParameters(_)
        | Error::InvalidSigningKey(_)
        | Error::TokenNotSelected(_)
        | Error::ConfigMissing(_)
        | Error::UnknownNetwork(_) => StatusCode::BAD_REQUEST,
        Error::RpcUnavailable(_) | Error::NetworkError(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!("API error: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(handle_status))
        .route("/api/tick", post(handle_tick))
        .route("/api/coordinator/start", post(handle_start))
        .route("/api/coordinator/stop", post(handle_stop))
        .route("/api/wallets", get(handle_list_wallets))
        .route("/api/wallets/generate", post(handle_generate_wallets))
        .route("/api/wallets/import", post(handle_import_wallet))
        .route(
            "/api/wallets/{id}",
            get(handle_get_wallet)
                .patch(handle_update_wallet)
                .delete(handle_delete_wallet),
        )
        .route(
            "/api/wallets/{id}/config",
            get(handle_get_config).put(handle_save_config),
        )
        .route("/api/wallets/{id}/strategy", get(handle_strategy))
        .route("/api/wallets/{id}/balances", get(handle_balances))
        .route("/api/logs", get(handle_logs))
        .route("/api/trades", get(handle_trades))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `Authorization: Bearer <token>` when a token is configured
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

async fn auth_middleware(
    State(state): State<ApiState>,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    match &state.api_token {
        None => next.run(req).await,
        Some(expected) if bearer_token(req.headers()) == Some(expected.as_str()) => {
            next.run(req).await
        }
        Some(_) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response(),
    }
}

// ─── Coordinator ───────────────────────────────────────────────────

async fn handle_status(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let status = state.coordinator.status().await;
    Json(serde_json::json!({
        "coordinator": status,
        "networks": state.networks.names(),
    }))
}

/// POST /api/tick — run one pass now
async fn handle_tick(State(state): State<ApiState>) -> Json<TickOutcome> {
    Json(state.coordinator.tick().await)
}

async fn handle_start(State(state): State<ApiState>) -> ApiResult<serde_json::Value> {
    sqlite::set_setting(state.db.pool(), BOT_ENABLED_KEY, "true").await?;
    let started = state.coordinator.start().await;
    info!("Coordinator start requested via API (started: {})", started);
    Ok(Json(serde_json::json!({ "started": started })))
}

async fn handle_stop(State(state): State<ApiState>) -> ApiResult<serde_json::Value> {
    sqlite::set_setting(state.db.pool(), BOT_ENABLED_KEY, "false").await?;
    let stopped = state.coordinator.stop().await;
    info!("Coordinator stop requested via API (stopped: {})", stopped);
    Ok(Json(serde_json::json!({ "stopped": stopped })))
}

// ─── Wallets ───────────────────────────────────────────────────────

async fn handle_list_wallets(State(state): State<ApiState>) -> ApiResult<serde_json::Value> {
    let wallets = state.wallets.list().await?;
    Ok(Json(serde_json::json!({ "wallets": wallets })))
}

#[derive(Deserialize)]
struct GeneratePayload {
    count: u32,
}

async fn handle_generate_wallets(
    State(state): State<ApiState>,
    Json(body): Json<GeneratePayload>,
) -> ApiResult<serde_json::Value> {
    let wallets = state.wallets.generate(body.count).await?;
    Ok(Json(serde_json::json!({ "wallets": wallets })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportPayload {
    private_key: String,
    #[serde(default)]
    name: Option<String>,
}

async fn handle_import_wallet(
    State(state): State<ApiState>,
    Json(body): Json<ImportPayload>,
) -> ApiResult<serde_json::Value> {
    let wallet = state
        .wallets
        .import(&body.private_key, body.name.as_deref())
        .await?;
    Ok(Json(serde_json::json!({ "wallet": wallet })))
}

async fn handle_get_wallet(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    let wallet = state.wallets.get(id).await?;
    Ok(Json(serde_json::json!({ "wallet": wallet })))
}

#[derive(Deserialize)]
struct UpdateWalletPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    active: Option<bool>,
}

async fn handle_update_wallet(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateWalletPayload>,
) -> ApiResult<serde_json::Value> {
    let mut wallet = state.wallets.get(id).await?;
    if let Some(name) = body.name {
        wallet = state.wallets.rename(id, &name).await?;
    }
    if let Some(active) = body.active {
        wallet = state.wallets.set_active(id, active).await?;
    }
    Ok(Json(serde_json::json!({ "wallet": wallet })))
}

async fn handle_delete_wallet(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.wallets.remove(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

async fn handle_get_config(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<WalletConfig> {
    Ok(Json(state.wallets.config(id).await?))
}

async fn handle_save_config(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(mut config): Json<WalletConfig>,
) -> ApiResult<WalletConfig> {
    config.wallet_id = id;
    Ok(Json(state.wallets.save_config(config).await?))
}

async fn handle_strategy(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.wallets.get(id).await?;
    let strategy = state.wallets.strategy(id).await?;
    let progress = state.wallets.progress(id).await?;
    Ok(Json(serde_json::json!({
        "strategy": strategy,
        "progress": progress,
    })))
}

async fn handle_balances(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    let wallet = state.wallets.get(id).await?;
    let config = state.wallets.config(id).await?;
    let network = state.networks.get(&config.selected_network)?;

    let balances = wallet_balances(network, &state.prices, &wallet.address, &config).await?;
    Ok(Json(serde_json::json!({
        "walletId": id,
        "symbol": network.config.symbol,
        "balances": balances,
    })))
}

// ─── History ───────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    #[serde(default)]
    wallet_id: Option<i64>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    offset: Option<u32>,
}

impl HistoryQuery {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(100).clamp(1, 1000)
    }
}

async fn handle_logs(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<serde_json::Value> {
    let logs = sqlite::list_logs(state.db.pool(), query.wallet_id, query.limit()).await?;
    Ok(Json(serde_json::json!({ "logs": logs })))
}

async fn handle_trades(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<serde_json::Value> {
    let trades = sqlite::list_trades(
        state.db.pool(),
        query.wallet_id,
        query.limit(),
        query.offset.unwrap_or(0),
    )
    .await?;
    Ok(Json(serde_json::json!({ "trades": trades })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_for(&Error::WalletNotFound("7".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&Error::InvalidTradeParameters("min > max".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::RpcUnavailable("down".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&Error::DatabaseError("locked".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_history_limit_clamped() {
        let q = HistoryQuery {
            wallet_id: None,
            limit: Some(0),
            offset: None,
        };
        assert_eq!(q.limit(), 1);
        let q = HistoryQuery {
            wallet_id: None,
            limit: None,
            offset: None,
        };
        assert_eq!(q.limit(), 100);
    }
}
