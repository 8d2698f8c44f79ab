use crate::{
    config::AppConfig,
    error::{Result, ServiceError},
    query::{SchemaInfo, TranslateRequest, TranslateResponse},
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
}

impl Server {
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let state = AppState::new(Arc::clone(&config));
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(Self::health))
            .route("/api/schema", get(Self::schema))
            .route("/translate", post(Self::translate))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, table = %self.config.table, "mvr-query listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    async fn health() -> Json<serde_json::Value> {
        Json(json!({ "status": "ok" }))
    }

    async fn schema(
        State(state): State<AppState>,
        headers: HeaderMap,
    ) -> Result<Json<SchemaInfo>> {
        enforce_api_key(&headers, &state.config)?;
        Ok(Json(state.query.schema_info()?))
    }

    async fn translate(
        State(state): State<AppState>,
        headers: HeaderMap,
        payload: std::result::Result<Json<TranslateRequest>, JsonRejection>,
    ) -> Result<Json<TranslateResponse>> {
        enforce_api_key(&headers, &state.config)?;
        let Json(request) =
            payload.map_err(|rejection| ServiceError::InvalidRequest(rejection.body_text()))?;
        let response = state.query.translate(request)?;
        debug!(mode = response.mode, params = response.params.len(), "translated query");
        Ok(Json(response))
    }
}

fn enforce_api_key(headers: &HeaderMap, config: &AppConfig) -> Result<()> {
    if let Some(expected) = &config.api_key {
        let provided = headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());

        if provided != Some(expected.as_str()) {
            return Err(ServiceError::Auth);
        }
    }

    Ok(())
}
