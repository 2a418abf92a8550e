//! REST API server for the ticker digest
//!
//! `GET /` aggregates all categories for a ticker. The five category
//! sub-services sit behind the bearer gate. `GET /ret` reads back stored
//! composites.

use axum::{
    extract::{ConnectInfo, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::aggregator::Orchestrator;
use crate::auth::require_bearer;
use crate::config::AppConfig;
use crate::error::AggregatorError;
use crate::fetcher::HttpCategoryFetcher;
use crate::inference::HttpNarrativeModel;
use crate::ingest::HttpIngestor;
use crate::models::{Category, CategoryOutput, QuoteRequest, RawDocument};
use crate::providers::{AnnotationSearch, HttpAnnotationSearch, HttpNewsSource, NoAnnotations, PolygonClient};
use crate::services::{with_timestamp, CategoryServices};
use crate::store::{build_store, InsightStore};

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Failure that still carries a usable result
    pub fn partial<T: Serialize>(data: T, message: String) -> Self {
        Self {
            data: serde_json::to_value(data).ok(),
            ..Self::error(message)
        }
    }
}

impl IntoResponse for AggregatorError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ApiResponse::error(self.to_string()))).into_response()
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub services: Arc<CategoryServices>,
    pub store: Arc<dyn InsightStore>,
}

/// Wire every collaborator from configuration
pub fn build_state(config: Arc<AppConfig>) -> crate::Result<ApiState> {
    let timeout = config.upstream_timeout;

    let polygon = Arc::new(PolygonClient::new(
        config.polygon_api_key.clone(),
        config.polygon_base_url.clone(),
        timeout,
    )?);
    let news = Arc::new(HttpNewsSource::new(config.news_search_url.clone(), timeout)?);
    let services = Arc::new(CategoryServices::new(polygon.clone(), polygon, news));

    let search: Arc<dyn AnnotationSearch> = match config.search_url.as_deref() {
        Some(url) => Arc::new(HttpAnnotationSearch::new(url, config.pass_hash.clone(), timeout)?),
        None => Arc::new(NoAnnotations),
    };

    let store = build_store(&config);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&config),
        Arc::new(HttpCategoryFetcher::new(Arc::clone(&config))?),
        Arc::new(HttpNarrativeModel::new(
            config.llm_url.clone(),
            config.pass_hash.clone(),
            timeout,
        )?),
        search,
        Arc::new(HttpIngestor::new(
            config.ingestor_url.clone(),
            config.pass_hash.clone(),
            timeout,
        )?),
        Arc::clone(&store),
    ));

    Ok(ApiState {
        config,
        orchestrator,
        services,
        store,
    })
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Aggregate Endpoint
/// =============================

async fn aggregate(
    State(state): State<ApiState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(req): Query<QuoteRequest>,
) -> Response {
    let request_ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match state.orchestrator.handle(req, &request_ip).await {
        Ok(outcome) => match outcome.persistence_error {
            None => (StatusCode::OK, Json(ApiResponse::success(outcome.inference))).into_response(),
            Some(e) => {
                error!(ticker = %outcome.inference.ticker, "Persistence failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::partial(outcome.inference, e.to_string())),
                )
                    .into_response()
            }
        },
        Err(e) => {
            if !e.is_request_level() {
                error!("Aggregate request failed: {}", e);
            }
            e.into_response()
        }
    }
}

/// =============================
/// Category Sub-services
/// =============================

async fn serve_category(state: ApiState, category: Category, req: QuoteRequest) -> Response {
    let ticker = req.ticker.trim();
    if ticker.is_empty() {
        return AggregatorError::MissingParameter("ticker".to_string()).into_response();
    }

    let text = match state.services.render(category, ticker).await {
        Ok(text) => text,
        Err(e) => {
            warn!(category = %category, ticker = %ticker, "Category service failed: {}", e);
            return e.into_response();
        }
    };

    let raw_key = state.config.write_keys.raw.as_deref();
    if raw_key.is_some() && req.write_key() == raw_key {
        let doc = RawDocument {
            category,
            ticker: ticker.to_string(),
            output: CategoryOutput { result: text.clone() },
        };
        match state.store.insert_raw_if_absent(&doc).await {
            Ok(true) => info!(category = %category, ticker = %ticker, "Stored raw document"),
            Ok(false) => {
                return AggregatorError::Duplicate(format!("{} document for {}", category.tag(), ticker))
                    .into_response();
            }
            Err(e) => return e.into_response(),
        }
    }

    Json(CategoryOutput {
        result: with_timestamp(&text),
    })
    .into_response()
}

async fn stk(State(state): State<ApiState>, Query(req): Query<QuoteRequest>) -> Response {
    serve_category(state, Category::Price, req).await
}

async fn fin(State(state): State<ApiState>, Query(req): Query<QuoteRequest>) -> Response {
    serve_category(state, Category::Financials, req).await
}

async fn news(State(state): State<ApiState>, Query(req): Query<QuoteRequest>) -> Response {
    serve_category(state, Category::News, req).await
}

async fn desc(State(state): State<ApiState>, Query(req): Query<QuoteRequest>) -> Response {
    serve_category(state, Category::Description, req).await
}

async fn ta(State(state): State<ApiState>, Query(req): Query<QuoteRequest>) -> Response {
    serve_category(state, Category::TechnicalAnalysis, req).await
}

/// =============================
/// Retrieval Endpoint
/// =============================

async fn retrieve(State(state): State<ApiState>, Query(req): Query<QuoteRequest>) -> Response {
    let ticker = req.ticker.trim();
    if ticker.is_empty() {
        return AggregatorError::MissingParameter("ticker".to_string()).into_response();
    }

    match state.store.find_inference(ticker).await {
        Ok(Some(inference)) => Json(inference).into_response(),
        Ok(None) => Json(serde_json::json!({})).into_response(),
        Err(e) => e.into_response(),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    let sub_services = Router::new()
        .route("/stk", get(stk))
        .route("/fin", get(fin))
        .route("/news", get(news))
        .route("/desc", get(desc))
        .route("/ta", get(ta))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            require_bearer,
        ));

    Router::new()
        .route("/", get(aggregate))
        .route("/ret", get(retrieve))
        .route("/health", get(health))
        .merge(sub_services)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(state: ApiState) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let port = state.config.port;
    let store = Arc::clone(&state.store);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    store.close().await;
    info!("API Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
