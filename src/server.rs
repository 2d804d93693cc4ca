//! HTTP server: read-only table proxy plus song recommendations

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    lookup_title, Feature, FuzzyTitleResolver, RecommendError, RecommendedSong,
    SharedRecommendEngine, SourceError, TableSource, TitleLookup, TitleMatch, TitleResolver,
    WeightVector, DEFAULT_RECOMMENDATIONS, MAX_TITLE_CHARS,
};

/// Upper bound on `n` for one recommendation request
pub const MAX_RECOMMENDATIONS: usize = 100;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn TableSource>,
    pub allowed_tables: Arc<HashSet<String>>,
    /// `None` when the catalog could not be loaded at startup
    pub engine: Option<SharedRecommendEngine>,
    pub resolver: Arc<dyn TitleResolver>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn TableSource>,
        allowed_tables: impl IntoIterator<Item = String>,
        engine: Option<SharedRecommendEngine>,
    ) -> Self {
        Self {
            source,
            allowed_tables: Arc::new(allowed_tables.into_iter().collect()),
            engine,
            resolver: Arc::new(FuzzyTitleResolver::new()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<TitleMatch>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            suggestion: None,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(error)))
}

fn api_error_with_details(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> ApiError {
    let mut body = ErrorResponse::new(error);
    body.details = Some(details.into());
    (status, Json(body))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub catalog_songs: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequestHttp {
    pub title: String,
    /// Missing features keep the default weight
    #[serde(default)]
    pub weights: HashMap<Feature, f64>,
    pub n: Option<usize>,
    /// Use the resolver's suggestion instead of failing on a misspelled title
    #[serde(default)]
    pub auto_correct: bool,
    #[serde(default)]
    pub explain: bool,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_from: Option<String>,
    pub recommendations: Vec<RecommendedSong>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub input: String,
    pub title: String,
    pub score: u8,
    pub exact: bool,
}

async fn home_handler() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to the songlike API! Use /get_data/<table_name> to query data."
            .to_string(),
    })
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "songlike".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        catalog_songs: state.engine.as_ref().map(|e| e.catalog().len()),
    })
}

/// Return every row of an allow-listed table
async fn get_data_handler(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> Result<Response, ApiError> {
    if !state.allowed_tables.contains(&table_name) {
        warn!("Rejected request for table '{}'", table_name);
        return Err(api_error(StatusCode::FORBIDDEN, "Unauthorized access to table"));
    }

    info!("Fetching table '{}' from {}", table_name, state.source.name());

    match state.source.fetch_table(&table_name).await {
        Ok(rows) if rows.is_empty() => Ok(Json(MessageResponse {
            message: "No data found in the table.".to_string(),
        })
        .into_response()),
        Ok(rows) => {
            info!("Returning {} rows from '{}'", rows.len(), table_name);
            Ok(Json(rows).into_response())
        }
        Err(e @ SourceError::Query(_)) => {
            error!("Query on '{}' failed: {}", table_name, e);
            Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()))
        }
        Err(e) => {
            error!("Fetching '{}' failed: {:?}", table_name, e);
            Err(api_error_with_details(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An unexpected error occurred: {}", e),
                format!("source: {}", state.source.name()),
            ))
        }
    }
}

fn engine_or_unavailable(state: &AppState) -> Result<&SharedRecommendEngine, ApiError> {
    state.engine.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Song catalog is not loaded",
        )
    })
}

fn check_title(title: &str) -> Result<(), ApiError> {
    let len = title.chars().count();
    if len > MAX_TITLE_CHARS {
        return Err(api_error_with_details(
            StatusCode::BAD_REQUEST,
            "Title is too long",
            format!("{} characters, at most {} allowed", len, MAX_TITLE_CHARS),
        ));
    }
    Ok(())
}

/// Title lookup on the blocking pool; a miss scores every catalog title
async fn lookup_off_runtime(
    engine: &SharedRecommendEngine,
    resolver: &Arc<dyn TitleResolver>,
    title: &str,
) -> Result<TitleLookup, ApiError> {
    let engine = Arc::clone(engine);
    let resolver = Arc::clone(resolver);
    let title = title.to_string();
    tokio::task::spawn_blocking(move || lookup_title(engine.catalog(), resolver.as_ref(), &title))
        .await
        .map_err(|e| {
            error!("Title lookup task failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Title lookup failed")
        })
}

fn not_found(title: &str, suggestion: Option<TitleMatch>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: RecommendError::NotFound(title.to_string()).to_string(),
            details: None,
            suggestion,
        }),
    )
}

/// Songs like the requested one
async fn recommend_handler(
    State(state): State<AppState>,
    Json(req): Json<RecommendRequestHttp>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let engine = engine_or_unavailable(&state)?;
    check_title(&req.title)?;

    let weights = WeightVector::from_overrides(&req.weights).map_err(|e| {
        api_error_with_details(StatusCode::BAD_REQUEST, "Invalid weights", e.to_string())
    })?;
    let n = req.n.unwrap_or(DEFAULT_RECOMMENDATIONS);
    if n == 0 {
        return Err(api_error(StatusCode::BAD_REQUEST, "n must be at least 1"));
    }
    let n = n.min(MAX_RECOMMENDATIONS);

    info!("Received recommend request: title='{}', n={}", req.title, n);

    let (query, corrected_from) =
        match lookup_off_runtime(engine, &state.resolver, &req.title).await? {
            TitleLookup::Exact(title) => (title, None),
            TitleLookup::Suggestion(m) if req.auto_correct => {
                info!(
                    "Corrected '{}' to '{}' ({} resolver, score {})",
                    req.title,
                    m.title,
                    state.resolver.name(),
                    m.score
                );
                (m.title, Some(req.title.clone()))
            }
            TitleLookup::Suggestion(m) => return Err(not_found(&req.title, Some(m))),
            TitleLookup::NoMatch => return Err(not_found(&req.title, None)),
        };

    let result = if req.explain {
        engine.recommend_scored(&query, &weights, n)
    } else {
        engine.recommend(&query, &weights, n)
    };

    match result {
        Ok(recommendations) => {
            info!("Recommended {} songs for '{}'", recommendations.len(), query);
            Ok(Json(RecommendResponse {
                query,
                corrected_from,
                recommendations,
            }))
        }
        Err(RecommendError::NotFound(title)) => Err(not_found(&title, None)),
    }
}

/// Closest known title for free text
async fn resolve_handler(
    State(state): State<AppState>,
    Query(params): Query<ResolveParams>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let engine = engine_or_unavailable(&state)?;
    check_title(&params.title)?;

    match lookup_off_runtime(engine, &state.resolver, &params.title).await? {
        TitleLookup::Exact(title) => Ok(Json(ResolveResponse {
            input: params.title,
            title,
            score: 100,
            exact: true,
        })),
        TitleLookup::Suggestion(m) => Ok(Json(ResolveResponse {
            input: params.title,
            title: m.title,
            score: m.score,
            exact: false,
        })),
        TitleLookup::NoMatch => Err(not_found(&params.title, None)),
    }
}

/// Create and configure the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/get_data/:table_name", get(get_data_handler))
        .route("/recommend", post(recommend_handler))
        .route("/resolve", get(resolve_handler))
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(state: AppState, addr: &str) -> anyhow::Result<()> {
    info!("Starting songlike server on {}", addr);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
