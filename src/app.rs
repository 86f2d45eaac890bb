use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;

use crate::ai::{CompletionApi, OpenAiClient};
use crate::error::{AppError, AppResult};
use crate::models::{MediaType, SearchFilters, TrendingWindow};
use crate::recommend;
use crate::search;
use crate::tmdb::{TmdbApi, TmdbClient};

const MAX_BODY_BYTES: usize = 64 * 1024;
const DEFAULT_PORT: u16 = 3000;

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
    pub ai: Option<Arc<dyn CompletionApi>>,
}

pub async fn run_server() -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_env()?);
    let ai: Option<Arc<dyn CompletionApi>> = match OpenAiClient::from_env()? {
        Some(client) => {
            info!("AI recommendations enabled");
            Some(Arc::new(client))
        }
        None => {
            info!("OPENAI_API_KEY not set, recommendations use static tables only");
            None
        }
    };

    let state = AppState { tmdb, ai };
    let app = build_router(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/search", get(handle_search))
        .route("/api/trending", get(handle_trending))
        .route("/api/content/:media_type/:id", get(handle_detail))
        .route("/api/recommendations", post(handle_recommendations))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// All query parameters arrive as strings; numeric ones are parsed by hand so
/// a bad value is a 400 instead of a silent drop.
#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    query: Option<String>,
    #[serde(rename = "type")]
    media_type: Option<String>,
    genre: Option<String>,
    language: Option<String>,
    country: Option<String>,
    platform: Option<String>,
    min_rating: Option<String>,
    year: Option<String>,
}

impl SearchParams {
    fn into_filters(self) -> AppResult<SearchFilters> {
        let min_rating = match self.min_rating.as_deref() {
            Some(raw) => Some(raw.parse::<f32>().map_err(|_| {
                AppError::InvalidInput(format!("min_rating must be a number, got '{raw}'"))
            })?),
            None => None,
        };
        let year = match self.year.as_deref() {
            Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                AppError::InvalidInput(format!("year must be a number, got '{raw}'"))
            })?),
            None => None,
        };
        if let Some(t) = self.media_type.as_deref() {
            if MediaType::parse(t).is_none() {
                return Err(AppError::InvalidInput(format!(
                    "type must be 'movie' or 'tv', got '{t}'"
                )));
            }
        }
        Ok(SearchFilters {
            media_type: self.media_type,
            genre: self.genre,
            language: self.language,
            country: self.country,
            platform: self.platform,
            min_rating,
            year,
        })
    }
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Value>> {
    let query = params
        .query
        .clone()
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("query parameter is required".to_string()))?;
    let filters = params.into_filters()?;

    let results = search::search_content(state.tmdb.as_ref(), &query, &filters)
        .await
        .map_err(AppError::from_upstream)?;

    Ok(Json(json!({
        "success": true,
        "count": results.len(),
        "results": results,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct TrendingParams {
    window: Option<String>,
    page: Option<u32>,
}

async fn handle_trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> AppResult<Json<Value>> {
    let window = match params.window.as_deref() {
        Some(raw) => TrendingWindow::parse(raw).ok_or_else(|| {
            AppError::InvalidInput(format!("window must be 'day' or 'week', got '{raw}'"))
        })?,
        None => TrendingWindow::default(),
    };
    let page = params.page.unwrap_or(1).max(1);

    let results = state
        .tmdb
        .trending(window, page)
        .await
        .map_err(AppError::from_upstream)?;

    Ok(Json(json!({
        "success": true,
        "count": results.len(),
        "results": results,
    })))
}

async fn handle_detail(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(String, i64)>,
) -> AppResult<Json<Value>> {
    let media = MediaType::parse(&media_type).ok_or_else(|| {
        AppError::InvalidInput(format!("type must be 'movie' or 'tv', got '{media_type}'"))
    })?;

    let item = state.tmdb.detail(media, id).await.map_err(|e| {
        if format!("{e:#}").contains("404") {
            AppError::NotFound(format!("no {media} with id {id}"))
        } else {
            AppError::from_upstream(e)
        }
    })?;

    Ok(Json(json!({
        "success": true,
        "result": item,
    })))
}

#[derive(Debug, Deserialize)]
struct RecommendationRequest {
    query: String,
    max_results: Option<usize>,
}

async fn handle_recommendations(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<Value>> {
    if request.query.trim().is_empty() {
        return Err(AppError::InvalidInput("query must not be empty".to_string()));
    }

    let recs = recommend::recommendations(
        state.ai.as_deref(),
        &request.query,
        request.max_results,
    )
    .await;

    Ok(Json(json!({
        "success": true,
        "count": recs.len(),
        "recommendations": recs,
        "generated_at": Utc::now().to_rfc3339(),
    })))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
