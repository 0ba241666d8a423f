use crate::engine::SearchResult;
use crate::error::SubmitError;
use crate::highlight::Excerpt;
use crate::session::{SearchSession, SearchStatus};
use crate::store::IndexStore;
use crate::trace::DebugLog;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use url::Url;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<IndexStore>,
    /// Search page URL reported back to clients
    pub page_url: Url,
    /// Built site directory whose `texts_indices/` is served as-is
    pub static_root: Option<PathBuf>,
}

// ========== Request/Response Types ==========

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub q: String,
    /// Comma-separated slugs; the default text when absent
    #[serde(default)]
    pub texts: Option<String>,
    #[serde(default)]
    pub debug: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub url: String,
    pub status: SearchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total: usize,
    pub results: Vec<ResultResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<DebugLog>,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    #[serde(flatten)]
    pub result: SearchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_page: Option<String>,
    pub excerpts: Vec<Excerpt>,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub slug: String,
    pub label: String,
    pub index_path: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

// ========== Error Handling ==========

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = format!("{:#}", self.0);
        tracing::error!("API error: {}", message);

        let status = if self.0.is::<SubmitError>() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// ========== Handlers ==========

async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success("OK"))
}

async fn list_texts(State(state): State<AppState>) -> impl IntoResponse {
    let texts: Vec<TextResponse> = state
        .store
        .catalog()
        .texts()
        .iter()
        .map(|text| TextResponse {
            slug: text.slug.clone(),
            label: text.label.clone(),
            index_path: text.index_path(),
        })
        .collect();
    Json(ApiResponse::success(texts))
}

async fn search(
    State(state): State<AppState>,
    Query(req): Query<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut session = SearchSession::new(state.store.clone(), state.page_url.clone());
    if let Some(texts) = &req.texts {
        session.select_texts(texts.split(',').map(str::trim).filter(|slug| !slug.is_empty()));
    }
    session.set_query(req.q.clone());
    session.submit().await?;

    let results: Vec<ResultResponse> = session
        .results()
        .iter()
        .map(|result| ResultResponse {
            link: result.record.as_ref().map(|record| record.deep_link()),
            display_page: result
                .record
                .as_ref()
                .map(|record| record.display_page().to_string()),
            excerpts: session.excerpts(result),
            result: result.clone(),
        })
        .collect();

    let response = SearchResponse {
        query: req.q,
        url: session.url().to_string(),
        status: session.status(),
        error: session.error().map(str::to_string),
        total: results.len(),
        results,
        trace: req.debug.unwrap_or(false).then(|| session.trace().clone()),
    };

    Ok(Json(ApiResponse::success(response)))
}

// ========== Router ==========

pub fn create_router(state: AppState) -> Router {
    let static_root = state.static_root.clone();
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/api/texts", get(list_texts))
        .route("/api/search", get(search))
        .with_state(state);

    if let Some(root) = static_root {
        router = router.nest_service("/texts_indices", ServeDir::new(root.join("texts_indices")));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
