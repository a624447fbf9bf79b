use crate::{
    audit::{self, BulkSummary, PageResult, PageStats},
    config::{Config, MatchingConfig},
    errors::AppError,
    matcher::{
        relevance::{build_keyword_list, relevance},
        EmbeddingError, LinkMatcher, MatchRequest, MatchResponse, MatchType, ModelStatus,
        ScoringModel,
    },
};
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

const BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    matcher: Arc<LinkMatcher>,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(matcher: LinkMatcher, config: Config) -> Self {
        Self {
            matcher: Arc::new(matcher),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config", get(get_config))
        .route("/match-links", post(match_links))
        .route("/relevance", post(score_relevance))
        .route("/bulk-audit", post(bulk_audit))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::warn!("shutting down");
}

async fn start_app(config: Config) -> anyhow::Result<()> {
    let model = Arc::new(ScoringModel::from_config(
        config.model.clone(),
        config.models_dir(),
    ));

    if config.server.preload_model {
        let preload = model.clone();
        tokio::task::spawn_blocking(move || -> Result<(), EmbeddingError> {
            preload.load()?;
            Ok(())
        })
        .await?
        .context("failed to preload embedding model")?;
    }

    let bind = config.server.bind.clone();
    let matcher = LinkMatcher::new(model, config.matching.clone());
    let app = router(AppState::new(matcher, config));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    log::info!("listening on {bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(config: Config) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(config))
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ModelUnavailable(_) => {
                log::error!("{self:?}");
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Embedding(_) | AppError::Join(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: String,
    pub model_loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let embedder = state.matcher.embedder();
    let mut response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: embedder.name().to_string(),
        model_loaded: false,
        error: None,
    };

    let code = match state.matcher.model_status() {
        ModelStatus::Ready => {
            response.model_loaded = true;
            StatusCode::OK
        }
        ModelStatus::NotLoaded => StatusCode::OK,
        ModelStatus::Failed(reason) => {
            response.status = "unavailable".to_string();
            response.error = Some(reason);
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    (code, Json(response))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub model: String,
    pub max_bulk_pages: usize,
    pub link_ratio_threshold: f64,
    pub matching: MatchingConfig,
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        model: state.config.model.name.clone(),
        max_bulk_pages: state.config.audit.max_bulk_pages,
        link_ratio_threshold: state.config.audit.link_ratio_threshold,
        matching: state.matcher.defaults().clone(),
    })
}

async fn match_links(
    State(state): State<AppState>,
    Json(payload): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, HttpError> {
    let matcher = state.matcher.clone();

    let response = tokio::task::spawn_blocking(move || matcher.match_links(&payload)).await??;
    Ok(response.into())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelevanceRequest {
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Focus keyword; a multi-word keyword also counts its words
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub match_type: MatchType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelevanceResponse {
    pub score: u8,
}

async fn score_relevance(
    Json(payload): Json<RelevanceRequest>,
) -> Result<Json<RelevanceResponse>, HttpError> {
    let keywords = build_keyword_list(&payload.keywords, payload.keyword.as_deref());
    if keywords.is_empty() {
        return Err(AppError::BadRequest("at least one keyword is required".to_string()).into());
    }

    let score = relevance(&payload.content, &keywords, payload.match_type);
    Ok(RelevanceResponse { score }.into())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkAuditRequest {
    pub pages: Vec<PageStats>,
    #[serde(default)]
    pub link_ratio_threshold: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkAuditResponse {
    pub results: Vec<PageResult>,
    pub summary: BulkSummary,
}

async fn bulk_audit(
    State(state): State<AppState>,
    Json(payload): Json<BulkAuditRequest>,
) -> Result<Json<BulkAuditResponse>, HttpError> {
    let limits = &state.config.audit;

    if payload.pages.len() > limits.max_bulk_pages {
        return Err(AppError::BadRequest(format!(
            "too many pages: {} (max {})",
            payload.pages.len(),
            limits.max_bulk_pages
        ))
        .into());
    }

    let threshold = payload
        .link_ratio_threshold
        .unwrap_or(limits.link_ratio_threshold);
    audit::check_link_ratio_threshold(threshold).map_err(AppError::BadRequest)?;

    let (results, summary) = audit::audit_pages(&payload.pages, threshold);
    Ok(BulkAuditResponse { results, summary }.into())
}
