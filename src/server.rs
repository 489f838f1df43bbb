//! HTTP surface (feature `server`).
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | GET | `/` | | service info |
//! | GET | `/health`, `/api/health` | | static liveness payload |
//! | POST | `/create`, `/api/create` | `{"url": "..."}` | `{"poster_url", "analysis"}` |
//!
//! Failures are `{"detail": "..."}`: 400 for a blank URL, 500 when a
//! pipeline stage fails. Dropping a request (client disconnect) drops the
//! pipeline future, which kills the browser child and removes the workspace.

use crate::create::Pipeline;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const SERVICE_NAME: &str = "vibelink";

/// Router-level options.
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
    /// Allowed CORS origins; empty or `*` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Maximum poster runs in flight across all create routes; `None` for
    /// no limit. Requests over the limit wait for a free slot.
    pub max_concurrent: Option<usize>,
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// One semaphore shared by every route that runs the pipeline.
    pub run_slots: Option<Arc<Semaphore>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateResponse {
    pub poster_url: String,
    /// One-line "brand: what it provides" summary.
    pub analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Error response carrying a status code and a `detail` message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let any = origins.is_empty() || origins.iter().any(|o| o.trim() == "*");
    let allow_origin = if any {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o.trim()) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn build_app(pipeline: Arc<Pipeline>, settings: &ServerSettings) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/create", post(create))
        .route("/api/create", post(create))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors(&settings.allowed_origins)),
        )
        .with_state(AppState {
            pipeline,
            run_slots: settings
                .max_concurrent
                .map(|n| Arc::new(Semaphore::new(n.max(1)))),
        })
}

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "create": "POST /api/create",
            "health": "GET /api/health",
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(HealthData {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, ApiError> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("url must not be empty"));
    }

    let _slot = match &state.run_slots {
        Some(slots) => Some(
            Arc::clone(slots)
                .acquire_owned()
                .await
                .map_err(|_| ApiError::internal("server is shutting down"))?,
        ),
        None => None,
    };

    match state.pipeline.run(url).await {
        Ok(result) => Ok(Json(CreateResponse {
            poster_url: result.poster_url,
            analysis: result.summary,
        })),
        Err(e) => {
            tracing::error!(stage = %e.stage, error = %e, "poster pipeline failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_payload_shape() {
        let value = serde_json::to_value(HealthData {
            status: "healthy",
            service: SERVICE_NAME,
            version: "1.2.3",
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"status": "healthy", "service": "vibelink", "version": "1.2.3"})
        );
    }

    #[test]
    fn api_error_statuses() {
        assert_eq!(
            ApiError::bad_request("x").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::internal("x").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn create_request_defaults_url() {
        let req: CreateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.url.is_empty());
    }
}
