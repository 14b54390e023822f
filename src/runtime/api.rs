//! HTTP surface: `POST /task`.
//!
//! | Outcome                | Status | Body                                   |
//! |------------------------|--------|----------------------------------------|
//! | queued                 | 202    | `{"message": "Task queued"}`           |
//! | missing `user_id`      | 400    | `{"error": "Missing user_id"}`         |
//! | over admission cap     | 429    | `{"error": "Rate limit exceeded"}`     |
//! | store/infra failure    | 500    | `{"error": "Internal server error"}`   |

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::core::{IngressGateway, QueueError, Spawn};

/// Body field naming the principal.
pub const PRINCIPAL_FIELD: &str = "user_id";

/// Success response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human readable message.
    pub message: String,
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable message.
    pub error: String,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

impl IntoResponse for QueueError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "Missing user_id"),
            Self::RateLimitExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded"),
            Self::Store(_)
            | Self::TaskProcessing(_)
            | Self::DrainLeaseLost(_)
            | Self::InvalidConfig(_) => {
                tracing::error!(error = %self, "error processing task");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        let body = ErrorResponse {
            error: message.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the task router over a gateway.
pub fn task_router<S>(gateway: IngressGateway<S>) -> Router
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/task", post(submit_task::<S>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Extract a non-empty string principal from a request body.
///
/// # Errors
///
/// Returns `QueueError::Validation` if the field is absent, empty, or not a
/// string.
pub fn principal_of(body: &Value) -> Result<&str, QueueError> {
    match body.get(PRINCIPAL_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id),
        _ => Err(QueueError::Validation(format!("missing {PRINCIPAL_FIELD}"))),
    }
}

async fn submit_task<S>(
    State(gateway): State<IngressGateway<S>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    // An unreadable body carries no principal either.
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::debug!(%rejection, "rejecting unreadable task body");
            return QueueError::Validation(format!("missing {PRINCIPAL_FIELD}")).into_response();
        }
    };
    let principal = match principal_of(&body) {
        Ok(principal) => principal.to_string(),
        Err(e) => return e.into_response(),
    };

    match gateway.submit(&principal, body).await {
        Ok(_) => (
            StatusCode::ACCEPTED,
            Json(MessageResponse {
                message: "Task queued".into(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Return a health payload.
pub async fn health() -> Json<Health> {
    Json(Health { ok: true })
}
