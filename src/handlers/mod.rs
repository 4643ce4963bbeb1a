pub mod dashboard;
pub mod datacenters;
pub mod racks;
pub mod segments;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::infrahub::{InfrahubClient, InfrahubError};
use crate::AppState;

/// Error response body: `{"error": "message"}`
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("{} not found", resource),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.into(),
        }
    }

    /// Infrahub answered with an error or could not be reached
    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<InfrahubError>() {
            Some(InfrahubError::NotFound { .. }) => Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            },
            Some(e) if e.is_already_exists() => Self::conflict(e.to_string()),
            Some(e) => Self::bad_gateway(e.to_string()),
            None => Self::internal(err.to_string()),
        }
    }
}

/// Optional `?branch=` on read endpoints
#[derive(Debug, Default, Deserialize)]
pub struct BranchQuery {
    #[serde(default)]
    pub branch: Option<String>,
}

impl BranchQuery {
    /// The requested branch, or the configured default
    pub fn resolve<'a>(&'a self, state: &'a AppState) -> &'a str {
        self.branch
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(&state.config.default_branch)
    }

    pub fn client(&self, state: &AppState) -> InfrahubClient {
        state.client.with_branch(self.resolve(state))
    }
}

/// Response helper: return 201 Created with JSON body
pub fn created<T: Serialize>(item: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(item))
}

/// Turn a list of validation problems into a 400
pub fn validation_error(errors: Vec<String>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::bad_request(errors.join("; ")))
    }
}

/// Healthcheck endpoint, returns 200 OK with status
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "bundle-dc",
        "infrahub": state.config.infrahub_address,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
