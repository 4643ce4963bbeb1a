use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog;
use crate::models::catalog::*;
use crate::AppState;

use super::{created, validation_error, ApiError};

pub async fn list_deployments(State(state): State<Arc<AppState>>) -> Result<Json<Vec<NamedOption>>, ApiError> {
    Ok(Json(catalog::list_deployments(&state.client).await?))
}

pub async fn list_organizations(State(state): State<Arc<AppState>>) -> Result<Json<Vec<NamedOption>>, ApiError> {
    Ok(Json(catalog::list_organizations(&state.client).await?))
}

/// Segments already defined on a deployment
pub async fn list_deployment_segments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    Ok(Json(catalog::list_segments(&state.client, &id).await?))
}

/// Create VPN: segment on a new branch, then a proposed change
pub async fn create_segment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSegmentRequest>,
) -> Result<(StatusCode, Json<CreateSegmentResponse>), ApiError> {
    validation_error(req.validate())?;

    let taken = catalog::list_segments(&state.client, &req.deployment)
        .await?
        .iter()
        .any(|s| s["vlan_id"].as_i64() == Some(req.vlan_id));
    if taken {
        return Err(ApiError::conflict(format!(
            "VLAN {} is already used in this deployment",
            req.vlan_id
        )));
    }

    let branch = req.branch_name();
    let resp = catalog::create_segment(
        &state.client,
        &state.client.with_branch(&branch),
        &state.config.infrahub_ui_url,
        Duration::from_secs(state.config.generator_wait_time),
        &req,
    )
    .await?;
    Ok(created(resp))
}
