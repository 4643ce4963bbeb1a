use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::catalog;
use crate::infrahub::types::Branch;
use crate::models::catalog::*;
use crate::AppState;

use super::{ApiError, BranchQuery};

/// Infrahub reachability plus the address and branch in use
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connected: state.client.is_ready().await,
        address: state.config.infrahub_address.clone(),
        ui_url: state.config.infrahub_ui_url.clone(),
        branch: state.config.default_branch.clone(),
    })
}

pub async fn list_branches(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Branch>>, ApiError> {
    let branches = catalog::list_branches(&state.client).await?;
    Ok(Json(branches))
}

pub async fn list_datacenters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BranchQuery>,
) -> Result<Json<Vec<DataCenterRow>>, ApiError> {
    let rows = catalog::list_datacenters(
        &query.client(&state),
        &state.config.infrahub_ui_url,
        query.resolve(&state),
    )
    .await?;
    Ok(Json(rows))
}

pub async fn list_colocation_centers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BranchQuery>,
) -> Result<Json<Vec<ColocationRow>>, ApiError> {
    let rows = catalog::list_colocation_centers(
        &query.client(&state),
        &state.config.infrahub_ui_url,
        query.resolve(&state),
    )
    .await?;
    Ok(Json(rows))
}

pub async fn list_proposed_changes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProposedChangeRow>>, ApiError> {
    let rows = catalog::list_proposed_changes(&state.client, &state.config.infrahub_ui_url).await?;
    Ok(Json(rows))
}
