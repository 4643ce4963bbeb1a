use axum::{
    extract::{Path, Query, State},
    response::Html,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::catalog;
use crate::infrahub::data::str_field;
use crate::models::catalog::NamedOption;
use crate::rack::{generate_rack_html, LabelMode, RackDevice};
use crate::AppState;

use super::{ApiError, BranchQuery};

#[derive(Debug, Deserialize)]
pub struct RackHtmlQuery {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

pub async fn list_rows(State(state): State<Arc<AppState>>) -> Result<Json<Vec<NamedOption>>, ApiError> {
    Ok(Json(catalog::list_rack_rows(&state.client).await?))
}

pub async fn list_row_racks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    Ok(Json(catalog::list_racks(&state.client, &id).await?))
}

pub async fn list_rack_devices(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<BranchQuery>,
) -> Result<Json<Vec<RackDevice>>, ApiError> {
    let (_, devices) = catalog::rack_with_devices(&query.client(&state), &id).await?;
    Ok(Json(devices))
}

/// Rack elevation as an HTML fragment
pub async fn rack_html(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RackHtmlQuery>,
) -> Result<Html<String>, ApiError> {
    let branch = BranchQuery { branch: query.branch };
    let (rack, devices) = catalog::rack_with_devices(&branch.client(&state), &id).await?;
    let html = generate_rack_html(
        str_field(&rack, "name").unwrap_or("Unknown Rack"),
        rack["height"].as_u64().map(|h| h as u32),
        &devices,
        &state.config.infrahub_ui_url,
        branch.resolve(&state),
        LabelMode::parse(query.label.as_deref()),
    );
    Ok(Html(html))
}
