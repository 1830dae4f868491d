//! HTTP request handlers.

use super::AppState;
use crate::view::{escape_html, load_status_view, PublicConfig};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};

const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");

// ============================================================================
// Dashboard
// ============================================================================

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.snapshot().await;
    Html(DASHBOARD_TEMPLATE.replace("{{title}}", &escape_html(&config.settings.title)))
}

// ============================================================================
// API
// ============================================================================

pub async fn handle_get_config(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.snapshot().await;
    Json(PublicConfig::from(config.as_ref()))
}

pub async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.snapshot().await;
    match load_status_view(state.store.as_ref(), &config) {
        Ok(view) => Json(view).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.history.get_history(&id) {
        Ok(history) => Json(history).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
