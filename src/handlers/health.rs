use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServicesStatus {
    pub idm_vton: &'static str,
    pub hairfast: &'static str,
    pub google_search: &'static str,
    pub openai: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: ServicesStatus,
}

fn readiness(configured: bool) -> &'static str {
    if configured { "ready" } else { "not configured" }
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok",
        message: "Wardrobe.AI API is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Hosted Spaces connect lazily, so they are reported ready up front.
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        services: ServicesStatus {
            idm_vton: "ready",
            hairfast: "ready",
            google_search: readiness(state.search.is_configured()),
            openai: readiness(state.stylist.is_configured()),
        },
    })
}
