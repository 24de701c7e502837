use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    extract::AppJson,
    search::Product,
    state::SharedState,
    stylist::{ChatTurn, Preferences, StylistContext},
};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub context: Option<StylistContext>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeImageRequest {
    pub image_url: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeImageResponse {
    pub analysis: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<Product>,
}

pub async fn chat(
    State(state): State<SharedState>,
    AppJson(request): AppJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let response = state
        .stylist
        .chat(&request.messages, request.context.as_ref())
        .await?;
    Ok(Json(ChatResponse { response }))
}

pub async fn analyze_image(
    State(state): State<SharedState>,
    AppJson(request): AppJson<AnalyzeImageRequest>,
) -> Result<Json<AnalyzeImageResponse>, AppError> {
    let analysis = state
        .stylist
        .analyze_image(&state.storage, &request.image_url, request.prompt.as_deref())
        .await?;
    Ok(Json(AnalyzeImageResponse { analysis }))
}

pub async fn recommendations(
    State(state): State<SharedState>,
    AppJson(preferences): AppJson<Preferences>,
) -> Result<Json<RecommendationsResponse>, AppError> {
    let recommendations = state
        .stylist
        .recommendations(&preferences, &state.search)
        .await?;
    tracing::info!(count = recommendations.len(), "generated product recommendations");
    Ok(Json(RecommendationsResponse { recommendations }))
}
