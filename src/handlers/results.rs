use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    extract::AppQuery,
    state::SharedState,
    storage::{TryOnRecord, list_tryon_records},
};

const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub limit: Option<usize>,
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub results: Vec<TryOnRecord>,
}

pub async fn list_results(
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<ResultsQuery>,
) -> Result<Json<ResultsResponse>, AppError> {
    let limit = query.limit.unwrap_or(20).clamp(1, MAX_LIMIT);
    let kind = query.kind.as_deref().unwrap_or("all");
    if !matches!(kind, "all" | "clothing" | "hairstyle") {
        return Err(AppError::BadRequest(format!(
            "kind must be one of all, clothing, hairstyle; got {kind}"
        )));
    }
    let results = list_tryon_records(&state.storage, limit, kind).await?;
    Ok(Json(ResultsResponse { results }))
}
