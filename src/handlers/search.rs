use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, extract::AppQuery, search::Product, state::SharedState};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default = "default_num_results")]
    pub num_results: u32,
}

fn default_num_results() -> u32 {
    10
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<Product>,
}

pub async fn search_products(
    State(state): State<SharedState>,
    AppQuery(params): AppQuery<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params.query.trim();
    let results = state.search.search_products(query, params.num_results).await;
    tracing::info!(query = %query, results = results.len(), "search completed");
    Ok(Json(SearchResponse { results }))
}
