use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{ai, clothing, hairstyles, health, results, search},
    state::{FILES_URL_PREFIX, SharedState},
};

pub fn router(state: SharedState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    let files = ServeDir::new(state.config.datasets_dir.clone());

    Router::new()
        .route("/", get(health::root))
        .route("/api/health", get(health::health))
        .route(
            "/api/clothing/try-on",
            post(clothing::try_on).layer(upload_limit.clone()),
        )
        .route("/api/search", get(search::search_products))
        .route("/api/ai/chat", post(ai::chat))
        .route("/api/ai/analyze-image", post(ai::analyze_image))
        .route("/api/ai/recommendations", post(ai::recommendations))
        .route("/api/hairstyles/shapes", get(hairstyles::list_shapes))
        .route("/api/hairstyles/colors", get(hairstyles::list_colors))
        .route(
            "/api/hairstyles/try-on",
            post(hairstyles::try_on).layer(upload_limit),
        )
        .route("/api/results", get(results::list_results))
        .nest_service(FILES_URL_PREFIX, files)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
