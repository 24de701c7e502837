use std::sync::Arc;

use crate::{
    config::AppConfig,
    search::ProductSearchService,
    storage::{GENERATED_DIR, LocalFileStorage, UPLOADS_DIR},
    stylist::StylistService,
    tryon::{ClothingTryOnService, HairstyleService},
};

pub const FILES_URL_PREFIX: &str = "/files";

/// Services built once at startup and shared by every request.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: LocalFileStorage,
    pub clothing: ClothingTryOnService,
    pub hairstyles: HairstyleService,
    pub stylist: StylistService,
    pub search: ProductSearchService,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let storage = LocalFileStorage::new(
            config.datasets_dir.clone(),
            FILES_URL_PREFIX.to_string(),
        );
        let clothing = ClothingTryOnService::new(config.tryon_space.clone(), config.hf_token.clone());
        let hairstyles = HairstyleService::new(
            config.hair_space.clone(),
            config.hf_token.clone(),
            storage.clone(),
        );
        let stylist = StylistService::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            config.openai_model.clone(),
        );
        let search = ProductSearchService::new(
            config.google_api_key.clone(),
            config.custom_search_engine_id.clone(),
        );

        Self {
            config: Arc::new(config),
            storage,
            clothing,
            hairstyles,
            stylist,
            search,
        }
    }

    pub async fn prepare_dirs(&self) -> anyhow::Result<()> {
        self.storage
            .ensure_dirs(&[UPLOADS_DIR, GENERATED_DIR, "hairstyles/shapes", "hairstyles/colors"])
            .await
    }
}
