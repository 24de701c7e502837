pub mod clothing;
pub mod hairstyle;

use chrono::Utc;
use tokio::sync::OnceCell;

use crate::{
    error::AppError,
    gradio::GradioClient,
    image_processing,
    storage::{GENERATED_DIR, LocalFileStorage, TryOnKind, TryOnRecord, save_tryon_record},
};

pub use clothing::{ClothingParams, ClothingTryOnService};
pub use hairstyle::{HairParams, HairstyleCatalog, HairstyleRef, HairstyleService};

/// A Space connection made on first use and shared afterwards.
pub struct LazySpace {
    space: String,
    hf_token: Option<String>,
    client: OnceCell<GradioClient>,
}

impl LazySpace {
    pub fn new(space: String, hf_token: Option<String>) -> Self {
        Self {
            space,
            hf_token,
            client: OnceCell::new(),
        }
    }

    pub async fn client(&self) -> Result<&GradioClient, AppError> {
        self.client
            .get_or_try_init(|| GradioClient::connect(&self.space, self.hf_token.clone()))
            .await
    }
}

/// Runs CPU-bound image work off the async executor.
pub async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AppError::Internal(format!("image task panicked: {err}")))?
        .map_err(AppError::from)
}

/// Model outputs are normalized to PNG before being stored.
pub async fn ensure_png(bytes: Vec<u8>) -> Result<Vec<u8>, AppError> {
    if image_processing::is_png(&bytes) {
        return Ok(bytes);
    }
    blocking(move || image_processing::convert_to_png(&bytes)).await
}

/// Writes a generated image under `generated/` and records it. Returns the
/// public URL, which is only handed out once the file is on disk.
pub async fn save_result(
    storage: &LocalFileStorage,
    kind: TryOnKind,
    png: &[u8],
    inputs: Vec<String>,
    parameters: serde_json::Value,
) -> Result<String, AppError> {
    let key = format!("{GENERATED_DIR}/{}.png", uuid::Uuid::new_v4());
    storage.put(&key, png).await?;
    if !storage.exists(&key).await? {
        return Err(AppError::Internal(format!("generated file missing after write: {key}")));
    }
    let result_url = storage.get_public_url(&key);

    let record = TryOnRecord {
        kind,
        result_url: result_url.clone(),
        inputs,
        parameters,
        created_at: Utc::now().to_rfc3339(),
    };
    if let Err(err) = save_tryon_record(storage, &record).await {
        tracing::warn!(error = %err, result = %result_url, "failed to save try-on record");
    }
    tracing::info!(kind = kind.as_str(), result = %result_url, "try-on result saved");
    Ok(result_url)
}
