use axum::{Json, extract::State};

use crate::{
    error::AppError,
    handlers::TryOnResponse,
    state::SharedState,
    storage::TryOnKind,
    tryon::{ClothingParams, save_result},
    uploads::{MultipartForm, save_and_convert_to_png},
};

pub async fn try_on(
    State(state): State<SharedState>,
    mut form: MultipartForm,
) -> Result<Json<TryOnResponse>, AppError> {
    let defaults = ClothingParams::default();
    let params = ClothingParams {
        garment_description: form.string_or("garment_description", &defaults.garment_description),
        auto_mask: form.bool_or("auto_mask", defaults.auto_mask)?,
        auto_crop: form.bool_or("auto_crop", defaults.auto_crop)?,
        denoise_steps: form.parse_or("denoise_steps", defaults.denoise_steps)?,
        seed: form.parse_or("seed", defaults.seed)?,
    };
    params.validate()?;

    let person_upload = form.require_file("person_image")?;
    let clothing_upload = form.require_file("clothing_image")?;
    let person = save_and_convert_to_png(&state.storage, person_upload).await?;
    let clothing = save_and_convert_to_png(&state.storage, clothing_upload).await?;
    tracing::info!(person = %person.url, clothing = %clothing.url, "processing clothing try-on request");

    let png = state
        .clothing
        .try_on(person.png, clothing.png, &params)
        .await?;

    let parameters = serde_json::to_value(&params)
        .map_err(|err| AppError::Internal(format!("serialize parameters failed: {err}")))?;
    let result = save_result(
        &state.storage,
        TryOnKind::Clothing,
        &png,
        vec![person.url, clothing.url],
        parameters,
    )
    .await?;
    tracing::info!(result = %result, "clothing try-on completed");

    Ok(Json(TryOnResponse {
        success: true,
        result,
        message: "Virtual try-on completed successfully".to_string(),
    }))
}
