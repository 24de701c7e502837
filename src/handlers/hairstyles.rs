use axum::{Json, extract::State};
use serde::Serialize;

use crate::{
    error::AppError,
    handlers::TryOnResponse,
    state::SharedState,
    storage::TryOnKind,
    tryon::{HairParams, HairstyleRef, ensure_png, save_result},
    uploads::{MultipartForm, save_and_convert_to_png},
};

#[derive(Debug, Serialize)]
pub struct ShapesResponse {
    pub shapes: Vec<HairstyleRef>,
}

#[derive(Debug, Serialize)]
pub struct ColorsResponse {
    pub colors: Vec<HairstyleRef>,
}

pub async fn list_shapes(State(state): State<SharedState>) -> Result<Json<ShapesResponse>, AppError> {
    let shapes = state.hairstyles.catalog().shapes().await?;
    Ok(Json(ShapesResponse { shapes }))
}

pub async fn list_colors(State(state): State<SharedState>) -> Result<Json<ColorsResponse>, AppError> {
    let colors = state.hairstyles.catalog().colors().await?;
    Ok(Json(ColorsResponse { colors }))
}

enum Reference {
    Shape,
    Color,
}

/// Resolves a reference given either as an uploaded file or a catalog id.
/// Returns the PNG bytes and the URL recorded with the result.
async fn reference_image(
    state: &SharedState,
    form: &mut MultipartForm,
    file_field: &str,
    id_field: &str,
    kind: Reference,
) -> Result<Option<(Vec<u8>, String)>, AppError> {
    if let Some(upload) = form.take_file(file_field) {
        let stored = save_and_convert_to_png(&state.storage, upload).await?;
        return Ok(Some((stored.png, stored.url)));
    }
    let Some(id) = form.text(id_field).map(str::to_string) else {
        return Ok(None);
    };
    let catalog = state.hairstyles.catalog();
    let reference = match kind {
        Reference::Shape => catalog.find_shape(&id).await?,
        Reference::Color => catalog.find_color(&id).await?,
    };
    let bytes = catalog.load(&reference).await?;
    let png = ensure_png(bytes).await?;
    Ok(Some((png, reference.image)))
}

pub async fn try_on(
    State(state): State<SharedState>,
    mut form: MultipartForm,
) -> Result<Json<TryOnResponse>, AppError> {
    let defaults = HairParams::default();
    let params = HairParams {
        blending: form.string_or("blending", &defaults.blending),
        poisson_iters: form.parse_or("poisson_iters", defaults.poisson_iters)?,
        poisson_erosion: form.parse_or("poisson_erosion", defaults.poisson_erosion)?,
    };
    params.validate()?;

    let face_upload = form.require_file("face_image")?;
    let has_shape = form.has_file("shape_image") || form.text("shape_id").is_some();
    let has_color = form.has_file("color_image") || form.text("color_id").is_some();
    if !has_shape && !has_color {
        return Err(AppError::BadRequest(
            "Provide shape_image/shape_id or color_image/color_id".to_string(),
        ));
    }
    let face = save_and_convert_to_png(&state.storage, face_upload).await?;
    let shape = reference_image(&state, &mut form, "shape_image", "shape_id", Reference::Shape).await?;
    let color = reference_image(&state, &mut form, "color_image", "color_id", Reference::Color).await?;
    tracing::info!(face = %face.url, "processing hairstyle try-on request");

    let mut inputs = vec![face.url];
    let (shape_png, shape_url) = shape.unzip();
    let (color_png, color_url) = color.unzip();
    inputs.extend(shape_url);
    inputs.extend(color_url);

    let png = state
        .hairstyles
        .try_on(face.png, shape_png, color_png, &params)
        .await?;

    let parameters = serde_json::to_value(&params)
        .map_err(|err| AppError::Internal(format!("serialize parameters failed: {err}")))?;
    let result = save_result(&state.storage, TryOnKind::Hairstyle, &png, inputs, parameters).await?;
    tracing::info!(result = %result, "hairstyle try-on completed");

    Ok(Json(TryOnResponse {
        success: true,
        result,
        message: "Hairstyle try-on completed successfully".to_string(),
    }))
}
