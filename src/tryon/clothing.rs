use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    error::AppError,
    gradio::file_data,
    image_processing,
    tryon::{LazySpace, blocking, ensure_png},
};

const TRYON_API: &str = "/tryon";
const MIN_DENOISE_STEPS: u32 = 20;
const MAX_DENOISE_STEPS: u32 = 40;

#[derive(Debug, Clone, Serialize)]
pub struct ClothingParams {
    pub garment_description: String,
    pub auto_mask: bool,
    pub auto_crop: bool,
    pub denoise_steps: u32,
    pub seed: i64,
}

impl Default for ClothingParams {
    fn default() -> Self {
        Self {
            garment_description: "A clothing item".to_string(),
            auto_mask: true,
            auto_crop: false,
            denoise_steps: 30,
            seed: 42,
        }
    }
}

impl ClothingParams {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(MIN_DENOISE_STEPS..=MAX_DENOISE_STEPS).contains(&self.denoise_steps) {
            return Err(AppError::BadRequest(format!(
                "denoise_steps must be between {MIN_DENOISE_STEPS} and {MAX_DENOISE_STEPS}"
            )));
        }
        Ok(())
    }
}

/// Virtual clothing try-on backed by the hosted IDM-VTON Space.
pub struct ClothingTryOnService {
    space: LazySpace,
}

impl ClothingTryOnService {
    pub fn new(space: String, hf_token: Option<String>) -> Self {
        tracing::info!(space = %space, "clothing try-on service initialized");
        Self {
            space: LazySpace::new(space, hf_token),
        }
    }

    /// Takes PNG person and garment images and returns the result as PNG.
    /// With `auto_crop` the model sees a 3:4 center crop and its output is
    /// pasted back into the full-size person image.
    pub async fn try_on(
        &self,
        person_png: Vec<u8>,
        garment_png: Vec<u8>,
        params: &ClothingParams,
    ) -> Result<Vec<u8>, AppError> {
        params.validate()?;

        let auto_crop = params.auto_crop;
        let (person, garment, person_png) = blocking(move || {
            let person = image_processing::prepare_person(&person_png, auto_crop)?;
            let garment = image_processing::prepare_garment(&garment_png)?;
            Ok((person, garment, person_png))
        })
        .await?;

        let client = self.space.client().await?;
        let person_path = client.upload_file("person.png", person.png).await?;
        let garment_path = client.upload_file("garment.png", garment).await?;
        tracing::info!(
            space = %client.space(),
            auto_mask = params.auto_mask,
            auto_crop = params.auto_crop,
            denoise_steps = params.denoise_steps,
            seed = params.seed,
            "running clothing try-on"
        );

        let outputs = client
            .predict(TRYON_API, tryon_inputs(&person_path, &garment_path, params))
            .await?;
        let result = outputs.first().cloned().unwrap_or(Value::Null);
        let bytes = client.download(&result).await?;
        match person.crop {
            Some(crop) => {
                blocking(move || image_processing::paste_back(&person_png, &bytes, crop)).await
            }
            None => ensure_png(bytes).await,
        }
    }
}

/// Positional inputs of the `/tryon` endpoint. Cropping already happened
/// locally, so the Space is told not to crop again.
pub fn tryon_inputs(person_path: &str, garment_path: &str, params: &ClothingParams) -> Vec<Value> {
    vec![
        json!({
            "background": file_data(person_path),
            "layers": [],
            "composite": null,
        }),
        file_data(garment_path),
        json!(params.garment_description),
        json!(params.auto_mask),
        json!(false),
        json!(params.denoise_steps),
        json!(params.seed),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_form_defaults() {
        let params = ClothingParams::default();
        assert_eq!(params.garment_description, "A clothing item");
        assert!(params.auto_mask);
        assert!(!params.auto_crop);
        assert_eq!(params.denoise_steps, 30);
        assert_eq!(params.seed, 42);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn denoise_steps_outside_slider_range_are_rejected() {
        let params = ClothingParams {
            denoise_steps: 100,
            ..ClothingParams::default()
        };
        assert!(matches!(params.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn inputs_follow_endpoint_order() {
        let params = ClothingParams {
            garment_description: "red hoodie".to_string(),
            auto_crop: true,
            seed: 7,
            ..ClothingParams::default()
        };
        let inputs = tryon_inputs("/tmp/p.png", "/tmp/g.png", &params);
        assert_eq!(inputs.len(), 7);
        assert_eq!(inputs[0]["background"]["path"], "/tmp/p.png");
        assert_eq!(inputs[0]["layers"], json!([]));
        assert_eq!(inputs[1]["path"], "/tmp/g.png");
        assert_eq!(inputs[2], "red hoodie");
        assert_eq!(inputs[3], true);
        assert_eq!(inputs[4], false);
        assert_eq!(inputs[5], 30);
        assert_eq!(inputs[6], 7);
    }
}
