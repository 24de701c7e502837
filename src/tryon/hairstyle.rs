use serde::Serialize;
use serde_json::{Value, json};
use tokio::fs;

use crate::{
    error::AppError,
    gradio::file_data,
    storage::LocalFileStorage,
    tryon::{LazySpace, ensure_png},
};

const SWAP_HAIR_API: &str = "/swap_hair";
const SHAPES_DIR: &str = "hairstyles/shapes";
const COLORS_DIR: &str = "hairstyles/colors";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
pub const BLENDING_MODES: &[&str] = &["Article", "Alternative_v1", "Alternative_v2"];

#[derive(Debug, Clone, Serialize)]
pub struct HairParams {
    pub blending: String,
    pub poisson_iters: u32,
    pub poisson_erosion: u32,
}

impl Default for HairParams {
    fn default() -> Self {
        Self {
            blending: "Article".to_string(),
            poisson_iters: 0,
            poisson_erosion: 15,
        }
    }
}

impl HairParams {
    pub fn validate(&self) -> Result<(), AppError> {
        if !BLENDING_MODES.contains(&self.blending.as_str()) {
            return Err(AppError::BadRequest(format!(
                "blending must be one of {}",
                BLENDING_MODES.join(", ")
            )));
        }
        if self.poisson_iters > 2500 {
            return Err(AppError::BadRequest("poisson_iters must be at most 2500".to_string()));
        }
        if !(1..=100).contains(&self.poisson_erosion) {
            return Err(AppError::BadRequest(
                "poisson_erosion must be between 1 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HairstyleRef {
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(skip)]
    pub key: String,
}

/// Reference images for hair shapes and colors, read from the datasets directory.
#[derive(Clone)]
pub struct HairstyleCatalog {
    storage: LocalFileStorage,
}

impl HairstyleCatalog {
    pub fn new(storage: LocalFileStorage) -> Self {
        Self { storage }
    }

    pub async fn shapes(&self) -> Result<Vec<HairstyleRef>, AppError> {
        self.list(SHAPES_DIR).await
    }

    pub async fn colors(&self) -> Result<Vec<HairstyleRef>, AppError> {
        self.list(COLORS_DIR).await
    }

    pub async fn find_shape(&self, id: &str) -> Result<HairstyleRef, AppError> {
        find(self.shapes().await?, id, "hairstyle shape")
    }

    pub async fn find_color(&self, id: &str) -> Result<HairstyleRef, AppError> {
        find(self.colors().await?, id, "hair color")
    }

    pub async fn load(&self, reference: &HairstyleRef) -> Result<Vec<u8>, AppError> {
        self.storage
            .get(&reference.key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("reference image {} is missing", reference.id)))
    }

    async fn list(&self, dir_key: &str) -> Result<Vec<HairstyleRef>, AppError> {
        let mut dir = match fs::read_dir(self.storage.resolve_path(dir_key)).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut refs = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_lowercase());
            if !ext.is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str())) {
                continue;
            }
            let (Some(stem), Some(file_name)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.file_name().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            let key = format!("{dir_key}/{file_name}");
            refs.push(HairstyleRef {
                id: stem.to_string(),
                name: display_name(stem),
                image: self.storage.get_public_url(&key),
                key,
            });
        }
        refs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(refs)
    }
}

fn find(refs: Vec<HairstyleRef>, id: &str, what: &str) -> Result<HairstyleRef, AppError> {
    refs.into_iter()
        .find(|reference| reference.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Unknown {what}: {id}")))
}

/// `long_wavy-bob` → `Long Wavy Bob`.
pub fn display_name(stem: &str) -> String {
    stem.split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Hairstyle transfer backed by the hosted HairFastGAN Space.
pub struct HairstyleService {
    space: LazySpace,
    catalog: HairstyleCatalog,
}

impl HairstyleService {
    pub fn new(space: String, hf_token: Option<String>, storage: LocalFileStorage) -> Self {
        tracing::info!(space = %space, "hairstyle service initialized");
        Self {
            space: LazySpace::new(space, hf_token),
            catalog: HairstyleCatalog::new(storage),
        }
    }

    pub fn catalog(&self) -> &HairstyleCatalog {
        &self.catalog
    }

    /// Transfers the hair shape and/or color onto `face_png`. At least one
    /// reference is required; a missing one is filled in by the model.
    pub async fn try_on(
        &self,
        face_png: Vec<u8>,
        shape_png: Option<Vec<u8>>,
        color_png: Option<Vec<u8>>,
        params: &HairParams,
    ) -> Result<Vec<u8>, AppError> {
        params.validate()?;
        if shape_png.is_none() && color_png.is_none() {
            return Err(AppError::BadRequest(
                "Provide a hairstyle shape or a hair color".to_string(),
            ));
        }

        let client = self.space.client().await?;
        let face_path = client.upload_file("face.png", face_png).await?;
        let shape_path = match shape_png {
            Some(bytes) => Some(client.upload_file("shape.png", bytes).await?),
            None => None,
        };
        let color_path = match color_png {
            Some(bytes) => Some(client.upload_file("color.png", bytes).await?),
            None => None,
        };
        tracing::info!(
            space = %client.space(),
            has_shape = shape_path.is_some(),
            has_color = color_path.is_some(),
            blending = %params.blending,
            "running hairstyle try-on"
        );

        let inputs = swap_hair_inputs(&face_path, shape_path.as_deref(), color_path.as_deref(), params);
        let outputs = client.predict(SWAP_HAIR_API, inputs).await?;
        let result = hair_result(client.space(), &outputs)?;
        let bytes = client.download(result).await?;
        ensure_png(bytes).await
    }
}

pub fn swap_hair_inputs(
    face_path: &str,
    shape_path: Option<&str>,
    color_path: Option<&str>,
    params: &HairParams,
) -> Vec<Value> {
    vec![
        file_data(face_path),
        shape_path.map(file_data).unwrap_or(Value::Null),
        color_path.map(file_data).unwrap_or(Value::Null),
        json!(params.blending),
        json!(params.poisson_iters),
        json!(params.poisson_erosion),
    ]
}

/// Output 0 is the image. When it is empty the Space reports why in output 1.
pub fn hair_result<'a>(space: &str, outputs: &'a [Value]) -> Result<&'a Value, AppError> {
    match outputs.first() {
        Some(result) if !result.is_null() => Ok(result),
        _ => {
            let reason = outputs
                .get(1)
                .and_then(|value| {
                    value
                        .as_str()
                        .or_else(|| value.get("value").and_then(Value::as_str))
                })
                .filter(|message| !message.trim().is_empty())
                .unwrap_or("no image returned");
            Err(AppError::Upstream(format!("{space} hair swap failed: {reason}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_are_title_cased() {
        assert_eq!(display_name("long_wavy-bob"), "Long Wavy Bob");
        assert_eq!(display_name("PIXIE"), "Pixie");
        assert_eq!(display_name("a__b"), "A B");
    }

    #[test]
    fn blending_mode_is_validated() {
        assert!(HairParams::default().validate().is_ok());
        let params = HairParams {
            blending: "Fancy".to_string(),
            ..HairParams::default()
        };
        assert!(matches!(params.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn missing_references_are_sent_as_null() {
        let inputs = swap_hair_inputs("/tmp/face.png", None, Some("/tmp/color.png"), &HairParams::default());
        assert_eq!(inputs.len(), 6);
        assert_eq!(inputs[0]["path"], "/tmp/face.png");
        assert!(inputs[1].is_null());
        assert_eq!(inputs[2]["path"], "/tmp/color.png");
        assert_eq!(inputs[3], "Article");
        assert_eq!(inputs[4], 0);
        assert_eq!(inputs[5], 15);
    }

    #[test]
    fn empty_output_surfaces_space_message() {
        let outputs = vec![Value::Null, json!({ "value": "No face detected", "visible": true })];
        let err = hair_result("hair", &outputs).unwrap_err();
        assert!(matches!(err, AppError::Upstream(ref msg) if msg.contains("No face detected")));

        let outputs = vec![json!({ "path": "/tmp/out.png" })];
        assert_eq!(hair_result("hair", &outputs).unwrap()["path"], "/tmp/out.png");
    }

    #[tokio::test]
    async fn catalog_lists_reference_images() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf(), "/files".to_string());
        storage.put("hairstyles/shapes/pixie_cut.png", b"x").await.unwrap();
        storage.put("hairstyles/shapes/bob.JPG", b"x").await.unwrap();
        storage.put("hairstyles/shapes/notes.txt", b"x").await.unwrap();

        let catalog = HairstyleCatalog::new(storage);
        let shapes = catalog.shapes().await.unwrap();
        let ids: Vec<_> = shapes.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["bob", "pixie_cut"]);
        assert_eq!(shapes[1].name, "Pixie Cut");
        assert_eq!(shapes[1].image, "/files/hairstyles/shapes/pixie_cut.png");

        assert!(catalog.colors().await.unwrap().is_empty());
        assert_eq!(catalog.load(&catalog.find_shape("bob").await.unwrap()).await.unwrap(), b"x");
        assert!(matches!(catalog.find_color("red").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn try_on_requires_a_reference() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf(), "/files".to_string());
        let service = HairstyleService::new("http://127.0.0.1:9".to_string(), None, storage);
        let err = service
            .try_on(b"face".to_vec(), None, None, &HairParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
