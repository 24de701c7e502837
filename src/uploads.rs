use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, multipart::MultipartError},
};

use crate::{
    error::AppError,
    image_processing,
    storage::{LocalFileStorage, UPLOADS_DIR},
    tryon::blocking,
};

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A stored upload, always PNG.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub key: String,
    pub url: String,
    pub png: Vec<u8>,
}

/// Multipart body split into file parts and plain text fields.
#[derive(Debug, Default)]
pub struct MultipartForm {
    files: HashMap<String, UploadedFile>,
    fields: HashMap<String, String>,
}

impl MultipartForm {
    pub async fn collect(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| read_error("form", err))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| read_error(&format!("file {name}"), err))?;
                    // Browsers send an empty part for an untouched optional file input.
                    if bytes.is_empty() && file_name.is_empty() {
                        continue;
                    }
                    form.insert_file(&name, UploadedFile { file_name, content_type, bytes });
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|err| read_error(&format!("field {name}"), err))?;
                    form.insert_field(&name, text);
                }
            }
        }
        Ok(form)
    }

    pub fn insert_file(&mut self, name: &str, file: UploadedFile) {
        self.files.insert(name.to_string(), file);
    }

    pub fn insert_field(&mut self, name: &str, value: String) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    pub fn require_file(&mut self, name: &str) -> Result<UploadedFile, AppError> {
        self.take_file(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing required file: {name}")))
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn string_or(&self, name: &str, default: &str) -> String {
        self.text(name).unwrap_or(default).to_string()
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, AppError> {
        match self.text(name) {
            None => Ok(default),
            Some(value) => parse_bool(value)
                .ok_or_else(|| AppError::BadRequest(format!("{name} must be a boolean"))),
        }
    }

    pub fn parse_or<T: std::str::FromStr>(&self, name: &str, default: T) -> Result<T, AppError> {
        match self.text(name) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| AppError::BadRequest(format!("{name} must be a number"))),
        }
    }
}

impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        Self::collect(multipart).await
    }
}

/// Keeps the multipart status, so an over-limit body answers 413.
fn read_error(what: &str, err: MultipartError) -> AppError {
    let status = err.status();
    AppError::rejected(status, format!("Failed to read {what}: {}", err.body_text()))
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Stores an upload under `uploads/` as PNG. PNG input is kept byte for byte;
/// anything else is decoded and re-encoded so models only ever see PNG.
pub async fn save_and_convert_to_png(
    storage: &LocalFileStorage,
    upload: UploadedFile,
) -> Result<StoredImage, AppError> {
    if upload.bytes.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Uploaded file is empty: {}",
            upload.file_name
        )));
    }
    if let Some(content_type) = upload.content_type.as_deref() {
        if !content_type.starts_with("image/") && content_type != "application/octet-stream" {
            return Err(AppError::InvalidImage(upload.file_name));
        }
    }

    let png = if image_processing::is_png(&upload.bytes) {
        if let Err(err) = image_processing::get_dimensions(&upload.bytes) {
            tracing::error!(file = %upload.file_name, error = %err, "unreadable PNG upload");
            return Err(AppError::InvalidImage(upload.file_name));
        }
        upload.bytes.to_vec()
    } else {
        let bytes = upload.bytes.clone();
        match blocking(move || image_processing::convert_to_png(&bytes)).await {
            Ok(png) => {
                tracing::info!(file = %upload.file_name, "converted upload to PNG");
                png
            }
            Err(err) => {
                tracing::error!(file = %upload.file_name, error = %err, "failed to convert upload to PNG");
                return Err(AppError::InvalidImage(upload.file_name));
            }
        }
    };

    let key = format!("{UPLOADS_DIR}/{}.png", uuid::Uuid::new_v4());
    storage.put(&key, &png).await?;
    Ok(StoredImage {
        url: storage.get_public_url(&key),
        key,
        png,
    })
}
