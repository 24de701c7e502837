use std::env;
use std::path::PathBuf;

pub const DEFAULT_TRYON_SPACE: &str = "yisol/IDM-VTON";
pub const DEFAULT_HAIR_SPACE: &str = "AIRI-Institute/HairFastGAN";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub datasets_dir: PathBuf,
    pub google_api_key: Option<String>,
    pub custom_search_engine_id: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub hf_token: Option<String>,
    pub tryon_space: String,
    pub hair_space: String,
    pub max_upload_bytes: usize,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = env_value("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8000);
        let host = env_value("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string());

        Self {
            bind_address: format!("{host}:{port}"),
            datasets_dir: resolve_datasets_dir(),
            google_api_key: env_value("GOOGLE_API_KEY"),
            custom_search_engine_id: env_value("CUSTOM_SEARCH_ENGINE_ID"),
            openai_api_key: env_value("OPENAI_API_KEY"),
            openai_model: env_value("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: env_value("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            hf_token: env_value("HF_TOKEN"),
            tryon_space: env_value("TRYON_SPACE")
                .unwrap_or_else(|| DEFAULT_TRYON_SPACE.to_string()),
            hair_space: env_value("HAIR_SPACE").unwrap_or_else(|| DEFAULT_HAIR_SPACE.to_string()),
            max_upload_bytes: env_value("MAX_UPLOAD_BYTES")
                .and_then(|value| value.parse().ok())
                .unwrap_or(50 * 1024 * 1024),
            log_level: env_value("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Configuration rooted at `datasets_dir` with every external key unset.
    pub fn local(datasets_dir: PathBuf) -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            datasets_dir,
            google_api_key: None,
            custom_search_engine_id: None,
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            hf_token: None,
            tryon_space: DEFAULT_TRYON_SPACE.to_string(),
            hair_space: DEFAULT_HAIR_SPACE.to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    non_empty(env::var(name).ok())
}

/// `.env` files commonly carry `KEY=` placeholders; those count as unset.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_datasets_dir() -> PathBuf {
    if let Some(dir) = env_value("DATASETS_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::data_dir() {
        Some(mut base) => {
            base.push("wardrobe-ai");
            base
        }
        None => PathBuf::from("./datasets"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_count_as_unset() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(non_empty(Some(" hf_abc ".to_string())), Some("hf_abc".to_string()));
    }

    #[test]
    fn local_config_has_no_keys() {
        let config = AppConfig::local(PathBuf::from("/tmp/wardrobe"));
        assert!(config.openai_api_key.is_none());
        assert!(config.google_api_key.is_none());
        assert_eq!(config.tryon_space, DEFAULT_TRYON_SPACE);
        assert_eq!(config.hair_space, DEFAULT_HAIR_SPACE);
    }
}
