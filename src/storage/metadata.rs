use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TryOnKind {
    Clothing,
    Hairstyle,
}

impl TryOnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TryOnKind::Clothing => "clothing",
            TryOnKind::Hairstyle => "hairstyle",
        }
    }
}

/// One completed try-on, persisted next to the generated image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryOnRecord {
    pub kind: TryOnKind,
    pub result_url: String,
    pub inputs: Vec<String>,
    pub parameters: serde_json::Value,
    pub created_at: String,
}
