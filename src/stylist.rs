use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::time::Duration;

use crate::{
    error::AppError,
    image_processing,
    search::{Product, ProductSearchService},
    storage::{LocalFileStorage, short_hash},
    validation::validate_http_url,
};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ANALYSIS_PROMPT: &str =
    "Analyze this fashion image and describe the style, colors, patterns, and suggest similar items.";
const MAX_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylistContext {
    pub closet_name: Option<String>,
    pub closet_type: Option<String>,
    #[serde(default)]
    pub preferences: Option<Value>,
}

/// Shopping preferences. Prices arrive as numbers or strings depending on the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub purpose: Option<String>,
    pub brands: Option<String>,
    pub min_price: Option<Value>,
    pub max_price: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// AI stylist backed by the OpenAI chat completions API.
pub struct StylistService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl StylistService {
    pub fn new(api_key: Option<String>, base_url: String, model: String) -> Self {
        if api_key.is_some() {
            tracing::info!(model = %model, "stylist service initialized");
        } else {
            tracing::warn!("OPENAI_API_KEY not set; AI stylist features are unavailable");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(AppError::MissingApiKey("OPENAI_API_KEY"))
    }

    pub async fn chat(
        &self,
        messages: &[ChatTurn],
        context: Option<&StylistContext>,
    ) -> Result<String, AppError> {
        let api_key = self.api_key()?;
        let mut formatted = vec![ChatMessage {
            role: "system",
            content: Value::String(system_prompt(context)),
        }];
        formatted.extend(messages.iter().map(|turn| ChatMessage {
            role: if turn.kind == "user" { "user" } else { "assistant" },
            content: Value::String(turn.text.clone()),
        }));

        self.complete(
            api_key,
            json!({
                "model": self.model,
                "messages": formatted,
                "temperature": 0.7,
                "max_tokens": 500,
            }),
        )
        .await
    }

    /// `image_url` may be a public http(s) URL or a `/files/...` path on this
    /// server, which is inlined since the remote API cannot fetch it.
    pub async fn analyze_image(
        &self,
        storage: &LocalFileStorage,
        image_url: &str,
        prompt: Option<&str>,
    ) -> Result<String, AppError> {
        let api_key = self.api_key()?;
        let image_ref = resolve_image_reference(storage, image_url).await?;
        let prompt = prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or(DEFAULT_ANALYSIS_PROMPT);

        self.complete(
            api_key,
            json!({
                "model": self.model,
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": prompt },
                        { "type": "image_url", "image_url": { "url": image_ref } },
                    ],
                }],
                "max_tokens": 500,
            }),
        )
        .await
    }

    /// Asks the model for five item types, then finds one real product per type.
    pub async fn recommendations(
        &self,
        preferences: &Preferences,
        search: &ProductSearchService,
    ) -> Result<Vec<Product>, AppError> {
        let api_key = self.api_key()?;
        let items_text = self
            .complete(
                api_key,
                json!({
                    "model": self.model,
                    "messages": [{ "role": "user", "content": recommendation_prompt(preferences) }],
                    "temperature": 0.8,
                    "max_tokens": 100,
                }),
            )
            .await?;
        let item_types = parse_item_types(&items_text);
        tracing::info!(item_types = ?item_types, "stylist suggested item types");

        let mut products = Vec::new();
        for item_type in item_types.iter().take(MAX_RECOMMENDATIONS) {
            let query = recommendation_query(preferences.brands.as_deref(), item_type);
            tracing::info!(query = %query, "searching products for recommendation");
            if let Some(product) = search.search_products(&query, 2).await.into_iter().next() {
                products.push(product);
            }
        }
        assign_missing_ids(&mut products);
        products.truncate(MAX_RECOMMENDATIONS);
        tracing::info!(count = products.len(), "recommendations ready");
        Ok(products)
    }

    async fn complete(&self, api_key: &str, body: Value) -> Result<String, AppError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("OpenAI API request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %text, "OpenAI API error");
            return Err(AppError::Upstream(format!("OpenAI API error: {}", status.as_u16())));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| AppError::Upstream(format!("Failed to parse OpenAI response: {err}")))?;
        payload
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| AppError::Upstream("OpenAI returned no content".to_string()))
    }
}

pub fn system_prompt(context: Option<&StylistContext>) -> String {
    let closet_name = context
        .and_then(|c| c.closet_name.as_deref())
        .unwrap_or("General Wardrobe");
    let closet_type = context
        .and_then(|c| c.closet_type.as_deref())
        .unwrap_or("Mixed");
    let preferences = context
        .and_then(|c| c.preferences.clone())
        .unwrap_or_else(|| json!({}));

    format!(
        "You are a professional AI fashion stylist. You help users find clothing that matches their style, preferences, and needs.\n\n\
Current context:\n\
- Closet: {closet_name}\n\
- Type: {closet_type}\n\
- User preferences: {preferences}\n\n\
Be helpful, friendly, and provide specific fashion advice. When users describe what they're looking for, suggest specific styles, brands, colors, and combinations."
    )
}

fn price_text(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}

pub fn recommendation_prompt(preferences: &Preferences) -> String {
    let purpose = preferences.purpose.as_deref().unwrap_or("casual");
    let brands = preferences.brands.as_deref().unwrap_or("any");
    let min_price = price_text(preferences.min_price.as_ref(), "0");
    let max_price = price_text(preferences.max_price.as_ref(), "200");

    format!(
        "Based on these preferences, suggest 5 DIFFERENT men's clothing item types suitable for {purpose}.\n\
- Brands: {brands}\n\
- Price Range: ${min_price}-${max_price}\n\n\
Return ONLY 5 specific item types, one per line, 2-4 words each. Make them diverse (e.g., one top, one bottom, one shoes, etc.).\n\
Examples: \"performance running shorts\", \"crew neck t-shirt\", \"training joggers\", \"athletic sneakers\", \"zip-up hoodie\"\n\n\
Item 1:\nItem 2:\nItem 3:\nItem 4:\nItem 5:"
    )
}

/// One item type per line; `Item 1:` and `1.` style prefixes are stripped.
pub fn parse_item_types(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let line = match line.split_once(':') {
                Some((_, rest)) => rest.trim(),
                None if line.starts_with(|c: char| c.is_ascii_digit()) => line
                    .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-'))
                    .trim(),
                None => line,
            };
            let line = line.trim_matches('"');
            (line.chars().count() > 3).then(|| line.to_string())
        })
        .collect()
}

pub fn recommendation_query(brands: Option<&str>, item_type: &str) -> String {
    match brands.map(str::trim) {
        Some(brand) if !brand.is_empty() && !brand.eq_ignore_ascii_case("any") => {
            format!("{brand} men's {item_type}")
        }
        _ => format!("men's {item_type}"),
    }
}

fn assign_missing_ids(products: &mut [Product]) {
    for (index, product) in products.iter_mut().enumerate() {
        if product.id.is_empty() {
            product.id = format!("prod_{index}_{}", short_hash(&product.name, 12));
        }
    }
}

async fn resolve_image_reference(
    storage: &LocalFileStorage,
    image_url: &str,
) -> Result<String, AppError> {
    if let Some(key) = storage.key_from_public_url(image_url.trim()) {
        let bytes = storage
            .get(&key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image not found: {image_url}")))?;
        let mime_type = image_processing::detect_mime_type(&bytes)
            .ok_or_else(|| AppError::InvalidImage(image_url.to_string()))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        return Ok(format!("data:{mime_type};base64,{encoded}"));
    }
    if image_url.trim_start().starts_with("data:image/") {
        return Ok(image_url.trim().to_string());
    }
    Ok(validate_http_url(image_url)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> StylistService {
        StylistService::new(None, "https://api.openai.com/v1".to_string(), "gpt-4o-mini".to_string())
    }

    fn storage(dir: &std::path::Path) -> LocalFileStorage {
        LocalFileStorage::new(dir.to_path_buf(), "/files".to_string())
    }

    #[tokio::test]
    async fn every_operation_requires_an_api_key() {
        let service = unconfigured();
        let dir = tempfile::tempdir().unwrap();
        let turns = vec![ChatTurn { kind: "user".into(), text: "hi".into() }];

        let err = service.chat(&turns, None).await.unwrap_err();
        assert!(matches!(err, AppError::MissingApiKey("OPENAI_API_KEY")));

        let err = service
            .analyze_image(&storage(dir.path()), "https://example.com/a.jpg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingApiKey(_)));

        let search = ProductSearchService::new(None, None);
        let err = service
            .recommendations(&Preferences::default(), &search)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingApiKey(_)));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let service = StylistService::new(Some("  ".into()), "https://x".into(), "m".into());
        assert!(matches!(service.api_key(), Err(AppError::MissingApiKey(_))));
    }

    #[test]
    fn system_prompt_uses_context_or_defaults() {
        let prompt = system_prompt(None);
        assert!(prompt.contains("- Closet: General Wardrobe"));
        assert!(prompt.contains("- Type: Mixed"));
        assert!(prompt.contains("- User preferences: {}"));

        let context = StylistContext {
            closet_name: Some("Gym Bag".into()),
            closet_type: Some("Athletic".into()),
            preferences: Some(json!({ "color": "black" })),
        };
        let prompt = system_prompt(Some(&context));
        assert!(prompt.contains("- Closet: Gym Bag"));
        assert!(prompt.contains(r#"{"color":"black"}"#));
    }

    #[test]
    fn item_types_are_parsed_from_numbered_lines() {
        let text = "Item 1: performance running shorts\nItem 2: crew neck t-shirt\n3. training joggers\n4) athletic sneakers\n\n\"zip-up hoodie\"\nItem 6: ok";
        assert_eq!(
            parse_item_types(text),
            [
                "performance running shorts",
                "crew neck t-shirt",
                "training joggers",
                "athletic sneakers",
                "zip-up hoodie",
            ]
        );
    }

    #[test]
    fn query_includes_brand_unless_any() {
        assert_eq!(recommendation_query(Some("Nike"), "joggers"), "Nike men's joggers");
        assert_eq!(recommendation_query(Some("Any"), "joggers"), "men's joggers");
        assert_eq!(recommendation_query(Some(""), "joggers"), "men's joggers");
        assert_eq!(recommendation_query(None, "joggers"), "men's joggers");
    }

    #[test]
    fn prompt_renders_numeric_and_string_prices() {
        let preferences: Preferences = serde_json::from_value(json!({
            "purpose": "running",
            "brands": "Nike",
            "minPrice": 20,
            "maxPrice": "150",
            "size": "M"
        }))
        .unwrap();
        let prompt = recommendation_prompt(&preferences);
        assert!(prompt.contains("suitable for running."));
        assert!(prompt.contains("- Brands: Nike"));
        assert!(prompt.contains("- Price Range: $20-$150"));
        assert_eq!(preferences.extra.get("size"), Some(&json!("M")));

        let prompt = recommendation_prompt(&Preferences::default());
        assert!(prompt.contains("suitable for casual."));
        assert!(prompt.contains("- Price Range: $0-$200"));
    }

    #[test]
    fn missing_ids_are_synthesized() {
        let mut products = vec![Product {
            id: String::new(),
            name: "Crew Tee".into(),
            description: String::new(),
            link: String::new(),
            image: String::new(),
            price: "N/A".into(),
            brand: "Nike".into(),
        }];
        assign_missing_ids(&mut products);
        assert!(products[0].id.starts_with("prod_0_"));
        assert_eq!(products[0].id.len(), "prod_0_".len() + 12);
    }

    #[tokio::test]
    async fn local_files_are_inlined_as_data_urls() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        storage.put("generated/look.png", &png).await.unwrap();

        let reference = resolve_image_reference(&storage, "/files/generated/look.png")
            .await
            .unwrap();
        assert!(reference.starts_with("data:image/png;base64,"));

        let err = resolve_image_reference(&storage, "/files/generated/missing.png")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = resolve_image_reference(&storage, "ftp://example.com/a.png")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert_eq!(
            resolve_image_reference(&storage, "https://example.com/a.png").await.unwrap(),
            "https://example.com/a.png"
        );
    }
}
