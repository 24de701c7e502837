use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Duration;
use url::Url;

const CUSTOM_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
const PRODUCT_SITES: &str =
    "site:amazon.com OR site:nike.com/t OR site:dickssportinggoods.com/p OR site:footlocker.com/product";
const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/300x400?text=No+Image";
const MAX_RESULTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub link: String,
    pub image: String,
    pub price: String,
    pub brand: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Value>,
}

/// Product lookup through Google Custom Search. Without credentials, or when
/// the API fails, canned results are returned instead of an error.
pub struct ProductSearchService {
    client: Client,
    api_key: Option<String>,
    engine_id: Option<String>,
}

impl ProductSearchService {
    pub fn new(api_key: Option<String>, engine_id: Option<String>) -> Self {
        if api_key.is_none() {
            tracing::warn!("GOOGLE_API_KEY not set; product search will return fallback results");
        }
        if engine_id.is_none() {
            tracing::warn!("CUSTOM_SEARCH_ENGINE_ID not set; product search will return fallback results");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            engine_id,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.engine_id.is_some()
    }

    pub async fn search_products(&self, query: &str, num_results: u32) -> Vec<Product> {
        let (Some(api_key), Some(engine_id)) = (self.api_key.as_deref(), self.engine_id.as_deref())
        else {
            tracing::warn!(query = %query, "product search not configured, returning fallback results");
            return fallback_results(query);
        };

        match self.query_api(api_key, engine_id, query, num_results).await {
            Ok(items) => {
                let products: Vec<Product> = items.iter().map(format_item).collect();
                tracing::info!(query = %query, results = products.len(), "product search completed");
                products
            }
            Err(err) => {
                tracing::error!(query = %query, error = %err, "product search failed, returning fallback results");
                fallback_results(query)
            }
        }
    }

    async fn query_api(
        &self,
        api_key: &str,
        engine_id: &str,
        query: &str,
        num_results: u32,
    ) -> anyhow::Result<Vec<Value>> {
        let enhanced_query = format!("{query} {PRODUCT_SITES}");
        let num = num_results.clamp(1, MAX_RESULTS).to_string();
        tracing::debug!(query = %enhanced_query, num = %num, "querying Custom Search");

        let response = self
            .client
            .get(CUSTOM_SEARCH_URL)
            .query(&[
                ("key", api_key),
                ("cx", engine_id),
                ("q", enhanced_query.as_str()),
                ("num", num.as_str()),
                ("gl", "us"),
                ("cr", "countryUS"),
                ("lr", "lang_en"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Custom Search request failed: {status} {text}");
        }
        let payload: SearchResponse = response.json().await?;
        Ok(payload.items)
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// First element of `pagemap.<section>`.
fn pagemap_first<'a>(item: &'a Value, section: &str) -> Option<&'a Value> {
    item.get("pagemap")?.get(section)?.as_array()?.first()
}

pub fn format_item(item: &Value) -> Product {
    let mut image = extract_image(item);

    // Google thumbnails are low resolution; prefer the page's own image.
    if image.contains("gstatic.com") || image.contains("placeholder") {
        if let Some(metatags) = pagemap_first(item, "metatags") {
            let upgraded = ["og:image:secure_url", "og:image", "twitter:image:src", "twitter:image"]
                .iter()
                .map(|field| str_field(metatags, field))
                .find(|candidate| !candidate.contains("gstatic") && candidate.len() > 30);
            if let Some(candidate) = upgraded {
                image = candidate.to_string();
            }
        }
    }

    let link = str_field(item, "link").to_string();
    Product {
        id: link.clone(),
        name: str_field(item, "title").to_string(),
        description: str_field(item, "snippet").to_string(),
        link,
        image,
        price: extract_price(item),
        brand: extract_brand(item),
    }
}

fn is_icon_or_logo(url: &str) -> bool {
    url.contains("android-icon") || url.to_lowercase().contains("logo")
}

pub fn extract_image(item: &Value) -> String {
    if let Some(product) = pagemap_first(item, "product") {
        let img = str_field(product, "image");
        let looks_like_image = [".png", ".jpg", ".jpeg"].iter().any(|ext| img.ends_with(ext));
        if !img.is_empty()
            && (looks_like_image || img.contains("android-icon"))
            && !img.to_lowercase().contains("placeholder")
        {
            return img.to_string();
        }
    }

    for (section, field) in [("cse_thumbnail", "src"), ("cse_image", "src")] {
        if let Some(entry) = pagemap_first(item, section) {
            let img = str_field(entry, field);
            if !img.is_empty() && !is_icon_or_logo(img) {
                return img.to_string();
            }
        }
    }

    if let Some(metatags) = pagemap_first(item, "metatags") {
        for field in ["og:image", "twitter:image", "image"] {
            let img = str_field(metatags, field);
            if !img.is_empty() && !is_icon_or_logo(img) && img.len() > 20 {
                return img.to_string();
            }
        }
    }

    PLACEHOLDER_IMAGE.to_string()
}

pub fn extract_price(item: &Value) -> String {
    if let Some(offer) = pagemap_first(item, "offer") {
        let price = str_field(offer, "price");
        if !price.is_empty() {
            let currency = offer
                .get("pricecurrency")
                .and_then(Value::as_str)
                .unwrap_or("USD");
            return format!("{currency} {price}");
        }
    }

    str_field(item, "snippet")
        .split_whitespace()
        .find(|word| word.contains('$'))
        .map(str::to_string)
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn extract_brand(item: &Value) -> String {
    if let Some(product) = pagemap_first(item, "product") {
        let brand = str_field(product, "brand");
        if !brand.is_empty() {
            return brand.to_string();
        }
    }
    if let Some(metatags) = pagemap_first(item, "metatags") {
        let site = str_field(metatags, "og:site_name");
        if !site.is_empty() {
            return site.to_string();
        }
    }

    let link = str_field(item, "link");
    Url::parse(link)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .and_then(|host| {
            let host = host.replace("www.", "");
            host.split('.').next().filter(|s| !s.is_empty()).map(title_case)
        })
        .unwrap_or_else(|| "Unknown".to_string())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

pub fn fallback_results(query: &str) -> Vec<Product> {
    tracing::info!(query = %query, "returning fallback search results");
    [
        ("Nike", "https://www.nike.com/", format!("Find {query} at Nike.com. Free delivery and returns.")),
        ("Adidas", "https://www.adidas.com/", format!("Shop {query} at Adidas. Premium quality sportswear.")),
        ("Zara", "https://www.zara.com/", format!("Discover {query} at Zara. Latest fashion trends.")),
    ]
    .into_iter()
    .map(|(brand, link, description)| Product {
        id: link.to_string(),
        name: format!("{brand} {query}"),
        description,
        link: link.to_string(),
        image: format!("https://via.placeholder.com/300x400?text={brand}"),
        price: "N/A".to_string(),
        brand: brand.to_string(),
    })
    .collect()
}
