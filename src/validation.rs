use url::Url;

use crate::error::AppError;

pub fn validate_http_url(raw: &str) -> Result<Url, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("image_url must not be empty".to_string()));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|err| AppError::BadRequest(format!("Invalid image_url: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(AppError::BadRequest(format!(
            "Only http and https image URLs are supported, got {scheme}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_http_url(" https://example.com/look.jpg ").is_ok());
        assert!(validate_http_url("http://example.com/look.jpg").is_ok());
    }

    #[test]
    fn rejects_other_input() {
        assert!(matches!(validate_http_url(""), Err(AppError::BadRequest(_))));
        assert!(matches!(validate_http_url("not a url"), Err(AppError::BadRequest(_))));
        assert!(matches!(validate_http_url("file:///etc/passwd"), Err(AppError::BadRequest(_))));
    }
}
