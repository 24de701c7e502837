use std::path::Path;

use anyhow::Result;
use tokio::fs;

use crate::storage::{LocalFileStorage, TryOnRecord, short_hash};

const RECORDS_DIR: &str = "records";

/// A record shares its name with the generated image it describes, so
/// `generated/<uuid>.png` is described by `records/<uuid>.json`.
fn record_key(result_url: &str) -> String {
    let stem = Path::new(result_url)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| short_hash(result_url, 32));
    format!("{RECORDS_DIR}/{stem}.json")
}

pub async fn save_tryon_record(storage: &LocalFileStorage, record: &TryOnRecord) -> Result<()> {
    let payload = serde_json::to_vec_pretty(record)?;
    storage.put(&record_key(&record.result_url), &payload).await
}

/// Newest first by `created_at`. `kind == "all"` returns every kind.
pub async fn list_tryon_records(
    storage: &LocalFileStorage,
    limit: usize,
    kind: &str,
) -> Result<Vec<TryOnRecord>> {
    let mut dir = match fs::read_dir(storage.resolve_path(RECORDS_DIR)).await {
        Ok(dir) => dir,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut records = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let bytes = fs::read(&path).await?;
        match serde_json::from_slice::<TryOnRecord>(&bytes) {
            Ok(record) if kind == "all" || record.kind.as_str() == kind => records.push(record),
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable try-on record");
            }
        }
    }
    // RFC 3339 timestamps in UTC order lexicographically.
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records.truncate(limit);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TryOnKind;

    fn record(kind: TryOnKind, result: &str, created_at: &str) -> TryOnRecord {
        TryOnRecord {
            kind,
            result_url: result.to_string(),
            inputs: vec!["/files/uploads/in.png".to_string()],
            parameters: serde_json::json!({ "seed": 42 }),
            created_at: created_at.to_string(),
        }
    }

    #[tokio::test]
    async fn lists_newest_first_and_filters_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf(), "/files".to_string());

        save_tryon_record(&storage, &record(TryOnKind::Clothing, "/files/generated/a.png", "2026-01-01T10:00:00Z"))
            .await
            .unwrap();
        save_tryon_record(&storage, &record(TryOnKind::Hairstyle, "/files/generated/b.png", "2026-01-02T10:00:00Z"))
            .await
            .unwrap();
        save_tryon_record(&storage, &record(TryOnKind::Clothing, "/files/generated/c.png", "2026-01-03T10:00:00Z"))
            .await
            .unwrap();

        let all = list_tryon_records(&storage, 10, "all").await.unwrap();
        let urls: Vec<_> = all.iter().map(|r| r.result_url.as_str()).collect();
        assert_eq!(
            urls,
            ["/files/generated/c.png", "/files/generated/b.png", "/files/generated/a.png"]
        );

        let clothing = list_tryon_records(&storage, 10, "clothing").await.unwrap();
        assert_eq!(clothing.len(), 2);
        assert!(clothing.iter().all(|r| r.kind == TryOnKind::Clothing));

        let limited = list_tryon_records(&storage, 1, "all").await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn record_is_named_after_the_result_image() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf(), "/files".to_string());
        let url = "/files/generated/7f1c2a9e-3b4d-4e5f-8a6b-0c1d2e3f4a5b.png";

        save_tryon_record(&storage, &record(TryOnKind::Hairstyle, url, "2026-02-01T08:00:00Z"))
            .await
            .unwrap();
        assert!(
            storage
                .exists("records/7f1c2a9e-3b4d-4e5f-8a6b-0c1d2e3f4a5b.json")
                .await
                .unwrap()
        );
        let listed = list_tryon_records(&storage, 5, "hairstyle").await.unwrap();
        assert_eq!(listed[0].result_url, url);
    }

    #[tokio::test]
    async fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf(), "/files".to_string());
        assert!(list_tryon_records(&storage, 5, "all").await.unwrap().is_empty());
    }
}
