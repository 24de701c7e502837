use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tokio::fs;

/// Files under the datasets directory, served publicly under `base_url`.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
    base_url: String,
}

impl LocalFileStorage {
    pub fn new(base_dir: PathBuf, base_url: String) -> Self {
        Self { base_dir, base_url }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        missing_as_none(fs::read(self.resolve_path(key)).await)
    }

    /// Writes through a sibling temp file and renames it into place, so a
    /// reader under `/files` never sees a partial image.
    pub async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let target = self.resolve_path(key);
        let parent = target
            .parent()
            .ok_or_else(|| anyhow!("storage key has no parent directory: {key}"))?;
        fs::create_dir_all(parent).await?;

        let staging = parent.join(format!(".{}.partial", uuid::Uuid::new_v4()));
        fs::write(&staging, data).await?;
        if let Err(err) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(err).with_context(|| format!("moving {key} into place"));
        }
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(fs::try_exists(self.resolve_path(key)).await?)
    }

    pub async fn ensure_dirs(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            fs::create_dir_all(self.resolve_path(key)).await?;
        }
        Ok(())
    }

    pub fn get_public_url(&self, key: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let key = key.trim_start_matches('/');
        format!("{base}/{key}")
    }

    /// Maps a public URL produced by [`get_public_url`](Self::get_public_url)
    /// back to its storage key. Keys that would escape the base directory are rejected.
    pub fn key_from_public_url(&self, url: &str) -> Option<String> {
        let base = self.base_url.trim_end_matches('/');
        let key = url.strip_prefix(base)?.strip_prefix('/')?;
        let key = key.split(['?', '#']).next().unwrap_or(key);
        if key.is_empty() {
            return None;
        }
        let safe = Path::new(key)
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        safe.then(|| key.to_string())
    }

    pub fn resolve_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(key.trim_start_matches('/'))
    }
}

fn missing_as_none<T>(result: std::io::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> LocalFileStorage {
        LocalFileStorage::new(PathBuf::from("/data"), "/files/".to_string())
    }

    #[test]
    fn public_url_joins_cleanly() {
        assert_eq!(
            storage().get_public_url("/generated/a.png"),
            "/files/generated/a.png"
        );
    }

    #[test]
    fn public_url_maps_back_to_key() {
        let storage = storage();
        assert_eq!(
            storage.key_from_public_url("/files/generated/a.png?v=1"),
            Some("generated/a.png".to_string())
        );
        assert_eq!(storage.key_from_public_url("/files/../etc/passwd"), None);
        assert_eq!(storage.key_from_public_url("/elsewhere/a.png"), None);
        assert_eq!(storage.key_from_public_url("/files/"), None);
    }

    #[tokio::test]
    async fn put_creates_parents_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf(), "/files".to_string());

        assert!(!storage.exists("uploads/x.png").await.unwrap());
        storage.put("uploads/x.png", b"abc").await.unwrap();
        assert!(storage.exists("uploads/x.png").await.unwrap());
        assert_eq!(storage.get("uploads/x.png").await.unwrap(), Some(b"abc".to_vec()));
        assert_eq!(storage.get("uploads/missing.png").await.unwrap(), None);

        storage.put("uploads/x.png", b"replaced").await.unwrap();
        assert_eq!(storage.get("uploads/x.png").await.unwrap(), Some(b"replaced".to_vec()));
        let mut entries = tokio::fs::read_dir(dir.path().join("uploads")).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, ["x.png"]);
    }
}
