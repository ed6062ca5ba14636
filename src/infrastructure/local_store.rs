//! Filesystem object store with HMAC-signed, expiring read URLs.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::fs;

use crate::domain::{
    error::StorageError,
    gateways::{ObjectStore, Visibility},
};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: String,
    signing_key: Vec<u8>,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>, signing_key: impl AsRef<[u8]>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signing_key: signing_key.as_ref().to_vec(),
        }
    }

    /// Keys without a visibility prefix live in the public partition.
    fn qualified(key: &str, visibility: Visibility) -> String {
        let key = key.trim_start_matches('/');
        let prefixed = [Visibility::Public, Visibility::Protected, Visibility::Private]
            .iter()
            .any(|v| key.starts_with(&format!("{}/", v.prefix())));
        if prefixed { key.to_string() } else { format!("{}/{}", visibility.prefix(), key) }
    }

    fn path_for(&self, qualified: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(qualified);
        if qualified.is_empty() || rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(StorageError::InvalidKey(qualified.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn mac(&self, qualified: &str, expires: i64) -> Result<HmacSha256, StorageError> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key).map_err(|e| StorageError::Signing(e.to_string()))?;
        mac.update(qualified.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    fn signature(&self, qualified: &str, expires: i64) -> Result<String, StorageError> {
        Ok(hex::encode(self.mac(qualified, expires)?.finalize().into_bytes()))
    }

    /// Checks a URL produced by [`ObjectStore::signed_url`] and returns the
    /// object path when the signature matches and has not expired.
    pub fn verify(&self, key: &str, expires: i64, signature: &str) -> Result<PathBuf, StorageError> {
        let qualified = Self::qualified(key, Visibility::Public);
        let Ok(provided) = hex::decode(signature) else { return Err(StorageError::InvalidKey(key.to_string())) };
        let mac = self.mac(&qualified, expires)?;
        if mac.verify_slice(&provided).is_err() || expires < Utc::now().timestamp() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        self.path_for(&qualified)
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(path.display().to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, visibility: Visibility) -> Result<String, StorageError> {
        let path = self.path_for(&Self::qualified(key, visibility))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(key.to_string())
    }

    async fn signed_url(&self, key: &str, ttl_secs: u64) -> Result<String, StorageError> {
        let qualified = Self::qualified(key, Visibility::Public);
        let path = self.path_for(&qualified)?;
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let expires = Utc::now().timestamp() + i64::try_from(ttl_secs).unwrap_or(i64::MAX / 2);
        let signature = self.signature(&qualified, expires)?;
        Ok(format!("{}/files/{}?expires={}&signature={}", self.base_url, qualified, expires, signature))
    }

    async fn delete(&self, key: &str, visibility: Visibility) -> Result<(), StorageError> {
        let path = self.path_for(&Self::qualified(key, visibility))?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> LocalObjectStore {
        LocalObjectStore::new(dir.path(), "http://localhost:3000/", "secret")
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        url.split(['?', '&'])
            .find_map(|kv| kv.strip_prefix(&format!("{name}=")))
            .unwrap()
    }

    #[tokio::test]
    async fn put_then_signed_url_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let key = store.put("todos/1-a.png", b"png".to_vec(), Visibility::Public).await.unwrap();
        assert_eq!(key, "todos/1-a.png");
        assert!(dir.path().join("public/todos/1-a.png").exists());

        let url = store.signed_url(&key, 3600).await.unwrap();
        assert!(url.starts_with("http://localhost:3000/files/public/todos/1-a.png?expires="));
        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let signature = query_param(&url, "signature");
        let path = store.verify("public/todos/1-a.png", expires, signature).unwrap();
        assert_eq!(store.read(&path).await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn verify_rejects_tampering_and_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.put("todos/a.png", vec![1], Visibility::Public).await.unwrap();
        let url = store.signed_url("todos/a.png", 60).await.unwrap();
        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let signature = query_param(&url, "signature");

        assert!(store.verify("todos/b.png", expires, signature).is_err());
        assert!(store.verify("todos/a.png", expires + 1, signature).is_err());

        let stale = Utc::now().timestamp() - 10;
        let stale_sig = store.signature("public/todos/a.png", stale).unwrap();
        assert!(store.verify("todos/a.png", stale, &stale_sig).is_err());
    }

    #[tokio::test]
    async fn missing_objects_and_bad_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(matches!(store.signed_url("todos/none.png", 60).await, Err(StorageError::NotFound(_))));
        assert!(matches!(store.delete("todos/none.png", Visibility::Public).await, Err(StorageError::NotFound(_))));
        assert!(matches!(
            store.put("../escape.png", vec![], Visibility::Public).await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn delete_accepts_prefixed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.put("todos/a.png", vec![1], Visibility::Public).await.unwrap();
        store.delete("public/todos/a.png", Visibility::Public).await.unwrap();
        assert!(!dir.path().join("public/todos/a.png").exists());
    }
}
