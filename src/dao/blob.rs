//! Blob store contract for uploaded submission images.
//!
//! The engine only needs `upload(path, bytes) -> URL`; the returned URL is
//! stored verbatim on the submission row. The filesystem implementation
//! writes under a directory that the HTTP layer serves statically.

use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::storage::{StorageError, StorageResult};

/// Abstraction over the external binary object store.
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` under `path` and return a publicly retrievable URL.
    fn upload(&self, path: String, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<String>>;
}

/// Namespaced object path for a submission image, collision-free via the
/// upload timestamp.
pub fn submission_path(match_id: Uuid, user_id: Uuid) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("matches/{match_id}/{user_id}/{millis}.png")
}

/// Filesystem-backed blob store serving uploads from a public directory.
#[derive(Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
}

impl FsBlobStore {
    /// Create a store rooted at `root`, returning URLs under `base_url`.
    pub fn new(root: PathBuf, base_url: String) -> Self {
        Self {
            root,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

impl BlobStore for FsBlobStore {
    fn upload(&self, path: String, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<String>> {
        let target = self.root.join(&path);
        let url = format!("{}/{}", self.base_url, path);
        Box::pin(async move {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    StorageError::unavailable("failed to create upload directory".into(), source)
                })?;
            }
            tokio::fs::write(&target, bytes).await.map_err(|source| {
                StorageError::unavailable(
                    format!("failed to write upload `{}`", target.display()),
                    source,
                )
            })?;
            Ok(url)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_paths_are_namespaced() {
        let match_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let path = submission_path(match_id, user_id);
        assert!(path.starts_with(&format!("matches/{match_id}/{user_id}/")));
        assert!(path.ends_with(".png"));
    }

    #[tokio::test]
    async fn upload_writes_and_returns_url() {
        let dir = std::env::temp_dir().join(format!("imaginarena-test-{}", Uuid::new_v4()));
        let store = FsBlobStore::new(dir.clone(), "http://localhost:8080/uploads/".into());

        let url = store
            .upload("matches/a/b/1.png".into(), vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8080/uploads/matches/a/b/1.png");

        let written = tokio::fs::read(dir.join("matches/a/b/1.png")).await.unwrap();
        assert_eq!(written, vec![1, 2, 3]);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
