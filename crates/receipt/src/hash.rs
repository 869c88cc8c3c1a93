use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Lowercase hex SHA-256 of `data` (64 chars).
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data).iter().map(|b| format!("{b:02x}")).collect()
}

/// Where a stored attachment lives and whether it was already there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub hash_hex: String,
    pub path: PathBuf,
    pub duplicate: bool,
}

/// Content-addressed attachment tree: `<root>/<first 2 hex>/<hash>.<ext>`.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, hash_hex: &str, ext: &str) -> PathBuf {
        let prefix = hash_hex.get(..2).unwrap_or(hash_hex);
        self.root.join(prefix).join(format!("{hash_hex}.{ext}"))
    }

    /// Writes `data` unless identical content is already stored.
    pub async fn store(&self, data: &[u8], ext: &str) -> std::io::Result<StoredAttachment> {
        let hash_hex = sha256_hex(data);
        let path = self.path_for(&hash_hex, ext);

        if tokio::fs::try_exists(&path).await? {
            return Ok(StoredAttachment { hash_hex, path, duplicate: true });
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(StoredAttachment { hash_hex, path, duplicate: false })
    }
}
