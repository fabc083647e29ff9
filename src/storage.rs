use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid asset path: {0}")]
    InvalidPath(String),
}

/// Descriptor kept on catalog records for an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredAsset {
    pub secure_url: String,
    pub public_id: String,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Copy `source` into `folder`. With `public_id` set the existing asset is
    /// overwritten in place and keeps its identifier.
    async fn upload(
        &self,
        source: &Path,
        folder: &str,
        public_id: Option<&str>,
    ) -> Result<StoredAsset, StorageError>;

    /// Remove every asset under `folder`. Missing folders are not an error.
    async fn delete_folder(&self, folder: &str) -> Result<(), StorageError>;
}

/// Asset store backed by a local directory whose contents are served under
/// `base_url`.
pub struct LocalAssetStore {
    root: PathBuf,
    base_url: String,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(relative);
        if relative.is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn upload(
        &self,
        source: &Path,
        folder: &str,
        public_id: Option<&str>,
    ) -> Result<StoredAsset, StorageError> {
        let public_id = match public_id {
            Some(id) => id.to_string(),
            None => {
                let ext = source
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| format!(".{}", e.to_ascii_lowercase()))
                    .unwrap_or_default();
                format!("{folder}/{}{ext}", random_id(12).to_ascii_lowercase())
            }
        };
        let target = self.resolve(&public_id)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, &target).await?;

        Ok(StoredAsset {
            secure_url: format!("{}/{}", self.base_url, public_id),
            public_id,
        })
    }

    async fn delete_folder(&self, folder: &str) -> Result<(), StorageError> {
        let path = self.resolve(folder)?;
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub fn random_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Short identifier namespacing one catalog entity's assets.
pub fn new_folder_id() -> String {
    random_id(4)
}

pub fn category_folder(main: &str, category: &str) -> String {
    format!("{main}/Categories/{category}")
}

pub fn sub_category_folder(main: &str, category: &str, sub_category: &str) -> String {
    format!(
        "{}/SubCategories/{sub_category}",
        category_folder(main, category)
    )
}

pub fn brand_folder(main: &str, category: &str, sub_category: &str, brand: &str) -> String {
    format!(
        "{}/Brands/{brand}",
        sub_category_folder(main, category, sub_category)
    )
}

pub fn product_folder(
    main: &str,
    category: &str,
    sub_category: &str,
    brand: &str,
    product: &str,
) -> String {
    format!(
        "{}/Products/{product}",
        brand_folder(main, category, sub_category, brand)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_layout_nests_entities() {
        assert_eq!(
            product_folder("ecommerce", "c1", "s1", "b1", "p1"),
            "ecommerce/Categories/c1/SubCategories/s1/Brands/b1/Products/p1"
        );
    }

    #[test]
    fn folder_ids_are_short_alphanumerics() {
        let id = new_folder_id();
        assert_eq!(id.len(), 4);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn upload_and_delete_folder() {
        let root = tempfile::tempdir().unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("pic.PNG");
        tokio::fs::write(&source, b"png-bytes").await.unwrap();

        let store = LocalAssetStore::new(root.path(), "http://cdn.local/assets/");
        let asset = store
            .upload(&source, "ecommerce/Categories/ab12", None)
            .await
            .unwrap();

        assert!(asset.public_id.starts_with("ecommerce/Categories/ab12/"));
        assert!(asset.public_id.ends_with(".png"));
        assert_eq!(
            asset.secure_url,
            format!("http://cdn.local/assets/{}", asset.public_id)
        );
        assert!(root.path().join(&asset.public_id).exists());

        store.delete_folder("ecommerce/Categories/ab12").await.unwrap();
        assert!(!root.path().join("ecommerce/Categories/ab12").exists());
        store.delete_folder("ecommerce/Categories/ab12").await.unwrap();
    }

    #[tokio::test]
    async fn upload_with_public_id_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let first = src_dir.path().join("a.jpg");
        let second = src_dir.path().join("b.jpg");
        tokio::fs::write(&first, b"one").await.unwrap();
        tokio::fs::write(&second, b"two").await.unwrap();

        let store = LocalAssetStore::new(root.path(), "http://cdn.local");
        let original = store.upload(&first, "f", None).await.unwrap();
        let replaced = store
            .upload(&second, "f", Some(&original.public_id))
            .await
            .unwrap();

        assert_eq!(original.public_id, replaced.public_id);
        let bytes = tokio::fs::read(root.path().join(&replaced.public_id))
            .await
            .unwrap();
        assert_eq!(bytes, b"two");
    }

    #[tokio::test]
    async fn parent_traversal_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(root.path(), "http://cdn.local");
        let err = store.delete_folder("../etc").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }
}
