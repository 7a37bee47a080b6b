//! Asset store: binary blobs addressed by a url-or-path reference.
//!
//! Local blobs live under an upload tree and are referenced as
//! `/files/{folder}/{filename}`; anything starting with `http(s)://` is
//! fetched remotely. The render pipeline only ever does `put` into the
//! `rendered/` folder and `get` of whatever reference a document carries.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::util;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote fetch failed: {0}")]
    Fetch(String),
    #[error("remote fetch returned http {0}")]
    FetchStatus(u16),
    #[error("unsupported asset reference: {0}")]
    UnsupportedRef(String),
}

const LOCAL_PREFIX: &str = "/files/";

#[derive(Clone)]
pub struct AssetStore {
    root: PathBuf,
    http: reqwest::Client,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>, http: reqwest::Client) -> Self {
        Self { root: root.into(), http }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store bytes under a fresh id and return the reference for documents.
    pub async fn put(&self, bytes: &[u8], folder: &str, ext: &str) -> Result<String, AssetError> {
        let filename = format!("{}{}", util::new_id(), ext);
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&filename), bytes).await?;
        Ok(format!("{LOCAL_PREFIX}{folder}/{filename}"))
    }

    /// Load the bytes behind a stored reference (local path or remote url).
    pub async fn get(&self, reference: &str) -> Result<Vec<u8>, AssetError> {
        if let Some(rel) = reference.strip_prefix(LOCAL_PREFIX) {
            let rel = sanitize(rel)
                .ok_or_else(|| AssetError::UnsupportedRef(reference.to_string()))?;
            return Ok(tokio::fs::read(self.root.join(rel)).await?);
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let resp = self
                .http
                .get(reference)
                .send()
                .await
                .map_err(|e| AssetError::Fetch(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(AssetError::FetchStatus(resp.status().as_u16()));
            }
            let bytes = resp.bytes().await.map_err(|e| AssetError::Fetch(e.to_string()))?;
            return Ok(bytes.to_vec());
        }
        Err(AssetError::UnsupportedRef(reference.to_string()))
    }

    /// Whether a reference points into the local upload tree.
    pub fn is_local(reference: &str) -> bool {
        reference.starts_with(LOCAL_PREFIX)
    }
}

/// Reject references escaping the upload tree.
fn sanitize(rel: &str) -> Option<PathBuf> {
    let path = Path::new(rel);
    if path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Some(path.to_path_buf())
    } else {
        None
    }
}

pub fn media_type_for(filename: &str) -> &'static str {
    if filename.ends_with(".jpg") || filename.ends_with(".jpeg") {
        "image/jpeg"
    } else if filename.ends_with(".pdf") {
        "application/pdf"
    } else {
        "image/png"
    }
}
