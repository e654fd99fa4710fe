//! Durable cart cache.
//!
//! A write-through mirror of the in-memory cart, consulted only when the
//! remote store cannot be reached at startup. [`JsonFileCache`] keeps the
//! mirror in a single JSON file; [`CartCache`] is the seam so tests can
//! substitute an in-memory implementation.
//!
//! The cache is best-effort: a failed save is logged and the session
//! continues, it never blocks or fails a cart operation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use trolley_core::CartItem;

/// Errors from reading or writing the durable cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable mirror of the cart contents.
#[async_trait]
pub trait CartCache: Send + Sync {
    /// Load the cached cart, or `None` if no cache has been written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache exists but cannot be read or parsed.
    async fn load(&self) -> Result<Option<Vec<CartItem>>, CacheError>;

    /// Replace the cached cart with `items`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    async fn save(&self, items: &[CartItem]) -> Result<(), CacheError>;
}

/// On-disk layout of the cache file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEnvelope {
    saved_at: DateTime<Utc>,
    items: Vec<CartItem>,
}

/// [`CartCache`] backed by a single JSON file.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous cache intact rather than a truncated
/// file. Every save gets its own temp file, so concurrent saves cannot
/// interleave within one; whichever rename lands last decides the contents.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    /// Distinguishes the temp files of concurrent saves.
    save_counter: AtomicU64,
}

impl JsonFileCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            save_counter: AtomicU64::new(0),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let n = self.save_counter.fetch_add(1, Ordering::Relaxed);
        let mut path = self.path.clone().into_os_string();
        path.push(format!(".{n}.tmp"));
        PathBuf::from(path)
    }
}

#[async_trait]
impl CartCache for JsonFileCache {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<Vec<CartItem>>, CacheError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no cart cache on disk");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let envelope: CacheEnvelope = serde_json::from_str(&raw)?;
        tracing::debug!(
            items = envelope.items.len(),
            saved_at = %envelope.saved_at,
            "loaded cart cache"
        );
        Ok(Some(envelope.items))
    }

    #[instrument(skip(self, items), fields(path = %self.path.display(), items = items.len()))]
    async fn save(&self, items: &[CartItem]) -> Result<(), CacheError> {
        let envelope = CacheEnvelope {
            saved_at: Utc::now(),
            items: items.to_vec(),
        };
        let raw = serde_json::to_string(&envelope)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
