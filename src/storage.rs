//! Where archives and converted JSON land.
//!
//! The pipeline only needs three operations, so it talks to a [`Storage`]
//! rather than to `tokio::fs` directly. [`FsStorage`] is the real thing;
//! tests swap in `MemoryStorage`.

use std::path::Path;

use tokio::fs;
use tracing::{debug, instrument};

use crate::errors::StatsError;

/// Output sink for the fetch and conversion stages.
pub trait Storage {
    /// Create `path` and its parents. Succeeds if it already exists.
    async fn ensure_dir(&self, path: &Path) -> Result<(), StatsError>;

    /// Write `bytes` to `path`, replacing any existing content.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StatsError>;

    /// Read back a previously written file.
    async fn read(&self, path: &Path) -> Result<Vec<u8>, StatsError>;
}

/// [`Storage`] on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl Storage for FsStorage {
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn ensure_dir(&self, path: &Path) -> Result<(), StatsError> {
        fs::create_dir_all(path).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(path = %path.display(), bytes = bytes.len()))]
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StatsError> {
        fs::write(path, bytes).await?;
        debug!("Wrote file");
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StatsError> {
        Ok(fs::read(path).await?)
    }
}

#[cfg(test)]
pub use memory::MemoryStorage;
