//! Save artifacts on disk and the names they are created under.
//!
//! The server resolves `Bricks.Load "<name>"` against its saves directory,
//! so an artifact is addressed by a root-relative name without extension
//! and stored at `<root>/<name>.brs`. Names may contain subdirectories but
//! can never leave the root.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::{Result, TransferError};

/// File extension the server expects for saves
pub const ARTIFACT_EXTENSION: &str = "brs";

/// Directory of save artifacts shared with the server.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The artifact root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an artifact name to its file path.
    ///
    /// # Errors
    /// `TransferError::PathOutsideRoot` if the name is empty, absolute, or
    /// contains `.`/`..` components.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let well_formed = !name.is_empty()
            && !name.contains('\0')
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !well_formed {
            return Err(TransferError::PathOutsideRoot(name.to_string()).into());
        }

        let path = self.root.join(format!("{name}.{ARTIFACT_EXTENSION}"));
        if !path.starts_with(&self.root) {
            return Err(TransferError::PathOutsideRoot(name.to_string()).into());
        }
        Ok(path)
    }

    /// Write `bytes` verbatim as artifact `name`, creating parent directories.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(artifact = name, bytes = bytes.len(), "artifact written");
        Ok(path)
    }

    /// Read artifact `name` back.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TransferError::ArtifactMissing(name.to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete artifact `name`.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(artifact = name, "artifact removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TransferError::ArtifactMissing(name.to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether artifact `name` exists.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

/// Source of unique artifact names.
pub trait ArtifactNames: Send + Sync {
    /// Next name starting with `prefix`. Never repeats within a process.
    fn next_name(&self, prefix: &str) -> String;
}

/// Process-wide counter shared by every `TimestampNames`
static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// `<prefix><unix millis>_<counter>` names.
///
/// The counter is process-wide and never reset, so two requests in the same
/// millisecond still get distinct names.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampNames;

impl ArtifactNames for TimestampNames {
    fn next_name(&self, prefix: &str) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let counter = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}{millis}_{counter}")
    }
}

/// Deterministic `<prefix><n>` names, counting from zero per instance.
#[derive(Debug, Default)]
pub struct SequenceNames {
    next: AtomicU64,
}

impl SequenceNames {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactNames for SequenceNames {
    fn next_name(&self, prefix: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}{n}")
    }
}
