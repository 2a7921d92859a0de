//! Copy builds and presets between a plugin's data directory and the server.
//!
//! Server-side layout for plugin `<plugin>`:
//!
//! ```text
//! Build        <saves>/<plugin>/<name>.brs
//! Minigame     <presets>/Minigame/<plugin>_<name>_minigame.bp
//! Environment  <presets>/Environment/<plugin>_<name>_environment.bp
//! ```
//!
//! Plugin-side files live anywhere under the plugin data root. Copies create
//! missing parent directories and never overwrite an existing destination.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, TransferError};

/// What a content file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Build,
    Minigame,
    Environment,
}

impl ContentKind {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ContentKind::Build => "brs",
            ContentKind::Minigame | ContentKind::Environment => "bp",
        }
    }
}

/// Which tree a content file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentLocation {
    Plugin,
    Server,
}

/// A content file that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    pub kind: ContentKind,
    pub location: ContentLocation,
    /// File name without its final extension
    pub name: String,
    pub path: PathBuf,
}

/// Result of a copy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// File copied to this path
    Copied(PathBuf),
    /// Destination already existed and was left alone
    Existing(PathBuf),
    /// Source already lives on the requested side
    Skipped,
}

/// Directories content is synced between.
#[derive(Debug, Clone)]
pub struct ContentRoots {
    /// Plugin data root
    pub plugin_data: PathBuf,
    /// Server saves directory
    pub saves: PathBuf,
    /// Server presets directory
    pub presets: PathBuf,
    /// Plugin name used to namespace server-side files
    pub plugin_name: String,
}

/// Plugin <-> server content copier.
#[derive(Debug, Clone)]
pub struct ContentSync {
    roots: ContentRoots,
}

impl ContentSync {
    pub fn new(roots: ContentRoots) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &ContentRoots {
        &self.roots
    }

    /// Look up `relative` in the given tree.
    ///
    /// On the plugin side `relative` is a path with extension under the data
    /// root. On the server side it is the bare content name, placed according
    /// to `kind`. Returns `None` if the file does not exist.
    pub async fn get_file(
        &self,
        relative: &str,
        location: ContentLocation,
        kind: ContentKind,
    ) -> Result<Option<ContentFile>> {
        let path = match location {
            ContentLocation::Plugin => self.roots.plugin_data.join(checked_relative(relative)?),
            ContentLocation::Server => self.server_path(checked_relative(relative)?, kind)?,
        };

        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }

        Ok(Some(ContentFile {
            kind,
            location,
            name: file_stem(&path),
            path,
        }))
    }

    /// Every file with an extension directly inside plugin directory `relative`.
    ///
    /// Sorted by name.
    pub async fn list_plugin_files(&self, relative: &str, kind: ContentKind) -> Result<Vec<ContentFile>> {
        let dir = self.roots.plugin_data.join(checked_relative(relative)?);
        let mut entries = tokio::fs::read_dir(&dir).await?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none() || !entry.file_type().await?.is_file() {
                continue;
            }
            files.push(ContentFile {
                kind,
                location: ContentLocation::Plugin,
                name: file_stem(&path),
                path,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(dir = %dir.display(), count = files.len(), "listed plugin content");
        Ok(files)
    }

    /// Copy a plugin-side file to its server location.
    pub async fn copy_to_server(&self, file: &ContentFile) -> Result<CopyOutcome> {
        if file.location == ContentLocation::Server {
            warn!(path = %file.path.display(), "file already on the server side");
            return Ok(CopyOutcome::Skipped);
        }

        let destination = self.server_path(Path::new(&file.name), file.kind)?;
        copy_if_absent(&file.path, destination).await
    }

    /// Copy a server-side file into the plugin tree as `destination` (no extension).
    pub async fn copy_to_plugin(&self, file: &ContentFile, destination: &str) -> Result<CopyOutcome> {
        if file.location == ContentLocation::Plugin {
            warn!(path = %file.path.display(), "file already on the plugin side");
            return Ok(CopyOutcome::Skipped);
        }

        let relative = checked_relative(destination)?;
        let destination = self
            .roots
            .plugin_data
            .join(format!("{}.{}", relative.display(), file.kind.extension()));
        copy_if_absent(&file.path, destination).await
    }

    fn server_path(&self, name: &Path, kind: ContentKind) -> Result<PathBuf> {
        let plugin = &self.roots.plugin_name;
        let name = name.to_str().ok_or_else(|| TransferError::PathOutsideRoot(name.display().to_string()))?;

        Ok(match kind {
            ContentKind::Build => self.roots.saves.join(plugin).join(format!("{name}.brs")),
            ContentKind::Minigame => self
                .roots
                .presets
                .join("Minigame")
                .join(format!("{plugin}_{name}_minigame.bp")),
            ContentKind::Environment => self
                .roots
                .presets
                .join("Environment")
                .join(format!("{plugin}_{name}_environment.bp")),
        })
    }
}

/// Reject empty, absolute and `..` paths.
fn checked_relative(relative: &str) -> Result<&Path> {
    let path = Path::new(relative);
    let inside = !relative.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if inside {
        Ok(path)
    } else {
        Err(TransferError::PathOutsideRoot(relative.to_string()).into())
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn copy_if_absent(source: &Path, destination: PathBuf) -> Result<CopyOutcome> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::try_exists(&destination).await? {
        debug!(destination = %destination.display(), "destination exists, not copying");
        return Ok(CopyOutcome::Existing(destination));
    }

    tokio::fs::copy(source, &destination).await?;
    debug!(source = %source.display(), destination = %destination.display(), "content copied");
    Ok(CopyOutcome::Copied(destination))
}
