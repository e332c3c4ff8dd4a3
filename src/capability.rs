//! Collaborators provided by the host environment.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::export::ExportedAsset;

/// System clipboard. Failures are absorbed by the session.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> anyhow::Result<()>;
}

/// A position fix in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Device location. May be unavailable or denied.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> anyhow::Result<Position>;
}

/// Destination for downloaded assets.
pub trait FileSink: Send + Sync {
    /// Persists `asset` and returns where it ended up.
    fn save(&self, asset: &ExportedAsset) -> anyhow::Result<PathBuf>;
}

/// Saves assets as `<dir>/<file_name>`, creating `dir` on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSink for DirectorySink {
    fn save(&self, asset: &ExportedAsset) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.dir.join(&asset.file_name);
        std::fs::write(&path, &asset.bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = asset.bytes.len(), "saved QR code");
        Ok(path)
    }
}
