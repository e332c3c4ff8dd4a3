//! TOML configuration.
//!
//! Every key is optional; a missing file means all defaults. Files live under
//! `~/.coldlink/` unless a path is given explicitly.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use directories::UserDirs;
use serde::{Deserialize, Serialize};

use crate::capability::FileSink;
use crate::clock::Clock;
use crate::export::{ExportFormat, Exporter, RenderOptions, Resolution};
use crate::qrcode::QrCodeEcc;
use crate::quota::{DownloadGate, GenerationGate, QuotaTracker};
use crate::render::{Color, SymbolRenderer, MAX_MARGIN};
use crate::session::{Session, COLOR_DEBOUNCE_MS};
use crate::store::FileStore;

const CONFIG_DIR: &str = ".coldlink";
const CONFIG_FILE: &str = "config.toml";
const STORE_FILE: &str = "store.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub quota: QuotaConfig,
    pub render: RenderConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub window_minutes: u32,
    pub max_generations: u32,
    pub max_downloads_per_payload: u32,
    /// Fingerprints kept in the download counter before the least recently
    /// used are evicted.
    pub max_tracked_payloads: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            window_minutes: 60,
            max_generations: 10,
            max_downloads_per_payload: 4,
            max_tracked_payloads: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrection {
    Low,
    #[default]
    Medium,
    Quartile,
    High,
}

impl From<ErrorCorrection> for QrCodeEcc {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::Low => QrCodeEcc::Low,
            ErrorCorrection::Medium => QrCodeEcc::Medium,
            ErrorCorrection::Quartile => QrCodeEcc::Quartile,
            ErrorCorrection::High => QrCodeEcc::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Checked by [`Config::validate`] so a bad value names the key.
    pub resolution: u32,
    pub format: ExportFormat,
    pub foreground: Color,
    pub background: Color,
    /// Quiet zone in modules.
    pub margin: u32,
    pub error_correction: ErrorCorrection,
    pub color_debounce_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default().pixels(),
            format: ExportFormat::Png,
            foreground: Color::BLACK,
            background: Color::WHITE,
            margin: 1,
            error_correction: ErrorCorrection::Medium,
            color_debounce_ms: COLOR_DEBOUNCE_MS as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Quota store file. Defaults to `~/.coldlink/store.json`.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Reads and validates `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.coldlink/config.toml` if it exists, defaults otherwise.
    pub fn load_or_default() -> Result<Self> {
        match default_dir() {
            Some(dir) if dir.join(CONFIG_FILE).exists() => Self::load(&dir.join(CONFIG_FILE)),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let quota = &self.quota;
        if quota.window_minutes == 0 {
            bail!("quota.window_minutes must be at least 1");
        }
        if quota.max_generations == 0 {
            bail!("quota.max_generations must be at least 1");
        }
        if quota.max_downloads_per_payload == 0 {
            bail!("quota.max_downloads_per_payload must be at least 1");
        }
        if quota.max_tracked_payloads == 0 {
            bail!("quota.max_tracked_payloads must be at least 1");
        }
        if self.render.margin > MAX_MARGIN {
            bail!("render.margin must be at most {MAX_MARGIN} modules");
        }
        Resolution::try_from(self.render.resolution).context("render.resolution")?;
        Ok(())
    }

    /// Explicit `storage.path`, else the per-user default.
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage.path {
            return Ok(path.clone());
        }
        default_dir()
            .map(|dir| dir.join(STORE_FILE))
            .context("Could not find home directory")
    }

    pub fn render_options(&self) -> Result<RenderOptions> {
        Ok(RenderOptions {
            resolution: Resolution::try_from(self.render.resolution)
                .context("render.resolution")?,
            format: self.render.format,
            foreground: self.render.foreground,
            background: self.render.background,
        })
    }

    pub fn exporter(&self) -> Exporter {
        Exporter::new(
            Arc::new(SymbolRenderer),
            self.render.margin,
            self.render.error_correction.into(),
        )
    }

    pub fn quota_tracker(&self, store: FileStore) -> QuotaTracker {
        let window = Duration::minutes(i64::from(self.quota.window_minutes));
        QuotaTracker::new(
            Box::new(store),
            GenerationGate::new(window, self.quota.max_generations),
            DownloadGate::new(
                self.quota.max_downloads_per_payload,
                self.quota.max_tracked_payloads,
            ),
        )
    }

    /// A session wired to the configured store, renderer and limits.
    pub fn session(
        &self,
        store_path: &Path,
        sink: Box<dyn FileSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Session> {
        let debounce = i64::try_from(self.render.color_debounce_ms)
            .context("render.color_debounce_ms is too large")?;
        let quota = self.quota_tracker(FileStore::open(store_path));
        Ok(Session::new(quota, self.exporter(), sink, clock)
            .with_render_defaults(self.render_options()?)
            .with_color_debounce(Duration::milliseconds(debounce)))
    }
}

fn default_dir() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| dirs.home_dir().join(CONFIG_DIR))
}
