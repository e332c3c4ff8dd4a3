//! Image export adapter.
//!
//! Wraps a [`QrRenderer`] and turns its output into a downloadable
//! [`ExportedAsset`]: PNG or JPEG bytes from the raster, UTF-8 markup for SVG,
//! each also carried as a base64 `data:` URL.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RenderError;
use crate::qrcode::QrCodeEcc;
use crate::render::{Color, OutputKind, QrRenderer, RenderSpec, Rendered, SymbolRenderer};

/// Longest payload-derived part of a file name.
const FILE_SLUG_LEN: usize = 40;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Svg,
    Jpeg,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Png, ExportFormat::Svg, ExportFormat::Jpeg];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
            ExportFormat::Jpeg => "jpeg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Jpeg => "image/jpeg",
        }
    }

    fn output_kind(self) -> OutputKind {
        match self {
            ExportFormat::Svg => OutputKind::Vector,
            ExportFormat::Png | ExportFormat::Jpeg => OutputKind::Raster,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = RenderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "svg" => Ok(ExportFormat::Svg),
            "jpeg" | "jpg" => Ok(ExportFormat::Jpeg),
            _ => Err(RenderError::UnknownFormat(value.to_string())),
        }
    }
}

/// Square output size in pixels: 256, 512, 1024 or 2048.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Resolution(u32);

impl Resolution {
    pub const ALL: [u32; 4] = [256, 512, 1024, 2048];

    pub fn pixels(self) -> u32 {
        self.0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution(512)
    }
}

impl TryFrom<u32> for Resolution {
    type Error = RenderError;

    fn try_from(pixels: u32) -> Result<Self, Self::Error> {
        if Resolution::ALL.contains(&pixels) {
            Ok(Resolution(pixels))
        } else {
            Err(RenderError::InvalidResolution(pixels))
        }
    }
}

impl From<Resolution> for u32 {
    fn from(resolution: Resolution) -> Self {
        resolution.0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}x{0}", self.0)
    }
}

/// How a committed payload is rendered. Independent of the payload itself.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RenderOptions {
    pub resolution: Resolution,
    pub format: ExportFormat,
    pub foreground: Color,
    pub background: Color,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            format: ExportFormat::default(),
            foreground: Color::BLACK,
            background: Color::WHITE,
        }
    }
}

/// A finished render, ready to be saved or copied.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ExportedAsset {
    pub format: ExportFormat,
    pub resolution: Resolution,
    pub file_name: String,
    pub mime_type: &'static str,
    /// `data:<mime>;base64,...`
    pub data_url: String,
    pub bytes: Vec<u8>,
}

/// `qrcode-<slug>.<ext>`, the slug being the payload with every run of
/// non-alphanumerics replaced by `-`, outer dashes dropped.
pub fn download_file_name(payload: &str, format: ExportFormat) -> String {
    let mut slug = String::new();
    for c in payload.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.trim_end_matches('-').chars().take(FILE_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("qrcode.{}", format.extension())
    } else {
        format!("qrcode-{slug}.{}", format.extension())
    }
}

/// Renders payloads into assets. Cheap to clone.
#[derive(Clone)]
pub struct Exporter {
    renderer: Arc<dyn QrRenderer>,
    margin: u32,
    ecc: QrCodeEcc,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(Arc::new(SymbolRenderer), 1, QrCodeEcc::Medium)
    }
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("margin", &self.margin)
            .field("ecc", &self.ecc)
            .finish_non_exhaustive()
    }
}

impl Exporter {
    pub fn new(renderer: Arc<dyn QrRenderer>, margin: u32, ecc: QrCodeEcc) -> Self {
        Self {
            renderer,
            margin,
            ecc,
        }
    }

    /// Renders on the blocking pool so large resolutions do not stall the
    /// caller's task.
    pub async fn render(
        &self,
        payload: String,
        options: RenderOptions,
    ) -> Result<ExportedAsset, RenderError> {
        let exporter = self.clone();
        tokio::task::spawn_blocking(move || exporter.render_blocking(&payload, &options))
            .await
            .map_err(|error| RenderError::Task(error.to_string()))?
    }

    pub fn render_blocking(
        &self,
        payload: &str,
        options: &RenderOptions,
    ) -> Result<ExportedAsset, RenderError> {
        let spec = RenderSpec {
            width: options.resolution.pixels(),
            margin: self.margin,
            ecc: self.ecc,
            foreground: options.foreground,
            background: options.background,
        };
        let format = options.format;
        let rendered = self.renderer.render(payload, &spec, format.output_kind())?;

        let bytes = match (format, rendered) {
            (ExportFormat::Svg, Rendered::Vector(markup)) => markup.into_bytes(),
            (ExportFormat::Png, Rendered::Raster(img)) => {
                encode_raster(&img, image::ImageFormat::Png)?
            }
            (ExportFormat::Jpeg, Rendered::Raster(img)) => {
                encode_raster(&img, image::ImageFormat::Jpeg)?
            }
            (format, other) => {
                return Err(RenderError::UnexpectedOutput(
                    other.kind_name(),
                    format.extension(),
                ))
            }
        };

        debug!(%format, resolution = %options.resolution, bytes = bytes.len(), "rendered asset");
        Ok(ExportedAsset {
            format,
            resolution: options.resolution,
            file_name: download_file_name(payload, format),
            mime_type: format.mime_type(),
            data_url: format!("data:{};base64,{}", format.mime_type(), BASE64.encode(&bytes)),
            bytes,
        })
    }
}

fn encode_raster(img: &image::RgbImage, format: image::ImageFormat) -> Result<Vec<u8>, RenderError> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format)?;
    Ok(cursor.into_inner())
}
