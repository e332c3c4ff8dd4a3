//! Rendering capability: payload string in, raster image or SVG markup out.
//!
//! [`QrRenderer`] is the seam the export adapter talks to. [`SymbolRenderer`]
//! implements it with [`crate::qrcode`].

use std::fmt;
use std::str::FromStr;

use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::qrcode::{QrCode, QrCodeEcc};

/// An opaque sRGB color written as `#RRGGBB`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn rgb(self) -> Rgb<u8> {
        Rgb([self.r, self.g, self.b])
    }
}

impl FromStr for Color {
    type Err = RenderError;

    /// Accepts `#RGB` and `#RRGGBB`, any case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || RenderError::InvalidColor(value.to_string());
        let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..=i].repeat(2));
                Ok(Color {
                    r: expand(0)?,
                    g: expand(1)?,
                    b: expand(2)?,
                })
            }
            6 => Ok(Color {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = RenderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Widest quiet zone drawn, in modules. Larger margins are clamped.
pub const MAX_MARGIN: u32 = 16;

/// Parameters handed to the renderer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RenderSpec {
    /// Output width and height in pixels.
    pub width: u32,
    /// Quiet zone around the symbol, in modules.
    pub margin: u32,
    pub ecc: QrCodeEcc,
    pub foreground: Color,
    pub background: Color,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OutputKind {
    Raster,
    Vector,
}

#[derive(Clone, Debug)]
pub enum Rendered {
    Raster(RgbImage),
    Vector(String),
}

impl Rendered {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Rendered::Raster(_) => "raster",
            Rendered::Vector(_) => "vector",
        }
    }
}

/// Produces a QR image for a payload. May be slow for large widths.
pub trait QrRenderer: Send + Sync {
    fn render(
        &self,
        payload: &str,
        spec: &RenderSpec,
        kind: OutputKind,
    ) -> Result<Rendered, RenderError>;
}

/// Renders with the crate's own QR encoder.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymbolRenderer;

impl QrRenderer for SymbolRenderer {
    fn render(
        &self,
        payload: &str,
        spec: &RenderSpec,
        kind: OutputKind,
    ) -> Result<Rendered, RenderError> {
        if payload.trim().is_empty() {
            return Err(RenderError::EmptyPayload);
        }
        let qr = QrCode::encode_text(payload, spec.ecc)?;
        Ok(match kind {
            OutputKind::Raster => Rendered::Raster(to_image_buffer(&qr, spec)),
            OutputKind::Vector => Rendered::Vector(to_svg_string(&qr, spec)),
        })
    }
}

/// SVG markup for `qr` with the quiet zone and colors of `spec`.
/// Always uses Unix newlines.
pub fn to_svg_string(qr: &QrCode, spec: &RenderSpec) -> String {
    let border = spec.margin.min(MAX_MARGIN) as i32;
    let dimension = qr.size() + border * 2;
    let mut result = String::new();
    result += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    result += &format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{1}\" height=\"{1}\" viewBox=\"0 0 {0} {0}\" shape-rendering=\"crispEdges\" stroke=\"none\">\n",
        dimension, spec.width
    );
    result += &format!(
        "\t<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>\n",
        spec.background
    );
    result += "\t<path d=\"";
    let mut first = true;
    for y in 0..qr.size() {
        for x in 0..qr.size() {
            if qr.get_module(x, y) {
                if !first {
                    result += " ";
                }
                first = false;
                result += &format!("M{},{}h1v1h-1z", x + border, y + border);
            }
        }
    }
    result += &format!("\" fill=\"{}\"/>\n", spec.foreground);
    result += "</svg>\n";
    result
}

/// Raster of exactly `spec.width` × `spec.width` pixels. Each pixel takes the
/// color of the module (quiet zone included) it falls in.
pub fn to_image_buffer(qr: &QrCode, spec: &RenderSpec) -> RgbImage {
    let margin = spec.margin.min(MAX_MARGIN);
    let border = margin as i32;
    let modules = u64::from(qr.size() as u32 + 2 * margin);
    let width = spec.width.max(1);
    let dark = spec.foreground.rgb();
    let light = spec.background.rgb();

    let mut img: RgbImage = ImageBuffer::new(width, width);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let qr_x = (u64::from(x) * modules / u64::from(width)) as i32 - border;
        let qr_y = (u64::from(y) * modules / u64::from(width)) as i32 - border;
        *pixel = if qr.get_module(qr_x, qr_y) { dark } else { light };
    }
    img
}
