//! # coldlink
//!
//! A Rust library for building QR payloads from structured content and
//! exporting them as images, with client-local quotas.
//!
//! `coldlink` serializes ten content types into the formats QR readers
//! understand, renders the result with its own QR Code Model 2 encoder and
//! exports PNG, JPEG or SVG. Generations and downloads are rate limited by
//! bookkeeping kept in a small key-value store.
//!
//! ## Features
//!
//! - Payloads for URLs, plain text, WiFi credentials (`WIFI:`), contact cards
//!   (vCard 3.0), e-mail (`mailto:`), phone (`tel:`), SMS (`SMSTO:`),
//!   locations (`geo:`), calendar events (iCalendar) and crypto payments.
//! - Sliding-window generation limit and per-payload download limit.
//! - Asynchronous rendering where only the newest request updates the result.
//! - Custom colors and resolutions from 256 to 2048 pixels.
//! - Safe Rust implementation with no unsafe code.
//!
//! ## Example
//!
//! Encode a WiFi network without touching any quota:
//!
//! ```rust
//! use coldlink::content::{ContentForm, WifiForm, WifiSecurity};
//!
//! let form = ContentForm::Wifi(WifiForm {
//!     ssid: "Home;Net".to_string(),
//!     security: WifiSecurity::Wpa,
//!     password: "p@ss".to_string(),
//!     hidden: false,
//! });
//! assert_eq!(form.encode(), "WIFI:T:WPA;S:Home\\;Net;P:p@ss;");
//! ```
//!
//! Render and export a payload:
//!
//! ```rust
//! use coldlink::export::{ExportFormat, Exporter, RenderOptions};
//!
//! let options = RenderOptions {
//!     format: ExportFormat::Svg,
//!     ..RenderOptions::default()
//! };
//! let asset = Exporter::default()
//!     .render_blocking("https://example.com", &options)
//!     .unwrap();
//! assert_eq!(asset.file_name, "qrcode-https-example-com.svg");
//! ```
//!
//! ## Modules
//!
//! - [`content`] and [`payload`]: content records and their encoders.
//! - [`quota`]: generation and download gates over a [`store`].
//! - [`qrcode`], [`render`] and [`export`]: symbol encoding and image export.
//! - [`session`]: the controller tying forms, quotas and rendering together.

pub mod capability;
pub mod clock;
pub mod config;
pub mod content;
pub mod error;
pub mod escape;
pub mod export;
pub mod payload;
pub mod qrcode;
pub mod quota;
pub mod render;
pub mod schedule;
pub mod session;
pub mod store;

pub use config::Config;
pub use content::{ContentForm, ContentType, FormState};
pub use export::{ExportFormat, ExportedAsset, Exporter, RenderOptions, Resolution};
pub use session::Session;
