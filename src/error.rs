//! Error types shared across the crate.
//!
//! Every failure here is recoverable: missing fields never raise (encoders
//! return an empty payload), storage problems fail open, and quota or render
//! failures surface as transient notices.

use thiserror::Error;

use crate::content::ContentType;
use crate::qrcode::DataTooLong;

/// A form field could not be set by name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("unknown field `{field}` for {content_type} content")]
    UnknownField {
        content_type: ContentType,
        field: String,
    },
    #[error("invalid value `{value}` for field `{field}`")]
    InvalidValue { field: String, value: String },
}

/// Failures of the persistent key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A quota gate refused the action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("generation limit of {limit} per window reached, try again in about {retry_after_minutes} minute(s)")]
    GenerationLimit {
        limit: u32,
        retry_after_minutes: u32,
    },
    #[error("download limit of {limit} reached for this QR code, generate a different QR code to download more")]
    DownloadLimit { limit: u32 },
}

/// The rendering capability or the image encoder failed.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render")]
    EmptyPayload,
    #[error("payload does not fit in a QR code: {0}")]
    DataTooLong(DataTooLong),
    #[error("invalid color `{0}`, expected #RGB or #RRGGBB")]
    InvalidColor(String),
    #[error("unsupported resolution {0}, expected 256, 512, 1024 or 2048")]
    InvalidResolution(u32),
    #[error("unknown export format `{0}`")]
    UnknownFormat(String),
    #[error("renderer returned {0} output for a {1} export")]
    UnexpectedOutput(&'static str, &'static str),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("render task failed: {0}")]
    Task(String),
}

impl From<DataTooLong> for RenderError {
    fn from(error: DataTooLong) -> Self {
        RenderError::DataTooLong(error)
    }
}

impl RenderError {
    /// Message suitable for an inline notice next to the preview.
    pub fn user_message(&self) -> String {
        match self {
            RenderError::EmptyPayload | RenderError::DataTooLong(_) => {
                "Unable to generate QR code. Please try different content.".to_string()
            }
            other => format!("Unable to generate QR code: {other}"),
        }
    }
}

/// Errors of the session controller.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the active form is missing required fields")]
    EmptyPayload,
    #[error("generate a QR code first")]
    NothingCommitted,
    #[error("no rendered QR code is available")]
    NotRendered,
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("saving the QR code failed: {0}")]
    Save(#[source] anyhow::Error),
}
