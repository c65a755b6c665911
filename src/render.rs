//! Render Boundary - External Rasterization Interface
//!
//! The engine decides what to render; a backend turns a document spec into
//! opaque bytes. The core never inspects those bytes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hashing::sha256_hex;
use crate::pipeline::{DocumentSpec, IssuedCertificate};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Png,
    Jpg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("dpi {0} outside supported range 72-1200")]
    DpiOutOfRange(u32),

    #[error("render backend failed: {0}")]
    Backend(String),
}

/// Rasterization parameters passed through to the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RenderOptions {
    pub dpi: u32,
    pub format: OutputFormat,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dpi: 300,
            format: OutputFormat::Pdf,
        }
    }
}

impl RenderOptions {
    /// Caller-supplied options, validated.
    pub fn custom(dpi: u32, format: OutputFormat) -> Result<Self, RenderError> {
        if !(72..=1200).contains(&dpi) {
            return Err(RenderError::DpiOutOfRange(dpi));
        }
        Ok(Self { dpi, format })
    }
}

/// External rendering backend. Receives an assembled document spec and
/// returns opaque binary output.
pub trait RenderBackend {
    fn render(&self, document: &DocumentSpec, options: &RenderOptions)
        -> Result<Vec<u8>, RenderError>;
}

/// Backend output wrapped for manifests and transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedArtifact {
    pub filename: String,
    pub format: OutputFormat,
    pub data_base64: String,
    pub content_hash: String,
}

/// Render an issued certificate through a backend and wrap the bytes.
pub fn render_certificate(
    backend: &dyn RenderBackend,
    issued: &IssuedCertificate,
    options: &RenderOptions,
) -> Result<RenderedArtifact, RenderError> {
    let bytes = backend.render(&issued.document, options)?;
    Ok(RenderedArtifact {
        filename: format!(
            "{}-{}.{}",
            issued.certificate_type.as_str(),
            issued.student_id,
            options.format.extension()
        ),
        format: options.format,
        data_base64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &bytes),
        content_hash: sha256_hex(&bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_options_validate_dpi() {
        assert!(RenderOptions::custom(300, OutputFormat::Png).is_ok());
        assert!(matches!(
            RenderOptions::custom(10, OutputFormat::Png),
            Err(RenderError::DpiOutOfRange(10)),
        ));
        assert!(matches!(
            RenderOptions::custom(2400, OutputFormat::Pdf),
            Err(RenderError::DpiOutOfRange(2400)),
        ));
    }
}
