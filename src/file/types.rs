//! File format types shared by the PSD reader and the exporters

use serde::{Deserialize, Serialize};

/// Generic text shown when an archive export fails for any reason
pub const EXPORT_FAILED_MESSAGE: &str = "Failed to generate ZIP. The file may be too large.";

/// Layer description for front ends (list views, JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSummary {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub opacity: f32, // 0.0 - 1.0
    pub hidden: bool,
    /// Base64-encoded PNG data for layer pixels
    #[serde(rename = "imageData", skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

/// Raster formats a layer can be exported as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Jpeg,
}

impl ExportFormat {
    /// File extension used for exported files
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Png => f.write_str("PNG"),
            ExportFormat::Jpeg => f.write_str("JPEG"),
        }
    }
}

/// Returns true when the path names a Photoshop document
pub fn is_psd_path(path: &str) -> bool {
    path.to_lowercase().ends_with(".psd")
}

/// Load, flatten and export errors
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("This PSD file contains no layers.")]
    NoLayers,

    #[error("No extractable image layers found in this PSD file.")]
    NoExtractableLayers,

    #[error("Invalid document dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Failed to encode layer '{path}' as {format}: {reason}")]
    Encode {
        path: String,
        format: ExportFormat,
        reason: String,
    },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("An export is already in progress")]
    ExportInProgress,

    #[error("Export cancelled")]
    Cancelled,

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

impl FileError {
    /// Errors raised at the boundary between the decoder and the layer core
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            FileError::InvalidFormat(_) | FileError::NoLayers | FileError::NoExtractableLayers
        )
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            FileError::Encode { .. } | FileError::Zip(_) | FileError::Image(_) => {
                EXPORT_FAILED_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<FileError> for String {
    fn from(e: FileError) -> Self {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_extensions() {
        assert_eq!(ExportFormat::Png.extension(), "png");
        assert_eq!(ExportFormat::Jpeg.extension(), "jpg");
        assert_eq!(ExportFormat::Jpeg.to_string(), "JPEG");
    }

    #[test]
    fn test_is_psd_path() {
        assert!(is_psd_path("art/Poster.PSD"));
        assert!(!is_psd_path("art/poster.psb"));
    }

    #[test]
    fn test_error_classification() {
        assert!(FileError::NoLayers.is_decode_error());
        assert!(FileError::NoExtractableLayers.is_decode_error());

        let encode = FileError::Encode {
            path: "Face/Eyes".into(),
            format: ExportFormat::Jpeg,
            reason: "boom".into(),
        };
        assert!(!encode.is_decode_error());
        assert_eq!(encode.user_message(), EXPORT_FAILED_MESSAGE);
        assert_eq!(
            FileError::NoLayers.user_message(),
            "This PSD file contains no layers."
        );
    }
}
