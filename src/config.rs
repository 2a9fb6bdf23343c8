//! Export settings

use crate::file::types::{ExportFormat, FileError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for single-layer and archive export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportSettings {
    /// JPEG quality, 1 - 100
    pub jpeg_quality: u8,
    pub png_folder: String,
    pub jpeg_folder: String,
    pub metadata_file_name: String,
    /// Archive name (without `.zip`) used when no title is given
    pub default_archive_name: String,
    /// Append ` (n)` to repeated layer paths instead of failing the export
    pub disambiguate_duplicates: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 92,
            png_folder: "png".to_string(),
            jpeg_folder: "jpeg".to_string(),
            metadata_file_name: "metadata.txt".to_string(),
            default_archive_name: "psd-layers".to_string(),
            disambiguate_duplicates: true,
        }
    }
}

impl ExportSettings {
    /// Load settings from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, FileError> {
        let data = std::fs::read_to_string(path)?;
        let settings: ExportSettings = serde_json::from_str(&data)?;
        settings.validate()?;
        tracing::debug!("Loaded export settings from {:?}", path);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), FileError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(FileError::InvalidSettings(format!(
                "jpegQuality must be between 1 and 100 (got {})",
                self.jpeg_quality
            )));
        }

        for (key, value) in [
            ("pngFolder", &self.png_folder),
            ("jpegFolder", &self.jpeg_folder),
            ("metadataFileName", &self.metadata_file_name),
            ("defaultArchiveName", &self.default_archive_name),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(FileError::InvalidSettings(format!(
                    "{} must be a non-empty name without path separators",
                    key
                )));
            }
        }

        if self.png_folder == self.jpeg_folder {
            return Err(FileError::InvalidSettings(
                "pngFolder and jpegFolder must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Archive folder holding files of the given format
    pub fn folder_for(&self, format: ExportFormat) -> &str {
        match format {
            ExportFormat::Png => &self.png_folder,
            ExportFormat::Jpeg => &self.jpeg_folder,
        }
    }
}
