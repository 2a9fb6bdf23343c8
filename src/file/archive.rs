//! ZIP export of extracted layers
//!
//! Archive layout:
//! - png/<layer>.png: lossless copy of every layer
//! - jpeg/<layer>.jpg: JPEG copy of every layer
//! - metadata.txt: title and description (optional)
//!
//! Layers are processed one at a time. Both encodings of a layer run in
//! parallel and must finish before the layer is written, so at most one
//! layer's encoded output is held besides the archive itself.

use super::encode::LayerEncoder;
use super::naming::{sanitize_name, UniqueNames};
use super::types::{ExportFormat, FileError};
use crate::config::ExportSettings;
use crate::layers::ExtractedLayer;
use image::RgbaImage;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Anything that can be written into the archive
pub trait ExportSource: Sync {
    fn path(&self) -> &str;
    fn surface(&self) -> &RgbaImage;
}

impl ExportSource for ExtractedLayer {
    fn path(&self) -> &str {
        &self.path
    }

    fn surface(&self) -> &RgbaImage {
        &self.surface
    }
}

/// Optional title/description stored alongside the layers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveMetadata {
    pub title: String,
    pub description: String,
}

impl ArchiveMetadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    fn to_text(&self) -> String {
        format!(
            "Title: {}\nDescription: {}\n",
            self.title, self.description
        )
    }
}

/// A single encoded layer ready to be saved
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

/// Serialized archive and its suggested file name
#[derive(Debug, Clone)]
pub struct ExportedArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Number of layers written (each in both formats)
    pub layer_count: usize,
}

/// Builds layer archives and single-layer downloads
pub struct ArchiveExporter<'a, E: LayerEncoder> {
    encoder: &'a E,
    settings: ExportSettings,
    cancel: Option<&'a AtomicBool>,
}

impl<'a, E: LayerEncoder> ArchiveExporter<'a, E> {
    pub fn new(encoder: &'a E) -> Self {
        Self {
            encoder,
            settings: ExportSettings::default(),
            cancel: None,
        }
    }

    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Abort the export before the next layer once `flag` is set
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Encode one layer for an individual download
    pub fn export_one(
        &self,
        surface: &RgbaImage,
        path: &str,
        format: ExportFormat,
    ) -> Result<ExportedFile, FileError> {
        let bytes = self.encode(surface, path, format)?;
        Ok(ExportedFile {
            file_name: format!("{}.{}", sanitize_name(path), format.extension()),
            format,
            bytes,
        })
    }

    /// Encode every layer in both formats and pack them into one ZIP.
    ///
    /// `on_progress` receives the completed percentage after each layer,
    /// ending with exactly 100; an empty export never calls it. Any encode
    /// failure aborts the export and no archive is returned.
    pub fn export<L: ExportSource>(
        &self,
        layers: &[L],
        metadata: Option<&ArchiveMetadata>,
        mut on_progress: Option<&mut dyn FnMut(u8)>,
    ) -> Result<ExportedArchive, FileError> {
        tracing::info!("Exporting {} layers to ZIP", layers.len());

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        // Encoded images are already compressed
        let options_stored = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o644);
        let options_deflate = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let png_folder = self.settings.folder_for(ExportFormat::Png);
        let jpeg_folder = self.settings.folder_for(ExportFormat::Jpeg);
        zip.add_directory(png_folder, options_deflate)?;
        zip.add_directory(jpeg_folder, options_deflate)?;

        if let Some(metadata) = metadata {
            zip.start_file(self.settings.metadata_file_name.as_str(), options_deflate)?;
            zip.write_all(metadata.to_text().as_bytes())?;
        }

        let mut names = UniqueNames::new();
        let total = layers.len();

        for (idx, layer) in layers.iter().enumerate() {
            if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::info!("Export cancelled after {} of {} layers", idx, total);
                return Err(FileError::Cancelled);
            }

            let path = layer.path();
            let surface = layer.surface();
            let (png, jpeg) = rayon::join(
                || self.encode(surface, path, ExportFormat::Png),
                || self.encode(surface, path, ExportFormat::Jpeg),
            );
            let (png, jpeg) = (png?, jpeg?);

            let sanitized = sanitize_name(path);
            let base_name = if self.settings.disambiguate_duplicates {
                names.claim(&sanitized)
            } else {
                sanitized.clone()
            };
            if base_name != sanitized {
                tracing::debug!("Renamed duplicate layer '{}' to '{}'", path, base_name);
            }

            zip.start_file(
                format!("{}/{}.{}", png_folder, base_name, ExportFormat::Png.extension()),
                options_stored,
            )?;
            zip.write_all(&png)?;

            zip.start_file(
                format!("{}/{}.{}", jpeg_folder, base_name, ExportFormat::Jpeg.extension()),
                options_stored,
            )?;
            zip.write_all(&jpeg)?;

            tracing::debug!(
                "Archived layer {}/{} '{}' (png {} bytes, jpeg {} bytes)",
                idx + 1,
                total,
                path,
                png.len(),
                jpeg.len()
            );

            if let Some(callback) = on_progress.as_deref_mut() {
                callback(progress_percent(idx + 1, total));
            }
        }

        let bytes = zip.finish()?.into_inner();
        let file_name = self.archive_name(metadata);

        tracing::info!("ZIP '{}' ready ({} bytes)", file_name, bytes.len());

        Ok(ExportedArchive {
            file_name,
            bytes,
            layer_count: total,
        })
    }

    fn encode(
        &self,
        surface: &RgbaImage,
        path: &str,
        format: ExportFormat,
    ) -> Result<Vec<u8>, FileError> {
        self.encoder
            .encode(surface, format)
            .map_err(|e| FileError::Encode {
                path: path.to_string(),
                format,
                reason: e.to_string(),
            })
    }

    fn archive_name(&self, metadata: Option<&ArchiveMetadata>) -> String {
        match metadata {
            Some(meta) if !meta.title.is_empty() => format!("{}.zip", sanitize_name(&meta.title)),
            _ => format!("{}.zip", self.settings.default_archive_name),
        }
    }
}

/// Rounded share of completed layers, 0 - 100.
///
/// Only reported after a layer is written, so `total` is at least one; an
/// export with no layers reports no progress at all.
fn progress_percent(completed: usize, total: usize) -> u8 {
    ((completed.min(total) as f64 * 100.0 / total as f64).round()) as u8
}
