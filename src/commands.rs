//! Application commands - the interface between front ends and the layer core
//!
//! These apply the caller-level policies (file type gate, "no layers"
//! rejection, one export at a time) and move heavy work off the async runtime.

use crate::config::ExportSettings;
use crate::file::encode::{encode_png, RasterEncoder};
use crate::file::psd::load_psd;
use crate::file::{
    is_psd_path, ArchiveExporter, ArchiveMetadata, ExportFormat, ExportedArchive, ExportedFile,
    FileError, LayerSummary,
};
use crate::layers::{Document, ExtractedLayer};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::RgbaImage;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Held for the duration of an archive export
static EXPORT_LOCK: Mutex<()> = Mutex::new(());

/// Layers and preview extracted from one document
#[derive(Debug, Clone)]
pub struct ParsedPsd {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<ExtractedLayer>,
    pub composite: Option<RgbaImage>,
}

/// Flatten and composite a decoded document.
///
/// Fails when the document has no layers at all or none with pixels. A
/// composite that cannot be built is reported as `None`.
pub fn parse_document(document: &Document) -> Result<ParsedPsd, FileError> {
    if document.children.is_empty() {
        return Err(FileError::NoLayers);
    }

    let layers = document.extract_layers();
    if layers.is_empty() {
        return Err(FileError::NoExtractableLayers);
    }

    let composite = match document.render_composite() {
        Ok(img) => Some(img),
        Err(e) => {
            tracing::warn!("Composite preview unavailable: {}", e);
            None
        }
    };

    tracing::info!(
        "Extracted {} layers from {}x{} document",
        layers.len(),
        document.width,
        document.height
    );

    Ok(ParsedPsd {
        width: document.width,
        height: document.height,
        layers,
        composite,
    })
}

/// Load a `.psd` file and extract its layers
pub async fn open_psd(path: PathBuf) -> Result<ParsedPsd, FileError> {
    if !is_psd_path(&path.to_string_lossy()) {
        return Err(FileError::InvalidFormat(
            "Please select a valid PSD file.".to_string(),
        ));
    }

    run_blocking(move || {
        let document = load_psd(&path)?;
        parse_document(&document)
    })
    .await
}

/// Encode a single layer for download
pub async fn export_layer(
    layer: ExtractedLayer,
    format: ExportFormat,
    settings: ExportSettings,
) -> Result<ExportedFile, FileError> {
    run_blocking(move || {
        let encoder = RasterEncoder::new(settings.jpeg_quality);
        let exporter = ArchiveExporter::new(&encoder).with_settings(settings);
        exporter.export_one(&layer.surface, &layer.path, format)
    })
    .await
}

/// Build the ZIP bundle of all layers.
///
/// Only one export may run at a time; a concurrent call fails with
/// [`FileError::ExportInProgress`].
pub async fn export_all<F>(
    layers: Vec<ExtractedLayer>,
    metadata: Option<ArchiveMetadata>,
    settings: ExportSettings,
    cancel: Option<Arc<AtomicBool>>,
    mut on_progress: F,
) -> Result<ExportedArchive, FileError>
where
    F: FnMut(u8) + Send + 'static,
{
    settings.validate()?;

    run_blocking(move || {
        let _guard = EXPORT_LOCK.try_lock().ok_or(FileError::ExportInProgress)?;

        let encoder = RasterEncoder::new(settings.jpeg_quality);
        let mut exporter = ArchiveExporter::new(&encoder).with_settings(settings);
        if let Some(flag) = cancel.as_deref() {
            exporter = exporter.with_cancel_flag(flag);
        }
        exporter.export(&layers, metadata.as_ref(), Some(&mut on_progress))
    })
    .await
}

/// Encode the composite preview as PNG
pub fn composite_png(parsed: &ParsedPsd) -> Result<Option<Vec<u8>>, FileError> {
    parsed.composite.as_ref().map(encode_png).transpose()
}

/// Title proposed for an archive: the file name without its extension
pub fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Look up a layer by its full path
pub fn find_layer<'a>(
    layers: &'a [ExtractedLayer],
    path: &str,
) -> Result<&'a ExtractedLayer, FileError> {
    layers
        .iter()
        .find(|layer| layer.path == path)
        .ok_or_else(|| FileError::LayerNotFound(path.to_string()))
}

/// Describe layers for listing, optionally with base64 PNG previews
pub fn layer_summaries(
    layers: &[ExtractedLayer],
    with_previews: bool,
) -> Result<Vec<LayerSummary>, FileError> {
    layers
        .iter()
        .map(|layer| -> Result<LayerSummary, FileError> {
            let mut summary = layer.summary();
            if with_previews {
                summary.image_data = Some(BASE64.encode(encode_png(&layer.surface)?));
            }
            Ok(summary)
        })
        .collect()
}

async fn run_blocking<T, F>(task: F) -> Result<T, FileError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FileError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| FileError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::layers::RawLayer;
    use image::Rgba;
    use std::sync::mpsc;

    fn leaf(name: &str, w: u32, h: u32) -> RawLayer {
        RawLayer {
            name: Some(name.to_string()),
            surface: Some(Arc::new(RgbaImage::from_pixel(w, h, Rgba([1, 2, 3, 255])))),
            ..Default::default()
        }
    }

    fn sample_document() -> Document {
        Document::from_raw(
            8,
            8,
            vec![
                leaf("Background", 8, 8),
                RawLayer {
                    name: Some("Face".into()),
                    children: Some(vec![leaf("Eyes", 2, 1), leaf("Mouth", 3, 1)]),
                    ..Default::default()
                },
            ],
        )
    }

    #[test]
    fn test_parse_document() {
        let parsed = parse_document(&sample_document()).unwrap();
        let paths: Vec<_> = parsed.layers.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, ["Background", "Face/Eyes", "Face/Mouth"]);
        assert_eq!(parsed.composite.as_ref().unwrap().dimensions(), (8, 8));
        assert!(composite_png(&parsed).unwrap().is_some());
    }

    #[test]
    fn test_parse_document_without_layers() {
        let empty = Document::from_raw(8, 8, Vec::new());
        assert!(matches!(parse_document(&empty), Err(FileError::NoLayers)));

        let no_pixels = Document::from_raw(
            8,
            8,
            vec![RawLayer {
                name: Some("Adjustment".into()),
                ..Default::default()
            }],
        );
        assert!(matches!(
            parse_document(&no_pixels),
            Err(FileError::NoExtractableLayers)
        ));
    }

    #[test]
    fn test_parse_document_without_composite() {
        let document = Document::from_raw(0, 0, vec![leaf("Only", 1, 1)]);
        let parsed = parse_document(&document).unwrap();
        assert_eq!(parsed.layers.len(), 1);
        assert!(parsed.composite.is_none());
    }

    #[test]
    fn test_default_title() {
        assert_eq!(default_title(Path::new("/art/Poster v2.psd")), "Poster v2");
        assert_eq!(default_title(Path::new("cover.PSD")), "cover");
    }

    #[test]
    fn test_find_layer_and_summaries() {
        let parsed = parse_document(&sample_document()).unwrap();
        assert_eq!(find_layer(&parsed.layers, "Face/Eyes").unwrap().width, 2);
        assert!(matches!(
            find_layer(&parsed.layers, "Face/Nose"),
            Err(FileError::LayerNotFound(_))
        ));

        let plain = layer_summaries(&parsed.layers, false).unwrap();
        assert!(plain.iter().all(|s| s.image_data.is_none()));

        let with_previews = layer_summaries(&parsed.layers, true).unwrap();
        let data = with_previews[1].image_data.as_ref().unwrap();
        let png = BASE64.decode(data).unwrap();
        assert_eq!(image::load_from_memory(&png).unwrap().width(), 2);

        let json = serde_json::to_string(&plain[0]).unwrap();
        assert!(json.contains("\"path\":\"Background\""));
        assert!(!json.contains("imageData"));
    }

    #[tokio::test]
    async fn test_open_psd_rejects_other_extensions() {
        let result = open_psd(PathBuf::from("layers.png")).await;
        assert!(matches!(result, Err(FileError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn test_open_psd_missing_file() {
        let result = open_psd(PathBuf::from("/nonexistent/dir/missing.psd")).await;
        assert!(matches!(result, Err(FileError::Io(_))));
    }

    #[tokio::test]
    async fn test_export_layer() {
        let parsed = parse_document(&sample_document()).unwrap();
        let layer = parsed.layers[1].clone();

        let file = export_layer(layer, ExportFormat::Jpeg, ExportSettings::default())
            .await
            .unwrap();
        assert_eq!(file.file_name, "Face-Eyes.jpg");
        assert_eq!(image::load_from_memory(&file.bytes).unwrap().width(), 2);
    }

    #[tokio::test]
    async fn test_export_all_and_single_flight() {
        let parsed = parse_document(&sample_document()).unwrap();
        let (tx, rx) = mpsc::channel();

        let archive = export_all(
            parsed.layers.clone(),
            Some(ArchiveMetadata::new("Sample", "")),
            ExportSettings::default(),
            None,
            move |p| {
                let _ = tx.send(p);
            },
        )
        .await
        .unwrap();

        assert_eq!(archive.file_name, "Sample.zip");
        assert_eq!(archive.layer_count, 3);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![33, 67, 100]);

        let held = EXPORT_LOCK.lock();
        let busy = export_all(parsed.layers, None, ExportSettings::default(), None, |_| {}).await;
        drop(held);
        assert!(matches!(busy, Err(FileError::ExportInProgress)));
    }
}
