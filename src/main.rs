//! psd-extract CLI - export PSD layers as images or a ZIP bundle

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use psd_extract_lib::commands::{
    composite_png, default_title, export_all, export_layer, find_layer, layer_summaries, open_psd,
};
use psd_extract_lib::config::ExportSettings;
use psd_extract_lib::file::{ArchiveMetadata, ExportFormat, FileError};

#[derive(Parser)]
#[command(name = "psd-extract")]
#[command(version)]
#[command(about = "Extract PSD layers as PNG/JPEG images or a ZIP bundle", long_about = None)]
struct Cli {
    /// Export settings file (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JPEG quality (1-100), overrides the settings file
    #[arg(long, global = true, value_name = "QUALITY")]
    jpeg_quality: Option<u8>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List extractable layers
    #[command(alias = "ls")]
    List {
        /// Input PSD file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Include base64 PNG previews (JSON only)
        #[arg(long, requires = "json")]
        previews: bool,
    },

    /// Save a single layer
    Layer {
        /// Input PSD file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Layer path as shown by `list` (e.g. "Face/Eyes")
        #[arg(value_name = "LAYER")]
        layer: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "png")]
        format: FormatArg,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Save the flattened preview as PNG
    Composite {
        /// Input PSD file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (defaults to <name>-composite.png)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Bundle every layer as PNG and JPEG into one ZIP
    Export {
        /// Input PSD file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Archive title (defaults to the input file name)
        #[arg(long)]
        title: Option<String>,

        /// Archive description
        #[arg(long, default_value = "")]
        description: String,

        /// Do not write metadata.txt
        #[arg(long)]
        no_metadata: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    #[value(alias = "jpg")]
    Jpeg,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => ExportFormat::Png,
            FormatArg::Jpeg => ExportFormat::Jpeg,
        }
    }
}

#[tokio::main]
async fn main() {
    psd_extract_lib::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::debug!("Command failed: {:?}", e);
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), FileError> {
    let mut settings = match &cli.config {
        Some(path) => ExportSettings::load(path)?,
        None => ExportSettings::default(),
    };
    if let Some(quality) = cli.jpeg_quality {
        settings.jpeg_quality = quality;
    }
    settings.validate()?;

    match cli.command {
        Commands::List {
            input,
            json,
            previews,
        } => list_layers(&input, json, previews).await,
        Commands::Layer {
            input,
            layer,
            format,
            output,
        } => save_layer(&input, &layer, format.into(), output, settings).await,
        Commands::Composite { input, output } => save_composite(&input, output).await,
        Commands::Export {
            input,
            output,
            title,
            description,
            no_metadata,
        } => {
            let metadata = if no_metadata {
                None
            } else {
                let title = title
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| fallback_title(&input));
                Some(ArchiveMetadata::new(title, description))
            };
            save_archive(&input, output, metadata, settings).await
        }
    }
}

async fn list_layers(input: &Path, json: bool, previews: bool) -> Result<(), FileError> {
    let parsed = open_psd(input.to_path_buf()).await?;

    if json {
        let summaries = layer_summaries(&parsed.layers, previews)?;
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!(
        "{} ({}x{}, {} layers)",
        input.display(),
        parsed.width,
        parsed.height,
        parsed.layers.len()
    );
    for layer in &parsed.layers {
        println!(
            "  {:<40} {:>5}x{:<5} {:>3.0}%{}",
            layer.path,
            layer.width,
            layer.height,
            layer.opacity * 100.0,
            if layer.hidden { "  hidden" } else { "" }
        );
    }
    Ok(())
}

async fn save_layer(
    input: &Path,
    layer_path: &str,
    format: ExportFormat,
    output: Option<PathBuf>,
    settings: ExportSettings,
) -> Result<(), FileError> {
    let parsed = open_psd(input.to_path_buf()).await?;
    let layer = find_layer(&parsed.layers, layer_path)?.clone();

    let file = export_layer(layer, format, settings).await?;
    let dir = output.unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir)?;
    let path = dir.join(&file.file_name);
    fs::write(&path, &file.bytes)?;

    println!("Saved {}", path.display());
    Ok(())
}

async fn save_composite(input: &Path, output: Option<PathBuf>) -> Result<(), FileError> {
    let parsed = open_psd(input.to_path_buf()).await?;
    let Some(png) = composite_png(&parsed)? else {
        println!("No composite preview available");
        return Ok(());
    };

    let path = output.unwrap_or_else(|| {
        PathBuf::from(format!("{}-composite.png", default_title(input)))
    });
    fs::write(&path, png)?;

    println!("Saved {}", path.display());
    Ok(())
}

async fn save_archive(
    input: &Path,
    output: Option<PathBuf>,
    metadata: Option<ArchiveMetadata>,
    settings: ExportSettings,
) -> Result<(), FileError> {
    let parsed = open_psd(input.to_path_buf()).await?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, stopping export");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(format!("{} layers", parsed.layers.len()));

    let progress = pb.clone();
    let result = export_all(parsed.layers, metadata, settings, Some(cancel), move |percent| {
        progress.set_position(u64::from(percent));
    })
    .await;

    let archive = match result {
        Ok(archive) => {
            pb.finish_and_clear();
            archive
        }
        Err(e) => {
            pb.abandon();
            return Err(e);
        }
    };

    let dir = output.unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir)?;
    let path = dir.join(&archive.file_name);
    fs::write(&path, &archive.bytes)?;

    println!(
        "Saved {} ({} layers, {} bytes)",
        path.display(),
        archive.layer_count,
        archive.bytes.len()
    );
    Ok(())
}

/// Title used when none is given: file name without extension, else the full name
fn fallback_title(input: &Path) -> String {
    let title = default_title(input);
    if title.is_empty() {
        input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        title
    }
}
