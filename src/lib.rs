//! psd-extract - pull layers out of Photoshop documents
//!
//! Decodes a PSD into a layer tree, flattens it into uniquely named layers,
//! renders a flattened preview and exports layers as PNG/JPEG files or a
//! ZIP bundle.

pub mod commands;
pub mod config;
pub mod file;
pub mod layers;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "psd_extract=info,psd_extract_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("psd-extract {} initializing", env!("CARGO_PKG_VERSION"));
}
