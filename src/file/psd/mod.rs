//! Adobe Photoshop (.psd) format support
//!
//! Read-only: layers, groups, opacity and visibility are decoded through the
//! `psd` crate into a [`crate::layers::Document`].

mod reader;

pub use reader::{decode_psd, load_psd};
