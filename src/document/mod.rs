//! Presentation document loading.
//!
//! Dispatches on container magic bytes, never the file extension: a
//! ZIP-packaged XML document goes through the modern reader, an OLE
//! compound file through the legacy structural scan. Anything else is
//! `UnsupportedFormat`.

pub mod legacy;
pub mod pptx;

use crate::types::{Document, DocumentFormat, TrackError};
use std::path::Path;
use tracing::{debug, info};

/// Load a presentation document from disk.
pub fn load(path: &Path) -> Result<Document, TrackError> {
    let bytes = std::fs::read(path)?;
    debug!("Read {} bytes from {:?}", bytes.len(), path);

    let document = match DocumentFormat::from_magic(&bytes) {
        Some(DocumentFormat::ModernXml) => pptx::parse(&bytes, path)?,
        Some(DocumentFormat::LegacyBinary) => legacy::parse(&bytes, path),
        None => {
            return Err(TrackError::UnsupportedFormat(format!(
                "{:?} has no recognized container signature",
                path
            )))
        }
    };

    info!(
        "Loaded {:?}: {} slides ({}, confidence {:.2})",
        path,
        document.total_slides,
        document.count_method.as_str(),
        document.count_confidence
    );

    Ok(document)
}
