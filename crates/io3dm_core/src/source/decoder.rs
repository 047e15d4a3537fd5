//! Decoder seam between the binary 3DM reader and the import core.
//!
//! The binary layout itself is handled by an external reader; anything that
//! can produce a [`SourceFile`] from a path implements [`Decoder`]. The crate
//! ships [`JsonDecoder`], which reads a JSON dump of the object model and is
//! what the CLI and the integration tests use.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use thiserror::Error;

use super::types::SourceFile;

/// Errors that can occur while decoding a source file.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object model: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Turns a file on disk into a source object model.
pub trait Decoder {
    fn decode(&self, path: &Path) -> DecodeResult<SourceFile>;
}

/// Reads `.json` object-model dumps.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, path: &Path) -> DecodeResult<SourceFile> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => {}
            other => {
                return Err(DecodeError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        }

        let reader = BufReader::new(File::open(path)?);
        let file: SourceFile = serde_json::from_reader(reader)?;
        log::debug!(
            "Decoded {} layers, {} materials, {} objects, {} definitions",
            file.layers().len(),
            file.materials().len(),
            file.objects().len(),
            file.instance_definitions().len()
        );
        Ok(file)
    }
}

/// Decode a JSON object model held in memory (useful for testing).
pub fn decode_json_str(content: &str) -> DecodeResult<SourceFile> {
    Ok(serde_json::from_str(content)?)
}
