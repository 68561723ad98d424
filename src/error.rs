use std::path::PathBuf;
use thiserror::Error;

/// The main error type for boxlabel operations.
///
/// Only whole-operation failures surface here. Per-entry problems during
/// batch import/export are collected as
/// [`ErrorInfoEntry`](crate::io::ErrorInfoEntry) records inside the
/// operation's [`IoResult`](crate::io::IoResult).
#[derive(Debug, Error)]
pub enum BoxlabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("The folder '{path}' does not contain any valid images")]
    NoValidImages { path: PathBuf },

    #[error("A category named '{name}' already exists")]
    DuplicateCategoryName { name: String },

    #[error("No category named '{name}' exists")]
    UnknownCategory { name: String },

    #[error("Image index {index} is out of range ({len} images loaded)")]
    ImageIndexOutOfRange { index: usize, len: usize },

    #[error("Shape path does not address a shape in the image's shape list")]
    InvalidShapePath,

    #[error("Missing class map file '{path}' (expected object.data next to the label files)")]
    MissingClassMap { path: PathBuf },

    #[error("Failed to parse annotation JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write annotation JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
