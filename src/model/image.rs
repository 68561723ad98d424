//! Per-image records: metadata plus the ordered shape list.

use serde::{Deserialize, Serialize};

use super::shape::ShapeData;

/// Metadata for one loaded image file.
///
/// The dimension triple comes from the image-decoding service during
/// folder load; the core never decodes pixel data itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetaData {
    pub file_name: String,
    pub folder_name: String,
    /// Width of the image in pixels.
    pub width: u32,
    /// Height of the image in pixels.
    pub height: u32,
    /// Channel depth (3 for RGB).
    pub depth: u32,
}

impl ImageMetaData {
    /// Creates metadata with the given properties.
    pub fn new(
        file_name: impl Into<String>,
        folder_name: impl Into<String>,
        width: u32,
        height: u32,
        depth: u32,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            folder_name: folder_name.into(),
            width,
            height,
            depth,
        }
    }
}

/// One loaded image and its annotations.
///
/// Created on folder load and mutated as shapes are added, removed, and
/// edited; records are only discarded when a new folder is loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRecord {
    pub meta: ImageMetaData,
    pub shapes: Vec<ShapeData>,
}

impl ImageRecord {
    /// Creates a record with an empty shape list.
    pub fn new(meta: ImageMetaData) -> Self {
        Self {
            meta,
            shapes: Vec::new(),
        }
    }

    /// Returns true if at least one shape is assigned to this image.
    #[inline]
    pub fn has_annotations(&self) -> bool {
        !self.shapes.is_empty()
    }
}
