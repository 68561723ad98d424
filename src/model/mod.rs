//! The annotation data model.
//!
//! This is the format-agnostic core the editor and every codec work
//! through: geometry primitives, categories, shape records with nested
//! parts, per-image records, and the aggregate [`AnnotationStore`] with
//! its incrementally maintained per-category count index.

mod category;
mod geometry;
mod image;
mod shape;
mod store;

pub use category::{ObjectCategory, RgbaColor};
pub use geometry::{is_valid_relative, Coord, Normalized, Pixel, RectXYXY};
pub use image::{ImageMetaData, ImageRecord};
pub use shape::{ShapeData, ShapeGeometry};
pub use store::{
    AnnotationStore, ImportedAnnotations, ImportedImage, ModelEvent, ShapePath, SubscriberId,
};
