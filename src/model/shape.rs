//! Shape records: bounding boxes and polygons with tags and nested parts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::geometry::{Coord, Normalized, RectXYXY};

/// The geometric payload of a shape.
///
/// A flat sum type; codecs dispatch with `match` instead of a visitor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ShapeGeometry {
    /// An axis-aligned bounding box in relative coordinates.
    Box(RectXYXY<Normalized>),
    /// A closed polygon as an ordered point list in relative coordinates.
    Polygon(Vec<Coord<Normalized>>),
}

impl ShapeGeometry {
    /// Returns true if every coordinate lies in `[0, 1]` and, for
    /// polygons, the point list is non-empty.
    pub fn is_valid_relative(&self) -> bool {
        match self {
            ShapeGeometry::Box(rect) => rect.is_valid_relative(),
            ShapeGeometry::Polygon(points) => {
                !points.is_empty() && points.iter().all(Coord::is_valid_relative)
            }
        }
    }
}

/// One annotation instance: a box or polygon assigned to a category,
/// carrying free-form tags and arbitrarily nested part shapes.
///
/// A part's category is independent of its container's category, so a
/// "car" box may contain "wheel" parts. Shape identity is positional
/// within its image; shapes do not migrate between images.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeData {
    /// Name of the category this shape is assigned to.
    pub category: String,
    pub geometry: ShapeGeometry,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<ShapeData>,
}

impl ShapeData {
    /// Creates a box shape with no tags or parts.
    pub fn new_box(category: impl Into<String>, bounds: RectXYXY<Normalized>) -> Self {
        Self {
            category: category.into(),
            geometry: ShapeGeometry::Box(bounds),
            tags: BTreeSet::new(),
            parts: Vec::new(),
        }
    }

    /// Creates a polygon shape with no tags or parts.
    pub fn new_polygon(category: impl Into<String>, points: Vec<Coord<Normalized>>) -> Self {
        Self {
            category: category.into(),
            geometry: ShapeGeometry::Polygon(points),
            tags: BTreeSet::new(),
            parts: Vec::new(),
        }
    }

    /// Adds a tag (builder style).
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Adds a nested part (builder style).
    pub fn with_part(mut self, part: ShapeData) -> Self {
        self.parts.push(part);
        self
    }

    /// Counts this shape plus all nested parts, at any depth.
    pub fn count_recursive(&self) -> usize {
        1 + self.parts.iter().map(ShapeData::count_recursive).sum::<usize>()
    }

    /// Visits the category name of this shape and of every nested part.
    pub fn for_each_category<F: FnMut(&str)>(&self, f: &mut F) {
        f(&self.category);
        for part in &self.parts {
            part.for_each_category(f);
        }
    }
}
