//! Coordinate and rectangle primitives with typed coordinate spaces.
//!
//! All shape geometry in the model is stored in [`Normalized`] space
//! (fractions of the image dimensions in `[0, 1]`). Codecs that exchange
//! absolute pixel values convert through the [`Pixel`] space using the
//! image's metadata. The zero-sized marker types make it a compile error
//! to mix the two.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Marker type for pixel coordinates (absolute values).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Marker type for normalized coordinates (0.0 to 1.0).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalized {}

impl fmt::Debug for Pixel {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {} // This is unreachable since Pixel has no variants
    }
}

impl fmt::Debug for Normalized {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {} // This is unreachable since Normalized has no variants
    }
}

/// Returns true if `value` is a valid relative coordinate.
#[inline]
pub fn is_valid_relative(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// A 2D coordinate with a type-level marker for the coordinate space.
#[derive(Clone, Copy, PartialEq)]
pub struct Coord<TSpace> {
    pub x: f64,
    pub y: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> Coord<TSpace> {
    /// Creates a new coordinate with the given x and y values.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }

    /// Returns true if both coordinates are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Coord<Normalized> {
    /// Returns true if both coordinates lie in `[0, 1]`.
    #[inline]
    pub fn is_valid_relative(&self) -> bool {
        is_valid_relative(self.x) && is_valid_relative(self.y)
    }

    /// Scales the coordinate into pixel space.
    #[inline]
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> Coord<Pixel> {
        Coord::new(self.x * image_width, self.y * image_height)
    }
}

impl Coord<Pixel> {
    /// Scales the coordinate into normalized space.
    #[inline]
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> Coord<Normalized> {
        Coord::new(self.x / image_width, self.y / image_height)
    }
}

impl<TSpace> fmt::Debug for Coord<TSpace> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coord")
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}

impl<TSpace> Default for Coord<TSpace> {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

// Custom serde implementation to avoid TSpace: Serialize/Deserialize bounds
impl<TSpace> Serialize for Coord<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Coord", 2)?;
        state.serialize_field("x", &self.x)?;
        state.serialize_field("y", &self.y)?;
        state.end()
    }
}

impl<'de, TSpace> Deserialize<'de> for Coord<TSpace> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct CoordData {
            x: f64,
            y: f64,
        }
        let data = CoordData::deserialize(deserializer)?;
        Ok(Coord::new(data.x, data.y))
    }
}

/// An axis-aligned rectangle in XYXY format (min and max corners).
///
/// The `TSpace` parameter is either [`Pixel`] or [`Normalized`]. The
/// constructor does not enforce that min < max; malformed rectangles are
/// representable so that codecs can report range problems instead of
/// panicking while parsing.
#[derive(Clone, Copy, PartialEq)]
pub struct RectXYXY<TSpace> {
    pub min: Coord<TSpace>,
    pub max: Coord<TSpace>,
}

impl<TSpace> RectXYXY<TSpace> {
    /// Creates a new rectangle from min and max coordinates.
    #[inline]
    pub fn new(min: Coord<TSpace>, max: Coord<TSpace>) -> Self {
        Self { min, max }
    }

    /// Creates a new rectangle from explicit corner coordinates.
    #[inline]
    pub fn from_xyxy(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min: Coord::new(min_x, min_y),
            max: Coord::new(max_x, max_y),
        }
    }

    /// Creates a rectangle from center-point format (YOLO wire format).
    #[inline]
    pub fn from_cxcywh(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::from_xyxy(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    /// Converts to center-point format `(cx, cy, width, height)`.
    #[inline]
    pub fn to_cxcywh(&self) -> (f64, f64, f64, f64) {
        (
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            self.width(),
            self.height(),
        )
    }

    #[inline]
    pub fn min_x(&self) -> f64 {
        self.min.x
    }

    #[inline]
    pub fn min_y(&self) -> f64 {
        self.min.y
    }

    #[inline]
    pub fn max_x(&self) -> f64 {
        self.max.x
    }

    #[inline]
    pub fn max_y(&self) -> f64 {
        self.max.y
    }

    /// Width of the rectangle. Negative if the corners are swapped.
    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Height of the rectangle. Negative if the corners are swapped.
    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Returns true if all coordinates are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Returns true if the corners are properly ordered (min <= max).
    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }
}

impl RectXYXY<Normalized> {
    /// Returns true if every coordinate lies in `[0, 1]`.
    #[inline]
    pub fn is_valid_relative(&self) -> bool {
        self.min.is_valid_relative() && self.max.is_valid_relative()
    }

    /// Converts normalized coordinates to pixel coordinates.
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> RectXYXY<Pixel> {
        RectXYXY::new(
            self.min.to_pixel(image_width, image_height),
            self.max.to_pixel(image_width, image_height),
        )
    }
}

impl RectXYXY<Pixel> {
    /// Converts pixel coordinates to normalized coordinates.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> RectXYXY<Normalized> {
        RectXYXY::new(
            self.min.to_normalized(image_width, image_height),
            self.max.to_normalized(image_width, image_height),
        )
    }
}

impl<TSpace> fmt::Debug for RectXYXY<TSpace> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RectXYXY")
            .field("min_x", &self.min.x)
            .field("min_y", &self.min.y)
            .field("max_x", &self.max.x)
            .field("max_y", &self.max.y)
            .finish()
    }
}

impl<TSpace> Default for RectXYXY<TSpace> {
    fn default() -> Self {
        Self::from_xyxy(0.0, 0.0, 0.0, 0.0)
    }
}

// Custom serde implementation to avoid TSpace: Serialize/Deserialize bounds.
// The field names follow the annotation JSON schema.
impl<TSpace> Serialize for RectXYXY<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("RectXYXY", 4)?;
        state.serialize_field("minX", &self.min.x)?;
        state.serialize_field("minY", &self.min.y)?;
        state.serialize_field("maxX", &self.max.x)?;
        state.serialize_field("maxY", &self.max.y)?;
        state.end()
    }
}

impl<'de, TSpace> Deserialize<'de> for RectXYXY<TSpace> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RectData {
            min_x: f64,
            min_y: f64,
            max_x: f64,
            max_y: f64,
        }
        let data = RectData::deserialize(deserializer)?;
        Ok(RectXYXY::from_xyxy(
            data.min_x, data.min_y, data.max_x, data.max_y,
        ))
    }
}
