//! Object categories and their colors.

use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An RGBA color, serialized as a `#rrggbbaa` web-hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgbaColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl RgbaColor {
    /// Creates a fully opaque color.
    #[inline]
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Generates a random opaque color.
    ///
    /// Used for categories created during import without an explicit color.
    /// Uniqueness is not guaranteed.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self {
            r: rng.random_range(0..=255),
            g: rng.random_range(0..=255),
            b: rng.random_range(0..=255),
            a: 255,
        }
    }

    /// Formats the color as `#rrggbbaa`.
    pub fn to_web(&self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }

    /// Parses a `#rrggbb` or `#rrggbbaa` web-hex string.
    pub fn parse_web(raw: &str) -> Option<Self> {
        let hex = raw.trim().strip_prefix('#')?;
        if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if hex.len() == 8 { channel(6)? } else { 255 },
        })
    }
}

impl fmt::Display for RgbaColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_web())
    }
}

impl Serialize for RgbaColor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_web())
    }
}

impl<'de> Deserialize<'de> for RgbaColor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RgbaColor::parse_web(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color string '{raw}'")))
    }
}

/// A user-defined category that shapes are assigned to.
///
/// Names are unique (case-sensitive) within a store; shapes reference their
/// category by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectCategory {
    pub name: String,
    pub color: RgbaColor,
}

impl ObjectCategory {
    /// Creates a new category with the given name and color.
    pub fn new(name: impl Into<String>, color: RgbaColor) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    /// Creates a new category with a random color.
    pub fn with_random_color(name: impl Into<String>) -> Self {
        Self::new(name, RgbaColor::random())
    }
}
