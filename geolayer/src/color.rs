//! Colors, named color ranges and the cache converting color ranges into RGB values.

use std::sync::Arc;

use quick_cache::unsync::Cache;
use serde::{Deserialize, Serialize};

use crate::scale::Interpolate;

/// Color representation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl From<String> for Color {
    fn from(value: String) -> Self {
        Self::try_from_hex(&value).unwrap_or_else(|| {
            log::warn!("Invalid color hex string {value}, using black");
            Color::BLACK
        })
    }
}

impl From<Color> for String {
    fn from(val: Color) -> Self {
        val.to_hex()
    }
}

impl Color {
    /// Transparent color: `#00000000`. Encoded value of a cell that has no data.
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    /// White color: `#FFFFFFFF`
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    /// Black color: `#000000FF`
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);

    /// Constructs color from its RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Constructs an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Converts the color into u8 array (RGBA).
    pub fn to_u8_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Converts the color into an RGB triplet, dropping the alpha channel.
    pub fn to_rgb_array(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Converts the color into HEX6 string `#RRGGBB` if it is opaque, or HEX8 `#RRGGBBAA` otherwise.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// Parses a color from the hex string. Hex string can be either HEX6 (`#RRGGBB`) or HEX8 (`#RRGGBBAA`).
    pub fn try_from_hex(hex_string: &str) -> Option<Self> {
        if hex_string.len() != 7 && hex_string.len() != 9 || !hex_string.starts_with('#') {
            return None;
        }

        let r = u8::from_str_radix(hex_string.get(1..3)?, 16).ok()?;
        let g = u8::from_str_radix(hex_string.get(3..5)?, 16).ok()?;
        let b = u8::from_str_radix(hex_string.get(5..7)?, 16).ok()?;
        let a = if hex_string.len() == 9 {
            u8::from_str_radix(hex_string.get(7..9)?, 16).ok()?
        } else {
            255
        };

        Some(Self { r, g, b, a })
    }

    /// Returns a new color instance, copied from the base one but with the given alpha channel.
    pub fn with_alpha(&self, a: u8) -> Self {
        Self { a, ..*self }
    }

    /// Red component of the color in RGBA space.
    pub fn r(&self) -> u8 {
        self.r
    }

    /// Green component of the color in RGBA space.
    pub fn g(&self) -> u8 {
        self.g
    }

    /// Blue component of the color in RGBA space.
    pub fn b(&self) -> u8 {
        self.b
    }

    /// Opacity component of the color.
    pub fn a(&self) -> u8 {
        self.a
    }
}

impl Interpolate for Color {
    fn interpolate(&self, other: &Self, t: f64) -> Self {
        let channel = |from: u8, to: u8| -> u8 {
            (from as f64 + (to as f64 - from as f64) * t)
                .round()
                .clamp(0.0, 255.0) as u8
        };

        Color {
            r: channel(self.r, other.r),
            g: channel(self.g, other.g),
            b: channel(self.b, other.b),
            a: channel(self.a, other.a),
        }
    }
}

/// Named, ordered list of hex colors used as the range of a color channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorRange {
    /// Display name of the palette.
    pub name: String,
    /// Palette family, e.g. `Uber` or `ColorBrewer`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Palette category, e.g. `sequential` or `diverging`.
    pub category: String,
    /// Hex colors of the palette.
    pub colors: Vec<String>,
}

impl ColorRange {
    /// Creates an ad hoc range from a list of hex colors.
    pub fn from_hex(colors: &[&str]) -> Self {
        Self {
            name: "Custom Palette".to_string(),
            kind: "custom".to_string(),
            category: "Custom".to_string(),
            colors: colors.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Default for ColorRange {
    fn default() -> Self {
        Self {
            name: "Global Warming".to_string(),
            kind: "sequential".to_string(),
            category: "Uber".to_string(),
            colors: [
                "#5A1846", "#900C3F", "#C70039", "#E3611C", "#F1920E", "#FFC300",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }
}

const COLOR_CACHE_CAPACITY: usize = 64;

/// Memoizes conversion of [`ColorRange`]s into RGB colors.
///
/// Entries are keyed by the structural hash of the range, so two equal ranges created independently share
/// one converted palette.
pub struct ColorRangeCache {
    hasher: ahash::RandomState,
    cache: Cache<u64, Arc<Vec<Color>>>,
    conversions: usize,
}

impl Default for ColorRangeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ColorRangeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorRangeCache")
            .field("conversions", &self.conversions)
            .finish()
    }
}

impl ColorRangeCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            hasher: ahash::RandomState::new(),
            cache: Cache::new(COLOR_CACHE_CAPACITY),
            conversions: 0,
        }
    }

    /// Opaque RGB colors of the range. Invalid hex strings are converted into black.
    pub fn colors(&mut self, range: &ColorRange) -> Arc<Vec<Color>> {
        let key = self.hasher.hash_one(range);
        if let Some(colors) = self.cache.get(&key) {
            return colors.clone();
        }

        let colors: Arc<Vec<Color>> = Arc::new(
            range
                .colors
                .iter()
                .map(|hex| Color::from(hex.clone()).with_alpha(255))
                .collect(),
        );
        self.conversions += 1;
        self.cache.insert(key, colors.clone());

        colors
    }

    /// Number of ranges converted so far. Cache hits are not counted.
    pub fn conversions(&self) -> usize {
        self.conversions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_serialization() {
        let hex = "#FF1000AA";
        let color = Color::try_from_hex(hex).unwrap();
        assert_eq!(&color.to_hex(), hex);
        assert_eq!(Color::try_from_hex("#FF1000"), Some(Color::rgb(255, 16, 0)));
        assert_eq!(Color::rgb(255, 16, 0).to_hex(), "#FF1000");
        assert_eq!(Color::try_from_hex("FF1000"), None);
        assert_eq!(Color::try_from_hex("#GG1000"), None);
    }

    #[test]
    fn color_serde() {
        let color: Color = serde_json::from_str("\"#010203\"").unwrap();
        assert_eq!(color.to_u8_array(), [1, 2, 3, 255]);
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"#010203\"");
    }

    #[test]
    fn interpolate_colors() {
        let from = Color::rgb(0, 0, 0);
        let to = Color::rgb(255, 100, 10);
        assert_eq!(from.interpolate(&to, 0.0), from);
        assert_eq!(from.interpolate(&to, 1.0), to);
        assert_eq!(from.interpolate(&to, 0.5), Color::rgb(128, 50, 5));
    }

    #[test]
    fn color_range_is_converted_once() {
        let mut cache = ColorRangeCache::new();
        let range = ColorRange::from_hex(&["#010101", "#020202"]);

        let first = cache.colors(&range);
        let second = cache.colors(&range.clone());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.conversions(), 1);
        assert_eq!(first[1].to_rgb_array(), [2, 2, 2]);

        let other = cache.colors(&ColorRange::from_hex(&["#030303"]));
        assert_eq!(other.len(), 1);
        assert_eq!(cache.conversions(), 2);
    }
}
