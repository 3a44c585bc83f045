//! Geometric primitives shared by the `geolayer` crates: geographic [`Position`]s, generic bounding
//! [`Rect`]angles and helpers to walk [GeoJSON](geojson) geometries.

pub mod error;
pub mod position;
pub mod rect;

#[cfg(feature = "geojson")]
pub mod geojson;

pub use position::{GeoPoint, Position};
pub use rect::Rect;
