//! Raster data structures and operations

pub mod d8;
mod element;
mod geotransform;
mod grid;

pub use d8::{D8Encoding, D8_OFFSETS};
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
