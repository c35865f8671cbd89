//! Vector operations used by the bund pipeline
//!
//! - Buffer: point circles and flat / square capped line rectangles
//! - Clip: lines restricted to polygon areas
//! - Spatial: bounding boxes and an R-tree envelope index
//! - Rasterize: polygon to cell selection
//! - Polygonize: label raster to dissolved polygons
//! - Measurements: compass azimuth

mod buffer;
mod clip;
mod measurements;
mod polygonize;
mod rasterize;
mod spatial;

pub use buffer::{buffer_line_string, buffer_point, buffer_segment, BufferParams, CapStyle};
pub use clip::{clip_lines, ClipArea};
pub use measurements::azimuth;
pub use polygonize::{label_cell_counts, polygonize};
pub use rasterize::{cells_in_multipolygon, cells_in_polygon};
pub use spatial::{bounding_box, BoundingBox, EnvelopeIndex};
