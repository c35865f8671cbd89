//! Reading and writing rasters (GeoTIFF) and vectors (GeoJSON)

mod native;
mod vector;

pub use native::{read_geotiff, write_geotiff, GeoTiffOptions};
pub use vector::{parse_geojson, read_geojson, to_geojson_string, write_geojson};
