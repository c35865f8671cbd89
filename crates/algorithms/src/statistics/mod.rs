//! Statistics of raster values over zones

pub mod zonal;

pub use zonal::{
    cells_statistics, multipolygon_statistics, polygon_statistics, zonal_statistics, ZonalResult,
};
