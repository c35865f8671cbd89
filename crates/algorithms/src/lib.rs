//! # bundsim algorithms
//!
//! Detainment bund site simulation and catchment ranking.
//!
//! ## Modules
//!
//! - **bunds**: site placement, overlap resolution, filters, dam
//!   simulation and ranking
//! - **hydrology**: Priority-Flood filling, D8 flow direction and
//!   accumulation, labelled watersheds
//! - **statistics**: zonal statistics over label rasters and polygons
//! - **vector**: buffers, line clipping, spatial index, rasterize, polygonize, azimuth

pub mod bunds;
pub mod hydrology;
pub(crate) mod maybe_rayon;
pub mod statistics;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bunds::{
        rank_sites, simulate_catchments, simulate_sites, CatchmentOutput, CatchmentParams,
        CatchmentSite, FlowAccUnits, SiteInputs, SiteOutput, SiteParams,
    };
    pub use crate::hydrology::{
        flow_accumulation, flow_direction, priority_flood, watershed, FillParams,
        FlowAccumulation, FlowDirection, PourCell, PriorityFlood, Watershed, WatershedParams,
    };
    pub use crate::statistics::{zonal_statistics, ZonalResult};
    pub use bundsim_core::prelude::*;
}
