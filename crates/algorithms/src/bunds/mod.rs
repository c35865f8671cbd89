//! Detainment bund placement and catchment ranking
//!
//! Two stages:
//!
//! - **Sites** ([`simulate_sites`]): stations spaced along the flow-line
//!   network are attributed with contributing area and elevation, thinned
//!   per reach by elevation drop, given perpendicular bund footprints,
//!   de-overlapped and optionally filtered for bank incision, perennial
//!   stream proximity and field boundaries.
//! - **Catchments** ([`rank_sites`]): each site is burnt into the filled DEM
//!   as a dam, the surface is refilled, and the impounded volume per site
//!   is ranked against contributing area.
//!
//! Attribute names below are the field names of the vector layers.

mod candidates;
mod catchments;
mod conflicts;
mod elevation_drop;
mod filters;
mod params;
mod rank;
mod reach;
mod scenario;
mod sites;

pub use candidates::{generate_candidates, sample_mean, station_points, Candidate, CandidateReport};
pub use catchments::{simulate_catchments, CatchmentOutput, CatchmentReport, CatchmentSite};
pub use conflicts::{resolve_overlaps, Footprint, Wings};
pub use elevation_drop::elevation_drop;
pub use filters::{acceptable_incision, boundary_lines, incision_ranges, select_polygons, LineSet};
pub use params::{CatchmentParams, FlowAccUnits, SiteParams};
pub use rank::{catchment_features, merge_depth, rank_catchments, Catchment};
pub use reach::{network_parts, restrict_to_band, split_reaches, Reach, ReachNetwork};
pub use scenario::{group_scenarios, rank_sites, run_scenarios, Scenario};
pub use sites::{simulate_sites, BundSite, SiteInputs, SiteOutput, SiteReport};

pub const DB_ID: &str = "DB_ID";
pub const REACH: &str = "Reach";
pub const CONTR_AREA: &str = "Contr_area";
pub const ELEVATION: &str = "Elevation";
pub const HEIGHT: &str = "Height (m)";
pub const LENGTH: &str = "Length (m)";
pub const AZIMUTH: &str = "Azimuth";
pub const LEFT_RANGE: &str = "left_range";
pub const RIGHT_RANGE: &str = "right_range";
pub const VOLUME: &str = "Volume(m3)";
pub const AREA: &str = "Area (m2)";
pub const RATIO: &str = "Ratio";
