//! Hydrological building blocks of the catchment stage
//!
//! - Priority-Flood depression filling (Barnes 2014)
//! - D8 flow direction and flow accumulation
//! - Labelled upstream watershed delineation

pub(crate) mod flow_accumulation;
pub(crate) mod flow_direction;
mod priority_flood;
mod watershed;

pub use flow_accumulation::{flow_accumulation, FlowAccumulation};
pub use flow_direction::{flow_direction, FlowDirection};
pub use priority_flood::{priority_flood, FillParams, PriorityFlood};
pub use watershed::{watershed, PourCell, Watershed, WatershedParams};
