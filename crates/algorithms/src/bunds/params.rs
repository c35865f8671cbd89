//! Parameters of the site and catchment stages

use crate::hydrology::FillParams;
use bundsim_core::{D8Encoding, Error, Result};
use serde::{Deserialize, Serialize};

/// Units of the flow accumulation raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowAccUnits {
    /// Upstream cell count
    #[default]
    #[serde(rename = "cells")]
    Cells,
    #[serde(rename = "m2")]
    SquareMetres,
    #[serde(rename = "ha")]
    Hectares,
}

impl FlowAccUnits {
    /// Accumulation value to hectares
    pub fn to_hectares(self, value: f64, cell_area: f64) -> f64 {
        match self {
            FlowAccUnits::Cells => value * cell_area / 10_000.0,
            FlowAccUnits::SquareMetres => value / 10_000.0,
            FlowAccUnits::Hectares => value,
        }
    }
}

impl std::str::FromStr for FlowAccUnits {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cells" => Ok(FlowAccUnits::Cells),
            "m2" => Ok(FlowAccUnits::SquareMetres),
            "ha" => Ok(FlowAccUnits::Hectares),
            other => Err(format!("unknown accumulation units '{other}' (cells, m2, ha)")),
        }
    }
}

/// Parameters of the site simulation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteParams {
    /// Distance between candidate stations along the network
    pub spacing: f64,
    /// Bund height (m)
    pub height: f64,
    /// Bund length across the flow line
    pub length: f64,
    /// Vertical to horizontal unit factor
    pub z_factor: f64,
    /// Memory hint for delegated geoprocessing (MB)
    pub memory_mb: u32,
    /// Drop sites whose banks are too low or too incised
    pub eliminate_incised: bool,
    /// Network comes from the matching flow-path stage; when false it is
    /// clipped to the contributing-area band first
    pub matched_network: bool,
    /// Lower contributing-area bound (ha, exclusive)
    pub min_ca_ha: f64,
    /// Upper contributing-area bound (ha, exclusive)
    pub max_ca_ha: f64,
    pub acc_units: FlowAccUnits,
    /// Minimum distance between a site and a perennial stream
    pub proximity: f64,
    /// Buffer radius of the wing lines
    pub wing_buffer: f64,
    /// Radius of the raster sample around each station
    pub sample_radius: f64,
    /// Numeric field restricting the field polygons; `None` makes every
    /// polygon a field
    pub field_attribute: Option<String>,
    /// Polygons with `field_attribute >= field_min` are fields
    pub field_min: f64,
}

impl Default for SiteParams {
    fn default() -> Self {
        Self {
            spacing: 60.0,
            height: 3.0,
            length: 20.0,
            z_factor: 1.0,
            memory_mb: 2000,
            eliminate_incised: false,
            matched_network: true,
            min_ca_ha: 2.0,
            max_ca_ha: 50.0,
            acc_units: FlowAccUnits::Cells,
            proximity: 25.0,
            wing_buffer: 0.7,
            sample_radius: 0.5,
            field_attribute: Some("isAG".into()),
            field_min: 1.0,
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_parameter(name, value, "must be positive"))
    }
}

impl SiteParams {
    pub fn validate(&self) -> Result<()> {
        positive("spacing", self.spacing)?;
        positive("height", self.height)?;
        positive("length", self.length)?;
        positive("z_factor", self.z_factor)?;
        positive("wing_buffer", self.wing_buffer)?;
        positive("sample_radius", self.sample_radius)?;
        if self.memory_mb == 0 {
            return Err(Error::invalid_parameter("memory_mb", 0, "must be positive"));
        }
        if !(self.proximity.is_finite() && self.proximity >= 0.0) {
            return Err(Error::invalid_parameter("proximity", self.proximity, "must be non-negative"));
        }
        if !(self.min_ca_ha < self.max_ca_ha) {
            return Err(Error::invalid_parameter(
                "min_ca_ha",
                self.min_ca_ha,
                format!("must be below max_ca_ha ({})", self.max_ca_ha),
            ));
        }
        Ok(())
    }
}

/// Parameters of the catchment stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchmentParams {
    pub z_factor: f64,
    /// Memory hint for delegated geoprocessing (MB)
    pub memory_mb: u32,
    /// Buffer of the site line selecting the pour cells
    pub pour_buffer: f64,
    /// Chaikin smoothing passes applied to catchment polygons
    pub smooth_iterations: usize,
    /// Encoding of the input flow direction raster
    pub d8_encoding: D8Encoding,
    /// Refill settings; keep equal to the preconditioning fill
    pub fill: FillParams,
}

impl Default for CatchmentParams {
    fn default() -> Self {
        Self {
            z_factor: 1.0,
            memory_mb: 2000,
            pour_buffer: 1.0,
            smooth_iterations: 1,
            d8_encoding: D8Encoding::Native,
            fill: FillParams::default(),
        }
    }
}

impl CatchmentParams {
    pub fn validate(&self) -> Result<()> {
        positive("z_factor", self.z_factor)?;
        positive("pour_buffer", self.pour_buffer)?;
        if self.memory_mb == 0 {
            return Err(Error::invalid_parameter("memory_mb", 0, "must be positive"));
        }
        if !(self.fill.epsilon.is_finite() && self.fill.epsilon >= 0.0) {
            return Err(Error::invalid_parameter("epsilon", self.fill.epsilon, "must be non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SiteParams::default().validate().is_ok());
        assert!(CatchmentParams::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let p = SiteParams { spacing: 0.0, ..Default::default() };
        assert!(matches!(p.validate(), Err(Error::InvalidParameter { name: "spacing", .. })));

        let p = SiteParams { min_ca_ha: 60.0, ..Default::default() };
        assert!(p.validate().is_err());

        let p = CatchmentParams { z_factor: -1.0, ..Default::default() };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_partial_json_overrides_defaults() {
        let p: SiteParams = serde_json::from_str(r#"{"height": 2.5, "acc_units": "ha"}"#).unwrap();
        assert_eq!(p.height, 2.5);
        assert_eq!(p.acc_units, FlowAccUnits::Hectares);
        assert_eq!(p.spacing, 60.0);
    }

    #[test]
    fn test_field_filter_defaults_to_is_ag() {
        let p = SiteParams::default();
        assert_eq!(p.field_attribute.as_deref(), Some("isAG"));
        assert_eq!(p.field_min, 1.0);

        let p: SiteParams = serde_json::from_str(r#"{"field_attribute": null}"#).unwrap();
        assert!(p.field_attribute.is_none());
    }

    #[test]
    fn test_units() {
        assert_eq!(FlowAccUnits::Cells.to_hectares(200.0, 100.0), 2.0);
        assert_eq!(FlowAccUnits::SquareMetres.to_hectares(20_000.0, 4.0), 2.0);
        assert_eq!("HA".parse::<FlowAccUnits>().unwrap(), FlowAccUnits::Hectares);
        assert!("acres".parse::<FlowAccUnits>().is_err());
    }
}
