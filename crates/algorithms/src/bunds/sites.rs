//! Site simulation stage
//!
//! network -> catchment / field clip -> reaches -> stations -> elevation
//! drop -> overlap resolution -> incision / proximity / field filters ->
//! bund sites

use super::candidates::{generate_candidates, Candidate, CandidateReport};
use super::conflicts::{resolve_overlaps, Footprint, Wings};
use super::elevation_drop::elevation_drop;
use super::filters::{acceptable_incision, boundary_lines, incision_ranges, select_polygons, LineSet};
use super::params::SiteParams;
use super::reach::{network_parts, restrict_to_band, split_reaches};
use crate::vector::{clip_lines, ClipArea};
use bundsim_core::crs::ensure_compatible;
use bundsim_core::raster::Raster;
use bundsim_core::{Error, Feature, FeatureCollection, Result, CRS};
use geo::{Coord, Geometry, LineString};
use tracing::{debug, info, warn};

/// Layers consumed by the site stage
#[derive(Debug, Clone, Copy)]
pub struct SiteInputs<'a> {
    /// Unfilled DEM
    pub dem: &'a Raster<f64>,
    pub flow_acc: &'a Raster<f64>,
    /// Flow-line network
    pub network: &'a FeatureCollection,
    /// Perennial stream lines
    pub perennial: Option<&'a FeatureCollection>,
    /// Agricultural field polygons
    pub fields: Option<&'a FeatureCollection>,
    /// Catchment boundary polygons
    pub catchment: Option<&'a FeatureCollection>,
}

/// A candidate that survived every filter
#[derive(Debug, Clone, PartialEq)]
pub struct BundSite {
    pub db_id: i64,
    pub reach: i64,
    pub point: Coord<f64>,
    pub azimuth: f64,
    pub contr_area: f64,
    pub elevation: f64,
    pub height: f64,
    pub length: f64,
    pub wings: Wings,
    /// Left and right bank ranges, when incision elimination ran
    pub ranges: Option<(f64, f64)>,
}

impl BundSite {
    fn from_candidate(c: &Candidate, params: &SiteParams) -> Self {
        Self {
            db_id: c.db_id,
            reach: c.reach,
            point: c.point,
            azimuth: c.azimuth,
            contr_area: c.contr_area,
            elevation: c.elevation,
            height: params.height,
            length: params.length,
            wings: Wings::new(c.point, c.azimuth, params.length),
            ranges: None,
        }
    }

    pub fn line(&self) -> LineString<f64> {
        self.wings.site_line()
    }

    pub fn to_feature(&self) -> Feature {
        let mut f = Feature::new(Geometry::LineString(self.line()))
            .with(super::DB_ID, self.db_id)
            .with(super::REACH, self.reach)
            .with(super::CONTR_AREA, self.contr_area)
            .with(super::ELEVATION, self.elevation)
            .with(super::HEIGHT, self.height)
            .with(super::LENGTH, self.length)
            .with(super::AZIMUTH, self.azimuth);
        if let Some((left, right)) = self.ranges {
            f.set_property(super::LEFT_RANGE, left);
            f.set_property(super::RIGHT_RANGE, right);
        }
        f
    }
}

/// Counts of what each step kept and removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteReport {
    /// Network lines left after the catchment, field and band restrictions
    pub network_lines: usize,
    pub reaches: usize,
    pub zero_length_reaches: usize,
    pub candidates: CandidateReport,
    pub elevation_drop: usize,
    pub overlap: usize,
    pub incision: usize,
    pub proximity: usize,
    pub field: usize,
    pub sites: usize,
}

/// Result of the site stage
#[derive(Debug, Clone)]
pub struct SiteOutput {
    pub sites: Vec<BundSite>,
    /// Candidates left after the elevation-drop filter
    pub points: Vec<Candidate>,
    pub report: SiteReport,
    pub crs: Option<CRS>,
}

impl SiteOutput {
    pub fn site_features(&self) -> FeatureCollection {
        let mut fc = FeatureCollection::with_crs(self.crs.clone());
        fc.features.extend(self.sites.iter().map(BundSite::to_feature));
        fc
    }

    pub fn point_features(&self) -> FeatureCollection {
        let mut fc = FeatureCollection::with_crs(self.crs.clone());
        fc.features.extend(self.points.iter().map(Candidate::to_feature));
        fc
    }
}

fn check_crs(inputs: &SiteInputs) -> Result<()> {
    let dem_crs = inputs.dem.crs();
    ensure_compatible(dem_crs, inputs.flow_acc.crs())?;
    ensure_compatible(dem_crs, inputs.network.crs.as_ref())?;
    for layer in [inputs.perennial, inputs.fields, inputs.catchment].into_iter().flatten() {
        ensure_compatible(dem_crs, layer.crs.as_ref())?;
    }
    Ok(())
}

/// Place, filter and attribute bund sites along a flow-line network
pub fn simulate_sites(inputs: &SiteInputs, params: &SiteParams) -> Result<SiteOutput> {
    params.validate()?;
    check_crs(inputs)?;
    debug!(memory_mb = params.memory_mb, "site simulation");

    let mut parts = network_parts(inputs.network)?;
    if parts.is_empty() {
        return Err(Error::EmptySelection("flow-line network has no line features".into()));
    }

    let catchment = inputs
        .catchment
        .map(|c| select_polygons(c, "catchment", None, 0.0))
        .transpose()?;
    let fields = inputs
        .fields
        .map(|f| {
            select_polygons(f, "field", params.field_attribute.as_deref(), params.field_min)
        })
        .transpose()?;
    let areas: Vec<ClipArea> = catchment.iter().chain(fields.iter()).map(ClipArea::new).collect();

    if params.matched_network {
        for area in &areas {
            parts = clip_lines(&parts, area);
        }
    } else {
        parts = restrict_to_band(parts, inputs.flow_acc, params, &areas);
    }
    let field_lines = fields.as_ref().map(boundary_lines);
    let perennial = inputs.perennial.map(LineSet::from_layer).transpose()?;

    let crs = inputs
        .network
        .crs
        .clone()
        .or_else(|| inputs.dem.crs().cloned());
    let mut report = SiteReport {
        network_lines: parts.len(),
        ..Default::default()
    };
    info!("Network: {} lines in the simulation area", parts.len());
    if parts.is_empty() {
        warn!("No flow line lies in the simulation area");
        return Ok(SiteOutput {
            sites: Vec::new(),
            points: Vec::new(),
            report,
            crs,
        });
    }

    let network = split_reaches(&parts);
    report.reaches = network.len();
    report.zero_length_reaches = network.dropped;
    info!("Reaches: {} ({} zero-length dropped)", network.len(), network.dropped);

    let (candidates, cand_report) =
        generate_candidates(&parts, &network, inputs.dem, inputs.flow_acc, params);
    report.candidates = cand_report;
    info!("Candidates: {} of {} stations", candidates.len(), cand_report.stations);

    let before = candidates.len();
    let points = elevation_drop(candidates, params.height);
    report.elevation_drop = before - points.len();
    info!("Elevation drop removed {}", report.elevation_drop);

    let mut sites: Vec<BundSite> = points
        .iter()
        .map(|c| BundSite::from_candidate(c, params))
        .collect();

    let footprints: Vec<Footprint> = sites
        .iter()
        .map(|s| Footprint {
            db_id: s.db_id,
            contr_area: s.contr_area,
            shape: s.wings.footprint(params.wing_buffer),
        })
        .collect();
    let survivors = resolve_overlaps(&footprints);
    report.overlap = sites.len() - survivors.len();
    let mut keep = vec![false; sites.len()];
    for i in survivors {
        keep[i] = true;
    }
    let mut flags = keep.into_iter();
    sites.retain(|_| flags.next().unwrap_or(false));
    info!("Overlap resolution removed {}", report.overlap);

    if params.eliminate_incised {
        let before = sites.len();
        sites.retain_mut(|site| {
            site.ranges = incision_ranges(inputs.dem, &site.wings, params.wing_buffer);
            match site.ranges {
                Some(r) => acceptable_incision(r, params.height, params.z_factor),
                None => false,
            }
        });
        report.incision = before - sites.len();
        info!("Incision filter removed {}", report.incision);
    }

    if let Some(perennial) = &perennial {
        let before = sites.len();
        sites.retain(|s| !perennial.within(&s.line(), params.proximity));
        report.proximity = before - sites.len();
        info!("Perennial proximity removed {}", report.proximity);
    }

    if let Some(boundaries) = &field_lines {
        let before = sites.len();
        sites.retain(|s| !boundaries.crosses(&s.line()));
        report.field = before - sites.len();
        info!("Field boundaries removed {}", report.field);
    }

    report.sites = sites.len();
    info!("Bund sites: {}", sites.len());

    Ok(SiteOutput {
        sites,
        points,
        report,
        crs,
    })
}
