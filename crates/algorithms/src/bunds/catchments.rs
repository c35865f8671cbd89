//! Watershed and volume simulation
//!
//! Every site in a scenario is dammed at once: its pour cells seed a
//! labelled upstream trace, the dam crest (lowest filled elevation under
//! the pour footprint plus the bund height) is burnt into the filled DEM,
//! and the burnt surface is filled again. Cells raised by the refill are
//! the impoundments; each is credited to the site whose basin holds it.

use super::params::CatchmentParams;
use super::rank::{rank_catchments, Catchment};
use super::reach::geometry_kind;
use crate::hydrology::{priority_flood, watershed, PourCell, WatershedParams};
use crate::statistics::{cells_statistics, zonal_statistics};
use crate::vector::{
    buffer_line_string, buffer_point, cells_in_multipolygon, label_cell_counts, polygonize,
    BufferParams, CapStyle,
};
use bundsim_core::crs::ensure_compatible;
use bundsim_core::raster::Raster;
use bundsim_core::{Error, FeatureCollection, Result};
use geo::{ChaikinSmoothing, Geometry, MultiPolygon};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// A bund site as read back from a site layer
#[derive(Debug, Clone, PartialEq)]
pub struct CatchmentSite {
    pub db_id: i64,
    /// Contributing area (ha)
    pub contr_area: f64,
    pub height: f64,
    pub length: f64,
    /// Crest line, or a point for point layers
    pub geometry: Geometry<f64>,
}

impl CatchmentSite {
    /// Read sites with `DB_ID`, `Contr_area`, `Height (m)` and `Length (m)`
    pub fn from_features(layer: &FeatureCollection) -> Result<Vec<Self>> {
        layer
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let geometry = match &feature.geometry {
                    Some(g @ (Geometry::LineString(_) | Geometry::MultiLineString(_) | Geometry::Point(_))) => {
                        g.clone()
                    }
                    Some(other) => {
                        return Err(Error::InvalidGeometry(format!(
                            "site feature {i} is not a line or point ({})",
                            geometry_kind(other)
                        )))
                    }
                    None => return Err(Error::InvalidGeometry(format!("site feature {i} has no geometry"))),
                };
                Ok(Self {
                    db_id: layer.require_i64(i, super::DB_ID)?,
                    contr_area: layer.require_f64(i, super::CONTR_AREA)?,
                    height: layer.require_f64(i, super::HEIGHT)?,
                    length: layer.require_f64(i, super::LENGTH)?,
                    geometry,
                })
            })
            .collect()
    }

    /// Area whose cells act as the site's pour point
    pub fn pour_footprint(&self, distance: f64) -> MultiPolygon<f64> {
        match &self.geometry {
            Geometry::LineString(ls) => buffer_line_string(ls, distance, CapStyle::Square),
            Geometry::MultiLineString(mls) => MultiPolygon::new(
                mls.0
                    .iter()
                    .flat_map(|ls| buffer_line_string(ls, distance, CapStyle::Square).0)
                    .collect(),
            ),
            Geometry::Point(p) => MultiPolygon::new(vec![buffer_point(
                p,
                &BufferParams {
                    distance,
                    segments: 16,
                },
            )]),
            _ => MultiPolygon::new(vec![]),
        }
    }
}

/// Per-site outcomes of a simulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchmentReport {
    pub sites: usize,
    /// No pour cell on valid terrain
    pub off_raster: usize,
    /// Nothing impounded
    pub dry: usize,
    /// Contributing area not positive
    pub zero_area: usize,
    pub ranked: usize,
}

impl CatchmentReport {
    pub fn dropped(&self) -> usize {
        self.off_raster + self.dry + self.zero_area
    }

    pub(crate) fn absorb(&mut self, other: &CatchmentReport) {
        self.sites += other.sites;
        self.off_raster += other.off_raster;
        self.dry += other.dry;
        self.zero_area += other.zero_area;
        self.ranked += other.ranked;
    }
}

/// Ranked catchments with the flood depth raster
#[derive(Debug, Clone)]
pub struct CatchmentOutput {
    pub catchments: Vec<Catchment>,
    /// Positive refill depth, NaN where nothing is impounded
    pub depth: Raster<f64>,
    pub report: CatchmentReport,
}

fn site_label(site: &CatchmentSite) -> Result<i32> {
    i32::try_from(site.db_id)
        .ok()
        .filter(|l| *l > 0)
        .ok_or_else(|| Error::invalid_parameter(super::DB_ID, site.db_id, "must be a positive 32-bit id"))
}

/// Simulate one scenario: all `sites` dammed together on `filled_dem`.
///
/// `flow_dir` uses the internal D8 encoding and must share the DEM grid.
pub fn simulate_catchments(
    sites: &[CatchmentSite],
    filled_dem: &Raster<f64>,
    flow_dir: &Raster<u8>,
    params: &CatchmentParams,
) -> Result<CatchmentOutput> {
    params.validate()?;
    filled_dem.ensure_same_shape(flow_dir)?;
    ensure_compatible(filled_dem.crs(), flow_dir.crs())?;

    let (rows, cols) = filled_dem.shape();
    let cell_area = filled_dem.cell_area();
    let mut report = CatchmentReport {
        sites: sites.len(),
        ..Default::default()
    };

    let mut labels = HashSet::new();
    let mut placed = HashSet::new();
    let mut seeds = Vec::new();
    let mut crest: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for site in sites {
        let label = site_label(site)?;
        if !labels.insert(label) {
            return Err(Error::invalid_parameter(super::DB_ID, site.db_id, "duplicate site id"));
        }

        let cells: Vec<(usize, usize)> = cells_in_multipolygon(filled_dem, &site.pour_footprint(params.pour_buffer))
            .into_iter()
            .filter(|&(r, c)| filled_dem.value_at(r, c).is_some())
            .collect();
        let Some(floor) = cells_statistics(filled_dem, &cells).map(|s| s.min) else {
            warn!("Site {} has no pour cell on the DEM", site.db_id);
            report.off_raster += 1;
            continue;
        };

        placed.insert(label);
        let top = floor + site.height;
        for &(row, col) in &cells {
            seeds.push(PourCell { row, col, label });
            // shared cells keep the higher crest
            let z = crest.entry((row, col)).or_insert(top);
            *z = z.max(top);
        }
        debug!(db_id = site.db_id, cells = cells.len(), crest = top, "burn");
    }

    let basins = watershed(flow_dir, &WatershedParams { seeds })?;

    let mut burnt = filled_dem.clone();
    for (&(row, col), &z) in &crest {
        burnt.data_mut()[(row, col)] = z;
    }
    let refilled = priority_flood(&burnt, params.fill)?;

    let mut depth = filled_dem.with_same_meta::<f64>(rows, cols);
    depth.set_nodata(Some(f64::NAN));
    depth.data_mut().fill(f64::NAN);
    let mut volume = depth.clone();
    let mut sinks = filled_dem.with_same_meta::<i32>(rows, cols);
    sinks.set_nodata(Some(0));

    for row in 0..rows {
        for col in 0..cols {
            let (Some(before), Some(after)) = (filled_dem.value_at(row, col), refilled.value_at(row, col)) else {
                continue;
            };
            let rise = after - before;
            if rise <= 0.0 {
                continue;
            }
            depth.data_mut()[(row, col)] = rise;
            volume.data_mut()[(row, col)] = rise * params.z_factor * cell_area;
            let label = unsafe { basins.get_unchecked(row, col) };
            sinks.data_mut()[(row, col)] = label;
        }
    }

    let volumes = zonal_statistics(&volume, &sinks)?;
    let counts = label_cell_counts(&sinks);
    let mut shapes = polygonize(&sinks);

    let mut catchments = Vec::new();
    for site in sites {
        let Ok(label) = site_label(site) else { continue };
        if !placed.contains(&label) {
            continue;
        }
        let (Some(stats), Some(shape)) = (volumes.get(&label), shapes.remove(&label)) else {
            warn!("Site {} impounds no water", site.db_id);
            report.dry += 1;
            continue;
        };
        if !(site.contr_area > 0.0) {
            warn!("Site {} has no contributing area", site.db_id);
            report.zero_area += 1;
            continue;
        }

        let shape = if params.smooth_iterations > 0 {
            shape.chaikin_smoothing(params.smooth_iterations)
        } else {
            shape
        };
        catchments.push(Catchment {
            db_id: site.db_id,
            contr_area: site.contr_area,
            height: site.height,
            length: site.length,
            volume: stats.sum,
            area: counts.get(&label).copied().unwrap_or(0) as f64 * cell_area,
            ratio: stats.sum / site.contr_area,
            shape,
        });
    }

    rank_catchments(&mut catchments);
    report.ranked = catchments.len();
    info!(
        "Catchments: {} ranked, {} dropped of {} sites",
        report.ranked,
        report.dropped(),
        report.sites
    );

    Ok(CatchmentOutput {
        catchments,
        depth,
        report,
    })
}
