//! Multi-scenario catchment ranking
//!
//! Sites sharing a `(Height (m), Length (m))` pair form one scenario.
//! Scenarios are simulated independently, then their catchments are
//! merged and re-ranked and their depth rasters combined by maximum. A
//! failing scenario is logged and left out of the merge.

use super::catchments::{simulate_catchments, CatchmentOutput, CatchmentReport, CatchmentSite};
use super::params::CatchmentParams;
use super::rank::{catchment_features, merge_depth, rank_catchments};
use crate::maybe_rayon::*;
use bundsim_core::crs::ensure_compatible;
use bundsim_core::raster::{Raster, RasterElement};
use bundsim_core::{Error, FeatureCollection, Result};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// One `(height, length)` group of sites
#[derive(Debug, Clone)]
pub struct Scenario {
    pub height: f64,
    pub length: f64,
    pub sites: Vec<CatchmentSite>,
}

/// Group sites by exact height and length, ordered by height then length
pub fn group_scenarios(sites: Vec<CatchmentSite>) -> Vec<Scenario> {
    let mut groups: BTreeMap<(u64, u64), Vec<CatchmentSite>> = BTreeMap::new();
    for site in sites {
        groups
            .entry((site.height.to_bits(), site.length.to_bits()))
            .or_default()
            .push(site);
    }

    let mut scenarios: Vec<Scenario> = groups
        .into_iter()
        .map(|((h, l), sites)| Scenario {
            height: f64::from_bits(h),
            length: f64::from_bits(l),
            sites,
        })
        .collect();
    scenarios.sort_by(|a, b| a.height.total_cmp(&b.height).then(a.length.total_cmp(&b.length)));
    scenarios
}

/// Simulate every scenario and merge the results
pub fn run_scenarios(
    scenarios: Vec<Scenario>,
    filled_dem: &Raster<f64>,
    flow_dir: &Raster<u8>,
    params: &CatchmentParams,
) -> Result<CatchmentOutput> {
    params.validate()?;
    filled_dem.ensure_same_shape(flow_dir)?;

    let (rows, cols) = filled_dem.shape();
    let mut depth = filled_dem.with_same_meta::<f64>(rows, cols);
    depth.set_nodata(Some(f64::NAN));
    depth.data_mut().fill(f64::NAN);

    let total = scenarios.len();
    let results: Vec<(f64, f64, Result<CatchmentOutput>)> = scenarios
        .into_par_iter()
        .map(|s| {
            let out = simulate_catchments(&s.sites, filled_dem, flow_dir, params);
            (s.height, s.length, out)
        })
        .collect();

    let mut catchments = Vec::new();
    let mut report = CatchmentReport::default();
    let mut first_error = None;
    let mut failed = 0usize;
    for (height, length, result) in results {
        match result {
            Ok(out) => {
                info!("Scenario {height} m x {length} m: {} catchments", out.catchments.len());
                merge_depth(&mut depth, &out.depth)?;
                report.absorb(&out.report);
                catchments.extend(out.catchments);
            }
            Err(e) => {
                warn!("Scenario {height} m x {length} m failed: {e}");
                failed += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    if failed == total {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    rank_catchments(&mut catchments);
    Ok(CatchmentOutput {
        catchments,
        depth,
        report,
    })
}

/// Rank a site layer against a filled DEM and a flow direction raster in
/// the encoding named by `params.d8_encoding`
pub fn rank_sites<T: RasterElement>(
    sites: &FeatureCollection,
    filled_dem: &Raster<f64>,
    flow_dir: &Raster<T>,
    params: &CatchmentParams,
) -> Result<(CatchmentOutput, FeatureCollection)> {
    params.validate()?;
    ensure_compatible(filled_dem.crs(), flow_dir.crs())?;
    ensure_compatible(filled_dem.crs(), sites.crs.as_ref())?;
    if sites.is_empty() {
        return Err(Error::EmptySelection("site layer has no features".into()));
    }
    info!("Memory limit: {} MB", params.memory_mb);

    let fdir = params.d8_encoding.normalize_raster(flow_dir);
    let scenarios = group_scenarios(CatchmentSite::from_features(sites)?);
    info!("{} sites in {} scenarios", sites.len(), scenarios.len());

    let out = run_scenarios(scenarios, filled_dem, &fdir, params)?;
    let crs = sites.crs.clone().or_else(|| filled_dem.crs().cloned());
    let features = catchment_features(&out.catchments, crs);
    Ok((out, features))
}
