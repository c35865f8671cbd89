//! Zonal statistics
//!
//! Zones are either the non-zero labels of an `i32` raster or an explicit
//! set of cells (typically the cells whose centres fall in a polygon).
//! Nodata and NaN values never contribute.

use crate::vector::{cells_in_multipolygon, cells_in_polygon};
use bundsim_core::raster::Raster;
use bundsim_core::Result;
use geo::{MultiPolygon, Polygon};
use std::collections::BTreeMap;

/// Statistics of one zone
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalResult {
    pub zone_id: i32,
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub median: f64,
}

fn summarise(zone_id: i32, mut vals: Vec<f64>) -> Option<ZonalResult> {
    if vals.is_empty() {
        return None;
    }

    let count = vals.len();
    let sum: f64 = vals.iter().sum();
    let mean = sum / count as f64;
    let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

    vals.sort_by(f64::total_cmp);
    let min = vals[0];
    let max = vals[count - 1];
    let median = if count % 2 == 0 {
        (vals[count / 2 - 1] + vals[count / 2]) / 2.0
    } else {
        vals[count / 2]
    };

    Some(ZonalResult {
        zone_id,
        count,
        sum,
        mean,
        std_dev: var.sqrt(),
        min,
        max,
        range: max - min,
        median,
    })
}

/// Statistics per non-zero zone label
pub fn zonal_statistics(values: &Raster<f64>, zones: &Raster<i32>) -> Result<BTreeMap<i32, ZonalResult>> {
    values.ensure_same_shape(zones)?;

    let mut zone_values: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for ((row, col), &zone) in zones.data().indexed_iter() {
        if zone == 0 {
            continue;
        }
        if let Some(val) = values.value_at(row, col) {
            zone_values.entry(zone).or_default().push(val);
        }
    }

    Ok(zone_values
        .into_iter()
        .filter_map(|(zone, vals)| summarise(zone, vals).map(|r| (zone, r)))
        .collect())
}

/// Statistics over explicit cells; `None` when no cell holds a valid value
pub fn cells_statistics(values: &Raster<f64>, cells: &[(usize, usize)]) -> Option<ZonalResult> {
    let vals = cells
        .iter()
        .filter_map(|&(row, col)| values.value_at(row, col))
        .collect();
    summarise(0, vals)
}

/// Statistics over the cells whose centres fall in `polygon`
pub fn polygon_statistics(values: &Raster<f64>, polygon: &Polygon<f64>) -> Option<ZonalResult> {
    cells_statistics(values, &cells_in_polygon(values, polygon))
}

/// Statistics over the cells whose centres fall in any part of `polygons`
pub fn multipolygon_statistics(values: &Raster<f64>, polygons: &MultiPolygon<f64>) -> Option<ZonalResult> {
    cells_statistics(values, &cells_in_multipolygon(values, polygons))
}
