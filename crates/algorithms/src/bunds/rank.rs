//! Catchment ranking and scenario merging

use bundsim_core::raster::Raster;
use bundsim_core::{Feature, FeatureCollection, Result, CRS};
use geo::{Geometry, MultiPolygon};

/// Impoundment catchment of one bund site
#[derive(Debug, Clone, PartialEq)]
pub struct Catchment {
    pub db_id: i64,
    /// Contributing area (ha)
    pub contr_area: f64,
    pub height: f64,
    pub length: f64,
    /// Stored volume (m3)
    pub volume: f64,
    /// Flooded area (m2)
    pub area: f64,
    /// Volume per hectare of contributing area
    pub ratio: f64,
    pub shape: MultiPolygon<f64>,
}

impl Catchment {
    pub fn to_feature(&self) -> Feature {
        Feature::new(Geometry::MultiPolygon(self.shape.clone()))
            .with(super::DB_ID, self.db_id)
            .with(super::CONTR_AREA, self.contr_area)
            .with(super::HEIGHT, self.height)
            .with(super::LENGTH, self.length)
            .with(super::VOLUME, self.volume)
            .with(super::AREA, self.area)
            .with(super::RATIO, self.ratio)
    }
}

/// Sort by descending ratio; equal ratios keep ascending `DB_ID`
pub fn rank_catchments(catchments: &mut [Catchment]) {
    catchments.sort_by(|a, b| b.ratio.total_cmp(&a.ratio).then(a.db_id.cmp(&b.db_id)));
}

/// Ranked catchments as a feature layer
pub fn catchment_features(catchments: &[Catchment], crs: Option<CRS>) -> FeatureCollection {
    let mut fc = FeatureCollection::with_crs(crs);
    fc.features.extend(catchments.iter().map(Catchment::to_feature));
    fc
}

/// Cell-wise maximum of two depth rasters; NaN counts as dry
pub fn merge_depth(target: &mut Raster<f64>, other: &Raster<f64>) -> Result<()> {
    target.ensure_same_shape(other)?;
    for (t, &o) in target.data_mut().iter_mut().zip(other.data().iter()) {
        if o.is_nan() {
            continue;
        }
        if t.is_nan() || o > *t {
            *t = o;
        }
    }
    Ok(())
}
