//! Site filters: bank incision, perennial stream proximity and field
//! boundaries

use super::conflicts::Wings;
use super::reach::geometry_kind;
use crate::statistics::multipolygon_statistics;
use crate::vector::{bounding_box, EnvelopeIndex};
use bundsim_core::raster::Raster;
use bundsim_core::{Error, FeatureCollection, Result};
use geo::{EuclideanDistance, Geometry, Intersects, LineString, MultiPolygon, Polygon};

/// DEM range (max - min) under the left and right wing buffers; `None`
/// when either buffer covers no valid cell
pub fn incision_ranges(dem: &Raster<f64>, wings: &Wings, radius: f64) -> Option<(f64, f64)> {
    let (left, right) = wings.wing_buffers(radius);
    let left = multipolygon_statistics(dem, &left)?;
    let right = multipolygon_statistics(dem, &right)?;
    Some((left.range, right.range))
}

/// Banks must rise above the bund on both sides without exceeding
/// twice its height
pub fn acceptable_incision(ranges: (f64, f64), height: f64, z_factor: f64) -> bool {
    let upper = 2.0 * height / z_factor;
    let ok = |r: f64| r > height && r < upper;
    ok(ranges.0) && ok(ranges.1)
}

/// Indexed set of reference lines
#[derive(Debug, Clone)]
pub struct LineSet {
    lines: Vec<LineString<f64>>,
    index: EnvelopeIndex,
}

impl LineSet {
    pub fn new(lines: Vec<LineString<f64>>) -> Self {
        let index = EnvelopeIndex::from_geometries(lines.iter());
        Self { lines, index }
    }

    /// Every line part of a layer
    pub fn from_layer(layer: &FeatureCollection) -> Result<Self> {
        let mut lines = Vec::new();
        for (i, feature) in layer.iter().enumerate() {
            match &feature.geometry {
                Some(Geometry::LineString(ls)) => lines.push(ls.clone()),
                Some(Geometry::MultiLineString(mls)) => lines.extend(mls.0.iter().cloned()),
                Some(other) => {
                    return Err(Error::InvalidGeometry(format!(
                        "reference feature {i} is not a line ({})",
                        geometry_kind(other)
                    )))
                }
                None => {}
            }
        }
        Ok(Self::new(lines))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn candidates(&self, line: &LineString<f64>, margin: f64) -> Vec<usize> {
        match bounding_box(&Geometry::LineString(line.clone())) {
            Some(bbox) => self.index.query(&bbox.expanded(margin)),
            None => Vec::new(),
        }
    }

    /// Some reference line lies within `distance` of `line`
    pub fn within(&self, line: &LineString<f64>, distance: f64) -> bool {
        self.candidates(line, distance)
            .into_iter()
            .any(|i| line.euclidean_distance(&self.lines[i]) <= distance)
    }

    /// `line` touches or crosses some reference line
    pub fn crosses(&self, line: &LineString<f64>) -> bool {
        self.candidates(line, 0.0)
            .into_iter()
            .any(|i| line.intersects(&self.lines[i]))
    }
}

fn rings(polygon: &Polygon<f64>) -> impl Iterator<Item = LineString<f64>> + '_ {
    std::iter::once(polygon.exterior().clone()).chain(polygon.interiors().iter().cloned())
}

/// Polygons of a layer merged into one area.
///
/// With `attribute`, only polygons whose value is at least `min_value`
/// are selected, and an empty selection is an error. `kind` names the
/// layer in error messages.
pub fn select_polygons(
    layer: &FeatureCollection,
    kind: &str,
    attribute: Option<&str>,
    min_value: f64,
) -> Result<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    for (i, feature) in layer.iter().enumerate() {
        if let Some(attr) = attribute {
            if !feature.get_f64(attr).is_some_and(|v| v >= min_value) {
                continue;
            }
        }
        match &feature.geometry {
            Some(Geometry::Polygon(p)) => polygons.push(p.clone()),
            Some(Geometry::MultiPolygon(mp)) => polygons.extend(mp.0.iter().cloned()),
            Some(other) => {
                return Err(Error::InvalidGeometry(format!(
                    "{kind} feature {i} is not a polygon ({})",
                    geometry_kind(other)
                )))
            }
            None => {}
        }
    }

    if polygons.is_empty() {
        return Err(Error::EmptySelection(match attribute {
            Some(attr) => format!("no {kind} polygon has {attr} >= {min_value}"),
            None => format!("{kind} layer has no polygon"),
        }));
    }
    Ok(MultiPolygon::new(polygons))
}

/// Exterior and interior rings of an area as reference lines
pub fn boundary_lines(area: &MultiPolygon<f64>) -> LineSet {
    LineSet::new(area.0.iter().flat_map(rings).collect())
}
