//! Reach preparation
//!
//! The flow-line network is broken into reaches at junctions. Each reach
//! gets a `LINKNO` and a compass bearing; stations generated along the
//! network are joined to the reach they lie on.

use super::params::SiteParams;
use crate::vector::{azimuth, BoundingBox, ClipArea, EnvelopeIndex};
use bundsim_core::raster::Raster;
use bundsim_core::{Error, FeatureCollection, Result};
use geo::{Coord, EuclideanDistance, Geometry, LineString, Point};
use std::collections::{HashMap, HashSet};

/// Vertices closer than this are the same junction
const JUNCTION_TOLERANCE: f64 = 1e-6;

/// Lines farther than this from the contributing-area band are dropped
/// when the network does not come from the matching flow-path stage
const BAND_DISTANCE: f64 = 2.0;

/// A network segment between junctions
#[derive(Debug, Clone, PartialEq)]
pub struct Reach {
    pub link_no: i64,
    pub line: LineString<f64>,
    /// Bearing from the first to the last vertex, degrees from north
    pub azimuth: f64,
}

/// Split reaches with a spatial index for station lookup
#[derive(Debug, Clone)]
pub struct ReachNetwork {
    pub reaches: Vec<Reach>,
    /// Zero-length reaches discarded while splitting
    pub dropped: usize,
    index: EnvelopeIndex,
}

/// Every line part of a network layer; features without geometry are
/// skipped, any other geometry type is rejected
pub fn network_parts(network: &FeatureCollection) -> Result<Vec<LineString<f64>>> {
    let mut parts = Vec::new();
    for (i, feature) in network.iter().enumerate() {
        match &feature.geometry {
            Some(Geometry::LineString(ls)) => parts.push(ls.clone()),
            Some(Geometry::MultiLineString(mls)) => parts.extend(mls.0.iter().cloned()),
            Some(Geometry::Line(l)) => parts.push(LineString::from(vec![l.start, l.end])),
            Some(other) => {
                return Err(Error::InvalidGeometry(format!(
                    "network feature {i} is not a line ({})",
                    geometry_kind(other)
                )))
            }
            None => {}
        }
    }
    Ok(parts)
}

pub(crate) fn geometry_kind(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

type VertexKey = (i64, i64);

fn vertex_key(c: Coord<f64>) -> VertexKey {
    (
        (c.x / JUNCTION_TOLERANCE).round() as i64,
        (c.y / JUNCTION_TOLERANCE).round() as i64,
    )
}

fn point_box(c: Coord<f64>) -> BoundingBox {
    BoundingBox::new(c.x, c.y, c.x, c.y)
}

/// Copy of each part with the end vertices of other parts that touch one
/// of its segments between vertices inserted in order along the segment
fn insert_tee_vertices(parts: &[LineString<f64>]) -> Vec<LineString<f64>> {
    let ends: Vec<(usize, Coord<f64>)> = parts
        .iter()
        .enumerate()
        .filter_map(|(i, p)| Some((i, *p.0.first()?, *p.0.last()?)))
        // closed and zero-length parts end where they start
        .filter(|&(_, first, last)| vertex_key(first) != vertex_key(last))
        .flat_map(|(i, first, last)| [(i, first), (i, last)])
        .collect();
    let index = EnvelopeIndex::new(ends.iter().enumerate().map(|(k, &(_, c))| (k, point_box(c))));

    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let mut coords = Vec::with_capacity(part.0.len());
            for seg in part.lines() {
                coords.push(seg.start);
                let (dx, dy) = (seg.end.x - seg.start.x, seg.end.y - seg.start.y);
                let len2 = dx * dx + dy * dy;
                if len2 == 0.0 {
                    continue;
                }
                let (start_key, end_key) = (vertex_key(seg.start), vertex_key(seg.end));
                let bbox = BoundingBox::new(
                    seg.start.x.min(seg.end.x),
                    seg.start.y.min(seg.end.y),
                    seg.start.x.max(seg.end.x),
                    seg.start.y.max(seg.end.y),
                )
                .expanded(JUNCTION_TOLERANCE);

                let mut tees: Vec<(f64, Coord<f64>)> = index
                    .query(&bbox)
                    .into_iter()
                    .map(|k| ends[k])
                    .filter(|&(owner, c)| {
                        let key = vertex_key(c);
                        owner != i
                            && key != start_key
                            && key != end_key
                            && Point::from(c).euclidean_distance(&seg) <= JUNCTION_TOLERANCE
                    })
                    .map(|(_, c)| (((c.x - seg.start.x) * dx + (c.y - seg.start.y) * dy) / len2, c))
                    .collect();
                tees.sort_by(|a, b| a.0.total_cmp(&b.0));
                tees.dedup_by(|a, b| vertex_key(a.1) == vertex_key(b.1));
                coords.extend(tees.into_iter().map(|(_, c)| c));
            }
            coords.extend(part.0.last().copied());
            LineString::from(coords)
        })
        .collect()
}

/// Split parts at junctions: interior vertices shared with another part,
/// and points where another part ends on one of its segments
pub fn split_reaches(parts: &[LineString<f64>]) -> ReachNetwork {
    let parts = insert_tee_vertices(parts);
    let mut owners: HashMap<VertexKey, usize> = HashMap::new();
    for part in &parts {
        let keys: HashSet<VertexKey> = part.0.iter().map(|&c| vertex_key(c)).collect();
        for key in keys {
            *owners.entry(key).or_insert(0) += 1;
        }
    }

    let mut pieces: Vec<Vec<Coord<f64>>> = Vec::new();
    for part in &parts {
        let n = part.0.len();
        let mut current: Vec<Coord<f64>> = Vec::new();
        for (i, &c) in part.0.iter().enumerate() {
            current.push(c);
            let interior = i > 0 && i + 1 < n;
            if interior && owners.get(&vertex_key(c)).copied().unwrap_or(0) > 1 {
                pieces.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
        pieces.push(current);
    }

    let mut reaches = Vec::new();
    let mut dropped = 0;
    for coords in pieces {
        let (Some(&first), Some(&last)) = (coords.first(), coords.last()) else {
            continue;
        };
        if vertex_key(first) == vertex_key(last) {
            dropped += 1;
            continue;
        }
        reaches.push(Reach {
            link_no: reaches.len() as i64 + 1,
            azimuth: azimuth(first, last),
            line: LineString::from(coords),
        });
    }

    let index = EnvelopeIndex::from_geometries(reaches.iter().map(|r| &r.line));
    ReachNetwork {
        reaches,
        dropped,
        index,
    }
}

impl ReachNetwork {
    pub fn len(&self) -> usize {
        self.reaches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reaches.is_empty()
    }

    /// Reach nearest to `point` among those whose box lies within
    /// `tolerance`; equal distances resolve to the lowest `LINKNO`
    pub fn locate(&self, point: Coord<f64>, tolerance: f64) -> Option<&Reach> {
        let p = Point::from(point);
        let bbox = BoundingBox::new(point.x, point.y, point.x, point.y).expanded(tolerance);
        self.index
            .query(&bbox)
            .into_iter()
            .map(|i| (i, p.euclidean_distance(&self.reaches[i].line)))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(i, _)| &self.reaches[i])
    }
}

/// Keep the lines that pass within two map units of a cell whose
/// contributing area lies inside the candidate band. With clip areas, a
/// band cell counts only when its centre lies in every area.
pub fn restrict_to_band(
    parts: Vec<LineString<f64>>,
    flow_acc: &Raster<f64>,
    params: &SiteParams,
    areas: &[ClipArea],
) -> Vec<LineString<f64>> {
    let cell_area = flow_acc.cell_area();
    let in_band = |row: usize, col: usize, centre: Coord<f64>| {
        let band = flow_acc.value_at(row, col).is_some_and(|v| {
            let ha = params.acc_units.to_hectares(v, cell_area);
            ha > params.min_ca_ha && ha < params.max_ca_ha
        });
        band && areas.iter().all(|a| a.contains(centre))
    };

    parts
        .into_iter()
        .filter(|line| {
            let Some(rect) = geo::BoundingRect::bounding_rect(line) else {
                return false;
            };
            let bbox = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
                .expanded(BAND_DISTANCE);
            let Some((row0, col0, row1, col1)) =
                flow_acc.window(bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y)
            else {
                return false;
            };
            (row0..=row1).any(|row| {
                (col0..=col1).any(|col| {
                    let (x, y) = flow_acc.pixel_to_geo(col, row);
                    in_band(row, col, Coord { x, y })
                        && Point::new(x, y).euclidean_distance(line) <= BAND_DISTANCE
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bundsim_core::{Feature, GeoTransform};
    use geo::{coord, MultiLineString, MultiPolygon, Polygon};

    fn line(coords: &[(f64, f64)]) -> LineString<f64> {
        LineString::from(coords.to_vec())
    }

    #[test]
    fn test_split_at_junction() {
        // tributary joins the main stem at (10, 0)
        let main = line(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let trib = line(&[(10.0, 10.0), (10.0, 0.0)]);
        let net = split_reaches(&[main, trib]);

        assert_eq!(net.len(), 3);
        assert_eq!(net.dropped, 0);
        let ids: Vec<i64> = net.reaches.iter().map(|r| r.link_no).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(net.reaches[0].line, line(&[(0.0, 0.0), (10.0, 0.0)]));
        assert_eq!(net.reaches[1].line, line(&[(10.0, 0.0), (20.0, 0.0)]));
        assert_relative_eq!(net.reaches[0].azimuth, 90.0);
        assert_relative_eq!(net.reaches[2].azimuth, 180.0);
    }

    #[test]
    fn test_zero_length_reach_dropped() {
        let ring = line(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 0.0)]);
        let net = split_reaches(&[ring, line(&[(1.0, 1.0), (1.0, 1.0)])]);
        assert!(net.is_empty());
        assert_eq!(net.dropped, 2);
    }

    #[test]
    fn test_locate_prefers_nearest_then_lowest_link() {
        let main = line(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let trib = line(&[(10.0, 10.0), (10.0, 0.0)]);
        let net = split_reaches(&[main, trib]);

        assert_eq!(net.locate(coord! { x: 15.0, y: 0.0 }, 1e-6).unwrap().link_no, 2);
        // the junction lies on all three reaches
        assert_eq!(net.locate(coord! { x: 10.0, y: 0.0 }, 1e-6).unwrap().link_no, 1);
        assert!(net.locate(coord! { x: 15.0, y: 5.0 }, 1e-6).is_none());
    }

    #[test]
    fn test_network_parts() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(Geometry::MultiLineString(MultiLineString::new(vec![
            line(&[(0.0, 0.0), (1.0, 0.0)]),
            line(&[(2.0, 0.0), (3.0, 0.0)]),
        ]))));
        fc.push(Feature::default());
        assert_eq!(network_parts(&fc).unwrap().len(), 2);

        fc.push(Feature::new(Geometry::Polygon(Polygon::new(
            line(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            vec![],
        ))));
        assert!(matches!(network_parts(&fc), Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_restrict_to_band() {
        // 10 x 10 grid of 10 m cells: one band cell at row 5, col 5
        let mut acc = Raster::filled(10, 10, 1.0);
        acc.set_transform(GeoTransform::new(0.0, 100.0, 10.0, -10.0));
        acc.set(5, 5, 500.0).unwrap(); // 500 cells x 100 m2 = 5 ha

        let params = SiteParams::default();
        let near = line(&[(55.0, 30.0), (55.0, 60.0)]); // passes the centre (55, 45)
        let far = line(&[(5.0, 5.0), (5.0, 95.0)]);
        let kept = restrict_to_band(vec![near.clone(), far.clone()], &acc, &params, &[]);
        assert_eq!(kept, vec![near.clone()]);

        // the band cell lies outside the catchment
        let west = MultiPolygon::new(vec![Polygon::new(
            line(&[(0.0, 0.0), (40.0, 0.0), (40.0, 100.0), (0.0, 100.0), (0.0, 0.0)]),
            vec![],
        )]);
        let kept = restrict_to_band(vec![near, far], &acc, &params, &[ClipArea::new(&west)]);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_split_at_tee_junction() {
        // the tributary ends on the main segment between its vertices
        let main = line(&[(0.0, 0.0), (20.0, 0.0)]);
        let trib = line(&[(10.0, 10.0), (10.0, 0.0)]);
        let net = split_reaches(&[main, trib.clone()]);

        assert_eq!(net.len(), 3);
        assert_eq!(net.reaches[0].line, line(&[(0.0, 0.0), (10.0, 0.0)]));
        assert_eq!(net.reaches[1].line, line(&[(10.0, 0.0), (20.0, 0.0)]));
        assert_eq!(net.reaches[2].line, trib);
    }

    #[test]
    fn test_disjoint_parts_stay_whole() {
        // a line ending near but off the main segment is no junction
        let main = line(&[(0.0, 0.0), (20.0, 0.0)]);
        let trib = line(&[(10.0, 10.0), (10.0, 0.5)]);
        assert_eq!(split_reaches(&[main, trib]).len(), 2);
    }
}
