//! Bund geometry and overlap resolution
//!
//! Each site gets two wings cast perpendicular to its reach, each half the
//! bund length. The buffered wings form the site footprint. Footprints of
//! different sites that intersect are linked, and every connected group of
//! linked sites keeps only its member with the largest contributing area
//! (equal areas: lowest `DB_ID`).

use crate::vector::{bounding_box, buffer_segment, BoundingBox, CapStyle, EnvelopeIndex};
use geo::{Coord, Geometry, Intersects, LineString, MultiPolygon};
use std::collections::HashMap;

/// Left and right wing lines, both starting at the site point
#[derive(Debug, Clone, PartialEq)]
pub struct Wings {
    pub left: LineString<f64>,
    pub right: LineString<f64>,
}

fn cast(origin: Coord<f64>, bearing: f64, distance: f64) -> Coord<f64> {
    let theta = bearing.to_radians();
    Coord {
        x: origin.x + distance * theta.sin(),
        y: origin.y + distance * theta.cos(),
    }
}

impl Wings {
    /// Wings at `azimuth + 90` (left) and `azimuth + 270` (right)
    pub fn new(point: Coord<f64>, azimuth: f64, length: f64) -> Self {
        let half = length / 2.0;
        let left = cast(point, (azimuth + 90.0) % 360.0, half);
        let right = cast(point, (azimuth + 270.0) % 360.0, half);
        Self {
            left: LineString::from(vec![point, left]),
            right: LineString::from(vec![point, right]),
        }
    }

    /// Bund crest line: left end, site point, right end
    pub fn site_line(&self) -> LineString<f64> {
        let mut coords: Vec<Coord<f64>> = self.left.0.iter().rev().copied().collect();
        coords.extend(self.right.0.iter().skip(1));
        LineString::from(coords)
    }

    /// Flat-capped buffers of the left and right wing
    pub fn wing_buffers(&self, radius: f64) -> (MultiPolygon<f64>, MultiPolygon<f64>) {
        let buffer = |wing: &LineString<f64>| {
            let polys = wing
                .lines()
                .filter_map(|seg| buffer_segment(seg.start, seg.end, radius, CapStyle::Flat))
                .collect();
            MultiPolygon::new(polys)
        };
        (buffer(&self.left), buffer(&self.right))
    }

    /// Both wing buffers as one footprint
    pub fn footprint(&self, radius: f64) -> MultiPolygon<f64> {
        let (mut left, right) = self.wing_buffers(radius);
        left.0.extend(right.0);
        left
    }
}

/// A site footprint competing for space
#[derive(Debug, Clone)]
pub struct Footprint {
    pub db_id: i64,
    pub contr_area: f64,
    pub shape: MultiPolygon<f64>,
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Indices of the footprints that survive overlap resolution, ascending
pub fn resolve_overlaps(footprints: &[Footprint]) -> Vec<usize> {
    let boxes: Vec<Option<BoundingBox>> = footprints
        .iter()
        .map(|f| bounding_box(&Geometry::MultiPolygon(f.shape.clone())))
        .collect();
    let index = EnvelopeIndex::new(
        boxes
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.map(|b| (i, b))),
    );

    let mut groups = DisjointSet::new(footprints.len());
    for (i, bbox) in boxes.iter().enumerate() {
        let Some(bbox) = bbox else { continue };
        for j in index.query(bbox) {
            if j <= i || footprints[i].db_id == footprints[j].db_id {
                continue;
            }
            if footprints[i].shape.intersects(&footprints[j].shape) {
                groups.union(i, j);
            }
        }
    }

    let mut best: HashMap<usize, usize> = HashMap::new();
    for i in 0..footprints.len() {
        let root = groups.find(i);
        let winner = best.entry(root).or_insert(i);
        let (a, b) = (&footprints[i], &footprints[*winner]);
        let better = a
            .contr_area
            .total_cmp(&b.contr_area)
            .then(b.db_id.cmp(&a.db_id))
            .is_gt();
        if better {
            *winner = i;
        }
    }

    let mut survivors: Vec<usize> = best.into_values().collect();
    survivors.sort_unstable();
    survivors
}
