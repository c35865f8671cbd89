//! Bounding boxes and an R-tree envelope index

use geo::{BoundingRect, Geometry};
use rstar::{RTree, RTreeObject, AABB};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Grow the box by `d` on every side
    pub fn expanded(&self, d: f64) -> Self {
        Self::new(self.min_x - d, self.min_y - d, self.max_x + d, self.max_y + d)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    fn to_aabb(self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Bounding box of any geometry, `None` for empty geometries
pub fn bounding_box(geom: &Geometry<f64>) -> Option<BoundingBox> {
    geom.bounding_rect().map(|rect| BoundingBox {
        min_x: rect.min().x,
        min_y: rect.min().y,
        max_x: rect.max().x,
        max_y: rect.max().y,
    })
}

#[derive(Debug, Clone)]
struct IndexedEnvelope {
    key: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over keyed bounding boxes.
///
/// Queries return candidate keys only; callers run the exact geometric
/// predicate on the candidates.
#[derive(Debug, Clone)]
pub struct EnvelopeIndex {
    tree: RTree<IndexedEnvelope>,
}

impl EnvelopeIndex {
    /// Bulk-load an index from `(key, box)` pairs
    pub fn new(entries: impl IntoIterator<Item = (usize, BoundingBox)>) -> Self {
        let items = entries
            .into_iter()
            .map(|(key, bbox)| IndexedEnvelope {
                key,
                envelope: bbox.to_aabb(),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Index the bounding boxes of a slice of geometries, keyed by position
    pub fn from_geometries<'a, G>(geometries: impl IntoIterator<Item = &'a G>) -> Self
    where
        G: BoundingRect<f64> + 'a,
        G::Output: Into<Option<geo::Rect<f64>>>,
    {
        Self::new(geometries.into_iter().enumerate().filter_map(|(key, g)| {
            let rect: Option<geo::Rect<f64>> = g.bounding_rect().into();
            rect.map(|r| (key, BoundingBox::new(r.min().x, r.min().y, r.max().x, r.max().y)))
        }))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Keys whose boxes intersect `bbox`, in ascending order
    pub fn query(&self, bbox: &BoundingBox) -> Vec<usize> {
        let mut keys: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&bbox.to_aabb())
            .map(|entry| entry.key)
            .collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};

    #[test]
    fn test_bbox_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        let b = BoundingBox::new(2.0, 2.0, 3.0, 3.0);
        let c = BoundingBox::new(2.1, 0.0, 3.0, 1.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.expanded(0.2).intersects(&c));
    }

    #[test]
    fn test_index_query() {
        let index = EnvelopeIndex::new(vec![
            (0, BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            (1, BoundingBox::new(5.0, 5.0, 6.0, 6.0)),
            (2, BoundingBox::new(0.5, 0.5, 5.5, 0.6)),
        ]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.query(&BoundingBox::new(0.9, 0.0, 1.0, 0.55)), vec![0, 2]);
        assert!(index.query(&BoundingBox::new(10.0, 10.0, 11.0, 11.0)).is_empty());
    }

    #[test]
    fn test_from_geometries() {
        let squares: Vec<Polygon<f64>> = (0..3)
            .map(|i| {
                let x = i as f64 * 10.0;
                Polygon::new(
                    LineString::from(vec![(x, 0.0), (x + 1.0, 0.0), (x + 1.0, 1.0), (x, 0.0)]),
                    vec![],
                )
            })
            .collect();
        let index = EnvelopeIndex::from_geometries(&squares);
        assert_eq!(index.query(&BoundingBox::new(9.5, 0.0, 10.5, 1.0)), vec![1]);
    }
}
