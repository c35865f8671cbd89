//! Label raster to polygons
//!
//! Every maximal 4-connected patch of equal non-zero labels becomes one
//! polygon (holes included); all patches of a label are dissolved into a
//! single `MultiPolygon`. Boundaries follow cell edges: each labelled cell
//! contributes the sides it shares with a different label, the sides are
//! chained into rings, and where two patches touch only at a corner the
//! chain turns towards its own patch so the patches stay separate.

use bundsim_core::raster::Raster;
use geo::{Area, Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use std::collections::{BTreeMap, HashMap};

type Corner = (usize, usize);

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Corner,
    to: Corner,
    /// Cell on the far side of the edge, (row, col) as signed offsets
    outside: (isize, isize),
}

fn heading(e: &Edge) -> (isize, isize) {
    (
        e.to.0 as isize - e.from.0 as isize,
        e.to.1 as isize - e.from.1 as isize,
    )
}

/// Boundary edges of every label, traversed clockwise as seen on the map
fn boundary_edges(labels: &Raster<i32>) -> BTreeMap<i32, Vec<Edge>> {
    let (rows, cols) = labels.shape();
    let data = labels.data();
    let label_at = |r: isize, c: isize| -> i32 {
        if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
            0
        } else {
            data[(r as usize, c as usize)]
        }
    };

    let mut edges: BTreeMap<i32, Vec<Edge>> = BTreeMap::new();
    for ((r, c), &label) in data.indexed_iter() {
        if label == 0 {
            continue;
        }
        let (ri, ci) = (r as isize, c as isize);
        let sides = [
            ((r, c), (r, c + 1), (ri - 1, ci)),         // top
            ((r, c + 1), (r + 1, c + 1), (ri, ci + 1)), // right
            ((r + 1, c + 1), (r + 1, c), (ri + 1, ci)), // bottom
            ((r + 1, c), (r, c), (ri, ci - 1)),         // left
        ];
        for (from, to, outside) in sides {
            if label_at(outside.0, outside.1) != label {
                edges.entry(label).or_default().push(Edge { from, to, outside });
            }
        }
    }
    edges
}

/// Chain edges into closed rings of corner indices; each ring also
/// reports one cell lying just outside it
fn chain_rings(edges: &[Edge]) -> Vec<(Vec<Corner>, (isize, isize))> {
    let mut outgoing: HashMap<Corner, Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.from).or_default().push(i);
    }
    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let origin = edges[start].from;
        let mut ring = vec![origin];
        let mut current = start;

        loop {
            let e = edges[current];
            let h = heading(&e);
            ring.push(e.to);
            if e.to == origin {
                break;
            }

            // prefer right turn, then straight, then left
            let right = (h.1, -h.0);
            let left = (-h.1, h.0);
            let Some(next) = outgoing.get(&e.to).and_then(|cands| {
                [right, h, left].iter().find_map(|want| {
                    cands
                        .iter()
                        .copied()
                        .find(|&i| !used[i] && heading(&edges[i]) == *want)
                })
            }) else {
                break;
            };
            used[next] = true;
            current = next;
        }

        rings.push((simplify_collinear(ring), edges[start].outside));
    }
    rings
}

fn simplify_collinear(ring: Vec<Corner>) -> Vec<Corner> {
    if ring.len() < 4 {
        return ring;
    }
    let n = ring.len() - 1; // closed
    let dir = |a: Corner, b: Corner| {
        (
            (b.0 as isize - a.0 as isize).signum(),
            (b.1 as isize - a.1 as isize).signum(),
        )
    };
    let mut out: Vec<Corner> = (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            dir(prev, ring[i]) != dir(ring[i], next)
        })
        .map(|i| ring[i])
        .collect();
    if let Some(&first) = out.first() {
        out.push(first);
    }
    out
}

/// Polygonise a label raster; label 0 is background
pub fn polygonize(labels: &Raster<i32>) -> BTreeMap<i32, MultiPolygon<f64>> {
    let transform = *labels.transform();
    let to_ring = |corners: &[Corner]| -> LineString<f64> {
        corners
            .iter()
            .map(|&(r, c)| {
                let (x, y) = transform.pixel_to_geo_corner(c, r);
                Coord { x, y }
            })
            .collect()
    };

    let mut result = BTreeMap::new();
    for (label, edges) in boundary_edges(labels) {
        let mut exteriors: Vec<(Polygon<f64>, f64)> = Vec::new();
        let mut holes: Vec<(LineString<f64>, Point<f64>)> = Vec::new();

        for (corners, outside) in chain_rings(&edges) {
            let ring = to_ring(&corners);
            let candidate = Polygon::new(ring.clone(), vec![]);
            let signed = candidate.signed_area();
            // clockwise on the map (negative signed area) bounds a patch
            if signed < 0.0 {
                exteriors.push((candidate, signed.abs()));
            } else if outside.0 >= 0 && outside.1 >= 0 {
                let (x, y) = transform.pixel_to_geo(outside.1 as usize, outside.0 as usize);
                holes.push((ring, Point::new(x, y)));
            }
        }

        let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); exteriors.len()];
        for (ring, inside) in holes {
            let owner = exteriors
                .iter()
                .enumerate()
                .filter(|(_, (poly, _))| poly.contains(&inside))
                .min_by(|(_, (_, a)), (_, (_, b))| a.total_cmp(b))
                .map(|(i, _)| i);
            if let Some(i) = owner {
                interiors[i].push(ring);
            }
        }

        let polygons: Vec<Polygon<f64>> = exteriors
            .into_iter()
            .zip(interiors)
            .map(|((poly, _), holes)| {
                let (exterior, _) = poly.into_inner();
                Polygon::new(exterior, holes)
            })
            .collect();
        result.insert(label, MultiPolygon::new(polygons));
    }
    result
}

/// Number of cells carrying each non-zero label
pub fn label_cell_counts(labels: &Raster<i32>) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for &label in labels.data().iter() {
        if label != 0 {
            *counts.entry(label).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bundsim_core::GeoTransform;

    fn labels(rows: usize, cols: usize, values: &[i32]) -> Raster<i32> {
        let mut r = Raster::from_vec(values.to_vec(), rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64 * 2.0, 2.0, -2.0));
        r
    }

    #[test]
    fn test_single_block() {
        #[rustfmt::skip]
        let r = labels(3, 3, &[
            1, 1, 0,
            1, 1, 0,
            0, 0, 0,
        ]);
        let polys = polygonize(&r);
        let mp = &polys[&1];
        assert_eq!(mp.0.len(), 1);
        // 4 cells of 2 x 2 map units
        assert_relative_eq!(mp.unsigned_area(), 16.0);
        // a square needs 4 corners plus the closing one
        assert_eq!(mp.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn test_ring_with_hole() {
        #[rustfmt::skip]
        let r = labels(3, 3, &[
            5, 5, 5,
            5, 0, 5,
            5, 5, 5,
        ]);
        let polys = polygonize(&r);
        let mp = &polys[&5];
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert_relative_eq!(mp.unsigned_area(), 8.0 * 4.0);
    }

    #[test]
    fn test_diagonal_patches_stay_separate() {
        #[rustfmt::skip]
        let r = labels(2, 2, &[
            3, 0,
            0, 3,
        ]);
        let polys = polygonize(&r);
        assert_eq!(polys[&3].0.len(), 2);
        assert_relative_eq!(polys[&3].unsigned_area(), 8.0);
    }

    #[test]
    fn test_several_labels_and_counts() {
        #[rustfmt::skip]
        let r = labels(2, 3, &[
            1, 2, 2,
            1, 2, 0,
        ]);
        let polys = polygonize(&r);
        assert_eq!(polys.len(), 2);
        assert_relative_eq!(polys[&2].unsigned_area(), 12.0);

        let counts = label_cell_counts(&r);
        assert_eq!(counts[&1], 2);
        assert_eq!(counts[&2], 3);
    }
}
