//! Line clipping to polygon areas
//!
//! Each segment is cut where it meets a ring edge. Sub-segments whose
//! midpoint lies inside or on the area are kept and rejoined in their
//! original direction, so bearings of the clipped lines are preserved.

use super::spatial::{BoundingBox, EnvelopeIndex};
use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Intersects, Line, LineString, MultiPolygon, Point};

/// Parameters closer than this along a segment are the same cut
const CUT_EPSILON: f64 = 1e-12;

fn segment_box(a: Coord<f64>, b: Coord<f64>) -> BoundingBox {
    BoundingBox::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
}

/// Polygon area with its ring edges indexed for clipping
#[derive(Debug, Clone)]
pub struct ClipArea<'a> {
    area: &'a MultiPolygon<f64>,
    edges: Vec<Line<f64>>,
    index: EnvelopeIndex,
}

impl<'a> ClipArea<'a> {
    pub fn new(area: &'a MultiPolygon<f64>) -> Self {
        let edges: Vec<Line<f64>> = area
            .0
            .iter()
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
            .flat_map(|ring| ring.lines())
            .collect();
        let index = EnvelopeIndex::new(
            edges
                .iter()
                .enumerate()
                .map(|(i, e)| (i, segment_box(e.start, e.end))),
        );
        Self { area, edges, index }
    }

    /// `c` lies inside the area or on its boundary
    pub fn contains(&self, c: Coord<f64>) -> bool {
        self.area.intersects(&Point::from(c))
    }

    /// Cut points along `a -> b` sorted by their parameter, ends included
    fn cuts(&self, a: Coord<f64>, b: Coord<f64>) -> Vec<(f64, Coord<f64>)> {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len2 = dx * dx + dy * dy;
        let cut = |c: Coord<f64>| {
            let t = ((c.x - a.x) * dx + (c.y - a.y) * dy) / len2;
            (t.clamp(0.0, 1.0), c)
        };

        let segment = Line::new(a, b);
        let mut cuts = vec![(0.0, a), (1.0, b)];
        for i in self.index.query(&segment_box(a, b)) {
            match line_intersection(segment, self.edges[i]) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    cuts.push(cut(intersection))
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    cuts.push(cut(intersection.start));
                    cuts.push(cut(intersection.end));
                }
                None => {}
            }
        }
        cuts.sort_by(|x, y| x.0.total_cmp(&y.0));
        // the segment ends win over an edge hit at the same parameter
        cuts.dedup_by(|next, prev| (next.0 - prev.0).abs() < CUT_EPSILON);
        if let Some(last) = cuts.last_mut() {
            *last = (1.0, b);
        }
        cuts
    }
}

fn flush(current: &mut Vec<Coord<f64>>, out: &mut Vec<LineString<f64>>) {
    if current.len() >= 2 {
        out.push(LineString::from(std::mem::take(current)));
    } else {
        current.clear();
    }
}

/// Parts of `lines` inside `area`. A line that leaves and re-enters the
/// area yields one piece per visit.
pub fn clip_lines(lines: &[LineString<f64>], area: &ClipArea) -> Vec<LineString<f64>> {
    let mut out = Vec::new();
    for line in lines {
        let mut current: Vec<Coord<f64>> = Vec::new();
        for seg in line.lines() {
            if seg.start == seg.end {
                continue;
            }
            for w in area.cuts(seg.start, seg.end).windows(2) {
                let ((_, p), (_, q)) = (w[0], w[1]);
                let mid = Coord {
                    x: 0.5 * (p.x + q.x),
                    y: 0.5 * (p.y + q.y),
                };
                if !area.contains(mid) {
                    flush(&mut current, &mut out);
                    continue;
                }
                if current.last() != Some(&p) {
                    flush(&mut current, &mut out);
                    current.push(p);
                }
                current.push(q);
            }
        }
        flush(&mut current, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Polygon;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )
    }

    #[test]
    fn test_clip_keeps_direction() {
        let area = MultiPolygon::new(vec![rect(10.0, -5.0, 20.0, 5.0)]);
        let clip = ClipArea::new(&area);
        let westward = LineString::from(vec![(30.0, 0.0), (0.0, 0.0)]);
        let out = clip_lines(&[westward], &clip);
        assert_eq!(out, vec![LineString::from(vec![(20.0, 0.0), (10.0, 0.0)])]);
    }

    #[test]
    fn test_clip_reentry_gives_two_pieces() {
        // a hole splits the line into two visits
        let mut outer = rect(0.0, -5.0, 30.0, 5.0);
        outer.interiors_push(rect(10.0, -1.0, 20.0, 1.0).exterior().clone());
        let area = MultiPolygon::new(vec![outer]);
        let clip = ClipArea::new(&area);

        let line = LineString::from(vec![(-5.0, 0.0), (15.0, 0.0), (35.0, 0.0)]);
        let out = clip_lines(&[line], &clip);
        assert_eq!(
            out,
            vec![
                LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
                LineString::from(vec![(20.0, 0.0), (30.0, 0.0)]),
            ]
        );
    }

    #[test]
    fn test_clip_keeps_inner_vertices() {
        let area = MultiPolygon::new(vec![rect(0.0, 0.0, 10.0, 10.0)]);
        let clip = ClipArea::new(&area);
        let line = LineString::from(vec![(2.0, 2.0), (5.0, 5.0), (8.0, 2.0), (12.0, 2.0)]);
        let out = clip_lines(&[line], &clip);
        assert_eq!(
            out,
            vec![LineString::from(vec![(2.0, 2.0), (5.0, 5.0), (8.0, 2.0), (10.0, 2.0)])]
        );
    }

    #[test]
    fn test_clip_outside_is_empty() {
        let area = MultiPolygon::new(vec![rect(0.0, 90.0, 600.0, 110.0)]);
        let clip = ClipArea::new(&area);
        let line = LineString::from(vec![(5.0, 55.0), (595.0, 55.0)]);
        assert!(clip_lines(&[line], &clip).is_empty());
    }
}
