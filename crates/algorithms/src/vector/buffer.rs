//! Buffer operations
//!
//! Points buffer into regular polygons; straight segments buffer into
//! rectangles whose ends are either cut at the segment ends (flat caps) or
//! pushed out by the buffer distance (square caps).

use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// End cap style for line buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapStyle {
    /// Buffer ends exactly at the line ends
    #[default]
    Flat,
    /// Buffer extends past each end by the buffer distance
    Square,
}

/// Parameters for point buffers
#[derive(Debug, Clone)]
pub struct BufferParams {
    pub distance: f64,
    /// Number of segments approximating the circle (at least 4)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 1.0,
            segments: 16,
        }
    }
}

/// Regular polygon approximating a circle around `point`
pub fn buffer_point(point: &Point<f64>, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(4);
    let r = params.distance.abs();
    let (cx, cy) = (point.x(), point.y());

    let mut coords: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            (cx + r * angle.cos(), cy + r * angle.sin())
        })
        .collect();
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}

fn rectangle(
    start: Coord<f64>,
    end: Coord<f64>,
    distance: f64,
    extend_start: bool,
    extend_end: bool,
) -> Option<Polygon<f64>> {
    let (dx, dy) = (end.x - start.x, end.y - start.y);
    let len = dx.hypot(dy);
    if len <= f64::EPSILON || distance <= 0.0 {
        return None;
    }

    let (ux, uy) = (dx / len, dy / len);
    let (nx, ny) = (-uy * distance, ux * distance);

    let s = if extend_start {
        Coord { x: start.x - ux * distance, y: start.y - uy * distance }
    } else {
        start
    };
    let e = if extend_end {
        Coord { x: end.x + ux * distance, y: end.y + uy * distance }
    } else {
        end
    };

    Some(Polygon::new(
        LineString::from(vec![
            (s.x + nx, s.y + ny),
            (e.x + nx, e.y + ny),
            (e.x - nx, e.y - ny),
            (s.x - nx, s.y - ny),
            (s.x + nx, s.y + ny),
        ]),
        vec![],
    ))
}

/// Buffer of a straight segment; `None` for a zero-length segment or a
/// non-positive distance
pub fn buffer_segment(
    start: Coord<f64>,
    end: Coord<f64>,
    distance: f64,
    cap: CapStyle,
) -> Option<Polygon<f64>> {
    let square = cap == CapStyle::Square;
    rectangle(start, end, distance, square, square)
}

/// Buffer of a polyline as one rectangle per segment. Caps apply to the
/// two outer ends only; zero-length segments are skipped.
pub fn buffer_line_string(line: &LineString<f64>, distance: f64, cap: CapStyle) -> MultiPolygon<f64> {
    let square = cap == CapStyle::Square;
    let segments: Vec<_> = line.lines().filter(|l| l.start != l.end).collect();
    let last = segments.len().saturating_sub(1);

    MultiPolygon::new(
        segments
            .iter()
            .enumerate()
            .filter_map(|(i, seg)| rectangle(seg.start, seg.end, distance, square && i == 0, square && i == last))
            .collect(),
    )
}
