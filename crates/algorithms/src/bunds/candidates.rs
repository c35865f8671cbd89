//! Candidate stations
//!
//! Stations are placed along every network part at a fixed arc-length
//! spacing, then attributed with contributing area and elevation sampled
//! from the rasters around each station.

use super::params::SiteParams;
use super::reach::ReachNetwork;
use crate::statistics::polygon_statistics;
use crate::vector::{buffer_point, BufferParams};
use bundsim_core::raster::Raster;
use bundsim_core::Feature;
use geo::{Coord, Geometry, LineString, Point};
use tracing::debug;

const EPS: f64 = 1e-9;

/// Stations at arc lengths `0, S, 2S, ...` along `line`.
///
/// The first vertex is always a station. Distance carries across vertices,
/// so spacing is exact along the polyline rather than per segment.
pub fn station_points(line: &LineString<f64>, spacing: f64) -> Vec<Coord<f64>> {
    let Some(&first) = line.0.first() else {
        return Vec::new();
    };
    let mut points = vec![first];
    if !(spacing > 0.0) {
        return points;
    }

    let mut since_last = 0.0;
    for seg in line.lines() {
        let (dx, dy) = (seg.end.x - seg.start.x, seg.end.y - seg.start.y);
        let len = dx.hypot(dy);
        if len <= EPS {
            continue;
        }
        let mut along = spacing - since_last;
        while along <= len + EPS {
            points.push(if along >= len {
                seg.end
            } else {
                Coord {
                    x: seg.start.x + along * dx / len,
                    y: seg.start.y + along * dy / len,
                }
            });
            along += spacing;
        }
        since_last = len - (along - spacing);
    }
    points
}

/// Mean of the valid cells whose centres fall within `radius` of `point`,
/// or the containing cell when no centre does
pub fn sample_mean(raster: &Raster<f64>, point: Coord<f64>, radius: f64) -> Option<f64> {
    let disc = buffer_point(
        &Point::from(point),
        &BufferParams {
            distance: radius,
            segments: 16,
        },
    );
    if let Some(stats) = polygon_statistics(raster, &disc) {
        return Some(stats.mean);
    }
    let (row, col) = raster.cell_at(point.x, point.y)?;
    raster.value_at(row, col)
}

/// A station that may become a bund site
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub db_id: i64,
    pub point: Coord<f64>,
    /// `LINKNO` of the reach the station lies on
    pub reach: i64,
    pub azimuth: f64,
    /// Contributing area (ha)
    pub contr_area: f64,
    pub elevation: f64,
}

impl Candidate {
    pub fn to_feature(&self) -> Feature {
        Feature::new(Geometry::Point(Point::from(self.point)))
            .with(super::DB_ID, self.db_id)
            .with(super::REACH, self.reach)
            .with(super::CONTR_AREA, self.contr_area)
            .with(super::ELEVATION, self.elevation)
    }
}

/// Station counts of the candidate stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateReport {
    pub stations: usize,
    /// No reach at the station
    pub unmatched: usize,
    /// Missing elevation or accumulation sample
    pub unsampled: usize,
    /// Contributing area outside the band
    pub outside_band: usize,
}

/// Stations along `parts`, attributed and restricted to the band.
///
/// `DB_ID` numbers every station from 1 in generation order, so ids of
/// discarded stations are never reused.
pub fn generate_candidates(
    parts: &[LineString<f64>],
    network: &ReachNetwork,
    dem: &Raster<f64>,
    flow_acc: &Raster<f64>,
    params: &SiteParams,
) -> (Vec<Candidate>, CandidateReport) {
    let mut report = CandidateReport::default();
    let mut candidates = Vec::new();
    let cell_area = flow_acc.cell_area();
    let tolerance = (dem.cell_size() * 1e-6).max(1e-6);

    for part in parts {
        for point in station_points(part, params.spacing) {
            report.stations += 1;
            let db_id = report.stations as i64;

            let Some(reach) = network.locate(point, tolerance) else {
                report.unmatched += 1;
                continue;
            };
            let (Some(acc), Some(elevation)) = (
                sample_mean(flow_acc, point, params.sample_radius),
                sample_mean(dem, point, params.sample_radius),
            ) else {
                report.unsampled += 1;
                continue;
            };

            let contr_area = params.acc_units.to_hectares(acc, cell_area);
            if !(contr_area > params.min_ca_ha && contr_area < params.max_ca_ha) {
                report.outside_band += 1;
                continue;
            }

            candidates.push(Candidate {
                db_id,
                point,
                reach: reach.link_no,
                azimuth: reach.azimuth,
                contr_area,
                elevation,
            });
        }
    }

    debug!(
        stations = report.stations,
        unmatched = report.unmatched,
        unsampled = report.unsampled,
        outside_band = report.outside_band,
        "candidate stations"
    );
    (candidates, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bunds::reach::split_reaches;
    use approx::assert_relative_eq;
    use bundsim_core::GeoTransform;

    fn line(coords: &[(f64, f64)]) -> LineString<f64> {
        LineString::from(coords.to_vec())
    }

    fn arc_lengths(line: &LineString<f64>, points: &[Coord<f64>]) -> Vec<f64> {
        // distance along a polyline made of axis-aligned segments
        let mut out = Vec::new();
        for p in points {
            let mut acc = 0.0;
            for seg in line.lines() {
                let (a, b) = (seg.start, seg.end);
                let len = (b.x - a.x).hypot(b.y - a.y);
                let on_seg = ((p.x - a.x).hypot(p.y - a.y) + (b.x - p.x).hypot(b.y - p.y) - len).abs() < 1e-9;
                if on_seg {
                    acc += (p.x - a.x).hypot(p.y - a.y);
                    break;
                }
                acc += len;
            }
            out.push(acc);
        }
        out
    }

    #[test]
    fn test_straight_reach_exact_multiple() {
        let pts = station_points(&line(&[(0.0, 0.0), (180.0, 0.0)]), 60.0);
        assert_eq!(pts.len(), 4);
        assert_relative_eq!(pts[3].x, 180.0);
    }

    #[test]
    fn test_straight_reach_not_multiple() {
        let pts = station_points(&line(&[(0.0, 0.0), (170.0, 0.0)]), 60.0);
        assert_eq!(pts.len(), 3);
        for (p, x) in pts.iter().zip([0.0, 60.0, 120.0]) {
            assert_relative_eq!(p.x, x, epsilon = 1e-9);
            assert_relative_eq!(p.y, 0.0);
        }
    }

    #[test]
    fn test_spacing_carries_across_vertices() {
        let l = line(&[(0.0, 0.0), (25.0, 0.0), (25.0, 5.0), (25.0, 5.0), (60.0, 5.0), (60.0, 100.0)]);
        let pts = station_points(&l, 20.0);
        let s = arc_lengths(&l, &pts);
        assert_relative_eq!(s[0], 0.0);
        for w in s.windows(2) {
            assert_relative_eq!(w[1] - w[0], 20.0, epsilon = 1e-9);
        }
        // total length 25 + 5 + 35 + 95 = 160
        assert_eq!(pts.len(), 9);
    }

    #[test]
    fn test_single_vertex_and_empty() {
        assert_eq!(station_points(&line(&[(3.0, 4.0)]), 10.0).len(), 1);
        assert!(station_points(&LineString::new(vec![]), 10.0).is_empty());
    }

    #[test]
    fn test_sample_mean_falls_back_to_cell() {
        let mut r = Raster::new(4, 4);
        r.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        r.set(1, 1, 7.0).unwrap();
        // radius too small to reach the centre (15, 25)
        assert_relative_eq!(sample_mean(&r, Coord { x: 12.0, y: 22.0 }, 0.5).unwrap(), 7.0);
        assert!(sample_mean(&r, Coord { x: -5.0, y: 5.0 }, 0.5).is_none());
    }

    #[test]
    fn test_generate_candidates_band_and_ids() {
        // 10 m cells; accumulation grows eastward, 100 cells = 1 ha
        let mut dem = Raster::new(3, 30);
        dem.set_transform(GeoTransform::new(0.0, 30.0, 10.0, -10.0));
        let mut acc = dem.like(0.0);
        for row in 0..3 {
            for col in 0..30 {
                dem.set(row, col, 100.0 - col as f64).unwrap();
                acc.set(row, col, col as f64 * 100.0).unwrap();
            }
        }

        let parts = vec![line(&[(5.0, 15.0), (295.0, 15.0)])];
        let net = split_reaches(&parts);
        let params = SiteParams {
            spacing: 50.0,
            max_ca_ha: 22.0,
            ..Default::default()
        };
        let (cands, report) = generate_candidates(&parts, &net, &dem, &acc, &params);

        // stations at x = 5, 55, ..., 255 sit on cols 0, 5, ..., 25 (0 to 25 ha)
        assert_eq!(report.stations, 6);
        let ids: Vec<i64> = cands.iter().map(|c| c.db_id).collect();
        assert_eq!(ids, vec![2, 3, 4, 5]);
        assert_eq!(report.outside_band, 2);
        assert_relative_eq!(cands[0].contr_area, 5.0);
        assert_relative_eq!(cands[0].elevation, 95.0);
        assert!(cands.iter().all(|c| c.reach == 1));
        assert_relative_eq!(cands[0].azimuth, 90.0);
    }
}
