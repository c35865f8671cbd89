//! Elevation-drop filter
//!
//! Within a reach, candidates are visited in ascending contributing area
//! (ties by `DB_ID`), a proxy for upstream-to-downstream order. A candidate
//! survives only when its crest (`Elevation + height`) stays below the
//! elevation of the last survivor, so consecutive bunds on a reach are at
//! least one bund height apart.

use super::candidates::Candidate;
use std::collections::BTreeMap;

pub fn elevation_drop(candidates: Vec<Candidate>, height: f64) -> Vec<Candidate> {
    let mut by_reach: BTreeMap<i64, Vec<Candidate>> = BTreeMap::new();
    for c in candidates {
        by_reach.entry(c.reach).or_default().push(c);
    }

    let mut kept: Vec<Candidate> = by_reach
        .into_values()
        .flat_map(|mut group| {
            group.sort_by(|a, b| a.contr_area.total_cmp(&b.contr_area).then(a.db_id.cmp(&b.db_id)));
            group
                .into_iter()
                .scan(f64::INFINITY, |up_elev, c| {
                    if c.elevation + height < *up_elev {
                        *up_elev = c.elevation;
                        Some(Some(c))
                    } else {
                        Some(None)
                    }
                })
                .flatten()
                .collect::<Vec<_>>()
        })
        .collect();

    kept.sort_by_key(|c| c.db_id);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    fn cand(db_id: i64, reach: i64, contr_area: f64, elevation: f64) -> Candidate {
        Candidate {
            db_id,
            point: Coord { x: 0.0, y: 0.0 },
            reach,
            azimuth: 0.0,
            contr_area,
            elevation,
        }
    }

    fn ids(c: &[Candidate]) -> Vec<i64> {
        c.iter().map(|c| c.db_id).collect()
    }

    #[test]
    fn test_insufficient_drop_removed() {
        // upstream 11.5 m (smaller area), downstream 10 m: 10 + 3 >= 11.5
        let kept = elevation_drop(vec![cand(1, 1, 5.0, 11.5), cand(2, 1, 8.0, 10.0)], 3.0);
        assert_eq!(ids(&kept), vec![1]);
    }

    #[test]
    fn test_comparison_is_against_last_survivor() {
        let kept = elevation_drop(
            vec![
                cand(1, 1, 3.0, 20.0),
                cand(2, 1, 4.0, 18.0), // 21 >= 20
                cand(3, 1, 5.0, 16.5), // 19.5 < 20
                cand(4, 1, 6.0, 14.0), // 17 >= 16.5
                cand(5, 1, 7.0, 13.0), // 16 < 16.5
            ],
            3.0,
        );
        assert_eq!(ids(&kept), vec![1, 3, 5]);
        for w in kept.windows(2) {
            assert!(w[1].elevation + 3.0 < w[0].elevation);
        }
    }

    #[test]
    fn test_reaches_are_independent() {
        let kept = elevation_drop(vec![cand(1, 1, 3.0, 20.0), cand(2, 2, 4.0, 19.0)], 3.0);
        assert_eq!(ids(&kept), vec![1, 2]);
    }

    #[test]
    fn test_equal_area_ordered_by_id() {
        let kept = elevation_drop(vec![cand(7, 1, 5.0, 10.0), cand(3, 1, 5.0, 30.0)], 3.0);
        assert_eq!(ids(&kept), vec![3, 7]);

        let kept = elevation_drop(vec![cand(3, 1, 5.0, 10.0), cand(7, 1, 5.0, 30.0)], 3.0);
        assert_eq!(ids(&kept), vec![3]);
    }
}
