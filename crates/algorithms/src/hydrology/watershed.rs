//! Labelled upstream watershed delineation
//!
//! Every seed cell carries a label; a breadth-first trace climbs the D8
//! flow direction raster from all seeds at once. A cell keeps the label of
//! the first seed met when following its flow path downstream, so a basin
//! draining through another site's pour cells is subtracted from the
//! downstream site (nested basins, as `r.stream.basins` produces).

use bundsim_core::raster::{Raster, D8_OFFSETS};
use bundsim_core::{Algorithm, Error, Result};
use ndarray::Array2;
use std::collections::VecDeque;

/// Direction code of the cell opposite to `dir` (E <-> W, NE <-> SW, ...)
fn opposite_dir(dir: u8) -> u8 {
    if dir == 0 {
        return 0;
    }
    ((dir - 1 + 4) % 8) + 1
}

/// A labelled trace origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PourCell {
    pub row: usize,
    pub col: usize,
    /// Positive label written to every traced cell
    pub label: i32,
}

/// Parameters for watershed delineation
#[derive(Debug, Clone, Default)]
pub struct WatershedParams {
    /// Seeds in priority order; a cell listed twice keeps the first label
    pub seeds: Vec<PourCell>,
}

/// Watershed delineation algorithm
#[derive(Debug, Clone, Default)]
pub struct Watershed;

impl Algorithm for Watershed {
    type Input = Raster<u8>;
    type Output = Raster<i32>;
    type Params = WatershedParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Watershed"
    }

    fn description(&self) -> &'static str {
        "Delineate labelled upstream basins from D8 flow direction"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        watershed(&input, &params)
    }
}

/// Label the upstream area of every seed.
///
/// Returns `Raster<i32>` with the seed labels and 0 for cells that drain
/// to no seed. Seeds off the grid are ignored; non-positive labels are
/// rejected.
pub fn watershed(flow_dir: &Raster<u8>, params: &WatershedParams) -> Result<Raster<i32>> {
    let (rows, cols) = flow_dir.shape();
    let mut basins = Array2::<i32>::zeros((rows, cols));
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    for seed in &params.seeds {
        if seed.label <= 0 {
            return Err(Error::invalid_parameter(
                "label",
                seed.label,
                "watershed labels must be positive",
            ));
        }
        if seed.row >= rows || seed.col >= cols || basins[(seed.row, seed.col)] != 0 {
            continue;
        }
        basins[(seed.row, seed.col)] = seed.label;
        queue.push_back((seed.row, seed.col));
    }

    while let Some((row, col)) = queue.pop_front() {
        let label = basins[(row, col)];

        for (idx, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
            let nr = row as isize + dr;
            let nc = col as isize + dc;
            if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if basins[(nr, nc)] != 0 {
                continue;
            }

            // the neighbour drains here when it points back at (row, col)
            let neighbor_dir = unsafe { flow_dir.get_unchecked(nr, nc) };
            if neighbor_dir != 0 && neighbor_dir == opposite_dir((idx + 1) as u8) {
                basins[(nr, nc)] = label;
                queue.push_back((nr, nc));
            }
        }
    }

    let mut output = flow_dir.with_same_meta::<i32>(rows, cols);
    output.set_nodata(Some(0));
    *output.data_mut() = basins;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction::flow_direction;
    use bundsim_core::GeoTransform;

    fn south_sloping() -> Raster<u8> {
        let mut dem = Raster::new(6, 3);
        dem.set_transform(GeoTransform::new(0.0, 6.0, 1.0, -1.0));
        for row in 0..6 {
            for col in 0..3 {
                // valley along the middle column
                let side = if col == 1 { 0.0 } else { 5.0 };
                dem.set(row, col, (6 - row) as f64 * 10.0 + side).unwrap();
            }
        }
        flow_direction(&dem).unwrap()
    }

    #[test]
    fn test_single_seed_claims_upstream() {
        let fdir = south_sloping();
        let params = WatershedParams {
            seeds: vec![PourCell { row: 5, col: 1, label: 9 }],
        };
        let basins = watershed(&fdir, &params).unwrap();
        assert_eq!(basins.get(5, 1).unwrap(), 9);
        assert_eq!(basins.get(0, 1).unwrap(), 9);
    }

    #[test]
    fn test_nested_seed_is_subtracted() {
        let fdir = south_sloping();
        let params = WatershedParams {
            seeds: vec![
                PourCell { row: 5, col: 1, label: 1 },
                PourCell { row: 2, col: 1, label: 2 },
            ],
        };
        let basins = watershed(&fdir, &params).unwrap();
        assert_eq!(basins.get(0, 1).unwrap(), 2);
        assert_eq!(basins.get(2, 1).unwrap(), 2);
        assert_eq!(basins.get(4, 1).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_seed_keeps_first_label() {
        let fdir = south_sloping();
        let params = WatershedParams {
            seeds: vec![
                PourCell { row: 3, col: 1, label: 4 },
                PourCell { row: 3, col: 1, label: 7 },
            ],
        };
        let basins = watershed(&fdir, &params).unwrap();
        assert_eq!(basins.get(3, 1).unwrap(), 4);
        assert_eq!(basins.get(5, 1).unwrap(), 0);
    }

    #[test]
    fn test_rejects_zero_label() {
        let fdir = south_sloping();
        let params = WatershedParams {
            seeds: vec![PourCell { row: 0, col: 0, label: 0 }],
        };
        assert!(watershed(&fdir, &params).is_err());
    }

    #[test]
    fn test_opposite_direction() {
        assert_eq!(opposite_dir(1), 5);
        assert_eq!(opposite_dir(3), 7);
        assert_eq!(opposite_dir(2), 6);
        assert_eq!(opposite_dir(8), 4);
    }
}
