//! D8 flow accumulation in upstream cell counts
//!
//! Headwater cells have accumulation 0; each cell passes its own count plus
//! one to its receiver.

use bundsim_core::raster::{d8, Raster};
use bundsim_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulation;

impl Algorithm for FlowAccumulation {
    type Input = Raster<u8>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Count upstream cells from D8 flow direction"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_accumulation(&input)
    }
}

fn receiver(flow_dir: &Raster<u8>, row: usize, col: usize) -> Option<(usize, usize)> {
    let (dr, dc) = d8::offset(unsafe { flow_dir.get_unchecked(row, col) })?;
    let nr = row as isize + dr;
    let nc = col as isize + dc;
    if nr < 0 || nc < 0 || nr as usize >= flow_dir.rows() || nc as usize >= flow_dir.cols() {
        return None;
    }
    Some((nr as usize, nc as usize))
}

/// Topological accumulation over a D8 flow direction raster
pub fn flow_accumulation(flow_dir: &Raster<u8>) -> Result<Raster<f64>> {
    let (rows, cols) = flow_dir.shape();

    let mut in_degree = Array2::<u32>::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            if let Some(rc) = receiver(flow_dir, row, col) {
                in_degree[rc] += 1;
            }
        }
    }

    let mut stack: Vec<(usize, usize)> = in_degree
        .indexed_iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(rc, _)| rc)
        .collect();
    let mut accumulation = Array2::<f64>::zeros((rows, cols));

    while let Some((row, col)) = stack.pop() {
        let Some(down) = receiver(flow_dir, row, col) else {
            continue;
        };
        accumulation[down] += accumulation[(row, col)] + 1.0;
        in_degree[down] = in_degree[down].saturating_sub(1);
        if in_degree[down] == 0 {
            stack.push(down);
        }
    }

    let mut output = flow_dir.with_same_meta::<f64>(rows, cols);
    *output.data_mut() = accumulation;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_column_draining_south() {
        // every cell flows south, the last row flows off the grid
        let fdir: Raster<u8> = Raster::filled(4, 3, 7);
        let acc = flow_accumulation(&fdir).unwrap();
        assert_relative_eq!(acc.get(0, 1).unwrap(), 0.0);
        assert_relative_eq!(acc.get(3, 1).unwrap(), 3.0);
    }

    #[test]
    fn test_converging_cells() {
        // two cells flow into the centre of a 1x3 strip
        let mut fdir: Raster<u8> = Raster::new(1, 3);
        fdir.set(0, 0, 1).unwrap();
        fdir.set(0, 2, 5).unwrap();
        let acc = flow_accumulation(&fdir).unwrap();
        assert_relative_eq!(acc.get(0, 1).unwrap(), 2.0);
    }
}
