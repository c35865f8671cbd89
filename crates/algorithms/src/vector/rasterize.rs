//! Polygon to grid-cell selection
//!
//! A cell belongs to a polygon when its centre lies inside or on the
//! boundary of the polygon, the GDAL rasterize default.

use bundsim_core::raster::{Raster, RasterElement};
use geo::{BoundingRect, Intersects, MultiPolygon, Point, Polygon};

/// `(row, col)` of every cell whose centre falls in `polygon`, row-major
pub fn cells_in_polygon<T: RasterElement>(grid: &Raster<T>, polygon: &Polygon<f64>) -> Vec<(usize, usize)> {
    let Some(rect) = polygon.bounding_rect() else {
        return Vec::new();
    };
    let Some((row0, col0, row1, col1)) =
        grid.window(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    else {
        return Vec::new();
    };

    let mut cells = Vec::new();
    for row in row0..=row1 {
        for col in col0..=col1 {
            let (x, y) = grid.pixel_to_geo(col, row);
            if polygon.intersects(&Point::new(x, y)) {
                cells.push((row, col));
            }
        }
    }
    cells
}

/// Cells of every part of a multipolygon, deduplicated and row-major
pub fn cells_in_multipolygon<T: RasterElement>(
    grid: &Raster<T>,
    polygons: &MultiPolygon<f64>,
) -> Vec<(usize, usize)> {
    let mut cells: Vec<(usize, usize)> = polygons
        .0
        .iter()
        .flat_map(|p| cells_in_polygon(grid, p))
        .collect();
    cells.sort_unstable();
    cells.dedup();
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundsim_core::GeoTransform;
    use geo::LineString;

    fn grid() -> Raster<f64> {
        let mut r = Raster::new(10, 10);
        r.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        r
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )
    }

    #[test]
    fn test_cell_centres_inside() {
        // covers centres x in {2.5, 3.5}, y in {7.5}
        let cells = cells_in_polygon(&grid(), &rect(2.1, 7.1, 3.9, 7.9));
        assert_eq!(cells, vec![(2, 2), (2, 3)]);
    }

    #[test]
    fn test_polygon_between_centres_selects_nothing() {
        let cells = cells_in_polygon(&grid(), &rect(2.6, 7.6, 3.4, 7.9));
        assert!(cells.is_empty());
    }

    #[test]
    fn test_off_grid() {
        assert!(cells_in_polygon(&grid(), &rect(20.0, 20.0, 30.0, 30.0)).is_empty());
    }
}
