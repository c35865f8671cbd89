//! Compass bearings in map units

/// Compass bearing from `from` to `to` in degrees `[0, 360)`, 0 = north,
/// clockwise
pub fn azimuth(from: geo::Coord<f64>, to: geo::Coord<f64>) -> f64 {
    let deg = (to.x - from.x).atan2(to.y - from.y).to_degrees();
    if deg < 0.0 {
        deg + 360.0
    } else {
        deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::coord;

    #[test]
    fn test_azimuth_quadrants() {
        let o = coord! { x: 0.0, y: 0.0 };
        assert_relative_eq!(azimuth(o, coord! { x: 0.0, y: 5.0 }), 0.0);
        assert_relative_eq!(azimuth(o, coord! { x: 5.0, y: 0.0 }), 90.0);
        assert_relative_eq!(azimuth(o, coord! { x: 0.0, y: -5.0 }), 180.0);
        assert_relative_eq!(azimuth(o, coord! { x: -5.0, y: 0.0 }), 270.0);
    }
}
