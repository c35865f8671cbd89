//! Cell value trait shared by every raster in the pipeline

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a raster cell.
///
/// Elevation, accumulation and volume grids use `f64`, flow direction
/// uses `u8`, and site / watershed labels use `i32`. Any numeric type read
/// from a GeoTIFF can be converted through [`NumCast`].
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// No-data value used when a decoded sample cannot be represented
    fn default_nodata() -> Self;

    /// Whether `self` equals the declared no-data value (NaN always counts)
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this is a floating point type
    fn is_float() -> bool;

    /// Lossy conversion to `f64`
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Lossy conversion from `f64`, `None` when out of range or NaN for
    /// integer types
    fn from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
    }
}

macro_rules! impl_int_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }

            fn is_float() -> bool {
                false
            }
        }
    )*};
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0) * 100.0,
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    )*};
}

impl_int_element!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_float_element!(f32, f64);
