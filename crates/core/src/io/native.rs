//! GeoTIFF reading/writing with the `tiff` crate
//!
//! Georeferencing is carried by ModelPixelScale + ModelTiepoint, the CRS by
//! the EPSG code in the GeoKey directory, and nodata by the GDAL_NODATA
//! ASCII tag. Output is always 32-bit float.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Value written for nodata cells; NaN when unset
    pub nodata: Option<f32>,
}

/// Read a single-band GeoTIFF into a raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

fn convert<S, T>(buf: Vec<S>, lossy: &mut bool) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| {
            num_traits::cast(v).unwrap_or_else(|| {
                *lossy = true;
                T::default_nodata()
            })
        })
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let mut lossy = false;
    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => convert(buf, &mut lossy),
        DecodingResult::F64(buf) => convert(buf, &mut lossy),
        DecodingResult::U8(buf) => convert(buf, &mut lossy),
        DecodingResult::U16(buf) => convert(buf, &mut lossy),
        DecodingResult::U32(buf) => convert(buf, &mut lossy),
        DecodingResult::I8(buf) => convert(buf, &mut lossy),
        DecodingResult::I16(buf) => convert(buf, &mut lossy),
        DecodingResult::I32(buf) => convert(buf, &mut lossy),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));

    let declared = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim().trim_end_matches('\0').parse::<f64>().ok())
        .and_then(T::from_f64);
    match declared {
        Some(nd) => raster.set_nodata(Some(nd)),
        None if lossy || T::is_float() => raster.set_nodata(Some(T::default_nodata())),
        None => {}
    }

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .ok()?;

    // header [version, revision, minor, count] then [id, location, count, value]
    keys.get(4..)?
        .chunks_exact(4)
        .find(|entry| {
            (entry[0] == PROJECTED_CS_TYPE || entry[0] == GEOGRAPHIC_TYPE)
                && entry[1] == 0
                && entry[3] != 0
                && entry[3] != 32767
        })
        .map(|entry| CRS::from_epsg(<u32 as From<u16>>::from(entry[3])))
}

/// Write a raster to a 32-bit float GeoTIFF
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, options.unwrap_or_default())?;
    writer.flush()?;
    Ok(())
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    if !raster.transform().is_north_up() {
        return Err(Error::Other(
            "rotated grids cannot be written with pixel scale and tiepoint tags".into(),
        ));
    }
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let nodata = options.nodata.unwrap_or(f32::NAN);

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                nodata
            } else {
                num_traits::cast(v).unwrap_or(nodata)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];

    // GTModelType projected, RasterPixelIsArea, optional EPSG
    let mut geokeys: Vec<u16> = vec![1, 1, 0, 2, GT_MODEL_TYPE, 0, 1, 1, GT_RASTER_TYPE, 0, 1, 1];
    if let Some(code) = raster.crs().and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok()) {
        geokeys[3] = 3;
        geokeys.extend_from_slice(&[PROJECTED_CS_TYPE, 0, 1, code]);
    }

    let nodata_text = if nodata.is_nan() {
        "nan".to_string()
    } else {
        nodata.to_string()
    };

    let tag_err = |e: tiff::TiffError| Error::Other(format!("Cannot write GeoTIFF tag: {}", e));
    let enc = image.encoder();
    enc.write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(tag_err)?;
    enc.write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(tag_err)?;
    enc.write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(tag_err)?;
    enc.write_tag(Tag::GdalNodata, nodata_text.as_str())
        .map_err(tag_err)?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_geotiff_roundtrip_keeps_georeference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");

        let mut dem: Raster<f64> = Raster::new(3, 4);
        dem.set_transform(GeoTransform::new(1000.0, 5000.0, 2.0, -2.0));
        dem.set_crs(Some(CRS::from_epsg(2193)));
        dem.set_nodata(Some(-9999.0));
        dem.set(1, 2, 12.5).unwrap();
        dem.set(2, 3, -9999.0).unwrap();

        write_geotiff(&dem, &path, None).unwrap();
        let back: Raster<f64> = read_geotiff(&path).unwrap();

        assert_eq!(back.shape(), (3, 4));
        assert_relative_eq!(back.transform().origin_x, 1000.0);
        assert_relative_eq!(back.transform().pixel_height, -2.0);
        assert_eq!(back.crs().and_then(CRS::epsg), Some(2193));
        assert_relative_eq!(back.get(1, 2).unwrap(), 12.5);
        assert!(back.is_nodata_at(2, 3).unwrap());
    }

    #[test]
    fn test_integer_read_of_nan_cells_is_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fdir.tif");

        let mut fdir: Raster<f64> = Raster::filled(2, 2, 7.0);
        fdir.set(0, 0, f64::NAN).unwrap();
        write_geotiff(&fdir, &path, None).unwrap();

        let back: Raster<i32> = read_geotiff(&path).unwrap();
        assert_eq!(back.get(1, 1).unwrap(), 7);
        assert!(back.is_nodata_at(0, 0).unwrap());
    }

    #[test]
    fn test_rotated_grid_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut dem: Raster<f64> = Raster::new(2, 2);
        let mut gt = GeoTransform::new(0.0, 2.0, 1.0, -1.0);
        gt.row_rotation = 0.5;
        dem.set_transform(gt);
        assert!(write_geotiff(&dem, dir.path().join("rot.tif"), None).is_err());
    }

    #[test]
    fn test_georeference_tags_are_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.tif");
        let mut grid: Raster<f64> = Raster::new(3, 4);
        grid.set_transform(GeoTransform::new(1000.0, 2000.0, 10.0, -10.0));
        write_geotiff(&grid, &path, None).unwrap();

        let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).unwrap();
        assert_eq!(&scale[..2], &[10.0, 10.0]);
        let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).unwrap();
        assert_eq!(&tiepoint[3..5], &[1000.0, 2000.0]);

        let back: Raster<f64> = read_geotiff(&path).unwrap();
        assert_relative_eq!(back.cell_size(), 10.0);
        assert_relative_eq!(back.cell_area(), 100.0);
        assert_relative_eq!(back.transform().origin_y, 2000.0);
    }
}
