//! Classic TIFF / GeoTIFF writer
//!
//! Files are laid out as header, strip data, out-of-line tag values and
//! finally the single IFD. Nothing time dependent is written, so encoding the
//! same image twice gives identical bytes.

use std::fs;
use std::path::Path;
use log::debug;
use rayon::prelude::*;
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::io::{ByteOrder, ByteOrderHandler};
use crate::types::{DataType, Dimensions};
use super::geotiff::GeoReference;
use super::ifd::{IFDEntry, IFD};
use super::tags::{self, sample_formats};
use super::TIFF_MAGIC;

/// Default uncompressed strip size in bytes
pub const DEFAULT_STRIP_SIZE: usize = 8192;

/// Size of one IFD entry in a classic TIFF
const ENTRY_SIZE: usize = 12;

/// Borrowed samples of one band, row-major
#[derive(Debug, Clone, Copy)]
pub enum Samples<'a> {
    /// Integer codes
    Int(&'a [i64]),
    /// Floating point values
    Float(&'a [f64]),
}

impl Samples<'_> {
    /// Number of samples
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(v) => v.len(),
            Samples::Float(v) => v.len(),
        }
    }

    /// Returns whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An image ready to be written
#[derive(Debug, Clone)]
pub struct RasterImage<'a> {
    /// Raster dimensions shared by every band
    pub dims: Dimensions,
    /// Pixel type of every band
    pub data_type: DataType,
    /// Bands in output order
    pub bands: Vec<Samples<'a>>,
    /// Georeferencing, if any
    pub georef: Option<&'a GeoReference>,
    /// Value written as `GDAL_NODATA`
    pub nodata: Option<f64>,
}

/// Writer settings
#[derive(Debug, Clone, PartialEq)]
pub struct TiffOptions {
    /// Byte order of the output file
    pub byte_order: ByteOrder,
    /// Strip compression
    pub compression: Compression,
    /// Target uncompressed strip size in bytes
    pub strip_size: usize,
    /// Text of the Software tag
    pub software: Option<String>,
}

impl Default for TiffOptions {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::LittleEndian,
            compression: Compression::None,
            strip_size: DEFAULT_STRIP_SIZE,
            software: Some(format!("ipwkit {}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

/// Encodes [`RasterImage`]s as single-directory GeoTIFFs
#[derive(Debug, Clone, Default)]
pub struct TiffWriter {
    options: TiffOptions,
}

impl TiffWriter {
    /// Creates a writer
    pub fn new(options: TiffOptions) -> Self {
        Self { options }
    }

    /// Returns the writer settings
    pub fn options(&self) -> &TiffOptions {
        &self.options
    }

    /// Encodes and writes `image` to `path`, replacing any existing file
    pub fn write<P: AsRef<Path>>(&self, path: P, image: &RasterImage<'_>) -> Result<()> {
        let bytes = self.encode(image)?;
        fs::write(path.as_ref(), &bytes)?;
        debug!("wrote {} bytes to {}", bytes.len(), path.as_ref().display());
        Ok(())
    }

    /// Encodes `image` into TIFF bytes
    pub fn encode(&self, image: &RasterImage<'_>) -> Result<Vec<u8>> {
        let dims = image.dims;
        if dims.rows == 0 || dims.cols == 0 {
            return Err(Error::InvalidValue("cannot write an empty raster".to_string()));
        }
        if image.bands.is_empty() {
            return Err(Error::InvalidValue("cannot write a raster without bands".to_string()));
        }
        let pixels = dims
            .pixel_count()
            .ok_or_else(|| Error::InvalidValue(format!("{}x{} raster is too large", dims.rows, dims.cols)))?;
        for (i, band) in image.bands.iter().enumerate() {
            if band.len() != pixels {
                return Err(Error::InvalidValue(format!(
                    "band {} has {} samples, expected {}",
                    i,
                    band.len(),
                    pixels
                )));
            }
        }

        let order = self.options.byte_order;
        let handler = order.handler();
        let size = image.data_type.size();
        let row_bytes = dims.cols * size;
        let rows_per_strip = (self.options.strip_size / row_bytes).clamp(1, dims.rows);
        let strip_bytes = rows_per_strip * row_bytes;

        let planes = image
            .bands
            .iter()
            .map(|band| encode_samples(*band, image.data_type, &*handler))
            .collect::<Result<Vec<_>>>()?;

        let strips: Vec<&[u8]> = planes.iter().flat_map(|p| p.chunks(strip_bytes)).collect();
        let compression = self.options.compression;
        let compressed = strips
            .par_iter()
            .map(|strip| compression.compress(strip, row_bytes))
            .collect::<Result<Vec<_>>>()?;

        let mut out = vec![0u8; 8];
        let mut offsets = Vec::with_capacity(compressed.len());
        let mut counts = Vec::with_capacity(compressed.len());
        for strip in &compressed {
            offsets.push(to_u32(out.len())?);
            counts.push(to_u32(strip.len())?);
            out.extend_from_slice(strip);
            align(&mut out);
        }

        let ifd = self.directory(image, rows_per_strip, &offsets, &counts)?;
        let ifd_offset = write_directory(&mut out, &ifd, &*handler)?;

        let mut header = Vec::with_capacity(8);
        header.extend_from_slice(&order.tiff_magic());
        handler.write_u16(&mut header, TIFF_MAGIC);
        handler.write_u32(&mut header, ifd_offset);
        out[..8].copy_from_slice(&header);

        debug!(
            "encoded {}x{} {} raster, {} band(s), {} strip(s), {}",
            dims.rows,
            dims.cols,
            image.data_type.name(),
            image.bands.len(),
            compressed.len(),
            compression.name()
        );

        Ok(out)
    }

    fn directory(
        &self,
        image: &RasterImage<'_>,
        rows_per_strip: usize,
        offsets: &[u32],
        counts: &[u32],
    ) -> Result<IFD> {
        let order = self.options.byte_order;
        let bands = image.bands.len();
        let bits = (image.data_type.size() * 8) as u16;
        let format = if image.data_type.is_float() {
            sample_formats::FLOAT
        } else if image.data_type.is_signed() {
            sample_formats::SIGNED
        } else {
            sample_formats::UNSIGNED
        };
        let planar = if bands > 1 {
            tags::PLANAR_SEPARATE
        } else {
            tags::PLANAR_CHUNKY
        };

        let mut ifd = IFD::new(order);
        ifd.add_entry(IFDEntry::longs(tags::IMAGE_WIDTH, &[to_u32(image.dims.cols)?], order));
        ifd.add_entry(IFDEntry::longs(tags::IMAGE_LENGTH, &[to_u32(image.dims.rows)?], order));
        ifd.add_entry(IFDEntry::shorts(tags::BITS_PER_SAMPLE, &vec![bits; bands], order));
        ifd.add_entry(IFDEntry::shorts(tags::COMPRESSION, &[self.options.compression.tag()], order));
        ifd.add_entry(IFDEntry::shorts(
            tags::PHOTOMETRIC_INTERPRETATION,
            &[tags::PHOTOMETRIC_MIN_IS_BLACK],
            order,
        ));
        ifd.add_entry(IFDEntry::longs(tags::STRIP_OFFSETS, offsets, order));
        ifd.add_entry(IFDEntry::shorts(tags::SAMPLES_PER_PIXEL, &[to_u16(bands)?], order));
        ifd.add_entry(IFDEntry::longs(tags::ROWS_PER_STRIP, &[to_u32(rows_per_strip)?], order));
        ifd.add_entry(IFDEntry::longs(tags::STRIP_BYTE_COUNTS, counts, order));
        ifd.add_entry(IFDEntry::shorts(tags::PLANAR_CONFIGURATION, &[planar], order));
        ifd.add_entry(IFDEntry::shorts(tags::SAMPLE_FORMAT, &vec![format; bands], order));

        if let Some(ref software) = self.options.software {
            ifd.add_entry(IFDEntry::ascii(tags::SOFTWARE, software));
        }
        if let Some(georef) = image.georef {
            georef.write_entries(&mut ifd);
        }
        if let Some(nodata) = image.nodata {
            ifd.add_entry(IFDEntry::ascii(tags::GDAL_NODATA, &format_nodata(nodata)));
        }

        Ok(ifd)
    }
}

/// Text GDAL expects in the `GDAL_NODATA` tag
pub fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{}", value)
    }
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        Error::InvalidValue(format!("{} exceeds the classic TIFF 32-bit limit", value))
    })
}

fn to_u16(value: usize) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| Error::InvalidValue(format!("{} bands exceed the TIFF limit", value)))
}

fn align(out: &mut Vec<u8>) {
    if out.len() % 2 == 1 {
        out.push(0);
    }
}

/// Appends out-of-line values and the IFD, returning the IFD offset
fn write_directory(out: &mut Vec<u8>, ifd: &IFD, handler: &dyn ByteOrderHandler) -> Result<u32> {
    let entries = ifd.sorted_entries();

    let mut value_offsets = Vec::with_capacity(entries.len());
    for entry in &entries {
        if entry.is_inline() {
            value_offsets.push(None);
        } else {
            align(out);
            value_offsets.push(Some(to_u32(out.len())?));
            out.extend_from_slice(&entry.data);
        }
    }

    align(out);
    let ifd_offset = to_u32(out.len())?;
    out.reserve(2 + entries.len() * ENTRY_SIZE + 4);
    handler.write_u16(out, to_u16(entries.len())?);

    for (entry, value_offset) in entries.iter().zip(value_offsets) {
        handler.write_u16(out, entry.tag);
        handler.write_u16(out, entry.field_type);
        handler.write_u32(out, entry.count);
        match value_offset {
            Some(offset) => handler.write_u32(out, offset),
            None => {
                let mut field = [0u8; 4];
                field[..entry.data.len()].copy_from_slice(&entry.data);
                out.extend_from_slice(&field);
            }
        }
    }

    handler.write_u32(out, 0);
    to_u32(out.len())?;
    Ok(ifd_offset)
}

/// Converts one band to its on-disk sample bytes
fn encode_samples(samples: Samples<'_>, data_type: DataType, handler: &dyn ByteOrderHandler) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(samples.len() * data_type.size());

    match samples {
        Samples::Float(values) => {
            if data_type != DataType::F32 {
                return Err(Error::InvalidValue(format!(
                    "physical values cannot be written as {}",
                    data_type.name()
                )));
            }
            for &v in values {
                handler.write_f32(&mut out, v as f32);
            }
        }
        Samples::Int(values) => {
            if let Some((lo, hi)) = data_type.integer_range() {
                if let Some(&bad) = values.iter().find(|&&v| v < lo || v > hi) {
                    return Err(Error::InvalidValue(format!(
                        "value {} does not fit in {}",
                        bad,
                        data_type.name()
                    )));
                }
            }
            for &v in values {
                match data_type {
                    DataType::U8 => out.push(v as u8),
                    DataType::I8 => out.push(v as i8 as u8),
                    DataType::U16 => handler.write_u16(&mut out, v as u16),
                    DataType::I16 => handler.write_i16(&mut out, v as i16),
                    DataType::U32 => handler.write_u32(&mut out, v as u32),
                    DataType::I32 => handler.write_i32(&mut out, v as i32),
                    DataType::F32 => handler.write_f32(&mut out, v as f32),
                }
            }
        }
    }

    Ok(out)
}
