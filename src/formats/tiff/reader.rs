//! TIFF directory reader
//!
//! Reads the first IFD of a classic TIFF and decodes its strips. Only the
//! layouts produced by [`TiffWriter`](super::TiffWriter) need to be
//! understood: uncompressed, Deflate or PackBits strips of 8/16/32-bit
//! samples, chunky or planar.

use std::path::Path;
use log::debug;
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::io::{ByteOrder, ByteOrderHandler, InputBuffer};
use crate::types::{DataType, Dimensions};
use super::geotiff::GeoReference;
use super::ifd::{IFDEntry, IFD};
use super::tags;
use super::{BIGTIFF_MAGIC, TIFF_MAGIC};

/// A parsed TIFF file
pub struct TiffImage {
    buffer: InputBuffer,
    ifd: IFD,
}

impl TiffImage {
    /// Opens and parses a TIFF file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(InputBuffer::open(path, true)?)
    }

    /// Parses TIFF bytes held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::parse(InputBuffer::from_vec(bytes))
    }

    /// Parses the header and first directory of `buffer`
    pub fn parse(buffer: InputBuffer) -> Result<Self> {
        let data: &[u8] = &buffer;
        if data.len() < 8 {
            return Err(Error::InvalidFormat("file too small for a TIFF header".to_string()));
        }

        let order = ByteOrder::from_tiff_magic([data[0], data[1]])
            .ok_or_else(|| Error::InvalidFormat("not a TIFF file".to_string()))?;
        let handler = order.handler();

        match handler.read_u16(data, 2)? {
            TIFF_MAGIC => {}
            BIGTIFF_MAGIC => {
                return Err(Error::InvalidFormat("BigTIFF files are not supported".to_string()))
            }
            other => return Err(Error::InvalidFormat(format!("invalid TIFF magic {}", other))),
        }

        let ifd_offset = handler.read_u32(data, 4)? as usize;
        let ifd = read_ifd(data, ifd_offset, order, &*handler)?;
        debug!("read TIFF directory with {} entries", ifd.entry_count());

        Ok(Self { buffer, ifd })
    }

    /// Returns the first directory
    pub fn ifd(&self) -> &IFD {
        &self.ifd
    }

    /// Returns the byte order of the file
    pub fn byte_order(&self) -> ByteOrder {
        self.ifd.byte_order
    }

    /// Returns the raster dimensions
    pub fn dims(&self) -> Result<Dimensions> {
        self.ifd
            .dimensions()
            .ok_or_else(|| Error::InvalidFormat("missing image dimensions".to_string()))
    }

    /// Returns the pixel type
    pub fn data_type(&self) -> Result<DataType> {
        self.ifd
            .data_type()
            .ok_or_else(|| Error::InvalidFormat("unsupported sample layout".to_string()))
    }

    /// Returns the number of bands
    pub fn band_count(&self) -> usize {
        self.ifd.samples_per_pixel() as usize
    }

    /// Returns the georeferencing, if present
    pub fn georeference(&self) -> Result<Option<GeoReference>> {
        GeoReference::from_ifd(&self.ifd)
    }

    /// Returns the `GDAL_NODATA` value, if present and numeric
    pub fn nodata(&self) -> Option<f64> {
        let text = self.ifd.get_entry(tags::GDAL_NODATA)?.ascii_value()?;
        text.trim().parse().ok()
    }

    /// Decodes band `index` as f64 values in row-major order
    pub fn plane(&self, index: usize) -> Result<Vec<f64>> {
        let bands = self.band_count();
        if index >= bands {
            return Err(Error::BandOutOfRange {
                index,
                band_count: bands,
            });
        }

        let dims = self.dims()?;
        let data_type = self.data_type()?;
        let compression = Compression::from_tag(self.ifd.compression().unwrap_or(1))?;
        let offsets = self.ifd.get_tag_values(tags::STRIP_OFFSETS)
            .ok_or_else(|| Error::InvalidFormat("missing strip offsets".to_string()))?;
        let counts = self.ifd.get_tag_values(tags::STRIP_BYTE_COUNTS)
            .ok_or_else(|| Error::InvalidFormat("missing strip byte counts".to_string()))?;
        if offsets.len() != counts.len() {
            return Err(Error::InvalidFormat("strip offsets and byte counts differ in length".to_string()));
        }

        let separate = self.ifd.planar_configuration() == tags::PLANAR_SEPARATE as u64 && bands > 1;
        let strips = if separate {
            let per_plane = offsets.len() / bands;
            index * per_plane..(index + 1) * per_plane
        } else {
            0..offsets.len()
        };

        let data: &[u8] = &self.buffer;
        let mut raw = Vec::new();
        for i in strips {
            let start = offsets[i] as usize;
            let end = start + counts[i] as usize;
            let strip = data.get(start..end).ok_or_else(|| {
                Error::Decode(format!("strip {} lies outside the file", i))
            })?;
            raw.extend_from_slice(&compression.decompress(strip)?);
        }

        let size = data_type.size();
        let (stride, first) = if separate { (1, 0) } else { (bands, index) };
        let handler = self.byte_order().handler();

        let count = dims
            .pixel_count()
            .ok_or_else(|| Error::InvalidFormat("image size overflows".to_string()))?;
        (0..count)
            .map(|p| read_sample(&raw, (p * stride + first) * size, data_type, &*handler))
            .collect()
    }
}

fn read_sample(data: &[u8], offset: usize, data_type: DataType, handler: &dyn ByteOrderHandler) -> Result<f64> {
    let byte = || {
        data.get(offset)
            .copied()
            .ok_or_else(|| Error::Decode("strip data ends early".to_string()))
    };
    Ok(match data_type {
        DataType::U8 => byte()? as f64,
        DataType::I8 => byte()? as i8 as f64,
        DataType::U16 => handler.read_u16(data, offset)? as f64,
        DataType::I16 => handler.read_u16(data, offset)? as i16 as f64,
        DataType::U32 => handler.read_u32(data, offset)? as f64,
        DataType::I32 => handler.read_u32(data, offset)? as i32 as f64,
        DataType::F32 => f32::from_bits(handler.read_u32(data, offset)?) as f64,
    })
}

fn read_ifd(data: &[u8], offset: usize, order: ByteOrder, handler: &dyn ByteOrderHandler) -> Result<IFD> {
    let count = handler.read_u16(data, offset)? as usize;
    let mut ifd = IFD::new(order);

    for i in 0..count {
        let base = offset + 2 + i * 12;
        let tag = handler.read_u16(data, base)?;
        let field_type = handler.read_u16(data, base + 2)?;
        let value_count = handler.read_u32(data, base + 4)?;

        let Some(size) = tags::field_type_size(field_type) else {
            debug!("skipping tag {} with field type {}", tag, field_type);
            continue;
        };
        let len = size * value_count as usize;
        let start = if len <= 4 {
            base + 8
        } else {
            handler.read_u32(data, base + 8)? as usize
        };
        let bytes = data.get(start..start + len).ok_or_else(|| {
            Error::InvalidFormat(format!("value of tag {} lies outside the file", tags::tag_name(tag)))
        })?;

        ifd.add_entry(IFDEntry::new(tag, field_type, value_count, bytes.to_vec()));
    }

    Ok(ifd)
}
