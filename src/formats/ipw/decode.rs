//! Band payload decoding
//!
//! Bands are stored one after another, each starting on a byte boundary.
//! Within a band, samples are packed row-major at the band's storage width
//! with no row padding.

use log::debug;
use rayon::prelude::*;
use crate::error::{Error, Result};
use crate::io::bits::{BitCursor, MAX_SAMPLE_BITS};
use crate::rescale::{RawRange, Rescale};
use crate::types::{DataType, Dimensions};
use super::{BandMetadata, Container};

/// Pixel values of one band
#[derive(Debug, Clone, PartialEq)]
pub enum BandValues {
    /// Stored integer codes
    Raw(Vec<i64>),
    /// Rescaled physical values
    Physical(Vec<f64>),
}

impl BandValues {
    /// Number of samples
    pub fn len(&self) -> usize {
        match self {
            BandValues::Raw(v) => v.len(),
            BandValues::Physical(v) => v.len(),
        }
    }

    /// Returns whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded rows x cols band
///
/// The matrix is immutable once built. `nodata` is expressed in the value
/// space of the matrix (a raw code or a physical value).
#[derive(Debug, Clone, PartialEq)]
pub struct BandMatrix {
    band: usize,
    dims: Dimensions,
    values: BandValues,
    nodata: Option<f64>,
    raw_range: Option<RawRange>,
}

impl BandMatrix {
    /// Wraps raw codes decoded from `band`
    pub fn from_raw(
        band: usize,
        dims: Dimensions,
        values: Vec<i64>,
        raw_range: RawRange,
        nodata: Option<i64>,
    ) -> Result<Self> {
        check_len(band, dims, values.len())?;
        Ok(Self {
            band,
            dims,
            values: BandValues::Raw(values),
            nodata: nodata.map(|n| n as f64),
            raw_range: Some(raw_range),
        })
    }

    /// Wraps physical values for `band`
    pub fn from_physical(
        band: usize,
        dims: Dimensions,
        values: Vec<f64>,
        nodata: Option<f64>,
    ) -> Result<Self> {
        check_len(band, dims, values.len())?;
        Ok(Self {
            band,
            dims,
            values: BandValues::Physical(values),
            nodata,
            raw_range: None,
        })
    }

    /// Source band index
    pub fn band(&self) -> usize {
        self.band
    }

    /// Matrix dimensions
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// All samples in row-major order
    pub fn values(&self) -> &BandValues {
        &self.values
    }

    /// Raw codes, if this matrix was not rescaled
    pub fn raw(&self) -> Option<&[i64]> {
        match &self.values {
            BandValues::Raw(v) => Some(v),
            BandValues::Physical(_) => None,
        }
    }

    /// Physical values, if this matrix was rescaled
    pub fn physical(&self) -> Option<&[f64]> {
        match &self.values {
            BandValues::Physical(v) => Some(v),
            BandValues::Raw(_) => None,
        }
    }

    /// Returns whether this matrix holds physical values
    pub fn is_physical(&self) -> bool {
        matches!(self.values, BandValues::Physical(_))
    }

    /// Nodata marker in the matrix's value space
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Declared raw range, for raw matrices
    pub fn raw_range(&self) -> Option<RawRange> {
        self.raw_range
    }

    /// Sample at (row, col) as f64
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.dims.rows || col >= self.dims.cols {
            return None;
        }
        let i = row * self.dims.cols + col;
        match &self.values {
            BandValues::Raw(v) => v.get(i).map(|&x| x as f64),
            BandValues::Physical(v) => v.get(i).copied(),
        }
    }

    /// Narrowest output type for this matrix
    ///
    /// Physical values are always `F32`. Raw codes use the narrowest
    /// integer type covering the declared range, the observed samples and
    /// the nodata code.
    pub fn data_type(&self) -> DataType {
        let values = match &self.values {
            BandValues::Physical(_) => return DataType::F32,
            BandValues::Raw(v) => v,
        };

        let (mut min, mut max) = match self.raw_range {
            Some(r) => (r.min, r.max),
            None => (0, 0),
        };
        for &v in values {
            min = min.min(v);
            max = max.max(v);
        }
        if let Some(n) = self.nodata {
            min = min.min(n as i64);
            max = max.max(n as i64);
        }

        DataType::for_raw_range(min, max).unwrap_or(DataType::F32)
    }
}

fn check_len(band: usize, dims: Dimensions, len: usize) -> Result<()> {
    if dims.pixel_count() != Some(len) {
        return Err(Error::InvalidValue(format!(
            "band {} has {} samples, expected {}x{}",
            band, len, dims.rows, dims.cols
        )));
    }
    Ok(())
}

/// Where a band lives in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandLayout {
    /// Band index
    pub band: usize,
    /// Byte offset relative to the start of the payload
    pub offset: usize,
    /// Byte length of the band
    pub len: usize,
    /// Storage width of one sample
    pub sample_bits: u32,
}

/// Computes the payload layout of every band
pub fn band_layouts(container: &Container) -> Result<Vec<BandLayout>> {
    let dims = container.dimensions();
    let mut offset = 0usize;
    let mut layouts = Vec::with_capacity(container.bands.len());

    for band in &container.bands {
        let len = band.payload_len(dims).ok_or_else(|| {
            Error::Decode(format!("band {} payload size overflows", band.index))
        })?;
        layouts.push(BandLayout {
            band: band.index,
            offset,
            len,
            sample_bits: band.sample_bits(),
        });
        offset = offset
            .checked_add(len)
            .ok_or_else(|| Error::Decode("payload size overflows".to_string()))?;
    }

    Ok(layouts)
}

/// Decodes bands from a payload held in memory
///
/// Construction verifies that the payload holds every declared band, so a
/// short file fails up front rather than yielding a partial matrix.
#[derive(Debug)]
pub struct BandDecoder<'a> {
    container: &'a Container,
    payload: &'a [u8],
    layouts: Vec<BandLayout>,
}

impl<'a> BandDecoder<'a> {
    /// Creates a decoder over `data[payload_offset..]`
    pub fn new(container: &'a Container, payload_offset: usize, data: &'a [u8]) -> Result<Self> {
        let layouts = band_layouts(container)?;
        let required = layouts.last().map(|l| l.offset + l.len).unwrap_or(0);
        let available = data.len().saturating_sub(payload_offset);

        if available < required {
            return Err(Error::TruncatedPayload { required, available });
        }
        if available > required {
            debug!("{} trailing bytes after the last band", available - required);
        }

        Ok(Self {
            container,
            payload: &data[payload_offset..],
            layouts,
        })
    }

    /// Returns the layout of every band
    pub fn layouts(&self) -> &[BandLayout] {
        &self.layouts
    }

    /// Decodes one band, rescaling to physical values when `rescale` is set
    pub fn decode_band(&self, index: usize, rescale: bool) -> Result<BandMatrix> {
        let meta = self.container.band(index)?;
        let layout = self.layouts[index];
        let bytes = &self.payload[layout.offset..layout.offset + layout.len];
        decode_band(meta, self.container, bytes, rescale)
    }

    /// Decodes the bands in `selection`, in that order
    pub fn decode_bands(&self, selection: &[usize], rescale: bool) -> Result<Vec<BandMatrix>> {
        for &index in selection {
            self.container.band(index)?;
        }
        selection
            .par_iter()
            .map(|&index| self.decode_band(index, rescale))
            .collect()
    }

    /// Decodes every band in index order
    pub fn decode_all(&self, rescale: bool) -> Result<Vec<BandMatrix>> {
        let selection: Vec<usize> = (0..self.container.band_count()).collect();
        self.decode_bands(&selection, rescale)
    }
}

/// Decodes a band from exactly its own payload bytes
pub fn decode_band(
    meta: &BandMetadata,
    container: &Container,
    bytes: &[u8],
    rescale: bool,
) -> Result<BandMatrix> {
    let band = meta.index;
    if meta.bits == 0 || meta.bits > MAX_SAMPLE_BITS || meta.sample_bits() > MAX_SAMPLE_BITS {
        return Err(Error::UnsupportedBits {
            band,
            bits: meta.bits,
        });
    }

    let (lo, hi) = meta.representable_range();
    if meta.raw_range.min < lo || meta.raw_range.max > hi {
        return Err(Error::Decode(format!(
            "band {}: {} bits cannot represent raw range [{}, {}]",
            band, meta.bits, meta.raw_range.min, meta.raw_range.max
        )));
    }

    let dims = container.dimensions();
    let count = dims
        .pixel_count()
        .ok_or_else(|| Error::Decode(format!("band {}: pixel count overflows", band)))?;
    let width = meta.sample_bits();
    let mask = (1u64 << meta.bits) - 1;
    let sign_bit = 1u64 << (meta.bits - 1);

    let mut cursor = BitCursor::new(bytes, container.byte_order());
    let mut raw = Vec::with_capacity(count);
    for _ in 0..count {
        let value = cursor.read(width)? & mask;
        let value = if meta.signed && value & sign_bit != 0 {
            value as i64 - (1i64 << meta.bits)
        } else {
            value as i64
        };
        raw.push(value);
    }

    debug!(
        "decoded band {}: {} samples at {} bits{}",
        band,
        count,
        width,
        if rescale { ", rescaled" } else { "" }
    );

    if !rescale {
        return BandMatrix::from_raw(band, dims, raw, meta.raw_range, meta.nodata);
    }

    let map: Rescale = meta.rescale()?;
    let physical = raw.iter().map(|&r| map.to_physical(r)).collect();
    let nodata = meta.nodata.map(|n| map.to_physical(n));
    BandMatrix::from_physical(band, dims, physical, nodata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::formats::ipw::fixtures::*;
    use crate::formats::ipw::parse_header;
    use crate::io::ByteOrder;

    #[test]
    fn test_decode_five_bands_raw() {
        let container = five_band_container();
        let data = encoded(&container);
        let (_, offset) = parse_header(&data).unwrap();

        let decoder = BandDecoder::new(&container, offset, &data).unwrap();
        let bands = decoder.decode_all(false).unwrap();
        assert_eq!(bands.len(), 5);
        for (matrix, expected) in bands.iter().zip(raw_samples(&container)) {
            assert_eq!(matrix.raw().unwrap(), expected.as_slice());
            assert_eq!(matrix.dims(), Dimensions::new(4, 3));
        }
    }

    #[test]
    fn test_layout_offsets() {
        let container = five_band_container();
        let layouts = band_layouts(&container).unwrap();
        let offsets: Vec<usize> = layouts.iter().map(|l| l.offset).collect();
        assert_eq!(offsets, vec![0, 12, 36, 48, 72]);
        assert_eq!(layouts[4].len, 12);
    }

    #[test]
    fn test_short_payload_is_decode_error() {
        let container = five_band_container();
        let data = encoded(&container);
        let short = &data[..data.len() - 10];
        let (_, offset) = parse_header(short).unwrap();

        let err = BandDecoder::new(&container, offset, short).unwrap_err();
        assert!(matches!(err, Error::TruncatedPayload { required: 84, available: 74 }));
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_four_bit_samples() {
        let container = container(2, 3, ByteOrder::BigEndian, vec![band(0, 4, (0, 15), (0.0, 15.0))]);
        // 6 nibbles in 3 bytes
        let payload = [0x12u8, 0x34, 0x5F];
        let decoder = BandDecoder::new(&container, 0, &payload).unwrap();
        let matrix = decoder.decode_band(0, false).unwrap();
        assert_eq!(matrix.raw().unwrap(), &[1, 2, 3, 4, 5, 15]);
        assert_eq!(matrix.get(1, 2), Some(15.0));
        assert_eq!(matrix.get(2, 0), None);
    }

    #[test]
    fn test_odd_width_band_is_byte_padded() {
        let bands = vec![band(0, 12, (0, 4095), (0.0, 1.0)), band(1, 8, (0, 255), (0.0, 1.0))];
        let container = container(1, 3, ByteOrder::BigEndian, bands);
        // three 12-bit samples take 36 bits, padded to 5 bytes
        let payload = [0xABu8, 0xCD, 0xEF, 0x12, 0x30, 0x07, 0x08, 0x09];
        let decoder = BandDecoder::new(&container, 0, &payload).unwrap();

        let b0 = decoder.decode_band(0, false).unwrap();
        assert_eq!(b0.raw().unwrap(), &[0xABC, 0xDEF, 0x123]);
        let b1 = decoder.decode_band(1, false).unwrap();
        assert_eq!(b1.raw().unwrap(), &[7, 8, 9]);
    }

    #[test]
    fn test_little_endian_sixteen_bit() {
        let container = container(1, 2, ByteOrder::LittleEndian, vec![band(0, 16, (0, 65535), (0.0, 1.0))]);
        let payload = [0x34u8, 0x12, 0xFF, 0x00];
        let matrix = BandDecoder::new(&container, 0, &payload).unwrap().decode_band(0, false).unwrap();
        assert_eq!(matrix.raw().unwrap(), &[0x1234, 0x00FF]);
    }

    #[test]
    fn test_signed_samples() {
        let mut b = band(0, 8, (-128, 127), (-1.0, 1.0));
        b.signed = true;
        let container = container(1, 3, ByteOrder::BigEndian, vec![b]);
        let payload = [0xFFu8, 0x80, 0x7F];
        let matrix = BandDecoder::new(&container, 0, &payload).unwrap().decode_band(0, false).unwrap();
        assert_eq!(matrix.raw().unwrap(), &[-1, -128, 127]);
        assert_eq!(matrix.data_type(), DataType::I8);
    }

    #[test]
    fn test_bits_narrower_than_storage_are_masked() {
        let mut b = band(0, 10, (0, 1023), (0.0, 1.0));
        b.bytes = Some(2);
        let container = container(1, 2, ByteOrder::BigEndian, vec![b]);
        let payload = [0xFCu8, 0x01, 0x03, 0xFF];
        let matrix = BandDecoder::new(&container, 0, &payload).unwrap().decode_band(0, false).unwrap();
        assert_eq!(matrix.raw().unwrap(), &[1, 1023]);
    }

    #[test]
    fn test_rescale_to_physical() {
        let container = container(1, 3, ByteOrder::BigEndian, vec![band(0, 8, (0, 255), (-20.0, 20.0))]);
        let payload = [0u8, 255, 51];
        let matrix = BandDecoder::new(&container, 0, &payload).unwrap().decode_band(0, true).unwrap();
        let values = matrix.physical().unwrap();
        assert_eq!(values[0], -20.0);
        assert_eq!(values[1], 20.0);
        assert!((values[2] - -12.0).abs() < 1e-9);
        assert_eq!(matrix.data_type(), DataType::F32);
    }

    #[test]
    fn test_degenerate_range_rescales_to_phys_min() {
        let container = container(1, 3, ByteOrder::BigEndian, vec![band(0, 8, (4, 4), (2.5, 9.0))]);
        let payload = [0u8, 4, 200];
        let matrix = BandDecoder::new(&container, 0, &payload).unwrap().decode_band(0, true).unwrap();
        assert_eq!(matrix.physical().unwrap(), &[2.5, 2.5, 2.5]);
    }

    #[test]
    fn test_nodata_follows_value_space() {
        let container = five_band_container();
        let data = encoded(&container);
        let (_, offset) = parse_header(&data).unwrap();
        let decoder = BandDecoder::new(&container, offset, &data).unwrap();

        let raw = decoder.decode_band(4, false).unwrap();
        assert_eq!(raw.nodata(), Some(255.0));
        assert_eq!(&raw.raw().unwrap()[..2], &[255, 227]);

        // 250 + 255 * 50 / 200
        let physical = decoder.decode_band(4, true).unwrap();
        assert_eq!(physical.nodata(), Some(313.75));
        assert_eq!(physical.get(0, 0), Some(313.75));
        // out of the lq map, still on its line
        assert_eq!(physical.get(0, 1), Some(306.75));
        assert_eq!(physical.data_type(), DataType::F32);
    }

    #[test]
    fn test_selection_order_and_range() {
        let container = five_band_container();
        let data = encoded(&container);
        let (_, offset) = parse_header(&data).unwrap();
        let decoder = BandDecoder::new(&container, offset, &data).unwrap();

        let bands = decoder.decode_bands(&[3, 0], false).unwrap();
        assert_eq!(bands.iter().map(|b| b.band()).collect::<Vec<_>>(), vec![3, 0]);

        let err = decoder.decode_bands(&[1, 5], false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn test_unsupported_widths() {
        let container = container(1, 1, ByteOrder::BigEndian, vec![band(0, 40, (0, 1), (0.0, 1.0))]);
        let payload = [0u8; 5];
        let decoder = BandDecoder::new(&container, 0, &payload).unwrap();
        assert!(matches!(
            decoder.decode_band(0, false),
            Err(Error::UnsupportedBits { band: 0, bits: 40 })
        ));

        let container = container_with_wide_range();
        let payload = [0u8; 1];
        let decoder = BandDecoder::new(&container, 0, &payload).unwrap();
        assert_eq!(decoder.decode_band(0, false).unwrap_err().kind(), ErrorKind::Decode);
    }

    fn container_with_wide_range() -> crate::formats::ipw::Container {
        container(1, 1, ByteOrder::BigEndian, vec![band(0, 8, (0, 1000), (0.0, 1.0))])
    }

    #[test]
    fn test_raw_data_type_includes_observed_values() {
        let dims = Dimensions::new(1, 2);
        let m = BandMatrix::from_raw(0, dims, vec![0, 300], RawRange::new(0, 255), None).unwrap();
        assert_eq!(m.data_type(), DataType::U16);

        let m = BandMatrix::from_raw(0, dims, vec![0, 10], RawRange::new(0, 200), Some(-1)).unwrap();
        assert_eq!(m.data_type(), DataType::I16);
    }

    #[test]
    fn test_matrix_length_checked() {
        let result = BandMatrix::from_physical(0, Dimensions::new(2, 2), vec![0.0; 3], None);
        assert!(result.is_err());
    }
}
