//! IPW raster container support
//!
//! An IPW file is an ASCII header made of `!<header>` sections followed by a
//! packed binary payload. Bands are stored one after another, each row-major
//! at its own bit width.

pub mod header;
pub mod decode;
pub mod encode;

use std::fmt;
use std::path::Path;
use crate::error::{Error, Result};
use crate::io::{ByteOrder, InputBuffer};
use crate::rescale::{PhysRange, RawRange, Rescale};
use crate::types::Dimensions;

pub use header::parse_header;
pub use decode::{BandDecoder, BandLayout, BandMatrix, BandValues};
pub use encode::{encode, encode_band, write_header};

/// Global attributes from the `basic_image_i` section
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalAttributes {
    /// Byte order of multi-byte samples
    pub byte_order: ByteOrder,
    /// Number of bands
    pub band_count: usize,
    /// Number of lines (rows)
    pub rows: usize,
    /// Number of samples per line (columns)
    pub cols: usize,
    /// Free-form `annot` lines
    pub annotation: Vec<String>,
}

/// Georeferencing declared by a band's `geo` section
#[derive(Debug, Clone, PartialEq)]
pub struct GeoHeader {
    /// Coordinate of the first line
    pub bline: f64,
    /// Coordinate of the first sample
    pub bsamp: f64,
    /// Line spacing
    pub dline: f64,
    /// Sample spacing
    pub dsamp: f64,
    /// Units of the coordinates
    pub units: Option<String>,
    /// Coordinate system name
    pub coord_sys_id: Option<String>,
}

/// Metadata for a single band
#[derive(Debug, Clone, PartialEq)]
pub struct BandMetadata {
    /// 0-based band index
    pub index: usize,
    /// Significant bits per sample
    pub bits: u32,
    /// Storage width in whole bytes, when declared
    pub bytes: Option<u32>,
    /// Two's complement samples
    pub signed: bool,
    /// Raw code range of the linear map
    pub raw_range: RawRange,
    /// Physical values at the ends of the raw range
    pub phys_range: PhysRange,
    /// Physical units
    pub units: Option<String>,
    /// Raw code marking missing data
    pub nodata: Option<i64>,
    /// Free-form `annot` lines
    pub annotation: Vec<String>,
    /// `history` lines
    pub history: Vec<String>,
    /// Georeferencing for this band
    pub geo: Option<GeoHeader>,
}

impl BandMetadata {
    /// Width of one stored sample in bits
    pub fn sample_bits(&self) -> u32 {
        self.bytes.map(|b| b * 8).unwrap_or(self.bits)
    }

    /// Bytes occupied by this band's samples, rounded up to a whole byte
    pub fn payload_len(&self, dims: Dimensions) -> Option<usize> {
        let bits = (dims.pixel_count()? as u128).checked_mul(self.sample_bits() as u128)?;
        usize::try_from(bits.div_ceil(8)).ok()
    }

    /// Inclusive range of codes that `bits` can hold
    pub fn representable_range(&self) -> (i64, i64) {
        let bits = self.bits.clamp(1, 63);
        if self.signed {
            (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
        } else {
            (0, (1i64 << bits) - 1)
        }
    }

    /// Builds the linear map for this band
    pub fn rescale(&self) -> Result<Rescale> {
        Rescale::new(self.raw_range, self.phys_range)
    }
}

/// A parsed IPW header: global attributes plus per-band metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub global: GlobalAttributes,
    pub bands: Vec<BandMetadata>,
}

impl Container {
    /// Returns the raster dimensions
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.global.rows, self.global.cols)
    }

    /// Returns the byte order of the payload
    pub fn byte_order(&self) -> ByteOrder {
        self.global.byte_order
    }

    /// Returns the number of bands
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Returns metadata for a band
    pub fn band(&self, index: usize) -> Result<&BandMetadata> {
        self.bands.get(index).ok_or(Error::BandOutOfRange {
            index,
            band_count: self.bands.len(),
        })
    }

    /// Returns the first georeferencing section found, in band order
    pub fn geo(&self) -> Option<&GeoHeader> {
        self.bands.iter().find_map(|b| b.geo.as_ref())
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IPW Image Information:")?;
        writeln!(f, "  Dimensions: {} lines x {} samples", self.global.rows, self.global.cols)?;
        writeln!(f, "  Byte order: {}", self.global.byte_order.ipw_tag())?;
        writeln!(f, "  Bands: {}", self.bands.len())?;
        for line in &self.global.annotation {
            writeln!(f, "  Annotation: {}", line)?;
        }

        for band in &self.bands {
            writeln!(
                f,
                "  Band {}: {} bits{}, raw [{}, {}] -> [{}, {}] {}",
                band.index,
                band.bits,
                if band.signed { " signed" } else { "" },
                band.raw_range.min,
                band.raw_range.max,
                band.phys_range.min,
                band.phys_range.max,
                band.units.as_deref().unwrap_or(""),
            )?;
        }

        if let Some(geo) = self.geo() {
            writeln!(f, "  Origin: ({}, {})", geo.bsamp, geo.bline)?;
            writeln!(f, "  Spacing: {} x {}", geo.dsamp, geo.dline)?;
            if let Some(ref cs) = geo.coord_sys_id {
                writeln!(f, "  Coordinate system: {}", cs)?;
            }
        }

        Ok(())
    }
}

/// An IPW file opened for decoding
pub struct IpwFile {
    buffer: InputBuffer,
    container: Container,
    payload_offset: usize,
}

impl IpwFile {
    /// Opens and parses an IPW file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, true)
    }

    /// Opens an IPW file, memory mapping it when `use_mmap` is set
    pub fn open_with_options<P: AsRef<Path>>(path: P, use_mmap: bool) -> Result<Self> {
        Self::from_buffer(InputBuffer::open(path, use_mmap)?)
    }

    /// Parses the header of bytes already in memory
    pub fn from_buffer(buffer: InputBuffer) -> Result<Self> {
        let (container, payload_offset) = parse_header(&buffer)?;
        Ok(Self {
            buffer,
            container,
            payload_offset,
        })
    }

    /// Returns the parsed header
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Returns the byte offset of the payload
    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }

    /// Returns a decoder over this file's payload
    pub fn decoder(&self) -> Result<BandDecoder<'_>> {
        BandDecoder::new(&self.container, self.payload_offset, &self.buffer)
    }

    /// Decodes a single band
    pub fn decode_band(&self, index: usize, rescale: bool) -> Result<BandMatrix> {
        self.decoder()?.decode_band(index, rescale)
    }

    /// Decodes every band
    pub fn decode_all(&self, rescale: bool) -> Result<Vec<BandMatrix>> {
        self.decoder()?.decode_all(rescale)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Containers and payloads shared by the format tests

    use super::*;

    pub fn band(index: usize, bits: u32, raw: (i64, i64), phys: (f64, f64)) -> BandMetadata {
        BandMetadata {
            index,
            bits,
            bytes: None,
            signed: false,
            raw_range: RawRange::new(raw.0, raw.1),
            phys_range: PhysRange::new(phys.0, phys.1),
            units: None,
            nodata: None,
            annotation: Vec::new(),
            history: Vec::new(),
            geo: None,
        }
    }

    pub fn container(rows: usize, cols: usize, order: ByteOrder, bands: Vec<BandMetadata>) -> Container {
        Container {
            global: GlobalAttributes {
                byte_order: order,
                band_count: bands.len(),
                rows,
                cols,
                annotation: Vec::new(),
            },
            bands,
        }
    }

    /// Five bands at bit widths 8, 16, 8, 16, 8 with UTM georeferencing
    pub fn five_band_container() -> Container {
        let mut bands = vec![
            band(0, 8, (0, 255), (-20.0, 20.0)),
            band(1, 16, (0, 65535), (0.0, 1000.0)),
            band(2, 8, (0, 255), (0.0, 1.0)),
            band(3, 16, (0, 65535), (-5.0, 5.0)),
            band(4, 8, (0, 200), (250.0, 300.0)),
        ];
        bands[0].units = Some("C".to_string());
        bands[1].bytes = Some(2);
        bands[4].nodata = Some(255);
        bands[0].geo = Some(GeoHeader {
            bline: 4_893_900.0,
            bsamp: 581_280.0,
            dline: -30.0,
            dsamp: 30.0,
            units: Some("meters".to_string()),
            coord_sys_id: Some("UTM".to_string()),
        });
        container(4, 3, ByteOrder::BigEndian, bands)
    }

    /// Deterministic raw samples for every band of `container`
    ///
    /// Pixel 0 holds the nodata code of bands declaring one. Pixel 1 holds
    /// [`out_of_map_code`] for bands whose bit width reaches past the lq map.
    pub fn raw_samples(container: &Container) -> Vec<Vec<i64>> {
        let n = container.dimensions().pixel_count().unwrap() as i64;
        container
            .bands
            .iter()
            .map(|b| {
                let span = b.raw_range.max - b.raw_range.min + 1;
                let mut values: Vec<i64> = (0..n)
                    .map(|i| b.raw_range.min + (i * 37 + b.index as i64 * 11) % span)
                    .collect();
                if let Some(nodata) = b.nodata {
                    values[0] = nodata;
                }
                if let Some(code) = out_of_map_code(b) {
                    values[1] = code;
                }
                values
            })
            .collect()
    }

    /// A code above the lq map that the band's bits can still hold
    pub fn out_of_map_code(band: &BandMetadata) -> Option<i64> {
        let (_, hi) = band.representable_range();
        let code = band.raw_range.max + (hi - band.raw_range.max) / 2;
        (code > band.raw_range.max && Some(code) != band.nodata).then_some(code)
    }

    /// Header plus payload for `container` holding `raw_samples`
    pub fn encoded(container: &Container) -> Vec<u8> {
        let dims = container.dimensions();
        let matrices: Vec<BandMatrix> = raw_samples(container)
            .into_iter()
            .zip(&container.bands)
            .map(|(values, b)| BandMatrix::from_raw(b.index, dims, values, b.raw_range, b.nodata).unwrap())
            .collect();
        encode(container, &matrices).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::fixtures::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sample_bits_and_payload_len() {
        let mut b = band(0, 12, (0, 4095), (0.0, 1.0));
        assert_eq!(b.sample_bits(), 12);
        assert_eq!(b.payload_len(Dimensions::new(3, 3)), Some(14));

        b.bytes = Some(2);
        assert_eq!(b.sample_bits(), 16);
        assert_eq!(b.payload_len(Dimensions::new(3, 3)), Some(18));
    }

    #[test]
    fn test_representable_range() {
        let mut b = band(0, 8, (0, 255), (0.0, 1.0));
        assert_eq!(b.representable_range(), (0, 255));
        b.signed = true;
        assert_eq!(b.representable_range(), (-128, 127));
    }

    #[test]
    fn test_band_lookup() {
        let c = five_band_container();
        assert_eq!(c.band_count(), 5);
        assert_eq!(c.band(3).unwrap().bits, 16);
        assert!(matches!(
            c.band(5),
            Err(Error::BandOutOfRange { index: 5, band_count: 5 })
        ));
    }

    #[test]
    fn test_display() {
        let output = format!("{}", five_band_container());
        assert!(output.contains("4 lines x 3 samples"));
        assert!(output.contains("Bands: 5"));
        assert!(output.contains("Coordinate system: UTM"));
    }

    #[test]
    fn test_open_file_and_decode() {
        let container = five_band_container();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&encoded(&container)).unwrap();
        file.flush().unwrap();

        let ipw = IpwFile::open(file.path()).unwrap();
        assert_eq!(ipw.container(), &container);

        let bands = ipw.decode_all(false).unwrap();
        let expected = raw_samples(&container);
        for (matrix, values) in bands.iter().zip(expected) {
            assert_eq!(matrix.raw().unwrap(), values.as_slice());
        }
    }
}
