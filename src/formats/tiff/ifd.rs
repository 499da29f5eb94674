//! Image File Directory (IFD) structures
//!
//! Entries keep their values as bytes in the file's byte order, so the same
//! type serves the writer (values encoded up front) and the reader (values
//! copied out of the file).

use std::collections::HashMap;
use crate::error::{Error, Result};
use crate::io::ByteOrder;
use crate::types::{DataType, Dimensions};
use super::tags::{self, field_types, sample_formats};

/// Represents an Image File Directory entry
#[derive(Debug, Clone, PartialEq)]
pub struct IFDEntry {
    /// TIFF tag identifier
    pub tag: u16,
    /// Field type
    pub field_type: u16,
    /// Number of values
    pub count: u32,
    /// Encoded values
    pub data: Vec<u8>,
}

impl IFDEntry {
    /// Creates an entry from already encoded values
    pub fn new(tag: u16, field_type: u16, count: u32, data: Vec<u8>) -> Self {
        Self {
            tag,
            field_type,
            count,
            data,
        }
    }

    /// SHORT values
    pub fn shorts(tag: u16, values: &[u16], order: ByteOrder) -> Self {
        let handler = order.handler();
        let mut data = Vec::with_capacity(values.len() * 2);
        for &v in values {
            handler.write_u16(&mut data, v);
        }
        Self::new(tag, field_types::SHORT, values.len() as u32, data)
    }

    /// LONG values
    pub fn longs(tag: u16, values: &[u32], order: ByteOrder) -> Self {
        let handler = order.handler();
        let mut data = Vec::with_capacity(values.len() * 4);
        for &v in values {
            handler.write_u32(&mut data, v);
        }
        Self::new(tag, field_types::LONG, values.len() as u32, data)
    }

    /// DOUBLE values
    pub fn doubles(tag: u16, values: &[f64], order: ByteOrder) -> Self {
        let handler = order.handler();
        let mut data = Vec::with_capacity(values.len() * 8);
        for &v in values {
            handler.write_f64(&mut data, v);
        }
        Self::new(tag, field_types::DOUBLE, values.len() as u32, data)
    }

    /// NUL terminated ASCII text
    pub fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self::new(tag, field_types::ASCII, data.len() as u32, data)
    }

    /// Returns the size in bytes of this field type
    pub fn field_type_size(&self) -> usize {
        tags::field_type_size(self.field_type).unwrap_or(1)
    }

    /// Returns whether the value fits in the 4-byte value field
    pub fn is_inline(&self) -> bool {
        self.data.len() <= 4
    }

    /// Integer values of a BYTE, SHORT or LONG entry
    pub fn values_u64(&self, order: ByteOrder) -> Result<Vec<u64>> {
        let handler = order.handler();
        let n = self.count as usize;
        match self.field_type {
            field_types::BYTE => Ok(self.data.iter().take(n).map(|&b| b as u64).collect()),
            field_types::SHORT => (0..n)
                .map(|i| handler.read_u16(&self.data, i * 2).map(u64::from))
                .collect(),
            field_types::LONG => (0..n)
                .map(|i| handler.read_u32(&self.data, i * 4).map(u64::from))
                .collect(),
            other => Err(Error::InvalidFormat(format!(
                "tag {} has type {}, expected an integer type",
                tags::tag_name(self.tag),
                tags::field_type_name(other)
            ))),
        }
    }

    /// Values of a DOUBLE entry
    pub fn values_f64(&self, order: ByteOrder) -> Result<Vec<f64>> {
        if self.field_type != field_types::DOUBLE {
            return Err(Error::InvalidFormat(format!(
                "tag {} is not DOUBLE",
                tags::tag_name(self.tag)
            )));
        }
        let handler = order.handler();
        (0..self.count as usize)
            .map(|i| handler.read_f64(&self.data, i * 8))
            .collect()
    }

    /// Text of an ASCII entry without the trailing NUL
    pub fn ascii_value(&self) -> Option<String> {
        if self.field_type != field_types::ASCII {
            return None;
        }
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.data.len());
        Some(String::from_utf8_lossy(&self.data[..end]).into_owned())
    }
}

/// Represents an Image File Directory
#[derive(Debug, Clone)]
pub struct IFD {
    /// Byte order of encoded values
    pub byte_order: ByteOrder,
    /// Entries in this IFD
    pub entries: Vec<IFDEntry>,
    /// Tag map for quick lookup
    tag_map: HashMap<u16, usize>,
}

impl IFD {
    /// Creates an empty IFD
    pub fn new(byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            entries: Vec::new(),
            tag_map: HashMap::new(),
        }
    }

    /// Adds an entry, replacing any entry with the same tag
    pub fn add_entry(&mut self, entry: IFDEntry) {
        if let Some(&index) = self.tag_map.get(&entry.tag) {
            self.entries[index] = entry;
            return;
        }
        let index = self.entries.len();
        self.tag_map.insert(entry.tag, index);
        self.entries.push(entry);
    }

    /// Gets an entry by tag
    pub fn get_entry(&self, tag: u16) -> Option<&IFDEntry> {
        self.tag_map.get(&tag).and_then(|&idx| self.entries.get(idx))
    }

    /// Entries in ascending tag order, as they must be written
    pub fn sorted_entries(&self) -> Vec<&IFDEntry> {
        let mut entries: Vec<&IFDEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.tag);
        entries
    }

    /// All integer values of a tag
    pub fn get_tag_values(&self, tag: u16) -> Option<Vec<u64>> {
        self.get_entry(tag)?.values_u64(self.byte_order).ok()
    }

    /// First integer value of a tag
    pub fn get_tag_value(&self, tag: u16) -> Option<u64> {
        self.get_tag_values(tag)?.first().copied()
    }

    /// Returns a required integer value
    pub fn require(&self, tag: u16) -> Result<u64> {
        self.get_tag_value(tag).ok_or_else(|| {
            Error::InvalidFormat(format!("missing tag {}", tags::tag_name(tag)))
        })
    }

    /// Returns image dimensions if available
    pub fn dimensions(&self) -> Option<Dimensions> {
        let width = self.get_tag_value(tags::IMAGE_WIDTH)?;
        let height = self.get_tag_value(tags::IMAGE_LENGTH)?;
        Some(Dimensions::new(height as usize, width as usize))
    }

    /// Returns compression type
    pub fn compression(&self) -> Option<u64> {
        self.get_tag_value(tags::COMPRESSION)
    }

    /// Returns samples per pixel
    pub fn samples_per_pixel(&self) -> u64 {
        self.get_tag_value(tags::SAMPLES_PER_PIXEL).unwrap_or(1)
    }

    /// Returns bits per sample
    pub fn bits_per_sample(&self) -> Option<u64> {
        self.get_tag_value(tags::BITS_PER_SAMPLE)
    }

    /// Returns sample format (1=unsigned, 2=signed, 3=float)
    pub fn sample_format(&self) -> u64 {
        self.get_tag_value(tags::SAMPLE_FORMAT).unwrap_or(1)
    }

    /// Returns the planar configuration
    pub fn planar_configuration(&self) -> u64 {
        self.get_tag_value(tags::PLANAR_CONFIGURATION)
            .unwrap_or(tags::PLANAR_CHUNKY as u64)
    }

    /// Determines the pixel data type based on TIFF tags
    pub fn data_type(&self) -> Option<DataType> {
        let bits = self.bits_per_sample()?;
        let format = self.sample_format() as u16;

        match (format, bits) {
            (sample_formats::UNSIGNED, 8) => Some(DataType::U8),
            (sample_formats::UNSIGNED, 16) => Some(DataType::U16),
            (sample_formats::UNSIGNED, 32) => Some(DataType::U32),
            (sample_formats::SIGNED, 8) => Some(DataType::I8),
            (sample_formats::SIGNED, 16) => Some(DataType::I16),
            (sample_formats::SIGNED, 32) => Some(DataType::I32),
            (sample_formats::FLOAT, 32) => Some(DataType::F32),
            _ => None,
        }
    }

    /// Returns number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Checks if this IFD has GeoTIFF tags
    pub fn is_geotiff(&self) -> bool {
        self.get_entry(tags::GEO_KEY_DIRECTORY).is_some()
            || self.get_entry(tags::MODEL_TIEPOINT).is_some()
            || self.get_entry(tags::MODEL_TRANSFORMATION).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_constructors() {
        let entry = IFDEntry::shorts(tags::BITS_PER_SAMPLE, &[16, 16], ByteOrder::LittleEndian);
        assert_eq!(entry.count, 2);
        assert_eq!(entry.data, vec![16, 0, 16, 0]);
        assert!(entry.is_inline());
        assert_eq!(entry.field_type_size(), 2);

        let entry = IFDEntry::doubles(tags::MODEL_PIXEL_SCALE, &[30.0, 30.0, 0.0], ByteOrder::BigEndian);
        assert_eq!(entry.data.len(), 24);
        assert!(!entry.is_inline());
        assert_eq!(entry.values_f64(ByteOrder::BigEndian).unwrap(), vec![30.0, 30.0, 0.0]);
    }

    #[test]
    fn test_ascii_entry() {
        let entry = IFDEntry::ascii(tags::GDAL_NODATA, "255");
        assert_eq!(entry.count, 4);
        assert_eq!(entry.ascii_value().as_deref(), Some("255"));
        assert!(entry.values_u64(ByteOrder::LittleEndian).is_err());
    }

    #[test]
    fn test_ifd_lookup() {
        let order = ByteOrder::LittleEndian;
        let mut ifd = IFD::new(order);
        ifd.add_entry(IFDEntry::longs(tags::IMAGE_LENGTH, &[4], order));
        ifd.add_entry(IFDEntry::longs(tags::IMAGE_WIDTH, &[3], order));
        ifd.add_entry(IFDEntry::shorts(tags::BITS_PER_SAMPLE, &[32], order));
        ifd.add_entry(IFDEntry::shorts(tags::SAMPLE_FORMAT, &[3], order));

        assert_eq!(ifd.dimensions(), Some(Dimensions::new(4, 3)));
        assert_eq!(ifd.data_type(), Some(DataType::F32));
        assert_eq!(ifd.samples_per_pixel(), 1);
        assert!(!ifd.is_geotiff());

        let tags: Vec<u16> = ifd.sorted_entries().iter().map(|e| e.tag).collect();
        assert_eq!(tags, vec![256, 257, 258, 339]);
    }

    #[test]
    fn test_add_entry_replaces() {
        let order = ByteOrder::BigEndian;
        let mut ifd = IFD::new(order);
        ifd.add_entry(IFDEntry::shorts(tags::COMPRESSION, &[1], order));
        ifd.add_entry(IFDEntry::shorts(tags::COMPRESSION, &[8], order));
        assert_eq!(ifd.entry_count(), 1);
        assert_eq!(ifd.compression(), Some(8));
    }
}
