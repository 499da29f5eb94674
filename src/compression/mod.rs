//! Strip compression for GeoTIFF output

pub mod deflate;
pub mod packbits;

use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// Compression types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression
    #[default]
    None,
    /// Deflate/ZIP compression
    Deflate,
    /// PackBits compression
    PackBits,
}

impl Compression {
    /// Creates compression from TIFF compression tag value
    pub fn from_tag(value: u64) -> Result<Self> {
        match value {
            1 => Ok(Compression::None),
            8 | 32946 => Ok(Compression::Deflate),
            32773 => Ok(Compression::PackBits),
            _ => Err(Error::InvalidFormat(format!("Unsupported compression type {}", value))),
        }
    }

    /// Returns the TIFF compression tag value
    pub fn tag(&self) -> u16 {
        match self {
            Compression::None => 1,
            Compression::Deflate => 8,
            Compression::PackBits => 32773,
        }
    }

    /// Returns the name of this compression type
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Deflate => "Deflate/ZIP",
            Compression::PackBits => "PackBits",
        }
    }

    /// Parses a command line or config name
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "deflate" | "zip" => Ok(Compression::Deflate),
            "packbits" => Ok(Compression::PackBits),
            other => Err(Error::InvalidValue(format!("unknown compression {:?}", other))),
        }
    }

    /// Compresses one strip made of rows `row_bytes` long
    pub fn compress(&self, data: &[u8], row_bytes: usize) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Deflate => deflate::compress(data),
            Compression::PackBits => Ok(packbits::compress_rows(data, row_bytes)),
        }
    }

    /// Decompresses data
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Deflate => deflate::decompress(data),
            Compression::PackBits => packbits::decompress(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_from_tag() {
        assert_eq!(Compression::from_tag(1).unwrap(), Compression::None);
        assert_eq!(Compression::from_tag(8).unwrap(), Compression::Deflate);
        assert_eq!(Compression::from_tag(32773).unwrap(), Compression::PackBits);
        assert!(Compression::from_tag(5).is_err());
    }

    #[test]
    fn test_compression_name() {
        assert_eq!(Compression::None.name(), "None");
        assert_eq!(Compression::Deflate.name(), "Deflate/ZIP");
        assert_eq!(Compression::from_name("ZIP").unwrap(), Compression::Deflate);
        assert!(Compression::from_name("lzw").is_err());
    }

    #[test]
    fn test_compress_then_decompress() {
        let data: Vec<u8> = (0..200u32).map(|i| (i / 7) as u8).collect();
        for c in [Compression::None, Compression::Deflate, Compression::PackBits] {
            let packed = c.compress(&data, 20).unwrap();
            assert_eq!(c.decompress(&packed).unwrap(), data, "{}", c.name());
        }
    }

    #[test]
    fn test_serde_names() {
        let c: Compression = serde_json::from_str("\"packbits\"").unwrap();
        assert_eq!(c, Compression::PackBits);
        assert_eq!(serde_json::to_string(&Compression::Deflate).unwrap(), "\"deflate\"");
    }
}
