//! Byte order (endianness) handling
//!
//! Provides utilities for reading and writing multi-byte values in different
//! byte orders. IPW headers declare the order as a byte significance string
//! (`0123` for big-endian, `3210` for little-endian); TIFF files announce it
//! with their `II`/`MM` magic.

use crate::error::{Error, Result};

/// Represents the byte order (endianness) of binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian byte order (least significant byte first)
    LittleEndian,
    /// Big-endian byte order (most significant byte first)
    BigEndian,
}

impl ByteOrder {
    /// Parses the IPW `byteorder` header value
    pub fn from_ipw_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "0123" => Some(ByteOrder::BigEndian),
            "3210" => Some(ByteOrder::LittleEndian),
            _ => None,
        }
    }

    /// Returns the IPW `byteorder` header value
    pub fn ipw_tag(&self) -> &'static str {
        match self {
            ByteOrder::BigEndian => "0123",
            ByteOrder::LittleEndian => "3210",
        }
    }

    /// Detects byte order from TIFF magic bytes
    ///
    /// TIFF files start with either "II" (0x4949) for little-endian
    /// or "MM" (0x4D4D) for big-endian.
    pub fn from_tiff_magic(magic: [u8; 2]) -> Option<Self> {
        match &magic {
            b"II" => Some(ByteOrder::LittleEndian),
            b"MM" => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }

    /// Returns the TIFF magic bytes for this byte order
    pub fn tiff_magic(&self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => *b"II",
            ByteOrder::BigEndian => *b"MM",
        }
    }

    /// Creates a handler for this byte order
    pub fn handler(&self) -> Box<dyn ByteOrderHandler> {
        match self {
            ByteOrder::LittleEndian => Box::new(LittleEndian),
            ByteOrder::BigEndian => Box::new(BigEndian),
        }
    }
}

/// Reads N bytes at `offset`, failing on a short slice
fn take<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    offset.checked_add(N)
        .and_then(|end| data.get(offset..end))
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| Error::Decode(format!(
            "read of {} bytes at offset {} exceeds buffer length {}",
            N, offset, data.len()
        )))
}

/// Trait for reading and writing typed values with a specific byte order
pub trait ByteOrderHandler: Send + Sync {
    /// Reads an unsigned 16-bit integer
    fn read_u16(&self, data: &[u8], offset: usize) -> Result<u16>;

    /// Reads an unsigned 32-bit integer
    fn read_u32(&self, data: &[u8], offset: usize) -> Result<u32>;

    /// Reads a 64-bit floating point number
    fn read_f64(&self, data: &[u8], offset: usize) -> Result<f64>;

    /// Appends an unsigned 16-bit integer
    fn write_u16(&self, out: &mut Vec<u8>, value: u16);

    /// Appends an unsigned 32-bit integer
    fn write_u32(&self, out: &mut Vec<u8>, value: u32);

    /// Appends a signed 16-bit integer
    fn write_i16(&self, out: &mut Vec<u8>, value: i16);

    /// Appends a signed 32-bit integer
    fn write_i32(&self, out: &mut Vec<u8>, value: i32);

    /// Appends a 32-bit floating point number
    fn write_f32(&self, out: &mut Vec<u8>, value: f32);

    /// Appends a 64-bit floating point number
    fn write_f64(&self, out: &mut Vec<u8>, value: f64);
}

struct LittleEndian;

impl ByteOrderHandler for LittleEndian {
    fn read_u16(&self, data: &[u8], offset: usize) -> Result<u16> {
        Ok(u16::from_le_bytes(take(data, offset)?))
    }

    fn read_u32(&self, data: &[u8], offset: usize) -> Result<u32> {
        Ok(u32::from_le_bytes(take(data, offset)?))
    }

    fn read_f64(&self, data: &[u8], offset: usize) -> Result<f64> {
        Ok(f64::from_le_bytes(take(data, offset)?))
    }

    fn write_u16(&self, out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn write_u32(&self, out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn write_i16(&self, out: &mut Vec<u8>, value: i16) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn write_i32(&self, out: &mut Vec<u8>, value: i32) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn write_f32(&self, out: &mut Vec<u8>, value: f32) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn write_f64(&self, out: &mut Vec<u8>, value: f64) {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

struct BigEndian;

impl ByteOrderHandler for BigEndian {
    fn read_u16(&self, data: &[u8], offset: usize) -> Result<u16> {
        Ok(u16::from_be_bytes(take(data, offset)?))
    }

    fn read_u32(&self, data: &[u8], offset: usize) -> Result<u32> {
        Ok(u32::from_be_bytes(take(data, offset)?))
    }

    fn read_f64(&self, data: &[u8], offset: usize) -> Result<f64> {
        Ok(f64::from_be_bytes(take(data, offset)?))
    }

    fn write_u16(&self, out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn write_u32(&self, out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn write_i16(&self, out: &mut Vec<u8>, value: i16) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn write_i32(&self, out: &mut Vec<u8>, value: i32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn write_f32(&self, out: &mut Vec<u8>, value: f32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn write_f64(&self, out: &mut Vec<u8>, value: f64) {
        out.extend_from_slice(&value.to_be_bytes());
    }
}
