//! Bit-level cursors over packed sample streams
//!
//! Samples in an IPW payload are packed back to back at their declared bit
//! width with no padding between samples or rows. Big-endian streams are
//! consumed most-significant bit first and little-endian streams least-
//! significant bit first, so a width that is a multiple of 8 yields exactly
//! the usual big- or little-endian integer.

use crate::error::{Error, Result};
use crate::io::ByteOrder;

/// Widest sample a cursor can extract
pub const MAX_SAMPLE_BITS: u32 = 32;

fn low_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Reads fixed-width unsigned samples from a byte slice
///
/// Tracks the current byte and the bit offset within it; every call to
/// [`BitCursor::read`] advances by exactly the requested width.
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    byte: usize,
    bit: u32,
    order: ByteOrder,
}

impl<'a> BitCursor<'a> {
    /// Creates a cursor positioned at the first bit of `data`
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            data,
            byte: 0,
            bit: 0,
            order,
        }
    }

    /// Returns the absolute bit position of the cursor
    pub fn position(&self) -> u64 {
        self.byte as u64 * 8 + self.bit as u64
    }

    /// Returns the number of unread bits
    pub fn remaining(&self) -> u64 {
        (self.data.len() as u64 * 8).saturating_sub(self.position())
    }

    /// Reads the next `bits`-wide sample
    pub fn read(&mut self, bits: u32) -> Result<u64> {
        if bits == 0 || bits > MAX_SAMPLE_BITS {
            return Err(Error::Decode(format!("cannot read a {}-bit sample", bits)));
        }
        if self.remaining() < bits as u64 {
            return Err(Error::Decode(format!(
                "bit cursor at {} cannot read {} more bits from {} bytes",
                self.position(),
                bits,
                self.data.len()
            )));
        }

        let mut value = 0u64;
        let mut pending = bits;
        let mut shift = 0u32;

        while pending > 0 {
            let available = 8 - self.bit;
            let take = available.min(pending);
            let current = self.data[self.byte] as u64;

            match self.order {
                ByteOrder::BigEndian => {
                    let chunk = (current >> (available - take)) & low_mask(take);
                    value = (value << take) | chunk;
                }
                ByteOrder::LittleEndian => {
                    let chunk = (current >> self.bit) & low_mask(take);
                    value |= chunk << shift;
                    shift += take;
                }
            }

            self.bit += take;
            if self.bit == 8 {
                self.byte += 1;
                self.bit = 0;
            }
            pending -= take;
        }

        Ok(value)
    }
}

/// Packs fixed-width samples into bytes, the inverse of [`BitCursor`]
#[derive(Debug)]
pub struct BitWriter {
    out: Vec<u8>,
    current: u8,
    bit: u32,
    order: ByteOrder,
}

impl BitWriter {
    /// Creates an empty writer
    pub fn new(order: ByteOrder) -> Self {
        Self::with_capacity(0, order)
    }

    /// Creates an empty writer with room for `bytes` output bytes
    pub fn with_capacity(bytes: usize, order: ByteOrder) -> Self {
        Self {
            out: Vec::with_capacity(bytes),
            current: 0,
            bit: 0,
            order,
        }
    }

    /// Appends the low `bits` bits of `value`
    pub fn write(&mut self, value: u64, bits: u32) -> Result<()> {
        if bits == 0 || bits > MAX_SAMPLE_BITS {
            return Err(Error::InvalidValue(format!("cannot write a {}-bit sample", bits)));
        }

        let value = value & low_mask(bits);
        let mut pending = bits;
        let mut written = 0u32;

        while pending > 0 {
            let available = 8 - self.bit;
            let take = available.min(pending);

            let chunk = match self.order {
                ByteOrder::BigEndian => {
                    let chunk = (value >> (pending - take)) & low_mask(take);
                    chunk << (available - take)
                }
                ByteOrder::LittleEndian => {
                    let chunk = (value >> written) & low_mask(take);
                    chunk << self.bit
                }
            };
            self.current |= chunk as u8;

            self.bit += take;
            if self.bit == 8 {
                self.out.push(self.current);
                self.current = 0;
                self.bit = 0;
            }
            pending -= take;
            written += take;
        }

        Ok(())
    }

    /// Flushes any partial byte (zero padded) and returns the packed bytes
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit > 0 {
            self.out.push(self.current);
        }
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_aligned_reads_match_endianness() {
        let data = [0x12u8, 0x34];
        let mut be = BitCursor::new(&data, ByteOrder::BigEndian);
        assert_eq!(be.read(16).unwrap(), 0x1234);

        let mut le = BitCursor::new(&data, ByteOrder::LittleEndian);
        assert_eq!(le.read(16).unwrap(), 0x3412);
    }

    #[test]
    fn test_nibbles_msb_first() {
        let data = [0xABu8, 0xCD];
        let mut cursor = BitCursor::new(&data, ByteOrder::BigEndian);
        let values: Vec<u64> = (0..4).map(|_| cursor.read(4).unwrap()).collect();
        assert_eq!(values, vec![0xA, 0xB, 0xC, 0xD]);
    }

    #[test]
    fn test_nibbles_lsb_first() {
        let data = [0xABu8, 0xCD];
        let mut cursor = BitCursor::new(&data, ByteOrder::LittleEndian);
        let values: Vec<u64> = (0..4).map(|_| cursor.read(4).unwrap()).collect();
        assert_eq!(values, vec![0xB, 0xA, 0xD, 0xC]);
    }

    #[test]
    fn test_twelve_bit_samples_cross_bytes() {
        // 0xABC, 0xDEF packed MSB first
        let data = [0xABu8, 0xCD, 0xEF];
        let mut cursor = BitCursor::new(&data, ByteOrder::BigEndian);
        assert_eq!(cursor.read(12).unwrap(), 0xABC);
        assert_eq!(cursor.read(12).unwrap(), 0xDEF);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_read_past_end() {
        let data = [0xFFu8];
        let mut cursor = BitCursor::new(&data, ByteOrder::BigEndian);
        assert_eq!(cursor.read(5).unwrap(), 0x1F);
        assert!(cursor.read(5).is_err());
    }

    #[test]
    fn test_rejects_unsupported_width() {
        let data = [0u8; 8];
        let mut cursor = BitCursor::new(&data, ByteOrder::BigEndian);
        assert!(cursor.read(0).is_err());
        assert!(cursor.read(33).is_err());
    }

    #[test]
    fn test_writer_inverts_cursor() {
        let widths = [1u32, 3, 7, 8, 11, 16, 32];
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            for &bits in &widths {
                let samples: Vec<u64> = (0..13u64).map(|i| (i * 2654435761) & low_mask(bits)).collect();

                let mut writer = BitWriter::new(order);
                for &s in &samples {
                    writer.write(s, bits).unwrap();
                }
                let packed = writer.finish();
                assert_eq!(packed.len(), (13 * bits as usize).div_ceil(8));

                let mut cursor = BitCursor::new(&packed, order);
                let decoded: Vec<u64> = (0..13).map(|_| cursor.read(bits).unwrap()).collect();
                assert_eq!(decoded, samples, "order {:?} bits {}", order, bits);
            }
        }
    }

    #[test]
    fn test_writer_pads_partial_byte() {
        let mut writer = BitWriter::new(ByteOrder::BigEndian);
        writer.write(0b101, 3).unwrap();
        assert_eq!(writer.finish(), vec![0b1010_0000]);

        let mut writer = BitWriter::new(ByteOrder::LittleEndian);
        writer.write(0b101, 3).unwrap();
        assert_eq!(writer.finish(), vec![0b0000_0101]);
    }
}
