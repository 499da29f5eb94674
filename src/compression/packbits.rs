//! PackBits run-length coding
//!
//! A header byte `n` in 0..=127 is followed by `n + 1` literal bytes; `n` in
//! -127..=-1 repeats the next byte `1 - n` times; -128 is a no-op. TIFF
//! requires each row to be coded separately.

use crate::error::{Error, Result};

const MAX_RUN: usize = 128;

/// Compresses each `row_bytes` long row of `data` independently
pub fn compress_rows(data: &[u8], row_bytes: usize) -> Vec<u8> {
    if row_bytes == 0 {
        return compress(data);
    }
    let mut output = Vec::with_capacity(data.len() + data.len() / MAX_RUN + 1);
    for row in data.chunks(row_bytes) {
        encode_into(row, &mut output);
    }
    output
}

/// Compresses `data` as a single run-length stream
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len() + data.len() / MAX_RUN + 1);
    encode_into(data, &mut output);
    output
}

fn encode_into(data: &[u8], output: &mut Vec<u8>) {
    let mut pos = 0;
    let mut literal_start = 0;

    while pos < data.len() {
        let byte = data[pos];
        let mut run = 1;
        while pos + run < data.len() && run < MAX_RUN && data[pos + run] == byte {
            run += 1;
        }

        if run >= 3 {
            flush_literals(&data[literal_start..pos], output);
            output.push((1 - run as isize) as i8 as u8);
            output.push(byte);
            pos += run;
            literal_start = pos;
        } else {
            pos += run;
        }
    }

    flush_literals(&data[literal_start..], output);
}

fn flush_literals(literals: &[u8], output: &mut Vec<u8>) {
    for chunk in literals.chunks(MAX_RUN) {
        output.push((chunk.len() - 1) as u8);
        output.extend_from_slice(chunk);
    }
}

/// Decompresses PackBits compressed data
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let header = data[pos] as i8;
        pos += 1;

        match header {
            -128 => continue,

            0..=127 => {
                let count = (header as usize) + 1;

                if pos + count > data.len() {
                    return Err(Error::InvalidFormat(
                        "PackBits: Insufficient literal bytes".to_string()
                    ));
                }

                output.extend_from_slice(&data[pos..pos + count]);
                pos += count;
            }

            -127..=-1 => {
                if pos >= data.len() {
                    return Err(Error::InvalidFormat(
                        "PackBits: Missing run byte".to_string()
                    ));
                }

                let count = (1 - header as isize) as usize;
                let byte = data[pos];
                pos += 1;

                output.resize(output.len() + count, byte);
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_and_literals() {
        let data = [0x41, 0x42, 0x55, 0x55, 0x55, 0x55, 0x43];
        let packed = compress(&data);
        assert_eq!(packed, vec![1, 0x41, 0x42, (-3i8) as u8, 0x55, 0, 0x43]);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_long_runs_split() {
        let data = vec![7u8; 300];
        let packed = compress(&data);
        assert_eq!(packed, vec![(-127i8) as u8, 7, (-127i8) as u8, 7, (-43i8) as u8, 7]);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_long_literals_split() {
        let data: Vec<u8> = (0..=255u8).collect();
        let packed = compress(&data);
        assert_eq!(packed.len(), 258);
        assert_eq!(packed[0], 127);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_rows_do_not_share_runs() {
        let data = vec![9u8; 8];
        let packed = compress_rows(&data, 4);
        assert_eq!(packed, vec![(-3i8) as u8, 9, (-3i8) as u8, 9]);
    }

    #[test]
    fn test_noop_header() {
        let data = vec![(-128i8) as u8, 1, 0x41, 0x42];
        assert_eq!(decompress(&data).unwrap(), vec![0x41, 0x42]);
    }

    #[test]
    fn test_truncated_literal() {
        assert!(decompress(&[3, 0x41]).is_err());
    }
}
