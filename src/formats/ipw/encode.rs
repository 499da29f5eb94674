//! IPW header and payload encoding
//!
//! Writes the section layout read by [`parse_header`](super::parse_header)
//! and packs band matrices back at their declared widths.

use std::fs;
use std::path::Path;
use log::info;
use rayon::prelude::*;
use crate::error::{Error, Result};
use crate::io::BitWriter;
use super::decode::{BandMatrix, BandValues};
use super::header::{
    BAND_SECTION, GEO_SECTION, GLOBAL_SECTION, IMAGE_SECTION, LQ_SECTION, SECTION_PREFIX,
};
use super::Container;

const BASIC_IMAGE_REVISION: &str = "$Revision: 1.11 $";
const LQ_REVISION: &str = "$Revision: 1.6 $";
const GEO_REVISION: &str = "$Revision: 1.7 $";
const IMAGE_REVISION: &str = "$Revision: 1.5 $";

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

fn section(name: &str, band: i64, revision: &str) -> String {
    format!("{} {} {} {}\n", SECTION_PREFIX, name, band, revision)
}

/// Renders the header text for `container`, including the sentinel line
pub fn write_header(container: &Container) -> String {
    let mut out = String::new();

    let global = &container.global;
    out.push_str(&section(GLOBAL_SECTION, -1, BASIC_IMAGE_REVISION));
    out.push_str(&format!("byteorder = {}\n", global.byte_order.ipw_tag()));
    out.push_str(&format!("nlines = {}\n", global.rows));
    out.push_str(&format!("nsamps = {}\n", global.cols));
    out.push_str(&format!("nbands = {}\n", container.bands.len()));
    for line in &global.annotation {
        out.push_str(&format!("annot = {}\n", single_line(line)));
    }

    for band in &container.bands {
        out.push_str(&section(BAND_SECTION, band.index as i64, BASIC_IMAGE_REVISION));
        if let Some(bytes) = band.bytes {
            out.push_str(&format!("bytes = {}\n", bytes));
        }
        out.push_str(&format!("bits = {}\n", band.bits));
        if band.signed {
            out.push_str("sign = signed\n");
        }
        if let Some(nodata) = band.nodata {
            out.push_str(&format!("nodata = {}\n", nodata));
        }
        for line in &band.annotation {
            out.push_str(&format!("annot = {}\n", single_line(line)));
        }
        for line in &band.history {
            out.push_str(&format!("history = {}\n", single_line(line)));
        }
    }

    for band in &container.bands {
        out.push_str(&section(LQ_SECTION, band.index as i64, LQ_REVISION));
        out.push_str(&format!("map = {} {}\n", band.raw_range.min, band.phys_range.min));
        out.push_str(&format!("map = {} {}\n", band.raw_range.max, band.phys_range.max));
        if let Some(ref units) = band.units {
            out.push_str(&format!("units = {}\n", single_line(units)));
        }
    }

    for band in &container.bands {
        let Some(ref geo) = band.geo else { continue };
        out.push_str(&section(GEO_SECTION, band.index as i64, GEO_REVISION));
        out.push_str(&format!("bline = {}\n", geo.bline));
        out.push_str(&format!("bsamp = {}\n", geo.bsamp));
        out.push_str(&format!("dline = {}\n", geo.dline));
        out.push_str(&format!("dsamp = {}\n", geo.dsamp));
        if let Some(ref units) = geo.units {
            out.push_str(&format!("units = {}\n", single_line(units)));
        }
        if let Some(ref cs) = geo.coord_sys_id {
            out.push_str(&format!("coord_sys_ID = {}\n", single_line(cs)));
        }
    }

    out.push_str(&section(IMAGE_SECTION, -1, IMAGE_REVISION));
    out
}

/// Packs one band into its payload bytes
///
/// Physical matrices are quantized back to raw codes with the band's linear
/// map, extended past the lq range so out-of-map codes survive. Samples equal
/// to the matrix's nodata value are written as the band's nodata code. Raw
/// codes must fit the band's bit width.
pub fn encode_band(container: &Container, matrix: &BandMatrix) -> Result<Vec<u8>> {
    let meta = container.band(matrix.band())?;
    let dims = container.dimensions();
    if matrix.dims() != dims {
        return Err(Error::InvalidValue(format!(
            "band {} is {}x{}, container is {}x{}",
            meta.index,
            matrix.dims().rows,
            matrix.dims().cols,
            dims.rows,
            dims.cols
        )));
    }
    if meta.bits == 0 || meta.sample_bits() > crate::io::bits::MAX_SAMPLE_BITS {
        return Err(Error::UnsupportedBits {
            band: meta.index,
            bits: meta.bits,
        });
    }

    let raw: Vec<i64> = match matrix.values() {
        BandValues::Raw(values) => values.clone(),
        BandValues::Physical(values) => {
            let map = meta.rescale()?;
            let marker = matrix.nodata().zip(meta.nodata);
            values
                .iter()
                .map(|&p| match marker {
                    Some((n, code)) if p == n || (p.is_nan() && n.is_nan()) => Ok(code),
                    _ => map.to_code(p),
                })
                .collect::<Result<_>>()?
        }
    };

    let (lo, hi) = meta.representable_range();
    let mask = (1u64 << meta.bits) - 1;
    let width = meta.sample_bits();
    let capacity = meta.payload_len(dims).unwrap_or(0);
    let mut writer = BitWriter::with_capacity(capacity, container.byte_order());

    for value in raw {
        if value < lo || value > hi {
            return Err(Error::InvalidValue(format!(
                "band {}: value {} does not fit in {} bits",
                meta.index, value, meta.bits
            )));
        }
        writer.write(value as u64 & mask, width)?;
    }

    Ok(writer.finish())
}

/// Encodes a complete IPW file
///
/// `matrices` must hold one matrix per band, in band order.
pub fn encode(container: &Container, matrices: &[BandMatrix]) -> Result<Vec<u8>> {
    if matrices.len() != container.band_count() {
        return Err(Error::InvalidValue(format!(
            "{} matrices supplied for {} bands",
            matrices.len(),
            container.band_count()
        )));
    }
    for (i, matrix) in matrices.iter().enumerate() {
        if matrix.band() != i {
            return Err(Error::InvalidValue(format!(
                "matrix for band {} supplied in position {}",
                matrix.band(),
                i
            )));
        }
    }

    let payloads: Vec<Vec<u8>> = matrices
        .par_iter()
        .map(|m| encode_band(container, m))
        .collect::<Result<_>>()?;

    let mut out = write_header(container).into_bytes();
    for payload in payloads {
        out.extend_from_slice(&payload);
    }
    Ok(out)
}

/// Encodes and writes an IPW file to `path`
pub fn write_file<P: AsRef<Path>>(path: P, container: &Container, matrices: &[BandMatrix]) -> Result<()> {
    let bytes = encode(container, matrices)?;
    fs::write(path.as_ref(), &bytes)?;
    info!("wrote {} ({} bytes)", path.as_ref().display(), bytes.len());
    Ok(())
}
