//! IPW header parsing
//!
//! The header is a sequence of lines. A line starting with `!<header>` opens
//! a section and names its kind and band (`-1` for image-wide sections);
//! every other line is a `key = value` pair belonging to the open section.
//! The `image` section line ends the header and the payload starts right
//! after it.

use log::debug;
use crate::error::{Error, Result};
use crate::io::ByteOrder;
use crate::rescale::{PhysRange, RawRange};
use super::{BandMetadata, Container, GeoHeader, GlobalAttributes};

/// Prefix of every section line
pub const SECTION_PREFIX: &str = "!<header>";

/// Image-wide attributes
pub const GLOBAL_SECTION: &str = "basic_image_i";

/// Opens a band block
pub const BAND_SECTION: &str = "basic_image";

/// Linear quantization of a band
pub const LQ_SECTION: &str = "lq";

/// Georeferencing of a band
pub const GEO_SECTION: &str = "geo";

/// Payload sentinel
pub const IMAGE_SECTION: &str = "image";

/// Optional form feed line written after the sentinel by some producers
const FORM_FEED_LINE: &[u8] = b"\x0c\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Global,
    Band(usize),
    Lq(usize),
    Geo(usize),
    Skipped,
}

#[derive(Debug, Default)]
struct GlobalBuilder {
    byte_order: Option<ByteOrder>,
    band_count: Option<usize>,
    rows: Option<usize>,
    cols: Option<usize>,
    annotation: Vec<String>,
}

#[derive(Debug, Default)]
struct GeoBuilder {
    bline: Option<f64>,
    bsamp: Option<f64>,
    dline: Option<f64>,
    dsamp: Option<f64>,
    units: Option<String>,
    coord_sys_id: Option<String>,
}

impl GeoBuilder {
    fn build(self, band: usize) -> Result<GeoHeader> {
        Ok(GeoHeader {
            bline: self.bline.ok_or(Error::MissingBandKey { band, key: "bline" })?,
            bsamp: self.bsamp.ok_or(Error::MissingBandKey { band, key: "bsamp" })?,
            dline: self.dline.ok_or(Error::MissingBandKey { band, key: "dline" })?,
            dsamp: self.dsamp.ok_or(Error::MissingBandKey { band, key: "dsamp" })?,
            units: self.units,
            coord_sys_id: self.coord_sys_id,
        })
    }
}

#[derive(Debug)]
struct BandBuilder {
    index: usize,
    bits: Option<u32>,
    bytes: Option<u32>,
    signed: bool,
    map: Vec<(i64, f64)>,
    units: Option<String>,
    nodata: Option<i64>,
    annotation: Vec<String>,
    history: Vec<String>,
    geo: Option<GeoBuilder>,
}

impl BandBuilder {
    fn new(index: usize) -> Self {
        Self {
            index,
            bits: None,
            bytes: None,
            signed: false,
            map: Vec::new(),
            units: None,
            nodata: None,
            annotation: Vec::new(),
            history: Vec::new(),
            geo: None,
        }
    }

    fn require_bits(&self) -> Result<u32> {
        self.bits.ok_or(Error::MissingBandKey {
            band: self.index,
            key: "bits",
        })
    }

    fn build(self) -> Result<BandMetadata> {
        let band = self.index;
        let bits = self.require_bits()?;

        if let Some(bytes) = self.bytes {
            if !(1..=4).contains(&bytes) || bits > bytes * 8 {
                return Err(Error::InvalidFormat(format!(
                    "band {} declares {} bits in {} bytes",
                    band, bits, bytes
                )));
            }
        }

        let mut map = self.map;
        match map.len() {
            0 | 1 => return Err(Error::MissingBandKey { band, key: "map" }),
            2 => {}
            n => {
                return Err(Error::InvalidFormat(format!(
                    "band {} declares {} map points; only linear maps are supported",
                    band, n
                )))
            }
        }
        map.sort_by_key(|&(raw, _)| raw);
        let (raw_min, phys_min) = map[0];
        let (raw_max, phys_max) = map[1];

        let geo = self.geo.map(|g| g.build(band)).transpose()?;

        Ok(BandMetadata {
            index: band,
            bits,
            bytes: self.bytes,
            signed: self.signed,
            raw_range: RawRange::new(raw_min, raw_max),
            phys_range: PhysRange::new(phys_min, phys_max),
            units: self.units,
            nodata: self.nodata,
            annotation: self.annotation,
            history: self.history,
            geo,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    let n: usize = parse_number(key, value)?;
    if n == 0 {
        return Err(Error::InvalidFormat(format!("{} must be positive", key)));
    }
    Ok(n)
}

/// Sequential header state machine
#[derive(Debug)]
struct HeaderParser {
    section: Section,
    seen_global: bool,
    global: GlobalBuilder,
    bands: Vec<BandBuilder>,
}

impl HeaderParser {
    fn new() -> Self {
        Self {
            section: Section::None,
            seen_global: false,
            global: GlobalBuilder::default(),
            bands: Vec::new(),
        }
    }

    /// Handles a section line; returns true at the payload sentinel
    fn open_section(&mut self, line_no: usize, rest: &str) -> Result<bool> {
        let mut tokens = rest.split_whitespace();
        let name = tokens.next().ok_or_else(|| {
            Error::InvalidFormat(format!("line {}: section line without a name", line_no))
        })?;
        let band: i64 = match tokens.next() {
            Some(token) => parse_number("section band", token)?,
            None => {
                return Err(Error::InvalidFormat(format!(
                    "line {}: section {} without a band number",
                    line_no, name
                )))
            }
        };

        self.section = match name {
            GLOBAL_SECTION => {
                if self.seen_global || !self.bands.is_empty() {
                    return Err(Error::InvalidFormat(format!(
                        "line {}: {} must be the first and only global section",
                        line_no, GLOBAL_SECTION
                    )));
                }
                self.seen_global = true;
                Section::Global
            }
            BAND_SECTION => {
                if !self.seen_global {
                    return Err(Error::InvalidFormat(format!(
                        "line {}: band block before the {} section",
                        line_no, GLOBAL_SECTION
                    )));
                }
                let expected = self.bands.len();
                if band != expected as i64 {
                    return Err(Error::BandOrder {
                        expected,
                        found: band,
                    });
                }
                if let Some(previous) = self.bands.last() {
                    previous.require_bits()?;
                }
                self.bands.push(BandBuilder::new(expected));
                Section::Band(expected)
            }
            IMAGE_SECTION => return Ok(true),
            LQ_SECTION => Section::Lq(self.declared_band(line_no, name, band)?),
            GEO_SECTION => {
                let index = self.declared_band(line_no, name, band)?;
                self.bands[index].geo.get_or_insert_with(GeoBuilder::default);
                Section::Geo(index)
            }
            other => {
                debug!("line {}: skipping {} section for band {}", line_no, other, band);
                Section::Skipped
            }
        };

        Ok(false)
    }

    fn declared_band(&self, line_no: usize, name: &str, band: i64) -> Result<usize> {
        if band < 0 || band as usize >= self.bands.len() {
            return Err(Error::InvalidFormat(format!(
                "line {}: {} section references undeclared band {}",
                line_no, name, band
            )));
        }
        Ok(band as usize)
    }

    fn key_value(&mut self, line_no: usize, key: &str, value: &str) -> Result<()> {
        match self.section {
            Section::None => Err(Error::InvalidFormat(format!(
                "line {}: key {} outside of a header section",
                line_no, key
            ))),
            Section::Global => self.global_key(line_no, key, value),
            Section::Band(i) => self.band_key(line_no, i, key, value),
            Section::Lq(i) => self.lq_key(line_no, i, key, value),
            Section::Geo(i) => self.geo_key(line_no, i, key, value),
            Section::Skipped => Ok(()),
        }
    }

    fn global_key(&mut self, line_no: usize, key: &str, value: &str) -> Result<()> {
        let global = &mut self.global;
        match key {
            "byteorder" => {
                let order = ByteOrder::from_ipw_tag(value).ok_or_else(|| {
                    Error::InvalidFormat(format!("unsupported byteorder {:?}", value))
                })?;
                global.byte_order = Some(order);
            }
            "nlines" => global.rows = Some(parse_positive(key, value)?),
            "nsamps" => global.cols = Some(parse_positive(key, value)?),
            "nbands" => global.band_count = Some(parse_positive(key, value)?),
            "annot" => global.annotation.push(value.to_string()),
            _ => debug!("line {}: ignoring global key {}", line_no, key),
        }
        Ok(())
    }

    fn band_key(&mut self, line_no: usize, band: usize, key: &str, value: &str) -> Result<()> {
        let builder = &mut self.bands[band];
        match key {
            "bits" => {
                let bits: u32 = parse_number(key, value)?;
                if bits == 0 {
                    return Err(Error::InvalidFormat(format!("band {} declares 0 bits", band)));
                }
                builder.bits = Some(bits);
            }
            "bytes" => builder.bytes = Some(parse_number(key, value)?),
            "sign" => {
                builder.signed = match value {
                    "signed" => true,
                    "unsigned" => false,
                    other => {
                        return Err(Error::InvalidFormat(format!(
                            "band {} has unknown sign {:?}",
                            band, other
                        )))
                    }
                }
            }
            "nodata" => builder.nodata = Some(parse_number(key, value)?),
            "annot" => builder.annotation.push(value.to_string()),
            "history" => builder.history.push(value.to_string()),
            _ => debug!("line {}: ignoring band {} key {}", line_no, band, key),
        }
        Ok(())
    }

    fn lq_key(&mut self, line_no: usize, band: usize, key: &str, value: &str) -> Result<()> {
        let builder = &mut self.bands[band];
        match key {
            "map" => {
                let mut parts = value.split_whitespace();
                let (raw, phys) = match (parts.next(), parts.next(), parts.next()) {
                    (Some(raw), Some(phys), None) => (raw, phys),
                    _ => {
                        return Err(Error::InvalidNumber {
                            key: key.to_string(),
                            value: value.to_string(),
                        })
                    }
                };
                let phys: f64 = parse_number(key, phys)?;
                if !phys.is_finite() {
                    return Err(Error::InvalidNumber {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                builder.map.push((parse_number(key, raw)?, phys));
            }
            "units" => builder.units = Some(value.to_string()),
            _ => debug!("line {}: ignoring lq {} key {}", line_no, band, key),
        }
        Ok(())
    }

    fn geo_key(&mut self, line_no: usize, band: usize, key: &str, value: &str) -> Result<()> {
        let Some(geo) = self.bands[band].geo.as_mut() else {
            return Ok(());
        };
        match key {
            "bline" => geo.bline = Some(parse_number(key, value)?),
            "bsamp" => geo.bsamp = Some(parse_number(key, value)?),
            "dline" => geo.dline = Some(parse_number(key, value)?),
            "dsamp" => geo.dsamp = Some(parse_number(key, value)?),
            "units" => geo.units = Some(value.to_string()),
            "coord_sys_ID" => geo.coord_sys_id = Some(value.to_string()),
            _ => debug!("line {}: ignoring geo {} key {}", line_no, band, key),
        }
        Ok(())
    }

    fn finish(self) -> Result<Container> {
        let global = self.global;
        let byte_order = global.byte_order.ok_or(Error::MissingKey("byteorder"))?;
        let rows = global.rows.ok_or(Error::MissingKey("nlines"))?;
        let cols = global.cols.ok_or(Error::MissingKey("nsamps"))?;
        let band_count = global.band_count.ok_or(Error::MissingKey("nbands"))?;

        if self.bands.len() != band_count {
            return Err(Error::BandCountMismatch {
                declared: band_count,
                found: self.bands.len(),
            });
        }
        if rows.checked_mul(cols).is_none() {
            return Err(Error::InvalidFormat(format!(
                "{} lines x {} samples overflows the pixel count",
                rows, cols
            )));
        }

        let bands = self
            .bands
            .into_iter()
            .map(BandBuilder::build)
            .collect::<Result<Vec<_>>>()?;

        Ok(Container {
            global: GlobalAttributes {
                byte_order,
                band_count,
                rows,
                cols,
                annotation: global.annotation,
            },
            bands,
        })
    }
}

/// Parses an IPW header
///
/// Returns the container and the byte offset where the payload starts.
/// Nothing past the sentinel line is inspected.
pub fn parse_header(data: &[u8]) -> Result<(Container, usize)> {
    let mut parser = HeaderParser::new();
    let mut pos = 0;
    let mut line_no = 0;

    while pos < data.len() {
        line_no += 1;
        let (line_bytes, next) = match data[pos..].iter().position(|&b| b == b'\n') {
            Some(i) => (&data[pos..pos + i], pos + i + 1),
            None => (&data[pos..], data.len()),
        };

        let line = std::str::from_utf8(line_bytes)
            .map_err(|_| Error::InvalidFormat(format!("line {}: header text is not ASCII", line_no)))?
            .trim_end_matches('\r');

        if let Some(rest) = line.strip_prefix(SECTION_PREFIX) {
            if parser.open_section(line_no, rest)? {
                let mut offset = next;
                if data[offset..].starts_with(FORM_FEED_LINE) {
                    offset += FORM_FEED_LINE.len();
                }
                let container = parser.finish()?;
                debug!(
                    "parsed IPW header: {} bands, {}x{}, payload at byte {}",
                    container.band_count(),
                    container.global.rows,
                    container.global.cols,
                    offset
                );
                return Ok((container, offset));
            }
        } else if !line.trim().is_empty() {
            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::InvalidFormat(format!("line {}: expected `key = value`, got {:?}", line_no, line))
            })?;
            parser.key_value(line_no, key.trim(), value.trim())?;
        }

        pos = next;
    }

    Err(Error::InvalidFormat(format!(
        "header has no `{} {}` sentinel",
        SECTION_PREFIX, IMAGE_SECTION
    )))
}
