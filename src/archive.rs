//! Hand-off of decoded containers to an archival store
//!
//! An [`ArchiveRecord`] flattens a container into scalar attributes keyed
//! like `nbands` or `band2.raw_max` plus one fully materialized array per
//! band. How a store groups or compresses records is up to its
//! [`ArchivePacker`].

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use log::info;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::formats::ipw::{BandMatrix, BandValues, Container};

/// A scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        AttributeValue::Int(value as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

/// Values of one band, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveArray {
    pub band: usize,
    pub rows: usize,
    pub cols: usize,
    pub physical: bool,
    pub values: Vec<f64>,
}

impl From<&BandMatrix> for ArchiveArray {
    fn from(matrix: &BandMatrix) -> Self {
        let values = match matrix.values() {
            BandValues::Raw(v) => v.iter().map(|&x| x as f64).collect(),
            BandValues::Physical(v) => v.clone(),
        };
        Self {
            band: matrix.band(),
            rows: matrix.dims().rows,
            cols: matrix.dims().cols,
            physical: matrix.is_physical(),
            values,
        }
    }
}

/// Everything handed to a packer for one input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    /// Name of the source file
    pub source: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub arrays: Vec<ArchiveArray>,
}

impl ArchiveRecord {
    /// Builds the record for a container and its decoded bands
    pub fn from_decoded(source: impl Into<String>, container: &Container, bands: &[BandMatrix]) -> Self {
        let mut attributes = BTreeMap::new();
        let mut put = |key: String, value: AttributeValue| {
            attributes.insert(key, value);
        };

        let global = &container.global;
        put("nbands".to_string(), container.band_count().into());
        put("nlines".to_string(), global.rows.into());
        put("nsamps".to_string(), global.cols.into());
        put("byteorder".to_string(), global.byte_order.ipw_tag().into());
        if !global.annotation.is_empty() {
            put("annot".to_string(), global.annotation.join("\n").as_str().into());
        }

        for band in &container.bands {
            let key = |name: &str| format!("band{}.{}", band.index, name);
            put(key("bits"), (band.bits as i64).into());
            if let Some(bytes) = band.bytes {
                put(key("bytes"), (bytes as i64).into());
            }
            put(key("signed"), (band.signed as i64).into());
            put(key("raw_min"), band.raw_range.min.into());
            put(key("raw_max"), band.raw_range.max.into());
            put(key("phys_min"), band.phys_range.min.into());
            put(key("phys_max"), band.phys_range.max.into());
            if let Some(ref units) = band.units {
                put(key("units"), units.as_str().into());
            }
            if let Some(nodata) = band.nodata {
                put(key("nodata"), nodata.into());
            }
            if !band.history.is_empty() {
                put(key("history"), band.history.join("\n").as_str().into());
            }
            if let Some(ref geo) = band.geo {
                put(key("bline"), geo.bline.into());
                put(key("bsamp"), geo.bsamp.into());
                put(key("dline"), geo.dline.into());
                put(key("dsamp"), geo.dsamp.into());
                if let Some(ref cs) = geo.coord_sys_id {
                    put(key("coord_sys_ID"), cs.as_str().into());
                }
            }
        }

        Self {
            source: source.into(),
            attributes,
            arrays: bands.iter().map(ArchiveArray::from).collect(),
        }
    }
}

/// Receives archive records
pub trait ArchivePacker: Send + Sync {
    /// Stores one record
    fn pack(&self, record: &ArchiveRecord) -> Result<()>;
}

/// Writes each record to `<dir>/<source>.json`
#[derive(Debug, Clone)]
pub struct JsonPacker {
    dir: PathBuf,
    pretty: bool,
}

impl JsonPacker {
    /// Creates a packer writing into `dir`, creating it if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            pretty: false,
        })
    }

    /// Indents the JSON output
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Path a record is written to
    pub fn record_path(&self, record: &ArchiveRecord) -> Result<PathBuf> {
        let name = Path::new(&record.source)
            .file_name()
            .ok_or_else(|| Error::InvalidValue(format!("invalid record source {:?}", record.source)))?;
        let mut file = name.to_os_string();
        file.push(".json");
        Ok(self.dir.join(file))
    }
}

impl ArchivePacker for JsonPacker {
    fn pack(&self, record: &ArchiveRecord) -> Result<()> {
        let path = self.record_path(record)?;
        let writer = BufWriter::new(File::create(&path)?);
        if self.pretty {
            serde_json::to_writer_pretty(writer, record)?;
        } else {
            serde_json::to_writer(writer, record)?;
        }
        info!("archived {} to {}", record.source, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ipw::fixtures::*;
    use crate::formats::ipw::{parse_header, BandDecoder};

    fn record(rescale: bool) -> ArchiveRecord {
        let container = five_band_container();
        let data = encoded(&container);
        let (parsed, offset) = parse_header(&data).unwrap();
        let bands = BandDecoder::new(&parsed, offset, &data).unwrap().decode_all(rescale).unwrap();
        ArchiveRecord::from_decoded("in.0051", &parsed, &bands)
    }

    #[test]
    fn test_attributes() {
        let record = record(false);
        let attr = |k: &str| record.attributes.get(k).cloned();
        assert_eq!(attr("nbands"), Some(AttributeValue::Int(5)));
        assert_eq!(attr("nlines"), Some(AttributeValue::Int(4)));
        assert_eq!(attr("byteorder"), Some(AttributeValue::Text("0123".to_string())));
        assert_eq!(attr("band1.bits"), Some(AttributeValue::Int(16)));
        assert_eq!(attr("band1.bytes"), Some(AttributeValue::Int(2)));
        assert_eq!(attr("band0.phys_min"), Some(AttributeValue::Float(-20.0)));
        assert_eq!(attr("band0.units"), Some(AttributeValue::Text("C".to_string())));
        assert_eq!(attr("band4.nodata"), Some(AttributeValue::Int(255)));
        assert_eq!(attr("band0.coord_sys_ID"), Some(AttributeValue::Text("UTM".to_string())));
        assert_eq!(attr("band2.units"), None);
    }

    #[test]
    fn test_arrays_are_materialized() {
        let record = record(true);
        assert_eq!(record.arrays.len(), 5);
        for array in &record.arrays {
            assert_eq!(array.values.len(), array.rows * array.cols);
            assert!(array.physical);
        }
    }

    #[test]
    fn test_json_packer() {
        let dir = tempfile::tempdir().unwrap();
        let packer = JsonPacker::new(dir.path().join("archive")).unwrap();
        let record = record(false);
        packer.pack(&record).unwrap();

        let path = dir.path().join("archive").join("in.0051.json");
        let text = fs::read_to_string(path).unwrap();
        let back: ArchiveRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }
}
