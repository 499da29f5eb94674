//! Configuration file support
//!
//! A JSON document giving defaults for a translation run. Every field is
//! optional; command line flags take precedence over the file.

use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::batch::{BatchOptions, NAME_PLACEHOLDER};
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::translate::{OutputMode, DEFAULT_EXTENSION};

/// Log level setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Settings for a translation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranslateConfig {
    /// Output template, `{name}` and `{stem}` are replaced per input
    #[serde(default = "default_output")]
    pub output: String,

    /// Keep raw codes instead of physical values
    #[serde(default)]
    pub raw: bool,

    #[serde(default)]
    pub mode: OutputMode,

    /// Bands to write, all when absent
    #[serde(default)]
    pub bands: Option<Vec<usize>>,

    #[serde(default)]
    pub compression: Compression,

    #[serde(default = "default_extension")]
    pub extension: String,

    /// Projection descriptor such as `EPSG:32611`
    #[serde(default)]
    pub projection: Option<String>,

    /// Worker threads, 0 for one per core
    #[serde(default)]
    pub threads: usize,

    #[serde(default = "default_use_mmap")]
    pub use_mmap: bool,

    /// CSV report destination
    #[serde(default)]
    pub report: Option<PathBuf>,

    /// Directory receiving archive records
    #[serde(default)]
    pub archive: Option<PathBuf>,

    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_output() -> String {
    NAME_PLACEHOLDER.to_string()
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_use_mmap() -> bool {
    true
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            raw: false,
            mode: OutputMode::default(),
            bands: None,
            compression: Compression::default(),
            extension: default_extension(),
            projection: None,
            threads: 0,
            use_mmap: default_use_mmap(),
            report: None,
            archive: None,
            log_level: LogLevel::default(),
        }
    }
}

impl TranslateConfig {
    /// Loads a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text).map_err(|e| match e {
            Error::Serialization(msg) => {
                Error::Serialization(format!("{}: {}", path.as_ref().display(), msg))
            }
            other => other,
        })
    }

    /// Parses a configuration document
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Options handed to the batch runner
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            threads: self.threads,
            rescale: !self.raw,
            mode: self.mode,
            bands: self.bands.clone(),
            output_template: self.output.clone(),
            extension: self.extension.clone(),
            compression: self.compression,
            projection: self.projection.clone(),
            use_mmap: self.use_mmap,
        }
    }
}
