//! Translation of many IPW files on a worker pool
//!
//! Each input is handled by its own task. Tasks report `(index, outcome)`
//! over a channel and the driver places every outcome at its submission
//! index, so the report is in input order whatever order files finish in.
//! A failing file is recorded and never stops the others.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use crossbeam::channel::unbounded;
use log::{debug, info, warn};
use serde::Serialize;
use crate::archive::{ArchivePacker, ArchiveRecord};
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::formats::ipw::IpwFile;
use crate::formats::tiff::{GeoReference, TiffOptions};
use crate::translate::{OutputMode, RasterJob, RasterTranslator, DEFAULT_EXTENSION};

/// Replaced by the input file name in output templates
pub const NAME_PLACEHOLDER: &str = "{name}";
/// Replaced by the input file name without its extension
pub const STEM_PLACEHOLDER: &str = "{stem}";

/// Settings applied to every file of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Worker threads, 0 for one per core
    pub threads: usize,
    /// Convert raw codes to physical values
    pub rescale: bool,
    /// Output layout
    pub mode: OutputMode,
    /// Bands to write, all when `None`
    pub bands: Option<Vec<usize>>,
    /// Output base path, see [`output_base`]
    pub output_template: String,
    /// Output extension
    pub extension: String,
    /// Strip compression of written files
    pub compression: Compression,
    /// Projection descriptor for georeferenced inputs
    pub projection: Option<String>,
    /// Memory map inputs instead of reading them
    pub use_mmap: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            rescale: true,
            mode: OutputMode::FilePerBand,
            bands: None,
            output_template: NAME_PLACEHOLDER.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            compression: Compression::None,
            projection: None,
            use_mmap: true,
        }
    }
}

/// Output base path for `input`
///
/// `{name}` in the template becomes the input's file name and `{stem}` the
/// file name without extension. A template without placeholders is used
/// as is.
pub fn output_base(template: &str, input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidValue(format!("input {} has no usable file name", input.display())))?;
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    Ok(PathBuf::from(
        template.replace(NAME_PLACEHOLDER, name).replace(STEM_PLACEHOLDER, stem),
    ))
}

/// Result of translating one input
#[derive(Debug)]
pub struct FileOutcome {
    /// Input file as submitted
    pub input: PathBuf,
    /// Written paths, or the error that stopped this file
    pub result: Result<Vec<PathBuf>>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// `ok`, or the error class name
    pub fn status(&self) -> &'static str {
        match self.result {
            Ok(_) => "ok",
            Err(ref e) => e.kind().name(),
        }
    }
}

#[derive(Serialize)]
struct ReportRow<'a> {
    input: String,
    status: &'a str,
    outputs: String,
    message: String,
}

/// Outcomes of a batch, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    /// Number of inputs translated
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    /// Number of inputs that failed
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// True when every input was translated
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Writes one CSV row per input
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        for outcome in &self.outcomes {
            let (outputs, message) = match outcome.result {
                Ok(ref paths) => (
                    paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(";"),
                    String::new(),
                ),
                Err(ref e) => (String::new(), e.to_string()),
            };
            csv.serialize(ReportRow {
                input: outcome.input.display().to_string(),
                status: outcome.status(),
                outputs,
                message,
            })?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Writes the CSV report to `path`
    pub fn write_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}

/// Runs translation batches
pub struct BatchRunner {
    options: BatchOptions,
    translator: RasterTranslator,
    archive: Option<Arc<dyn ArchivePacker>>,
}

impl BatchRunner {
    pub fn new(options: BatchOptions) -> Self {
        Self {
            options,
            translator: RasterTranslator::new(TiffOptions::default()),
            archive: None,
        }
    }

    /// Also hands every decoded file to `packer`
    pub fn with_archive(mut self, packer: Arc<dyn ArchivePacker>) -> Self {
        self.archive = Some(packer);
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Translates every input
    ///
    /// Fails without touching any file if the worker pool cannot be built or
    /// two inputs map to the same output base. Per-file failures are
    /// reported in the returned [`BatchReport`].
    pub fn run(&self, inputs: &[PathBuf]) -> Result<BatchReport> {
        let bases = self.output_bases(inputs)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()
            .map_err(|e| Error::InvalidValue(format!("cannot start worker pool: {}", e)))?;
        info!(
            "translating {} file(s) on {} thread(s)",
            inputs.len(),
            pool.current_num_threads()
        );

        let (tx, rx) = unbounded();
        pool.scope(|s| {
            for (index, (input, base)) in inputs.iter().zip(&bases).enumerate() {
                let tx = tx.clone();
                s.spawn(move |_| {
                    let result = self.process_file(input, base);
                    let _ = tx.send((index, FileOutcome {
                        input: input.clone(),
                        result,
                    }));
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<FileOutcome>> = (0..inputs.len()).map(|_| None).collect();
        for (index, outcome) in rx.iter() {
            if let Err(ref e) = outcome.result {
                warn!("{}: {}", outcome.input.display(), e);
            }
            slots[index] = Some(outcome);
        }

        let report = BatchReport {
            outcomes: slots.into_iter().flatten().collect(),
        };
        info!(
            "batch finished: {} translated, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    fn output_bases(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let bases = inputs
            .iter()
            .map(|input| output_base(&self.options.output_template, input))
            .collect::<Result<Vec<_>>>()?;

        let mut seen: HashMap<&Path, &Path> = HashMap::new();
        for (base, input) in bases.iter().zip(inputs) {
            if let Some(other) = seen.insert(base.as_path(), input.as_path()) {
                return Err(Error::InvalidValue(format!(
                    "{} and {} both write to {}",
                    other.display(),
                    input.display(),
                    base.display()
                )));
            }
        }
        Ok(bases)
    }

    /// Decodes and translates a single input
    pub fn process_file(&self, input: &Path, base: &Path) -> Result<Vec<PathBuf>> {
        let opts = &self.options;
        let ipw = IpwFile::open_with_options(input, opts.use_mmap)?;
        let container = ipw.container();
        debug!("{}: {} band(s), {}x{}", input.display(), container.band_count(), container.global.rows, container.global.cols);

        let bands = opts
            .bands
            .clone()
            .unwrap_or_else(|| (0..container.band_count()).collect());
        let job = RasterJob::new(bands, base, opts.mode)
            .with_extension(opts.extension.as_str())
            .with_compression(opts.compression);
        job.validate(container.band_count())?;

        let decoder = ipw.decoder()?;
        let decoded = if self.archive.is_some() {
            decoder.decode_all(opts.rescale)?
        } else {
            decoder.decode_bands(&job.bands, opts.rescale)?
        };

        let georef = container
            .geo()
            .map(|geo| GeoReference::from_ipw(geo, opts.projection.as_deref()));
        let written = self.translator.translate(container, &decoded, georef.as_ref(), &job)?;

        if let Some(ref packer) = self.archive {
            let source = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.display().to_string());
            packer.pack(&ArchiveRecord::from_decoded(source, container, &decoded))?;
        }
        Ok(written)
    }
}
