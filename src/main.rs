use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use ipwkit::archive::JsonPacker;
use ipwkit::batch::BatchRunner;
use ipwkit::config::TranslateConfig;
use ipwkit::{Compression, IpwFile, OutputMode, Result};

#[derive(Debug, Parser, PartialEq)]
#[clap(author, version, about = "Translate IPW images to GeoTIFF", long_about = None)]
struct Args {
    #[clap(required = true, num_args = 1.., help = "IPW files to translate")]
    inputs: Vec<PathBuf>,

    #[clap(
        short,
        long,
        help = "Output base path; {name} and {stem} are replaced by the input file name and stem"
    )]
    output: Option<String>,

    #[clap(long, help = "Write raw codes instead of physical values")]
    raw: bool,

    #[clap(long, help = "Write all selected bands into one file")]
    single_file: bool,

    #[clap(
        short,
        long,
        value_delimiter = ',',
        help = "Comma separated band indices to write, in output order (default: all)"
    )]
    bands: Option<Vec<usize>>,

    #[clap(long, help = "Strip compression: none, deflate or packbits", value_parser(parse_compression))]
    compression: Option<Compression>,

    #[clap(long, help = "Output file extension (default: tif)")]
    extension: Option<String>,

    #[clap(long, help = "Projection of georeferenced inputs, e.g. EPSG:32611")]
    projection: Option<String>,

    #[clap(short = 'j', long, help = "Worker threads (default: one per core)")]
    threads: Option<usize>,

    #[clap(long, help = "JSON configuration file")]
    config: Option<PathBuf>,

    #[clap(long, help = "Write a CSV report of per-file outcomes")]
    report: Option<PathBuf>,

    #[clap(long, help = "Write a JSON archive record per input into this directory")]
    archive: Option<PathBuf>,

    #[clap(long, help = "Read inputs into memory instead of mapping them")]
    no_mmap: bool,

    #[clap(long, help = "Print image summaries and exit")]
    info: bool,
}

fn parse_compression(name: &str) -> std::result::Result<Compression, String> {
    Compression::from_name(name).map_err(|e| e.to_string())
}

impl Args {
    /// Applies command line flags over the configuration file
    fn merge(&self, mut config: TranslateConfig) -> TranslateConfig {
        if let Some(ref output) = self.output {
            config.output = output.clone();
        }
        if self.raw {
            config.raw = true;
        }
        if self.single_file {
            config.mode = OutputMode::SingleFile;
        }
        if let Some(ref bands) = self.bands {
            config.bands = Some(bands.clone());
        }
        if let Some(compression) = self.compression {
            config.compression = compression;
        }
        if let Some(ref extension) = self.extension {
            config.extension = extension.clone();
        }
        if let Some(ref projection) = self.projection {
            config.projection = Some(projection.clone());
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(ref report) = self.report {
            config.report = Some(report.clone());
        }
        if let Some(ref archive) = self.archive {
            config.archive = Some(archive.clone());
        }
        if self.no_mmap {
            config.use_mmap = false;
        }
        config
    }
}

/// Calls [`main_inner`], then handles printing errors and returning the correct exit code
fn main() -> ExitCode {
    match main_inner() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every input succeeded
fn main_inner() -> Result<bool> {
    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => TranslateConfig::load(path)?,
        None => TranslateConfig::default(),
    };
    let config = args.merge(config);

    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    if args.info {
        return Ok(print_info(&args.inputs, config.use_mmap));
    }

    let mut runner = BatchRunner::new(config.batch_options());
    if let Some(ref dir) = config.archive {
        runner = runner.with_archive(Arc::new(JsonPacker::new(dir)?.pretty(true)));
    }

    let report = runner.run(&args.inputs)?;
    if let Some(ref path) = config.report {
        report.write_csv_file(path)?;
    }

    for outcome in &report.outcomes {
        match outcome.result {
            Ok(ref paths) => {
                for path in paths {
                    println!("{} -> {}", outcome.input.display(), path.display());
                }
            }
            Err(ref e) => eprintln!("{}: {} ({})", outcome.input.display(), e, outcome.status()),
        }
    }
    println!(
        "{} of {} file(s) translated",
        report.succeeded(),
        report.outcomes.len()
    );

    Ok(report.is_success())
}

fn print_info(inputs: &[PathBuf], use_mmap: bool) -> bool {
    let mut ok = true;
    for input in inputs {
        println!("{}", input.display());
        match IpwFile::open_with_options(input, use_mmap) {
            Ok(ipw) => {
                print!("{}", ipw.container());
                println!("  Payload offset: {}", ipw.payload_offset());
            }
            Err(e) => {
                eprintln!("  Error: {} ({})", e, e.kind().name());
                ok = false;
            }
        }
    }
    ok
}
