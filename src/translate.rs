//! Translation of decoded bands into GeoTIFF files
//!
//! A [`RasterJob`] names the bands to write, in order, and where to write
//! them. In [`OutputMode::FilePerBand`] every selected band goes to
//! `<base>.<NN>.<ext>`, where `NN` is the band's position in the selection.
//! In [`OutputMode::SingleFile`] all selected bands go to `<base>.<ext>` as
//! separate planes sharing one pixel type.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::formats::ipw::{BandMatrix, BandValues, Container};
use crate::formats::tiff::{GeoReference, RasterImage, Samples, TiffOptions, TiffWriter};
use crate::types::DataType;

/// Default output extension
pub const DEFAULT_EXTENSION: &str = "tif";

/// How selected bands are laid out in files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// One single-band file per selected band
    #[default]
    FilePerBand,
    /// One file holding every selected band
    SingleFile,
}

/// One translation request
#[derive(Debug, Clone, PartialEq)]
pub struct RasterJob {
    /// Band indices in output order
    pub bands: Vec<usize>,
    /// Output path without extension
    pub output: PathBuf,
    /// File layout
    pub mode: OutputMode,
    /// Output file extension, without the dot
    pub extension: String,
    /// Strip compression
    pub compression: Compression,
}

impl RasterJob {
    /// Creates a job with the default extension and no compression
    pub fn new<P: Into<PathBuf>>(bands: Vec<usize>, output: P, mode: OutputMode) -> Self {
        Self {
            bands,
            output: output.into(),
            mode,
            extension: DEFAULT_EXTENSION.to_string(),
            compression: Compression::None,
        }
    }

    /// Sets the output extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets the strip compression
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Checks the job against a container with `band_count` bands
    pub fn validate(&self, band_count: usize) -> Result<()> {
        if self.bands.is_empty() {
            return Err(Error::InvalidValue("no bands selected".to_string()));
        }
        if let Some(&index) = self.bands.iter().find(|&&i| i >= band_count) {
            return Err(Error::BandOutOfRange { index, band_count });
        }
        let ext = self.extension.trim_start_matches('.');
        if ext.is_empty() || ext.contains(['/', '\\']) {
            return Err(Error::InvalidValue(format!(
                "invalid output extension {:?}",
                self.extension
            )));
        }
        if self.output.as_os_str().is_empty() {
            return Err(Error::InvalidValue("empty output path".to_string()));
        }
        Ok(())
    }

    /// Paths this job writes, in selection order for per-band output
    pub fn output_paths(&self) -> Vec<PathBuf> {
        let ext = self.extension.trim_start_matches('.');
        match self.mode {
            OutputMode::SingleFile => vec![with_suffix(&self.output, &format!(".{}", ext))],
            OutputMode::FilePerBand => {
                let width = self.bands.len().to_string().len().max(2);
                (0..self.bands.len())
                    .map(|pos| with_suffix(&self.output, &format!(".{:0width$}.{}", pos, ext, width = width)))
                    .collect()
            }
        }
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn samples(matrix: &BandMatrix) -> Samples<'_> {
    match matrix.values() {
        BandValues::Raw(v) => Samples::Int(v),
        BandValues::Physical(v) => Samples::Float(v),
    }
}

/// Narrowest pixel type holding every band
pub fn common_data_type(bands: &[&BandMatrix]) -> DataType {
    bands
        .iter()
        .map(|b| b.data_type())
        .reduce(DataType::promote)
        .unwrap_or(DataType::F32)
}

/// Writes decoded bands as GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct RasterTranslator {
    options: TiffOptions,
}

impl RasterTranslator {
    /// Creates a translator; a job's compression overrides `options`
    pub fn new(options: TiffOptions) -> Self {
        Self { options }
    }

    /// Translates the selected bands of a decoded container
    ///
    /// `decoded` holds the matrices available for the container, in any
    /// order. The job is validated against the container before anything is
    /// written.
    pub fn translate(
        &self,
        container: &Container,
        decoded: &[BandMatrix],
        georef: Option<&GeoReference>,
        job: &RasterJob,
    ) -> Result<Vec<PathBuf>> {
        job.validate(container.band_count())?;

        let bands = job
            .bands
            .iter()
            .map(|&index| {
                decoded.iter().find(|m| m.band() == index).ok_or_else(|| {
                    Error::InvalidValue(format!("band {} was not decoded", index))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.write_bands(&bands, georef, job)
    }

    /// Writes `bands`, already in output order, according to `job`
    ///
    /// Returns the written paths.
    pub fn write_bands(
        &self,
        bands: &[&BandMatrix],
        georef: Option<&GeoReference>,
        job: &RasterJob,
    ) -> Result<Vec<PathBuf>> {
        if bands.len() != job.bands.len() {
            return Err(Error::InvalidValue(format!(
                "{} bands supplied for a selection of {}",
                bands.len(),
                job.bands.len()
            )));
        }
        let first = bands
            .first()
            .ok_or_else(|| Error::InvalidValue("no bands selected".to_string()))?;
        let dims = first.dims();
        if let Some(other) = bands.iter().find(|b| b.dims() != dims) {
            return Err(Error::InvalidValue(format!(
                "band {} is {}x{}, band {} is {}x{}",
                other.band(),
                other.dims().rows,
                other.dims().cols,
                first.band(),
                dims.rows,
                dims.cols
            )));
        }

        let writer = TiffWriter::new(TiffOptions {
            compression: job.compression,
            ..self.options.clone()
        });
        let paths = job.output_paths();

        match job.mode {
            OutputMode::FilePerBand => {
                for (band, path) in bands.iter().zip(&paths) {
                    let image = RasterImage {
                        dims,
                        data_type: band.data_type(),
                        bands: vec![samples(band)],
                        georef,
                        nodata: band.nodata(),
                    };
                    create_parent(path)?;
                    writer.write(path, &image)?;
                    info!("wrote band {} to {}", band.band(), path.display());
                }
            }
            OutputMode::SingleFile => {
                let nodata = bands.iter().find_map(|b| b.nodata());
                if let Some(value) = nodata {
                    for b in bands.iter().filter(|b| b.nodata().is_some_and(|n| n != value)) {
                        warn!(
                            "band {} declares a different nodata value; writing {}",
                            b.band(),
                            value
                        );
                    }
                }

                let image = RasterImage {
                    dims,
                    data_type: common_data_type(bands),
                    bands: bands.iter().map(|b| samples(b)).collect(),
                    georef,
                    nodata,
                };
                let path = &paths[0];
                create_parent(path)?;
                writer.write(path, &image)?;
                info!(
                    "wrote {} band(s) as {} to {}",
                    bands.len(),
                    image.data_type.name(),
                    path.display()
                );
            }
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::formats::ipw::fixtures::*;
    use crate::formats::ipw::{parse_header, BandDecoder};
    use crate::formats::tiff::TiffImage;

    fn decoded(rescale: bool) -> (Container, Vec<BandMatrix>) {
        let container = five_band_container();
        let data = encoded(&container);
        let (parsed, offset) = parse_header(&data).unwrap();
        let bands = BandDecoder::new(&parsed, offset, &data)
            .unwrap()
            .decode_all(rescale)
            .unwrap();
        (parsed, bands)
    }

    fn georef(container: &Container) -> GeoReference {
        GeoReference::from_ipw(container.geo().unwrap(), None)
    }

    #[test]
    fn test_output_paths() {
        let job = RasterJob::new(vec![0, 1, 2], "out/in.0051", OutputMode::FilePerBand);
        assert_eq!(
            job.output_paths(),
            vec![
                PathBuf::from("out/in.0051.00.tif"),
                PathBuf::from("out/in.0051.01.tif"),
                PathBuf::from("out/in.0051.02.tif"),
            ]
        );

        let job = RasterJob::new(vec![1, 3, 4], "out/in.0051", OutputMode::SingleFile).with_extension("tiff");
        assert_eq!(job.output_paths(), vec![PathBuf::from("out/in.0051.tiff")]);

        let job = RasterJob::new((0..120).collect(), "x", OutputMode::FilePerBand);
        assert_eq!(job.output_paths()[7], PathBuf::from("x.007.tif"));
    }

    #[test]
    fn test_validate() {
        let job = RasterJob::new(vec![1, 5], "x", OutputMode::SingleFile);
        let err = job.validate(5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);

        assert!(RasterJob::new(vec![], "x", OutputMode::SingleFile).validate(5).is_err());
        assert!(RasterJob::new(vec![0], "x", OutputMode::SingleFile).with_extension("").validate(5).is_err());
        assert!(RasterJob::new(vec![4, 0], "x", OutputMode::SingleFile).validate(5).is_ok());
    }

    #[test]
    fn test_single_file_selection_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("tmp").join("in.0051");

        for rescale in [false, true] {
            let (container, bands) = decoded(rescale);
            let job = RasterJob::new(vec![1, 3, 4], &base, OutputMode::SingleFile);
            let written = RasterTranslator::default()
                .translate(&container, &bands, Some(&georef(&container)), &job)
                .unwrap();
            assert_eq!(written, vec![dir.path().join("tmp").join("in.0051.tif")]);

            let tiff = TiffImage::open(&written[0]).unwrap();
            assert_eq!(tiff.band_count(), 3);
            let expected_type = if rescale { DataType::F32 } else { DataType::U16 };
            assert_eq!(tiff.data_type().unwrap(), expected_type);

            for (plane, &band) in [1usize, 3, 4].iter().enumerate() {
                let expected: Vec<f64> = match bands[band].values() {
                    BandValues::Raw(v) => v.iter().map(|&x| x as f64).collect(),
                    BandValues::Physical(v) => v.iter().map(|&x| x as f32 as f64).collect(),
                };
                assert_eq!(tiff.plane(plane).unwrap(), expected, "band {}", band);
            }
            assert_eq!(tiff.georeference().unwrap(), Some(georef(&container)));
        }
    }

    #[test]
    fn test_file_per_band_types_and_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let (container, bands) = decoded(false);
        let job = RasterJob::new((0..5).collect(), dir.path().join("in.0051"), OutputMode::FilePerBand);
        let written = RasterTranslator::default()
            .translate(&container, &bands, Some(&georef(&container)), &job)
            .unwrap();
        assert_eq!(written.len(), 5);

        let types: Vec<DataType> = written
            .iter()
            .map(|p| TiffImage::open(p).unwrap().data_type().unwrap())
            .collect();
        assert_eq!(
            types,
            vec![DataType::U8, DataType::U16, DataType::U8, DataType::U16, DataType::U8]
        );
        let band4 = TiffImage::open(&written[4]).unwrap();
        assert_eq!(band4.nodata(), Some(255.0));
        assert_eq!(&band4.plane(0).unwrap()[..2], &[255.0, 227.0]);
        assert_eq!(TiffImage::open(&written[0]).unwrap().nodata(), None);
    }

    #[test]
    fn test_physical_nodata_pixels_match_tag() {
        let dir = tempfile::tempdir().unwrap();
        let (container, bands) = decoded(true);
        let job = RasterJob::new(vec![4], dir.path().join("in.0051"), OutputMode::FilePerBand);
        let written = RasterTranslator::default()
            .translate(&container, &bands, None, &job)
            .unwrap();

        let tiff = TiffImage::open(&written[0]).unwrap();
        assert_eq!(tiff.data_type().unwrap(), DataType::F32);
        assert_eq!(tiff.nodata(), Some(313.75));
        let plane = tiff.plane(0).unwrap();
        assert_eq!(Some(plane[0]), tiff.nodata());
        assert_eq!(plane[1], 306.75);
    }

    #[test]
    fn test_repeated_translation_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let (container, bands) = decoded(true);
        let job = RasterJob::new(vec![0, 2], dir.path().join("a"), OutputMode::SingleFile)
            .with_compression(Compression::Deflate);
        let translator = RasterTranslator::default();

        let first = translator.translate(&container, &bands, Some(&georef(&container)), &job).unwrap();
        let bytes_a = fs::read(&first[0]).unwrap();
        let second = translator.translate(&container, &bands, Some(&georef(&container)), &job).unwrap();
        let bytes_b = fs::read(&second[0]).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn test_out_of_range_band_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (container, bands) = decoded(false);
        let job = RasterJob::new(vec![0, 7], dir.path().join("out").join("x"), OutputMode::FilePerBand);

        let err = RasterTranslator::default()
            .translate(&container, &bands, None, &job)
            .unwrap_err();
        assert!(matches!(err, Error::BandOutOfRange { index: 7, band_count: 5 }));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_common_data_type() {
        let (_, raw) = decoded(false);
        let (_, physical) = decoded(true);
        assert_eq!(common_data_type(&[&raw[0], &raw[2]]), DataType::U8);
        assert_eq!(common_data_type(&[&raw[0], &raw[1]]), DataType::U16);
        assert_eq!(common_data_type(&[&raw[0], &physical[1]]), DataType::F32);
    }
}
