//! ipwkit - IPW raster decoding and GeoTIFF translation
//!
//! ipwkit reads IPW images (a text header followed by bit-packed bands),
//! converts raw codes to physical values through each band's linear map, and
//! writes the selected bands as GeoTIFF files.
//!
//! # Examples
//!
//! ## Decoding a file
//!
//! ```no_run
//! use ipwkit::IpwFile;
//!
//! let ipw = IpwFile::open("in.0051")?;
//! println!("{}", ipw.container());
//!
//! let band = ipw.decode_band(0, true)?;
//! if let Some(value) = band.get(10, 20) {
//!     println!("band 0 at (10, 20): {}", value);
//! }
//! # Ok::<(), ipwkit::Error>(())
//! ```
//!
//! ## Writing selected bands into one GeoTIFF
//!
//! ```no_run
//! use ipwkit::{GeoReference, IpwFile, OutputMode, RasterJob, RasterTranslator};
//!
//! let ipw = IpwFile::open("in.0051")?;
//! let container = ipw.container();
//! let job = RasterJob::new(vec![1, 3, 4], "out/in.0051", OutputMode::SingleFile);
//!
//! let bands = ipw.decoder()?.decode_bands(&job.bands, true)?;
//! let georef = container.geo().map(|g| GeoReference::from_ipw(g, Some("EPSG:32611")));
//!
//! let written = RasterTranslator::default().translate(container, &bands, georef.as_ref(), &job)?;
//! println!("wrote {:?}", written);
//! # Ok::<(), ipwkit::Error>(())
//! ```

pub mod io;
pub mod error;
pub mod types;
pub mod rescale;
pub mod formats;
pub mod compression;
pub mod translate;
pub mod archive;
pub mod batch;
pub mod config;

pub use error::{Error, ErrorKind, Result};
pub use types::{DataType, Dimensions};
pub use io::{ByteOrder, InputBuffer};
pub use rescale::{PhysRange, RawRange, Rescale};
pub use formats::ipw::{
    BandDecoder, BandMatrix, BandMetadata, BandValues, Container, GeoHeader,
    GlobalAttributes, IpwFile,
};
pub use formats::tiff::{GeoReference, TiffImage, TiffOptions, TiffWriter, TIFF_MAGIC};
pub use compression::Compression;
pub use translate::{OutputMode, RasterJob, RasterTranslator};
pub use archive::{ArchivePacker, ArchiveRecord, JsonPacker};
pub use batch::{BatchOptions, BatchReport, BatchRunner};
pub use config::{LogLevel, TranslateConfig};
