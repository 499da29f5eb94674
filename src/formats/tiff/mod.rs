//! GeoTIFF output support
//!
//! A deterministic strip writer plus a directory reader used to inspect
//! written files.

pub mod tags;
pub mod ifd;
pub mod geotiff;
pub mod writer;
pub mod reader;

pub use ifd::{IFD, IFDEntry};
pub use geotiff::GeoReference;
pub use writer::{RasterImage, Samples, TiffOptions, TiffWriter};
pub use reader::TiffImage;

/// TIFF magic number (42)
pub const TIFF_MAGIC: u16 = 42;

/// BigTIFF magic number (43)
pub const BIGTIFF_MAGIC: u16 = 43;
