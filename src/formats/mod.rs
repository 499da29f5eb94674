//! File format support

pub mod ipw;
pub mod tiff;
