//! Linear rescaling between stored integer codes and physical values
//!
//! A band maps its raw code range `[raw_min, raw_max]` linearly onto the
//! physical values `[phys_min, phys_max]`:
//!
//! ```text
//! slope     = (phys_max - phys_min) / (raw_max - raw_min)
//! intercept = phys_min - slope * raw_min
//! physical  = raw * slope + intercept
//! ```
//!
//! When `raw_min == raw_max` the mapping collapses to the constant `phys_min`.
//!
//! # Examples
//!
//! ```
//! use ipwkit::rescale::{to_physical, to_raw, PhysRange, RawRange};
//!
//! let raw = RawRange::new(0, 255);
//! let phys = PhysRange::new(-20.0, 20.0);
//!
//! let value = to_physical(255, raw, phys);
//! assert_eq!(value, 20.0);
//! assert_eq!(to_raw(value, raw, phys)?, 255);
//! # Ok::<(), ipwkit::Error>(())
//! ```

use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// Inclusive range of stored integer codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRange {
    pub min: i64,
    pub max: i64,
}

impl RawRange {
    /// Creates a raw range
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Returns whether the range holds a single code
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }

    /// Returns whether `value` lies within the range
    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Physical values at the two ends of a raw range
///
/// `min` is the value at `raw_min` and `max` the value at `raw_max`; a
/// decreasing mapping has `min > max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysRange {
    pub min: f64,
    pub max: f64,
}

impl PhysRange {
    /// Creates a physical range
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Precomputed linear map for one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    raw: RawRange,
    phys: PhysRange,
    slope: f64,
    intercept: f64,
}

impl Rescale {
    /// Builds the map, rejecting inverted raw ranges and non-finite bounds
    pub fn new(raw: RawRange, phys: PhysRange) -> Result<Self> {
        if raw.min > raw.max {
            return Err(Error::InvalidValue(format!(
                "raw range [{}, {}] is inverted",
                raw.min, raw.max
            )));
        }
        if !phys.min.is_finite() || !phys.max.is_finite() {
            return Err(Error::InvalidValue(format!(
                "physical range [{}, {}] is not finite",
                phys.min, phys.max
            )));
        }

        let (slope, intercept) = if raw.is_degenerate() {
            (0.0, phys.min)
        } else {
            let slope = (phys.max - phys.min) / (raw.max - raw.min) as f64;
            (slope, phys.min - slope * raw.min as f64)
        };

        Ok(Self {
            raw,
            phys,
            slope,
            intercept,
        })
    }

    /// Returns the raw range
    pub fn raw_range(&self) -> RawRange {
        self.raw
    }

    /// Returns the physical range
    pub fn phys_range(&self) -> PhysRange {
        self.phys
    }

    /// Returns the slope of the map
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Returns the intercept of the map
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Maps a raw code to its physical value
    pub fn to_physical(&self, raw: i64) -> f64 {
        if self.raw.is_degenerate() {
            return self.phys.min;
        }
        raw as f64 * self.slope + self.intercept
    }

    /// Maps a physical value to the nearest raw code within the raw range
    pub fn to_raw(&self, physical: f64) -> Result<i64> {
        Ok(self.to_code(physical)?.clamp(self.raw.min, self.raw.max))
    }

    /// Maps a physical value to the nearest code on the line, past the raw
    /// range if need be
    ///
    /// Codes outside the lq map range but within a band's bit width decode to
    /// values beyond the physical range; this recovers them.
    pub fn to_code(&self, physical: f64) -> Result<i64> {
        if !physical.is_finite() {
            return Err(Error::InvalidValue(format!(
                "cannot quantize non-finite value {}",
                physical
            )));
        }
        if self.raw.is_degenerate() {
            return Ok(self.raw.min);
        }
        if self.slope == 0.0 {
            return Err(Error::InvalidValue(format!(
                "physical range [{}, {}] is constant over raw range [{}, {}]; inverse undefined",
                self.phys.min, self.phys.max, self.raw.min, self.raw.max
            )));
        }

        Ok(((physical - self.intercept) / self.slope).round() as i64)
    }
}

/// Maps a raw code to its physical value
///
/// Returns `phys_range.min` for every input when the raw range is degenerate.
pub fn to_physical(raw: i64, raw_range: RawRange, phys_range: PhysRange) -> f64 {
    if raw_range.is_degenerate() {
        return phys_range.min;
    }
    let slope = (phys_range.max - phys_range.min) / (raw_range.max - raw_range.min) as f64;
    let intercept = phys_range.min - slope * raw_range.min as f64;
    raw as f64 * slope + intercept
}

/// Maps a physical value to the nearest raw code, clamped to `raw_range`
pub fn to_raw(physical: f64, raw_range: RawRange, phys_range: PhysRange) -> Result<i64> {
    Rescale::new(raw_range, phys_range)?.to_raw(physical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let raw = RawRange::new(0, 255);
        let phys = PhysRange::new(-20.0, 20.0);
        assert_eq!(to_physical(0, raw, phys), -20.0);
        assert_eq!(to_physical(255, raw, phys), 20.0);
    }

    #[test]
    fn test_round_trip_every_code() {
        let cases = [
            (RawRange::new(0, 255), PhysRange::new(-20.0, 20.0)),
            (RawRange::new(0, 65535), PhysRange::new(0.0, 1000.0)),
            (RawRange::new(-128, 127), PhysRange::new(1.5, -3.25)),
            (RawRange::new(10, 13), PhysRange::new(273.15, 373.15)),
            (RawRange::new(0, 4095), PhysRange::new(0.0, 0.001)),
        ];

        for (raw, phys) in cases {
            let map = Rescale::new(raw, phys).unwrap();
            for r in raw.min..=raw.max {
                let p = to_physical(r, raw, phys);
                assert_eq!(map.to_physical(r), p);
                assert_eq!(to_raw(p, raw, phys).unwrap(), r, "raw {} in {:?}", r, raw);
            }
        }
    }

    #[test]
    fn test_degenerate_raw_range_is_constant() {
        let raw = RawRange::new(7, 7);
        let phys = PhysRange::new(3.5, 9.0);
        for r in [-100, 0, 7, 8, 1_000_000] {
            assert_eq!(to_physical(r, raw, phys), 3.5);
        }
        assert_eq!(to_raw(3.5, raw, phys).unwrap(), 7);
        assert_eq!(to_raw(-50.0, raw, phys).unwrap(), 7);
    }

    #[test]
    fn test_to_raw_rounds_and_clamps() {
        let raw = RawRange::new(0, 10);
        let phys = PhysRange::new(0.0, 100.0);
        assert_eq!(to_raw(14.9, raw, phys).unwrap(), 1);
        assert_eq!(to_raw(15.1, raw, phys).unwrap(), 2);
        assert_eq!(to_raw(-40.0, raw, phys).unwrap(), 0);
        assert_eq!(to_raw(1e9, raw, phys).unwrap(), 10);
    }

    #[test]
    fn test_constant_physical_range_has_no_inverse() {
        let raw = RawRange::new(0, 255);
        let phys = PhysRange::new(5.0, 5.0);
        assert_eq!(to_physical(100, raw, phys), 5.0);
        let err = to_raw(5.0, raw, phys).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Value);
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let raw = RawRange::new(0, 255);
        let phys = PhysRange::new(0.0, 1.0);
        assert!(to_raw(f64::NAN, raw, phys).is_err());
        assert!(to_raw(f64::INFINITY, raw, phys).is_err());
    }

    #[test]
    fn test_inverted_raw_range_rejected() {
        let result = Rescale::new(RawRange::new(10, 0), PhysRange::new(0.0, 1.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_slope_and_intercept() {
        let map = Rescale::new(RawRange::new(10, 20), PhysRange::new(100.0, 200.0)).unwrap();
        assert_eq!(map.slope(), 10.0);
        assert_eq!(map.intercept(), 0.0);
        assert_eq!(map.to_physical(15), 150.0);
    }

    #[test]
    fn test_to_code_extrapolates() {
        let map = Rescale::new(RawRange::new(0, 200), PhysRange::new(250.0, 300.0)).unwrap();
        assert_eq!(map.to_code(map.to_physical(255)).unwrap(), 255);
        assert_eq!(map.to_code(map.to_physical(230)).unwrap(), 230);
        assert_eq!(map.to_raw(map.to_physical(255)).unwrap(), 200);
        assert!(map.to_code(f64::NAN).is_err());
    }
}
