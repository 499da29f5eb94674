//! GeoTIFF georeferencing
//!
//! A [`GeoReference`] is a six-coefficient affine transform in the usual
//! `[x0, dx, rx, y0, ry, dy]` order plus a free-form projection descriptor:
//!
//! ```text
//! x = x0 + col * dx + row * rx
//! y = y0 + col * ry + row * dy
//! ```

use std::fmt;
use crate::error::Result;
use crate::formats::ipw::GeoHeader;
use super::ifd::{IFDEntry, IFD};
use super::tags::{self, geo_keys};

/// Affine transform and projection of an output raster
#[derive(Debug, Clone, PartialEq)]
pub struct GeoReference {
    /// `[x0, dx, rx, y0, ry, dy]`
    pub transform: [f64; 6],
    /// Projection descriptor, `EPSG:<code>` or free text
    pub projection: String,
}

impl GeoReference {
    /// Creates a georeference
    pub fn new(transform: [f64; 6], projection: impl Into<String>) -> Self {
        Self {
            transform,
            projection: projection.into(),
        }
    }

    /// Builds the georeference of an IPW band
    ///
    /// `projection` overrides the header's `coord_sys_ID`.
    pub fn from_ipw(geo: &GeoHeader, projection: Option<&str>) -> Self {
        let projection = projection
            .map(str::to_string)
            .or_else(|| geo.coord_sys_id.clone())
            .unwrap_or_default();
        Self::new([geo.bsamp, geo.dsamp, 0.0, geo.bline, 0.0, geo.dline], projection)
    }

    /// Returns whether the transform has no rotation terms
    pub fn is_north_up(&self) -> bool {
        self.transform[2] == 0.0 && self.transform[4] == 0.0
    }

    /// ModelPixelScale values
    pub fn pixel_scale(&self) -> [f64; 3] {
        [self.transform[1], -self.transform[5], 0.0]
    }

    /// ModelTiepoint tying pixel (0, 0) to the origin
    pub fn tiepoint(&self) -> [f64; 6] {
        [0.0, 0.0, 0.0, self.transform[0], self.transform[3], 0.0]
    }

    /// ModelTransformation matrix, row major 4x4
    pub fn model_transformation(&self) -> [f64; 16] {
        let t = &self.transform;
        [
            t[1], t[2], 0.0, t[0],
            t[4], t[5], 0.0, t[3],
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }

    /// EPSG code of an `EPSG:<code>` descriptor
    pub fn epsg_code(&self) -> Option<u16> {
        let text = self.projection.trim();
        let (prefix, code) = text.split_once(':')?;
        if !prefix.eq_ignore_ascii_case("EPSG") {
            return None;
        }
        code.trim().parse().ok()
    }

    /// GeoKeyDirectory values plus the GeoAsciiParams text they reference
    pub fn geokey_directory(&self) -> (Vec<u16>, Option<String>) {
        let mut keys: Vec<[u16; 4]> = Vec::new();
        let mut ascii = None;

        match self.epsg_code() {
            Some(code) if (4000..5000).contains(&code) => {
                keys.push([geo_keys::MODEL_TYPE, 0, 1, geo_keys::MODEL_TYPE_GEOGRAPHIC]);
                keys.push([geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
                keys.push([geo_keys::GEOGRAPHIC_TYPE, 0, 1, code]);
            }
            Some(code) => {
                keys.push([geo_keys::MODEL_TYPE, 0, 1, geo_keys::MODEL_TYPE_PROJECTED]);
                keys.push([geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
                keys.push([geo_keys::PROJECTED_CS_TYPE, 0, 1, code]);
            }
            None => {
                keys.push([geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
                let text = self.projection.trim();
                if !text.is_empty() {
                    let citation = format!("{}|", text.replace('|', "/"));
                    keys.push([
                        geo_keys::CITATION,
                        tags::GEO_ASCII_PARAMS,
                        citation.len() as u16,
                        0,
                    ]);
                    ascii = Some(citation);
                }
            }
        }

        let mut directory = vec![1, 1, 0, keys.len() as u16];
        for key in keys {
            directory.extend_from_slice(&key);
        }
        (directory, ascii)
    }

    /// Adds the GeoTIFF entries describing this georeference
    pub fn write_entries(&self, ifd: &mut IFD) {
        let order = ifd.byte_order;
        if self.is_north_up() {
            ifd.add_entry(IFDEntry::doubles(tags::MODEL_PIXEL_SCALE, &self.pixel_scale(), order));
            ifd.add_entry(IFDEntry::doubles(tags::MODEL_TIEPOINT, &self.tiepoint(), order));
        } else {
            ifd.add_entry(IFDEntry::doubles(
                tags::MODEL_TRANSFORMATION,
                &self.model_transformation(),
                order,
            ));
        }

        let (directory, ascii) = self.geokey_directory();
        ifd.add_entry(IFDEntry::shorts(tags::GEO_KEY_DIRECTORY, &directory, order));
        if let Some(text) = ascii {
            ifd.add_entry(IFDEntry::ascii(tags::GEO_ASCII_PARAMS, &text));
        }
    }

    /// Reads the georeference back from an IFD
    pub fn from_ifd(ifd: &IFD) -> Result<Option<Self>> {
        let order = ifd.byte_order;
        let transform = if let Some(entry) = ifd.get_entry(tags::MODEL_TRANSFORMATION) {
            let m = entry.values_f64(order)?;
            if m.len() < 8 {
                return Ok(None);
            }
            [m[3], m[0], m[1], m[7], m[4], m[5]]
        } else {
            let (Some(scale), Some(tie)) = (
                ifd.get_entry(tags::MODEL_PIXEL_SCALE),
                ifd.get_entry(tags::MODEL_TIEPOINT),
            ) else {
                return Ok(None);
            };
            let scale = scale.values_f64(order)?;
            let tie = tie.values_f64(order)?;
            if scale.len() < 2 || tie.len() < 6 {
                return Ok(None);
            }
            [
                tie[3] - tie[0] * scale[0],
                scale[0],
                0.0,
                tie[4] + tie[1] * scale[1],
                0.0,
                -scale[1],
            ]
        };

        let mut projection = String::new();
        if let Some(keys) = ifd.get_tag_values(tags::GEO_KEY_DIRECTORY) {
            let count = keys.get(3).copied().unwrap_or(0) as usize;
            for key in keys.get(4..).unwrap_or(&[]).chunks(4).take(count) {
                if key.len() < 4 {
                    break;
                }
                match key[0] as u16 {
                    geo_keys::GEOGRAPHIC_TYPE | geo_keys::PROJECTED_CS_TYPE => {
                        projection = format!("EPSG:{}", key[3]);
                    }
                    geo_keys::CITATION if key[1] as u16 == tags::GEO_ASCII_PARAMS => {
                        let ascii = ifd
                            .get_entry(tags::GEO_ASCII_PARAMS)
                            .and_then(IFDEntry::ascii_value)
                            .unwrap_or_default();
                        let start = (key[3] as usize).min(ascii.len());
                        let end = (start + key[2] as usize).min(ascii.len());
                        projection = ascii.get(start..end).unwrap_or("").trim_end_matches('|').to_string();
                    }
                    _ => {}
                }
            }
        }

        Ok(Some(Self::new(transform, projection)))
    }

    /// Converts pixel coordinates to georeferenced coordinates
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let t = &self.transform;
        (t[0] + col * t[1] + row * t[2], t[3] + col * t[4] + row * t[5])
    }

    /// Computes the bounding box of a `rows x cols` raster
    ///
    /// Returns (min_x, min_y, max_x, max_y)
    pub fn bounding_box(&self, rows: usize, cols: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo(0.0, 0.0),
            self.pixel_to_geo(cols as f64, 0.0),
            self.pixel_to_geo(0.0, rows as f64),
            self.pixel_to_geo(cols as f64, rows as f64),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

impl fmt::Display for GeoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GeoTIFF Information:")?;
        if !self.projection.is_empty() {
            writeln!(f, "  Projection: {}", self.projection)?;
        }
        writeln!(f, "  Pixel Size: {} x {}", self.transform[1], self.transform[5])?;
        writeln!(f, "  Origin (geo): ({}, {})", self.transform[0], self.transform[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ByteOrder;

    fn utm_header() -> GeoHeader {
        GeoHeader {
            bline: 4_893_900.0,
            bsamp: 581_280.0,
            dline: -30.0,
            dsamp: 30.0,
            units: Some("meters".to_string()),
            coord_sys_id: Some("UTM".to_string()),
        }
    }

    #[test]
    fn test_from_ipw() {
        let geo = GeoReference::from_ipw(&utm_header(), None);
        assert_eq!(geo.transform, [581_280.0, 30.0, 0.0, 4_893_900.0, 0.0, -30.0]);
        assert_eq!(geo.projection, "UTM");
        assert!(geo.is_north_up());
        assert_eq!(geo.pixel_scale(), [30.0, 30.0, 0.0]);

        let geo = GeoReference::from_ipw(&utm_header(), Some("EPSG:32611"));
        assert_eq!(geo.epsg_code(), Some(32611));
    }

    #[test]
    fn test_geokeys_projected() {
        let geo = GeoReference::new([0.0, 1.0, 0.0, 0.0, 0.0, -1.0], "EPSG:32611");
        let (keys, ascii) = geo.geokey_directory();
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert_eq!(&keys[4..8], &[1024, 0, 1, 1]);
        assert_eq!(&keys[12..16], &[3072, 0, 1, 32611]);
        assert!(ascii.is_none());
    }

    #[test]
    fn test_geokeys_geographic() {
        let geo = GeoReference::new([0.0, 1.0, 0.0, 0.0, 0.0, -1.0], "epsg:4326");
        let (keys, _) = geo.geokey_directory();
        assert_eq!(&keys[4..8], &[1024, 0, 1, 2]);
        assert_eq!(&keys[12..16], &[2048, 0, 1, 4326]);
    }

    #[test]
    fn test_geokeys_citation() {
        let geo = GeoReference::new([0.0, 1.0, 0.0, 0.0, 0.0, -1.0], "UTM");
        let (keys, ascii) = geo.geokey_directory();
        assert_eq!(&keys[..4], &[1, 1, 0, 2]);
        assert_eq!(&keys[8..12], &[1026, tags::GEO_ASCII_PARAMS, 4, 0]);
        assert_eq!(ascii.as_deref(), Some("UTM|"));
    }

    #[test]
    fn test_ifd_round_trip() {
        for projection in ["EPSG:26911", "UTM", ""] {
            for transform in [
                [581_280.0, 30.0, 0.0, 4_893_900.0, 0.0, -30.0],
                [100.0, 2.0, 0.5, 200.0, 0.25, -2.0],
            ] {
                let geo = GeoReference::new(transform, projection);
                let mut ifd = IFD::new(ByteOrder::LittleEndian);
                geo.write_entries(&mut ifd);
                assert!(ifd.is_geotiff());
                assert_eq!(GeoReference::from_ifd(&ifd).unwrap(), Some(geo));
            }
        }
    }

    #[test]
    fn test_pixel_to_geo_and_bounds() {
        let geo = GeoReference::from_ipw(&utm_header(), None);
        assert_eq!(geo.pixel_to_geo(1.0, 2.0), (581_310.0, 4_893_840.0));
        let (min_x, min_y, max_x, max_y) = geo.bounding_box(4, 3);
        assert_eq!((min_x, max_x), (581_280.0, 581_370.0));
        assert_eq!((min_y, max_y), (4_893_780.0, 4_893_900.0));
    }

    #[test]
    fn test_missing_georeference() {
        let ifd = IFD::new(ByteOrder::BigEndian);
        assert_eq!(GeoReference::from_ifd(&ifd).unwrap(), None);
    }
}
