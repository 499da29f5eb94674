//! Core data types for ipwkit

/// Represents output pixel data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// 32-bit floating point
    F32,
}

impl DataType {
    /// Returns the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
        }
    }

    /// Returns the name of this data type
    pub fn name(&self) -> &'static str {
        match self {
            DataType::U8 => "U8",
            DataType::U16 => "U16",
            DataType::U32 => "U32",
            DataType::I8 => "I8",
            DataType::I16 => "I16",
            DataType::I32 => "I32",
            DataType::F32 => "F32",
        }
    }

    /// Returns whether this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32)
    }

    /// Returns whether this is a signed integer type
    pub fn is_signed(&self) -> bool {
        matches!(self, DataType::I8 | DataType::I16 | DataType::I32)
    }

    /// Returns the narrowest integer type holding every value in `[min, max]`
    pub fn for_raw_range(min: i64, max: i64) -> Option<Self> {
        if min >= 0 {
            match max {
                m if m <= u8::MAX as i64 => Some(DataType::U8),
                m if m <= u16::MAX as i64 => Some(DataType::U16),
                m if m <= u32::MAX as i64 => Some(DataType::U32),
                _ => None,
            }
        } else if min >= i8::MIN as i64 && max <= i8::MAX as i64 {
            Some(DataType::I8)
        } else if min >= i16::MIN as i64 && max <= i16::MAX as i64 {
            Some(DataType::I16)
        } else if min >= i32::MIN as i64 && max <= i32::MAX as i64 {
            Some(DataType::I32)
        } else {
            None
        }
    }

    /// Inclusive value range of an integer type
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            DataType::U8 => Some((0, u8::MAX as i64)),
            DataType::U16 => Some((0, u16::MAX as i64)),
            DataType::U32 => Some((0, u32::MAX as i64)),
            DataType::I8 => Some((i8::MIN as i64, i8::MAX as i64)),
            DataType::I16 => Some((i16::MIN as i64, i16::MAX as i64)),
            DataType::I32 => Some((i32::MIN as i64, i32::MAX as i64)),
            DataType::F32 => None,
        }
    }

    /// Returns the narrowest type that holds every value of both types
    pub fn promote(self, other: DataType) -> DataType {
        if self == other {
            return self;
        }
        match (self.integer_range(), other.integer_range()) {
            (Some((a_min, a_max)), Some((b_min, b_max))) => {
                DataType::for_raw_range(a_min.min(b_min), a_max.max(b_max))
                    .unwrap_or(DataType::F32)
            }
            _ => DataType::F32,
        }
    }
}

/// Represents raster dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// Number of lines (rows)
    pub rows: usize,
    /// Number of samples per line (columns)
    pub cols: usize,
}

impl Dimensions {
    /// Creates new dimensions
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Returns the total number of pixels, `None` if it overflows `usize`
    pub fn pixel_count(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_size() {
        assert_eq!(DataType::U8.size(), 1);
        assert_eq!(DataType::U16.size(), 2);
        assert_eq!(DataType::U32.size(), 4);
        assert_eq!(DataType::F32.size(), 4);
    }

    #[test]
    fn test_data_type_name() {
        assert_eq!(DataType::U8.name(), "U8");
        assert_eq!(DataType::F32.name(), "F32");
    }

    #[test]
    fn test_for_raw_range() {
        assert_eq!(DataType::for_raw_range(0, 255), Some(DataType::U8));
        assert_eq!(DataType::for_raw_range(0, 256), Some(DataType::U16));
        assert_eq!(DataType::for_raw_range(0, 70_000), Some(DataType::U32));
        assert_eq!(DataType::for_raw_range(-1, 100), Some(DataType::I8));
        assert_eq!(DataType::for_raw_range(-1, 200), Some(DataType::I16));
        assert_eq!(DataType::for_raw_range(-40_000, 0), Some(DataType::I32));
        assert_eq!(DataType::for_raw_range(0, 1 << 40), None);
    }

    #[test]
    fn test_promote() {
        assert_eq!(DataType::U8.promote(DataType::U16), DataType::U16);
        assert_eq!(DataType::U8.promote(DataType::I8), DataType::I16);
        assert_eq!(DataType::U16.promote(DataType::F32), DataType::F32);
        assert_eq!(DataType::U32.promote(DataType::I8), DataType::F32);
    }

    #[test]
    fn test_dimensions() {
        let dims = Dimensions::new(100, 200);
        assert_eq!(dims.rows, 100);
        assert_eq!(dims.cols, 200);
        assert_eq!(dims.pixel_count(), Some(20000));
        assert_eq!(Dimensions::new(usize::MAX, 2).pixel_count(), None);
    }
}
