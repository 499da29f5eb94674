//! Input buffers for whole-file decoding
//!
//! An IPW file is decoded from one contiguous, read-only byte buffer. Large
//! inputs are memory mapped; small inputs or platforms without mapping read
//! the file into memory.

use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;
use memmap2::Mmap;
use crate::error::Result;

/// Read-only bytes of one input file
pub enum InputBuffer {
    /// Memory mapped file contents
    Mapped(Mmap),
    /// Contents read into memory
    Owned(Vec<u8>),
}

impl InputBuffer {
    /// Opens a file, memory mapping it when `use_mmap` is set
    pub fn open<P: AsRef<Path>>(path: P, use_mmap: bool) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;

        if use_mmap && file.metadata()?.len() > 0 {
            // SAFETY: the mapping is read-only and inputs are not modified while mapped.
            let mmap = unsafe { Mmap::map(&file)? };

            #[cfg(unix)]
            unsafe {
                libc::madvise(
                    mmap.as_ptr() as *mut libc::c_void,
                    mmap.len(),
                    libc::MADV_SEQUENTIAL,
                );
            }

            return Ok(InputBuffer::Mapped(mmap));
        }

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(InputBuffer::Owned(bytes))
    }

    /// Wraps bytes already in memory
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        InputBuffer::Owned(bytes)
    }

    /// Returns whether the buffer is memory mapped
    pub fn is_mapped(&self) -> bool {
        matches!(self, InputBuffer::Mapped(_))
    }
}

impl Deref for InputBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            InputBuffer::Mapped(mmap) => mmap,
            InputBuffer::Owned(bytes) => bytes,
        }
    }
}

impl AsRef<[u8]> for InputBuffer {
    fn as_ref(&self) -> &[u8] {
        self
    }
}
