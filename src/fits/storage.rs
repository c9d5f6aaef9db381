use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{FitsError, Result};

// ---------------------------------------------------------------------------
// Storage – the decoded container bytes, shared by every view
// ---------------------------------------------------------------------------

enum Backing {
    /// Read-only mapping of an uncompressed regular file.
    Mapped(Mmap),
    /// Bytes produced by decompression or handed over by the caller.
    Decoded(Vec<u8>),
}

/// Reference-counted handle to the bytes of one decoded container.
///
/// Cloning is cheap and never copies the buffer. Every segment, component and
/// dataset derived from a container holds a clone, so the bytes stay alive
/// until the last of them is dropped.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<Backing>,
}

impl Storage {
    /// Map a regular file read-only.
    pub fn map_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| FitsError::io(path, e))?;
        let len = file.metadata().map_err(|e| FitsError::io(path, e))?.len();
        // Zero-length mappings are rejected on some platforms.
        if len == 0 {
            return Ok(Self::from_vec(Vec::new()));
        }
        // SAFETY: the mapping is read-only; callers must not truncate the file
        // while datasets derived from it are alive.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| FitsError::io(path, e))?;
        Ok(Storage {
            inner: Arc::new(Backing::Mapped(mmap)),
        })
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Storage {
            inner: Arc::new(Backing::Decoded(bytes)),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self.inner.as_ref() {
            Backing::Mapped(m) => m,
            Backing::Decoded(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the bytes come straight from a file mapping.
    pub fn is_mapped(&self) -> bool {
        matches!(self.inner.as_ref(), Backing::Mapped(_))
    }

    /// Number of live handles (container, segments, views) sharing the buffer.
    pub fn holder_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether two handles refer to the very same buffer.
    pub fn same_buffer(&self, other: &Storage) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Borrow `len` bytes at `offset`, or `None` if the range is out of bounds.
    pub fn range(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.bytes().get(offset..end)
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .field("holders", &self.holder_count())
            .finish()
    }
}
