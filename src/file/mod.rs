//! Binary image handles for assemblies and their satellite modules.
//!
//! A [`BinaryImage`] is the loadable handle the assembly resolver hands back and the
//! [`crate::metadata::module::ModuleReader`] consumes. Images are either memory-mapped from disk
//! or held entirely in memory, depending on the requested [`PrefetchMode`]:
//!
//! - [`PrefetchMode::Metadata`] maps the file lazily; used for referenced assemblies where
//!   only metadata is read.
//! - [`PrefetchMode::EntireImage`] reads the whole file up front and releases the file
//!   handle; used for the assembly being decompiled.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsource::file::{BinaryImage, PrefetchMode};
//!
//! let image = BinaryImage::from_file("MyLib.dll", PrefetchMode::Metadata)?;
//! assert!(image.is_pe());
//! println!("{} bytes from {:?}", image.len(), image.path());
//! # Ok::<(), dotsource::Error>(())
//! ```

mod physical;

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    Error::{Empty, OutOfBounds},
    Result,
};
use physical::Physical;

/// Source of image bytes.
///
/// Images are shared between decompilation workers, so backends must be thread-safe.
pub trait Backend: Send + Sync {
    /// Returns the complete data.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data.
    fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data().get(offset..end))
            .ok_or(OutOfBounds)
    }
}

impl Backend for Vec<u8> {
    fn data(&self) -> &[u8] {
        self.as_slice()
    }
}

/// How much of an image is loaded when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchMode {
    /// Map the file and read pages on demand.
    Metadata,
    /// Read the entire file into memory and close it.
    EntireImage,
}

/// A loaded binary image (an assembly or a module of a multi-module assembly).
pub struct BinaryImage {
    path: Option<PathBuf>,
    prefetch: PrefetchMode,
    backend: Box<dyn Backend>,
}

impl BinaryImage {
    /// Opens an image from disk.
    ///
    /// # Arguments
    /// * `path` - Location of the image
    /// * `prefetch` - Whether to map lazily or read the whole file
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or read and
    /// [`crate::Error::Empty`] for empty files.
    pub fn from_file(path: impl AsRef<Path>, prefetch: PrefetchMode) -> Result<BinaryImage> {
        let path = path.as_ref();
        let backend: Box<dyn Backend> = match prefetch {
            PrefetchMode::Metadata => Box::new(Physical::new(path)?),
            PrefetchMode::EntireImage => Box::new(std::fs::read(path)?),
        };

        if backend.len() == 0 {
            return Err(Empty);
        }

        Ok(BinaryImage {
            path: Some(path.to_path_buf()),
            prefetch,
            backend,
        })
    }

    /// Wraps an image that is already loaded in memory.
    ///
    /// # Arguments
    /// * `data` - The image bytes
    /// * `path` - The location the image was originally loaded from, if any
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>, path: Option<PathBuf>) -> Result<BinaryImage> {
        if data.is_empty() {
            return Err(Empty);
        }

        Ok(BinaryImage {
            path,
            prefetch: PrefetchMode::EntireImage,
            backend: Box::new(data),
        })
    }

    /// The location on disk, if the image came from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The file name component of [`BinaryImage::path`].
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
    }

    /// The prefetch mode the image was opened with.
    #[must_use]
    pub fn prefetch(&self) -> PrefetchMode {
        self.prefetch
    }

    /// The complete image data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.backend.data()
    }

    /// A bounds-checked slice of the image.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.backend.data_slice(offset, len)
    }

    /// Size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// Returns `true` if the image holds no data. Never the case for opened images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backend.len() == 0
    }

    /// Returns `true` if the image starts with the DOS `MZ` signature.
    #[must_use]
    pub fn is_pe(&self) -> bool {
        matches!(self.data_slice(0, 2), Ok(b"MZ"))
    }
}

impl fmt::Debug for BinaryImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryImage")
            .field("path", &self.path)
            .field("prefetch", &self.prefetch)
            .field("len", &self.len())
            .finish()
    }
}
