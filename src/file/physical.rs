//! Memory-mapped images.
//!
//! Referenced assemblies are only consulted for a handful of type names, so their files
//! are mapped read-only and pages are loaded when metadata reads touch them.

use std::{fs, path::Path};

use memmap2::Mmap;

use super::Backend;
use crate::{Error, Result};

/// A read-only mapping of an image on disk.
#[derive(Debug)]
pub struct Physical {
    map: Mmap,
}

impl Physical {
    /// Maps the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Error`] if it cannot be mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let path = path.as_ref();
        let file = fs::File::open(path)?;

        // The mapping is only read and lives no longer than the image.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|error| Error::Error(format!("Failed to map '{}': {error}", path.display())))?;

        Ok(Physical { map })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_slices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        fs::write(&path, [0x4D, 0x5A, 0x90, 0x00, 0x03]).unwrap();

        let physical = Physical::new(&path).unwrap();
        assert_eq!(physical.len(), 5);
        assert_eq!(physical.data_slice(0, 2).unwrap(), b"MZ");
        assert!(physical.data_slice(5, 0).unwrap().is_empty());
        assert!(matches!(physical.data_slice(4, 2), Err(Error::OutOfBounds)));
    }

    #[test]
    fn test_missing_file() {
        match Physical::new("/nonexistent/path/to/file.dll") {
            Err(Error::FileError(error)) => assert_eq!(error.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected FileError, got {other:?}"),
        }
    }
}
