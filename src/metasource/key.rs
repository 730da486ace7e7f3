//! Cache keys for decompiled assemblies.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use sha1::{Digest, Sha1};
use uguid::Guid;

/// Identifies one physical assembly image: its file path plus the version id of its
/// manifest module.
///
/// Two keys are equal only if both parts match exactly, so rebuilding an assembly in
/// place yields a new key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyKey {
    file_path: PathBuf,
    mvid: Guid,
}

impl AssemblyKey {
    /// Creates a key from the file path and module version id of an assembly.
    #[must_use]
    pub fn new(file_path: impl Into<PathBuf>, mvid: Guid) -> Self {
        AssemblyKey {
            file_path: file_path.into(),
            mvid,
        }
    }

    /// Path of the assembly file.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Module version id of the manifest module.
    #[must_use]
    pub fn mvid(&self) -> Guid {
        self.mvid
    }

    /// A stable directory name for the generated project of this key.
    ///
    /// The name is the hex encoded SHA-1 of path and version id, shortened to 16
    /// characters.
    #[must_use]
    pub fn directory_name(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.file_path.to_string_lossy().as_bytes());
        hasher.update(self.mvid.to_bytes());
        let digest = hasher.finalize();

        digest
            .iter()
            .take(8)
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

impl fmt::Display for AssemblyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.file_path.display(), self.mvid)
    }
}
