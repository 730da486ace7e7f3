//! The index of generated files and their materialization on disk.
//!
//! Every document of a generated project is registered in a [`GeneratedFileIndex`]
//! under its absolute path, compared without regard to case. The text of a document
//! stays in memory until the document is first needed, at which point it is written
//! to disk once and marked read-only. An existing file is never overwritten: the
//! existence check is the only synchronization between concurrent writers of the
//! same file, and creating the file with `create_new` makes the check race-free.

use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    decompiler::SymbolLocation,
    metadata::symbol::SymbolKey,
    metasource::{
        key::AssemblyKey,
        workspace::{DocumentId, ProjectId},
    },
    Result,
};

/// Pause between attempts to create a missing directory.
const RETRY_DELAY: Duration = Duration::from_millis(20);

/// A registered generated file.
#[derive(Debug, Clone)]
pub struct GeneratedFileRecord {
    path: PathBuf,
    key: AssemblyKey,
    document: DocumentId,
    signatures_only: bool,
    text: Arc<str>,
    symbols: Arc<BTreeMap<SymbolKey, SymbolLocation>>,
}

impl GeneratedFileRecord {
    /// Creates a record for the document `document` at `path`.
    #[must_use]
    pub fn new(
        path: PathBuf,
        key: AssemblyKey,
        document: DocumentId,
        signatures_only: bool,
        text: impl Into<Arc<str>>,
        symbols: BTreeMap<SymbolKey, SymbolLocation>,
    ) -> Self {
        GeneratedFileRecord {
            path,
            key,
            document,
            signatures_only,
            text: text.into(),
            symbols: Arc::new(symbols),
        }
    }

    /// Absolute path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The project the file belongs to.
    #[must_use]
    pub fn project(&self) -> ProjectId {
        self.document.project
    }

    /// The key of the assembly the file was generated from.
    #[must_use]
    pub fn key(&self) -> &AssemblyKey {
        &self.key
    }

    /// The document id of the file.
    #[must_use]
    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// Returns `true` if the file only contains signatures.
    #[must_use]
    pub fn is_signatures_only(&self) -> bool {
        self.signatures_only
    }

    /// The generated text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Declaration locations recorded while rendering.
    #[must_use]
    pub fn symbols(&self) -> &BTreeMap<SymbolKey, SymbolLocation> {
        &self.symbols
    }

    /// Where to navigate for `symbol`.
    ///
    /// Falls back to the containing type, then to the outermost type, then to the start
    /// of the file.
    #[must_use]
    pub fn location_of(&self, symbol: &SymbolKey) -> SymbolLocation {
        [
            symbol.clone(),
            symbol.containing_type(),
            symbol.top_level_type(),
        ]
        .iter()
        .find_map(|key| self.symbols.get(key).copied())
        .unwrap_or_default()
    }

    /// Writes the file unless it already exists.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be written.
    pub fn materialize(&self, directory_timeout: Duration) -> Result<bool> {
        write_read_only(&self.path, &self.text, directory_timeout)
    }
}

/// Concurrent index of generated files by absolute path, ignoring case.
///
/// Cloning the index is cheap and yields a handle to the same records, so readers can
/// keep one while the provider registers and removes files.
#[derive(Debug, Clone)]
pub struct GeneratedFileIndex {
    records: Arc<DashMap<String, GeneratedFileRecord>>,
    directory_timeout: Duration,
}

impl Default for GeneratedFileIndex {
    fn default() -> Self {
        GeneratedFileIndex::new(Duration::from_secs(5))
    }
}

fn index_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

impl GeneratedFileIndex {
    /// Creates an empty index; `directory_timeout` bounds the retries of directory
    /// creation during materialization.
    #[must_use]
    pub fn new(directory_timeout: Duration) -> Self {
        GeneratedFileIndex {
            records: Arc::new(DashMap::new()),
            directory_timeout,
        }
    }

    /// Registers a record. Returns `false` and keeps the existing record if the path
    /// is already registered.
    pub fn register(&self, record: GeneratedFileRecord) -> bool {
        match self.records.entry(index_key(&record.path)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(record);
                true
            }
        }
    }

    /// Looks up the record of `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<GeneratedFileRecord> {
        self.records
            .get(&index_key(path))
            .map(|record| record.value().clone())
    }

    /// Returns `true` if `path` is registered.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(&index_key(path))
    }

    /// The project a generated file belongs to.
    #[must_use]
    pub fn project_for(&self, path: &Path) -> Option<ProjectId> {
        self.records
            .get(&index_key(path))
            .map(|record| record.project())
    }

    /// Paths of all files of `project`, sorted.
    #[must_use]
    pub fn paths_of(&self, project: ProjectId) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .records
            .iter()
            .filter(|record| record.project() == project)
            .map(|record| record.path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Removes every record of `project` and returns them.
    pub fn remove_project(&self, project: ProjectId) -> Vec<GeneratedFileRecord> {
        let keys: Vec<String> = self
            .records
            .iter()
            .filter(|entry| entry.value().project() == project)
            .map(|entry| entry.key().clone())
            .collect();

        keys.iter()
            .filter_map(|key| self.records.remove(key).map(|(_, record)| record))
            .collect()
    }

    /// Removes all records.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Number of registered files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no file is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes a registered file to disk if it is not there yet.
    ///
    /// Returns `true` if this call wrote the file; unknown paths are ignored.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be written.
    pub fn ensure_on_disk(&self, path: &Path) -> Result<bool> {
        match self.get(path) {
            Some(record) => record.materialize(self.directory_timeout),
            None => Ok(false),
        }
    }

    /// The directory creation timeout used for materialization.
    #[must_use]
    pub fn directory_timeout(&self) -> Duration {
        self.directory_timeout
    }
}

/// Writes `text` to a new file at `path` and marks it read-only.
///
/// Returns `false` without touching the file system further if the file exists, or if
/// its directory could not be created within `timeout`.
pub(crate) fn write_read_only(path: &Path, text: &str, timeout: Duration) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(directory) = path.parent() {
        let started = Instant::now();
        let mut first_attempt = true;
        while !directory.is_dir() {
            if started.elapsed() > timeout {
                log::warn!(
                    "Giving up on creating '{}', skipping '{}'",
                    directory.display(),
                    path.display()
                );
                return Ok(false);
            }

            if first_attempt {
                first_attempt = false;
            } else {
                thread::sleep(RETRY_DELAY);
            }
            if let Err(error) = fs::create_dir_all(directory) {
                log::debug!("Failed to create '{}': {error}", directory.display());
            }
        }
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(error) => return Err(error.into()),
    };
    file.write_all(text.as_bytes())?;
    drop(file);

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(true);
    fs::set_permissions(path, permissions)?;

    log::debug!("Wrote '{}'", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uguid::Guid;

    fn record(path: PathBuf, project: u32, index: u32) -> GeneratedFileRecord {
        let key: SymbolKey = "T:Ns.Widget".parse().unwrap();
        let mut symbols = BTreeMap::new();
        symbols.insert(key, SymbolLocation { line: 2, column: 14 });
        GeneratedFileRecord::new(
            path,
            AssemblyKey::new("/lib/Foo.dll", Guid::ZERO),
            DocumentId {
                project: ProjectId(project),
                index,
            },
            false,
            "namespace Ns\n{\n\tpublic class Widget\n\t{\n\t}\n}\n",
            symbols,
        )
    }

    #[test]
    fn test_register_and_lookup_ignore_case() {
        let index = GeneratedFileIndex::default();
        let path = PathBuf::from("/tmp/Foo/Ns/Widget.cs");
        assert!(index.register(record(path.clone(), 1, 0)));
        assert!(!index.register(record(path.clone(), 2, 0)));

        let found = index.get(Path::new("/TMP/foo/ns/widget.CS")).unwrap();
        assert_eq!(found.project(), ProjectId(1));
        assert_eq!(index.project_for(&path), Some(ProjectId(1)));
        assert!(index.contains(&path));
        assert!(!index.contains(Path::new("/tmp/Foo/Ns/Other.cs")));
    }

    #[test]
    fn test_location_fallbacks() {
        let record = record(PathBuf::from("/tmp/Widget.cs"), 1, 0);
        let widget: SymbolKey = "T:Ns.Widget".parse().unwrap();
        let member: SymbolKey = "M:Ns.Widget.Missing".parse().unwrap();
        let nested: SymbolKey = "T:Ns.Widget+Hidden".parse().unwrap();
        let other: SymbolKey = "T:Other.Type".parse().unwrap();

        let expected = SymbolLocation { line: 2, column: 14 };
        assert_eq!(record.location_of(&widget), expected);
        assert_eq!(record.location_of(&member), expected);
        assert_eq!(record.location_of(&nested), expected);
        assert_eq!(record.location_of(&other), SymbolLocation::default());
    }

    #[test]
    fn test_remove_project() {
        let index = GeneratedFileIndex::default();
        index.register(record(PathBuf::from("/tmp/a/A.cs"), 1, 0));
        index.register(record(PathBuf::from("/tmp/a/B.cs"), 1, 1));
        index.register(record(PathBuf::from("/tmp/b/A.cs"), 2, 0));

        assert_eq!(
            index.paths_of(ProjectId(1)),
            vec![PathBuf::from("/tmp/a/A.cs"), PathBuf::from("/tmp/a/B.cs")]
        );
        let removed = index.remove_project(ProjectId(1));
        assert_eq!(removed.len(), 2);
        assert_eq!(index.len(), 1);
        assert!(index.paths_of(ProjectId(1)).is_empty());

        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn test_materialize_once_read_only() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("Ns").join("Deep").join("Widget.cs");
        let index = GeneratedFileIndex::default();
        index.register(record(path.clone(), 1, 0));

        assert!(index.ensure_on_disk(&path).unwrap());
        assert!(!index.ensure_on_disk(&path).unwrap());
        assert!(fs::metadata(&path).unwrap().permissions().readonly());
        assert!(fs::read_to_string(&path).unwrap().contains("public class Widget"));

        assert!(!index.ensure_on_disk(&root.path().join("Unknown.cs")).unwrap());
    }

    #[test]
    fn test_existing_file_is_not_overwritten() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("Widget.cs");
        fs::write(&path, "edited").unwrap();

        assert!(!write_read_only(&path, "generated", Duration::from_secs(1)).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "edited");
    }

    #[test]
    fn test_concurrent_materialization_writes_once() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("Ns").join("Widget.cs");
        let index = GeneratedFileIndex::default();
        index.register(record(path.clone(), 1, 0));

        let written: usize = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| index.ensure_on_disk(&path).unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|handle| usize::from(handle.join().unwrap()))
                .sum()
        });
        assert_eq!(written, 1);
    }
}
