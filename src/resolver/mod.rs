//! Assembly reference resolution.
//!
//! While a module is decompiled, references to other assemblies have to be loaded so
//! the decompiler can tell which module owns a referenced type. The
//! [`CompilationAssemblyResolver`] answers those requests from the set of assemblies
//! a [`Compilation`] references, which is what the code being navigated was compiled
//! against.
//!
//! Resolution never fails with an error. A reference that can not be resolved yields
//! `None`, and the caller falls back to a lesser strategy. Every step is traced to a
//! [`ResolverLog`].
//!
//! # Candidate selection
//!
//! 1. Candidates are looked up by simple name.
//! 2. A single candidate is used even if its version differs from the request.
//! 3. Among several candidates an exact version and public key token match wins,
//!    otherwise the candidate with the highest version.
//! 4. The chosen assembly's image is taken from memory if the compilation already has
//!    it loaded, otherwise the file behind its metadata reference is opened.

mod trace;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    file::{BinaryImage, PrefetchMode},
    metadata::identity::AssemblyIdentity,
};

pub use trace::ResolverLog;

/// An assembly as seen by a [`Compilation`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblySymbol {
    /// Identity of the referenced assembly
    pub identity: AssemblyIdentity,
    /// `true` if the compilation references a signatures-only reference assembly
    pub is_reference_assembly: bool,
}

/// The reference through which a compilation consumes an assembly.
#[derive(Clone)]
pub struct MetadataReference {
    /// Human readable description, usually the file path
    pub display: String,
    /// Backing file, if the reference is file based
    pub file_path: Option<PathBuf>,
    /// The image, if the compilation already holds it in memory
    pub image: Option<Arc<BinaryImage>>,
}

impl MetadataReference {
    /// A reference to a file on disk.
    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        MetadataReference {
            display: path.display().to_string(),
            file_path: Some(path),
            image: None,
        }
    }

    /// A reference to an image held in memory.
    #[must_use]
    pub fn from_image(display: impl Into<String>, image: Arc<BinaryImage>) -> Self {
        MetadataReference {
            display: display.into(),
            file_path: image.path().map(Path::to_path_buf),
            image: Some(image),
        }
    }
}

impl std::fmt::Debug for MetadataReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataReference")
            .field("display", &self.display)
            .field("file_path", &self.file_path)
            .field("in_memory", &self.image.is_some())
            .finish()
    }
}

/// The compilation a navigation request originates from.
pub trait Compilation: Send + Sync {
    /// All assemblies the compilation references, transitively.
    fn referenced_assemblies(&self) -> Vec<AssemblySymbol>;

    /// The metadata reference that provides `assembly`.
    fn metadata_reference(&self, assembly: &AssemblySymbol) -> Option<MetadataReference>;
}

/// Resolves assembly and module references to loadable images.
pub trait AssemblyResolver: Send + Sync {
    /// Resolves an assembly reference; `None` if it can not be resolved.
    fn resolve(&self, reference: &AssemblyIdentity) -> Option<Arc<BinaryImage>>;

    /// Resolves a module of a multi-module assembly; `None` if it can not be found.
    fn resolve_module(&self, main_module: &BinaryImage, module_name: &str) -> Option<Arc<BinaryImage>>;
}

/// Resolves references against the assemblies of a [`Compilation`].
pub struct CompilationAssemblyResolver {
    compilation: Arc<dyn Compilation>,
    cache: HashMap<String, Vec<AssemblySymbol>>,
    log: Arc<ResolverLog>,
}

impl CompilationAssemblyResolver {
    /// Creates a resolver and indexes the compilation's referenced assemblies by name.
    pub fn new(compilation: Arc<dyn Compilation>, log: Arc<ResolverLog>) -> Self {
        let mut cache: HashMap<String, Vec<AssemblySymbol>> = HashMap::new();
        for assembly in compilation.referenced_assemblies() {
            cache
                .entry(assembly.identity.name.clone())
                .or_default()
                .push(assembly);
        }
        log.log(format!("{} items in cache", cache.len()));

        CompilationAssemblyResolver {
            compilation,
            cache,
            log,
        }
    }

    /// The trace this resolver writes to.
    #[must_use]
    pub fn log(&self) -> &Arc<ResolverLog> {
        &self.log
    }

    /// Returns the image of `reference` if it is already loaded in memory.
    #[must_use]
    pub fn try_resolve(&self, reference: &MetadataReference) -> Option<Arc<BinaryImage>> {
        reference.image.clone()
    }

    /// Loads the image behind `reference`: from memory if available, else from disk.
    #[must_use]
    pub fn load(&self, reference: &MetadataReference, prefetch: PrefetchMode) -> Option<Arc<BinaryImage>> {
        self.log.log(format!("Load from: '{}'", reference.display));
        if let Some(image) = self.try_resolve(reference) {
            return Some(image);
        }

        let path = reference.file_path.as_ref()?;
        if !path.is_file() {
            self.log
                .log(format!("File does not exist: '{}'", path.display()));
            return None;
        }

        match BinaryImage::from_file(path, prefetch) {
            Ok(image) => Some(Arc::new(image)),
            Err(error) => {
                self.log
                    .warn(format!("Could not open '{}': {error}", path.display()));
                None
            }
        }
    }

    /// Picks the candidate to use for `reference`; `None` if there is no candidate.
    #[must_use]
    pub fn select(&self, reference: &AssemblyIdentity) -> Option<&AssemblySymbol> {
        let Some(candidates) = self.cache.get(&reference.name) else {
            self.log
                .log(format!("Could not find by name: '{}'", reference.display_name()));
            return None;
        };

        if let [single] = candidates.as_slice() {
            self.log
                .log(format!("Found single assembly: '{}'", single.identity));
            if single.identity.version != reference.version {
                self.log.warn(format!(
                    "Version mismatch. Expected: '{}', Got: '{}'",
                    reference.version, single.identity.version
                ));
            }
            return Some(single);
        }

        self.log.log(format!(
            "Found {} assemblies for '{}':",
            candidates.len(),
            reference.name
        ));

        let mut highest_version: Option<&AssemblySymbol> = None;
        let mut exact_match: Option<&AssemblySymbol> = None;
        for candidate in candidates {
            self.log.log(candidate.identity.display_name());
            if candidate.identity.version == reference.version
                && candidate.identity.public_key_token == reference.public_key_token
            {
                exact_match = Some(candidate);
                self.log
                    .log(format!("Found exact match: '{}'", candidate.identity));
            } else if highest_version
                .map_or(true, |highest| highest.identity.version < candidate.identity.version)
            {
                highest_version = Some(candidate);
                self.log
                    .log(format!("Found higher version match: '{}'", candidate.identity));
            }
        }

        let chosen = exact_match.or(highest_version)?;
        self.log.log(format!("Chosen version: '{}'", chosen.identity));
        Some(chosen)
    }
}

impl AssemblyResolver for CompilationAssemblyResolver {
    fn resolve(&self, reference: &AssemblyIdentity) -> Option<Arc<BinaryImage>> {
        self.log.log("------------------");
        self.log
            .log(format!("Resolve: '{}'", reference.display_name()));

        let chosen = self.select(reference)?;
        let Some(metadata_reference) = self.compilation.metadata_reference(chosen) else {
            self.log
                .log(format!("No metadata reference for '{}'", chosen.identity));
            return None;
        };
        self.load(&metadata_reference, PrefetchMode::Metadata)
    }

    fn resolve_module(&self, main_module: &BinaryImage, module_name: &str) -> Option<Arc<BinaryImage>> {
        self.log.log("-------------");
        let main_path = main_module.path()?;
        self.log.log(format!(
            "Resolve module '{module_name}' of '{}'",
            main_path.display()
        ));

        let module_path = main_path.parent()?.join(module_name);
        if !module_path.is_file() {
            self.log
                .log(format!("Module not found: '{}'", module_path.display()));
            return None;
        }

        self.log
            .log(format!("Load from: '{}'", module_path.display()));
        match BinaryImage::from_file(&module_path, PrefetchMode::Metadata) {
            Ok(image) => Some(Arc::new(image)),
            Err(error) => {
                self.log
                    .warn(format!("Could not open '{}': {error}", module_path.display()));
                None
            }
        }
    }
}
