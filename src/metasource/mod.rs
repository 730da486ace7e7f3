//! Navigation into metadata as generated source.
//!
//! When a symbol defined in a referenced assembly is navigated to, the
//! [`MetadataAsSourceProvider`] decompiles the whole assembly once, registers every
//! produced file as a document of a generated project and writes the file that holds
//! the requested symbol to disk. Later requests for symbols of the same assembly are
//! answered from the cache; their files are written on first access.
//!
//! # Strategy
//!
//! Real decompilation is attempted unless stubs were requested, it is disabled in
//! [`MetadataAsSourceOptions`], the source project is not C#, or the assembly is a
//! reference assembly for which no implementation assembly exists. A failing
//! decompilation degrades to a signature-only stub of the requested type. Failures that
//! indicate a broken cache or an unresolvable forward are returned as fatal errors.
//!
//! # Serialization
//!
//! Mutating operations take `&mut self`: the caller's lock around the provider is the
//! critical section for the project map, so a second request for an assembly that is
//! being decompiled waits and then hits the cache. The [`GeneratedFileIndex`] can be
//! shared with readers that do not hold that lock.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dotsource::{
//!     metasource::{MetadataAsSourceProvider, SourceContext, SourceLanguage, SymbolRequest},
//!     prelude::*,
//! };
//!
//! # fn run(
//! #     compilation: Arc<dyn Compilation>,
//! #     reader: Arc<dyn ModuleReader>,
//! #     assembly: AssemblySymbol,
//! # ) -> dotsource::Result<()> {
//! let mut provider = MetadataAsSourceProvider::new(std::env::temp_dir().join("metadata"), reader);
//! let context = SourceContext::new(compilation, SourceLanguage::CSharp);
//! let request = SymbolRequest::new("T:Namespace.A.Widget".parse()?, assembly);
//!
//! if let Some(file) = provider.get_or_create_file(&request, &context, &CancellationToken::none())? {
//!     println!("{} at {}:{}", file.file_path.display(), file.location.line, file.location.column);
//! }
//! # Ok(())
//! # }
//! ```

mod files;
mod implementation;
mod key;
mod options;
mod project;
mod workspace;

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use strum::{AsRefStr, Display};

use crate::{
    decompiler::{
        assembly_info_path, relative_path, DecompiledAssembly, DecompiledFile,
        DecompilerTypeSystem, OutputVisitor, ProgressSink, SymbolLocation, TypeDecompiler,
        WholeAssemblyDecompiler,
    },
    file::PrefetchMode,
    metadata::{
        module::{ModuleRc, ModuleReader},
        symbol::SymbolKey,
    },
    resolver::{
        AssemblySymbol, Compilation, CompilationAssemblyResolver, MetadataReference, ResolverLog,
    },
    utils::CancellationToken,
    Error, Result, Severity,
};

pub use files::{GeneratedFileIndex, GeneratedFileRecord};
pub use implementation::{ImplementationAssemblyLookup, SdkImplementationAssemblyLookup};
pub use key::AssemblyKey;
pub use options::{BlockStructureOptions, MetadataAsSourceOptions};
pub use project::{project_file, DecompiledProject};
pub use workspace::{DocumentId, MetadataWorkspace, NullWorkspace, ProjectId};

/// Language of the project a navigation starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
pub enum SourceLanguage {
    /// C#, the only language the decompiler emits
    #[strum(serialize = "C#")]
    CSharp,
    /// Visual Basic
    #[strum(serialize = "Visual Basic")]
    VisualBasic,
}

/// The symbol to navigate to.
#[derive(Debug, Clone)]
pub struct SymbolRequest {
    /// The symbol, a type or a member
    pub symbol: SymbolKey,
    /// The assembly that contains the symbol, as the compilation sees it
    pub assembly: AssemblySymbol,
    /// Show signatures only, never decompile
    pub signatures_only: bool,
}

impl SymbolRequest {
    /// A request that allows decompilation.
    #[must_use]
    pub fn new(symbol: SymbolKey, assembly: AssemblySymbol) -> Self {
        SymbolRequest {
            symbol,
            assembly,
            signatures_only: false,
        }
    }

    /// Requests signature stubs only.
    #[must_use]
    pub fn signatures_only(mut self) -> Self {
        self.signatures_only = true;
        self
    }
}

/// Where a navigation request comes from.
#[derive(Clone)]
pub struct SourceContext {
    /// The compilation of the source project
    pub compilation: Arc<dyn Compilation>,
    /// The language of the source project
    pub language: SourceLanguage,
}

impl SourceContext {
    /// Creates a context.
    #[must_use]
    pub fn new(compilation: Arc<dyn Compilation>, language: SourceLanguage) -> Self {
        SourceContext {
            compilation,
            language,
        }
    }
}

/// A generated file to navigate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataAsSourceFile {
    /// Absolute path of the file on disk
    pub file_path: PathBuf,
    /// Location of the requested symbol in the file
    pub location: SymbolLocation,
    /// Caption for the editor tab, e.g. `Widget [Decompiled]`
    pub document_name: String,
    /// Namespace-qualified name of the top-level type
    pub document_tooltip: String,
}

/// The reference to decompile, after reference assemblies were replaced by their
/// implementation.
struct ReferenceInfo {
    metadata_reference: MetadataReference,
    is_reference_assembly: bool,
}

/// Produces and caches source files for symbols defined in metadata.
pub struct MetadataAsSourceProvider {
    temp_root: PathBuf,
    options: MetadataAsSourceOptions,
    reader: Arc<dyn ModuleReader>,
    implementation_lookup: Arc<dyn ImplementationAssemblyLookup>,
    workspace: Arc<dyn MetadataWorkspace>,
    progress: Option<Arc<dyn ProgressSink>>,
    projects: HashMap<AssemblyKey, DecompiledProject>,
    files: GeneratedFileIndex,
    next_project: u32,
    decompilations: usize,
}

impl MetadataAsSourceProvider {
    /// Creates a provider that writes generated projects below `temp_root`.
    #[must_use]
    pub fn new(temp_root: impl Into<PathBuf>, reader: Arc<dyn ModuleReader>) -> Self {
        let options = MetadataAsSourceOptions::default();
        MetadataAsSourceProvider {
            temp_root: temp_root.into(),
            files: GeneratedFileIndex::new(options.directory_creation_timeout),
            options,
            reader,
            implementation_lookup: Arc::new(SdkImplementationAssemblyLookup),
            workspace: Arc::new(NullWorkspace),
            progress: None,
            projects: HashMap::new(),
            next_project: 0,
            decompilations: 0,
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: MetadataAsSourceOptions) -> Self {
        self.files = GeneratedFileIndex::new(options.directory_creation_timeout);
        self.options = options;
        self
    }

    /// Replaces the implementation assembly lookup.
    #[must_use]
    pub fn with_implementation_lookup(mut self, lookup: Arc<dyn ImplementationAssemblyLookup>) -> Self {
        self.implementation_lookup = lookup;
        self
    }

    /// Sends project and document notifications to `workspace`.
    #[must_use]
    pub fn with_workspace(mut self, workspace: Arc<dyn MetadataWorkspace>) -> Self {
        self.workspace = workspace;
        self
    }

    /// Reports decompilation progress to `sink`.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// The options in use.
    #[must_use]
    pub fn options(&self) -> &MetadataAsSourceOptions {
        &self.options
    }

    /// A handle to the index of generated files.
    #[must_use]
    pub fn files(&self) -> &GeneratedFileIndex {
        &self.files
    }

    /// The project generated for `key`, if any.
    #[must_use]
    pub fn project(&self, key: &AssemblyKey) -> Option<&DecompiledProject> {
        self.projects.get(key)
    }

    /// Number of cached projects.
    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    /// Number of whole-assembly decompilations started by this provider.
    #[must_use]
    pub fn decompilation_count(&self) -> usize {
        self.decompilations
    }

    /// Returns the generated file that contains `request.symbol`, creating the project
    /// of its assembly on first use.
    ///
    /// Returns `None` if the compilation has no metadata reference for the assembly or
    /// its image can not be loaded.
    ///
    /// # Errors
    /// - [`Error::Fatal`] if the forwards of a reference assembly's implementation can
    ///   not be followed, or the reference has no file path
    /// - [`Error::Invariant`] if a cached project does not contain the requested type
    /// - [`Error::Cancelled`] if cancelled before the project was registered
    /// - [`Error::FileError`] if the file can not be written
    pub fn get_or_create_file(
        &mut self,
        request: &SymbolRequest,
        context: &SourceContext,
        cancellation: &CancellationToken,
    ) -> Result<Option<MetadataAsSourceFile>> {
        let top_level = request.symbol.top_level_type();
        let type_name = top_level.type_path.first().cloned().unwrap_or_default();

        let mut use_decompiler = !request.signatures_only
            && self.options.navigate_to_decompiled_sources
            && context.language == SourceLanguage::CSharp;

        let Some(reference) = self.reference_info(request, context)? else {
            return Ok(None);
        };
        if use_decompiler {
            use_decompiler = !reference.is_reference_assembly;
        }

        let file_path = reference.metadata_reference.file_path.clone().ok_or_else(|| {
            Error::Fatal(format!(
                "Metadata reference '{}' has no file path",
                reference.metadata_reference.display
            ))
        })?;

        let resolver = Arc::new(CompilationAssemblyResolver::new(
            context.compilation.clone(),
            Arc::new(ResolverLog::new()),
        ));
        let Some(image) = resolver.load(&reference.metadata_reference, PrefetchMode::EntireImage) else {
            log::warn!("Could not load '{}'", file_path.display());
            return Ok(None);
        };
        let module = self.reader.read(&image)?;
        if module.is_reference_assembly() {
            use_decompiler = false;
        }
        let key = AssemblyKey::new(file_path, module.mvid);

        let expected = relative_path(&self.options.decompiler, &top_level.namespace, &type_name);
        let record = if self.projects.contains_key(&key) {
            self.cached_record(&key, &module, &top_level, &expected, cancellation)?
        } else {
            let decompiled = if use_decompiler {
                self.decompile(&module, resolver, cancellation)?
            } else {
                None
            };
            self.create_project(key, &module, &top_level, &expected, decompiled, cancellation)?
        };

        record.materialize(self.files.directory_timeout())?;

        let display_name = type_name.split('`').next().unwrap_or(&type_name).to_string();
        let document_name = format!(
            "{display_name} [{}]",
            if record.is_signatures_only() {
                "from metadata"
            } else {
                "Decompiled"
            }
        );
        let document_tooltip = if top_level.namespace.is_empty() {
            display_name
        } else {
            format!("{}.{display_name}", top_level.namespace)
        };

        Ok(Some(MetadataAsSourceFile {
            file_path: record.path().to_path_buf(),
            location: record.location_of(&request.symbol),
            document_name,
            document_tooltip,
        }))
    }

    /// Finds the metadata reference of the requested assembly, substituting the
    /// implementation assembly for a reference assembly where one exists.
    fn reference_info(
        &self,
        request: &SymbolRequest,
        context: &SourceContext,
    ) -> Result<Option<ReferenceInfo>> {
        let Some(mut metadata_reference) = context.compilation.metadata_reference(&request.assembly) else {
            log::debug!("No metadata reference for '{}'", request.assembly.identity);
            return Ok(None);
        };

        let mut is_reference_assembly = request.assembly.is_reference_assembly;
        if is_reference_assembly {
            let implementation = metadata_reference.file_path.as_deref().and_then(|path| {
                self.implementation_lookup
                    .try_find_implementation_assembly_path(path)
            });
            if let Some(implementation) = implementation {
                let location = self
                    .implementation_lookup
                    .follow_type_forwards(&request.symbol, &implementation, self.reader.as_ref())
                    .ok_or_else(|| {
                        Error::Fatal(format!(
                            "Failed to follow type forwards for symbol '{}', assembly '{}' at location '{}'",
                            request.symbol,
                            request.assembly.identity.name,
                            implementation.display()
                        ))
                    })?;
                is_reference_assembly = false;
                metadata_reference = MetadataReference::from_file(location);
            }
        }

        Ok(Some(ReferenceInfo {
            metadata_reference,
            is_reference_assembly,
        }))
    }

    /// Decompiles the whole assembly. Failures other than cancellation degrade to `None`.
    fn decompile(
        &mut self,
        module: &ModuleRc,
        resolver: Arc<CompilationAssemblyResolver>,
        cancellation: &CancellationToken,
    ) -> Result<Option<DecompiledAssembly>> {
        self.decompilations += 1;

        let mut decompiler = WholeAssemblyDecompiler::new(self.options.decompiler.clone())
            .with_resolver(resolver, self.reader.clone());
        if let Some(max) = self.options.max_degree_of_parallelism {
            decompiler = decompiler.with_max_degree_of_parallelism(max);
        }
        if let Some(sink) = &self.progress {
            decompiler = decompiler.with_progress_sink(sink.clone());
        }

        match decompiler.decompile_to_memory(module, cancellation) {
            Ok(assembly) => Ok(Some(assembly)),
            Err(error) if error.severity() == Severity::Cancelled => Err(Error::Cancelled),
            Err(error) => {
                log::warn!("Failed to decompile assembly '{}': {error}", module.name);
                Ok(None)
            }
        }
    }

    /// Finds the record of the requested type in an existing project.
    fn cached_record(
        &mut self,
        key: &AssemblyKey,
        module: &ModuleRc,
        top_level: &SymbolKey,
        expected: &str,
        cancellation: &CancellationToken,
    ) -> Result<GeneratedFileRecord> {
        let Some(project) = self.projects.get(key) else {
            return Err(invariant_error!("No project for '{}'", key));
        };

        if let Some(record) = project
            .find_primary(expected)
            .and_then(|relative| self.files.get(&project.absolute_path(relative)))
        {
            return Ok(record);
        }

        if !project.is_signatures_only() {
            return Err(invariant_error!(
                "The assembly '{}' has already been decompiled, but there is no document for '{}' at '{}'",
                project.name(),
                top_level,
                project.absolute_path(expected).display()
            ));
        }

        // Stub projects grow one type at a time.
        let stub = self.stub(module, top_level, cancellation)?;
        let Some(project) = self.projects.get_mut(key) else {
            return Err(invariant_error!("No project for '{}'", key));
        };
        let document = project.add_document(&stub.relative_path);
        let record = GeneratedFileRecord::new(
            project.absolute_path(&stub.relative_path),
            key.clone(),
            document,
            true,
            stub.text,
            stub.symbols,
        );
        self.files.register(record.clone());
        Ok(record)
    }

    /// Builds and registers the project of an assembly seen for the first time.
    fn create_project(
        &mut self,
        key: AssemblyKey,
        module: &ModuleRc,
        top_level: &SymbolKey,
        expected: &str,
        decompiled: Option<DecompiledAssembly>,
        cancellation: &CancellationToken,
    ) -> Result<GeneratedFileRecord> {
        let signatures_only = decompiled.is_none();
        let mut project = DecompiledProject::new(
            ProjectId(self.next_project + 1),
            key.clone(),
            module.identity(),
            self.temp_root.join(key.directory_name()),
            signatures_only,
        );

        let mut files: Vec<DecompiledFile> = match decompiled {
            Some(assembly) => assembly.into_iter().map(|(_, file)| file).collect(),
            None => vec![
                self.stub(module, top_level, cancellation)?,
                DecompiledFile {
                    relative_path: assembly_info_path(),
                    text: project.assembly_info_text(),
                    symbols: BTreeMap::new(),
                    types: Vec::new(),
                },
            ],
        };
        if !signatures_only && self.options.generate_project_file {
            files.push(DecompiledFile {
                relative_path: project.project_file_path(),
                text: project_file(&module.identity(), &module.assembly_references)?,
                symbols: BTreeMap::new(),
                types: Vec::new(),
            });
        }

        for file in &files {
            project.add_document(&file.relative_path);
        }
        let primary = project
            .find_primary(expected)
            .map(str::to_string)
            .ok_or_else(|| {
                invariant_error!(
                    "Decompilation did not produce a document for the requested type '{}' at '{}'",
                    top_level,
                    expected
                )
            })?;

        // Registration always completes once started.
        check_cancelled!(cancellation);
        self.next_project += 1;
        let mut primary_record = None;
        for file in files {
            let Some(document) = project.find_document(&file.relative_path) else {
                continue;
            };
            let record = GeneratedFileRecord::new(
                project.absolute_path(&file.relative_path),
                key.clone(),
                document,
                signatures_only,
                file.text,
                file.symbols,
            );
            if file.relative_path == primary {
                primary_record = Some(record.clone());
            }
            self.files.register(record);
        }

        log::debug!(
            "Registered {} documents for '{}' in '{}'",
            project.document_count(),
            key,
            project.directory().display()
        );
        self.workspace.on_project_added(&project);
        self.projects.insert(key, project);

        primary_record
            .ok_or_else(|| invariant_error!("Primary document '{}' was not registered", primary))
    }

    /// Renders a signature-only file for the top-level type `top_level`.
    fn stub(
        &self,
        module: &ModuleRc,
        top_level: &SymbolKey,
        cancellation: &CancellationToken,
    ) -> Result<DecompiledFile> {
        let token = top_level.resolve_type(module).ok_or_else(|| {
            Error::Fatal(format!("Type '{}' not found in '{}'", top_level, module.name))
        })?;

        let settings = &self.options.decompiler;
        let decompiler = TypeDecompiler::new(
            Arc::new(DecompilerTypeSystem::new(module.clone())),
            settings.clone(),
        )
        .signatures_only(true);
        let unit = decompiler.decompile_types(&[token], cancellation)?;
        let rendered = OutputVisitor::render(&unit, &settings.formatting);

        let name = top_level.type_path.first().map_or("", String::as_str);
        Ok(DecompiledFile {
            relative_path: relative_path(settings, &top_level.namespace, name),
            text: rendered.text,
            symbols: rendered.symbols,
            types: vec![token],
        })
    }

    /// Removes the project of `key`, all its file records and its directory.
    ///
    /// Returns `false` if there was no such project.
    pub fn cleanup_project(&mut self, key: &AssemblyKey) -> bool {
        let Some(project) = self.projects.remove(key) else {
            return false;
        };

        let removed = self.files.remove_project(project.id());
        for record in &removed {
            self.workspace
                .on_document_closed(record.document(), record.path());
        }
        if !removed.is_empty() {
            self.workspace.on_project_removed(project.id());
        }

        if project.directory().exists() {
            if let Err(error) = fs::remove_dir_all(project.directory()) {
                log::warn!(
                    "Failed to delete '{}': {error}",
                    project.directory().display()
                );
            }
        }
        log::debug!("Cleaned up '{}'", key);
        true
    }

    /// Removes every project and file record.
    pub fn cleanup_generated_files(&mut self) {
        let keys: Vec<AssemblyKey> = self.projects.keys().cloned().collect();
        for key in keys {
            self.cleanup_project(&key);
        }
        self.files.clear();
        self.projects.clear();
    }

    /// Whether the editor should collapse the generated file at `path` when it is first
    /// opened. Unknown paths are never collapsed.
    #[must_use]
    pub fn should_collapse_on_first_open(&self, path: &Path, options: &BlockStructureOptions) -> bool {
        self.files
            .get(path)
            .is_some_and(|record| options.collapse_on_first_open(record.is_signatures_only()))
    }
}
