//! Whole-assembly decompilation into memory.
//!
//! [`WholeAssemblyDecompiler`] turns every includable type of a module into one source
//! file per computed relative path, plus `Properties/AssemblyInfo.cs`. A run proceeds
//! in rounds:
//!
//! 1. The top-level types that survive [`included_in_decompilation`] are grouped by
//!    their case-insensitive relative path into work units.
//! 2. The units of a round are decompiled in parallel on a bounded rayon pool, each
//!    by a fresh [`TypeDecompiler`]. Every type the rendered tree refers to that is
//!    defined by the module, walked up to its outermost declaring type and not yet
//!    processed, is added to the pending set of the run.
//! 3. When a round is complete and the pending set is not empty, the pending types
//!    are grouped the same way and decompiled in another round.
//! 4. Finally the module and assembly attributes are rendered.
//!
//! A failing unit aborts the whole run with [`Error::Decompile`], which names the
//! unit's path. Cancellation is observed before each unit starts and while a unit is
//! built; units that already render are left to finish.

use std::{
    collections::{BTreeMap, HashSet},
    path::MAIN_SEPARATOR,
    sync::{Arc, Mutex},
};

use crossbeam_skiplist::SkipMap;
use rayon::prelude::*;
use uguid::Guid;

use crate::{
    decompiler::{
        builder::{member_is_hidden, TypeDecompiler},
        output::{OutputVisitor, RenderedSource, SymbolLocation},
        progress::{ProgressSink, ProgressTracker},
        settings::DecompilerSettings,
        syntax::{walk_type_node, walk_unit, CompilationUnit, TypeNode, Visitor},
        transforms::RemoveCompilerGeneratedAssemblyAttributes,
        typesystem::DecompilerTypeSystem,
    },
    metadata::{
        module::{Module, ModuleRc, ModuleReader},
        symbol::SymbolKey,
        token::Token,
        typedef::TypeDefinition,
    },
    naming::{clean_up_directory_name, clean_up_file_name, clean_up_path},
    resolver::AssemblyResolver,
    utils::CancellationToken,
    Error, Result,
};

/// Extension of generated source files.
pub const SOURCE_EXTENSION: &str = ".cs";

/// Attribute types the compiler embeds into assemblies that use newer language features.
const EMBEDDED_ATTRIBUTES: [&str; 10] = [
    "Microsoft.CodeAnalysis.EmbeddedAttribute",
    "System.Runtime.CompilerServices.IsByRefLikeAttribute",
    "System.Runtime.CompilerServices.IsReadOnlyAttribute",
    "System.Runtime.CompilerServices.IsUnmanagedAttribute",
    "System.Runtime.CompilerServices.NativeIntegerAttribute",
    "System.Runtime.CompilerServices.NullableAttribute",
    "System.Runtime.CompilerServices.NullableContextAttribute",
    "System.Runtime.CompilerServices.RefSafetyRulesAttribute",
    "System.Runtime.CompilerServices.RequiresLocationAttribute",
    "System.Runtime.CompilerServices.ScopedRefAttribute",
];

/// Relative path of the generated assembly attribute file.
#[must_use]
pub fn assembly_info_path() -> String {
    format!("Properties{MAIN_SEPARATOR}AssemblyInfo{SOURCE_EXTENSION}")
}

/// The relative path of the file a top-level type is written to.
///
/// The namespace becomes one directory per level when
/// [`DecompilerSettings::use_nested_directories_for_namespaces`] is set and a single
/// directory otherwise; the global namespace maps to the project root.
///
/// ```rust
/// use dotsource::decompiler::{relative_path, DecompilerSettings};
/// use std::path::MAIN_SEPARATOR;
///
/// let settings = DecompilerSettings::default();
/// assert_eq!(
///     relative_path(&settings, "Namespace.A", "Widget"),
///     format!("Namespace{MAIN_SEPARATOR}A{MAIN_SEPARATOR}Widget.cs")
/// );
/// assert_eq!(relative_path(&settings, "", "List`1"), "List.cs");
/// ```
#[must_use]
pub fn relative_path(settings: &DecompilerSettings, namespace: &str, name: &str) -> String {
    let file = clean_up_file_name(name, SOURCE_EXTENSION);
    if namespace.is_empty() {
        return file;
    }

    let directory = if settings.use_nested_directories_for_namespaces {
        clean_up_path(namespace)
    } else {
        clean_up_directory_name(namespace)
    };
    format!("{directory}{MAIN_SEPARATOR}{file}")
}

/// Returns `true` if a top-level type gets its own place in the generated project.
///
/// Excluded are the `<Module>` type, types hidden by `settings`, the WPF
/// `GeneratedInternalTypeHelper` and the attribute types compilers embed.
#[must_use]
pub fn included_in_decompilation(
    module: &Module,
    definition: &TypeDefinition,
    settings: &DecompilerSettings,
) -> bool {
    if definition.name == "<Module>" || member_is_hidden(module, definition.token, settings) {
        return false;
    }
    if definition.namespace == "XamlGeneratedNamespace"
        && definition.name == "GeneratedInternalTypeHelper"
    {
        return false;
    }
    definition.is_nested() || !EMBEDDED_ATTRIBUTES.contains(&definition.qualified_name().as_str())
}

/// One generated source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompiledFile {
    /// Path relative to the project directory
    pub relative_path: String,
    /// Source text
    pub text: String,
    /// Location of every declared symbol
    pub symbols: BTreeMap<SymbolKey, SymbolLocation>,
    /// Top-level types rendered into the file
    pub types: Vec<Token>,
}

impl DecompiledFile {
    fn new(relative_path: String, source: RenderedSource, types: Vec<Token>) -> Self {
        DecompiledFile {
            relative_path,
            text: source.text,
            symbols: source.symbols,
            types,
        }
    }

    /// Location of `symbol` in the text, if the file declares it.
    #[must_use]
    pub fn location_of(&self, symbol: &SymbolKey) -> Option<SymbolLocation> {
        self.symbols.get(symbol).copied()
    }
}

/// The result of decompiling one module.
#[derive(Debug, Clone, Default)]
pub struct DecompiledAssembly {
    files: BTreeMap<String, DecompiledFile>,
}

impl DecompiledAssembly {
    /// All files, keyed by relative path.
    #[must_use]
    pub fn files(&self) -> &BTreeMap<String, DecompiledFile> {
        &self.files
    }

    /// Looks up a file by relative path, ignoring case.
    #[must_use]
    pub fn file(&self, relative_path: &str) -> Option<&DecompiledFile> {
        self.files.get(relative_path).or_else(|| {
            self.files
                .values()
                .find(|file| file.relative_path.eq_ignore_ascii_case(relative_path))
        })
    }

    /// Relative paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no file was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl IntoIterator for DecompiledAssembly {
    type Item = (String, DecompiledFile);
    type IntoIter = std::collections::btree_map::IntoIter<String, DecompiledFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// Types that share one relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkUnit {
    path: String,
    types: Vec<Token>,
}

/// Decompiles whole modules into a set of source files.
pub struct WholeAssemblyDecompiler {
    settings: DecompilerSettings,
    references: Option<(Arc<dyn AssemblyResolver>, Arc<dyn ModuleReader>)>,
    max_degree_of_parallelism: usize,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl WholeAssemblyDecompiler {
    /// Creates a decompiler that does not load referenced assemblies.
    #[must_use]
    pub fn new(settings: DecompilerSettings) -> Self {
        WholeAssemblyDecompiler {
            settings,
            references: None,
            max_degree_of_parallelism: std::thread::available_parallelism()
                .map_or(1, std::num::NonZeroUsize::get),
            progress: None,
        }
    }

    /// Loads referenced assemblies through `resolver` and `reader` to resolve
    /// external types.
    #[must_use]
    pub fn with_resolver(
        mut self,
        resolver: Arc<dyn AssemblyResolver>,
        reader: Arc<dyn ModuleReader>,
    ) -> Self {
        self.references = Some((resolver, reader));
        self
    }

    /// Limits the number of units decompiled at the same time; `0` is treated as `1`.
    #[must_use]
    pub fn with_max_degree_of_parallelism(mut self, max: usize) -> Self {
        self.max_degree_of_parallelism = max.max(1);
        self
    }

    /// Reports progress to `sink`.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// The settings in use.
    #[must_use]
    pub fn settings(&self) -> &DecompilerSettings {
        &self.settings
    }

    /// The configured degree of parallelism.
    #[must_use]
    pub fn max_degree_of_parallelism(&self) -> usize {
        self.max_degree_of_parallelism
    }

    /// Decompiles `module` into memory.
    ///
    /// # Errors
    /// Returns [`Error::Decompile`] if a unit fails, [`Error::Cancelled`] if the run
    /// was cancelled and [`Error::Error`] if the worker pool can not be created.
    pub fn decompile_to_memory(
        &self,
        module: &ModuleRc,
        cancellation: &CancellationToken,
    ) -> Result<DecompiledAssembly> {
        let type_system = match &self.references {
            Some((resolver, reader)) => DecompilerTypeSystem::with_references(
                module.clone(),
                resolver.as_ref(),
                reader.as_ref(),
            ),
            None => DecompilerTypeSystem::new(module.clone()),
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_degree_of_parallelism)
            .build()
            .map_err(|error| Error::Error(format!("Failed to create worker pool: {error}")))?;

        let mut run = DecompilationRun {
            settings: &self.settings,
            type_system: Arc::new(type_system),
            cancellation,
            processed: HashSet::new(),
            pending: Mutex::new(HashSet::new()),
            files: SkipMap::new(),
            progress: ProgressTracker::new(
                format!("Decompiling {}", module.name),
                self.progress.clone(),
            ),
        };
        run.execute(&pool)
    }
}

/// The state of one call to [`WholeAssemblyDecompiler::decompile_to_memory`].
struct DecompilationRun<'a> {
    settings: &'a DecompilerSettings,
    type_system: Arc<DecompilerTypeSystem>,
    cancellation: &'a CancellationToken,
    /// Types already assigned to a unit; only changed between rounds
    processed: HashSet<Token>,
    /// Types discovered during the current round
    pending: Mutex<HashSet<Token>>,
    /// Finished files keyed by lowercased path
    files: SkipMap<String, DecompiledFile>,
    progress: ProgressTracker,
}

impl DecompilationRun<'_> {
    fn module(&self) -> &Module {
        self.type_system.main_module()
    }

    fn execute(&mut self, pool: &rayon::ThreadPool) -> Result<DecompiledAssembly> {
        let initial: Vec<Token> = self
            .module()
            .top_level_types()
            .into_iter()
            .filter(|definition| included_in_decompilation(self.module(), definition, self.settings))
            .map(|definition| definition.token)
            .collect();

        let mut units = self.group(&initial);
        let mut total = units.len();
        self.progress.set_total(total + 1);
        log::debug!(
            "Decompiling {} types into {} files",
            initial.len(),
            units.len()
        );

        let mut round = initial;
        loop {
            self.processed.extend(round.iter().copied());
            check_cancelled!(self.cancellation);

            let this = &*self;
            pool.install(|| units.par_iter().try_for_each(|unit| this.process(unit)))?;

            round = {
                let mut pending = lock!(self.pending);
                let mut discovered: Vec<Token> = pending
                    .drain()
                    .filter(|token| !self.processed.contains(token))
                    .collect();
                discovered.sort();
                discovered
            };
            if round.is_empty() {
                break;
            }

            units = self.group(&round);
            total += units.len();
            self.progress.set_total(total + 1);
            log::debug!(
                "Discovered {} additional types in {} files",
                round.len(),
                units.len()
            );
        }

        check_cancelled!(self.cancellation);
        let path = assembly_info_path();
        let decompiler = TypeDecompiler::new(self.type_system.clone(), self.settings.clone())
            .with_transform(Box::new(RemoveCompilerGeneratedAssemblyAttributes));
        let unit = decompiler
            .decompile_module_and_assembly_attributes()
            .map_err(|error| wrap(&path, error))?;
        let rendered = OutputVisitor::render(&unit, &self.settings.formatting);
        self.files.insert(
            path.to_lowercase(),
            DecompiledFile::new(path.clone(), rendered, Vec::new()),
        );
        self.progress.unit_completed(&path);

        let files = std::mem::take(&mut self.files)
            .into_iter()
            .map(|(_, file)| (file.relative_path.clone(), file))
            .collect();
        Ok(DecompiledAssembly { files })
    }

    /// Groups types by their case-insensitive relative path, in order of first appearance.
    fn group(&self, tokens: &[Token]) -> Vec<WorkUnit> {
        let mut units: Vec<WorkUnit> = Vec::new();
        for token in tokens {
            let Some(definition) = self.module().type_definition(*token) else {
                continue;
            };
            let path = relative_path(self.settings, &definition.namespace, &definition.name);
            match units
                .iter_mut()
                .find(|unit| unit.path.eq_ignore_ascii_case(&path))
            {
                Some(unit) => unit.types.push(*token),
                None => units.push(WorkUnit {
                    path,
                    types: vec![*token],
                }),
            }
        }
        units
    }

    fn process(&self, unit: &WorkUnit) -> Result<()> {
        check_cancelled!(self.cancellation);

        let file = self
            .decompile_unit(unit)
            .map_err(|error| wrap(&unit.path, error))?;
        self.files.insert(unit.path.to_lowercase(), file);

        self.progress.unit_completed(&unit.path);
        Ok(())
    }

    fn decompile_unit(&self, unit: &WorkUnit) -> Result<DecompiledFile> {
        let decompiler = TypeDecompiler::new(self.type_system.clone(), self.settings.clone());
        let tree = decompiler.decompile_types(&unit.types, self.cancellation)?;
        self.discover(&tree)?;

        let rendered = OutputVisitor::render(&tree, &self.settings.formatting);
        Ok(DecompiledFile::new(unit.path.clone(), rendered, unit.types.clone()))
    }

    /// Adds every unprocessed outermost type the tree refers to to the pending set.
    fn discover(&self, tree: &CompilationUnit) -> Result<()> {
        let mut collector = ReferenceCollector {
            module: self.module(),
            mvid: self.type_system.main_mvid(),
            found: Vec::new(),
        };
        walk_unit(&mut collector, tree);
        if collector.found.is_empty() {
            return Ok(());
        }

        let mut pending = lock!(self.pending);
        for token in collector.found {
            if token.is_type_def() && !token.is_nil() && !self.processed.contains(&token) {
                pending.insert(token);
            }
        }
        Ok(())
    }
}

fn wrap(path: &str, error: Error) -> Error {
    match error {
        Error::Cancelled | Error::Decompile { .. } => error,
        other => Error::Decompile {
            path: path.to_string(),
            source: Box::new(other),
        },
    }
}

/// Collects the outermost main-module types a tree refers to.
struct ReferenceCollector<'a> {
    module: &'a Module,
    mvid: Guid,
    found: Vec<Token>,
}

impl Visitor for ReferenceCollector<'_> {
    fn visit_type_node(&mut self, node: &TypeNode) {
        if let TypeNode::Named { resolved, .. } = node {
            if let Some(outermost) = resolved
                .definition_in(&self.mvid)
                .and_then(|token| self.module.outermost(token))
            {
                self.found.push(outermost);
            }
        }
        walk_type_node(self, node);
    }
}
