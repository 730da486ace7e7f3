//! Configuration of the metadata-as-source provider.

use std::time::Duration;

use crate::decompiler::DecompilerSettings;

/// Controls how navigation into metadata produces source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataAsSourceOptions {
    /// Decompile implementation assemblies instead of showing signature stubs. Default: `true`.
    pub navigate_to_decompiled_sources: bool,

    /// Write a `<AssemblyName>.csproj` next to the decompiled sources. Default: `true`.
    pub generate_project_file: bool,

    /// Limits the number of parallel decompilation workers; `None` uses the available
    /// parallelism. Default: `None`.
    pub max_degree_of_parallelism: Option<usize>,

    /// How long materialization keeps retrying to create a missing directory before the
    /// write is skipped. Default: 5 seconds.
    pub directory_creation_timeout: Duration,

    /// Settings of the decompiler.
    pub decompiler: DecompilerSettings,
}

impl Default for MetadataAsSourceOptions {
    fn default() -> Self {
        Self {
            navigate_to_decompiled_sources: true,
            generate_project_file: true,
            max_degree_of_parallelism: None,
            directory_creation_timeout: Duration::from_secs(5),
            decompiler: DecompilerSettings::default(),
        }
    }
}

impl MetadataAsSourceOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables decompilation.
    #[must_use]
    pub fn with_decompilation(mut self, enabled: bool) -> Self {
        self.navigate_to_decompiled_sources = enabled;
        self
    }

    /// Enables or disables the generated project file.
    #[must_use]
    pub fn with_project_file(mut self, enabled: bool) -> Self {
        self.generate_project_file = enabled;
        self
    }

    /// Limits the number of parallel decompilation workers.
    #[must_use]
    pub fn with_max_degree_of_parallelism(mut self, max: usize) -> Self {
        self.max_degree_of_parallelism = Some(max);
        self
    }

    /// Sets the directory creation timeout.
    #[must_use]
    pub fn with_directory_creation_timeout(mut self, timeout: Duration) -> Self {
        self.directory_creation_timeout = timeout;
        self
    }

    /// Sets the decompiler settings.
    #[must_use]
    pub fn with_decompiler_settings(mut self, settings: DecompilerSettings) -> Self {
        self.decompiler = settings;
        self
    }
}

/// Editor preferences for collapsing generated documents when they are first opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStructureOptions {
    /// Collapse bodies of decompiled documents. Default: `false`.
    pub collapse_metadata_implementations_when_first_opened: bool,
    /// Collapse the empty bodies of signature-only documents. Default: `true`.
    pub collapse_empty_metadata_implementations_when_first_opened: bool,
}

impl Default for BlockStructureOptions {
    fn default() -> Self {
        Self {
            collapse_metadata_implementations_when_first_opened: false,
            collapse_empty_metadata_implementations_when_first_opened: true,
        }
    }
}

impl BlockStructureOptions {
    /// The preference that applies to a document.
    #[must_use]
    pub fn collapse_on_first_open(&self, signatures_only: bool) -> bool {
        if signatures_only {
            self.collapse_empty_metadata_implementations_when_first_opened
        } else {
            self.collapse_metadata_implementations_when_first_opened
        }
    }
}
