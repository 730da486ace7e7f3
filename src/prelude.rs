//! # dotsource Prelude
//!
//! The types most callers need to load modules, decompile them and navigate into
//! generated source, for glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotsource operations
pub use crate::Error;

/// How an error affects a navigation request
pub use crate::Severity;

/// The result type used throughout dotsource
pub use crate::Result;

/// Cooperative cancellation
pub use crate::utils::CancellationToken;

// ================================================================================================
// Binary Images
// ================================================================================================

/// Loaded binary images and how much of them to read up front
pub use crate::file::{BinaryImage, PrefetchMode};

// ================================================================================================
// Metadata Model
// ================================================================================================

/// Metadata token type for referencing definitions
pub use crate::metadata::token::Token;

/// Assembly identities
pub use crate::metadata::identity::{AssemblyIdentity, AssemblyVersion, PublicKeyToken};

/// Modules and the seam that reads them from images
pub use crate::metadata::module::{Module, ModuleRc, ModuleReader};

/// Building modules in code
pub use crate::metadata::builder::{MethodBuilder, ModuleBuilder, TypeBuilder};

/// Type definitions and their members
pub use crate::metadata::typedef::{
    Accessibility, FieldAttributes, MethodAttributes, TypeAttributes, TypeDefinition,
    TypeDefinitionRc, TypeKind,
};

/// Type signatures and attributes
pub use crate::metadata::{
    customattributes::{ConstantValue, CustomAttribute},
    signatures::{TypeReference, TypeSignature},
};

/// Token-independent symbol names
pub use crate::metadata::symbol::SymbolKey;

// ================================================================================================
// Reference Resolution
// ================================================================================================

/// Compilations, their references and the resolver built on them
pub use crate::resolver::{
    AssemblyResolver, AssemblySymbol, Compilation, CompilationAssemblyResolver,
    MetadataReference, ResolverLog,
};

// ================================================================================================
// Decompiler
// ================================================================================================

/// Whole-assembly and per-type decompilation
pub use crate::decompiler::{
    DecompiledAssembly, DecompiledFile, DecompilerSettings, DecompilerTypeSystem,
    FormattingOptions, SymbolLocation, TypeDecompiler, WholeAssemblyDecompiler,
};

/// Progress reporting
pub use crate::decompiler::{DecompilationProgress, ProgressSink};

// ================================================================================================
// Metadata as Source
// ================================================================================================

/// The navigation provider and its inputs and outputs
pub use crate::metasource::{
    BlockStructureOptions, MetadataAsSourceFile, MetadataAsSourceOptions,
    MetadataAsSourceProvider, SourceContext, SourceLanguage, SymbolRequest,
};

/// Workspace notifications
pub use crate::metasource::{DocumentId, MetadataWorkspace, ProjectId};
