//! C# generation from the metadata model.
//!
//! The decompiler produces declaration-level C#: namespaces, types with their
//! modifiers, base types and attributes, and members with their signatures. Method
//! bodies are reduced to the declarations of their locals.
//!
//! # Architecture
//!
//! A run goes through three stages per output file:
//!
//! 1. [`TypeDecompiler`] builds a [`syntax::CompilationUnit`] for a set of types.
//!    Every referenced type is resolved through the [`DecompilerTypeSystem`].
//! 2. The [`AstTransform`]s of the decompiler rewrite the tree in place.
//! 3. [`OutputVisitor`] renders the tree and records where each symbol is declared.
//!
//! [`WholeAssemblyDecompiler`] drives these stages for every type of a module on a
//! bounded worker pool and follows references to compiler-generated types that the
//! initial type list does not contain.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use dotsource::{
//!     decompiler::{DecompilerSettings, WholeAssemblyDecompiler},
//!     metadata::{builder::ModuleBuilder, identity::{AssemblyIdentity, AssemblyVersion}},
//!     utils::CancellationToken,
//! };
//!
//! let mut builder = ModuleBuilder::new(
//!     "Foo.dll",
//!     AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 0, 0, 0)),
//! );
//! builder.add_type("Foo", "Widget");
//! let module = Arc::new(builder.build());
//!
//! let files = WholeAssemblyDecompiler::new(DecompilerSettings::default())
//!     .decompile_to_memory(&module, &CancellationToken::none())?;
//! assert_eq!(files.len(), 2);
//! # Ok::<(), dotsource::Error>(())
//! ```

mod builder;
mod output;
mod progress;
mod project;
mod settings;
mod transforms;
mod typesystem;

/// The declaration tree and its visitors
pub mod syntax;

pub use builder::{member_is_hidden, TypeDecompiler};
pub use output::{OutputVisitor, RenderedSource, SymbolLocation};
pub use progress::{DecompilationProgress, ProgressSink};
pub use project::{
    assembly_info_path, included_in_decompilation, relative_path, DecompiledAssembly,
    DecompiledFile, WholeAssemblyDecompiler, SOURCE_EXTENSION,
};
pub use settings::{DecompilerSettings, FormattingOptions};
pub use transforms::{
    escape_identifier, AstTransform, EscapeInvalidIdentifiers, RemoveClsCompliantAttribute,
    RemoveCompilerGeneratedAssemblyAttributes,
};
pub use typesystem::{DecompilerTypeSystem, DecompilerTypeSystemRc};
