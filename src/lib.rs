// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # dotsource
//!
//! Navigation from a symbol in a referenced .NET assembly to generated C# source.
//!
//! When an editor asks for the definition of a type or member that is only available
//! as compiled metadata, `dotsource` produces a readable source file for it:
//!
//! - the containing assembly is located through the compilation's references, and a
//!   reference assembly is swapped for its implementation assembly when one exists
//! - the whole assembly is decompiled once into a project of C# files, laid out by
//!   namespace, together with a project file and `Properties/AssemblyInfo.cs`
//! - the file holding the symbol is written read-only to a temporary directory and
//!   its declaration location is returned
//!
//! Later requests for the same assembly reuse the generated project.
//!
//! ## Crate layout
//!
//! - [`metadata`] - The read-only metadata model: modules, types, members, signatures
//! - [`resolver`] - Resolution of assembly references against a compilation
//! - [`decompiler`] - Syntax tree construction, transforms and C# output
//! - [`metasource`] - The metadata-as-source provider and its file cache
//! - [`naming`] - File and directory names that are valid on every platform
//! - [`file`] - Memory mapped binary images
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use dotsource::prelude::*;
//!
//! let mut builder = ModuleBuilder::new(
//!     "Foo.dll",
//!     AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 0, 0, 0)),
//! );
//! builder.add_type("Namespace.A", "Widget");
//! let module = Arc::new(builder.build());
//!
//! let project = WholeAssemblyDecompiler::new(DecompilerSettings::default())
//!     .decompile_to_memory(&module, &CancellationToken::none())?;
//! assert_eq!(project.len(), 2);
//! # Ok::<(), dotsource::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`]. Each [`Error`] carries a [`Severity`]:
//! degradable errors make the provider fall back to a stub, fatal errors are returned
//! to the caller, and cancellation aborts the request without touching the cache.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dotsource::prelude::*;
///
/// let key: SymbolKey = "T:Namespace.A.Widget".parse()?;
/// assert_eq!(key.type_name(), "Widget");
/// # Ok::<(), dotsource::Error>(())
/// ```
pub mod prelude;

/// C# generation: syntax tree, transforms, output and whole-assembly projects
pub mod decompiler;

/// Memory mapped and in-memory binary images
pub mod file;

/// The metadata model consumed by the decompiler
pub mod metadata;

/// Metadata-as-source navigation, generated projects and the file cache
pub mod metasource;

/// Platform independent file and directory names
pub mod naming;

/// Assembly reference resolution against a compilation
pub mod resolver;

/// Cancellation and shared helpers
pub mod utils;

/// `dotsource` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotsource` Error type
///
/// # Examples
///
/// ```rust
/// use dotsource::{Error, Severity};
///
/// let error = Error::Cancelled;
/// assert_eq!(error.severity(), Severity::Cancelled);
/// assert!(!error.is_fatal());
/// ```
pub use error::{Error, Severity};
