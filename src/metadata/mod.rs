//! The metadata model consumed by the decompiler.
//!
//! This module holds a read-only, fully decoded view of a .NET module: tokens,
//! assembly identities, type definitions with their members, type signatures and
//! custom attributes. Turning a binary image into this model is delegated to a
//! [`module::ModuleReader`]; [`builder::ModuleBuilder`] assembles modules in code.
//!
//! # Key Components
//!
//! - [`module::Module`] - A loaded module with its types keyed by [`token::Token`]
//! - [`typedef::TypeDefinition`] - A type and its fields, methods, properties and events
//! - [`signatures::TypeSignature`] - The type of a value
//! - [`identity::AssemblyIdentity`] - Name, version, culture and public key token
//! - [`symbol::SymbolKey`] - A token-independent symbol name

/// Fluent module construction
pub mod builder;
/// Custom attributes and constants
pub mod customattributes;
/// Assembly identities and versions
pub mod identity;
/// Loaded modules and the reader seam
pub mod module;
/// Type signatures
pub mod signatures;
/// Symbol keys
pub mod symbol;
/// Metadata tokens
pub mod token;
/// Type definitions and members
pub mod typedef;
