//! The type system of one decompilation run.
//!
//! Consists of the main module plus every referenced module the resolver could load.
//! References that can not be loaded are skipped; types from them stay unresolved,
//! which only matters for discovery, never for rendering.

use std::sync::Arc;

use uguid::Guid;

use crate::{
    decompiler::syntax::ResolvedType,
    metadata::{
        module::{ModuleRc, ModuleReader},
        signatures::TypeReference,
    },
    resolver::AssemblyResolver,
};

/// Resolves type references against the main module and its references.
pub struct DecompilerTypeSystem {
    main: ModuleRc,
    referenced: Vec<ModuleRc>,
}

impl DecompilerTypeSystem {
    /// A type system that only knows the main module.
    #[must_use]
    pub fn new(main: ModuleRc) -> Self {
        DecompilerTypeSystem {
            main,
            referenced: Vec::new(),
        }
    }

    /// Loads every assembly reference of `main` through `resolver` and `reader`.
    #[must_use]
    pub fn with_references(
        main: ModuleRc,
        resolver: &dyn AssemblyResolver,
        reader: &dyn ModuleReader,
    ) -> Self {
        let mut referenced = Vec::new();
        for reference in &main.assembly_references {
            let Some(image) = resolver.resolve(reference) else {
                log::debug!("Reference '{reference}' could not be resolved");
                continue;
            };
            match reader.read(&image) {
                Ok(module) => referenced.push(module),
                Err(error) => log::warn!("Failed to read '{reference}': {error}"),
            }
        }

        DecompilerTypeSystem { main, referenced }
    }

    /// The module being decompiled.
    #[must_use]
    pub fn main_module(&self) -> &ModuleRc {
        &self.main
    }

    /// The referenced modules that could be loaded.
    #[must_use]
    pub fn referenced_modules(&self) -> &[ModuleRc] {
        &self.referenced
    }

    /// Version id of the main module.
    #[must_use]
    pub fn main_mvid(&self) -> Guid {
        self.main.mvid
    }

    /// Resolves `reference` to the module that defines it.
    ///
    /// Forwarded types are followed one hop into the referenced modules.
    #[must_use]
    pub fn resolve(&self, reference: &TypeReference) -> ResolvedType {
        match reference {
            TypeReference::Definition(token) => match self.main.full_name(*token) {
                Some(full_name) => ResolvedType {
                    module: Some(self.main.mvid),
                    token: Some(*token),
                    full_name,
                },
                None => ResolvedType::unresolved(token.to_string()),
            },
            TypeReference::External {
                assembly,
                namespace,
                name,
            } => {
                let full_name = if namespace.is_empty() {
                    name.clone()
                } else {
                    format!("{namespace}.{name}")
                };

                let owner = self
                    .referenced
                    .iter()
                    .find(|module| module.identity().name.eq_ignore_ascii_case(assembly));
                let Some(owner) = owner else {
                    return ResolvedType::unresolved(full_name);
                };

                if let Some(definition) = owner.find_type(namespace, name) {
                    return ResolvedType {
                        module: Some(owner.mvid),
                        token: Some(definition.token),
                        full_name,
                    };
                }

                let forwarded = owner
                    .forwarded_type(namespace, name)
                    .and_then(|forwarded| {
                        self.referenced.iter().find(|module| {
                            module.identity().name == forwarded.destination.name
                        })
                    })
                    .and_then(|destination| {
                        destination
                            .find_type(namespace, name)
                            .map(|definition| (destination.mvid, definition.token))
                    });
                match forwarded {
                    Some((module, token)) => ResolvedType {
                        module: Some(module),
                        token: Some(token),
                        full_name,
                    },
                    None => ResolvedType::unresolved(full_name),
                }
            }
        }
    }
}

impl From<ModuleRc> for DecompilerTypeSystem {
    fn from(main: ModuleRc) -> Self {
        DecompilerTypeSystem::new(main)
    }
}

/// A type system shared by all workers of a run.
pub type DecompilerTypeSystemRc = Arc<DecompilerTypeSystem>;
