//! Loaded modules.
//!
//! A [`Module`] is the immutable, fully loaded metadata of one assembly image: its
//! identity, its type definitions keyed by token, its assembly references and the
//! types it forwards to other assemblies. Modules are shared as [`ModuleRc`] between
//! the decompilation workers.
//!
//! Reading the binary format is the job of a [`ModuleReader`]; the pipeline only
//! depends on this trait, so hosts can plug in whatever metadata reader they already
//! have.

use std::{collections::HashSet, path::PathBuf, sync::Arc};

use crossbeam_skiplist::SkipMap;
use uguid::Guid;

use crate::{
    file::BinaryImage,
    metadata::{
        customattributes::{has_attribute, CustomAttribute},
        identity::AssemblyIdentity,
        token::Token,
        typedef::TypeDefinitionRc,
    },
    Result,
};

/// A map that holds the mapping of [`Token`] to parsed [`crate::metadata::typedef::TypeDefinition`]
pub type TypeDefinitionMap = SkipMap<Token, TypeDefinitionRc>;
/// A reference counted module
pub type ModuleRc = Arc<Module>;

/// The assembly manifest of a module.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyDefinition {
    /// Identity of the assembly
    pub identity: AssemblyIdentity,
    /// Assembly-level attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

/// A type that lives in another assembly but is still exported by this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedType {
    /// Namespace of the forwarded type
    pub namespace: String,
    /// Name of the forwarded type
    pub name: String,
    /// The assembly that now defines the type
    pub destination: AssemblyIdentity,
}

/// The metadata of one loaded assembly image.
#[derive(Debug)]
pub struct Module {
    /// Module file name (e.g. `Foo.dll`)
    pub name: String,
    /// Module version id; unique per compilation of the module
    pub mvid: Guid,
    /// The assembly manifest; `None` for netmodules
    pub assembly: Option<AssemblyDefinition>,
    /// Location of the image on disk, if it was loaded from a file
    pub location: Option<PathBuf>,
    /// All type definitions, including `<Module>` and nested types
    pub types: TypeDefinitionMap,
    /// Referenced assemblies
    pub assembly_references: Vec<AssemblyIdentity>,
    /// Module-level attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// Types forwarded to other assemblies
    pub forwarded_types: Vec<ForwardedType>,
}

impl Module {
    /// The assembly identity, or a name-only identity for netmodules.
    #[must_use]
    pub fn identity(&self) -> AssemblyIdentity {
        match &self.assembly {
            Some(assembly) => assembly.identity.clone(),
            None => AssemblyIdentity::new(
                self.name.trim_end_matches(".dll").trim_end_matches(".netmodule"),
                Default::default(),
            ),
        }
    }

    /// Assembly-level attributes, empty for netmodules.
    #[must_use]
    pub fn assembly_attributes(&self) -> &[CustomAttribute] {
        match &self.assembly {
            Some(assembly) => &assembly.custom_attributes,
            None => &[],
        }
    }

    /// Returns `true` if the assembly is marked with `ReferenceAssemblyAttribute`.
    ///
    /// Reference assemblies carry only signatures; their method bodies are stubs.
    #[must_use]
    pub fn is_reference_assembly(&self) -> bool {
        has_attribute(
            self.assembly_attributes(),
            "System.Runtime.CompilerServices",
            "ReferenceAssemblyAttribute",
        )
    }

    /// Looks up a type definition by token.
    #[must_use]
    pub fn type_definition(&self, token: Token) -> Option<TypeDefinitionRc> {
        self.types.get(&token).map(|entry| entry.value().clone())
    }

    /// All types that are not nested, in token order.
    #[must_use]
    pub fn top_level_types(&self) -> Vec<TypeDefinitionRc> {
        self.types
            .iter()
            .filter(|entry| !entry.value().is_nested())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Walks the declaring-type chain of `token` up to the outermost type.
    ///
    /// Returns `None` if the token is not a type of this module or the chain is broken
    /// or cyclic.
    #[must_use]
    pub fn outermost(&self, token: Token) -> Option<Token> {
        let mut current = self.type_definition(token)?;
        let mut seen = HashSet::new();
        while let Some(parent) = current.enclosing_type {
            if !seen.insert(current.token) {
                return None;
            }
            current = self.type_definition(parent)?;
        }
        Some(current.token)
    }

    /// The chain of type names from the outermost type down to `token`.
    ///
    /// `None` if the chain can not be walked (see [`Module::outermost`]).
    #[must_use]
    pub fn type_path(&self, token: Token) -> Option<Vec<TypeDefinitionRc>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.type_definition(token)?;
        loop {
            if !seen.insert(current.token) {
                return None;
            }
            chain.push(current.clone());
            match current.enclosing_type {
                Some(parent) => current = self.type_definition(parent)?,
                None => break,
            }
        }
        chain.reverse();
        Some(chain)
    }

    /// `Namespace.Outer+Inner` of a type.
    #[must_use]
    pub fn full_name(&self, token: Token) -> Option<String> {
        let chain = self.type_path(token)?;
        let names: Vec<&str> = chain.iter().map(|t| t.name.as_str()).collect();
        let joined = names.join("+");
        let namespace = &chain[0].namespace;
        Some(if namespace.is_empty() {
            joined
        } else {
            format!("{namespace}.{joined}")
        })
    }

    /// Finds a type by namespace and (`+`-separated for nested) name.
    #[must_use]
    pub fn find_type(&self, namespace: &str, name: &str) -> Option<TypeDefinitionRc> {
        let mut parts = name.split('+');
        let first = parts.next()?;
        let mut current = self
            .types
            .iter()
            .map(|entry| entry.value().clone())
            .find(|t| !t.is_nested() && t.namespace == namespace && t.name == first)?;

        for part in parts {
            current = current
                .nested_types
                .iter()
                .filter_map(|token| self.type_definition(*token))
                .find(|nested| nested.name == part)?;
        }
        Some(current)
    }

    /// Looks up a forwarded type by namespace and name.
    #[must_use]
    pub fn forwarded_type(&self, namespace: &str, name: &str) -> Option<&ForwardedType> {
        self.forwarded_types
            .iter()
            .find(|forwarded| forwarded.namespace == namespace && forwarded.name == name)
    }
}

/// Turns a binary image into a [`Module`].
///
/// Implementations must be usable from several threads; the resolver and the
/// decompilation run both load modules.
pub trait ModuleReader: Send + Sync {
    /// Reads the metadata of `image`.
    ///
    /// # Errors
    /// Returns an error if the image does not contain readable .NET metadata.
    fn read(&self, image: &BinaryImage) -> Result<ModuleRc>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        builder::ModuleBuilder,
        identity::{AssemblyIdentity, AssemblyVersion},
        typedef::Accessibility,
    };

    fn sample() -> (Module, Token, Token, Token) {
        let mut builder = ModuleBuilder::new(
            "Foo.dll",
            AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 0, 0, 0)),
        );
        let widget = builder.add_type("Namespace.A", "Widget").token();
        let helper = builder
            .add_nested_type(widget, "Helper")
            .accessibility(Accessibility::Private)
            .token();
        let inner = builder.add_nested_type(helper, "Inner").token();
        (builder.build(), widget, helper, inner)
    }

    #[test]
    fn test_top_level_types() {
        let (module, widget, _, _) = sample();
        let names: Vec<String> = module
            .top_level_types()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["<Module>".to_string(), "Widget".to_string()]);
        assert!(module.type_definition(widget).is_some());
    }

    #[test]
    fn test_outermost_and_full_name() {
        let (module, widget, helper, inner) = sample();
        assert_eq!(module.outermost(inner), Some(widget));
        assert_eq!(module.outermost(widget), Some(widget));
        assert_eq!(module.outermost(Token::new(0x0200_00ff)), None);
        assert_eq!(
            module.full_name(inner).as_deref(),
            Some("Namespace.A.Widget+Helper+Inner")
        );
        assert_eq!(
            module.find_type("Namespace.A", "Widget+Helper").map(|t| t.token),
            Some(helper)
        );
        assert!(module.find_type("Namespace.A", "Widget+Missing").is_none());
    }

    #[test]
    fn test_reference_assembly_marker() {
        let (module, _, _, _) = sample();
        assert!(!module.is_reference_assembly());

        let mut builder = ModuleBuilder::new(
            "Ref.dll",
            AssemblyIdentity::new("Ref", AssemblyVersion::new(1, 0, 0, 0)),
        );
        builder.add_assembly_attribute(CustomAttribute::external(
            "System.Runtime",
            "System.Runtime.CompilerServices",
            "ReferenceAssemblyAttribute",
        ));
        assert!(builder.build().is_reference_assembly());
    }
}
