//! Type definitions and their members.
//!
//! This is the read-only view the decompiler works on. Every definition carries its
//! [`Token`], so the orchestrator can key work units and the discovery set by token,
//! and the renderer can emit symbol keys for declared members.
//!
//! Visibility is kept as an [`Accessibility`] value next to the modifier flags rather
//! than as the raw visibility bits of the metadata tables; nested-ness follows from
//! [`TypeDefinition::enclosing_type`].

use std::sync::Arc;

use bitflags::bitflags;

use crate::metadata::{
    customattributes::{has_attribute, ConstantValue, CustomAttribute},
    signatures::{TypeReference, TypeSignature},
    token::Token,
};

/// A reference counted type definition.
pub type TypeDefinitionRc = Arc<TypeDefinition>;

/// Declared accessibility of a type or member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Accessibility {
    /// Accessible only by the parent type
    #[default]
    Private,
    /// Accessible by sub-types only in this assembly
    FamilyAndAssembly,
    /// Accessible by anyone in the assembly
    Assembly,
    /// Accessible only by type and sub-types
    Family,
    /// Accessible by sub-types anywhere, plus anyone in the assembly
    FamilyOrAssembly,
    /// Accessible by anyone
    Public,
}

impl Accessibility {
    /// The C# modifier for this accessibility.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            Accessibility::Private => "private",
            Accessibility::FamilyAndAssembly => "private protected",
            Accessibility::Assembly => "internal",
            Accessibility::Family => "protected",
            Accessibility::FamilyOrAssembly => "protected internal",
            Accessibility::Public => "public",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Type modifier flags
    pub struct TypeAttributes: u32 {
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type can not be derived from
        const SEALED = 0x0000_0100;
        /// Name has a special meaning
        const SPECIAL_NAME = 0x0000_0400;
        /// Type is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Static initializer may run before first field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Method modifier flags
    pub struct MethodAttributes: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method can not be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// Runtime checks the name encoding
        const RT_SPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Field modifier flags
    pub struct FieldAttributes: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized
        const INIT_ONLY = 0x0020;
        /// Value is a compile time constant
        const LITERAL = 0x0040;
        /// Name has a special meaning
        const SPECIAL_NAME = 0x0200;
        /// Field has a default value
        const HAS_DEFAULT = 0x8000;
    }
}

/// The C# declaration kind of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// `class`
    Class,
    /// `struct`
    Struct,
    /// `interface`
    Interface,
    /// `enum`
    Enum,
    /// `delegate`
    Delegate,
}

impl TypeKind {
    /// The declaration keyword.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
            TypeKind::Delegate => "delegate",
        }
    }
}

/// A generic parameter of a type or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParameter {
    /// Parameter name (e.g. `T`)
    pub name: String,
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub signature: TypeSignature,
}

/// A field of a type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// `Field` token
    pub token: Token,
    /// Field name
    pub name: String,
    /// Declared accessibility
    pub accessibility: Accessibility,
    /// Modifier flags
    pub flags: FieldAttributes,
    /// Field type
    pub signature: TypeSignature,
    /// Default value of literal fields
    pub constant: Option<ConstantValue>,
    /// Attributes applied to the field
    pub custom_attributes: Vec<CustomAttribute>,
}

/// A method of a type.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    /// `MethodDef` token
    pub token: Token,
    /// Method name (`.ctor` / `.cctor` for constructors)
    pub name: String,
    /// Declared accessibility
    pub accessibility: Accessibility,
    /// Modifier flags
    pub flags: MethodAttributes,
    /// Return type
    pub return_type: TypeSignature,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Generic parameters of the method
    pub generic_parameters: Vec<GenericParameter>,
    /// Local variable types of the body; `None` if the method has no body
    pub locals: Option<Vec<TypeSignature>>,
    /// Attributes applied to the method
    pub custom_attributes: Vec<CustomAttribute>,
}

impl MethodDefinition {
    /// Returns `true` for instance and static constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor" || self.name == ".cctor"
    }

    /// Returns `true` if the method is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodAttributes::STATIC)
    }
}

/// A property of a type.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    /// `Property` token
    pub token: Token,
    /// Property name
    pub name: String,
    /// Property type
    pub signature: TypeSignature,
    /// The getter method
    pub getter: Option<Token>,
    /// The setter method
    pub setter: Option<Token>,
    /// Attributes applied to the property
    pub custom_attributes: Vec<CustomAttribute>,
}

/// An event of a type.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    /// `Event` token
    pub token: Token,
    /// Event name
    pub name: String,
    /// Delegate type of the event
    pub signature: TypeSignature,
    /// The add accessor
    pub adder: Option<Token>,
    /// The remove accessor
    pub remover: Option<Token>,
    /// Attributes applied to the event
    pub custom_attributes: Vec<CustomAttribute>,
}

/// A type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    /// `TypeDef` token
    pub token: Token,
    /// Namespace; empty for the global namespace and for nested types
    pub namespace: String,
    /// Type name, including the generic arity suffix (e.g. ``List`1``)
    pub name: String,
    /// Declared accessibility
    pub accessibility: Accessibility,
    /// Modifier flags
    pub flags: TypeAttributes,
    /// Declaring type of a nested type
    pub enclosing_type: Option<Token>,
    /// Types nested in this type, in declaration order
    pub nested_types: Vec<Token>,
    /// Generic parameters
    pub generic_parameters: Vec<GenericParameter>,
    /// Base type; `None` for interfaces and `System.Object`
    pub base_type: Option<TypeSignature>,
    /// Implemented interfaces
    pub interfaces: Vec<TypeSignature>,
    /// Fields
    pub fields: Vec<FieldDefinition>,
    /// Methods, including accessors
    pub methods: Vec<MethodDefinition>,
    /// Properties
    pub properties: Vec<PropertyDefinition>,
    /// Events
    pub events: Vec<EventDefinition>,
    /// Attributes applied to the type
    pub custom_attributes: Vec<CustomAttribute>,
}

impl TypeDefinition {
    /// Creates an empty public class definition.
    #[must_use]
    pub fn new(token: Token, namespace: &str, name: &str) -> Self {
        TypeDefinition {
            token,
            namespace: namespace.to_string(),
            name: name.to_string(),
            accessibility: Accessibility::Public,
            flags: TypeAttributes::empty(),
            enclosing_type: None,
            nested_types: Vec::new(),
            generic_parameters: Vec::new(),
            base_type: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            custom_attributes: Vec::new(),
        }
    }

    /// Returns `true` if the type is declared inside another type.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.enclosing_type.is_some()
    }

    /// `Namespace.Name` for top-level types, the plain name otherwise.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// The name without its generic arity suffix.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        match self.name.find('`') {
            Some(pos) if pos > 0 => &self.name[..pos],
            _ => &self.name,
        }
    }

    /// Derives the declaration kind from the flags and the base type.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        if self.flags.contains(TypeAttributes::INTERFACE) {
            return TypeKind::Interface;
        }

        match &self.base_type {
            Some(TypeSignature::Class(TypeReference::External {
                namespace, name, ..
            })) if namespace == "System" => match name.as_str() {
                "Enum" => TypeKind::Enum,
                "ValueType" => TypeKind::Struct,
                "MulticastDelegate" => TypeKind::Delegate,
                _ => TypeKind::Class,
            },
            _ => TypeKind::Class,
        }
    }

    /// Returns `true` if the type is marked with `CompilerGeneratedAttribute`.
    #[must_use]
    pub fn is_compiler_generated(&self) -> bool {
        has_attribute(
            &self.custom_attributes,
            "System.Runtime.CompilerServices",
            "CompilerGeneratedAttribute",
        )
    }

    /// Looks up a method by token.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodDefinition> {
        self.methods.iter().find(|method| method.token == token)
    }

    /// Returns `true` if the method is a property or event accessor.
    #[must_use]
    pub fn is_accessor(&self, token: Token) -> bool {
        self.properties
            .iter()
            .any(|property| property.getter == Some(token) || property.setter == Some(token))
            || self
                .events
                .iter()
                .any(|event| event.adder == Some(token) || event.remover == Some(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_base(namespace: &str, name: &str) -> TypeDefinition {
        let mut definition = TypeDefinition::new(Token::new(0x0200_0002), "Ns", "T");
        definition.base_type = Some(TypeSignature::Class(TypeReference::external(
            "System.Runtime",
            namespace,
            name,
        )));
        definition
    }

    #[test]
    fn test_kind_from_base_type() {
        assert_eq!(with_base("System", "Enum").kind(), TypeKind::Enum);
        assert_eq!(with_base("System", "ValueType").kind(), TypeKind::Struct);
        assert_eq!(
            with_base("System", "MulticastDelegate").kind(),
            TypeKind::Delegate
        );
        assert_eq!(with_base("System", "Exception").kind(), TypeKind::Class);
        assert_eq!(with_base("Other", "Enum").kind(), TypeKind::Class);

        let mut interface = TypeDefinition::new(Token::new(0x0200_0003), "Ns", "IThing");
        interface.flags = TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;
        assert_eq!(interface.kind(), TypeKind::Interface);
    }

    #[test]
    fn test_names() {
        let definition = TypeDefinition::new(Token::new(0x0200_0002), "Ns.A", "List`1");
        assert_eq!(definition.qualified_name(), "Ns.A.List`1");
        assert_eq!(definition.simple_name(), "List");

        let global = TypeDefinition::new(Token::new(0x0200_0003), "", "`Odd");
        assert_eq!(global.qualified_name(), "`Odd");
        assert_eq!(global.simple_name(), "`Odd");
    }

    #[test]
    fn test_accessor_detection() {
        let mut definition = TypeDefinition::new(Token::new(0x0200_0002), "Ns", "T");
        definition.properties.push(PropertyDefinition {
            token: Token::new(0x1700_0001),
            name: "Value".into(),
            signature: TypeSignature::I4,
            getter: Some(Token::new(0x0600_0001)),
            setter: None,
            custom_attributes: Vec::new(),
        });
        assert!(definition.is_accessor(Token::new(0x0600_0001)));
        assert!(!definition.is_accessor(Token::new(0x0600_0002)));
    }
}
