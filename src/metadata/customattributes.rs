//! Custom attributes and constant values.
//!
//! Attributes are kept in their decoded form: the attribute type plus the fixed and
//! named arguments. The same [`ConstantValue`] type also carries the default values of
//! literal fields (enum members and `const` fields).

use crate::metadata::{signatures::TypeReference, signatures::TypeSignature, token::Token};

/// A decoded constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// `true` / `false`
    Bool(bool),
    /// A UTF-16 character
    Char(char),
    /// Any signed integer
    Int(i64),
    /// Any unsigned integer
    UInt(u64),
    /// `float` or `double`
    Float(f64),
    /// A string literal
    String(String),
    /// The null reference
    Null,
    /// A `typeof(...)` argument
    Type(TypeSignature),
    /// An array argument
    Array(Vec<ConstantValue>),
}

/// A custom attribute applied to an assembly, module, type or member.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// The attribute type
    pub attribute_type: TypeReference,
    /// Namespace of the attribute type
    pub namespace: String,
    /// Name of the attribute type, including the `Attribute` suffix
    pub name: String,
    /// Positional constructor arguments
    pub fixed_arguments: Vec<ConstantValue>,
    /// Named field and property arguments
    pub named_arguments: Vec<(String, ConstantValue)>,
}

impl CustomAttribute {
    /// An attribute whose type lives in another assembly.
    #[must_use]
    pub fn external(assembly: &str, namespace: &str, name: &str) -> Self {
        CustomAttribute {
            attribute_type: TypeReference::external(assembly, namespace, name),
            namespace: namespace.to_string(),
            name: name.to_string(),
            fixed_arguments: Vec::new(),
            named_arguments: Vec::new(),
        }
    }

    /// An attribute whose type is defined by the module itself.
    #[must_use]
    pub fn defined(token: Token, namespace: &str, name: &str) -> Self {
        CustomAttribute {
            attribute_type: TypeReference::Definition(token),
            namespace: namespace.to_string(),
            name: name.to_string(),
            fixed_arguments: Vec::new(),
            named_arguments: Vec::new(),
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn with_argument(mut self, value: ConstantValue) -> Self {
        self.fixed_arguments.push(value);
        self
    }

    /// Appends a named argument.
    #[must_use]
    pub fn with_named_argument(mut self, name: &str, value: ConstantValue) -> Self {
        self.named_arguments.push((name.to_string(), value));
        self
    }

    /// Returns `true` if the attribute type has the given full name.
    #[must_use]
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }

    /// `Namespace.Name` of the attribute type.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// Returns `true` if any attribute in the list has the given full name.
#[must_use]
pub fn has_attribute(attributes: &[CustomAttribute], namespace: &str, name: &str) -> bool {
    attributes.iter().any(|attribute| attribute.is(namespace, name))
}
