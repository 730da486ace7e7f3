//! Type signatures.
//!
//! A [`TypeSignature`] describes the type of a field, parameter, return value, local
//! variable or base type. Named types are expressed through a [`TypeReference`], which
//! either points at a type definition of the same module or names a type defined in a
//! referenced assembly.

use crate::metadata::token::Token;

/// A reference to a named type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeReference {
    /// A type definition of the module that owns the signature.
    Definition(Token),
    /// A type defined in another assembly.
    External {
        /// Simple name of the assembly that defines the type
        assembly: String,
        /// Namespace of the type (empty for the global namespace)
        namespace: String,
        /// Name of the type; nested types use `Outer+Inner`
        name: String,
    },
}

impl TypeReference {
    /// Creates a reference to a type in another assembly.
    #[must_use]
    pub fn external(
        assembly: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeReference::External {
            assembly: assembly.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns the token if this references a definition of the owning module.
    #[must_use]
    pub fn definition(&self) -> Option<Token> {
        match self {
            TypeReference::Definition(token) => Some(*token),
            TypeReference::External { .. } => None,
        }
    }
}

/// The type of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TypeSignature {
    /// void
    #[default]
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// System.String
    String,
    /// System.Object
    Object,
    /// signed integer, sized to executing platform
    I,
    /// unsigned integer, sized to executing platform
    U,
    /// Type is referenced during runtime
    TypedByRef,
    /// Reference type
    Class(TypeReference),
    /// Value type
    ValueType(TypeReference),
    /// Generic type and its arguments
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// Single dimension, zero based array
    SzArray(Box<TypeSignature>),
    /// Multi dimensional array with the given rank
    Array(Box<TypeSignature>, u32),
    /// Unmanaged pointer
    Ptr(Box<TypeSignature>),
    /// Managed reference
    ByRef(Box<TypeSignature>),
    /// Generic parameter of the enclosing type, by index
    GenericParamType(u32),
    /// Generic parameter of the enclosing method, by index
    GenericParamMethod(u32),
}

impl TypeSignature {
    /// A reference type defined in the same module.
    #[must_use]
    pub fn class(token: Token) -> Self {
        TypeSignature::Class(TypeReference::Definition(token))
    }

    /// A value type defined in the same module.
    #[must_use]
    pub fn value_type(token: Token) -> Self {
        TypeSignature::ValueType(TypeReference::Definition(token))
    }

    /// Calls `f` for every [`TypeReference`] contained in the signature.
    pub fn for_each_reference<F: FnMut(&TypeReference)>(&self, f: &mut F) {
        match self {
            TypeSignature::Class(reference) | TypeSignature::ValueType(reference) => f(reference),
            TypeSignature::GenericInst(base, args) => {
                base.for_each_reference(f);
                for arg in args {
                    arg.for_each_reference(f);
                }
            }
            TypeSignature::SzArray(inner)
            | TypeSignature::Array(inner, _)
            | TypeSignature::Ptr(inner)
            | TypeSignature::ByRef(inner) => inner.for_each_reference(f),
            _ => {}
        }
    }

    /// The C# keyword for primitive signatures.
    #[must_use]
    pub fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            TypeSignature::Void => "void",
            TypeSignature::Boolean => "bool",
            TypeSignature::Char => "char",
            TypeSignature::I1 => "sbyte",
            TypeSignature::U1 => "byte",
            TypeSignature::I2 => "short",
            TypeSignature::U2 => "ushort",
            TypeSignature::I4 => "int",
            TypeSignature::U4 => "uint",
            TypeSignature::I8 => "long",
            TypeSignature::U8 => "ulong",
            TypeSignature::R4 => "float",
            TypeSignature::R8 => "double",
            TypeSignature::String => "string",
            TypeSignature::Object => "object",
            TypeSignature::I => "nint",
            TypeSignature::U => "nuint",
            TypeSignature::TypedByRef => "System.TypedReference",
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_each_reference_nested() {
        let signature = TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(TypeReference::external(
                "System.Collections",
                "System.Collections.Generic",
                "List`1",
            ))),
            vec![TypeSignature::SzArray(Box::new(TypeSignature::class(
                Token::new(0x0200_0003),
            )))],
        );

        let mut definitions = Vec::new();
        let mut externals = 0;
        signature.for_each_reference(&mut |reference| match reference.definition() {
            Some(token) => definitions.push(token),
            None => externals += 1,
        });

        assert_eq!(definitions, vec![Token::new(0x0200_0003)]);
        assert_eq!(externals, 1);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(TypeSignature::I4.keyword(), Some("int"));
        assert_eq!(TypeSignature::String.keyword(), Some("string"));
        assert_eq!(TypeSignature::class(Token::new(0x0200_0002)).keyword(), None);
    }
}
