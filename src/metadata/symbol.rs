//! Symbol keys.
//!
//! A [`SymbolKey`] names a type or member independently of tokens, so a symbol that
//! was picked in a compilation can be found again inside freshly generated source.
//! The text form follows documentation comment ids:
//!
//! ```text
//! T:Namespace.A.Widget+Helper
//! M:Namespace.A.Widget.Run
//! M:Namespace.A.Widget.#ctor
//! ```
//!
//! Overloads are not distinguished; a method key matches the first declaration with
//! that name.

use std::{fmt, str::FromStr};

use crate::{
    metadata::{module::Module, token::Token},
    Error, Result,
};

/// What kind of symbol a [`SymbolKey`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    /// A type (`T:`)
    Type,
    /// A method or constructor (`M:`)
    Method,
    /// A field (`F:`)
    Field,
    /// A property (`P:`)
    Property,
    /// An event (`E:`)
    Event,
}

impl SymbolKind {
    fn prefix(self) -> char {
        match self {
            SymbolKind::Type => 'T',
            SymbolKind::Method => 'M',
            SymbolKind::Field => 'F',
            SymbolKind::Property => 'P',
            SymbolKind::Event => 'E',
        }
    }

    fn from_prefix(prefix: char) -> Option<Self> {
        Some(match prefix {
            'T' => SymbolKind::Type,
            'M' => SymbolKind::Method,
            'F' => SymbolKind::Field,
            'P' => SymbolKind::Property,
            'E' => SymbolKind::Event,
            _ => return None,
        })
    }
}

/// A token-independent name of a type or member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolKey {
    /// Kind of symbol
    pub kind: SymbolKind,
    /// Namespace of the outermost type
    pub namespace: String,
    /// Type names from the outermost type down to the (containing) type
    pub type_path: Vec<String>,
    /// Member name; `None` for types
    pub member: Option<String>,
}

impl SymbolKey {
    /// A key for a type given by namespace and nesting path.
    #[must_use]
    pub fn for_type_path(namespace: &str, type_path: Vec<String>) -> Self {
        SymbolKey {
            kind: SymbolKind::Type,
            namespace: namespace.to_string(),
            type_path,
            member: None,
        }
    }

    /// The key of a type definition of `module`.
    #[must_use]
    pub fn for_type(module: &Module, token: Token) -> Option<Self> {
        let chain = module.type_path(token)?;
        Some(SymbolKey::for_type_path(
            &chain[0].namespace,
            chain.iter().map(|t| t.name.clone()).collect(),
        ))
    }

    /// The key of a member declared in the type `declaring`.
    #[must_use]
    pub fn for_member(module: &Module, declaring: Token, kind: SymbolKind, name: &str) -> Option<Self> {
        let mut key = SymbolKey::for_type(module, declaring)?;
        key.kind = kind;
        key.member = Some(name.to_string());
        Some(key)
    }

    /// Returns a member key inside this type key.
    #[must_use]
    pub fn member(&self, kind: SymbolKind, name: &str) -> Self {
        SymbolKey {
            kind,
            namespace: self.namespace.clone(),
            type_path: self.type_path.clone(),
            member: Some(name.to_string()),
        }
    }

    /// The key of the type that declares this symbol (the type itself for type keys).
    #[must_use]
    pub fn containing_type(&self) -> SymbolKey {
        SymbolKey::for_type_path(&self.namespace, self.type_path.clone())
    }

    /// The key of the outermost type containing this symbol.
    #[must_use]
    pub fn top_level_type(&self) -> SymbolKey {
        SymbolKey::for_type_path(&self.namespace, self.type_path.iter().take(1).cloned().collect())
    }

    /// `Outer+Inner` form of the type path.
    #[must_use]
    pub fn type_name(&self) -> String {
        self.type_path.join("+")
    }

    /// Finds the (containing) type of this key in `module`.
    #[must_use]
    pub fn resolve_type(&self, module: &Module) -> Option<Token> {
        module
            .find_type(&self.namespace, &self.type_name())
            .map(|definition| definition.token)
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.kind.prefix())?;
        if !self.namespace.is_empty() {
            write!(f, "{}.", self.namespace)?;
        }
        f.write_str(&self.type_name())?;
        if let Some(member) = &self.member {
            write!(f, ".{}", member.replace('.', "#"))?;
        }
        Ok(())
    }
}

impl FromStr for SymbolKey {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .and_then(SymbolKind::from_prefix)
            .ok_or_else(|| malformed_error!("Invalid symbol key kind - {}", text))?;
        let rest = text
            .get(1..)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| malformed_error!("Invalid symbol key - {}", text))?;

        let (type_part, member) = if kind == SymbolKind::Type {
            (rest, None)
        } else {
            let (type_part, member) = rest
                .rsplit_once('.')
                .ok_or_else(|| malformed_error!("Symbol key without member - {}", text))?;
            (type_part, Some(member.replace('#', ".")))
        };

        let mut type_path: Vec<String> = type_part.split('+').map(str::to_string).collect();
        let (namespace, outer) = match type_path[0].rsplit_once('.') {
            Some((namespace, outer)) => (namespace.to_string(), outer.to_string()),
            None => (String::new(), type_path[0].clone()),
        };
        type_path[0] = outer;

        if type_path.iter().any(String::is_empty) || member.as_deref() == Some("") {
            return Err(malformed_error!("Empty name in symbol key - {}", text));
        }

        Ok(SymbolKey {
            kind,
            namespace,
            type_path,
            member,
        })
    }
}
