//! The syntax tree produced by the decompiler.
//!
//! The tree is a tagged-variant representation of the C# that is eventually rendered:
//! namespaces contain types, types contain members, and every place that names a type
//! holds a [`TypeNode`]. Named type nodes carry the [`ResolvedType`] the type system
//! found for them, which is what the orchestrator inspects to discover further types
//! that belong in the output.
//!
//! Read-only traversal goes through [`Visitor`], in-place rewriting through
//! [`VisitorMut`]. Both come with `walk_*` functions that perform the default
//! recursion, so an implementation overrides only the nodes it cares about and calls
//! the matching `walk_*` function to continue below them.

use uguid::Guid;

use crate::metadata::{
    customattributes::ConstantValue, symbol::SymbolKey, token::Token, typedef::TypeKind,
};

/// One generated source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationUnit {
    /// `[assembly: ...]` and `[module: ...]` attributes
    pub assembly_attributes: Vec<Attribute>,
    /// Top-level declarations, usually namespaces
    pub members: Vec<SyntaxNode>,
}

/// A declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxNode {
    /// `namespace X { ... }`
    Namespace(NamespaceDeclaration),
    /// A class, struct, interface, enum or delegate
    Type(TypeDeclaration),
    /// A field or constant
    Field(FieldDeclaration),
    /// A member of an enum
    EnumMember(EnumMemberDeclaration),
    /// A method or constructor
    Method(MethodDeclaration),
    /// A property
    Property(PropertyDeclaration),
    /// An event
    Event(EventDeclaration),
}

impl SyntaxNode {
    /// The symbol declared by this node; `None` for namespaces.
    #[must_use]
    pub fn symbol(&self) -> Option<&SymbolKey> {
        match self {
            SyntaxNode::Namespace(_) => None,
            SyntaxNode::Type(declaration) => Some(&declaration.symbol),
            SyntaxNode::Field(declaration) => Some(&declaration.symbol),
            SyntaxNode::EnumMember(declaration) => Some(&declaration.symbol),
            SyntaxNode::Method(declaration) => Some(&declaration.symbol),
            SyntaxNode::Property(declaration) => Some(&declaration.symbol),
            SyntaxNode::Event(declaration) => Some(&declaration.symbol),
        }
    }
}

/// `namespace Name { members }`
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDeclaration {
    /// Dotted namespace name
    pub name: String,
    /// Declarations inside the namespace
    pub members: Vec<SyntaxNode>,
}

/// A type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDeclaration {
    /// Key of the declared type
    pub symbol: SymbolKey,
    /// Token of the type definition
    pub token: Token,
    /// Declaration keyword
    pub kind: TypeKind,
    /// Modifiers in output order (e.g. `public`, `static`)
    pub modifiers: Vec<&'static str>,
    /// Type name without the generic arity suffix
    pub name: String,
    /// Generic parameter names
    pub type_parameters: Vec<String>,
    /// Base type followed by interfaces; the underlying type for enums
    pub base_types: Vec<TypeNode>,
    /// Attributes on the type
    pub attributes: Vec<Attribute>,
    /// Member declarations, including nested types
    pub members: Vec<SyntaxNode>,
    /// `Invoke` signature of a delegate
    pub delegate_signature: Option<DelegateSignature>,
}

/// Return type and parameters of a delegate.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegateSignature {
    /// Return type
    pub return_type: TypeNode,
    /// Parameters
    pub parameters: Vec<ParameterDeclaration>,
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    /// Key of the field
    pub symbol: SymbolKey,
    /// Modifiers in output order
    pub modifiers: Vec<&'static str>,
    /// Field type
    pub type_node: TypeNode,
    /// Field name
    pub name: String,
    /// Value of constants
    pub initializer: Option<Expression>,
    /// Attributes on the field
    pub attributes: Vec<Attribute>,
}

/// A member of an enum.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMemberDeclaration {
    /// Key of the literal field
    pub symbol: SymbolKey,
    /// Member name
    pub name: String,
    /// Explicit value
    pub value: Option<Expression>,
    /// Attributes on the member
    pub attributes: Vec<Attribute>,
}

/// A method or constructor declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    /// Key of the method
    pub symbol: SymbolKey,
    /// Modifiers in output order
    pub modifiers: Vec<&'static str>,
    /// Return type; `None` for constructors
    pub return_type: Option<TypeNode>,
    /// Method name; the type name for constructors
    pub name: String,
    /// Generic parameter names
    pub type_parameters: Vec<String>,
    /// Parameters
    pub parameters: Vec<ParameterDeclaration>,
    /// Body statements; `None` renders as `;`
    pub body: Option<Vec<Statement>>,
    /// Attributes on the method
    pub attributes: Vec<Attribute>,
}

/// A property declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDeclaration {
    /// Key of the property
    pub symbol: SymbolKey,
    /// Modifiers in output order
    pub modifiers: Vec<&'static str>,
    /// Property type
    pub type_node: TypeNode,
    /// Property name
    pub name: String,
    /// `get` accessor
    pub getter: Option<Accessor>,
    /// `set` accessor
    pub setter: Option<Accessor>,
    /// Attributes on the property
    pub attributes: Vec<Attribute>,
}

/// A property accessor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accessor {
    /// Body statements; `None` renders as `get;`
    pub body: Option<Vec<Statement>>,
}

/// An event declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDeclaration {
    /// Key of the event
    pub symbol: SymbolKey,
    /// Modifiers in output order
    pub modifiers: Vec<&'static str>,
    /// Delegate type
    pub type_node: TypeNode,
    /// Event name
    pub name: String,
    /// Attributes on the event
    pub attributes: Vec<Attribute>,
}

/// A method or delegate parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDeclaration {
    /// Parameter type
    pub type_node: TypeNode,
    /// Parameter name
    pub name: String,
}

/// What the type system knows about a named type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedType {
    /// Version id of the module that defines the type; `None` if it could not be resolved
    pub module: Option<Guid>,
    /// Token of the definition inside that module
    pub token: Option<Token>,
    /// `Namespace.Outer+Inner` name
    pub full_name: String,
}

impl ResolvedType {
    /// A type that could not be resolved to a definition.
    #[must_use]
    pub fn unresolved(full_name: impl Into<String>) -> Self {
        ResolvedType {
            module: None,
            token: None,
            full_name: full_name.into(),
        }
    }

    /// The definition token if the type is defined by the module with `mvid`.
    #[must_use]
    pub fn definition_in(&self, mvid: &Guid) -> Option<Token> {
        match (&self.module, self.token) {
            (Some(module), Some(token)) if module == mvid => Some(token),
            _ => None,
        }
    }
}

/// A reference to a type in source form.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    /// A C# keyword type (`int`, `string`, ...)
    Primitive(&'static str),
    /// A named type
    Named {
        /// Dotted source name, nested types joined with `.`
        name: String,
        /// Generic arguments
        arguments: Vec<TypeNode>,
        /// Resolution of the named type
        resolved: ResolvedType,
    },
    /// An array with the given rank
    Array(Box<TypeNode>, u32),
    /// An unmanaged pointer
    Pointer(Box<TypeNode>),
    /// A `ref` type
    ByRef(Box<TypeNode>),
    /// A generic parameter by name
    GenericParameter(String),
}

/// A custom attribute in source form.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// `assembly` or `module` for attributes outside of declarations
    pub target: Option<&'static str>,
    /// `Namespace.Name` of the attribute type, including the `Attribute` suffix
    pub full_name: String,
    /// The attribute type
    pub type_node: TypeNode,
    /// Positional arguments
    pub arguments: Vec<Expression>,
    /// Named arguments
    pub named_arguments: Vec<(String, Expression)>,
}

/// An expression; only what attribute arguments and initializers need.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal
    Constant(ConstantValue),
    /// `typeof(T)`
    TypeOf(TypeNode),
    /// `new[] { ... }`
    Array(Vec<Expression>),
}

/// A statement of a reconstructed method body.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `T name;`
    LocalDeclaration {
        /// Local type
        type_node: TypeNode,
        /// Local name
        name: String,
    },
    /// `throw null;`
    ThrowNull,
}

/// Read-only traversal of a syntax tree.
pub trait Visitor {
    /// Visits a declaration.
    fn visit_node(&mut self, node: &SyntaxNode) {
        walk_node(self, node);
    }

    /// Visits a type reference.
    fn visit_type_node(&mut self, node: &TypeNode) {
        walk_type_node(self, node);
    }

    /// Visits an attribute.
    fn visit_attribute(&mut self, attribute: &Attribute) {
        walk_attribute(self, attribute);
    }

    /// Visits an expression.
    fn visit_expression(&mut self, expression: &Expression) {
        walk_expression(self, expression);
    }

    /// Visits a statement.
    fn visit_statement(&mut self, statement: &Statement) {
        walk_statement(self, statement);
    }
}

/// Visits every attribute and declaration of `unit`.
pub fn walk_unit<V: Visitor + ?Sized>(visitor: &mut V, unit: &CompilationUnit) {
    for attribute in &unit.assembly_attributes {
        visitor.visit_attribute(attribute);
    }
    for node in &unit.members {
        visitor.visit_node(node);
    }
}

fn walk_parameters<V: Visitor + ?Sized>(visitor: &mut V, parameters: &[ParameterDeclaration]) {
    for parameter in parameters {
        visitor.visit_type_node(&parameter.type_node);
    }
}

fn walk_body<V: Visitor + ?Sized>(visitor: &mut V, body: Option<&Vec<Statement>>) {
    for statement in body.into_iter().flatten() {
        visitor.visit_statement(statement);
    }
}

/// Default recursion below a declaration.
pub fn walk_node<V: Visitor + ?Sized>(visitor: &mut V, node: &SyntaxNode) {
    match node {
        SyntaxNode::Namespace(namespace) => {
            for member in &namespace.members {
                visitor.visit_node(member);
            }
        }
        SyntaxNode::Type(declaration) => {
            for attribute in &declaration.attributes {
                visitor.visit_attribute(attribute);
            }
            for base in &declaration.base_types {
                visitor.visit_type_node(base);
            }
            if let Some(signature) = &declaration.delegate_signature {
                visitor.visit_type_node(&signature.return_type);
                walk_parameters(visitor, &signature.parameters);
            }
            for member in &declaration.members {
                visitor.visit_node(member);
            }
        }
        SyntaxNode::Field(declaration) => {
            for attribute in &declaration.attributes {
                visitor.visit_attribute(attribute);
            }
            visitor.visit_type_node(&declaration.type_node);
            if let Some(initializer) = &declaration.initializer {
                visitor.visit_expression(initializer);
            }
        }
        SyntaxNode::EnumMember(declaration) => {
            for attribute in &declaration.attributes {
                visitor.visit_attribute(attribute);
            }
            if let Some(value) = &declaration.value {
                visitor.visit_expression(value);
            }
        }
        SyntaxNode::Method(declaration) => {
            for attribute in &declaration.attributes {
                visitor.visit_attribute(attribute);
            }
            if let Some(return_type) = &declaration.return_type {
                visitor.visit_type_node(return_type);
            }
            walk_parameters(visitor, &declaration.parameters);
            walk_body(visitor, declaration.body.as_ref());
        }
        SyntaxNode::Property(declaration) => {
            for attribute in &declaration.attributes {
                visitor.visit_attribute(attribute);
            }
            visitor.visit_type_node(&declaration.type_node);
            for accessor in [&declaration.getter, &declaration.setter].into_iter().flatten() {
                walk_body(visitor, accessor.body.as_ref());
            }
        }
        SyntaxNode::Event(declaration) => {
            for attribute in &declaration.attributes {
                visitor.visit_attribute(attribute);
            }
            visitor.visit_type_node(&declaration.type_node);
        }
    }
}

/// Default recursion below a type reference.
pub fn walk_type_node<V: Visitor + ?Sized>(visitor: &mut V, node: &TypeNode) {
    match node {
        TypeNode::Named { arguments, .. } => {
            for argument in arguments {
                visitor.visit_type_node(argument);
            }
        }
        TypeNode::Array(inner, _) | TypeNode::Pointer(inner) | TypeNode::ByRef(inner) => {
            visitor.visit_type_node(inner);
        }
        TypeNode::Primitive(_) | TypeNode::GenericParameter(_) => {}
    }
}

/// Default recursion below an attribute.
pub fn walk_attribute<V: Visitor + ?Sized>(visitor: &mut V, attribute: &Attribute) {
    visitor.visit_type_node(&attribute.type_node);
    for argument in &attribute.arguments {
        visitor.visit_expression(argument);
    }
    for (_, argument) in &attribute.named_arguments {
        visitor.visit_expression(argument);
    }
}

/// Default recursion below an expression.
pub fn walk_expression<V: Visitor + ?Sized>(visitor: &mut V, expression: &Expression) {
    match expression {
        Expression::Constant(_) => {}
        Expression::TypeOf(node) => visitor.visit_type_node(node),
        Expression::Array(elements) => {
            for element in elements {
                visitor.visit_expression(element);
            }
        }
    }
}

/// Default recursion below a statement.
pub fn walk_statement<V: Visitor + ?Sized>(visitor: &mut V, statement: &Statement) {
    match statement {
        Statement::LocalDeclaration { type_node, .. } => visitor.visit_type_node(type_node),
        Statement::ThrowNull => {}
    }
}

/// In-place rewriting of a syntax tree.
///
/// Attribute lists are exposed as a whole so a rewrite can drop attributes.
pub trait VisitorMut {
    /// Visits a declaration.
    fn visit_node_mut(&mut self, node: &mut SyntaxNode) {
        walk_node_mut(self, node);
    }

    /// Visits the attribute list of a declaration or compilation unit.
    fn visit_attributes_mut(&mut self, attributes: &mut Vec<Attribute>) {
        let _ = attributes;
    }

    /// Visits a type reference.
    fn visit_type_node_mut(&mut self, node: &mut TypeNode) {
        walk_type_node_mut(self, node);
    }

    /// Visits an identifier that names a declaration, parameter or local.
    fn visit_identifier_mut(&mut self, identifier: &mut String) {
        let _ = identifier;
    }
}

/// Rewrites every attribute list and declaration of `unit`.
pub fn walk_unit_mut<V: VisitorMut + ?Sized>(visitor: &mut V, unit: &mut CompilationUnit) {
    visitor.visit_attributes_mut(&mut unit.assembly_attributes);
    for node in &mut unit.members {
        visitor.visit_node_mut(node);
    }
}

fn walk_parameters_mut<V: VisitorMut + ?Sized>(
    visitor: &mut V,
    parameters: &mut [ParameterDeclaration],
) {
    for parameter in parameters {
        visitor.visit_type_node_mut(&mut parameter.type_node);
        visitor.visit_identifier_mut(&mut parameter.name);
    }
}

fn walk_body_mut<V: VisitorMut + ?Sized>(visitor: &mut V, body: Option<&mut Vec<Statement>>) {
    for statement in body.into_iter().flatten() {
        if let Statement::LocalDeclaration { type_node, name } = statement {
            visitor.visit_type_node_mut(type_node);
            visitor.visit_identifier_mut(name);
        }
    }
}

/// Default recursion below a declaration.
pub fn walk_node_mut<V: VisitorMut + ?Sized>(visitor: &mut V, node: &mut SyntaxNode) {
    match node {
        SyntaxNode::Namespace(namespace) => {
            for member in &mut namespace.members {
                visitor.visit_node_mut(member);
            }
        }
        SyntaxNode::Type(declaration) => {
            visitor.visit_attributes_mut(&mut declaration.attributes);
            visitor.visit_identifier_mut(&mut declaration.name);
            for parameter in &mut declaration.type_parameters {
                visitor.visit_identifier_mut(parameter);
            }
            for base in &mut declaration.base_types {
                visitor.visit_type_node_mut(base);
            }
            if let Some(signature) = &mut declaration.delegate_signature {
                visitor.visit_type_node_mut(&mut signature.return_type);
                walk_parameters_mut(visitor, &mut signature.parameters);
            }
            for member in &mut declaration.members {
                visitor.visit_node_mut(member);
            }
        }
        SyntaxNode::Field(declaration) => {
            visitor.visit_attributes_mut(&mut declaration.attributes);
            visitor.visit_type_node_mut(&mut declaration.type_node);
            visitor.visit_identifier_mut(&mut declaration.name);
        }
        SyntaxNode::EnumMember(declaration) => {
            visitor.visit_attributes_mut(&mut declaration.attributes);
            visitor.visit_identifier_mut(&mut declaration.name);
        }
        SyntaxNode::Method(declaration) => {
            visitor.visit_attributes_mut(&mut declaration.attributes);
            if let Some(return_type) = &mut declaration.return_type {
                visitor.visit_type_node_mut(return_type);
            }
            visitor.visit_identifier_mut(&mut declaration.name);
            for parameter in &mut declaration.type_parameters {
                visitor.visit_identifier_mut(parameter);
            }
            walk_parameters_mut(visitor, &mut declaration.parameters);
            walk_body_mut(visitor, declaration.body.as_mut());
        }
        SyntaxNode::Property(declaration) => {
            visitor.visit_attributes_mut(&mut declaration.attributes);
            visitor.visit_type_node_mut(&mut declaration.type_node);
            visitor.visit_identifier_mut(&mut declaration.name);
            if let Some(getter) = &mut declaration.getter {
                walk_body_mut(visitor, getter.body.as_mut());
            }
            if let Some(setter) = &mut declaration.setter {
                walk_body_mut(visitor, setter.body.as_mut());
            }
        }
        SyntaxNode::Event(declaration) => {
            visitor.visit_attributes_mut(&mut declaration.attributes);
            visitor.visit_type_node_mut(&mut declaration.type_node);
            visitor.visit_identifier_mut(&mut declaration.name);
        }
    }
}

/// Default recursion below a type reference.
pub fn walk_type_node_mut<V: VisitorMut + ?Sized>(visitor: &mut V, node: &mut TypeNode) {
    match node {
        TypeNode::Named { arguments, .. } => {
            for argument in arguments {
                visitor.visit_type_node_mut(argument);
            }
        }
        TypeNode::Array(inner, _) | TypeNode::Pointer(inner) | TypeNode::ByRef(inner) => {
            visitor.visit_type_node_mut(inner);
        }
        TypeNode::GenericParameter(name) => visitor.visit_identifier_mut(name),
        TypeNode::Primitive(_) => {}
    }
}
