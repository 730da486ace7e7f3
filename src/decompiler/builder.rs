//! Builds syntax trees from type definitions.
//!
//! [`TypeDecompiler`] turns a set of type definitions into one [`CompilationUnit`]:
//! declarations grouped by namespace, nested types inside their declaring type, and
//! member bodies reconstructed from the local variable signatures. Afterwards the
//! configured [`AstTransform`]s run over the tree.
//!
//! A decompiler instance carries the transforms and their state, so every work unit
//! of a run gets its own instance; only the [`DecompilerTypeSystem`] is shared.

use std::sync::Arc;

use crate::{
    decompiler::{
        settings::DecompilerSettings,
        syntax::{
            Accessor, Attribute, CompilationUnit, DelegateSignature, EnumMemberDeclaration,
            EventDeclaration, Expression, FieldDeclaration, MethodDeclaration,
            NamespaceDeclaration, ParameterDeclaration, PropertyDeclaration, Statement,
            SyntaxNode, TypeDeclaration, TypeNode,
        },
        transforms::{AstTransform, EscapeInvalidIdentifiers, RemoveClsCompliantAttribute},
        typesystem::DecompilerTypeSystem,
    },
    metadata::{
        customattributes::{has_attribute, ConstantValue, CustomAttribute},
        module::Module,
        signatures::{TypeReference, TypeSignature},
        symbol::{SymbolKey, SymbolKind},
        token::{Token, TABLE_FIELD, TABLE_METHOD_DEF, TABLE_TYPE_DEF},
        typedef::{
            Accessibility, FieldAttributes, FieldDefinition, GenericParameter, MethodAttributes,
            MethodDefinition, TypeAttributes, TypeDefinition, TypeKind,
        },
    },
    utils::CancellationToken,
    Error, Result,
};

const COMPILER_SERVICES: &str = "System.Runtime.CompilerServices";

fn has_generated_name(name: &str) -> bool {
    name.starts_with('<') || name.contains("<>")
}

fn is_compiler_generated(attributes: &[CustomAttribute], name: &str) -> bool {
    has_generated_name(name)
        || has_attribute(attributes, COMPILER_SERVICES, "CompilerGeneratedAttribute")
}

fn implements(definition: &TypeDefinition, namespace: &str, name: &str) -> bool {
    definition.interfaces.iter().any(|interface| {
        let mut found = false;
        interface.for_each_reference(&mut |reference| {
            if let TypeReference::External {
                namespace: ns,
                name: n,
                ..
            } = reference
            {
                found |= ns == namespace && n == name;
            }
        });
        found
    })
}

/// Returns `true` if a type is a compiler-generated helper folded away by `settings`.
fn type_is_hidden(definition: &TypeDefinition, settings: &DecompilerSettings) -> bool {
    let name = definition.name.as_str();
    if !is_compiler_generated(&definition.custom_attributes, name) {
        return false;
    }

    if settings.anonymous_methods
        && (name == "<>c" || name.contains("DisplayClass") || name.contains("AnonStorey"))
    {
        return true;
    }
    if settings.anonymous_types && has_generated_name(name) && name.contains("AnonymousType") {
        return true;
    }
    if name.starts_with('<') && name.contains(">d__") {
        let is_async = implements(definition, COMPILER_SERVICES, "IAsyncStateMachine");
        if (is_async && settings.async_await) || (!is_async && settings.yield_return) {
            return true;
        }
    }
    if settings.fixed_buffers && name.starts_with('<') && name.contains("__FixedBuffer") {
        return true;
    }
    settings.array_initializers && name.starts_with("<PrivateImplementationDetails>")
}

fn field_is_hidden(field: &FieldDefinition, settings: &DecompilerSettings) -> bool {
    if !is_compiler_generated(&field.custom_attributes, &field.name) {
        return false;
    }
    if settings.automatic_properties && field.name.ends_with(">k__BackingField") {
        return true;
    }
    settings.anonymous_methods && (field.name.starts_with("CS$<>") || field.name.starts_with("<>9"))
}

fn method_is_hidden(method: &MethodDefinition, settings: &DecompilerSettings) -> bool {
    settings.anonymous_methods
        && is_compiler_generated(&method.custom_attributes, &method.name)
        && method.name.starts_with('<')
        && method.name.contains(">b__")
}

/// Returns `true` if the type, field or method `token` is hidden by `settings`.
///
/// Hidden members are compiler-generated implementation details of constructs the
/// decompiler folds back into source form. Only members carrying the
/// compiler-generated marker or a compiler-reserved name are ever hidden; unknown
/// tokens are not.
#[must_use]
pub fn member_is_hidden(module: &Module, token: Token, settings: &DecompilerSettings) -> bool {
    match token.table() {
        TABLE_TYPE_DEF => module
            .type_definition(token)
            .is_some_and(|definition| type_is_hidden(&definition, settings)),
        TABLE_FIELD => module.types.iter().any(|entry| {
            entry
                .value()
                .fields
                .iter()
                .any(|field| field.token == token && field_is_hidden(field, settings))
        }),
        TABLE_METHOD_DEF => module.types.iter().any(|entry| {
            entry
                .value()
                .method(token)
                .is_some_and(|method| method_is_hidden(method, settings))
        }),
        _ => false,
    }
}

/// Generic parameters in scope of a signature.
#[derive(Clone, Copy)]
struct GenericContext<'a> {
    type_parameters: &'a [GenericParameter],
    method_parameters: &'a [GenericParameter],
}

impl<'a> GenericContext<'a> {
    fn of_type(definition: &'a TypeDefinition) -> Self {
        GenericContext {
            type_parameters: &definition.generic_parameters,
            method_parameters: &[],
        }
    }

    fn with_method(self, method: &'a MethodDefinition) -> Self {
        GenericContext {
            method_parameters: &method.generic_parameters,
            ..self
        }
    }
}

/// Source name of a metadata type name: nesting joined with `.`, arity removed.
fn source_name(full_name: &str) -> String {
    full_name
        .split('+')
        .map(|segment| match segment.find('`') {
            Some(pos) if pos > 0 => &segment[..pos],
            _ => segment,
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn type_modifiers(definition: &TypeDefinition, kind: TypeKind) -> Vec<&'static str> {
    let mut modifiers = Vec::new();
    if definition.is_nested() {
        modifiers.push(definition.accessibility.keyword());
    } else if definition.accessibility == Accessibility::Public {
        modifiers.push("public");
    } else {
        modifiers.push("internal");
    }

    if kind == TypeKind::Class {
        let abstract_ = definition.flags.contains(TypeAttributes::ABSTRACT);
        let sealed = definition.flags.contains(TypeAttributes::SEALED);
        match (abstract_, sealed) {
            (true, true) => modifiers.push("static"),
            (true, false) => modifiers.push("abstract"),
            (false, true) => modifiers.push("sealed"),
            (false, false) => {}
        }
    }
    modifiers
}

fn method_modifiers(method: &MethodDefinition, in_interface: bool) -> Vec<&'static str> {
    let mut modifiers = Vec::new();
    if !in_interface {
        modifiers.push(method.accessibility.keyword());
    }

    let flags = method.flags;
    if flags.contains(MethodAttributes::STATIC) {
        modifiers.push("static");
    }
    if flags.contains(MethodAttributes::PINVOKE_IMPL) {
        modifiers.push("extern");
    }
    if in_interface {
        return modifiers;
    }

    if flags.contains(MethodAttributes::ABSTRACT) {
        modifiers.push("abstract");
    } else if flags.contains(MethodAttributes::VIRTUAL) {
        if !flags.contains(MethodAttributes::NEW_SLOT) {
            if flags.contains(MethodAttributes::FINAL) {
                modifiers.push("sealed");
            }
            modifiers.push("override");
        } else if !flags.contains(MethodAttributes::FINAL) {
            modifiers.push("virtual");
        }
    }
    modifiers
}

fn field_modifiers(field: &FieldDefinition) -> Vec<&'static str> {
    let mut modifiers = vec![field.accessibility.keyword()];
    if field.flags.contains(FieldAttributes::LITERAL) {
        modifiers.push("const");
        return modifiers;
    }
    if field.flags.contains(FieldAttributes::STATIC) {
        modifiers.push("static");
    }
    if field.flags.contains(FieldAttributes::INIT_ONLY) {
        modifiers.push("readonly");
    }
    modifiers
}

fn is_system_object(signature: &TypeSignature) -> bool {
    matches!(signature, TypeSignature::Object)
        || matches!(
            signature,
            TypeSignature::Class(TypeReference::External { namespace, name, .. })
                if namespace == "System" && name == "Object"
        )
}

/// Decompiles type definitions of one module into syntax trees.
pub struct TypeDecompiler {
    type_system: Arc<DecompilerTypeSystem>,
    settings: DecompilerSettings,
    transforms: Vec<Box<dyn AstTransform>>,
    signatures_only: bool,
}

impl TypeDecompiler {
    /// Creates a decompiler that escapes identifiers and drops `CLSCompliant` attributes.
    #[must_use]
    pub fn new(type_system: Arc<DecompilerTypeSystem>, settings: DecompilerSettings) -> Self {
        TypeDecompiler {
            type_system,
            settings,
            transforms: vec![
                Box::new(RemoveClsCompliantAttribute),
                Box::new(EscapeInvalidIdentifiers),
            ],
            signatures_only: false,
        }
    }

    /// Appends a transform; transforms run in the order they were added.
    #[must_use]
    pub fn with_transform(mut self, transform: Box<dyn AstTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Renders members without bodies.
    #[must_use]
    pub fn signatures_only(mut self, signatures_only: bool) -> Self {
        self.signatures_only = signatures_only;
        self
    }

    /// The settings in use.
    #[must_use]
    pub fn settings(&self) -> &DecompilerSettings {
        &self.settings
    }

    fn module(&self) -> &Module {
        self.type_system.main_module()
    }

    fn run_transforms(&self, unit: &mut CompilationUnit) {
        for transform in &self.transforms {
            log::trace!("Running transform {}", transform.name());
            transform.run(unit);
        }
    }

    /// Decompiles the given types into one compilation unit.
    ///
    /// Types are grouped by namespace in the order they are given.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if a token is not a type of the module and
    /// [`Error::Cancelled`] if `cancellation` is raised while building.
    pub fn decompile_types(
        &self,
        tokens: &[Token],
        cancellation: &CancellationToken,
    ) -> Result<CompilationUnit> {
        let mut namespaces: Vec<NamespaceDeclaration> = Vec::new();
        let mut global = Vec::new();

        for token in tokens {
            check_cancelled!(cancellation);

            let chain = self
                .module()
                .type_path(*token)
                .ok_or(Error::TypeNotFound(*token))?;
            let namespace = chain[0].namespace.clone();
            let declaration = self.build_type(&chain[chain.len() - 1], cancellation)?;

            if namespace.is_empty() {
                global.push(SyntaxNode::Type(declaration));
                continue;
            }
            match namespaces.iter_mut().find(|n| n.name == namespace) {
                Some(existing) => existing.members.push(SyntaxNode::Type(declaration)),
                None => namespaces.push(NamespaceDeclaration {
                    name: namespace,
                    members: vec![SyntaxNode::Type(declaration)],
                }),
            }
        }

        let mut unit = CompilationUnit {
            assembly_attributes: Vec::new(),
            members: global
                .into_iter()
                .chain(namespaces.into_iter().map(SyntaxNode::Namespace))
                .collect(),
        };
        self.run_transforms(&mut unit);
        Ok(unit)
    }

    /// Decompiles the assembly and module attributes, plus an `AssemblyVersion`
    /// attribute taken from the assembly identity.
    ///
    /// # Errors
    /// Currently infallible; the signature matches [`TypeDecompiler::decompile_types`].
    pub fn decompile_module_and_assembly_attributes(&self) -> Result<CompilationUnit> {
        let module = self.module();
        let mut attributes = Vec::new();
        for attribute in module.assembly_attributes() {
            attributes.push(self.build_attribute(attribute, Some("assembly")));
        }
        for attribute in &module.custom_attributes {
            attributes.push(self.build_attribute(attribute, Some("module")));
        }

        if module.assembly.is_some()
            && !has_attribute(
                module.assembly_attributes(),
                "System.Reflection",
                "AssemblyVersionAttribute",
            )
        {
            let version = CustomAttribute::external(
                "System.Runtime",
                "System.Reflection",
                "AssemblyVersionAttribute",
            )
            .with_argument(ConstantValue::String(module.identity().version.to_string()));
            attributes.push(self.build_attribute(&version, Some("assembly")));
        }

        let mut unit = CompilationUnit {
            assembly_attributes: attributes,
            members: Vec::new(),
        };
        self.run_transforms(&mut unit);
        Ok(unit)
    }

    fn symbol(&self, token: Token) -> Result<SymbolKey> {
        SymbolKey::for_type(self.module(), token).ok_or(Error::TypeNotFound(token))
    }

    fn build_type(
        &self,
        definition: &TypeDefinition,
        cancellation: &CancellationToken,
    ) -> Result<TypeDeclaration> {
        let symbol = self.symbol(definition.token)?;
        let kind = definition.kind();
        let context = GenericContext::of_type(definition);

        let mut declaration = TypeDeclaration {
            symbol: symbol.clone(),
            token: definition.token,
            kind,
            modifiers: type_modifiers(definition, kind),
            name: definition.simple_name().to_string(),
            type_parameters: definition
                .generic_parameters
                .iter()
                .map(|parameter| parameter.name.clone())
                .collect(),
            base_types: Vec::new(),
            attributes: self.build_attributes(&definition.custom_attributes),
            members: Vec::new(),
            delegate_signature: None,
        };

        match kind {
            TypeKind::Class => {
                if let Some(base) = definition.base_type.as_ref().filter(|b| !is_system_object(b)) {
                    declaration.base_types.push(self.type_node(base, context));
                }
            }
            TypeKind::Enum => {
                let underlying = definition
                    .fields
                    .iter()
                    .find(|field| field.name == "value__")
                    .filter(|field| field.signature != TypeSignature::I4);
                if let Some(field) = underlying {
                    declaration.base_types.push(self.type_node(&field.signature, context));
                }
            }
            TypeKind::Delegate => {
                if let Some(invoke) = definition.methods.iter().find(|m| m.name == "Invoke") {
                    let context = context.with_method(invoke);
                    declaration.delegate_signature = Some(DelegateSignature {
                        return_type: self.type_node(&invoke.return_type, context),
                        parameters: self.build_parameters(invoke, context),
                    });
                }
                return Ok(declaration);
            }
            TypeKind::Struct | TypeKind::Interface => {}
        }
        if kind != TypeKind::Enum {
            for interface in &definition.interfaces {
                declaration.base_types.push(self.type_node(interface, context));
            }
        }

        for nested in &definition.nested_types {
            check_cancelled!(cancellation);
            let Some(nested) = self.module().type_definition(*nested) else {
                // Signature stubs keep whatever part of the type still resolves.
                if self.signatures_only {
                    log::warn!(
                        "Skipping unresolved nested type {} of '{}'",
                        nested,
                        definition.name
                    );
                    continue;
                }
                return Err(Error::TypeNotFound(*nested));
            };
            if type_is_hidden(&nested, &self.settings) {
                continue;
            }
            declaration
                .members
                .push(SyntaxNode::Type(self.build_type(&nested, cancellation)?));
        }

        for field in &definition.fields {
            if field_is_hidden(field, &self.settings) {
                continue;
            }
            if kind == TypeKind::Enum {
                if field.flags.contains(FieldAttributes::LITERAL) {
                    declaration.members.push(SyntaxNode::EnumMember(EnumMemberDeclaration {
                        symbol: symbol.member(SymbolKind::Field, &field.name),
                        name: field.name.clone(),
                        value: field.constant.clone().map(|value| self.expression(value, context)),
                        attributes: self.build_attributes(&field.custom_attributes),
                    }));
                }
                continue;
            }
            declaration.members.push(SyntaxNode::Field(FieldDeclaration {
                symbol: symbol.member(SymbolKind::Field, &field.name),
                modifiers: field_modifiers(field),
                type_node: self.type_node(&field.signature, context),
                name: field.name.clone(),
                initializer: field
                    .constant
                    .clone()
                    .filter(|_| field.flags.contains(FieldAttributes::LITERAL))
                    .map(|value| self.expression(value, context)),
                attributes: self.build_attributes(&field.custom_attributes),
            }));
        }

        let in_interface = kind == TypeKind::Interface;
        for property in &definition.properties {
            check_cancelled!(cancellation);
            let getter = property.getter.and_then(|token| definition.method(token));
            let setter = property.setter.and_then(|token| definition.method(token));
            let Some(primary) = getter.or(setter) else {
                continue;
            };
            declaration.members.push(SyntaxNode::Property(PropertyDeclaration {
                symbol: symbol.member(SymbolKind::Property, &property.name),
                modifiers: method_modifiers(primary, in_interface),
                type_node: self.type_node(&property.signature, context),
                name: property.name.clone(),
                getter: getter.map(|method| Accessor {
                    body: self.body(method, context),
                }),
                setter: setter.map(|method| Accessor {
                    body: self.body(method, context),
                }),
                attributes: self.build_attributes(&property.custom_attributes),
            }));
        }

        for event in &definition.events {
            let modifiers = event
                .adder
                .and_then(|token| definition.method(token))
                .map_or_else(Vec::new, |adder| method_modifiers(adder, in_interface));
            declaration.members.push(SyntaxNode::Event(EventDeclaration {
                symbol: symbol.member(SymbolKind::Event, &event.name),
                modifiers,
                type_node: self.type_node(&event.signature, context),
                name: event.name.clone(),
                attributes: self.build_attributes(&event.custom_attributes),
            }));
        }

        for method in &definition.methods {
            check_cancelled!(cancellation);
            if definition.is_accessor(method.token) || method_is_hidden(method, &self.settings) {
                continue;
            }
            let method_context = context.with_method(method);
            let is_constructor = method.is_constructor();
            let modifiers = if method.name == ".cctor" {
                vec!["static"]
            } else {
                method_modifiers(method, in_interface)
            };
            declaration.members.push(SyntaxNode::Method(MethodDeclaration {
                symbol: symbol.member(SymbolKind::Method, &method.name),
                modifiers,
                return_type: (!is_constructor)
                    .then(|| self.type_node(&method.return_type, method_context)),
                name: if is_constructor {
                    definition.simple_name().to_string()
                } else {
                    method.name.clone()
                },
                type_parameters: method
                    .generic_parameters
                    .iter()
                    .map(|parameter| parameter.name.clone())
                    .collect(),
                parameters: self.build_parameters(method, method_context),
                body: self.body(method, method_context),
                attributes: self.build_attributes(&method.custom_attributes),
            }));
        }

        Ok(declaration)
    }

    fn build_parameters(
        &self,
        method: &MethodDefinition,
        context: GenericContext<'_>,
    ) -> Vec<ParameterDeclaration> {
        method
            .parameters
            .iter()
            .map(|parameter| ParameterDeclaration {
                type_node: self.type_node(&parameter.signature, context),
                name: parameter.name.clone(),
            })
            .collect()
    }

    /// One declaration per local followed by `throw null;`; `None` without a body.
    fn body(&self, method: &MethodDefinition, context: GenericContext<'_>) -> Option<Vec<Statement>> {
        if self.signatures_only || method.flags.contains(MethodAttributes::ABSTRACT) {
            return None;
        }
        let locals = method.locals.as_ref()?;

        let mut statements: Vec<Statement> = locals
            .iter()
            .enumerate()
            .map(|(index, local)| Statement::LocalDeclaration {
                type_node: self.type_node(local, context),
                name: format!("V_{index}"),
            })
            .collect();
        statements.push(Statement::ThrowNull);
        Some(statements)
    }

    fn build_attributes(&self, attributes: &[CustomAttribute]) -> Vec<Attribute> {
        attributes
            .iter()
            .map(|attribute| self.build_attribute(attribute, None))
            .collect()
    }

    fn build_attribute(&self, attribute: &CustomAttribute, target: Option<&'static str>) -> Attribute {
        let context = GenericContext {
            type_parameters: &[],
            method_parameters: &[],
        };
        let full_name = attribute.full_name();
        Attribute {
            target,
            type_node: TypeNode::Named {
                name: source_name(&full_name),
                arguments: Vec::new(),
                resolved: self.type_system.resolve(&attribute.attribute_type),
            },
            full_name,
            arguments: attribute
                .fixed_arguments
                .iter()
                .map(|argument| self.expression(argument.clone(), context))
                .collect(),
            named_arguments: attribute
                .named_arguments
                .iter()
                .map(|(name, argument)| (name.clone(), self.expression(argument.clone(), context)))
                .collect(),
        }
    }

    fn expression(&self, value: ConstantValue, context: GenericContext<'_>) -> Expression {
        match value {
            ConstantValue::Type(signature) => Expression::TypeOf(self.type_node(&signature, context)),
            ConstantValue::Array(elements) => Expression::Array(
                elements
                    .into_iter()
                    .map(|element| self.expression(element, context))
                    .collect(),
            ),
            other => Expression::Constant(other),
        }
    }

    fn named(&self, reference: &TypeReference, arguments: Vec<TypeNode>) -> TypeNode {
        let resolved = self.type_system.resolve(reference);
        let name = match reference {
            TypeReference::External { namespace, name, .. } if namespace.is_empty() => {
                source_name(name)
            }
            TypeReference::External { namespace, name, .. } => {
                format!("{namespace}.{}", source_name(name))
            }
            TypeReference::Definition(_) => source_name(&resolved.full_name),
        };
        TypeNode::Named {
            name,
            arguments,
            resolved,
        }
    }

    fn type_node(&self, signature: &TypeSignature, context: GenericContext<'_>) -> TypeNode {
        if let Some(keyword) = signature.keyword() {
            return TypeNode::Primitive(keyword);
        }

        match signature {
            TypeSignature::Class(reference) | TypeSignature::ValueType(reference) => {
                self.named(reference, Vec::new())
            }
            TypeSignature::GenericInst(base, arguments) => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.type_node(argument, context))
                    .collect();
                match base.as_ref() {
                    TypeSignature::Class(reference) | TypeSignature::ValueType(reference) => {
                        self.named(reference, arguments)
                    }
                    other => self.type_node(other, context),
                }
            }
            TypeSignature::SzArray(inner) => {
                TypeNode::Array(Box::new(self.type_node(inner, context)), 1)
            }
            TypeSignature::Array(inner, rank) => {
                TypeNode::Array(Box::new(self.type_node(inner, context)), *rank)
            }
            TypeSignature::Ptr(inner) => TypeNode::Pointer(Box::new(self.type_node(inner, context))),
            TypeSignature::ByRef(inner) => TypeNode::ByRef(Box::new(self.type_node(inner, context))),
            TypeSignature::GenericParamType(index) => TypeNode::GenericParameter(
                context
                    .type_parameters
                    .get(*index as usize)
                    .map_or_else(|| format!("T{index}"), |parameter| parameter.name.clone()),
            ),
            TypeSignature::GenericParamMethod(index) => TypeNode::GenericParameter(
                context
                    .method_parameters
                    .get(*index as usize)
                    .map_or_else(|| format!("M{index}"), |parameter| parameter.name.clone()),
            ),
            _ => TypeNode::Primitive("object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        decompiler::syntax::{walk_unit, Visitor},
        metadata::{
            builder::{MethodBuilder, ModuleBuilder},
            identity::{AssemblyIdentity, AssemblyVersion},
        },
    };

    fn builder() -> ModuleBuilder {
        ModuleBuilder::new(
            "Foo.dll",
            AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 2, 3, 4)),
        )
    }

    fn decompiler(module: Module) -> TypeDecompiler {
        let type_system = Arc::new(DecompilerTypeSystem::new(Arc::new(module)));
        TypeDecompiler::new(type_system, DecompilerSettings::default())
    }

    fn first_type(unit: &CompilationUnit) -> &TypeDeclaration {
        match &unit.members[0] {
            SyntaxNode::Namespace(namespace) => match &namespace.members[0] {
                SyntaxNode::Type(declaration) => declaration,
                other => panic!("unexpected node {other:?}"),
            },
            SyntaxNode::Type(declaration) => declaration,
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_hidden_types() {
        let settings = DecompilerSettings::default();
        let mut builder = builder();
        let widget = builder.add_type("Ns", "Widget").token();
        let closure = builder
            .add_nested_type(widget, "<>c__DisplayClass0_0")
            .compiler_generated()
            .token();
        let iterator = builder.add_nested_type(widget, "<Items>d__3").token();
        let details = builder.add_type("", "<PrivateImplementationDetails>").token();
        let marked = builder.add_type("Ns", "DisplayClassic").token();
        let module = builder.build();

        assert!(member_is_hidden(&module, closure, &settings));
        assert!(member_is_hidden(&module, iterator, &settings));
        assert!(member_is_hidden(&module, details, &settings));
        assert!(!member_is_hidden(&module, widget, &settings));
        // a user type that merely resembles a generated name stays visible
        assert!(!member_is_hidden(&module, marked, &settings));

        let shown = DecompilerSettings::show_compiler_generated();
        assert!(!member_is_hidden(&module, closure, &shown));
        assert!(!member_is_hidden(&module, iterator, &shown));
    }

    #[test]
    fn test_async_state_machine_follows_async_setting() {
        let mut builder = builder();
        let widget = builder.add_type("Ns", "Widget").token();
        let state_machine = builder
            .add_nested_type(widget, "<RunAsync>d__1")
            .interface(TypeSignature::Class(TypeReference::external(
                "System.Runtime",
                COMPILER_SERVICES,
                "IAsyncStateMachine",
            )))
            .token();
        let module = builder.build();

        let mut settings = DecompilerSettings::default();
        settings.async_await = false;
        assert!(!member_is_hidden(&module, state_machine, &settings));
        settings.async_await = true;
        settings.yield_return = false;
        assert!(member_is_hidden(&module, state_machine, &settings));
    }

    #[test]
    fn test_class_members() {
        let mut builder = builder();
        let widget = builder
            .add_type("Namespace.A", "Widget")
            .field("count", TypeSignature::I4, Accessibility::Private, FieldAttributes::empty())
            .field(
                "<Name>k__BackingField",
                TypeSignature::String,
                Accessibility::Private,
                FieldAttributes::INIT_ONLY,
            )
            .property("Name", TypeSignature::String, true, false)
            .method(MethodBuilder::constructor())
            .method(
                MethodBuilder::new("Run")
                    .flags(MethodAttributes::VIRTUAL | MethodAttributes::NEW_SLOT)
                    .parameter("times", TypeSignature::I4)
                    .local(TypeSignature::String),
            )
            .token();
        let decompiler = decompiler(builder.build());

        let unit = decompiler
            .decompile_types(&[widget], &CancellationToken::none())
            .unwrap();
        let SyntaxNode::Namespace(namespace) = &unit.members[0] else {
            panic!("expected namespace");
        };
        assert_eq!(namespace.name, "Namespace.A");

        let declaration = first_type(&unit);
        assert_eq!(declaration.symbol.to_string(), "T:Namespace.A.Widget");
        let names: Vec<String> = declaration
            .members
            .iter()
            .filter_map(|member| member.symbol().map(ToString::to_string))
            .collect();
        assert_eq!(
            names,
            vec![
                "F:Namespace.A.Widget.count",
                "P:Namespace.A.Widget.Name",
                "M:Namespace.A.Widget.#ctor",
                "M:Namespace.A.Widget.Run",
            ]
        );

        let SyntaxNode::Method(run) = &declaration.members[3] else {
            panic!("expected method");
        };
        assert_eq!(run.modifiers, vec!["public", "virtual"]);
        assert_eq!(
            run.body,
            Some(vec![
                Statement::LocalDeclaration {
                    type_node: TypeNode::Primitive("string"),
                    name: "V_0".into(),
                },
                Statement::ThrowNull,
            ])
        );
    }

    #[test]
    fn test_signatures_only_has_no_bodies() {
        let mut builder = builder();
        let widget = builder
            .add_type("Ns", "Widget")
            .method(MethodBuilder::new("Run").local(TypeSignature::I4))
            .token();
        let decompiler = decompiler(builder.build()).signatures_only(true);

        let unit = decompiler
            .decompile_types(&[widget], &CancellationToken::none())
            .unwrap();
        let SyntaxNode::Method(run) = &first_type(&unit).members[0] else {
            panic!("expected method");
        };
        assert!(run.body.is_none());
    }

    #[test]
    fn test_static_class_and_enum() {
        let mut builder = builder();
        let helpers = builder
            .add_type("Ns", "Helpers")
            .flags(TypeAttributes::ABSTRACT | TypeAttributes::SEALED)
            .token();
        let color = builder
            .add_type("Ns", "Color")
            .as_enum()
            .constant("Red", ConstantValue::Int(0))
            .constant("Green", ConstantValue::Int(1))
            .token();
        let decompiler = decompiler(builder.build());

        let unit = decompiler
            .decompile_types(&[helpers, color], &CancellationToken::none())
            .unwrap();
        let SyntaxNode::Namespace(namespace) = &unit.members[0] else {
            panic!("expected namespace");
        };
        assert_eq!(namespace.members.len(), 2);

        let SyntaxNode::Type(helpers) = &namespace.members[0] else {
            panic!("expected type");
        };
        assert_eq!(helpers.modifiers, vec!["public", "static"]);

        let SyntaxNode::Type(color) = &namespace.members[1] else {
            panic!("expected type");
        };
        assert_eq!(color.kind, TypeKind::Enum);
        assert!(color.base_types.is_empty());
        assert!(matches!(
            &color.members[1],
            SyntaxNode::EnumMember(member)
                if member.name == "Green"
                    && member.value == Some(Expression::Constant(ConstantValue::Int(1)))
        ));
    }

    /// `Ns.Widget` claims a nested type whose token has no definition.
    fn broken_nesting() -> (Module, Token) {
        let mut builder = builder();
        let widget = builder
            .add_type("Ns", "Widget")
            .method(MethodBuilder::new("Run"))
            .token();
        let module = builder.build();

        let mut definition = TypeDefinition::clone(&module.type_definition(widget).unwrap());
        definition.nested_types.push(Token::new(0x0200_0fff));
        module.types.insert(widget, Arc::new(definition));
        (module, widget)
    }

    #[test]
    fn test_unresolved_nested_type() {
        let (module, widget) = broken_nesting();
        let result = decompiler(module).decompile_types(&[widget], &CancellationToken::none());
        assert!(matches!(result, Err(Error::TypeNotFound(token)) if token == Token::new(0x0200_0fff)));
    }

    #[test]
    fn test_signatures_only_skips_unresolved_nested_type() {
        let (module, widget) = broken_nesting();
        let unit = decompiler(module)
            .signatures_only(true)
            .decompile_types(&[widget], &CancellationToken::none())
            .unwrap();

        let widget = first_type(&unit);
        assert_eq!(widget.name, "Widget");
        assert!(widget
            .members
            .iter()
            .all(|member| !matches!(member, SyntaxNode::Type(_))));
        assert!(matches!(&widget.members[0], SyntaxNode::Method(run) if run.name == "Run"));
    }

    #[test]
    fn test_unknown_token() {
        let decompiler = decompiler(builder().build());
        let result = decompiler.decompile_types(&[Token::new(0x0200_0063)], &CancellationToken::none());
        assert!(matches!(result, Err(Error::TypeNotFound(_))));
    }

    #[test]
    fn test_cancelled_before_build() {
        let mut builder = builder();
        let widget = builder.add_type("Ns", "Widget").token();
        let decompiler = decompiler(builder.build());

        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let result = decompiler.decompile_types(&[widget], &cancellation);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[derive(Default)]
    struct References(Vec<Token>);

    impl Visitor for References {
        fn visit_type_node(&mut self, node: &TypeNode) {
            if let TypeNode::Named { resolved, .. } = node {
                self.0.extend(resolved.token);
            }
            crate::decompiler::syntax::walk_type_node(self, node);
        }
    }

    #[test]
    fn test_references_are_resolved() {
        let mut builder = builder();
        let widget = builder.add_type("Ns", "Widget").token();
        let helper = builder.add_nested_type(widget, "Helper").token();
        let closure = builder
            .add_type("Ns", "<>c__DisplayClass1_0")
            .compiler_generated()
            .token();
        builder.type_builder(widget).method(
            MethodBuilder::new("Run")
                .local(TypeSignature::class(helper))
                .local(TypeSignature::SzArray(Box::new(TypeSignature::class(closure)))),
        );
        let decompiler = decompiler(builder.build());

        let unit = decompiler
            .decompile_types(&[widget], &CancellationToken::none())
            .unwrap();
        let mut references = References::default();
        walk_unit(&mut references, &unit);
        assert_eq!(references.0, vec![helper, closure]);
    }

    #[test]
    fn test_assembly_attributes() {
        let mut builder = builder();
        builder.add_assembly_attribute(
            CustomAttribute::external("System.Runtime", "System.Reflection", "AssemblyTitleAttribute")
                .with_argument(ConstantValue::String("Foo".into())),
        );
        let decompiler = decompiler(builder.build());

        let unit = decompiler.decompile_module_and_assembly_attributes().unwrap();
        let names: Vec<&str> = unit
            .assembly_attributes
            .iter()
            .map(|attribute| attribute.full_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "System.Reflection.AssemblyTitleAttribute",
                "System.Reflection.AssemblyVersionAttribute"
            ]
        );
        assert_eq!(
            unit.assembly_attributes[1].arguments,
            vec![Expression::Constant(ConstantValue::String("1.2.3.4".into()))]
        );
    }
}
