//! Fluent construction of [`Module`]s.
//!
//! [`ModuleBuilder`] hands out tokens sequentially per table, the way a compiler lays
//! out the metadata tables: row 1 of the `TypeDef` table is always the `<Module>`
//! pseudo type. Module readers use the builder to assemble what they decoded, and the
//! tests use it to describe the assemblies they decompile.
//!
//! # Example
//! ```rust
//! use dotsource::metadata::builder::{MethodBuilder, ModuleBuilder};
//! use dotsource::metadata::identity::{AssemblyIdentity, AssemblyVersion};
//! use dotsource::metadata::signatures::TypeSignature;
//! use dotsource::metadata::typedef::Accessibility;
//!
//! let mut builder = ModuleBuilder::new(
//!     "Foo.dll",
//!     AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 0, 0, 0)),
//! );
//! let widget = builder.add_type("Namespace.A", "Widget").token();
//! let helper = builder
//!     .add_nested_type(widget, "Helper")
//!     .accessibility(Accessibility::Private)
//!     .token();
//! builder
//!     .type_builder(widget)
//!     .method(MethodBuilder::new("Run").local(TypeSignature::class(helper)));
//!
//! let module = builder.build();
//! assert_eq!(module.full_name(helper).as_deref(), Some("Namespace.A.Widget+Helper"));
//! ```

use std::path::PathBuf;

use sha1::{Digest, Sha1};
use uguid::Guid;

use crate::metadata::{
    customattributes::{ConstantValue, CustomAttribute},
    identity::AssemblyIdentity,
    module::{AssemblyDefinition, ForwardedType, Module, TypeDefinitionMap},
    signatures::{TypeReference, TypeSignature},
    token::{
        Token, TABLE_EVENT, TABLE_FIELD, TABLE_METHOD_DEF, TABLE_PROPERTY, TABLE_TYPE_DEF,
    },
    typedef::{
        Accessibility, EventDefinition, FieldAttributes, FieldDefinition, GenericParameter,
        MethodAttributes, MethodDefinition, Parameter, PropertyDefinition, TypeAttributes,
        TypeDefinition,
    },
};

fn system_type(name: &str) -> TypeSignature {
    TypeSignature::Class(TypeReference::external("System.Runtime", "System", name))
}

/// Builds a [`Module`].
pub struct ModuleBuilder {
    name: String,
    mvid: Option<Guid>,
    assembly: Option<AssemblyDefinition>,
    location: Option<PathBuf>,
    types: Vec<TypeDefinition>,
    assembly_references: Vec<AssemblyIdentity>,
    custom_attributes: Vec<CustomAttribute>,
    forwarded_types: Vec<ForwardedType>,
    next_field: u32,
    next_method: u32,
    next_property: u32,
    next_event: u32,
}

impl ModuleBuilder {
    /// Starts a module for the given assembly; the `<Module>` type is added already.
    #[must_use]
    pub fn new(name: &str, identity: AssemblyIdentity) -> Self {
        let mut module_type = TypeDefinition::new(Token::from_parts(TABLE_TYPE_DEF, 1), "", "<Module>");
        module_type.accessibility = Accessibility::Assembly;

        ModuleBuilder {
            name: name.to_string(),
            mvid: None,
            assembly: Some(AssemblyDefinition {
                identity,
                custom_attributes: Vec::new(),
            }),
            location: None,
            types: vec![module_type],
            assembly_references: Vec::new(),
            custom_attributes: Vec::new(),
            forwarded_types: Vec::new(),
            next_field: 1,
            next_method: 1,
            next_property: 1,
            next_event: 1,
        }
    }

    /// Sets the module version id; by default it is derived from the module name and identity.
    #[must_use]
    pub fn with_mvid(mut self, mvid: Guid) -> Self {
        self.mvid = Some(mvid);
        self
    }

    /// Sets the on-disk location of the module.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Adds a top-level public class.
    pub fn add_type(&mut self, namespace: &str, name: &str) -> TypeBuilder<'_> {
        let token = Token::from_parts(TABLE_TYPE_DEF, self.types.len() as u32 + 1);
        self.types.push(TypeDefinition::new(token, namespace, name));
        self.type_builder(token)
    }

    /// Adds a private class nested in `parent`.
    pub fn add_nested_type(&mut self, parent: Token, name: &str) -> TypeBuilder<'_> {
        let token = Token::from_parts(TABLE_TYPE_DEF, self.types.len() as u32 + 1);
        let mut definition = TypeDefinition::new(token, "", name);
        definition.accessibility = Accessibility::Private;
        definition.enclosing_type = Some(parent);
        self.types.push(definition);

        if let Some(parent) = self.index_of(parent).map(|index| &mut self.types[index]) {
            parent.nested_types.push(token);
        }
        self.type_builder(token)
    }

    /// Continues building an existing type.
    ///
    /// # Panics
    /// Panics if `token` was not handed out by this builder.
    pub fn type_builder(&mut self, token: Token) -> TypeBuilder<'_> {
        let index = self
            .index_of(token)
            .unwrap_or_else(|| panic!("type {token} was not created by this builder"));
        TypeBuilder {
            module: self,
            index,
        }
    }

    /// Adds an assembly reference.
    pub fn add_assembly_reference(&mut self, identity: AssemblyIdentity) {
        self.assembly_references.push(identity);
    }

    /// Adds an assembly-level attribute.
    pub fn add_assembly_attribute(&mut self, attribute: CustomAttribute) {
        if let Some(assembly) = &mut self.assembly {
            assembly.custom_attributes.push(attribute);
        }
    }

    /// Adds a module-level attribute.
    pub fn add_module_attribute(&mut self, attribute: CustomAttribute) {
        self.custom_attributes.push(attribute);
    }

    /// Records that `namespace.name` now lives in `destination`.
    pub fn add_forwarded_type(&mut self, namespace: &str, name: &str, destination: AssemblyIdentity) {
        self.forwarded_types.push(ForwardedType {
            namespace: namespace.to_string(),
            name: name.to_string(),
            destination,
        });
    }

    /// Finishes the module.
    #[must_use]
    pub fn build(self) -> Module {
        let mvid = self.mvid.unwrap_or_else(|| {
            let mut hasher = Sha1::new();
            hasher.update(self.name.as_bytes());
            if let Some(assembly) = &self.assembly {
                hasher.update(assembly.identity.display_name().as_bytes());
            }
            let digest = hasher.finalize();
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&digest[..16]);
            Guid::from_bytes(bytes)
        });

        let types = TypeDefinitionMap::new();
        for definition in self.types {
            types.insert(definition.token, definition.into());
        }

        Module {
            name: self.name,
            mvid,
            assembly: self.assembly,
            location: self.location,
            types,
            assembly_references: self.assembly_references,
            custom_attributes: self.custom_attributes,
            forwarded_types: self.forwarded_types,
        }
    }

    fn index_of(&self, token: Token) -> Option<usize> {
        if !token.is_type_def() {
            return None;
        }
        let index = token.row() as usize - 1;
        (index < self.types.len()).then_some(index)
    }

    fn next_token(counter: &mut u32, table: u8) -> Token {
        let token = Token::from_parts(table, *counter);
        *counter += 1;
        token
    }
}

/// Configures one type of a [`ModuleBuilder`].
pub struct TypeBuilder<'a> {
    module: &'a mut ModuleBuilder,
    index: usize,
}

impl TypeBuilder<'_> {
    fn definition(&mut self) -> &mut TypeDefinition {
        &mut self.module.types[self.index]
    }

    /// The token of the type.
    #[must_use]
    pub fn token(&self) -> Token {
        self.module.types[self.index].token
    }

    /// Sets the accessibility.
    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.definition().accessibility = accessibility;
        self
    }

    /// Adds modifier flags.
    pub fn flags(mut self, flags: TypeAttributes) -> Self {
        self.definition().flags |= flags;
        self
    }

    /// Sets the base type.
    pub fn base_type(mut self, base: TypeSignature) -> Self {
        self.definition().base_type = Some(base);
        self
    }

    /// Makes the type a `struct`.
    pub fn as_struct(self) -> Self {
        self.base_type(system_type("ValueType"))
            .flags(TypeAttributes::SEALED)
    }

    /// Makes the type an `enum`.
    pub fn as_enum(self) -> Self {
        self.base_type(system_type("Enum")).flags(TypeAttributes::SEALED)
    }

    /// Makes the type an `interface`.
    pub fn as_interface(mut self) -> Self {
        self.definition().base_type = None;
        self.flags(TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT)
    }

    /// Makes the type a `delegate` with the given `Invoke` signature.
    pub fn as_delegate(self, return_type: TypeSignature, parameters: &[(&str, TypeSignature)]) -> Self {
        let mut invoke = MethodBuilder::new("Invoke")
            .flags(MethodAttributes::VIRTUAL | MethodAttributes::NEW_SLOT)
            .returns(return_type)
            .no_body();
        for (name, signature) in parameters {
            invoke = invoke.parameter(name, signature.clone());
        }
        self.base_type(system_type("MulticastDelegate"))
            .flags(TypeAttributes::SEALED)
            .method(invoke)
    }

    /// Adds an implemented interface.
    pub fn interface(mut self, interface: TypeSignature) -> Self {
        self.definition().interfaces.push(interface);
        self
    }

    /// Adds a generic parameter.
    pub fn generic_parameter(mut self, name: &str) -> Self {
        self.definition().generic_parameters.push(GenericParameter {
            name: name.to_string(),
        });
        self
    }

    /// Adds a custom attribute.
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.definition().custom_attributes.push(attribute);
        self
    }

    /// Marks the type with `CompilerGeneratedAttribute`.
    pub fn compiler_generated(self) -> Self {
        self.attribute(CustomAttribute::external(
            "System.Runtime",
            "System.Runtime.CompilerServices",
            "CompilerGeneratedAttribute",
        ))
    }

    /// Adds a field.
    pub fn field(
        mut self,
        name: &str,
        signature: TypeSignature,
        accessibility: Accessibility,
        flags: FieldAttributes,
    ) -> Self {
        let token = ModuleBuilder::next_token(&mut self.module.next_field, TABLE_FIELD);
        self.definition().fields.push(FieldDefinition {
            token,
            name: name.to_string(),
            accessibility,
            flags,
            signature,
            constant: None,
            custom_attributes: Vec::new(),
        });
        self
    }

    /// Adds a public literal field; for enums this is a member.
    pub fn constant(mut self, name: &str, value: ConstantValue) -> Self {
        let token = ModuleBuilder::next_token(&mut self.module.next_field, TABLE_FIELD);
        let own = self.token();
        self.definition().fields.push(FieldDefinition {
            token,
            name: name.to_string(),
            accessibility: Accessibility::Public,
            flags: FieldAttributes::STATIC | FieldAttributes::LITERAL | FieldAttributes::HAS_DEFAULT,
            signature: TypeSignature::value_type(own),
            constant: Some(value),
            custom_attributes: Vec::new(),
        });
        self
    }

    /// Adds a method.
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.push_method(method);
        self
    }

    /// Adds a property with the requested accessors.
    pub fn property(mut self, name: &str, signature: TypeSignature, getter: bool, setter: bool) -> Self {
        let getter = getter.then(|| {
            self.push_method(
                MethodBuilder::new(&format!("get_{name}"))
                    .flags(MethodAttributes::SPECIAL_NAME)
                    .returns(signature.clone()),
            )
        });
        let setter = setter.then(|| {
            self.push_method(
                MethodBuilder::new(&format!("set_{name}"))
                    .flags(MethodAttributes::SPECIAL_NAME)
                    .parameter("value", signature.clone()),
            )
        });

        let token = ModuleBuilder::next_token(&mut self.module.next_property, TABLE_PROPERTY);
        self.definition().properties.push(PropertyDefinition {
            token,
            name: name.to_string(),
            signature,
            getter,
            setter,
            custom_attributes: Vec::new(),
        });
        self
    }

    /// Adds an event with add and remove accessors.
    pub fn event(mut self, name: &str, signature: TypeSignature) -> Self {
        let adder = self.push_method(
            MethodBuilder::new(&format!("add_{name}"))
                .flags(MethodAttributes::SPECIAL_NAME)
                .parameter("value", signature.clone()),
        );
        let remover = self.push_method(
            MethodBuilder::new(&format!("remove_{name}"))
                .flags(MethodAttributes::SPECIAL_NAME)
                .parameter("value", signature.clone()),
        );

        let token = ModuleBuilder::next_token(&mut self.module.next_event, TABLE_EVENT);
        self.definition().events.push(EventDefinition {
            token,
            name: name.to_string(),
            signature,
            adder: Some(adder),
            remover: Some(remover),
            custom_attributes: Vec::new(),
        });
        self
    }

    fn push_method(&mut self, method: MethodBuilder) -> Token {
        let token = ModuleBuilder::next_token(&mut self.module.next_method, TABLE_METHOD_DEF);
        let mut definition = method.definition;
        definition.token = token;
        self.definition().methods.push(definition);
        token
    }
}

/// Describes a method for [`TypeBuilder::method`].
///
/// The method starts out public, non-virtual, returning `void`, with an empty body.
pub struct MethodBuilder {
    definition: MethodDefinition,
}

impl MethodBuilder {
    /// Starts a method with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodBuilder {
            definition: MethodDefinition {
                token: Token::new(0),
                name: name.to_string(),
                accessibility: Accessibility::Public,
                flags: MethodAttributes::HIDE_BY_SIG,
                return_type: TypeSignature::Void,
                parameters: Vec::new(),
                generic_parameters: Vec::new(),
                locals: Some(Vec::new()),
                custom_attributes: Vec::new(),
            },
        }
    }

    /// An instance constructor.
    #[must_use]
    pub fn constructor() -> Self {
        MethodBuilder::new(".ctor")
            .flags(MethodAttributes::SPECIAL_NAME | MethodAttributes::RT_SPECIAL_NAME)
    }

    /// Sets the accessibility.
    #[must_use]
    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.definition.accessibility = accessibility;
        self
    }

    /// Adds modifier flags.
    #[must_use]
    pub fn flags(mut self, flags: MethodAttributes) -> Self {
        self.definition.flags |= flags;
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, signature: TypeSignature) -> Self {
        self.definition.return_type = signature;
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn parameter(mut self, name: &str, signature: TypeSignature) -> Self {
        self.definition.parameters.push(Parameter {
            name: name.to_string(),
            signature,
        });
        self
    }

    /// Adds a generic parameter.
    #[must_use]
    pub fn generic_parameter(mut self, name: &str) -> Self {
        self.definition.generic_parameters.push(GenericParameter {
            name: name.to_string(),
        });
        self
    }

    /// Appends a local variable to the body.
    #[must_use]
    pub fn local(mut self, signature: TypeSignature) -> Self {
        self.definition
            .locals
            .get_or_insert_with(Vec::new)
            .push(signature);
        self
    }

    /// Removes the body (abstract, extern and interface methods).
    #[must_use]
    pub fn no_body(mut self) -> Self {
        self.definition.locals = None;
        self
    }

    /// Adds a custom attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.definition.custom_attributes.push(attribute);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{identity::AssemblyVersion, typedef::TypeKind};

    fn builder() -> ModuleBuilder {
        ModuleBuilder::new(
            "Foo.dll",
            AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 0, 0, 0)),
        )
    }

    #[test]
    fn test_sequential_tokens() {
        let mut builder = builder();
        let first = builder.add_type("Ns", "First").token();
        let second = builder.add_type("Ns", "Second").token();
        assert_eq!(first, Token::new(0x0200_0002));
        assert_eq!(second, Token::new(0x0200_0003));

        builder
            .type_builder(first)
            .method(MethodBuilder::new("A"))
            .property("Value", TypeSignature::I4, true, true);
        let module = builder.build();
        let first = module.type_definition(first).unwrap();
        let tokens: Vec<u32> = first.methods.iter().map(|m| m.token.value()).collect();
        assert_eq!(tokens, vec![0x0600_0001, 0x0600_0002, 0x0600_0003]);
        assert_eq!(first.properties[0].getter, Some(Token::new(0x0600_0002)));
        assert_eq!(first.properties[0].setter, Some(Token::new(0x0600_0003)));
    }

    #[test]
    fn test_nested_registration() {
        let mut builder = builder();
        let outer = builder.add_type("Ns", "Outer").token();
        let inner = builder.add_nested_type(outer, "Inner").token();
        let module = builder.build();

        let outer_def = module.type_definition(outer).unwrap();
        assert_eq!(outer_def.nested_types, vec![inner]);
        let inner_def = module.type_definition(inner).unwrap();
        assert_eq!(inner_def.enclosing_type, Some(outer));
        assert_eq!(inner_def.accessibility, Accessibility::Private);
    }

    #[test]
    fn test_kinds() {
        let mut builder = builder();
        let color = builder
            .add_type("Ns", "Color")
            .as_enum()
            .constant("Red", ConstantValue::Int(0))
            .token();
        let point = builder.add_type("Ns", "Point").as_struct().token();
        let callback = builder
            .add_type("Ns", "Callback")
            .as_delegate(TypeSignature::Void, &[("value", TypeSignature::I4)])
            .token();
        let module = builder.build();

        assert_eq!(module.type_definition(color).unwrap().kind(), TypeKind::Enum);
        assert_eq!(module.type_definition(point).unwrap().kind(), TypeKind::Struct);
        assert_eq!(
            module.type_definition(callback).unwrap().kind(),
            TypeKind::Delegate
        );
    }

    #[test]
    fn test_mvid_stable() {
        let a = builder().build();
        let b = builder().build();
        assert_eq!(a.mvid, b.mvid);

        let other = ModuleBuilder::new(
            "Bar.dll",
            AssemblyIdentity::new("Bar", AssemblyVersion::new(1, 0, 0, 0)),
        )
        .build();
        assert_ne!(a.mvid, other.mvid);
    }
}
