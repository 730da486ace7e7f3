//! Syntax tree transforms.
//!
//! Transforms run after a compilation unit has been built and before it is rendered.
//! They are applied in a fixed order per decompiler instance.

use crate::decompiler::syntax::{
    walk_type_node_mut, walk_unit_mut, Attribute, CompilationUnit, TypeNode, VisitorMut,
};

/// A rewrite of a whole compilation unit.
///
/// Transforms must be thread-safe because decompiler instances are created on the
/// worker threads of a run.
pub trait AstTransform: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &'static str;

    /// Rewrites `unit` in place.
    fn run(&self, unit: &mut CompilationUnit);
}

const KEYWORDS: [&str; 77] = [
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

/// Turns `name` into a valid C# identifier.
///
/// Characters that can not appear in identifiers become `_`, a leading digit gets a
/// `_` prefix and keywords are escaped with `@`.
#[must_use]
pub fn escape_identifier(name: &str) -> String {
    let mut escaped: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if escaped.is_empty() || escaped.starts_with(|c: char| c.is_ascii_digit()) {
        escaped.insert(0, '_');
    }
    if KEYWORDS.contains(&escaped.as_str()) {
        escaped.insert(0, '@');
    }
    escaped
}

/// Replaces identifiers that are not valid C#, such as compiler-generated names.
pub struct EscapeInvalidIdentifiers;

impl VisitorMut for EscapeInvalidIdentifiers {
    fn visit_identifier_mut(&mut self, identifier: &mut String) {
        let escaped = escape_identifier(identifier);
        if escaped != *identifier {
            *identifier = escaped;
        }
    }

    fn visit_type_node_mut(&mut self, node: &mut TypeNode) {
        if let TypeNode::Named { name, .. } = node {
            *name = name
                .split('.')
                .map(escape_identifier)
                .collect::<Vec<_>>()
                .join(".");
        }
        walk_type_node_mut(self, node);
    }
}

impl AstTransform for EscapeInvalidIdentifiers {
    fn name(&self) -> &'static str {
        "EscapeInvalidIdentifiers"
    }

    fn run(&self, unit: &mut CompilationUnit) {
        walk_unit_mut(&mut EscapeInvalidIdentifiers, unit);
    }
}

/// Removes `[CLSCompliant]` from every declaration.
pub struct RemoveClsCompliantAttribute;

impl VisitorMut for RemoveClsCompliantAttribute {
    fn visit_attributes_mut(&mut self, attributes: &mut Vec<Attribute>) {
        attributes.retain(|attribute| attribute.full_name != "System.CLSCompliantAttribute");
    }
}

impl AstTransform for RemoveClsCompliantAttribute {
    fn name(&self) -> &'static str {
        "RemoveClsCompliantAttribute"
    }

    fn run(&self, unit: &mut CompilationUnit) {
        walk_unit_mut(&mut RemoveClsCompliantAttribute, unit);
    }
}

/// Assembly attributes the compiler emits on its own.
const COMPILER_GENERATED_ASSEMBLY_ATTRIBUTES: [&str; 5] = [
    "System.Runtime.CompilerServices.CompilationRelaxationsAttribute",
    "System.Runtime.CompilerServices.RuntimeCompatibilityAttribute",
    "System.Diagnostics.DebuggableAttribute",
    "System.Security.UnverifiableCodeAttribute",
    "System.Security.Permissions.SecurityPermissionAttribute",
];

/// Removes assembly attributes the compiler adds on its own, so the generated
/// `AssemblyInfo` only shows what the author wrote.
pub struct RemoveCompilerGeneratedAssemblyAttributes;

impl AstTransform for RemoveCompilerGeneratedAssemblyAttributes {
    fn name(&self) -> &'static str {
        "RemoveCompilerGeneratedAssemblyAttributes"
    }

    fn run(&self, unit: &mut CompilationUnit) {
        unit.assembly_attributes.retain(|attribute| {
            !COMPILER_GENERATED_ASSEMBLY_ATTRIBUTES.contains(&attribute.full_name.as_str())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        decompiler::syntax::{
            MethodDeclaration, NamespaceDeclaration, ParameterDeclaration, ResolvedType,
            SyntaxNode,
        },
        metadata::symbol::{SymbolKey, SymbolKind},
    };

    fn attribute(full_name: &str, target: Option<&'static str>) -> Attribute {
        Attribute {
            target,
            full_name: full_name.to_string(),
            type_node: TypeNode::Named {
                name: full_name.to_string(),
                arguments: Vec::new(),
                resolved: ResolvedType::unresolved(full_name),
            },
            arguments: Vec::new(),
            named_arguments: Vec::new(),
        }
    }

    fn method(name: &str, parameter: &str, attributes: Vec<Attribute>) -> CompilationUnit {
        let key = SymbolKey::for_type_path("Ns", vec!["Widget".into()]);
        CompilationUnit {
            assembly_attributes: vec![
                attribute("System.CLSCompliantAttribute", Some("assembly")),
                attribute("System.Diagnostics.DebuggableAttribute", Some("assembly")),
                attribute("System.Reflection.AssemblyTitleAttribute", Some("assembly")),
            ],
            members: vec![SyntaxNode::Namespace(NamespaceDeclaration {
                name: "Ns".into(),
                members: vec![SyntaxNode::Method(MethodDeclaration {
                    symbol: key.member(SymbolKind::Method, name),
                    modifiers: vec!["public"],
                    return_type: Some(TypeNode::Named {
                        name: "Ns.<>c".into(),
                        arguments: Vec::new(),
                        resolved: ResolvedType::unresolved("Ns.<>c"),
                    }),
                    name: name.into(),
                    type_parameters: Vec::new(),
                    parameters: vec![ParameterDeclaration {
                        type_node: TypeNode::Primitive("int"),
                        name: parameter.into(),
                    }],
                    body: None,
                    attributes,
                })],
            })],
        }
    }

    fn only_method(unit: &CompilationUnit) -> &MethodDeclaration {
        let SyntaxNode::Namespace(namespace) = &unit.members[0] else {
            panic!("expected namespace");
        };
        let SyntaxNode::Method(method) = &namespace.members[0] else {
            panic!("expected method");
        };
        method
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("Widget"), "Widget");
        assert_eq!(escape_identifier("<Run>b__0_0"), "_Run_b__0_0");
        assert_eq!(escape_identifier("class"), "@class");
        assert_eq!(escape_identifier("1st"), "_1st");
        assert_eq!(escape_identifier(""), "_");
    }

    #[test]
    fn test_escape_invalid_identifiers() {
        let mut unit = method("<Run>b__0", "event", Vec::new());
        EscapeInvalidIdentifiers.run(&mut unit);

        let method = only_method(&unit);
        assert_eq!(method.name, "_Run_b__0");
        assert_eq!(method.parameters[0].name, "@event");
        assert!(matches!(
            &method.return_type,
            Some(TypeNode::Named { name, .. }) if name == "Ns.__c"
        ));
        assert_eq!(method.symbol.member.as_deref(), Some("<Run>b__0"));
    }

    #[test]
    fn test_remove_cls_compliant() {
        let mut unit = method(
            "Run",
            "value",
            vec![
                attribute("System.CLSCompliantAttribute", None),
                attribute("System.ObsoleteAttribute", None),
            ],
        );
        RemoveClsCompliantAttribute.run(&mut unit);

        assert_eq!(unit.assembly_attributes.len(), 2);
        let method = only_method(&unit);
        assert_eq!(method.attributes.len(), 1);
        assert_eq!(method.attributes[0].full_name, "System.ObsoleteAttribute");
    }

    #[test]
    fn test_remove_compiler_generated_assembly_attributes() {
        let mut unit = method("Run", "value", Vec::new());
        RemoveCompilerGeneratedAssemblyAttributes.run(&mut unit);

        let names: Vec<&str> = unit
            .assembly_attributes
            .iter()
            .map(|attribute| attribute.full_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "System.CLSCompliantAttribute",
                "System.Reflection.AssemblyTitleAttribute"
            ]
        );
    }
}
