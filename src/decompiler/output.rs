//! Renders syntax trees to C# text.
//!
//! While writing, [`OutputVisitor`] records where the name token of every declaration
//! ends up. Positions are zero-based lines and columns, columns counted in characters
//! with one indentation string counting as its own length. When a key is declared
//! more than once (overloads), the first declaration wins.

use std::collections::BTreeMap;

use crate::{
    decompiler::{
        settings::FormattingOptions,
        syntax::{
            Accessor, Attribute, CompilationUnit, Expression, ParameterDeclaration, Statement,
            SyntaxNode, TypeDeclaration, TypeNode,
        },
    },
    metadata::{customattributes::ConstantValue, symbol::SymbolKey, typedef::TypeKind},
};

/// A zero-based position in generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SymbolLocation {
    /// Line, starting at 0
    pub line: usize,
    /// Column, starting at 0
    pub column: usize,
}

/// Rendered text plus the location of every declared symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedSource {
    /// The source text
    pub text: String,
    /// Name token position per declared symbol
    pub symbols: BTreeMap<SymbolKey, SymbolLocation>,
}

/// Writes C# text for a [`CompilationUnit`].
pub struct OutputVisitor<'a> {
    formatting: &'a FormattingOptions,
    text: String,
    line: usize,
    column: usize,
    indent: usize,
    symbols: BTreeMap<SymbolKey, SymbolLocation>,
}

impl<'a> OutputVisitor<'a> {
    /// Creates a visitor writing with `formatting`.
    #[must_use]
    pub fn new(formatting: &'a FormattingOptions) -> Self {
        OutputVisitor {
            formatting,
            text: String::new(),
            line: 0,
            column: 0,
            indent: 0,
            symbols: BTreeMap::new(),
        }
    }

    /// Renders `unit` with `formatting`.
    #[must_use]
    pub fn render(unit: &CompilationUnit, formatting: &FormattingOptions) -> RenderedSource {
        let mut visitor = OutputVisitor::new(formatting);
        visitor.write_unit(unit);
        visitor.finish()
    }

    /// Returns the text and symbol locations written so far.
    #[must_use]
    pub fn finish(self) -> RenderedSource {
        RenderedSource {
            text: self.text,
            symbols: self.symbols,
        }
    }

    fn ensure_indented(&mut self) {
        if self.column == 0 {
            for _ in 0..self.indent {
                self.text.push_str(&self.formatting.indentation);
                self.column += self.formatting.indentation.chars().count();
            }
        }
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.ensure_indented();
        self.text.push_str(text);
        self.column += text.chars().count();
    }

    fn new_line(&mut self) {
        self.text.push_str(&self.formatting.new_line);
        self.line += 1;
        self.column = 0;
    }

    fn write_line(&mut self, text: &str) {
        self.write(text);
        self.new_line();
    }

    fn open_brace(&mut self) {
        self.write_line("{");
        self.indent += 1;
    }

    fn close_brace(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.write_line("}");
    }

    fn write_name(&mut self, symbol: &SymbolKey, name: &str) {
        self.ensure_indented();
        self.symbols
            .entry(symbol.clone())
            .or_insert(SymbolLocation {
                line: self.line,
                column: self.column,
            });
        self.write(name);
    }

    fn write_modifiers(&mut self, modifiers: &[&'static str]) {
        for modifier in modifiers {
            self.write(modifier);
            self.write(" ");
        }
    }

    /// Writes a whole compilation unit.
    pub fn write_unit(&mut self, unit: &CompilationUnit) {
        for attribute in &unit.assembly_attributes {
            self.write_attribute(attribute);
            self.new_line();
        }
        if !unit.assembly_attributes.is_empty() && !unit.members.is_empty() {
            self.new_line();
        }
        self.write_members(&unit.members);
    }

    fn write_members(&mut self, members: &[SyntaxNode]) {
        for (index, member) in members.iter().enumerate() {
            if index > 0 {
                self.new_line();
            }
            self.write_node(member);
        }
    }

    /// Writes one declaration.
    pub fn write_node(&mut self, node: &SyntaxNode) {
        match node {
            SyntaxNode::Namespace(namespace) => {
                self.write("namespace ");
                self.write_line(&namespace.name);
                self.open_brace();
                self.write_members(&namespace.members);
                self.close_brace();
            }
            SyntaxNode::Type(declaration) => self.write_type(declaration),
            SyntaxNode::Field(field) => {
                self.write_attributes(&field.attributes);
                self.write_modifiers(&field.modifiers);
                self.write_type_node(&field.type_node);
                self.write(" ");
                self.write_name(&field.symbol, &field.name);
                if let Some(initializer) = &field.initializer {
                    self.write(" = ");
                    self.write_expression(initializer);
                }
                self.write_line(";");
            }
            SyntaxNode::EnumMember(member) => {
                self.write_attributes(&member.attributes);
                self.write_name(&member.symbol, &member.name);
                if let Some(value) = &member.value {
                    self.write(" = ");
                    self.write_expression(value);
                }
                self.write_line(",");
            }
            SyntaxNode::Method(method) => {
                self.write_attributes(&method.attributes);
                self.write_modifiers(&method.modifiers);
                if let Some(return_type) = &method.return_type {
                    self.write_type_node(return_type);
                    self.write(" ");
                }
                self.write_name(&method.symbol, &method.name);
                self.write_type_parameters(&method.type_parameters);
                self.write_parameters(&method.parameters);
                self.write_body(method.body.as_deref());
            }
            SyntaxNode::Property(property) => {
                self.write_attributes(&property.attributes);
                self.write_modifiers(&property.modifiers);
                self.write_type_node(&property.type_node);
                self.write(" ");
                self.write_name(&property.symbol, &property.name);
                self.write_accessors(property.getter.as_ref(), property.setter.as_ref());
            }
            SyntaxNode::Event(event) => {
                self.write_attributes(&event.attributes);
                self.write_modifiers(&event.modifiers);
                self.write("event ");
                self.write_type_node(&event.type_node);
                self.write(" ");
                self.write_name(&event.symbol, &event.name);
                self.write_line(";");
            }
        }
    }

    fn write_type(&mut self, declaration: &TypeDeclaration) {
        self.write_attributes(&declaration.attributes);
        self.write_modifiers(&declaration.modifiers);
        self.write(declaration.kind.keyword());
        self.write(" ");

        if let Some(signature) = &declaration.delegate_signature {
            self.write_type_node(&signature.return_type);
            self.write(" ");
            self.write_name(&declaration.symbol, &declaration.name);
            self.write_type_parameters(&declaration.type_parameters);
            self.write_parameters(&signature.parameters);
            self.write_line(";");
            return;
        }

        self.write_name(&declaration.symbol, &declaration.name);
        self.write_type_parameters(&declaration.type_parameters);
        for (index, base) in declaration.base_types.iter().enumerate() {
            self.write(if index == 0 { " : " } else { ", " });
            self.write_type_node(base);
        }
        self.new_line();

        self.open_brace();
        if declaration.kind == TypeKind::Enum {
            for member in &declaration.members {
                self.write_node(member);
            }
        } else {
            self.write_members(&declaration.members);
        }
        self.close_brace();
    }

    fn write_type_parameters(&mut self, parameters: &[String]) {
        if parameters.is_empty() {
            return;
        }
        self.write("<");
        self.write(&parameters.join(", "));
        self.write(">");
    }

    fn write_parameters(&mut self, parameters: &[ParameterDeclaration]) {
        self.write("(");
        for (index, parameter) in parameters.iter().enumerate() {
            if index > 0 {
                self.write(", ");
            }
            self.write_type_node(&parameter.type_node);
            self.write(" ");
            self.write(&parameter.name);
        }
        self.write(")");
    }

    fn write_body(&mut self, body: Option<&[Statement]>) {
        let Some(statements) = body else {
            self.write_line(";");
            return;
        };
        self.new_line();
        self.open_brace();
        for statement in statements {
            self.write_statement(statement);
        }
        self.close_brace();
    }

    fn write_accessors(&mut self, getter: Option<&Accessor>, setter: Option<&Accessor>) {
        let accessors: Vec<(&str, &Accessor)> = [("get", getter), ("set", setter)]
            .into_iter()
            .filter_map(|(keyword, accessor)| accessor.map(|accessor| (keyword, accessor)))
            .collect();

        if accessors.iter().all(|(_, accessor)| accessor.body.is_none()) {
            self.write(" {");
            for (keyword, _) in &accessors {
                self.write(" ");
                self.write(keyword);
                self.write(";");
            }
            self.write_line(" }");
            return;
        }

        self.new_line();
        self.open_brace();
        for (keyword, accessor) in accessors {
            self.write(keyword);
            self.write_body(accessor.body.as_deref());
        }
        self.close_brace();
    }

    fn write_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::LocalDeclaration { type_node, name } => {
                self.write_type_node(type_node);
                self.write(" ");
                self.write(name);
                self.write_line(";");
            }
            Statement::ThrowNull => self.write_line("throw null;"),
        }
    }

    fn write_attributes(&mut self, attributes: &[Attribute]) {
        for attribute in attributes {
            self.write_attribute(attribute);
            self.new_line();
        }
    }

    fn write_attribute(&mut self, attribute: &Attribute) {
        self.write("[");
        if let Some(target) = attribute.target {
            self.write(target);
            self.write(": ");
        }

        let name = match &attribute.type_node {
            TypeNode::Named { name, .. } => name.as_str(),
            _ => attribute.full_name.as_str(),
        };
        let name = match name.strip_suffix("Attribute") {
            Some(short) if !short.is_empty() && !short.ends_with('.') => short,
            _ => name,
        };
        self.write(name);

        if !attribute.arguments.is_empty() || !attribute.named_arguments.is_empty() {
            self.write("(");
            let mut first = true;
            for argument in &attribute.arguments {
                if !first {
                    self.write(", ");
                }
                first = false;
                self.write_expression(argument);
            }
            for (name, argument) in &attribute.named_arguments {
                if !first {
                    self.write(", ");
                }
                first = false;
                self.write(name);
                self.write(" = ");
                self.write_expression(argument);
            }
            self.write(")");
        }
        self.write("]");
    }

    fn write_type_node(&mut self, node: &TypeNode) {
        match node {
            TypeNode::Primitive(keyword) => self.write(keyword),
            TypeNode::Named {
                name, arguments, ..
            } => {
                self.write(name);
                if !arguments.is_empty() {
                    self.write("<");
                    for (index, argument) in arguments.iter().enumerate() {
                        if index > 0 {
                            self.write(", ");
                        }
                        self.write_type_node(argument);
                    }
                    self.write(">");
                }
            }
            TypeNode::Array(element, rank) => {
                self.write_type_node(element);
                self.write("[");
                for _ in 1..*rank {
                    self.write(",");
                }
                self.write("]");
            }
            TypeNode::Pointer(element) => {
                self.write_type_node(element);
                self.write("*");
            }
            TypeNode::ByRef(element) => {
                self.write("ref ");
                self.write_type_node(element);
            }
            TypeNode::GenericParameter(name) => self.write(name),
        }
    }

    fn write_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Constant(value) => {
                let literal = literal(value);
                self.write(&literal);
            }
            Expression::TypeOf(node) => {
                self.write("typeof(");
                self.write_type_node(node);
                self.write(")");
            }
            Expression::Array(elements) => {
                self.write("new[] { ");
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        self.write(", ");
                    }
                    self.write_expression(element);
                }
                self.write(" }");
            }
        }
    }
}

fn escape_char(c: char, quote: char, out: &mut String) {
    match c {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\0' => out.push_str("\\0"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
        c => out.push(c),
    }
}

/// C# literal for a constant.
fn literal(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Bool(value) => value.to_string(),
        ConstantValue::Char(value) => {
            let mut out = String::from("'");
            escape_char(*value, '\'', &mut out);
            out.push('\'');
            out
        }
        ConstantValue::Int(value) => value.to_string(),
        ConstantValue::UInt(value) => value.to_string(),
        ConstantValue::Float(value) if value.is_nan() => "double.NaN".to_string(),
        ConstantValue::Float(value) if value.is_infinite() => {
            if *value > 0.0 {
                "double.PositiveInfinity".to_string()
            } else {
                "double.NegativeInfinity".to_string()
            }
        }
        ConstantValue::Float(value) => format!("{value:?}"),
        ConstantValue::String(value) => {
            let mut out = String::from("\"");
            for c in value.chars() {
                escape_char(c, '"', &mut out);
            }
            out.push('"');
            out
        }
        ConstantValue::Null | ConstantValue::Type(_) => "null".to_string(),
        ConstantValue::Array(elements) => {
            let items: Vec<String> = elements.iter().map(literal).collect();
            format!("new[] {{ {} }}", items.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        decompiler::syntax::{
            EnumMemberDeclaration, FieldDeclaration, MethodDeclaration, NamespaceDeclaration,
            PropertyDeclaration, ResolvedType,
        },
        metadata::{symbol::SymbolKind, token::Token},
    };

    fn widget_unit() -> CompilationUnit {
        let widget = SymbolKey::for_type_path("Namespace.A", vec!["Widget".into()]);
        let helper = SymbolKey::for_type_path("Namespace.A", vec!["Widget".into(), "Helper".into()]);

        let helper_type = TypeDeclaration {
            symbol: helper,
            token: Token::new(0x0200_0003),
            kind: TypeKind::Class,
            modifiers: vec!["private"],
            name: "Helper".into(),
            type_parameters: Vec::new(),
            base_types: Vec::new(),
            attributes: Vec::new(),
            members: Vec::new(),
            delegate_signature: None,
        };
        let run = MethodDeclaration {
            symbol: widget.member(SymbolKind::Method, "Run"),
            modifiers: vec!["public"],
            return_type: Some(TypeNode::Primitive("void")),
            name: "Run".into(),
            type_parameters: Vec::new(),
            parameters: vec![ParameterDeclaration {
                type_node: TypeNode::Primitive("int"),
                name: "times".into(),
            }],
            body: Some(vec![
                Statement::LocalDeclaration {
                    type_node: TypeNode::Named {
                        name: "Namespace.A.Widget.Helper".into(),
                        arguments: Vec::new(),
                        resolved: ResolvedType::unresolved("Namespace.A.Widget+Helper"),
                    },
                    name: "V_0".into(),
                },
                Statement::ThrowNull,
            ]),
            attributes: Vec::new(),
        };
        let name = PropertyDeclaration {
            symbol: widget.member(SymbolKind::Property, "Name"),
            modifiers: vec!["public"],
            type_node: TypeNode::Primitive("string"),
            name: "Name".into(),
            getter: Some(Accessor { body: None }),
            setter: None,
            attributes: Vec::new(),
        };

        CompilationUnit {
            assembly_attributes: Vec::new(),
            members: vec![SyntaxNode::Namespace(NamespaceDeclaration {
                name: "Namespace.A".into(),
                members: vec![SyntaxNode::Type(TypeDeclaration {
                    symbol: widget,
                    token: Token::new(0x0200_0002),
                    kind: TypeKind::Class,
                    modifiers: vec!["public"],
                    name: "Widget".into(),
                    type_parameters: Vec::new(),
                    base_types: Vec::new(),
                    attributes: Vec::new(),
                    members: vec![
                        SyntaxNode::Type(helper_type),
                        SyntaxNode::Property(name),
                        SyntaxNode::Method(run),
                    ],
                    delegate_signature: None,
                })],
            })],
        }
    }

    #[test]
    fn test_render_text() {
        let rendered = OutputVisitor::render(&widget_unit(), &FormattingOptions::with_spaces(4));
        let expected = "\
namespace Namespace.A
{
    public class Widget
    {
        private class Helper
        {
        }

        public string Name { get; }

        public void Run(int times)
        {
            Namespace.A.Widget.Helper V_0;
            throw null;
        }
    }
}
";
        assert_eq!(rendered.text, expected);
    }

    #[test]
    fn test_symbol_locations() {
        let rendered = OutputVisitor::render(&widget_unit(), &FormattingOptions::default());
        let location = |key: &str| rendered.symbols[&key.parse::<SymbolKey>().unwrap()];

        assert_eq!(location("T:Namespace.A.Widget"), SymbolLocation { line: 2, column: 14 });
        assert_eq!(location("T:Namespace.A.Widget+Helper"), SymbolLocation { line: 4, column: 16 });
        assert_eq!(location("P:Namespace.A.Widget.Name"), SymbolLocation { line: 8, column: 16 });
        assert_eq!(location("M:Namespace.A.Widget.Run"), SymbolLocation { line: 10, column: 14 });

        let lines: Vec<&str> = rendered.text.lines().collect();
        assert!(lines[10][14..].starts_with("Run("));
    }

    #[test]
    fn test_enum_and_attributes() {
        let color = SymbolKey::for_type_path("", vec!["Color".into()]);
        let unit = CompilationUnit {
            assembly_attributes: vec![Attribute {
                target: Some("assembly"),
                full_name: "System.Reflection.AssemblyVersionAttribute".into(),
                type_node: TypeNode::Named {
                    name: "System.Reflection.AssemblyVersionAttribute".into(),
                    arguments: Vec::new(),
                    resolved: ResolvedType::unresolved("System.Reflection.AssemblyVersionAttribute"),
                },
                arguments: vec![Expression::Constant(ConstantValue::String("1.0.0.0".into()))],
                named_arguments: Vec::new(),
            }],
            members: vec![SyntaxNode::Type(TypeDeclaration {
                symbol: color.clone(),
                token: Token::new(0x0200_0002),
                kind: TypeKind::Enum,
                modifiers: vec!["public"],
                name: "Color".into(),
                type_parameters: Vec::new(),
                base_types: vec![TypeNode::Primitive("byte")],
                attributes: Vec::new(),
                members: vec![
                    SyntaxNode::EnumMember(EnumMemberDeclaration {
                        symbol: color.member(SymbolKind::Field, "Red"),
                        name: "Red".into(),
                        value: Some(Expression::Constant(ConstantValue::Int(0))),
                        attributes: Vec::new(),
                    }),
                    SyntaxNode::Field(FieldDeclaration {
                        symbol: color.member(SymbolKind::Field, "Max"),
                        modifiers: vec!["public", "const"],
                        type_node: TypeNode::Primitive("string"),
                        name: "Max".into(),
                        initializer: Some(Expression::Constant(ConstantValue::String(
                            "a\"b".into(),
                        ))),
                        attributes: Vec::new(),
                    }),
                ],
                delegate_signature: None,
            })],
        };

        let rendered = OutputVisitor::render(&unit, &FormattingOptions::default());
        let expected = "\
[assembly: System.Reflection.AssemblyVersion(\"1.0.0.0\")]

public enum Color : byte
{
\tRed = 0,
\tpublic const string Max = \"a\\\"b\";
}
";
        assert_eq!(rendered.text, expected);
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal(&ConstantValue::Char('\'')), "'\\''");
        assert_eq!(literal(&ConstantValue::Float(1.0)), "1.0");
        assert_eq!(literal(&ConstantValue::Bool(true)), "true");
        assert_eq!(literal(&ConstantValue::Null), "null");
    }
}
