//! Decompiler configuration.

/// Controls which compiler-generated constructs are folded back into source form and
/// how generated files are laid out.
///
/// A construct that is folded back (e.g. lambdas, when `anonymous_methods` is set)
/// hides the compiler-generated types and members that implement it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompilerSettings {
    /// One directory per namespace level (`A/B/C/Type.cs`) instead of one
    /// directory named after the whole namespace (`A.B.C/Type.cs`). Default: `true`.
    pub use_nested_directories_for_namespaces: bool,

    /// Hide closure classes and lambda bodies. Default: `true`.
    pub anonymous_methods: bool,

    /// Hide anonymous type implementations. Default: `true`.
    pub anonymous_types: bool,

    /// Hide `async` state machines. Default: `true`.
    pub async_await: bool,

    /// Hide iterator state machines. Default: `true`.
    pub yield_return: bool,

    /// Hide `<PrivateImplementationDetails>` which holds array initializer data. Default: `true`.
    pub array_initializers: bool,

    /// Hide the helper structs of `fixed` buffers. Default: `true`.
    pub fixed_buffers: bool,

    /// Hide compiler-generated auto-property backing fields. Default: `true`.
    pub automatic_properties: bool,

    /// Text layout of the generated source.
    pub formatting: FormattingOptions,
}

impl Default for DecompilerSettings {
    fn default() -> Self {
        Self {
            use_nested_directories_for_namespaces: true,
            anonymous_methods: true,
            anonymous_types: true,
            async_await: true,
            yield_return: true,
            array_initializers: true,
            fixed_buffers: true,
            automatic_properties: true,
            formatting: FormattingOptions::default(),
        }
    }
}

impl DecompilerSettings {
    /// Creates the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings that fold nothing back, so every compiler-generated type is emitted.
    #[must_use]
    pub fn show_compiler_generated() -> Self {
        Self {
            anonymous_methods: false,
            anonymous_types: false,
            async_await: false,
            yield_return: false,
            array_initializers: false,
            fixed_buffers: false,
            automatic_properties: false,
            ..Self::default()
        }
    }

    /// Sets the namespace directory layout.
    #[must_use]
    pub fn with_nested_directories(mut self, nested: bool) -> Self {
        self.use_nested_directories_for_namespaces = nested;
        self
    }

    /// Sets the formatting options.
    #[must_use]
    pub fn with_formatting(mut self, formatting: FormattingOptions) -> Self {
        self.formatting = formatting;
        self
    }
}

/// Layout of rendered source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingOptions {
    /// One level of indentation. Default: a tab.
    pub indentation: String,
    /// Line terminator. Default: `\n`.
    pub new_line: String,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            indentation: "\t".to_string(),
            new_line: "\n".to_string(),
        }
    }
}

impl FormattingOptions {
    /// Indents with `width` spaces instead of tabs.
    #[must_use]
    pub fn with_spaces(width: usize) -> Self {
        Self {
            indentation: " ".repeat(width),
            ..Self::default()
        }
    }
}
