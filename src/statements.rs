//! Synthesized output model: statements, fields, and the composition plan.
//!
//! The synthesizer produces a tree of plain text lines and nested blocks
//! rather than writing to a stream, so tests can compare whole plans
//! structurally and rendering stays trivially deterministic.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::diagnostics::Diagnostics;

/// One synthesized statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// A single line, emitted verbatim at the current indent
    Line(String),
    /// A braced block with a header line and optional text after the
    /// closing brace (lambda bodies close with `};`)
    Block {
        /// Text before the opening brace
        header: String,
        /// Nested statements
        body: Vec<Statement>,
        /// Text appended to the closing brace
        tail: String,
    },
}

impl Statement {
    /// Shortcut for a line statement.
    pub fn line(text: impl Into<String>) -> Self {
        Statement::Line(text.into())
    }

    /// Shortcut for a block statement.
    pub fn block(header: impl Into<String>, body: Vec<Statement>) -> Self {
        Statement::Block { header: header.into(), body, tail: String::new() }
    }

    /// A block whose closing brace carries trailing text.
    pub fn closed_block(
        header: impl Into<String>,
        body: Vec<Statement>,
        tail: impl Into<String>,
    ) -> Self {
        Statement::Block { header: header.into(), body, tail: tail.into() }
    }

    fn render_into(&self, out: &mut String, indent: usize) {
        let pad = "    ".repeat(indent);
        match self {
            Statement::Line(text) => {
                let _ = writeln!(out, "{}{}", pad, text);
            }
            Statement::Block { header, body, tail } => {
                let _ = writeln!(out, "{}{}", pad, header);
                let _ = writeln!(out, "{}{{", pad);
                for stmt in body {
                    stmt.render_into(out, indent + 1);
                }
                let _ = writeln!(out, "{}}}{}", pad, tail);
            }
        }
    }
}

/// Renders a statement list at the given indent.
pub fn render_statements(statements: &[Statement], indent: usize) -> String {
    let mut out = String::new();
    for stmt in statements {
        stmt.render_into(&mut out, indent);
    }
    out
}

/// What a composition field stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Shared instance slot (singleton, scoped, or per-thread)
    Shared,
    /// Class-level composition argument
    Argument,
    /// Lock object, disposables array, dispose index, created flag
    Infrastructure,
}

/// A planned composition field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlan {
    /// Field name
    pub name: String,
    /// Rendered field type
    pub type_name: String,
    /// Storage category
    pub kind: FieldKind,
    /// Per-thread slot, rendered as a `[ThreadStatic]` static field
    pub thread_local: bool,
    /// Inline initializer expression, when the field starts non-default
    pub init: Option<String>,
}

/// A planned composition constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorPlan {
    /// Parameterless constructor initializing infrastructure only
    Default,
    /// Constructor taking every class-level argument in declaration order
    WithArgs(Vec<(String, String)>),
    /// Scope constructor copying singleton state from a parent composition
    ScopeCopy,
}

/// A planned root member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPlan {
    /// Generated member name
    pub name: String,
    /// Rendered return type
    pub return_type: String,
    /// Whether the member is public
    pub is_public: bool,
    /// Root-method parameters as (name, type) pairs
    pub params: Vec<(String, String)>,
    /// Method body
    pub body: Vec<Statement>,
}

/// The complete synthesized composition.
#[derive(Debug, Clone)]
pub struct CompositionPlan {
    /// Composition class name
    pub name: Arc<str>,
    /// Fields in deterministic order: arguments, then shared slots, then
    /// infrastructure
    pub fields: Vec<FieldPlan>,
    /// Constructors
    pub constructors: Vec<ConstructorPlan>,
    /// Roots in declaration order; fatally-diagnosed roots are absent
    pub roots: Vec<RootPlan>,
    /// Dispose method body; empty when nothing is tracked
    pub dispose: Vec<Statement>,
    /// Everything collected while composing
    pub diagnostics: Diagnostics,
}

impl CompositionPlan {
    /// Renders the plan as text. Two plans built from the same setup render
    /// byte-identically.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "class {}", self.name);
        let _ = writeln!(out, "{{");

        for field in &self.fields {
            let modifiers =
                if field.thread_local { "[ThreadStatic] private static" } else { "private" };
            match &field.init {
                Some(init) => {
                    let _ = writeln!(
                        out,
                        "    {} {} {} = {};",
                        modifiers, field.type_name, field.name, init
                    );
                }
                None => {
                    let _ =
                        writeln!(out, "    {} {} {};", modifiers, field.type_name, field.name);
                }
            }
        }
        if !self.fields.is_empty() {
            let _ = writeln!(out);
        }

        for ctor in &self.constructors {
            match ctor {
                ConstructorPlan::Default => {
                    let _ = writeln!(out, "    public {}() {{ }}", self.name);
                }
                ConstructorPlan::WithArgs(args) => {
                    let rendered: Vec<String> =
                        args.iter().map(|(name, ty)| format!("{} {}", ty, name)).collect();
                    let _ = writeln!(out, "    public {}({})", self.name, rendered.join(", "));
                    let _ = writeln!(out, "    {{");
                    for (name, _) in args {
                        let _ = writeln!(out, "        _arg{} = {};", capitalize(name), name);
                    }
                    let _ = writeln!(out, "    }}");
                }
                ConstructorPlan::ScopeCopy => {
                    let _ = writeln!(out, "    internal {}({} parent)", self.name, self.name);
                    let _ = writeln!(out, "    {{");
                    // Scoped slots stay fresh, static per-thread slots are
                    // already visible; everything else carries over.
                    for field in &self.fields {
                        let copied = match field.kind {
                            FieldKind::Argument => true,
                            FieldKind::Shared => {
                                !field.thread_local && !field.name.starts_with("_scoped")
                            }
                            FieldKind::Infrastructure => field.name == "_lock",
                        };
                        if copied {
                            let _ = writeln!(
                                out,
                                "        {} = parent.{};",
                                field.name, field.name
                            );
                        }
                    }
                    let _ = writeln!(out, "    }}");
                }
            }
            let _ = writeln!(out);
        }

        for root in &self.roots {
            let access = if root.is_public { "public" } else { "private" };
            let params: Vec<String> =
                root.params.iter().map(|(name, ty)| format!("{} {}", ty, name)).collect();
            let _ = writeln!(
                out,
                "    {} {} {}({})",
                access,
                root.return_type,
                root.name,
                params.join(", "),
            );
            let _ = writeln!(out, "    {{");
            out.push_str(&render_statements(&root.body, 2));
            let _ = writeln!(out, "    }}");
            let _ = writeln!(out);
        }

        if !self.dispose.is_empty() {
            let _ = writeln!(out, "    public void Dispose()");
            let _ = writeln!(out, "    {{");
            out.push_str(&render_statements(&self.dispose, 2));
            let _ = writeln!(out, "    }}");
        }

        let _ = writeln!(out, "}}");
        out
    }
}

pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
