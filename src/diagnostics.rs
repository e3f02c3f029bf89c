//! Structured diagnostics collected during composition.
//!
//! The engine never writes to an output stream. Every problem found while
//! resolving a composition becomes a [`Diagnostic`] record carrying the full
//! injection path; the excluded reporting layer turns these into
//! compiler-style messages. Fatal diagnostics are collected, not
//! short-circuited, so one pass reports every independent problem.

use std::fmt;
use std::sync::Arc;

use crate::types::{Injection, TypeRef};

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Advisory; generation continues
    Warning,
    /// Fatal for the affected root; no code is emitted for it
    Error,
}

/// The taxonomy of composition problems.
///
/// # Examples
///
/// ```rust
/// use forge_di::{DiagnosticKind, Severity};
///
/// assert_eq!(DiagnosticKind::CannotResolve.severity(), Severity::Error);
/// assert_eq!(DiagnosticKind::CtorObsoleted.severity(), Severity::Warning);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// No binding, no constructible default, and no fallback registered
    CannotResolve,
    /// An eager cycle with no lazy edge breaking it
    CircularDependency,
    /// Malformed binding or setup
    InvalidSetup,
    /// A selected injection target is not reachable from generated code
    MemberInaccessible,
    /// An obsolete-marked constructor was nonetheless selected
    CtorObsoleted,
    /// Resolution failed but a fallback factory satisfied it
    CannotResolveFallback,
}

impl DiagnosticKind {
    /// The severity implied by this kind.
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::CannotResolve
            | DiagnosticKind::CircularDependency
            | DiagnosticKind::InvalidSetup
            | DiagnosticKind::MemberInaccessible => Severity::Error,
            DiagnosticKind::CtorObsoleted | DiagnosticKind::CannotResolveFallback => {
                Severity::Warning
            }
        }
    }
}

/// Source location supplied by the front end, echoed back in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    /// Source file path or document name
    pub file: Arc<str>,
    /// One-based line
    pub line: u32,
    /// One-based column
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// One step of an injection path, from the offending site back to the root.
///
/// Rendered as `constructor Service.Service(ILogger logger) argument ILogger
/// logger` style fragments chained with `<--`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    /// The type owning the consumption site
    pub owner: TypeRef,
    /// Description of the site, e.g. `constructor Service(ILogger logger)`
    pub site: String,
    /// The injection requested at that site
    pub injection: Injection,
}

impl fmt::Display for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} argument {}", self.owner, self.site, self.injection)
    }
}

/// A single structured diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Which problem this is
    pub kind: DiagnosticKind,
    /// Derived from `kind`, stored for cheap filtering
    pub severity: Severity,
    /// Human-readable message without the chain
    pub message: String,
    /// Injection path context, offending site first
    pub chain: Vec<ChainLink>,
    /// Source location, when the front end supplied one
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Creates a diagnostic for the given kind.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            severity: kind.severity(),
            message: message.into(),
            chain: Vec::new(),
            location: None,
        }
    }

    /// Attaches the injection path.
    pub fn with_chain(mut self, chain: Vec<ChainLink>) -> Self {
        self.chain = chain;
        self
    }

    /// Attaches a source location.
    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for link in &self.chain {
            write!(f, " <-- {}", link)?;
        }
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// Collecting sink for diagnostics.
///
/// # Examples
///
/// ```rust
/// use forge_di::{Diagnostics, Diagnostic, DiagnosticKind};
///
/// let mut diags = Diagnostics::new();
/// assert!(!diags.has_errors());
///
/// diags.push(Diagnostic::new(DiagnosticKind::CtorObsoleted, "obsolete ctor"));
/// assert!(!diags.has_errors());
///
/// diags.push(Diagnostic::new(DiagnosticKind::CannotResolve, "no binding for ILogger"));
/// assert!(diags.has_errors());
/// assert_eq!(diags.errors().count(), 1);
/// assert_eq!(diags.warnings().count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Diagnostics { items: Vec::new() }
    }

    /// Appends a record.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Appends every record of another sink.
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// All records in report order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Error records only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Warning records only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// Whether any fatal record was collected.
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Number of fatal records.
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the sink is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
