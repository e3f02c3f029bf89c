//! Symbolic type model: contract types, tags, and injection sites.
//!
//! The engine never touches the host language's reflection or syntax trees.
//! Types arrive as [`TypeRef`] trees built by the excluded front end, and
//! everything downstream (unification, graph building, synthesis) works on
//! this structural representation.

use std::fmt;
use std::sync::Arc;

/// A structural reference to a contract or implementation type.
///
/// `TypeRef` is host-language independent: a named type with zero or more
/// type arguments, plus the handful of built-in shapes the engine gives
/// special meaning to (arrays, spans, tuples, delegates, enumerables).
///
/// Markers are open-generic placeholders: a binding declared against
/// `Named("Repo", [Marker(0)])` can service any closed `Repo<..>` request
/// through unification (see [`crate::unify`]).
///
/// The derived `Ord` gives a total, stable order used wherever determinism
/// matters (sorted field lists, collection element ordering).
///
/// # Examples
///
/// ```rust
/// use forge_di::TypeRef;
///
/// let logger = TypeRef::named("ILogger");
/// let repo = TypeRef::generic("Repo", vec![TypeRef::named("User")]);
/// assert_eq!(repo.to_string(), "Repo<User>");
/// assert_eq!(repo.short_name(), "Repo");
///
/// let many = TypeRef::Enumerable(Box::new(logger.clone()));
/// assert!(many.is_lazy());
/// assert!(!logger.is_lazy());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeRef {
    /// A named type with type arguments (empty for non-generic types)
    Named {
        /// Type name as the front end spells it
        name: Arc<str>,
        /// Type arguments, possibly containing markers
        args: Vec<TypeRef>,
    },
    /// Open-generic placeholder that unifies with any type
    Marker(u32),
    /// Array of elements; a built-in collection construct
    Array(Box<TypeRef>),
    /// Contiguous span of elements; a built-in collection construct
    Span(Box<TypeRef>),
    /// Tuple of items; a built-in construct resolving each item
    Tuple(Vec<TypeRef>),
    /// Delegate type; a lazy boundary whose result is resolved deferred
    Func {
        /// Parameter types, become override bindings inside the deferred block
        params: Vec<TypeRef>,
        /// Produced type
        ret: Box<TypeRef>,
    },
    /// Lazily-yielding collection of every matching binding; a lazy boundary
    Enumerable(Box<TypeRef>),
    /// Asynchronous variant of [`TypeRef::Enumerable`]
    AsyncEnumerable(Box<TypeRef>),
}

impl TypeRef {
    /// Creates a non-generic named type.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        TypeRef::Named { name: name.into(), args: Vec::new() }
    }

    /// Creates a generic named type with the given arguments.
    pub fn generic(name: impl Into<Arc<str>>, args: Vec<TypeRef>) -> Self {
        TypeRef::Named { name: name.into(), args }
    }

    /// True for injection shapes whose expansion is deferred rather than
    /// inlined into the current construction block.
    pub fn is_lazy(&self) -> bool {
        matches!(
            self,
            TypeRef::Func { .. } | TypeRef::Enumerable(_) | TypeRef::AsyncEnumerable(_)
        )
    }

    /// Element type of the built-in collection shapes, if any.
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(e)
            | TypeRef::Span(e)
            | TypeRef::Enumerable(e)
            | TypeRef::AsyncEnumerable(e) => Some(e),
            _ => None,
        }
    }

    /// Whether any marker occurs anywhere in this type tree.
    pub fn contains_marker(&self) -> bool {
        match self {
            TypeRef::Marker(_) => true,
            TypeRef::Named { args, .. } | TypeRef::Tuple(args) => {
                args.iter().any(TypeRef::contains_marker)
            }
            TypeRef::Array(e)
            | TypeRef::Span(e)
            | TypeRef::Enumerable(e)
            | TypeRef::AsyncEnumerable(e) => e.contains_marker(),
            TypeRef::Func { params, ret } => {
                params.iter().any(TypeRef::contains_marker) || ret.contains_marker()
            }
        }
    }

    /// Collects every marker id occurring in this type tree.
    pub fn markers(&self, out: &mut Vec<u32>) {
        match self {
            TypeRef::Marker(id) => out.push(*id),
            TypeRef::Named { args, .. } | TypeRef::Tuple(args) => {
                for a in args {
                    a.markers(out);
                }
            }
            TypeRef::Array(e)
            | TypeRef::Span(e)
            | TypeRef::Enumerable(e)
            | TypeRef::AsyncEnumerable(e) => e.markers(out),
            TypeRef::Func { params, ret } => {
                for p in params {
                    p.markers(out);
                }
                ret.markers(out);
            }
        }
    }

    /// A short identifier-friendly name used when synthesizing variable and
    /// field names. Generic arguments and shapes are flattened.
    pub fn short_name(&self) -> String {
        match self {
            TypeRef::Named { name, .. } => {
                let last = name.rsplit(['.', ':']).next().unwrap_or(name);
                last.chars().filter(|c| c.is_alphanumeric()).collect()
            }
            TypeRef::Marker(id) => format!("TT{}", id),
            TypeRef::Array(e) => format!("{}Array", e.short_name()),
            TypeRef::Span(e) => format!("{}Span", e.short_name()),
            TypeRef::Tuple(_) => "Tuple".to_string(),
            TypeRef::Func { ret, .. } => format!("{}Func", ret.short_name()),
            TypeRef::Enumerable(e) => format!("{}Enumerable", e.short_name()),
            TypeRef::AsyncEnumerable(e) => format!("{}AsyncEnumerable", e.short_name()),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[TypeRef]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }
        match self {
            TypeRef::Named { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    join(f, args)?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeRef::Marker(id) => write!(f, "TT{}", id),
            TypeRef::Array(e) => write!(f, "Array<{}>", e),
            TypeRef::Span(e) => write!(f, "Span<{}>", e),
            TypeRef::Tuple(items) => {
                write!(f, "(")?;
                join(f, items)?;
                write!(f, ")")
            }
            TypeRef::Func { params, ret } => {
                write!(f, "Func<")?;
                join(f, params)?;
                if !params.is_empty() {
                    write!(f, ", ")?;
                }
                write!(f, "{}>", ret)
            }
            TypeRef::Enumerable(e) => write!(f, "Enumerable<{}>", e),
            TypeRef::AsyncEnumerable(e) => write!(f, "AsyncEnumerable<{}>", e),
        }
    }
}

/// Binding and injection tag.
///
/// Tags distinguish multiple bindings of the same contract type. A binding
/// carrying [`Tag::Any`] matches an injection with any tag; it participates
/// after exact-tag matches and before open-generic unification.
///
/// # Examples
///
/// ```rust
/// use forge_di::Tag;
///
/// let primary = Tag::str("primary");
/// let index = Tag::Int(2);
/// assert_eq!(primary.to_string(), "\"primary\"");
/// assert_eq!(index.to_string(), "2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    /// String tag
    Str(Arc<str>),
    /// Integer tag
    Int(i64),
    /// Generated unique tag, never matched by user injections directly
    Unique(u64),
    /// Wildcard: matches any injection tag
    Any,
}

impl Tag {
    /// Creates a string tag.
    pub fn str(value: impl Into<Arc<str>>) -> Self {
        Tag::Str(value.into())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Str(s) => write!(f, "\"{}\"", s),
            Tag::Int(i) => write!(f, "{}", i),
            Tag::Unique(id) => write!(f, "#unique{}", id),
            Tag::Any => write!(f, "#any"),
        }
    }
}

/// A requested (type, tag) pair at a specific consumption site.
///
/// Injections are what the registry resolves: every constructor parameter,
/// injectable member, factory marker, and composition root boils down to one.
///
/// # Examples
///
/// ```rust
/// use forge_di::{Injection, Tag, TypeRef};
///
/// let plain = Injection::of(TypeRef::named("ILogger"));
/// let tagged = Injection::tagged(TypeRef::named("ILogger"), Tag::str("audit"));
/// assert_eq!(plain.to_string(), "ILogger");
/// assert_eq!(tagged.to_string(), "ILogger(\"audit\")");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Injection {
    /// Requested contract type
    pub type_ref: TypeRef,
    /// Optional tag narrowing the binding choice
    pub tag: Option<Tag>,
}

impl Injection {
    /// Creates an untagged injection.
    pub fn of(type_ref: TypeRef) -> Self {
        Injection { type_ref, tag: None }
    }

    /// Creates a tagged injection.
    pub fn tagged(type_ref: TypeRef, tag: Tag) -> Self {
        Injection { type_ref, tag: Some(tag) }
    }
}

impl fmt::Display for Injection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}({})", self.type_ref, tag),
            None => write!(f, "{}", self.type_ref),
        }
    }
}

/// A literal value used for explicit defaults and parameter fallbacks.
///
/// Rendered verbatim into synthesized code; the engine never interprets the
/// value beyond printing it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Literal {
    /// Integer literal
    Int(i64),
    /// String literal
    Str(Arc<str>),
    /// Boolean literal
    Bool(bool),
    /// Null reference
    Null,
    /// The type's default value
    Default,
    /// Raw code fragment supplied by the front end
    Verbatim(Arc<str>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Str(s) => write!(f, "\"{}\"", s),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
            Literal::Default => write!(f, "default"),
            Literal::Verbatim(code) => write!(f, "{}", code),
        }
    }
}
