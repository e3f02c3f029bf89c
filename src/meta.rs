//! Input metadata: the semantic model, composition roots, and hints.
//!
//! The excluded front end walks the host language's attribute/fluent surface
//! and hands the engine this well-formed metadata: a [`SetupModel`] with
//! bindings and requested roots, plus a [`TypeRegistry`] describing the
//! constructors and injectable members of every type the bindings mention.

use std::sync::Arc;

use ahash::AHashMap;

use crate::bindings::BindingDef;
use crate::types::{Injection, Literal, TypeRef};
use crate::unify::{self, Substitution};

/// Accessibility of a type, constructor, or member from generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Accessibility {
    /// Reachable from anywhere
    Public,
    /// Reachable only when internals are visible to the generated code
    Internal,
    /// Never reachable from generated code
    Private,
}

impl Accessibility {
    /// Whether generated code can use this target.
    pub fn is_accessible(self, internals_visible: bool) -> bool {
        match self {
            Accessibility::Public => true,
            Accessibility::Internal => internals_visible,
            Accessibility::Private => false,
        }
    }
}

/// A constructor or method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamMeta {
    /// Parameter name as declared
    pub name: Arc<str>,
    /// The injection this parameter requests
    pub injection: Injection,
    /// Declared default value, used silently when resolution fails
    pub default: Option<Literal>,
}

impl ParamMeta {
    /// Creates a parameter without a default.
    pub fn new(name: impl Into<Arc<str>>, injection: Injection) -> Self {
        ParamMeta { name: name.into(), injection, default: None }
    }

    /// Attaches a default value.
    pub fn with_default(mut self, default: Literal) -> Self {
        self.default = Some(default);
        self
    }
}

/// Constructor metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtorMeta {
    /// Parameters in declaration order
    pub params: Vec<ParamMeta>,
    /// Accessibility from generated code
    pub accessibility: Accessibility,
    /// Explicit order annotation; lower wins, `None` after all `Some`
    pub ordinal: Option<i32>,
    /// Obsolete-marked constructors are deprioritized and warn when chosen
    pub obsolete: bool,
}

impl CtorMeta {
    /// Creates a public, non-obsolete constructor.
    pub fn new(params: Vec<ParamMeta>) -> Self {
        CtorMeta { params, accessibility: Accessibility::Public, ordinal: None, obsolete: false }
    }

    /// Sets the explicit order annotation.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    /// Marks the constructor obsolete.
    pub fn obsoleted(mut self) -> Self {
        self.obsolete = true;
        self
    }

    /// Sets accessibility.
    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }
}

/// Kind of an injectable member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemberKind {
    /// Assignable field
    Field,
    /// Settable property
    Property,
    /// Injection method called after construction
    Method,
}

/// An injectable field, property, or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberMeta {
    /// Member name
    pub name: Arc<str>,
    /// Field, property, or method
    pub kind: MemberKind,
    /// One parameter for fields/properties, the full list for methods
    pub params: Vec<ParamMeta>,
    /// Required/init-only members are set in the object initializer
    pub required: bool,
    /// Explicitly annotated as injectable
    pub explicitly_marked: bool,
    /// Explicit order annotation; lower wins, `None` after all `Some`
    pub ordinal: Option<i32>,
    /// Accessibility from generated code
    pub accessibility: Accessibility,
}

impl MemberMeta {
    /// Creates an explicitly-marked injectable field.
    pub fn field(name: impl Into<Arc<str>>, injection: Injection) -> Self {
        let name = name.into();
        MemberMeta {
            params: vec![ParamMeta::new(name.clone(), injection)],
            name,
            kind: MemberKind::Field,
            required: false,
            explicitly_marked: true,
            ordinal: None,
            accessibility: Accessibility::Public,
        }
    }

    /// Creates an explicitly-marked injectable property.
    pub fn property(name: impl Into<Arc<str>>, injection: Injection) -> Self {
        let mut member = MemberMeta::field(name, injection);
        member.kind = MemberKind::Property;
        member
    }

    /// Creates an explicitly-marked injection method.
    pub fn method(name: impl Into<Arc<str>>, params: Vec<ParamMeta>) -> Self {
        MemberMeta {
            name: name.into(),
            kind: MemberKind::Method,
            params,
            required: false,
            explicitly_marked: true,
            ordinal: None,
            accessibility: Accessibility::Public,
        }
    }

    /// Marks the member required (set via object initializer).
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the explicit order annotation.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    /// Sets accessibility.
    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }
}

/// Everything the engine needs to know about one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMeta {
    /// The described type; open generics declare markers here
    pub type_ref: TypeRef,
    /// Constructors in declaration order
    pub constructors: Vec<CtorMeta>,
    /// Fields, properties, and methods in declaration order
    pub members: Vec<MemberMeta>,
    /// Base types and interfaces, for contract verification
    pub implements: Vec<TypeRef>,
    /// Accessibility of the type itself
    pub accessibility: Accessibility,
    /// Value types need companion created-flags in synthesized guards
    pub is_value_type: bool,
    /// Disposable instances get disposal registration
    pub is_disposable: bool,
    /// Asynchronously disposable
    pub is_async_disposable: bool,
}

impl TypeMeta {
    /// Creates a public reference type with no constructors or members.
    pub fn new(type_ref: TypeRef) -> Self {
        TypeMeta {
            type_ref,
            constructors: Vec::new(),
            members: Vec::new(),
            implements: Vec::new(),
            accessibility: Accessibility::Public,
            is_value_type: false,
            is_disposable: false,
            is_async_disposable: false,
        }
    }

    /// Adds a constructor.
    pub fn with_ctor(mut self, ctor: CtorMeta) -> Self {
        self.constructors.push(ctor);
        self
    }

    /// Adds an injectable member.
    pub fn with_member(mut self, member: MemberMeta) -> Self {
        self.members.push(member);
        self
    }

    /// Declares an implemented contract.
    pub fn implements(mut self, contract: TypeRef) -> Self {
        self.implements.push(contract);
        self
    }

    /// Marks the type disposable.
    pub fn disposable(mut self) -> Self {
        self.is_disposable = true;
        self
    }

    /// Marks the type asynchronously disposable.
    pub fn async_disposable(mut self) -> Self {
        self.is_async_disposable = true;
        self
    }

    /// Marks the type as a value type.
    pub fn value_type(mut self) -> Self {
        self.is_value_type = true;
        self
    }

    /// Sets the type accessibility.
    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    fn instantiated(&self, subst: &Substitution) -> TypeMeta {
        let map_params = |params: &[ParamMeta]| -> Vec<ParamMeta> {
            params
                .iter()
                .map(|p| ParamMeta {
                    name: p.name.clone(),
                    injection: unify::substitute_injection(&p.injection, subst),
                    default: p.default.clone(),
                })
                .collect()
        };
        TypeMeta {
            type_ref: unify::substitute(&self.type_ref, subst),
            constructors: self
                .constructors
                .iter()
                .map(|c| CtorMeta {
                    params: map_params(&c.params),
                    accessibility: c.accessibility,
                    ordinal: c.ordinal,
                    obsolete: c.obsolete,
                })
                .collect(),
            members: self
                .members
                .iter()
                .map(|m| MemberMeta {
                    name: m.name.clone(),
                    kind: m.kind,
                    params: map_params(&m.params),
                    required: m.required,
                    explicitly_marked: m.explicitly_marked,
                    ordinal: m.ordinal,
                    accessibility: m.accessibility,
                })
                .collect(),
            implements: self.implements.iter().map(|i| unify::substitute(i, subst)).collect(),
            accessibility: self.accessibility,
            is_value_type: self.is_value_type,
            is_disposable: self.is_disposable,
            is_async_disposable: self.is_async_disposable,
        }
    }
}

/// The semantic model: type name to metadata, with generic instantiation.
///
/// # Examples
///
/// ```rust
/// use forge_di::{CtorMeta, Injection, ParamMeta, TypeMeta, TypeRef, TypeRegistry};
///
/// let mut types = TypeRegistry::new();
/// types.insert(
///     TypeMeta::new(TypeRef::generic("Repo", vec![TypeRef::Marker(0)])).with_ctor(
///         CtorMeta::new(vec![ParamMeta::new(
///             "store",
///             Injection::of(TypeRef::generic("IStore", vec![TypeRef::Marker(0)])),
///         )]),
///     ),
/// );
///
/// let closed = types
///     .meta_for(&TypeRef::generic("Repo", vec![TypeRef::named("User")]))
///     .unwrap();
/// assert_eq!(
///     closed.constructors[0].params[0].injection.type_ref,
///     TypeRef::generic("IStore", vec![TypeRef::named("User")]),
/// );
/// ```
#[derive(Debug, Default)]
pub struct TypeRegistry {
    by_name: AHashMap<Arc<str>, usize>,
    types: Vec<TypeMeta>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers metadata; a later entry for the same type name replaces the
    /// earlier one.
    pub fn insert(&mut self, meta: TypeMeta) {
        let name = match &meta.type_ref {
            TypeRef::Named { name, .. } => name.clone(),
            other => Arc::from(other.to_string()),
        };
        if let Some(&index) = self.by_name.get(&name) {
            self.types[index] = meta;
        } else {
            self.by_name.insert(name, self.types.len());
            self.types.push(meta);
        }
    }

    /// Metadata for a requested type, instantiating open-generic entries
    /// through marker unification. Returns `None` for unknown types.
    pub fn meta_for(&self, request: &TypeRef) -> Option<TypeMeta> {
        let name = match request {
            TypeRef::Named { name, .. } => name.clone(),
            other => Arc::from(other.to_string()),
        };
        let meta = &self.types[*self.by_name.get(&name)?];
        if meta.type_ref == *request {
            return Some(meta.clone());
        }
        let mut subst = Substitution::new();
        if unify::unify(&meta.type_ref, request, &mut subst) {
            Some(meta.instantiated(&subst))
        } else {
            None
        }
    }

    /// Whether the registry knows this type at all.
    pub fn contains(&self, request: &TypeRef) -> bool {
        self.meta_for(request).is_some()
    }
}

/// A class-level composition argument: surfaces as a field plus a
/// parameterized constructor parameter, resolvable anywhere in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDef {
    /// Argument name
    pub name: Arc<str>,
    /// The injection this argument satisfies
    pub injection: Injection,
}

impl ArgDef {
    /// Creates an argument definition.
    pub fn new(name: impl Into<Arc<str>>, injection: Injection) -> Self {
        ArgDef { name: name.into(), injection }
    }
}

/// A named composition root requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDef {
    /// Generated member name
    pub name: Arc<str>,
    /// The injection the root resolves
    pub injection: Injection,
    /// Whether the generated member is public
    pub is_public: bool,
    /// Explicit root-method arguments, resolvable only inside this root
    pub args: Vec<ArgDef>,
}

impl RootDef {
    /// Creates a public root without arguments.
    pub fn new(name: impl Into<Arc<str>>, injection: Injection) -> Self {
        RootDef { name: name.into(), injection, is_public: true, args: Vec::new() }
    }

    /// Makes the root private.
    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    /// Adds a root-method argument.
    pub fn with_arg(mut self, arg: ArgDef) -> Self {
        self.args.push(arg);
        self
    }
}

/// Global generation hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hints {
    /// Guard shared creations with double-checked locking
    pub thread_safe: bool,
    /// Internal members are reachable from generated code
    pub internals_visible: bool,
    /// Emit an `OnNewInstance` interception call after each creation
    pub on_new_instance: bool,
    /// Wrap injected references in `OnDependencyInjection` calls
    pub on_dependency_injection: bool,
    /// Route otherwise-unresolved injections to a user fallback factory
    pub on_cannot_resolve: bool,
}

impl Default for Hints {
    fn default() -> Self {
        Hints {
            thread_safe: true,
            internals_visible: false,
            on_new_instance: false,
            on_dependency_injection: false,
            on_cannot_resolve: false,
        }
    }
}

/// The complete declarative setup for one composition class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupModel {
    /// Composition class name
    pub name: Arc<str>,
    /// Bindings in declaration order; later identical keys override
    pub bindings: Vec<BindingDef>,
    /// Class-level arguments
    pub args: Vec<ArgDef>,
    /// Requested composition roots
    pub roots: Vec<RootDef>,
    /// Global hints
    pub hints: Hints,
}

impl SetupModel {
    /// Creates an empty setup with default hints.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        SetupModel {
            name: name.into(),
            bindings: Vec::new(),
            args: Vec::new(),
            roots: Vec::new(),
            hints: Hints::default(),
        }
    }

    /// Adds a binding.
    pub fn bind(mut self, def: BindingDef) -> Self {
        self.bindings.push(def);
        self
    }

    /// Adds a class-level argument.
    pub fn arg(mut self, arg: ArgDef) -> Self {
        self.args.push(arg);
        self
    }

    /// Adds a composition root.
    pub fn root(mut self, root: RootDef) -> Self {
        self.roots.push(root);
        self
    }

    /// Replaces the hints.
    pub fn with_hints(mut self, hints: Hints) -> Self {
        self.hints = hints;
        self
    }
}
