//! Binding model and registry.
//!
//! Raw bindings from the front end are normalized into a table keyed by
//! (contract type, tag). Later registrations for an identical key override
//! earlier ones (last-wins). Resolution is tiered: exact closed-type match,
//! then any-tag bindings, then open-generic bindings closed through marker
//! unification. Everything below that tier (auto-constructible types,
//! fallback factories, parameter defaults) is the graph builder's business.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;

use crate::diagnostics::Location;
use crate::lifetime::Lifetime;
use crate::types::{Injection, Literal, Tag, TypeRef};
use crate::unify::{self, Substitution};

/// One piece of a factory body as supplied by the front end.
///
/// The engine never parses host-language syntax; a factory arrives as an
/// ordered list of opaque code fragments interleaved with injection markers
/// and return markers, and the synthesizer rewrites the markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryFragment {
    /// Opaque code emitted verbatim
    Code(Arc<str>),
    /// An injection-call marker; rewritten to a variable declaration
    Inject {
        /// What the factory asked for at this point
        injection: Injection,
        /// The local name the surrounding opaque code refers to
        var_hint: Arc<str>,
    },
    /// A return marker carrying the returned expression text
    Return(Arc<str>),
}

/// Abstract factory body: injection markers plus surrounding opaque code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FactoryModel {
    /// Ordered body fragments
    pub fragments: Vec<FactoryFragment>,
}

impl FactoryModel {
    /// The injections this factory declares, in body order.
    pub fn injections(&self) -> impl Iterator<Item = &Injection> {
        self.fragments.iter().filter_map(|f| match f {
            FactoryFragment::Inject { injection, .. } => Some(injection),
            _ => None,
        })
    }

    /// Number of return markers; more than one triggers the
    /// assignment-plus-jump rewriting in the synthesizer.
    pub fn exit_count(&self) -> usize {
        self.fragments
            .iter()
            .filter(|f| matches!(f, FactoryFragment::Return(_)))
            .count()
    }
}

/// Built-in construct kinds the engine synthesizes without a user factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructKind {
    /// Array literal of every binding matching the element contract
    Array(TypeRef),
    /// Span literal of every binding matching the element contract
    Span(TypeRef),
    /// Lazily-yielding local enumerator over every matching binding
    Enumerable(TypeRef),
    /// Asynchronous variant of `Enumerable`
    AsyncEnumerable(TypeRef),
    /// Tuple resolving each item type
    Tuple(Vec<TypeRef>),
    /// Delegate producing `ret` inside a deferred block; `params` become
    /// override bindings visible only inside that block
    Func {
        /// Delegate parameter types
        params: Vec<TypeRef>,
        /// Produced type
        ret: TypeRef,
    },
    /// The composition object itself
    Composition,
    /// User fallback factory satisfying an otherwise-unresolved injection
    OnCannotResolve(Injection),
    /// A literal default value
    ExplicitDefault(Literal),
    /// Collection gathering disposables created inside a lazy boundary
    Accumulator(TypeRef),
    /// A value supplied from outside the expansion (root argument,
    /// delegate parameter, composition argument)
    Override(Injection),
}

/// Implementation strategy of a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Constructor-injected implementation type
    Implementation {
        /// The concrete type to construct; may contain markers bound by
        /// the binding's contracts
        type_ref: TypeRef,
    },
    /// User factory body with injection markers
    Factory(FactoryModel),
    /// Built-in construct
    Construct(ConstructKind),
}

/// A raw binding as handed over by the excluded front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDef {
    /// Contract types reachable for this binding; one entry per exposed
    /// contract, all sharing the same lifetime and instance
    pub contracts: Vec<TypeRef>,
    /// Tags; empty means the binding only serves untagged injections
    pub tags: Vec<Tag>,
    /// Sharing policy
    pub lifetime: Lifetime,
    /// Implementation strategy
    pub payload: Payload,
    /// Source location for diagnostics
    pub location: Option<Location>,
}

impl BindingDef {
    /// Creates a single-contract, untagged binding.
    pub fn new(contract: TypeRef, lifetime: Lifetime, payload: Payload) -> Self {
        BindingDef {
            contracts: vec![contract],
            tags: Vec::new(),
            lifetime,
            payload,
            location: None,
        }
    }

    /// Shortcut for a constructor-injected implementation binding.
    pub fn implementation(contract: TypeRef, implementation: TypeRef, lifetime: Lifetime) -> Self {
        BindingDef::new(contract, lifetime, Payload::Implementation { type_ref: implementation })
    }

    /// Adds another contract exposing the same binding.
    pub fn with_contract(mut self, contract: TypeRef) -> Self {
        self.contracts.push(contract);
        self
    }

    /// Adds a tag.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Attaches a source location.
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// Stable identity of a normalized binding, assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(pub u32);

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A normalized, immutable binding in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Registration-order identity
    pub id: BindingId,
    /// Exposed contract types
    pub contracts: Vec<TypeRef>,
    /// Sorted, deduplicated tags
    pub tags: Vec<Tag>,
    /// Sharing policy
    pub lifetime: Lifetime,
    /// Implementation strategy
    pub payload: Payload,
    /// Source location for diagnostics
    pub location: Option<Location>,
}

impl Binding {
    /// Whether this binding serves an injection carrying `tag`.
    pub fn matches_tag(&self, tag: &Option<Tag>) -> bool {
        if self.tags.is_empty() {
            return tag.is_none();
        }
        if self.tags.iter().any(|t| *t == Tag::Any) {
            return true;
        }
        match tag {
            Some(t) => self.tags.contains(t),
            None => false,
        }
    }

    /// The type this binding produces: the implementation type for
    /// implementation payloads, the first contract otherwise. `None` for a
    /// contract-less non-implementation binding, which setup validation
    /// rejects but the registry itself accepts.
    pub fn produced_type(&self) -> Option<&TypeRef> {
        match &self.payload {
            Payload::Implementation { type_ref } => Some(type_ref),
            _ => self.contracts.first(),
        }
    }

    /// Whether any contract still contains a marker (open generic).
    pub fn is_open(&self) -> bool {
        self.contracts.iter().any(TypeRef::contains_marker)
    }
}

/// The binding table keyed by (contract type, tag).
///
/// # Examples
///
/// ```rust
/// use forge_di::{BindingDef, BindingRegistry, Injection, Lifetime, TypeRef};
///
/// let defs = vec![
///     BindingDef::implementation(
///         TypeRef::named("ILogger"),
///         TypeRef::named("Logger"),
///         Lifetime::Singleton,
///     ),
///     // Last registration wins for an identical key
///     BindingDef::implementation(
///         TypeRef::named("ILogger"),
///         TypeRef::named("FileLogger"),
///         Lifetime::Singleton,
///     ),
/// ];
/// let mut registry = BindingRegistry::from_defs(&defs);
///
/// let id = registry.resolve(&Injection::of(TypeRef::named("ILogger"))).unwrap();
/// assert_eq!(
///     registry.get(id).produced_type(),
///     Some(&TypeRef::named("FileLogger")),
/// );
/// ```
#[derive(Debug, Default)]
pub struct BindingRegistry {
    bindings: Vec<Binding>,
    exact: AHashMap<(TypeRef, Option<Tag>), BindingId>,
    any_tag: AHashMap<TypeRef, BindingId>,
    open: Vec<BindingId>,
    instantiation_cache: AHashMap<(TypeRef, Option<Tag>), Option<BindingId>>,
}

impl BindingRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from raw bindings in declaration order.
    pub fn from_defs(defs: &[BindingDef]) -> Self {
        let mut registry = Self::new();
        for def in defs {
            registry.register(def.clone());
        }
        registry
    }

    /// Inserts a binding, overriding earlier registrations with the same
    /// (contract, tag) key.
    pub fn register(&mut self, def: BindingDef) -> BindingId {
        let id = BindingId(self.bindings.len() as u32);
        let mut tags = def.tags;
        tags.sort();
        tags.dedup();
        let binding = Binding {
            id,
            contracts: def.contracts,
            tags,
            lifetime: def.lifetime,
            payload: def.payload,
            location: def.location,
        };
        for contract in &binding.contracts {
            if contract.contains_marker() {
                if !self.open.contains(&id) {
                    self.open.push(id);
                }
                continue;
            }
            if binding.tags.is_empty() {
                self.exact.insert((contract.clone(), None), id);
            } else {
                for tag in &binding.tags {
                    match tag {
                        Tag::Any => {
                            self.any_tag.insert(contract.clone(), id);
                        }
                        t => {
                            self.exact.insert((contract.clone(), Some(t.clone())), id);
                        }
                    }
                }
            }
        }
        self.bindings.push(binding);
        id
    }

    /// Registers an implicit transient binding for a concrete type resolved
    /// without a user binding.
    pub fn register_implicit(&mut self, type_ref: &TypeRef) -> BindingId {
        let def = BindingDef::implementation(type_ref.clone(), type_ref.clone(), Lifetime::Transient);
        self.register(def)
    }

    /// Looks up a binding by id.
    pub fn get(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0 as usize]
    }

    /// Number of normalized bindings, including instantiated generics.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the registry holds no bindings.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// All bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    /// Finds the most specific binding for an injection.
    ///
    /// Tiers, in order: exact (type, tag) key; exact type with an any-tag
    /// binding; open-generic binding whose contract unifies with the
    /// requested type (latest registration wins). Instantiated generics are
    /// cached per (type, tag). Returns `None` when no tier matches; the
    /// caller owns the fallback chain.
    pub fn resolve(&mut self, injection: &Injection) -> Option<BindingId> {
        let key = (injection.type_ref.clone(), injection.tag.clone());
        if let Some(&id) = self.exact.get(&key) {
            return Some(id);
        }
        if let Some(&id) = self.any_tag.get(&injection.type_ref) {
            return Some(id);
        }
        if let Some(&cached) = self.instantiation_cache.get(&key) {
            return cached;
        }
        let mut found: Option<(BindingId, Substitution)> = None;
        'search: for &open_id in self.open.iter().rev() {
            let binding = &self.bindings[open_id.0 as usize];
            if !binding.matches_tag(&injection.tag) {
                continue;
            }
            for contract in &binding.contracts {
                let mut subst = Substitution::new();
                if unify::unify(contract, &injection.type_ref, &mut subst) {
                    found = Some((open_id, subst));
                    break 'search;
                }
            }
        }
        let result = found.map(|(id, subst)| self.instantiate(id, &subst));
        self.instantiation_cache.insert(key, result);
        result
    }

    /// Read-only probe used by the constructor selector: would `resolve`
    /// find a binding for this injection?
    pub fn can_resolve(&self, injection: &Injection) -> bool {
        let key = (injection.type_ref.clone(), injection.tag.clone());
        if self.exact.contains_key(&key) || self.any_tag.contains_key(&injection.type_ref) {
            return true;
        }
        if let Some(cached) = self.instantiation_cache.get(&key) {
            return cached.is_some();
        }
        self.open.iter().rev().any(|&open_id| {
            let binding = &self.bindings[open_id.0 as usize];
            binding.matches_tag(&injection.tag)
                && binding.contracts.iter().any(|contract| {
                    let mut subst = Substitution::new();
                    unify::unify(contract, &injection.type_ref, &mut subst)
                })
        })
    }

    /// Every (tag, binding) pair whose contract matches the element type of
    /// a collection construct, deduplicated by tag with last-wins, ordered
    /// by tag for determinism. Zero matches is a legal empty collection.
    pub fn element_bindings(&self, element: &TypeRef) -> Vec<(Option<Tag>, BindingId)> {
        let mut winners: BTreeMap<Option<Tag>, BindingId> = BTreeMap::new();
        for binding in &self.bindings {
            if !binding.contracts.iter().any(|c| c == element) {
                continue;
            }
            if binding.tags.is_empty() {
                winners.insert(None, binding.id);
            } else {
                for tag in &binding.tags {
                    if *tag != Tag::Any {
                        winners.insert(Some(tag.clone()), binding.id);
                    }
                }
            }
        }
        winners.into_iter().collect()
    }

    fn instantiate(&mut self, source: BindingId, subst: &Substitution) -> BindingId {
        let src = self.bindings[source.0 as usize].clone();
        let payload = match &src.payload {
            Payload::Implementation { type_ref } => Payload::Implementation {
                type_ref: unify::substitute(type_ref, subst),
            },
            Payload::Factory(model) => {
                let fragments = model
                    .fragments
                    .iter()
                    .map(|fragment| match fragment {
                        FactoryFragment::Inject { injection, var_hint } => {
                            FactoryFragment::Inject {
                                injection: unify::substitute_injection(injection, subst),
                                var_hint: var_hint.clone(),
                            }
                        }
                        other => other.clone(),
                    })
                    .collect();
                Payload::Factory(FactoryModel { fragments })
            }
            Payload::Construct(kind) => Payload::Construct(substitute_construct(kind, subst)),
        };
        let def = BindingDef {
            contracts: src.contracts.iter().map(|c| unify::substitute(c, subst)).collect(),
            tags: src.tags.clone(),
            lifetime: src.lifetime,
            payload,
            location: src.location.clone(),
        };
        self.register(def)
    }
}

fn substitute_construct(kind: &ConstructKind, subst: &Substitution) -> ConstructKind {
    match kind {
        ConstructKind::Array(e) => ConstructKind::Array(unify::substitute(e, subst)),
        ConstructKind::Span(e) => ConstructKind::Span(unify::substitute(e, subst)),
        ConstructKind::Enumerable(e) => ConstructKind::Enumerable(unify::substitute(e, subst)),
        ConstructKind::AsyncEnumerable(e) => {
            ConstructKind::AsyncEnumerable(unify::substitute(e, subst))
        }
        ConstructKind::Tuple(items) => {
            ConstructKind::Tuple(items.iter().map(|i| unify::substitute(i, subst)).collect())
        }
        ConstructKind::Func { params, ret } => ConstructKind::Func {
            params: params.iter().map(|p| unify::substitute(p, subst)).collect(),
            ret: unify::substitute(ret, subst),
        },
        ConstructKind::OnCannotResolve(injection) => {
            ConstructKind::OnCannotResolve(unify::substitute_injection(injection, subst))
        }
        ConstructKind::Accumulator(e) => ConstructKind::Accumulator(unify::substitute(e, subst)),
        ConstructKind::Override(injection) => {
            ConstructKind::Override(unify::substitute_injection(injection, subst))
        }
        ConstructKind::Composition => ConstructKind::Composition,
        ConstructKind::ExplicitDefault(lit) => ConstructKind::ExplicitDefault(lit.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(n: &str) -> TypeRef {
        TypeRef::named(n)
    }

    #[test]
    fn exact_beats_any_tag() {
        let mut registry = BindingRegistry::new();
        registry.register(
            BindingDef::implementation(named("ILogger"), named("CatchAll"), Lifetime::Transient)
                .with_tag(Tag::Any),
        );
        registry.register(
            BindingDef::implementation(named("ILogger"), named("Audit"), Lifetime::Transient)
                .with_tag(Tag::str("audit")),
        );

        let audit = registry
            .resolve(&Injection::tagged(named("ILogger"), Tag::str("audit")))
            .unwrap();
        assert_eq!(registry.get(audit).produced_type(), Some(&named("Audit")));

        let other = registry
            .resolve(&Injection::tagged(named("ILogger"), Tag::str("other")))
            .unwrap();
        assert_eq!(registry.get(other).produced_type(), Some(&named("CatchAll")));
    }

    #[test]
    fn open_generic_is_instantiated_and_cached() {
        let mut registry = BindingRegistry::new();
        registry.register(BindingDef::implementation(
            TypeRef::generic("IRepo", vec![TypeRef::Marker(0)]),
            TypeRef::generic("Repo", vec![TypeRef::Marker(0)]),
            Lifetime::Singleton,
        ));

        let request = Injection::of(TypeRef::generic("IRepo", vec![named("User")]));
        let first = registry.resolve(&request).unwrap();
        let second = registry.resolve(&request).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            registry.get(first).produced_type(),
            Some(&TypeRef::generic("Repo", vec![named("User")])),
        );
    }

    #[test]
    fn untagged_binding_ignores_tagged_injection() {
        let mut registry = BindingRegistry::new();
        registry.register(BindingDef::implementation(
            named("ILogger"),
            named("Logger"),
            Lifetime::Transient,
        ));
        assert!(registry
            .resolve(&Injection::tagged(named("ILogger"), Tag::Int(1)))
            .is_none());
    }

    #[test]
    fn element_bindings_dedupe_by_tag_last_wins() {
        let mut registry = BindingRegistry::new();
        registry.register(BindingDef::implementation(
            named("IHandler"),
            named("First"),
            Lifetime::Transient,
        ));
        registry.register(
            BindingDef::implementation(named("IHandler"), named("Tagged"), Lifetime::Transient)
                .with_tag(Tag::Int(1)),
        );
        registry.register(BindingDef::implementation(
            named("IHandler"),
            named("Second"),
            Lifetime::Transient,
        ));

        let elements = registry.element_bindings(&named("IHandler"));
        assert_eq!(elements.len(), 2);
        // Untagged winner is the later registration
        assert_eq!(elements[0].0, None);
        assert_eq!(registry.get(elements[0].1).produced_type(), Some(&named("Second")));
        assert_eq!(elements[1].0, Some(Tag::Int(1)));
    }

    #[test]
    fn contract_less_binding_has_no_produced_type() {
        let model = FactoryModel {
            fragments: vec![FactoryFragment::Return("new Service()".into())],
        };
        let mut def =
            BindingDef::new(named("IService"), Lifetime::Transient, Payload::Factory(model));
        def.contracts.clear();

        let mut registry = BindingRegistry::new();
        let id = registry.register(def);
        assert_eq!(registry.get(id).produced_type(), None);
    }

    #[test]
    fn multi_contract_binding_reachable_via_either_key() {
        let mut registry = BindingRegistry::new();
        registry.register(
            BindingDef::implementation(named("IService"), named("Service"), Lifetime::Singleton)
                .with_contract(named("Service")),
        );
        let via_interface = registry.resolve(&Injection::of(named("IService"))).unwrap();
        let via_concrete = registry.resolve(&Injection::of(named("Service"))).unwrap();
        assert_eq!(via_interface, via_concrete);
    }
}
