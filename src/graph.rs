//! Per-root dependency graph building.
//!
//! Starting from a root injection, the builder recursively resolves every
//! constructor parameter, injectable member, and factory marker to a binding,
//! producing one node per resolved binding instance and directed edges from
//! dependents to dependencies. Lazy boundaries (delegates, enumerables) are
//! recorded as construct nodes whose dependencies expand in a deferred scope
//! rather than inline; cycles are legal only when such a boundary intervenes.
//!
//! The walk is guarded by a hard depth and node budget so a pathological
//! setup fails fast instead of hanging the build.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::bindings::{BindingId, BindingRegistry, ConstructKind, FactoryFragment, FactoryModel, Payload};
use crate::diagnostics::{ChainLink, Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{DiError, DiResult};
use crate::lifetime::Lifetime;
use crate::meta::{ArgDef, CtorMeta, Hints, MemberMeta, RootDef, TypeRegistry};
use crate::selector;
use crate::types::{Injection, Literal, Tag, TypeRef};

/// Maximum expansion path depth per root.
pub const MAX_DEPTH: usize = 1024;
/// Maximum node count per root.
pub const MAX_NODES: usize = 10_000;

/// Identity of a node within one root's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Index into the graph's node vector.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where an argument-backed node gets its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgScope {
    /// Class-level composition argument, backed by a field
    Class,
    /// Root-method argument
    Root,
    /// Delegate parameter inside a deferred block
    Block,
}

/// Resolved payload of a node, with metadata already instantiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePayload {
    /// Constructor injection with the chosen constructor and the selected
    /// injectable members, in injection order
    Implementation {
        /// The chosen constructor (markers substituted)
        ctor: CtorMeta,
        /// Selected members, initializer members first is NOT implied;
        /// order follows the selector
        members: Vec<MemberMeta>,
    },
    /// User factory body
    Factory(FactoryModel),
    /// Built-in construct
    Construct(ConstructKind),
    /// Externally-supplied value (class arg, root arg, delegate parameter)
    Arg {
        /// Argument name as declared
        name: Arc<str>,
        /// Which scope supplies the value
        scope: ArgScope,
    },
}

/// One resolved binding instance in the context of a root expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    /// Node identity within this graph
    pub id: NodeId,
    /// The binding that produced this node; `None` for synthetic constructs
    pub binding: Option<BindingId>,
    /// Actual lifetime driving variable planning
    pub lifetime: Lifetime,
    /// The concrete type this node produces
    pub type_ref: TypeRef,
    /// Tag of the injection that created the node
    pub tag: Option<Tag>,
    /// Resolved payload
    pub payload: NodePayload,
    /// Disposal registration is emitted for disposable nodes
    pub is_disposable: bool,
    /// Asynchronously disposable
    pub is_async_disposable: bool,
    /// Value types need companion created-flags in guards
    pub is_value_type: bool,
}

impl DependencyNode {
    /// Whether this node opens a deferred expansion scope.
    pub fn is_lazy_boundary(&self) -> bool {
        matches!(
            self.payload,
            NodePayload::Construct(ConstructKind::Func { .. })
                | NodePayload::Construct(ConstructKind::Enumerable(_))
                | NodePayload::Construct(ConstructKind::AsyncEnumerable(_))
        )
    }
}

/// The consumption site that created an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionSite {
    /// Constructor parameter
    CtorParam {
        /// Owning type
        owner: TypeRef,
        /// Parameter name
        param: Arc<str>,
    },
    /// Field or property
    Member {
        /// Owning type
        owner: TypeRef,
        /// Member name
        member: Arc<str>,
    },
    /// Injection-method parameter
    MethodParam {
        /// Owning type
        owner: TypeRef,
        /// Method name
        member: Arc<str>,
        /// Parameter name
        param: Arc<str>,
    },
    /// Factory injection marker
    FactoryMarker {
        /// The local name the factory body refers to
        hint: Arc<str>,
    },
    /// Collection element position
    Element {
        /// Element index in tag order
        index: usize,
    },
    /// The produced value of a delegate
    LazyValue,
    /// A composition root request
    Root {
        /// Root name
        name: Arc<str>,
    },
}

impl fmt::Display for InjectionSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionSite::CtorParam { owner, param } => {
                write!(f, "constructor {}({})", owner.short_name(), param)
            }
            InjectionSite::Member { member, .. } => write!(f, "member {}", member),
            InjectionSite::MethodParam { member, param, .. } => {
                write!(f, "method {} parameter {}", member, param)
            }
            InjectionSite::FactoryMarker { hint } => write!(f, "factory injection '{}'", hint),
            InjectionSite::Element { index } => write!(f, "element {}", index),
            InjectionSite::LazyValue => write!(f, "lazy value"),
            InjectionSite::Root { name } => write!(f, "root '{}'", name),
        }
    }
}

/// A directed dependency from a dependent node to its dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    /// The dependent
    pub source: NodeId,
    /// The dependency
    pub target: NodeId,
    /// The injection that created the edge
    pub injection: Injection,
    /// The consumption site
    pub site: InjectionSite,
    /// The target expands inside the source's deferred block
    pub lazy: bool,
    /// The target was already being expanded on the current path (legal
    /// only across a lazy boundary); the synthesizer resolves it against a
    /// forward-declared variable
    pub cycle_back: bool,
}

/// The per-root dependency graph.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// The root node
    pub root: NodeId,
    /// Name of the composition root this graph was built for
    pub root_name: Arc<str>,
    /// Nodes in creation order
    pub nodes: Vec<DependencyNode>,
    /// Edges in creation order
    pub edges: Vec<DependencyEdge>,
    /// Outgoing edge indexes per node, in injection order
    pub outgoing: Vec<SmallVec<[u32; 4]>>,
    /// (accumulator owner, disposable node) pairs; `None` owner means the
    /// root block itself
    pub accumulators: Vec<(Option<NodeId>, NodeId)>,
}

impl DependencyGraph {
    /// Node by id.
    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.index()]
    }

    /// Dependencies of a node, in injection order.
    pub fn dependencies(&self, id: NodeId) -> impl Iterator<Item = &DependencyEdge> {
        self.outgoing[id.index()].iter().map(move |&e| &self.edges[e as usize])
    }

    /// Number of consumers per node across the whole graph.
    pub fn reference_counts(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.nodes.len()];
        for edge in &self.edges {
            counts[edge.target.index()] += 1;
        }
        counts
    }
}

struct PathFrame {
    binding: Option<BindingId>,
    node: NodeId,
    lazy_entry: bool,
    /// Chain length when the frame was pushed; the link at `chain_depth - 1`
    /// is the injection that requested this frame's binding.
    chain_depth: usize,
}

struct OverrideEntry {
    injection: Injection,
    name: Arc<str>,
    scope: ArgScope,
    node: Option<NodeId>,
}

/// Builds one root's dependency graph.
pub struct GraphBuilder<'a> {
    registry: &'a mut BindingRegistry,
    types: &'a TypeRegistry,
    hints: &'a Hints,
    composition: TypeRef,
    diags: &'a mut Diagnostics,
    nodes: Vec<DependencyNode>,
    edges: Vec<DependencyEdge>,
    outgoing: Vec<SmallVec<[u32; 4]>>,
    accumulators: Vec<(Option<NodeId>, NodeId)>,
    shared: AHashMap<BindingId, NodeId>,
    per_block: Vec<AHashMap<BindingId, NodeId>>,
    overrides: Vec<Vec<OverrideEntry>>,
    path: Vec<PathFrame>,
    boundary: Vec<Option<NodeId>>,
    chain: Vec<ChainLink>,
}

impl<'a> GraphBuilder<'a> {
    /// Creates a builder over shared pipeline state.
    pub fn new(
        registry: &'a mut BindingRegistry,
        types: &'a TypeRegistry,
        hints: &'a Hints,
        composition: TypeRef,
        diags: &'a mut Diagnostics,
    ) -> Self {
        GraphBuilder {
            registry,
            types,
            hints,
            composition,
            diags,
            nodes: Vec::new(),
            edges: Vec::new(),
            outgoing: Vec::new(),
            accumulators: Vec::new(),
            shared: AHashMap::new(),
            per_block: Vec::new(),
            overrides: Vec::new(),
            path: Vec::new(),
            boundary: Vec::new(),
            chain: Vec::new(),
        }
    }

    /// Walks from the root injection, producing the graph.
    ///
    /// Returns `Ok(None)` when the root injection itself could not be
    /// resolved (a `CannotResolve` diagnostic has been collected). Budget
    /// violations surface as hard errors.
    pub fn build(mut self, root: &RootDef, class_args: &[ArgDef]) -> DiResult<Option<DependencyGraph>> {
        self.per_block.push(AHashMap::new());
        self.boundary.push(None);
        self.push_override_scope(class_args, ArgScope::Class);
        self.push_override_scope(&root.args, ArgScope::Root);

        let site = InjectionSite::Root { name: root.name.clone() };
        let composition = self.composition.clone();
        let resolved = self.resolve_injection(&root.injection, site, &composition)?;

        let Some(root_node) = resolved else {
            return Ok(None);
        };
        Ok(Some(DependencyGraph {
            root: root_node,
            root_name: root.name.clone(),
            nodes: self.nodes,
            edges: self.edges,
            outgoing: self.outgoing,
            accumulators: self.accumulators,
        }))
    }

    fn push_override_scope(&mut self, args: &[ArgDef], scope: ArgScope) {
        let entries = args
            .iter()
            .map(|arg| OverrideEntry {
                injection: arg.injection.clone(),
                name: arg.name.clone(),
                scope,
                node: None,
            })
            .collect();
        self.overrides.push(entries);
    }

    /// Resolvability probe used by the constructor selector. Mirrors the
    /// resolution tiers except the fallback factory, so that parameters with
    /// declared defaults prefer the default over the fallback.
    fn probe(&self, injection: &Injection) -> bool {
        if self.find_override(injection).is_some() {
            return true;
        }
        if self.registry.can_resolve(injection) {
            return true;
        }
        match &injection.type_ref {
            TypeRef::Func { .. }
            | TypeRef::Enumerable(_)
            | TypeRef::AsyncEnumerable(_)
            | TypeRef::Array(_)
            | TypeRef::Span(_)
            | TypeRef::Tuple(_) => return true,
            t if *t == self.composition => return true,
            _ => {}
        }
        if injection.tag.is_none() {
            if let Some(meta) = self.types.meta_for(&injection.type_ref) {
                if selector::select_constructor(&meta, self.hints.internals_visible, &mut |_| true)
                    .is_some()
                {
                    return true;
                }
            }
        }
        false
    }

    fn find_override(&self, injection: &Injection) -> Option<(usize, usize)> {
        for (si, scope) in self.overrides.iter().enumerate().rev() {
            for (ei, entry) in scope.iter().enumerate() {
                if entry.injection == *injection {
                    return Some((si, ei));
                }
            }
        }
        None
    }

    fn resolve_injection(
        &mut self,
        injection: &Injection,
        site: InjectionSite,
        owner: &TypeRef,
    ) -> DiResult<Option<NodeId>> {
        self.chain.push(ChainLink {
            owner: owner.clone(),
            site: site.to_string(),
            injection: injection.clone(),
        });
        let result = self.resolve_injection_inner(injection);
        self.chain.pop();
        result
    }

    fn resolve_injection_inner(&mut self, injection: &Injection) -> DiResult<Option<NodeId>> {
        // Tier 1: override scopes, innermost first.
        if let Some((si, ei)) = self.find_override(injection) {
            let entry = &self.overrides[si][ei];
            if let Some(node) = entry.node {
                return Ok(Some(node));
            }
            let name = entry.name.clone();
            let scope = entry.scope;
            let node = self.new_node(
                None,
                Lifetime::Binding,
                injection.type_ref.clone(),
                injection.tag.clone(),
                NodePayload::Arg { name, scope },
            )?;
            self.overrides[si][ei].node = Some(node);
            return Ok(Some(node));
        }

        // Tier 2: the binding table (exact, any-tag, open generic).
        if let Some(binding) = self.registry.resolve(injection) {
            return self.expand_binding(binding, injection);
        }

        // Tier 3: built-in construct shapes.
        if let Some(node) = self.try_construct(injection)? {
            return Ok(Some(node));
        }

        // Tier 4: concrete, constructible types resolve without a binding.
        if injection.tag.is_none() {
            if let Some(meta) = self.types.meta_for(&injection.type_ref) {
                let accessible = meta
                    .constructors
                    .iter()
                    .any(|c| c.accessibility.is_accessible(self.hints.internals_visible));
                if accessible {
                    let binding = self.registry.register_implicit(&injection.type_ref);
                    return self.expand_binding(binding, injection);
                }
            }
        }

        // Tier 5: user fallback factory, converting the error to a warning.
        if self.hints.on_cannot_resolve {
            let node = self.new_node(
                None,
                Lifetime::Transient,
                injection.type_ref.clone(),
                injection.tag.clone(),
                NodePayload::Construct(ConstructKind::OnCannotResolve(injection.clone())),
            )?;
            self.diags.push(
                Diagnostic::new(
                    DiagnosticKind::CannotResolveFallback,
                    format!("Cannot resolve {}, falling back to OnCannotResolve", injection),
                )
                .with_chain(self.current_chain()),
            );
            return Ok(Some(node));
        }

        self.diags.push(
            Diagnostic::new(
                DiagnosticKind::CannotResolve,
                format!("Cannot resolve {}", injection),
            )
            .with_chain(self.current_chain()),
        );
        Ok(None)
    }

    fn current_chain(&self) -> Vec<ChainLink> {
        self.chain.iter().rev().cloned().collect()
    }

    fn expand_binding(
        &mut self,
        binding: BindingId,
        injection: &Injection,
    ) -> DiResult<Option<NodeId>> {
        // Path-relative reuse: a binding already being expanded is a cycle.
        // Legal only when a lazy boundary sits between its frame and here;
        // the deferred thunk then resolves the forward reference.
        if let Some(pos) = self.path.iter().position(|f| f.binding == Some(binding)) {
            if self.path[pos..].iter().any(|f| f.lazy_entry) {
                return Ok(Some(self.path[pos].node));
            }
            // Every link from the request that opened the repeated binding
            // up to the closing request, innermost first.
            let start = self.path[pos].chain_depth.saturating_sub(1);
            let chain: Vec<ChainLink> = self.chain[start..].iter().rev().cloned().collect();
            self.diags.push(
                Diagnostic::new(
                    DiagnosticKind::CircularDependency,
                    format!("Circular dependency detected while resolving {}", injection),
                )
                .with_chain(chain),
            );
            return Ok(None);
        }

        let lifetime = self.registry.get(binding).lifetime;
        if lifetime.is_shared() {
            if let Some(&node) = self.shared.get(&binding) {
                return Ok(Some(node));
            }
        }
        if lifetime == Lifetime::PerBlock {
            if let Some(&node) = self.per_block.last().and_then(|m| m.get(&binding)) {
                return Ok(Some(node));
            }
        }

        let b = self.registry.get(binding).clone();
        match &b.payload {
            Payload::Implementation { type_ref } => {
                self.expand_implementation(binding, lifetime, type_ref.clone(), injection)
            }
            Payload::Factory(model) => {
                self.expand_factory(binding, lifetime, model.clone(), injection)
            }
            Payload::Construct(kind) => {
                self.expand_construct_binding(binding, lifetime, kind.clone(), injection)
            }
        }
    }

    fn register_node_scope(&mut self, binding: BindingId, lifetime: Lifetime, node: NodeId) {
        if lifetime.is_shared() {
            self.shared.insert(binding, node);
        } else if lifetime == Lifetime::PerBlock {
            if let Some(map) = self.per_block.last_mut() {
                map.insert(binding, node);
            }
        }
    }

    fn expand_implementation(
        &mut self,
        binding: BindingId,
        lifetime: Lifetime,
        type_ref: TypeRef,
        injection: &Injection,
    ) -> DiResult<Option<NodeId>> {
        let Some(meta) = self.types.meta_for(&type_ref) else {
            self.diags.push(
                Diagnostic::new(
                    DiagnosticKind::CannotResolve,
                    format!("No metadata for implementation type {}", type_ref),
                )
                .with_chain(self.current_chain()),
            );
            return Ok(None);
        };

        let internals_visible = self.hints.internals_visible;
        let choice = {
            let probe_self: &GraphBuilder<'_> = &*self;
            let mut probe = |inj: &Injection| probe_self.probe(inj);
            selector::select_constructor(&meta, internals_visible, &mut probe)
        };
        let Some(choice) = choice else {
            self.diags.push(
                Diagnostic::new(
                    DiagnosticKind::CannotResolve,
                    format!("No accessible constructor for {}", type_ref),
                )
                .with_chain(self.current_chain()),
            );
            return Ok(None);
        };
        if choice.obsolete {
            self.diags.push(
                Diagnostic::new(
                    DiagnosticKind::CtorObsoleted,
                    format!("An obsolete constructor of {} was selected", type_ref),
                )
                .with_chain(self.current_chain()),
            );
        }

        let selection = selector::select_members(&meta, internals_visible);
        for &index in &selection.inaccessible {
            self.diags.push(
                Diagnostic::new(
                    DiagnosticKind::MemberInaccessible,
                    format!(
                        "Member {} of {} is not accessible from generated code",
                        meta.members[index].name, type_ref
                    ),
                )
                .with_chain(self.current_chain()),
            );
        }

        let ctor = meta.constructors[choice.index].clone();
        let members: Vec<MemberMeta> =
            selection.selected.iter().map(|&i| meta.members[i].clone()).collect();

        let node = self.new_node(
            Some(binding),
            lifetime,
            type_ref.clone(),
            injection.tag.clone(),
            NodePayload::Implementation { ctor: ctor.clone(), members: members.clone() },
        )?;
        self.register_node_scope(binding, lifetime, node);
        self.record_disposable(node);
        self.path.push(PathFrame {
            binding: Some(binding),
            node,
            lazy_entry: false,
            chain_depth: self.chain.len(),
        });

        // Constructor parameters, in declared order. Every unresolved
        // parameter is reported separately, never short-circuited.
        for (pi, param) in ctor.params.iter().enumerate() {
            let site = InjectionSite::CtorParam { owner: type_ref.clone(), param: param.name.clone() };
            if choice.default_fallbacks.contains(&pi) {
                let default = param.default.clone().unwrap_or(Literal::Default);
                let target = self.new_node(
                    None,
                    Lifetime::Transient,
                    param.injection.type_ref.clone(),
                    param.injection.tag.clone(),
                    NodePayload::Construct(ConstructKind::ExplicitDefault(default)),
                )?;
                self.add_edge(node, target, param.injection.clone(), site, false);
                continue;
            }
            if let Some(target) = self.resolve_injection(&param.injection, site.clone(), &type_ref)? {
                self.add_edge(node, target, param.injection.clone(), site, false);
            }
        }

        // Injectable members, in selector order.
        for member in &members {
            for param in &member.params {
                let site = match member.kind {
                    crate::meta::MemberKind::Method => InjectionSite::MethodParam {
                        owner: type_ref.clone(),
                        member: member.name.clone(),
                        param: param.name.clone(),
                    },
                    _ => InjectionSite::Member {
                        owner: type_ref.clone(),
                        member: member.name.clone(),
                    },
                };
                if let Some(target) =
                    self.resolve_injection(&param.injection, site.clone(), &type_ref)?
                {
                    self.add_edge(node, target, param.injection.clone(), site, false);
                }
            }
        }

        self.path.pop();
        Ok(Some(node))
    }

    fn expand_factory(
        &mut self,
        binding: BindingId,
        lifetime: Lifetime,
        model: FactoryModel,
        injection: &Injection,
    ) -> DiResult<Option<NodeId>> {
        let type_ref = injection.type_ref.clone();
        let node = self.new_node(
            Some(binding),
            lifetime,
            type_ref.clone(),
            injection.tag.clone(),
            NodePayload::Factory(model.clone()),
        )?;
        self.register_node_scope(binding, lifetime, node);
        self.record_disposable(node);
        self.path.push(PathFrame {
            binding: Some(binding),
            node,
            lazy_entry: false,
            chain_depth: self.chain.len(),
        });

        for fragment in &model.fragments {
            if let FactoryFragment::Inject { injection: inj, var_hint } = fragment {
                let site = InjectionSite::FactoryMarker { hint: var_hint.clone() };
                if let Some(target) = self.resolve_injection(inj, site.clone(), &type_ref)? {
                    self.add_edge(node, target, inj.clone(), site, false);
                }
            }
        }

        self.path.pop();
        Ok(Some(node))
    }

    /// Expands a user binding whose payload is a built-in construct.
    fn expand_construct_binding(
        &mut self,
        binding: BindingId,
        lifetime: Lifetime,
        kind: ConstructKind,
        injection: &Injection,
    ) -> DiResult<Option<NodeId>> {
        let node = self.new_node(
            Some(binding),
            lifetime,
            injection.type_ref.clone(),
            injection.tag.clone(),
            NodePayload::Construct(kind.clone()),
        )?;
        self.register_node_scope(binding, lifetime, node);
        self.expand_construct_deps(node, Some(binding), &kind)?;
        Ok(Some(node))
    }

    /// Synthesizes a construct node from the injection shape alone.
    fn try_construct(&mut self, injection: &Injection) -> DiResult<Option<NodeId>> {
        let kind = match &injection.type_ref {
            TypeRef::Array(e) => ConstructKind::Array((**e).clone()),
            TypeRef::Span(e) => ConstructKind::Span((**e).clone()),
            TypeRef::Enumerable(e) => ConstructKind::Enumerable((**e).clone()),
            TypeRef::AsyncEnumerable(e) => ConstructKind::AsyncEnumerable((**e).clone()),
            TypeRef::Tuple(items) => ConstructKind::Tuple(items.clone()),
            TypeRef::Func { params, ret } => {
                ConstructKind::Func { params: params.clone(), ret: (**ret).clone() }
            }
            t if *t == self.composition => ConstructKind::Composition,
            _ => return Ok(None),
        };
        let node = self.new_node(
            None,
            Lifetime::Transient,
            injection.type_ref.clone(),
            injection.tag.clone(),
            NodePayload::Construct(kind.clone()),
        )?;
        self.expand_construct_deps(node, None, &kind)?;
        Ok(Some(node))
    }

    fn expand_construct_deps(
        &mut self,
        node: NodeId,
        binding: Option<BindingId>,
        kind: &ConstructKind,
    ) -> DiResult<()> {
        match kind {
            ConstructKind::Array(element) | ConstructKind::Span(element) => {
                self.expand_elements(node, binding, element, false)?;
            }
            ConstructKind::Enumerable(element) | ConstructKind::AsyncEnumerable(element) => {
                self.enter_lazy(node, binding);
                self.expand_elements(node, binding, element, true)?;
                self.exit_lazy();
            }
            ConstructKind::Tuple(items) => {
                self.path.push(PathFrame {
                    binding,
                    node,
                    lazy_entry: false,
                    chain_depth: self.chain.len(),
                });
                for (index, item) in items.iter().enumerate() {
                    let inj = Injection::of(item.clone());
                    let site = InjectionSite::Element { index };
                    let owner = self.nodes[node.index()].type_ref.clone();
                    if let Some(target) = self.resolve_injection(&inj, site.clone(), &owner)? {
                        self.add_edge(node, target, inj, site, false);
                    }
                }
                self.path.pop();
            }
            ConstructKind::Func { params, ret } => {
                self.enter_lazy(node, binding);
                let args: Vec<ArgDef> = params
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        ArgDef::new(format!("arg{}", i), Injection::of(p.clone()))
                    })
                    .collect();
                self.push_override_scope(&args, ArgScope::Block);

                let tag = self.nodes[node.index()].tag.clone();
                let inj = Injection { type_ref: ret.clone(), tag };
                let owner = self.nodes[node.index()].type_ref.clone();
                if let Some(target) =
                    self.resolve_injection(&inj, InjectionSite::LazyValue, &owner)?
                {
                    self.add_edge(node, target, inj, InjectionSite::LazyValue, true);
                }

                self.overrides.pop();
                self.exit_lazy();
            }
            ConstructKind::Composition
            | ConstructKind::OnCannotResolve(_)
            | ConstructKind::ExplicitDefault(_)
            | ConstructKind::Accumulator(_)
            | ConstructKind::Override(_) => {}
        }
        Ok(())
    }

    fn expand_elements(
        &mut self,
        node: NodeId,
        binding: Option<BindingId>,
        element: &TypeRef,
        lazy: bool,
    ) -> DiResult<()> {
        self.path.push(PathFrame {
            binding,
            node,
            lazy_entry: lazy,
            chain_depth: self.chain.len(),
        });
        let matches = self.registry.element_bindings(element);
        let owner = self.nodes[node.index()].type_ref.clone();
        for (index, (tag, element_binding)) in matches.into_iter().enumerate() {
            let inj = Injection { type_ref: element.clone(), tag };
            let site = InjectionSite::Element { index };
            self.chain.push(ChainLink {
                owner: owner.clone(),
                site: site.to_string(),
                injection: inj.clone(),
            });
            let target = self.expand_binding(element_binding, &inj)?;
            self.chain.pop();
            if let Some(target) = target {
                self.add_edge(node, target, inj, site, lazy);
            }
        }
        self.path.pop();
        Ok(())
    }

    fn enter_lazy(&mut self, node: NodeId, binding: Option<BindingId>) {
        self.path.push(PathFrame {
            binding,
            node,
            lazy_entry: true,
            chain_depth: self.chain.len(),
        });
        self.per_block.push(AHashMap::new());
        self.boundary.push(Some(node));
    }

    fn exit_lazy(&mut self) {
        self.boundary.pop();
        self.per_block.pop();
        self.path.pop();
    }

    fn record_disposable(&mut self, node: NodeId) {
        let n = &self.nodes[node.index()];
        if (n.is_disposable || n.is_async_disposable) && !n.lifetime.needs_field() {
            let owner = self.boundary.last().copied().flatten();
            let pair = (owner, node);
            if !self.accumulators.contains(&pair) {
                self.accumulators.push(pair);
            }
        }
    }

    fn new_node(
        &mut self,
        binding: Option<BindingId>,
        lifetime: Lifetime,
        type_ref: TypeRef,
        tag: Option<Tag>,
        payload: NodePayload,
    ) -> DiResult<NodeId> {
        if self.nodes.len() >= MAX_NODES {
            return Err(DiError::NodeBudgetExceeded(MAX_NODES));
        }
        if self.path.len() >= MAX_DEPTH {
            return Err(DiError::DepthExceeded(MAX_DEPTH));
        }
        let (is_disposable, is_async_disposable, is_value_type) =
            match self.types.meta_for(&type_ref) {
                Some(meta) => (meta.is_disposable, meta.is_async_disposable, meta.is_value_type),
                None => (false, false, false),
            };
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(DependencyNode {
            id,
            binding,
            lifetime,
            type_ref,
            tag,
            payload,
            is_disposable,
            is_async_disposable,
            is_value_type,
        });
        self.outgoing.push(SmallVec::new());
        Ok(id)
    }

    fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        injection: Injection,
        site: InjectionSite,
        lazy: bool,
    ) {
        let cycle_back = self.path.iter().any(|f| f.node == target);
        let index = self.edges.len() as u32;
        self.edges.push(DependencyEdge { source, target, injection, site, lazy, cycle_back });
        self.outgoing[source.index()].push(index);
    }
}
