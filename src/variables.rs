//! Variable planning: maps graph nodes to named storage.
//!
//! Every node becomes either a composition field (shared lifetimes), a local
//! in the root method, or an inlined expression. Names are derived
//! deterministically from the type's short name plus a counter, so repeated
//! runs over the same setup produce byte-identical output.

use crate::bindings::ConstructKind;
use crate::graph::{ArgScope, DependencyGraph, NodeId, NodePayload};
use crate::lifetime::Lifetime;
use crate::meta::Hints;
use crate::statements::capitalize;

/// Storage class of a planned variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// Composition field, created once per composition
    SingletonField,
    /// Composition field, created once per scope instance
    ScopedField,
    /// Thread-local composition field
    PerThreadField,
    /// Root-method local, created once per resolution and null-guarded
    PerResolveLocal,
    /// Plain root-method local
    Local,
    /// No variable; the expression is substituted at its single use site
    Inline,
}

impl VarKind {
    /// Whether this kind is backed by a composition field.
    pub fn is_field(self) -> bool {
        matches!(
            self,
            VarKind::SingletonField | VarKind::ScopedField | VarKind::PerThreadField
        )
    }
}

/// A planned variable for one graph node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// The node this variable holds
    pub node: NodeId,
    /// Storage class
    pub kind: VarKind,
    /// Generated identifier, or the substituted expression source for
    /// argument-backed nodes
    pub name: String,
    /// Number of consumers, counting the root return
    pub refs: u32,
}

/// Monotonic id source for local names, shared across every root of one
/// composition so no two locals in the class collide.
#[derive(Debug, Default)]
pub struct IdContext {
    next: u32,
}

impl IdContext {
    /// Starts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// The variable plan for one root, indexed by node id.
#[derive(Debug, Clone)]
pub struct VariablePlan {
    vars: Vec<Variable>,
}

impl VariablePlan {
    /// The variable planned for a node.
    pub fn var(&self, node: NodeId) -> &Variable {
        &self.vars[node.index()]
    }

    /// All variables in node order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }
}

/// Plans variables for every node of a root graph.
///
/// Shared lifetimes get fields named after the binding id so the same
/// binding maps to the same field in every root. Locals take their number
/// from `ids`, which the composer threads through all roots in declaration
/// order.
pub fn plan_variables(graph: &DependencyGraph, hints: &Hints, ids: &mut IdContext) -> VariablePlan {
    let mut refs = graph.reference_counts();
    refs[graph.root.index()] += 1;

    let mut vars = Vec::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        let short = node.type_ref.short_name();
        let refs = refs[node.id.index()];
        let (kind, name) = match &node.payload {
            NodePayload::Arg { name, scope } => {
                let rendered = match scope {
                    ArgScope::Class => format!("_arg{}", capitalize(name)),
                    ArgScope::Root | ArgScope::Block => name.to_string(),
                };
                (VarKind::Inline, rendered)
            }
            NodePayload::Construct(ConstructKind::ExplicitDefault(literal)) => {
                (VarKind::Inline, literal.to_string())
            }
            NodePayload::Construct(ConstructKind::Composition) => {
                (VarKind::Inline, "this".to_string())
            }
            _ => plan_storage(node, refs, hints, &short, ids),
        };
        vars.push(Variable { node: node.id, kind, name, refs });
    }
    VariablePlan { vars }
}

fn plan_storage(
    node: &crate::graph::DependencyNode,
    refs: u32,
    hints: &Hints,
    short: &str,
    ids: &mut IdContext,
) -> (VarKind, String) {
    match node.lifetime {
        Lifetime::Singleton => {
            let id = node.binding.map(|b| b.0).unwrap_or(node.id.0);
            (VarKind::SingletonField, format!("_singleton{}{}", short, id))
        }
        Lifetime::Scoped => {
            let id = node.binding.map(|b| b.0).unwrap_or(node.id.0);
            (VarKind::ScopedField, format!("_scoped{}{}", short, id))
        }
        Lifetime::PerThread => {
            let id = node.binding.map(|b| b.0).unwrap_or(node.id.0);
            (VarKind::PerThreadField, format!("_perThread{}{}", short, id))
        }
        Lifetime::PerResolve => (
            VarKind::PerResolveLocal,
            format!("perResolve{}{}", short, ids.next_id()),
        ),
        lifetime => {
            if can_inline(node, refs, hints) {
                // The synthesizer substitutes the construction expression
                // directly; no declaration is emitted.
                (VarKind::Inline, String::new())
            } else {
                (VarKind::Local, format!("{}{}{}", lifetime.name_prefix(), short, ids.next_id()))
            }
        }
    }
}

/// A transient is inlined at its single use site when nothing observable
/// depends on it having a name: no second consumer, no disposal
/// registration, no interception hook, no member injections.
fn can_inline(node: &crate::graph::DependencyNode, refs: u32, hints: &Hints) -> bool {
    if refs > 1 || node.is_disposable || node.is_async_disposable || hints.on_new_instance {
        return false;
    }
    match &node.payload {
        NodePayload::Implementation { members, .. } => {
            members.iter().all(|m| m.required)
        }
        NodePayload::Construct(ConstructKind::Array(_))
        | NodePayload::Construct(ConstructKind::Span(_))
        | NodePayload::Construct(ConstructKind::Tuple(_)) => true,
        NodePayload::Construct(ConstructKind::OnCannotResolve(_)) => true,
        // Factories and deferred blocks always need a statement position.
        _ => false,
    }
}
