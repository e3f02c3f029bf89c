//! Serializable snapshot of a dependency graph.
//!
//! Available behind the `graph-export` feature. The export flattens the
//! graph into plain strings and indexes so external tooling (visualizers,
//! CI checks) can consume it without knowing the engine's types.

use serde::{Deserialize, Serialize};

use crate::graph::{DependencyGraph, NodePayload};

/// One exported node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExport {
    /// Node index
    pub id: u32,
    /// Rendered type
    pub type_name: String,
    /// Lifetime name
    pub lifetime: String,
    /// Payload kind: `implementation`, `factory`, `construct`, or `arg`
    pub payload: String,
    /// Whether disposal tracking applies
    pub disposable: bool,
}

/// One exported edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeExport {
    /// Source node index
    pub source: u32,
    /// Target node index
    pub target: u32,
    /// Consumption site description
    pub site: String,
    /// Deferred-expansion edge
    pub lazy: bool,
    /// Back reference inside a legal cycle
    pub cycle_back: bool,
}

/// A complete graph snapshot for one root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    /// Root name
    pub root_name: String,
    /// Root node index
    pub root: u32,
    /// Nodes in creation order
    pub nodes: Vec<NodeExport>,
    /// Edges in creation order
    pub edges: Vec<EdgeExport>,
}

impl GraphExport {
    /// Snapshots a built graph.
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|node| NodeExport {
                id: node.id.0,
                type_name: node.type_ref.to_string(),
                lifetime: node.lifetime.to_string(),
                payload: match &node.payload {
                    NodePayload::Implementation { .. } => "implementation".to_string(),
                    NodePayload::Factory(_) => "factory".to_string(),
                    NodePayload::Construct(_) => "construct".to_string(),
                    NodePayload::Arg { .. } => "arg".to_string(),
                },
                disposable: node.is_disposable || node.is_async_disposable,
            })
            .collect();
        let edges = graph
            .edges
            .iter()
            .map(|edge| EdgeExport {
                source: edge.source.0,
                target: edge.target.0,
                site: edge.site.to_string(),
                lazy: edge.lazy,
                cycle_back: edge.cycle_back,
            })
            .collect();
        GraphExport {
            root_name: graph.root_name.to_string(),
            root: graph.root.0,
            nodes,
            edges,
        }
    }

    /// Serializes the snapshot as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{BindingDef, BindingRegistry};
    use crate::diagnostics::Diagnostics;
    use crate::graph::GraphBuilder;
    use crate::lifetime::Lifetime;
    use crate::meta::{CtorMeta, Hints, ParamMeta, RootDef, TypeMeta, TypeRegistry};
    use crate::types::{Injection, TypeRef};

    #[test]
    fn export_round_trips_through_json() {
        let named = TypeRef::named;
        let mut types = TypeRegistry::new();
        types.insert(TypeMeta::new(named("Dep")).with_ctor(CtorMeta::new(vec![])));
        types.insert(TypeMeta::new(named("Service")).with_ctor(CtorMeta::new(vec![
            ParamMeta::new("dep", Injection::of(named("Dep"))),
        ])));
        let defs = vec![BindingDef::implementation(
            named("IService"),
            named("Service"),
            Lifetime::Transient,
        )];
        let mut registry = BindingRegistry::from_defs(&defs);
        let mut diags = Diagnostics::new();
        let hints = Hints::default();
        let builder = GraphBuilder::new(
            &mut registry,
            &types,
            &hints,
            named("Composition"),
            &mut diags,
        );
        let graph = builder
            .build(&RootDef::new("Root", Injection::of(named("IService"))), &[])
            .unwrap()
            .unwrap();

        let export = GraphExport::from_graph(&graph);
        let json = export.to_json().unwrap();
        let parsed: GraphExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.nodes.len(), export.nodes.len());
        assert_eq!(parsed.root_name, "Root");
        assert_eq!(parsed.edges.len(), 1);
    }
}
