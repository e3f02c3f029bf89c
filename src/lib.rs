//! # forge-di
//!
//! A compile-time dependency injection planning engine: takes a declarative
//! binding setup plus type metadata and produces deterministic object-graph
//! construction code, with no runtime container and no reflection.
//!
//! ## Features
//!
//! - **Binding registry**: (contract, tag) keyed table with last-wins
//!   overrides, any-tag bindings, and open-generic unification
//! - **Graph resolution**: constructor, member, and factory injection with
//!   documented deterministic selection order
//! - **Seven lifetimes**: Transient, Singleton, Scoped, PerResolve,
//!   PerBlock, PerThread, and externally-supplied Binding values
//! - **Lazy boundaries**: delegates and enumerables defer expansion, making
//!   cycles through them legal
//! - **Deterministic synthesis**: double-checked locking for shared state,
//!   LIFO disposal, factory rewriting, byte-identical repeated runs
//! - **Collected diagnostics**: every independent problem reported in one
//!   pass with full injection chains
//!
//! ## Quick Start
//!
//! ```rust
//! use forge_di::{
//!     compose, BindingDef, CtorMeta, Injection, Lifetime, ParamMeta, RootDef,
//!     SetupModel, TypeMeta, TypeRef, TypeRegistry,
//! };
//!
//! // Describe the types the bindings mention
//! let mut types = TypeRegistry::new();
//! types.insert(TypeMeta::new(TypeRef::named("Dependency")).with_ctor(CtorMeta::new(vec![])));
//! types.insert(TypeMeta::new(TypeRef::named("Service")).with_ctor(CtorMeta::new(vec![
//!     ParamMeta::new("dependency", Injection::of(TypeRef::named("IDependency"))),
//! ])));
//!
//! // Declare bindings and a composition root
//! let setup = SetupModel::new("Composition")
//!     .bind(BindingDef::implementation(
//!         TypeRef::named("IDependency"),
//!         TypeRef::named("Dependency"),
//!         Lifetime::Singleton,
//!     ))
//!     .bind(BindingDef::implementation(
//!         TypeRef::named("IService"),
//!         TypeRef::named("Service"),
//!         Lifetime::Transient,
//!     ))
//!     .root(RootDef::new("Root", Injection::of(TypeRef::named("IService"))));
//!
//! // Compose: validate, build the graph, plan variables, synthesize
//! let plan = compose(&setup, &types).unwrap();
//! assert!(plan.diagnostics.is_empty());
//!
//! let code = plan.render();
//! assert!(code.contains("public IService Root()"));
//! assert!(code.contains("if (_singletonDependency0 == null)"));
//! ```
//!
//! ## Lifetimes
//!
//! - **Transient**: fresh instance per consumer, inlined when nothing
//!   observes the difference
//! - **Singleton**: one instance per composition, guarded field
//! - **Scoped**: one instance per scope instance
//! - **PerResolve**: one instance per root resolution
//! - **PerBlock**: consumers within one statement block share an instance
//! - **PerThread**: thread-local field
//! - **Binding**: supplied from outside (arguments, delegate parameters)
//!
//! ## Diagnostics
//!
//! Problems never abort the pipeline early. Every root is attempted, every
//! independent failure becomes a [`Diagnostic`] with the full injection
//! chain, and fatally-diagnosed roots are simply absent from the plan:
//!
//! ```rust
//! use forge_di::{compose, Injection, RootDef, SetupModel, TypeRef, TypeRegistry};
//!
//! let setup = SetupModel::new("Composition")
//!     .root(RootDef::new("Root", Injection::of(TypeRef::named("Missing"))));
//! let plan = compose(&setup, &TypeRegistry::new()).unwrap();
//! assert!(plan.diagnostics.has_errors());
//! assert!(plan.roots.is_empty());
//! ```

pub mod bindings;
pub mod composer;
pub mod cycles;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod lifetime;
pub mod meta;
pub mod selector;
pub mod statements;
pub mod synthesis;
pub mod types;
pub mod unify;
pub mod validation;
pub mod variables;

#[cfg(feature = "graph-export")]
pub mod graph_export;

// Re-export core types
pub use bindings::{
    Binding, BindingDef, BindingId, BindingRegistry, ConstructKind, FactoryFragment, FactoryModel,
    Payload,
};
pub use composer::compose;
pub use cycles::find_eager_cycle;
pub use diagnostics::{ChainLink, Diagnostic, DiagnosticKind, Diagnostics, Location, Severity};
pub use error::{DiError, DiResult};
pub use graph::{
    ArgScope, DependencyEdge, DependencyGraph, DependencyNode, GraphBuilder, InjectionSite, NodeId,
    NodePayload,
};
pub use lifetime::Lifetime;
pub use meta::{
    Accessibility, ArgDef, CtorMeta, Hints, MemberKind, MemberMeta, ParamMeta, RootDef, SetupModel,
    TypeMeta, TypeRegistry,
};
pub use selector::{select_constructor, select_members, CtorChoice, MemberSelection};
pub use statements::{
    render_statements, CompositionPlan, ConstructorPlan, FieldKind, FieldPlan, RootPlan, Statement,
};
pub use synthesis::{synthesize_root, RootSynthesis};
pub use types::{Injection, Literal, Tag, TypeRef};
pub use unify::{substitute, substitute_injection, unify, Substitution};
pub use validation::validate_setup;
pub use variables::{plan_variables, IdContext, VarKind, Variable, VariablePlan};

#[cfg(feature = "graph-export")]
pub use graph_export::{EdgeExport, GraphExport, NodeExport};
