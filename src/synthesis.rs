//! Statement synthesis: turns a planned graph into a root method body.
//!
//! Dependencies are emitted before their consumers. Shared lifetimes
//! materialize as guarded initialization (double-checked locking when thread
//! safety is on); the guard is repeated in every block that consumes the
//! value, or hoisted into a named local function when its body is large,
//! so a value first touched inside a deferred lambda is still created on
//! first use from eager code. Factories are rewritten fragment by fragment,
//! and lazy constructs emit deferred bodies (lambdas and local enumerator
//! functions) whose contents are synthesized in place.

use ahash::AHashSet;

use crate::bindings::{ConstructKind, FactoryFragment, FactoryModel};
use crate::graph::{DependencyEdge, DependencyGraph, NodeId, NodePayload};
use crate::lifetime::Lifetime;
use crate::meta::{Hints, MemberKind, MemberMeta};
use crate::statements::{capitalize, render_statements, FieldKind, FieldPlan, Statement};
use crate::variables::{VarKind, Variable, VariablePlan};

/// A guard body longer than this is hoisted into a named local function
/// instead of being repeated in every consuming block.
const HOIST_LINES: usize = 8;

/// The synthesized output for one root.
#[derive(Debug, Clone)]
pub struct RootSynthesis {
    /// Complete method body, forward declarations first
    pub body: Vec<Statement>,
    /// Shared-lifetime fields this root touches; the composer deduplicates
    /// across roots
    pub fields: Vec<FieldPlan>,
}

/// Synthesizes the method body for one root graph.
pub fn synthesize_root(graph: &DependencyGraph, plan: &VariablePlan, hints: &Hints) -> RootSynthesis {
    let mut forward = vec![false; graph.nodes.len()];
    for edge in &graph.edges {
        if edge.cycle_back {
            forward[edge.target.index()] = true;
        }
    }

    let mut synth = Synthesizer {
        graph,
        plan,
        hints,
        exprs: vec![None; graph.nodes.len()],
        forward,
        hoisted: vec![false; graph.nodes.len()],
        scopes: vec![AHashSet::new()],
        prelude: Vec::new(),
        fields: Vec::new(),
        in_lock: false,
        guard_uses_locals: false,
    };

    let mut out = Vec::new();
    let expr = synth.ensure(graph.root, &mut out);
    out.push(Statement::line(format!("return {};", expr)));

    let mut body = synth.prelude;
    body.extend(out);
    RootSynthesis { body, fields: synth.fields }
}

struct Synthesizer<'a> {
    graph: &'a DependencyGraph,
    plan: &'a VariablePlan,
    hints: &'a Hints,
    exprs: Vec<Option<String>>,
    forward: Vec<bool>,
    hoisted: Vec<bool>,
    /// One entry per open lexical block; tracks which shared guards the
    /// block (or an enclosing one) already contains.
    scopes: Vec<AHashSet<usize>>,
    prelude: Vec<Statement>,
    fields: Vec<FieldPlan>,
    /// Statements are currently being emitted under `lock (_lock)`.
    in_lock: bool,
    guard_uses_locals: bool,
}

impl<'a> Synthesizer<'a> {
    /// Returns the expression referring to a node, emitting its creation
    /// statements into `out` first if the current block cannot see them yet.
    fn ensure(&mut self, id: NodeId, out: &mut Vec<Statement>) -> String {
        let var = self.plan.var(id).clone();
        match var.kind {
            VarKind::Inline => {
                if let Some(expr) = &self.exprs[id.index()] {
                    return expr.clone();
                }
                if !var.name.is_empty() {
                    self.exprs[id.index()] = Some(var.name.clone());
                    return var.name;
                }
                let expr = self.construction_expr(id, out);
                self.exprs[id.index()] = Some(expr.clone());
                expr
            }
            VarKind::Local => {
                if let Some(expr) = &self.exprs[id.index()] {
                    return expr.clone();
                }
                self.emit_local(id, &var.name, out)
            }
            VarKind::PerResolveLocal => self.emit_per_resolve(id, &var, out),
            VarKind::SingletonField | VarKind::ScopedField | VarKind::PerThreadField => {
                self.emit_field(id, &var, out)
            }
        }
    }

    /// The dependency expression at a consumption edge, routed through the
    /// interception hook when enabled.
    fn inject_expr(&mut self, edge: &DependencyEdge, out: &mut Vec<Statement>) -> String {
        let expr = self.ensure(edge.target, out);
        if self.hints.on_dependency_injection {
            format!("OnDependencyInjection<{}>({})", edge.injection.type_ref, expr)
        } else {
            expr
        }
    }

    fn deps(&self, id: NodeId) -> Vec<DependencyEdge> {
        self.graph.dependencies(id).cloned().collect()
    }

    fn materialized_in_scope(&self, id: NodeId) -> bool {
        self.scopes.iter().any(|s| s.contains(&id.index()))
    }

    fn mark_materialized(&mut self, id: NodeId) {
        if let Some(top) = self.scopes.last_mut() {
            top.insert(id.index());
        }
    }

    fn emit_local(&mut self, id: NodeId, name: &str, out: &mut Vec<Statement>) -> String {
        self.guard_uses_locals = true;
        // Reserve the name first so back references inside cycles resolve.
        self.exprs[id.index()] = Some(name.to_string());
        let node = self.graph.node(id).clone();
        let declare = !self.forward[id.index()];
        if !declare {
            self.prelude.push(Statement::line(format!("{} {} = null;", node.type_ref, name)));
        }

        match &node.payload {
            NodePayload::Implementation { .. } => {
                let expr = self.construction_expr(id, out);
                out.push(Statement::line(declaration(name, &expr, declare)));
                self.post_create(id, name, out);
            }
            NodePayload::Factory(model) => {
                let model = model.clone();
                self.emit_factory(id, name, &model, declare, out);
                self.post_create(id, name, out);
            }
            NodePayload::Construct(kind) => {
                let kind = kind.clone();
                self.emit_construct(id, name, &kind, declare, out);
            }
            NodePayload::Arg { .. } => {}
        }
        name.to_string()
    }

    fn emit_per_resolve(&mut self, id: NodeId, var: &Variable, out: &mut Vec<Statement>) -> String {
        let name = var.name.clone();
        if self.exprs[id.index()].is_some() {
            if self.materialized_in_scope(id) {
                return name;
            }
            // Consumed again from a sibling block: the guard is idempotent,
            // so the block repeats it (or calls the hoisted function).
            if self.hoisted[id.index()] {
                out.push(Statement::line(format!("{}();", guard_fn_name(&name))));
            } else {
                let (guard, _) = self.per_resolve_guard(id, &name);
                out.push(guard);
            }
            self.mark_materialized(id);
            return name;
        }

        let node = self.graph.node(id).clone();
        self.exprs[id.index()] = Some(name.clone());
        if node.is_value_type {
            self.prelude.push(Statement::line(format!("{} {} = default;", node.type_ref, name)));
            self.prelude.push(Statement::line(format!("var {}Created = false;", name)));
        } else {
            self.prelude.push(Statement::line(format!("{} {} = null;", node.type_ref, name)));
        }

        let (guard, used_locals) = self.per_resolve_guard(id, &name);
        if var.refs > 1 && self.should_hoist(id, &guard, used_locals) {
            self.hoisted[id.index()] = true;
            self.prelude
                .push(Statement::block(format!("void {}()", guard_fn_name(&name)), vec![guard]));
            out.push(Statement::line(format!("{}();", guard_fn_name(&name))));
        } else {
            out.push(guard);
        }
        self.mark_materialized(id);
        name
    }

    fn per_resolve_guard(&mut self, id: NodeId, name: &str) -> (Statement, bool) {
        let node = self.graph.node(id).clone();
        let check = if node.is_value_type {
            format!("!{}Created", name)
        } else {
            format!("{} == null", name)
        };

        let saved_locals = self.guard_uses_locals;
        self.guard_uses_locals = false;
        self.scopes.push(AHashSet::new());
        let mut inner = Vec::new();
        self.materialize(id, name, false, &mut inner);
        self.post_create(id, name, &mut inner);
        if node.is_value_type {
            inner.push(Statement::line(format!("{}Created = true;", name)));
        }
        self.scopes.pop();
        let used_locals = self.guard_uses_locals;
        self.guard_uses_locals = saved_locals || used_locals;

        (Statement::block(format!("if ({})", check), inner), used_locals)
    }

    fn emit_field(&mut self, id: NodeId, var: &Variable, out: &mut Vec<Statement>) -> String {
        let name = var.name.clone();
        if self.exprs[id.index()].is_some() {
            if self.materialized_in_scope(id) {
                return name;
            }
            if self.hoisted[id.index()] {
                out.push(Statement::line(format!("{}();", guard_fn_name(&name))));
            } else {
                let (guard, _) = self.field_guard(id, &name, var.kind);
                out.push(guard);
            }
            self.mark_materialized(id);
            return name;
        }

        self.exprs[id.index()] = Some(name.clone());
        let node = self.graph.node(id).clone();
        let thread_local = var.kind == VarKind::PerThreadField;
        self.fields.push(FieldPlan {
            name: name.clone(),
            type_name: node.type_ref.to_string(),
            kind: FieldKind::Shared,
            thread_local,
            init: None,
        });
        if node.is_value_type {
            self.fields.push(FieldPlan {
                name: format!("{}Created", name),
                type_name: "bool".to_string(),
                kind: FieldKind::Infrastructure,
                thread_local,
                init: None,
            });
        }

        let (guard, used_locals) = self.field_guard(id, &name, var.kind);
        if var.refs > 1 && self.should_hoist(id, &guard, used_locals) {
            self.hoisted[id.index()] = true;
            self.prelude
                .push(Statement::block(format!("void {}()", guard_fn_name(&name)), vec![guard]));
            out.push(Statement::line(format!("{}();", guard_fn_name(&name))));
        } else {
            out.push(guard);
        }
        self.mark_materialized(id);
        name
    }

    fn field_guard(&mut self, id: NodeId, name: &str, kind: VarKind) -> (Statement, bool) {
        let node = self.graph.node(id).clone();
        let check = if node.is_value_type {
            format!("!{}Created", name)
        } else {
            format!("{} == null", name)
        };
        let tmp = format!("tmp{}", capitalize(name.trim_start_matches('_')));
        // Per-thread fields never race across threads; the lock is skipped.
        let locked = self.hints.thread_safe && kind != VarKind::PerThreadField;

        let saved_locals = self.guard_uses_locals;
        self.guard_uses_locals = false;
        let saved_lock = self.in_lock;
        self.in_lock = self.in_lock || locked;
        self.scopes.push(AHashSet::new());
        let mut inner = Vec::new();
        self.materialize(id, &tmp, true, &mut inner);
        self.post_create(id, &tmp, &mut inner);
        if locked {
            inner.push(Statement::line("Thread.MemoryBarrier();".to_string()));
        }
        inner.push(Statement::line(format!("{} = {};", name, tmp)));
        if node.is_value_type {
            inner.push(Statement::line(format!("{}Created = true;", name)));
        }
        self.scopes.pop();
        self.in_lock = saved_lock;
        let used_locals = self.guard_uses_locals;
        self.guard_uses_locals = saved_locals || used_locals;

        let guarded = if locked {
            vec![Statement::block(
                "lock (_lock)",
                vec![Statement::block(format!("if ({})", check), inner)],
            )]
        } else {
            inner
        };
        (Statement::block(format!("if ({})", check), guarded), used_locals)
    }

    /// A guard repeated per consuming block must stay self-contained: once
    /// it spills locals, carries a factory body (goto labels are method
    /// scoped), or grows past the threshold, it becomes a local function.
    fn should_hoist(&self, id: NodeId, guard: &Statement, used_locals: bool) -> bool {
        let complex = matches!(
            self.graph.node(id).payload,
            NodePayload::Factory(_)
                | NodePayload::Construct(ConstructKind::Func { .. })
                | NodePayload::Construct(ConstructKind::Enumerable(_))
                | NodePayload::Construct(ConstructKind::AsyncEnumerable(_))
        );
        complex
            || used_locals
            || render_statements(std::slice::from_ref(guard), 0).lines().count() > HOIST_LINES
    }

    /// Emits statements leaving the node's value in `name`. Factories and
    /// deferred constructs need a statement position of their own; anything
    /// else is a single assignment.
    fn materialize(&mut self, id: NodeId, name: &str, declare: bool, out: &mut Vec<Statement>) {
        let node = self.graph.node(id).clone();
        match &node.payload {
            NodePayload::Factory(model) => {
                let model = model.clone();
                self.emit_factory(id, name, &model, declare, out);
            }
            NodePayload::Construct(
                kind @ (ConstructKind::Func { .. }
                | ConstructKind::Enumerable(_)
                | ConstructKind::AsyncEnumerable(_)),
            ) => {
                let kind = kind.clone();
                self.emit_construct(id, name, &kind, declare, out);
            }
            _ => {
                let expr = self.construction_expr(id, out);
                out.push(Statement::line(declaration(name, &expr, declare)));
            }
        }
    }

    /// Builds a construction expression, emitting dependency statements as a
    /// side effect. Required members land in the object initializer; the
    /// rest are applied by `post_create`.
    fn construction_expr(&mut self, id: NodeId, out: &mut Vec<Statement>) -> String {
        let node = self.graph.node(id).clone();
        match &node.payload {
            NodePayload::Implementation { ctor, members } => {
                let deps = self.deps(id);
                let mut cursor = 0usize;
                let mut args = Vec::new();
                for _ in &ctor.params {
                    args.push(self.inject_expr(&deps[cursor], out));
                    cursor += 1;
                }
                let mut initializer = Vec::new();
                for member in members {
                    for _ in &member.params {
                        if member.required {
                            let expr = self.inject_expr(&deps[cursor], out);
                            initializer.push(format!("{} = {}", member.name, expr));
                        }
                        cursor += 1;
                    }
                }
                let mut expr = format!("new {}({})", node.type_ref, args.join(", "));
                if !initializer.is_empty() {
                    expr.push_str(&format!(" {{ {} }}", initializer.join(", ")));
                }
                expr
            }
            NodePayload::Construct(kind) => {
                let kind = kind.clone();
                self.construct_expr(id, &kind, out)
            }
            // Factories go through `materialize`; args are always named.
            NodePayload::Factory(_) | NodePayload::Arg { .. } => String::new(),
        }
    }

    fn construct_expr(&mut self, id: NodeId, kind: &ConstructKind, out: &mut Vec<Statement>) -> String {
        match kind {
            ConstructKind::Array(element) | ConstructKind::Span(element) => {
                let deps = self.deps(id);
                let items: Vec<String> =
                    deps.iter().map(|e| self.inject_expr(e, out)).collect();
                format!("new {}[] {{ {} }}", element, items.join(", "))
            }
            ConstructKind::Tuple(_) => {
                let deps = self.deps(id);
                let items: Vec<String> =
                    deps.iter().map(|e| self.inject_expr(e, out)).collect();
                format!("({})", items.join(", "))
            }
            ConstructKind::Composition => "this".to_string(),
            ConstructKind::OnCannotResolve(injection) => {
                format!("OnCannotResolve<{}>()", injection.type_ref)
            }
            ConstructKind::ExplicitDefault(literal) => literal.to_string(),
            ConstructKind::Accumulator(element) => format!("new List<{}>()", element),
            ConstructKind::Override(_) => "default".to_string(),
            // Deferred constructs need a statement position; emit_construct
            // owns them and substitutes the variable name.
            ConstructKind::Func { .. }
            | ConstructKind::Enumerable(_)
            | ConstructKind::AsyncEnumerable(_) => String::new(),
        }
    }

    fn emit_construct(
        &mut self,
        id: NodeId,
        name: &str,
        kind: &ConstructKind,
        declare: bool,
        out: &mut Vec<Statement>,
    ) {
        match kind {
            ConstructKind::Func { params, .. } => {
                let node = self.graph.node(id).clone();
                let lambda_params: Vec<String> =
                    (0..params.len()).map(|i| format!("arg{}", i)).collect();
                let header = if declare {
                    format!("{} {} = ({}) =>", node.type_ref, name, lambda_params.join(", "))
                } else {
                    format!("{} = ({}) =>", name, lambda_params.join(", "))
                };
                // The body runs on invocation, outside any lock held here.
                let saved_lock = self.in_lock;
                self.in_lock = false;
                self.scopes.push(AHashSet::new());
                let mut body = Vec::new();
                let deps = self.deps(id);
                if let Some(edge) = deps.first() {
                    let edge = edge.clone();
                    let expr = self.inject_expr(&edge, &mut body);
                    body.push(Statement::line(format!("return {};", expr)));
                }
                self.scopes.pop();
                self.in_lock = saved_lock;
                out.push(Statement::closed_block(header, body, ";"));
            }
            ConstructKind::Enumerable(element) | ConstructKind::AsyncEnumerable(element) => {
                let is_async = matches!(kind, ConstructKind::AsyncEnumerable(_));
                let gen = format!("{}Gen", name);
                let header = if is_async {
                    format!("async IAsyncEnumerable<{}> {}()", element, gen)
                } else {
                    format!("IEnumerable<{}> {}()", element, gen)
                };
                let saved_lock = self.in_lock;
                self.in_lock = false;
                self.scopes.push(AHashSet::new());
                let mut body = Vec::new();
                for edge in self.deps(id) {
                    let expr = self.inject_expr(&edge, &mut body);
                    body.push(Statement::line(format!("yield return {};", expr)));
                }
                if body.is_empty() {
                    body.push(Statement::line("yield break;".to_string()));
                }
                self.scopes.pop();
                self.in_lock = saved_lock;
                out.push(Statement::block(header, body));
                out.push(Statement::line(declaration(name, &format!("{}()", gen), declare)));
            }
            other => {
                let expr = self.construct_expr(id, other, out);
                out.push(Statement::line(declaration(name, &expr, declare)));
            }
        }
    }

    /// Rewrites a factory body: opaque code verbatim, injection markers to
    /// variable declarations, return markers to assignments (plus a jump to
    /// a shared label when the body has several exits).
    fn emit_factory(
        &mut self,
        id: NodeId,
        name: &str,
        model: &FactoryModel,
        declare: bool,
        out: &mut Vec<Statement>,
    ) {
        let node = self.graph.node(id).clone();
        if declare {
            out.push(Statement::line(format!("{} {};", node.type_ref, name)));
        }
        let multi_exit = model.exit_count() > 1;
        let label = format!("{}Finish", name);
        let deps = self.deps(id);
        let mut cursor = 0usize;

        for fragment in &model.fragments {
            match fragment {
                FactoryFragment::Code(code) => {
                    for line in code.lines() {
                        out.push(Statement::line(line.to_string()));
                    }
                }
                FactoryFragment::Inject { var_hint, .. } => {
                    let expr = self.inject_expr(&deps[cursor].clone(), out);
                    cursor += 1;
                    out.push(Statement::line(format!("var {} = {};", var_hint, expr)));
                }
                FactoryFragment::Return(expr) => {
                    out.push(Statement::line(format!("{} = {};", name, expr)));
                    if multi_exit {
                        out.push(Statement::line(format!("goto {};", label)));
                    }
                }
            }
        }
        if multi_exit {
            out.push(Statement::line(format!("{}:;", label)));
        }
    }

    /// Everything that happens right after an instance exists: non-required
    /// member injections, disposal registration, the creation hook.
    fn post_create(&mut self, id: NodeId, name: &str, out: &mut Vec<Statement>) {
        let node = self.graph.node(id).clone();

        if let NodePayload::Implementation { ctor, members } = &node.payload {
            let deps = self.deps(id);
            let mut cursor = ctor.params.len();
            for member in members {
                if member.required {
                    cursor += member.params.len();
                    continue;
                }
                self.apply_member(name, member, &deps, &mut cursor, out);
            }
        }

        if node.is_disposable || node.is_async_disposable {
            // The tracking array is sized for one instance per registration
            // site; deferred blocks can run more than once, so it grows.
            let register = vec![
                Statement::line(
                    "if (_disposeIndex == _disposables.Length) Array.Resize(ref _disposables, _disposables.Length * 2);",
                ),
                Statement::line(format!("_disposables[_disposeIndex++] = {};", name)),
            ];
            if self.hints.thread_safe && !self.in_lock {
                out.push(Statement::block("lock (_lock)", register));
            } else {
                out.extend(register);
            }
        }
        if self.hints.on_new_instance {
            out.push(Statement::line(format!(
                "OnNewInstance<{}>(ref {}, {});",
                node.type_ref,
                name,
                lifetime_tag(node.lifetime),
            )));
        }
    }

    fn apply_member(
        &mut self,
        name: &str,
        member: &MemberMeta,
        deps: &[DependencyEdge],
        cursor: &mut usize,
        out: &mut Vec<Statement>,
    ) {
        match member.kind {
            MemberKind::Field | MemberKind::Property => {
                let expr = self.inject_expr(&deps[*cursor].clone(), out);
                *cursor += 1;
                out.push(Statement::line(format!("{}.{} = {};", name, member.name, expr)));
            }
            MemberKind::Method => {
                let mut args = Vec::new();
                for _ in &member.params {
                    args.push(self.inject_expr(&deps[*cursor].clone(), out));
                    *cursor += 1;
                }
                out.push(Statement::line(format!(
                    "{}.{}({});",
                    name,
                    member.name,
                    args.join(", ")
                )));
            }
        }
    }
}

fn declaration(name: &str, expr: &str, declare: bool) -> String {
    if declare {
        format!("var {} = {};", name, expr)
    } else {
        format!("{} = {};", name, expr)
    }
}

fn guard_fn_name(name: &str) -> String {
    format!("Ensure{}", capitalize(name.trim_start_matches('_')))
}

fn lifetime_tag(lifetime: Lifetime) -> String {
    format!("Lifetime.{}", lifetime)
}
