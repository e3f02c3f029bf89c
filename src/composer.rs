//! The composition pipeline: validate, build, plan, synthesize.
//!
//! One call takes a declarative setup and the type metadata and returns a
//! complete [`CompositionPlan`]. Roots are independent: a root with fatal
//! diagnostics is dropped from the output while its siblings still compose,
//! so one pass reports every problem the setup has.

use ahash::AHashSet;

use crate::bindings::BindingRegistry;
use crate::cycles;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::DiResult;
use crate::graph::GraphBuilder;
use crate::meta::{SetupModel, TypeRegistry};
use crate::statements::{
    CompositionPlan, ConstructorPlan, FieldKind, FieldPlan, RootPlan, Statement,
};
use crate::synthesis::synthesize_root;
use crate::types::TypeRef;
use crate::validation::validate_setup;
use crate::variables::{plan_variables, IdContext, VarKind};

/// Composes a setup into a full plan.
///
/// Diagnostics are collected, never thrown: a returned plan may carry
/// errors, in which case the affected roots are absent. Only budget
/// violations (depth, node count) abort the pipeline.
pub fn compose(setup: &SetupModel, types: &TypeRegistry) -> DiResult<CompositionPlan> {
    let mut diags = Diagnostics::new();
    validate_setup(setup, types, &mut diags);
    if diags.has_errors() {
        return Ok(empty_plan(setup, diags));
    }

    let mut registry = BindingRegistry::from_defs(&setup.bindings);
    let mut ids = IdContext::new();
    let composition = TypeRef::named(setup.name.clone());

    let mut fields: Vec<FieldPlan> = Vec::new();
    let mut seen_fields: AHashSet<String> = AHashSet::new();
    let mut roots: Vec<RootPlan> = Vec::new();
    let mut disposal_capacity = 0usize;
    let mut has_scoped = false;

    for root in &setup.roots {
        let errors_before = diags.error_count();
        let builder = GraphBuilder::new(
            &mut registry,
            types,
            &setup.hints,
            composition.clone(),
            &mut diags,
        );
        let Some(graph) = builder.build(root, &setup.args)? else {
            continue;
        };
        if diags.error_count() > errors_before {
            continue;
        }
        if cycles::find_eager_cycle(&graph).is_some() {
            diags.push(Diagnostic::new(
                DiagnosticKind::CircularDependency,
                format!("Root '{}' contains a circular dependency", root.name),
            ));
            continue;
        }

        let plan = plan_variables(&graph, &setup.hints, &mut ids);
        has_scoped |= plan.iter().any(|v| v.kind == VarKind::ScopedField);
        let synthesis = synthesize_root(&graph, &plan, &setup.hints);
        // Initial tracking capacity: one slot per recorded disposable plus
        // the disposable shared fields. Deferred blocks that run repeatedly
        // grow the array at registration time.
        disposal_capacity += graph.accumulators.len()
            + graph
                .nodes
                .iter()
                .filter(|n| {
                    (n.is_disposable || n.is_async_disposable) && n.lifetime.needs_field()
                })
                .count();
        for field in synthesis.fields {
            if seen_fields.insert(field.name.clone()) {
                fields.push(field);
            }
        }

        roots.push(RootPlan {
            name: root.name.to_string(),
            return_type: root.injection.type_ref.to_string(),
            is_public: root.is_public,
            params: root
                .args
                .iter()
                .map(|a| (a.name.to_string(), a.injection.type_ref.to_string()))
                .collect(),
            body: synthesis.body,
        });
    }

    // Per-thread fields never race, so they alone do not warrant a lock.
    let locked_shared = fields
        .iter()
        .any(|f| f.kind == FieldKind::Shared && !f.thread_local);
    let needs_lock = locked_shared || disposal_capacity > 0;
    let needs_dispose = disposal_capacity > 0;

    // Field order: arguments, shared slots, infrastructure.
    let mut all_fields: Vec<FieldPlan> = setup
        .args
        .iter()
        .map(|arg| FieldPlan {
            name: format!("_arg{}", crate::statements::capitalize(&arg.name)),
            type_name: arg.injection.type_ref.to_string(),
            kind: FieldKind::Argument,
            thread_local: false,
            init: None,
        })
        .collect();
    all_fields.extend(fields);
    if needs_lock && setup.hints.thread_safe {
        all_fields.push(FieldPlan {
            name: "_lock".to_string(),
            type_name: "object".to_string(),
            kind: FieldKind::Infrastructure,
            thread_local: false,
            init: Some("new object()".to_string()),
        });
    }
    if disposal_capacity > 0 {
        all_fields.push(FieldPlan {
            name: "_disposables".to_string(),
            type_name: "object[]".to_string(),
            kind: FieldKind::Infrastructure,
            thread_local: false,
            init: Some(format!("new object[{}]", disposal_capacity)),
        });
        all_fields.push(FieldPlan {
            name: "_disposeIndex".to_string(),
            type_name: "int".to_string(),
            kind: FieldKind::Infrastructure,
            thread_local: false,
            init: None,
        });
    }

    let mut constructors = vec![ConstructorPlan::Default];
    if !setup.args.is_empty() {
        constructors.push(ConstructorPlan::WithArgs(
            setup
                .args
                .iter()
                .map(|a| (a.name.to_string(), a.injection.type_ref.to_string()))
                .collect(),
        ));
    }
    if has_scoped {
        constructors.push(ConstructorPlan::ScopeCopy);
    }

    let dispose = if needs_dispose {
        dispose_body(&all_fields, disposal_capacity, setup.hints.thread_safe)
    } else {
        Vec::new()
    };

    Ok(CompositionPlan {
        name: setup.name.clone(),
        fields: all_fields,
        constructors,
        roots,
        dispose,
        diagnostics: diags,
    })
}

fn empty_plan(setup: &SetupModel, diags: Diagnostics) -> CompositionPlan {
    CompositionPlan {
        name: setup.name.clone(),
        fields: Vec::new(),
        constructors: vec![ConstructorPlan::Default],
        roots: Vec::new(),
        dispose: Vec::new(),
        diagnostics: diags,
    }
}

/// Disposal runs newest-first over the tracking array, swallows individual
/// failures, then clears every shared slot so the composition can observe
/// its own disposed state.
fn dispose_body(fields: &[FieldPlan], disposal_capacity: usize, thread_safe: bool) -> Vec<Statement> {
    let mut inner = Vec::new();
    if disposal_capacity > 0 {
        inner.push(Statement::block(
            "while (_disposeIndex > 0)",
            vec![
                Statement::line("var instance = _disposables[--_disposeIndex];"),
                Statement::block(
                    "try",
                    vec![Statement::line(
                        "if (instance is IDisposable disposable) disposable.Dispose();",
                    )],
                ),
                Statement::block("catch", vec![]),
            ],
        ));
    }
    for field in fields {
        match field.kind {
            FieldKind::Shared => {
                inner.push(Statement::line(format!("{} = null;", field.name)));
            }
            FieldKind::Infrastructure if field.type_name == "bool" => {
                inner.push(Statement::line(format!("{} = false;", field.name)));
            }
            _ => {}
        }
    }
    if thread_safe {
        vec![Statement::block("lock (_lock)", inner)]
    } else {
        inner
    }
}
