//! Setup validation: catches malformed bindings before the graph walk.
//!
//! Runs once over the raw setup and collects every `InvalidSetup` found, so
//! a single pass reports all independent problems. A setup with validation
//! errors produces no code for any root.

use std::collections::HashSet;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::meta::{SetupModel, TypeRegistry};
use crate::bindings::{BindingDef, Payload};
use crate::types::TypeRef;

/// Validates the setup, pushing one diagnostic per independent problem.
pub fn validate_setup(setup: &SetupModel, types: &TypeRegistry, diags: &mut Diagnostics) {
    for def in &setup.bindings {
        validate_binding(def, types, diags);
    }

    let mut root_names: HashSet<&str> = HashSet::new();
    for root in &setup.roots {
        if !root_names.insert(&root.name) {
            diags.push(Diagnostic::new(
                DiagnosticKind::InvalidSetup,
                format!("Duplicate composition root name '{}'", root.name),
            ));
        }
    }

    let mut arg_names: HashSet<&str> = HashSet::new();
    for arg in &setup.args {
        if !arg_names.insert(&arg.name) {
            diags.push(Diagnostic::new(
                DiagnosticKind::InvalidSetup,
                format!("Duplicate composition argument name '{}'", arg.name),
            ));
        }
    }
}

fn validate_binding(def: &BindingDef, types: &TypeRegistry, diags: &mut Diagnostics) {
    if def.contracts.is_empty() {
        diags.push(
            Diagnostic::new(DiagnosticKind::InvalidSetup, "Binding exposes no contract types")
                .with_location(def.location.clone()),
        );
        return;
    }

    let Payload::Implementation { type_ref } = &def.payload else {
        return;
    };

    // A bare marker implements nothing; there is no type to construct.
    if matches!(type_ref, TypeRef::Marker(_)) {
        diags.push(
            Diagnostic::new(
                DiagnosticKind::InvalidSetup,
                format!(
                    "Binding for {} uses a marker-only implementation type",
                    def.contracts[0]
                ),
            )
            .with_location(def.location.clone()),
        );
        return;
    }

    // Every marker of the implementation must be bound by some contract,
    // otherwise unification can never close the implementation type.
    let mut impl_markers = Vec::new();
    type_ref.markers(&mut impl_markers);
    if !impl_markers.is_empty() {
        let mut contract_markers = Vec::new();
        for contract in &def.contracts {
            contract.markers(&mut contract_markers);
        }
        for marker in impl_markers {
            if !contract_markers.contains(&marker) {
                diags.push(
                    Diagnostic::new(
                        DiagnosticKind::InvalidSetup,
                        format!(
                            "Implementation type {} declares marker TT{} not bound by any contract",
                            type_ref, marker
                        ),
                    )
                    .with_location(def.location.clone()),
                );
            }
        }
    }

    // NotInherited: a declared contract the implementation does not carry.
    // An empty `implements` list means the front end supplied no inheritance
    // facts; nothing can be checked then.
    if let Some(meta) = types.meta_for(type_ref) {
        if meta.implements.is_empty() {
            return;
        }
        for contract in &def.contracts {
            if contract == type_ref || contract.contains_marker() {
                continue;
            }
            if meta.type_ref == *contract {
                continue;
            }
            if !meta.implements.iter().any(|i| i == contract) {
                diags.push(
                    Diagnostic::new(
                        DiagnosticKind::InvalidSetup,
                        format!("{} is not inherited or implemented by {}", contract, type_ref),
                    )
                    .with_location(def.location.clone()),
                );
            }
        }
    }
}
