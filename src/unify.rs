//! Marker-type unification for open-generic bindings.
//!
//! A binding declared against a contract containing markers (for example
//! `Repo<TT0>`) services any closed request (`Repo<User>`) by structurally
//! matching the contract against the requested type and recording what each
//! marker stands for. The substitution is then applied to the binding's
//! implementation type and to every injection its metadata declares.

use std::collections::BTreeMap;

use crate::types::{Injection, TypeRef};

/// Marker id to concrete type, ordered for deterministic iteration.
pub type Substitution = BTreeMap<u32, TypeRef>;

/// Structurally matches `pattern` (possibly containing markers) against the
/// closed `target`, extending `subst` with marker assignments.
///
/// A marker unifies with any marker-free type; a marker bound twice must
/// bind to the same type both times. Returns `false` without rolling back
/// `subst` on mismatch, so callers retrying another contract should pass a
/// fresh map.
///
/// # Examples
///
/// ```rust
/// use forge_di::unify::{unify, Substitution};
/// use forge_di::TypeRef;
///
/// let pattern = TypeRef::generic("Repo", vec![TypeRef::Marker(0)]);
/// let target = TypeRef::generic("Repo", vec![TypeRef::named("User")]);
///
/// let mut subst = Substitution::new();
/// assert!(unify(&pattern, &target, &mut subst));
/// assert_eq!(subst[&0], TypeRef::named("User"));
/// ```
pub fn unify(pattern: &TypeRef, target: &TypeRef, subst: &mut Substitution) -> bool {
    match (pattern, target) {
        (TypeRef::Marker(id), t) => match subst.get(id) {
            Some(bound) => bound == t,
            None => {
                // Markers only bind closed types; nested markers in the
                // target would leak placeholders into emitted code.
                if t.contains_marker() {
                    return false;
                }
                subst.insert(*id, t.clone());
                true
            }
        },
        (TypeRef::Named { name: a, args: x }, TypeRef::Named { name: b, args: y }) => {
            a == b && x.len() == y.len() && x.iter().zip(y).all(|(p, t)| unify(p, t, subst))
        }
        (TypeRef::Array(a), TypeRef::Array(b))
        | (TypeRef::Span(a), TypeRef::Span(b))
        | (TypeRef::Enumerable(a), TypeRef::Enumerable(b))
        | (TypeRef::AsyncEnumerable(a), TypeRef::AsyncEnumerable(b)) => unify(a, b, subst),
        (TypeRef::Tuple(x), TypeRef::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, t)| unify(p, t, subst))
        }
        (TypeRef::Func { params: p1, ret: r1 }, TypeRef::Func { params: p2, ret: r2 }) => {
            p1.len() == p2.len()
                && p1.iter().zip(p2).all(|(p, t)| unify(p, t, subst))
                && unify(r1, r2, subst)
        }
        _ => false,
    }
}

/// Replaces every bound marker in `t` with its substitution. Unbound markers
/// are left in place; callers validate the result is closed where required.
pub fn substitute(t: &TypeRef, subst: &Substitution) -> TypeRef {
    match t {
        TypeRef::Marker(id) => subst.get(id).cloned().unwrap_or_else(|| t.clone()),
        TypeRef::Named { name, args } => TypeRef::Named {
            name: name.clone(),
            args: args.iter().map(|a| substitute(a, subst)).collect(),
        },
        TypeRef::Array(e) => TypeRef::Array(Box::new(substitute(e, subst))),
        TypeRef::Span(e) => TypeRef::Span(Box::new(substitute(e, subst))),
        TypeRef::Tuple(items) => {
            TypeRef::Tuple(items.iter().map(|i| substitute(i, subst)).collect())
        }
        TypeRef::Func { params, ret } => TypeRef::Func {
            params: params.iter().map(|p| substitute(p, subst)).collect(),
            ret: Box::new(substitute(ret, subst)),
        },
        TypeRef::Enumerable(e) => TypeRef::Enumerable(Box::new(substitute(e, subst))),
        TypeRef::AsyncEnumerable(e) => {
            TypeRef::AsyncEnumerable(Box::new(substitute(e, subst)))
        }
    }
}

/// Applies a substitution to an injection, keeping its tag.
pub fn substitute_injection(injection: &Injection, subst: &Substitution) -> Injection {
    Injection {
        type_ref: substitute(&injection.type_ref, subst),
        tag: injection.tag.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(n: &str) -> TypeRef {
        TypeRef::named(n)
    }

    #[test]
    fn unifies_nested_generics() {
        let pattern = TypeRef::generic(
            "Dictionary",
            vec![named("String"), TypeRef::generic("List", vec![TypeRef::Marker(0)])],
        );
        let target = TypeRef::generic(
            "Dictionary",
            vec![named("String"), TypeRef::generic("List", vec![named("User")])],
        );
        let mut subst = Substitution::new();
        assert!(unify(&pattern, &target, &mut subst));
        assert_eq!(subst[&0], named("User"));
    }

    #[test]
    fn unifies_arrays_and_funcs() {
        let pattern = TypeRef::Func {
            params: vec![TypeRef::Marker(0)],
            ret: Box::new(TypeRef::Array(Box::new(TypeRef::Marker(1)))),
        };
        let target = TypeRef::Func {
            params: vec![named("Int")],
            ret: Box::new(TypeRef::Array(Box::new(named("User")))),
        };
        let mut subst = Substitution::new();
        assert!(unify(&pattern, &target, &mut subst));
        assert_eq!(subst[&0], named("Int"));
        assert_eq!(subst[&1], named("User"));
    }

    #[test]
    fn repeated_marker_must_agree() {
        let pattern = TypeRef::generic("Pair", vec![TypeRef::Marker(0), TypeRef::Marker(0)]);
        let same = TypeRef::generic("Pair", vec![named("A"), named("A")]);
        let different = TypeRef::generic("Pair", vec![named("A"), named("B")]);

        let mut subst = Substitution::new();
        assert!(unify(&pattern, &same, &mut subst));

        let mut subst = Substitution::new();
        assert!(!unify(&pattern, &different, &mut subst));
    }

    #[test]
    fn name_or_arity_mismatch_fails() {
        let pattern = TypeRef::generic("Repo", vec![TypeRef::Marker(0)]);
        let mut subst = Substitution::new();
        assert!(!unify(&pattern, &named("Repo"), &mut subst));
        assert!(!unify(&pattern, &TypeRef::generic("Other", vec![named("A")]), &mut subst));
    }

    #[test]
    fn marker_never_binds_open_type() {
        let pattern = TypeRef::Marker(0);
        let open = TypeRef::generic("List", vec![TypeRef::Marker(1)]);
        let mut subst = Substitution::new();
        assert!(!unify(&pattern, &open, &mut subst));
    }

    #[test]
    fn substitution_round_trip() {
        let pattern = TypeRef::generic(
            "Repo",
            vec![TypeRef::Marker(0), TypeRef::Enumerable(Box::new(TypeRef::Marker(1)))],
        );
        let target = TypeRef::generic(
            "Repo",
            vec![named("User"), TypeRef::Enumerable(Box::new(named("Order")))],
        );
        let mut subst = Substitution::new();
        assert!(unify(&pattern, &target, &mut subst));
        assert_eq!(substitute(&pattern, &subst), target);
    }
}
