//! Constructor and member selection.
//!
//! Given an implementation type's metadata, picks the constructor to call and
//! the injectable members to set, with a single documented total order so
//! that repeated generation runs make identical choices.
//!
//! Constructor tie-breaks, applied in order:
//! 1. explicit order annotation ascending, `None` after all `Some`;
//! 2. public before non-public-but-accessible;
//! 3. fewer parameters left unresolvable (no binding, no default);
//! 4. fewer parameters supplied purely by default value;
//! 5. non-obsolete before obsolete;
//! 6. more total parameters (richest resolvable constructor);
//! 7. declaration index ascending.
//!
//! Inaccessible constructors are excluded entirely; if none remain the caller
//! reports `CannotResolve`.

use std::cmp::Reverse;

use crate::meta::TypeMeta;
use crate::types::Injection;

/// The outcome of constructor selection for one implementation type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtorChoice {
    /// Index into `TypeMeta::constructors`
    pub index: usize,
    /// The chosen constructor is obsolete-marked; emits a warning
    pub obsolete: bool,
    /// Parameter indexes satisfied by their declared default value
    pub default_fallbacks: Vec<usize>,
    /// Parameter indexes with neither a binding nor a default
    pub unresolved: Vec<usize>,
}

/// Picks the constructor for `meta`, probing injection resolvability through
/// `can_resolve`. Returns `None` when no accessible constructor exists.
///
/// The winner may still carry unresolved parameters; the graph builder
/// reports each of them as a separate `CannotResolve` rather than
/// short-circuiting at the first failure.
pub fn select_constructor(
    meta: &TypeMeta,
    internals_visible: bool,
    can_resolve: &mut dyn FnMut(&Injection) -> bool,
) -> Option<CtorChoice> {
    struct Candidate {
        index: usize,
        ordinal: Option<i32>,
        non_public: bool,
        obsolete: bool,
        param_count: usize,
        default_fallbacks: Vec<usize>,
        unresolved: Vec<usize>,
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    for (index, ctor) in meta.constructors.iter().enumerate() {
        if !ctor.accessibility.is_accessible(internals_visible) {
            continue;
        }
        let mut default_fallbacks = Vec::new();
        let mut unresolved = Vec::new();
        for (pi, param) in ctor.params.iter().enumerate() {
            if can_resolve(&param.injection) {
                continue;
            }
            if param.default.is_some() {
                default_fallbacks.push(pi);
            } else {
                unresolved.push(pi);
            }
        }
        candidates.push(Candidate {
            index,
            ordinal: ctor.ordinal,
            non_public: ctor.accessibility != crate::meta::Accessibility::Public,
            obsolete: ctor.obsolete,
            param_count: ctor.params.len(),
            default_fallbacks,
            unresolved,
        });
    }

    candidates.sort_by_key(|c| {
        (
            c.ordinal.is_none(),
            c.ordinal.unwrap_or(0),
            c.non_public,
            c.unresolved.len(),
            c.default_fallbacks.len(),
            c.obsolete,
            Reverse(c.param_count),
            c.index,
        )
    });

    candidates.into_iter().next().map(|c| CtorChoice {
        index: c.index,
        obsolete: c.obsolete,
        default_fallbacks: c.default_fallbacks,
        unresolved: c.unresolved,
    })
}

/// The injectable members of a type, in injection order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberSelection {
    /// Indexes into `TypeMeta::members`, ordered by explicit annotation
    /// then declaration order
    pub selected: Vec<usize>,
    /// Indexes of marked members generated code cannot reach; each is a
    /// `MemberInaccessible` error at the caller
    pub inaccessible: Vec<usize>,
}

/// Selects injectable members: only those explicitly marked, required, or
/// init-only participate, ordered by explicit annotation then declaration
/// order.
pub fn select_members(meta: &TypeMeta, internals_visible: bool) -> MemberSelection {
    let mut selection = MemberSelection::default();
    let mut ordered: Vec<usize> = Vec::new();
    for (index, member) in meta.members.iter().enumerate() {
        if !member.explicitly_marked && !member.required {
            continue;
        }
        if !member.accessibility.is_accessible(internals_visible) {
            selection.inaccessible.push(index);
            continue;
        }
        ordered.push(index);
    }
    ordered.sort_by_key(|&i| {
        let m = &meta.members[i];
        (m.ordinal.is_none(), m.ordinal.unwrap_or(0), i)
    });
    selection.selected = ordered;
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{Accessibility, CtorMeta, MemberMeta, ParamMeta, TypeMeta};
    use crate::types::{Injection, Literal, TypeRef};

    fn param(name: &str, ty: &str) -> ParamMeta {
        ParamMeta::new(name, Injection::of(TypeRef::named(ty)))
    }

    #[test]
    fn resolvable_one_param_beats_unresolvable_two_param() {
        let meta = TypeMeta::new(TypeRef::named("Service"))
            .with_ctor(CtorMeta::new(vec![param("a", "Known")]))
            .with_ctor(CtorMeta::new(vec![param("a", "Known"), param("b", "Unknown")]));
        let choice = select_constructor(&meta, false, &mut |inj| {
            inj.type_ref == TypeRef::named("Known")
        })
        .unwrap();
        assert_eq!(choice.index, 0);
        assert!(choice.unresolved.is_empty());
    }

    #[test]
    fn explicit_ordinal_wins_among_equally_resolvable() {
        let meta = TypeMeta::new(TypeRef::named("Service"))
            .with_ctor(CtorMeta::new(vec![param("a", "Known")]).with_ordinal(5))
            .with_ctor(CtorMeta::new(vec![param("b", "Known")]).with_ordinal(1));
        let choice = select_constructor(&meta, false, &mut |_| true).unwrap();
        assert_eq!(choice.index, 1);
    }

    #[test]
    fn public_beats_internal_without_ordinals() {
        let meta = TypeMeta::new(TypeRef::named("Service"))
            .with_ctor(CtorMeta::new(vec![]).with_accessibility(Accessibility::Internal))
            .with_ctor(CtorMeta::new(vec![]));
        let choice = select_constructor(&meta, true, &mut |_| true).unwrap();
        assert_eq!(choice.index, 1);
    }

    #[test]
    fn private_ctors_are_excluded() {
        let meta = TypeMeta::new(TypeRef::named("Service"))
            .with_ctor(CtorMeta::new(vec![]).with_accessibility(Accessibility::Private));
        assert!(select_constructor(&meta, true, &mut |_| true).is_none());
    }

    #[test]
    fn obsolete_is_deprioritized_but_defaults_count_first() {
        // Non-obsolete ctor needs a default fallback, obsolete one does not;
        // fewer defaults wins before the obsolete tie-break.
        let meta = TypeMeta::new(TypeRef::named("Service"))
            .with_ctor(CtorMeta::new(vec![
                param("a", "Unknown").with_default(Literal::Int(0)),
            ]))
            .with_ctor(CtorMeta::new(vec![param("a", "Known")]).obsoleted());
        let choice = select_constructor(&meta, false, &mut |inj| {
            inj.type_ref == TypeRef::named("Known")
        })
        .unwrap();
        assert_eq!(choice.index, 1);
        assert!(choice.obsolete);
    }

    #[test]
    fn richest_resolvable_ctor_wins_on_equal_footing() {
        let meta = TypeMeta::new(TypeRef::named("Service"))
            .with_ctor(CtorMeta::new(vec![param("a", "Known")]))
            .with_ctor(CtorMeta::new(vec![param("a", "Known"), param("b", "Known")]));
        let choice = select_constructor(&meta, false, &mut |_| true).unwrap();
        assert_eq!(choice.index, 1);
    }

    #[test]
    fn members_ordered_by_ordinal_then_declaration() {
        let inj = |t: &str| Injection::of(TypeRef::named(t));
        let meta = TypeMeta::new(TypeRef::named("Service"))
            .with_member(MemberMeta::field("late", inj("A")))
            .with_member(MemberMeta::field("first", inj("B")).with_ordinal(0))
            .with_member(MemberMeta::property("skipped", inj("C")).with_accessibility(Accessibility::Private))
            .with_member(MemberMeta::field("unmarked", inj("D")));
        let mut unmarked = meta.clone();
        unmarked.members[3].explicitly_marked = false;

        let selection = select_members(&unmarked, false);
        assert_eq!(selection.selected, vec![1, 0]);
        assert_eq!(selection.inaccessible, vec![2]);
    }
}
