/// Property-based tests for generation determinism.
///
/// Whatever the setup looks like, composing it twice must render
/// byte-identical output, and diagnostics must come out in the same order.
use forge_di::{
    compose, BindingDef, CtorMeta, Injection, Lifetime, ParamMeta, RootDef, SetupModel, TypeMeta,
    TypeRef, TypeRegistry,
};
use proptest::prelude::*;

fn named(n: &str) -> TypeRef {
    TypeRef::named(n)
}

fn lifetime_from(index: u8) -> Lifetime {
    match index % 6 {
        0 => Lifetime::Transient,
        1 => Lifetime::Singleton,
        2 => Lifetime::Scoped,
        3 => Lifetime::PerResolve,
        4 => Lifetime::PerBlock,
        _ => Lifetime::PerThread,
    }
}

/// Builds a linear chain Service0 -> Service1 -> ... with the given
/// lifetimes, one binding and one type per layer.
fn chain_setup(lifetimes: &[u8]) -> (SetupModel, TypeRegistry) {
    let mut types = TypeRegistry::new();
    let mut setup = SetupModel::new("Composition");
    for (i, &lt) in lifetimes.iter().enumerate() {
        let name = format!("Service{}", i);
        let contract = format!("IService{}", i);
        let mut ctor = vec![];
        if i + 1 < lifetimes.len() {
            ctor.push(ParamMeta::new(
                "next",
                Injection::of(named(&format!("IService{}", i + 1))),
            ));
        }
        types.insert(TypeMeta::new(named(&name)).with_ctor(CtorMeta::new(ctor)));
        setup = setup.bind(BindingDef::implementation(
            named(&contract),
            named(&name),
            lifetime_from(lt),
        ));
    }
    setup = setup.root(RootDef::new("Root", Injection::of(named("IService0"))));
    (setup, types)
}

proptest! {
    #[test]
    fn composing_twice_is_byte_identical(lifetimes in prop::collection::vec(any::<u8>(), 1..8)) {
        let (setup, types) = chain_setup(&lifetimes);
        let first = compose(&setup, &types).unwrap();
        let second = compose(&setup, &types).unwrap();
        prop_assert_eq!(first.render(), second.render());
    }
}

proptest! {
    #[test]
    fn diagnostics_order_is_stable(missing_count in 1usize..5) {
        let mut types = TypeRegistry::new();
        let mut params = vec![];
        for i in 0..missing_count {
            params.push(ParamMeta::new(
                format!("dep{}", i),
                Injection::of(named(&format!("Missing{}", i))),
            ));
        }
        types.insert(TypeMeta::new(named("Service")).with_ctor(CtorMeta::new(params)));
        let setup = SetupModel::new("Composition")
            .root(RootDef::new("Root", Injection::of(named("Service"))));

        let first = compose(&setup, &types).unwrap();
        let second = compose(&setup, &types).unwrap();

        // Every missing parameter is reported separately, in order.
        prop_assert_eq!(first.diagnostics.error_count(), missing_count);
        let first_messages: Vec<String> =
            first.diagnostics.iter().map(|d| d.to_string()).collect();
        let second_messages: Vec<String> =
            second.diagnostics.iter().map(|d| d.to_string()).collect();
        prop_assert_eq!(first_messages, second_messages);
    }
}

#[test]
fn field_and_local_names_are_stable_across_runs() {
    let lifetimes = vec![1, 0, 4, 3, 1];
    let (setup, types) = chain_setup(&lifetimes);
    let plan = compose(&setup, &types).unwrap();
    let replay = compose(&setup, &types).unwrap();
    let names: Vec<&str> = plan.fields.iter().map(|f| f.name.as_str()).collect();
    let replay_names: Vec<&str> = replay.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, replay_names);
}
