use forge_di::{
    compose, BindingDef, CtorMeta, DiagnosticKind, Injection, Lifetime, ParamMeta, RootDef,
    SetupModel, Tag, TypeMeta, TypeRef, TypeRegistry,
};

fn named(n: &str) -> TypeRef {
    TypeRef::named(n)
}

#[test]
fn eager_cycle_fails_with_a_circular_diagnostic() {
    let mut types = TypeRegistry::new();
    types.insert(
        TypeMeta::new(named("A")).with_ctor(CtorMeta::new(vec![ParamMeta::new(
            "b",
            Injection::of(named("B")),
        )])),
    );
    types.insert(
        TypeMeta::new(named("B")).with_ctor(CtorMeta::new(vec![ParamMeta::new(
            "a",
            Injection::of(named("A")),
        )])),
    );

    let setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(named("A"), named("A"), Lifetime::Transient))
        .bind(BindingDef::implementation(named("B"), named("B"), Lifetime::Transient))
        .root(RootDef::new("Root", Injection::of(named("A"))));

    let plan = compose(&setup, &types).unwrap();
    assert!(plan.roots.is_empty());
    assert!(plan
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::CircularDependency));
}

#[test]
fn cycle_broken_by_a_delegate_composes() {
    let func_b = TypeRef::Func { params: vec![], ret: Box::new(named("B")) };
    let mut types = TypeRegistry::new();
    types.insert(
        TypeMeta::new(named("A")).with_ctor(CtorMeta::new(vec![ParamMeta::new(
            "makeB",
            Injection::of(func_b),
        )])),
    );
    types.insert(
        TypeMeta::new(named("B")).with_ctor(CtorMeta::new(vec![ParamMeta::new(
            "a",
            Injection::of(named("A")),
        )])),
    );

    let setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(named("A"), named("A"), Lifetime::Transient))
        .bind(BindingDef::implementation(named("B"), named("B"), Lifetime::Transient))
        .root(RootDef::new("Root", Injection::of(named("A"))));

    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);
    assert_eq!(plan.roots.len(), 1);

    let code = plan.render();
    // The back reference resolves against a forward declaration.
    assert!(code.contains("A transientA0 = null;"));
    assert!(code.contains("() =>"));
    assert!(code.contains("return transientA0;"));
}

#[test]
fn func_parameters_override_inside_the_block_only() {
    let func = TypeRef::Func { params: vec![named("Int")], ret: Box::new(named("Worker")) };
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Worker")).with_ctor(CtorMeta::new(vec![
        ParamMeta::new("id", Injection::of(named("Int"))),
    ])));

    let setup = SetupModel::new("Composition")
        .root(RootDef::new("Factory", Injection::of(func)));

    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);
    let code = plan.render();
    assert!(code.contains("(arg0) =>"));
    assert!(code.contains("return new Worker(arg0);"));
}

#[test]
fn enumerable_yields_every_matching_binding_in_tag_order() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Untagged")).with_ctor(CtorMeta::new(vec![])));
    types.insert(TypeMeta::new(named("TaggedOne")).with_ctor(CtorMeta::new(vec![])));
    types.insert(TypeMeta::new(named("TaggedTwo")).with_ctor(CtorMeta::new(vec![])));

    let setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(
            named("IHandler"),
            named("Untagged"),
            Lifetime::Transient,
        ))
        .bind(
            BindingDef::implementation(named("IHandler"), named("TaggedTwo"), Lifetime::Transient)
                .with_tag(Tag::Int(2)),
        )
        .bind(
            BindingDef::implementation(named("IHandler"), named("TaggedOne"), Lifetime::Transient)
                .with_tag(Tag::Int(1)),
        )
        .root(RootDef::new(
            "Handlers",
            Injection::of(TypeRef::Enumerable(Box::new(named("IHandler")))),
        ));

    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty());
    let code = plan.render();
    let untagged = code.find("yield return new Untagged();").unwrap();
    let one = code.find("yield return new TaggedOne();").unwrap();
    let two = code.find("yield return new TaggedTwo();").unwrap();
    assert!(untagged < one && one < two);
}

#[test]
fn empty_collection_is_legal() {
    let setup = SetupModel::new("Composition").root(RootDef::new(
        "Handlers",
        Injection::of(TypeRef::Array(Box::new(named("IHandler")))),
    ));
    let plan = compose(&setup, &TypeRegistry::new()).unwrap();
    assert!(plan.diagnostics.is_empty());
    assert!(plan.render().contains("new IHandler[] {  }"));
}

#[test]
fn array_construct_collects_matching_bindings_eagerly() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("H1")).with_ctor(CtorMeta::new(vec![])));
    types.insert(TypeMeta::new(named("H2")).with_ctor(CtorMeta::new(vec![])));

    let setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(named("IHandler"), named("H1"), Lifetime::Transient))
        .bind(
            BindingDef::implementation(named("IHandler"), named("H2"), Lifetime::Transient)
                .with_tag(Tag::Int(1)),
        )
        .root(RootDef::new(
            "Handlers",
            Injection::of(TypeRef::Array(Box::new(named("IHandler")))),
        ));

    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty());
    assert!(plan.render().contains("new IHandler[] { new H1(), new H2() }"));
}

#[test]
fn tuple_construct_resolves_each_item() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("A")).with_ctor(CtorMeta::new(vec![])));
    types.insert(TypeMeta::new(named("B")).with_ctor(CtorMeta::new(vec![])));

    let setup = SetupModel::new("Composition").root(RootDef::new(
        "Pair",
        Injection::of(TypeRef::Tuple(vec![named("A"), named("B")])),
    ));
    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty());
    assert!(plan.render().contains("return (new A(), new B());"));
}

#[test]
fn composition_self_injection_resolves_to_this() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Service")).with_ctor(CtorMeta::new(vec![
        ParamMeta::new("owner", Injection::of(named("Composition"))),
    ])));

    let setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(
            named("IService"),
            named("Service"),
            Lifetime::Transient,
        ))
        .root(RootDef::new("Root", Injection::of(named("IService"))));

    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);
    assert!(plan.render().contains("return new Service(this);"));
}
