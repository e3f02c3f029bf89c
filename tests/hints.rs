use forge_di::{
    compose, Accessibility, BindingDef, CtorMeta, DiagnosticKind, Injection, Lifetime, MemberMeta,
    ParamMeta, RootDef, Severity, SetupModel, TypeMeta, TypeRef, TypeRegistry,
};

fn named(n: &str) -> TypeRef {
    TypeRef::named(n)
}

#[test]
fn fallback_factory_turns_the_error_into_a_warning() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Service")).with_ctor(CtorMeta::new(vec![
        ParamMeta::new("answer", Injection::of(named("Int"))),
    ])));

    let mut setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(
            named("IService"),
            named("Service"),
            Lifetime::Transient,
        ))
        .root(RootDef::new("Root", Injection::of(named("IService"))));
    setup.hints.on_cannot_resolve = true;

    let plan = compose(&setup, &types).unwrap();
    assert!(!plan.diagnostics.has_errors());
    let warning = plan.diagnostics.warnings().next().unwrap();
    assert_eq!(warning.kind, DiagnosticKind::CannotResolveFallback);
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!(plan.roots.len(), 1);
    assert!(plan.render().contains("new Service(OnCannotResolve<Int>())"));
}

#[test]
fn declared_default_wins_over_the_fallback_factory() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Service")).with_ctor(CtorMeta::new(vec![
        ParamMeta::new("answer", Injection::of(named("Int")))
            .with_default(forge_di::Literal::Int(42)),
    ])));

    let mut setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(
            named("IService"),
            named("Service"),
            Lifetime::Transient,
        ))
        .root(RootDef::new("Root", Injection::of(named("IService"))));
    setup.hints.on_cannot_resolve = true;

    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);
    assert!(plan.render().contains("new Service(42)"));
}

#[test]
fn on_new_instance_hook_fires_after_each_creation() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Dep")).with_ctor(CtorMeta::new(vec![])));
    types.insert(TypeMeta::new(named("Service")).with_ctor(CtorMeta::new(vec![
        ParamMeta::new("dep", Injection::of(named("IDep"))),
    ])));

    let mut setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(named("IDep"), named("Dep"), Lifetime::Singleton))
        .bind(BindingDef::implementation(
            named("IService"),
            named("Service"),
            Lifetime::Transient,
        ))
        .root(RootDef::new("Root", Injection::of(named("IService"))));
    setup.hints.on_new_instance = true;

    let plan = compose(&setup, &types).unwrap();
    let code = plan.render();
    assert!(code.contains("OnNewInstance<Dep>(ref tmpSingletonDep0, Lifetime.Singleton);"));
    assert!(code.contains("OnNewInstance<Service>(ref transientService"));
}

#[test]
fn on_dependency_injection_wraps_injected_references() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Dep")).with_ctor(CtorMeta::new(vec![])));
    types.insert(TypeMeta::new(named("Service")).with_ctor(CtorMeta::new(vec![
        ParamMeta::new("dep", Injection::of(named("IDep"))),
    ])));

    let mut setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(named("IDep"), named("Dep"), Lifetime::Transient))
        .bind(BindingDef::implementation(
            named("IService"),
            named("Service"),
            Lifetime::Transient,
        ))
        .root(RootDef::new("Root", Injection::of(named("IService"))));
    setup.hints.on_dependency_injection = true;

    let plan = compose(&setup, &types).unwrap();
    assert!(plan.render().contains("new Service(OnDependencyInjection<IDep>(new Dep()))"));
}

#[test]
fn internal_constructor_needs_the_visibility_hint() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Hidden")).with_ctor(
        CtorMeta::new(vec![]).with_accessibility(Accessibility::Internal),
    ));

    let setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(
            named("IHidden"),
            named("Hidden"),
            Lifetime::Transient,
        ))
        .root(RootDef::new("Root", Injection::of(named("IHidden"))));

    let blocked = compose(&setup, &types).unwrap();
    assert!(blocked.diagnostics.has_errors());

    let mut open = setup.clone();
    open.hints.internals_visible = true;
    let allowed = compose(&open, &types).unwrap();
    assert!(allowed.diagnostics.is_empty(), "{:?}", allowed.diagnostics);
    assert!(allowed.render().contains("return new Hidden();"));
}

#[test]
fn inaccessible_marked_member_is_an_error() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Dep")).with_ctor(CtorMeta::new(vec![])));
    types.insert(
        TypeMeta::new(named("Service"))
            .with_ctor(CtorMeta::new(vec![]))
            .with_member(
                MemberMeta::field("dep", Injection::of(named("Dep")))
                    .with_accessibility(Accessibility::Private),
            ),
    );

    let setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(
            named("IService"),
            named("Service"),
            Lifetime::Transient,
        ))
        .root(RootDef::new("Root", Injection::of(named("IService"))));

    let plan = compose(&setup, &types).unwrap();
    assert!(plan
        .diagnostics
        .errors()
        .any(|d| d.kind == DiagnosticKind::MemberInaccessible));
}

#[test]
fn member_injection_runs_after_construction() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Dep")).with_ctor(CtorMeta::new(vec![])));
    types.insert(
        TypeMeta::new(named("Service"))
            .with_ctor(CtorMeta::new(vec![]))
            .with_member(MemberMeta::property("Dep", Injection::of(named("Dep"))))
            .with_member(MemberMeta::method(
                "Initialize",
                vec![ParamMeta::new("dep", Injection::of(named("Dep")))],
            )),
    );

    let setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(
            named("IService"),
            named("Service"),
            Lifetime::Transient,
        ))
        .root(RootDef::new("Root", Injection::of(named("IService"))));

    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);
    let code = plan.render();
    let created = code.find("var transientService0 = new Service();").unwrap();
    let property = code.find("transientService0.Dep = new Dep();").unwrap();
    let method = code.find("transientService0.Initialize(new Dep());").unwrap();
    assert!(created < property && property < method);
}

#[test]
fn required_members_are_set_in_the_initializer() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Dep")).with_ctor(CtorMeta::new(vec![])));
    types.insert(
        TypeMeta::new(named("Service"))
            .with_ctor(CtorMeta::new(vec![]))
            .with_member(
                MemberMeta::property("Dep", Injection::of(named("Dep"))).required(),
            ),
    );

    let setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(
            named("IService"),
            named("Service"),
            Lifetime::Transient,
        ))
        .root(RootDef::new("Root", Injection::of(named("IService"))));

    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty());
    assert!(plan.render().contains("new Service() { Dep = new Dep() }"));
}
