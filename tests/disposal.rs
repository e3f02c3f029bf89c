use forge_di::{
    compose, BindingDef, CtorMeta, Injection, Lifetime, ParamMeta, RootDef, SetupModel, TypeMeta,
    TypeRef, TypeRegistry,
};

fn named(n: &str) -> TypeRef {
    TypeRef::named(n)
}

#[test]
fn transient_disposables_are_tracked_in_creation_order() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("First")).with_ctor(CtorMeta::new(vec![])).disposable());
    types.insert(TypeMeta::new(named("Second")).with_ctor(CtorMeta::new(vec![])).disposable());
    types.insert(TypeMeta::new(named("Service")).with_ctor(CtorMeta::new(vec![
        ParamMeta::new("first", Injection::of(named("First"))),
        ParamMeta::new("second", Injection::of(named("Second"))),
    ])));

    let setup = SetupModel::new("Composition")
        .root(RootDef::new("Root", Injection::of(named("Service"))));
    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);

    let code = plan.render();
    let first = code.find("_disposables[_disposeIndex++] = transientFirst").unwrap();
    let second = code.find("_disposables[_disposeIndex++] = transientSecond").unwrap();
    assert!(first < second);
    assert!(code.contains("private object[] _disposables = new object[2];"));
}

#[test]
fn dispose_drains_newest_first_and_swallows_failures() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Conn")).with_ctor(CtorMeta::new(vec![])).disposable());

    let setup = SetupModel::new("Composition")
        .root(RootDef::new("Root", Injection::of(named("Conn"))));
    let plan = compose(&setup, &types).unwrap();

    let code = plan.render();
    assert!(code.contains("public void Dispose()"));
    assert!(code.contains("while (_disposeIndex > 0)"));
    assert!(code.contains("var instance = _disposables[--_disposeIndex];"));
    assert!(code.contains("try"));
    assert!(code.contains("catch"));
    assert!(code.contains("if (instance is IDisposable disposable) disposable.Dispose();"));
}

#[test]
fn lazily_created_disposables_grow_the_tracking_array() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Conn")).with_ctor(CtorMeta::new(vec![])).disposable());

    let func_conn = TypeRef::Func { params: vec![], ret: Box::new(named("Conn")) };
    let setup = SetupModel::new("Composition")
        .root(RootDef::new("MakeConn", Injection::of(func_conn)));
    let plan = compose(&setup, &types).unwrap();
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);

    let code = plan.render();
    // One slot up front; every delegate invocation registers another
    // instance, so the array doubles when full instead of overflowing.
    assert!(code.contains("private object[] _disposables = new object[1];"));
    let lambda = code.find("() =>").unwrap();
    let resize = code
        .find("if (_disposeIndex == _disposables.Length) Array.Resize(ref _disposables, _disposables.Length * 2);")
        .unwrap();
    let register = code.find("_disposables[_disposeIndex++] = transientConn1;").unwrap();
    assert!(lambda < resize && resize < register);
}

#[test]
fn registration_locks_only_when_thread_safe() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Conn")).with_ctor(CtorMeta::new(vec![])).disposable());

    let setup = SetupModel::new("Composition")
        .root(RootDef::new("Root", Injection::of(named("Conn"))));
    let locked = compose(&setup, &types).unwrap().render();
    let lock = locked.find("lock (_lock)").unwrap();
    let register = locked.find("_disposables[_disposeIndex++] = transientConn0;").unwrap();
    assert!(lock < register);

    let mut relaxed = SetupModel::new("Composition")
        .root(RootDef::new("Root", Injection::of(named("Conn"))));
    relaxed.hints.thread_safe = false;
    let code = compose(&relaxed, &types).unwrap().render();
    assert!(code.contains("_disposables[_disposeIndex++] = transientConn0;"));
    assert!(!code.contains("lock (_lock)"));
}

#[test]
fn disposed_singletons_are_nulled_out() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Conn")).with_ctor(CtorMeta::new(vec![])).disposable());

    let setup = SetupModel::new("Composition")
        .bind(BindingDef::implementation(named("IConn"), named("Conn"), Lifetime::Singleton))
        .root(RootDef::new("Root", Injection::of(named("IConn"))));
    let plan = compose(&setup, &types).unwrap();

    let code = plan.render();
    assert!(code.contains("lock (_lock)"));
    assert!(code.contains("_singletonConn0 = null;"));
    // Registration inside the creation guard reuses the lock already held:
    // one lock in the guard, one in Dispose.
    assert_eq!(code.matches("lock (_lock)").count(), 2);
}

#[test]
fn non_disposable_graph_has_no_dispose_machinery() {
    let mut types = TypeRegistry::new();
    types.insert(TypeMeta::new(named("Plain")).with_ctor(CtorMeta::new(vec![])));

    let setup = SetupModel::new("Composition")
        .root(RootDef::new("Root", Injection::of(named("Plain"))));
    let plan = compose(&setup, &types).unwrap();
    assert!(plan.dispose.is_empty());
    let code = plan.render();
    assert!(!code.contains("_disposables"));
    assert!(!code.contains("Dispose()"));
}

#[test]
fn async_disposables_are_tracked_too() {
    let mut types = TypeRegistry::new();
    types.insert(
        TypeMeta::new(named("Stream")).with_ctor(CtorMeta::new(vec![])).async_disposable(),
    );

    let setup = SetupModel::new("Composition")
        .root(RootDef::new("Root", Injection::of(named("Stream"))));
    let plan = compose(&setup, &types).unwrap();
    assert!(plan.render().contains("_disposables[_disposeIndex++] = transientStream0;"));
}
