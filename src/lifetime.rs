//! Binding lifetime definitions.

/// Binding lifetimes controlling instance sharing in synthesized code
///
/// Defines how instances of a binding are shared across the generated
/// composition. The engine never creates instances itself; the lifetime
/// decides which kind of variable the planner assigns to a node and which
/// guards the synthesizer wraps around its creation.
///
/// # Sharing characteristics
///
/// - **Singleton**: one instance per composition object, backed by a field
/// - **Scoped**: one instance per scope object, backed by a scope field
/// - **PerResolve**: one instance per root invocation, backed by a local
/// - **PerBlock**: one instance per construction block, deduplicated only
///   within that block
/// - **PerThread**: one instance per thread, backed by thread-local storage
/// - **Transient** / **Binding**: a fresh instance at every use site
///
/// # Examples
///
/// ```rust
/// use forge_di::Lifetime;
///
/// assert!(Lifetime::Singleton.is_shared());
/// assert!(Lifetime::Singleton.needs_field());
/// assert!(Lifetime::Singleton.needs_guard());
///
/// assert!(Lifetime::PerResolve.is_shared());
/// assert!(!Lifetime::PerResolve.needs_field());
///
/// assert!(!Lifetime::Transient.is_shared());
/// assert!(Lifetime::PerThread.needs_field());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifetime {
    /// New instance per use site, never shared
    Transient,
    /// One instance per composition object, cached in a class field
    ///
    /// Creation is guarded by check-then-create, under the composition lock
    /// when the thread-safety hint is enabled.
    Singleton,
    /// One instance per scope object
    ///
    /// Identical to `Singleton` but the backing field lives on the scope
    /// object; a new scope instance resets all scoped fields.
    Scoped,
    /// One instance per single root invocation
    ///
    /// Backed by a local declared at the top of the root method, created on
    /// first use within that invocation.
    PerResolve,
    /// One instance per construction block
    ///
    /// Like `PerResolve` but scoped to the innermost block; a sibling block
    /// gets a fresh instance.
    PerBlock,
    /// One instance per thread, backed by thread-local storage
    PerThread,
    /// Bound to the use site exactly like `Transient`; used for generated
    /// helper bindings (overrides, arguments)
    Binding,
}

impl Lifetime {
    /// Whether one node (and therefore one variable) is shared across the
    /// whole root expansion for this lifetime.
    pub fn is_shared(self) -> bool {
        matches!(
            self,
            Lifetime::Singleton | Lifetime::Scoped | Lifetime::PerResolve | Lifetime::PerThread
        )
    }

    /// Whether the backing variable is a class-level field surviving across
    /// root invocations.
    pub fn needs_field(self) -> bool {
        matches!(self, Lifetime::Singleton | Lifetime::Scoped | Lifetime::PerThread)
    }

    /// Whether first creation needs a check-then-create guard (and a lock
    /// when thread safety is on).
    pub fn needs_guard(self) -> bool {
        matches!(self, Lifetime::Singleton | Lifetime::Scoped)
    }

    /// Prefix used when synthesizing variable and field names.
    pub fn name_prefix(self) -> &'static str {
        match self {
            Lifetime::Transient => "transient",
            Lifetime::Singleton => "singleton",
            Lifetime::Scoped => "scoped",
            Lifetime::PerResolve => "perResolve",
            Lifetime::PerBlock => "perBlock",
            Lifetime::PerThread => "perThread",
            Lifetime::Binding => "binding",
        }
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Lifetime::Transient => "Transient",
            Lifetime::Singleton => "Singleton",
            Lifetime::Scoped => "Scoped",
            Lifetime::PerResolve => "PerResolve",
            Lifetime::PerBlock => "PerBlock",
            Lifetime::PerThread => "PerThread",
            Lifetime::Binding => "Binding",
        };
        write!(f, "{}", name)
    }
}
