use std::sync::{Arc, LazyLock, Mutex, OnceLock};

use crate::intercept::Interceptor;

/// Process-wide default [`Registry`].
static GLOBAL: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

/// Ordered set of registered [`Interceptor`]s.
///
/// Interceptors are registered at process start and the set is frozen
/// before the first pipeline walk; after that the registry is
/// immutable. Registration after freezing is a programming error.
///
/// The definitive interceptor order is ascending [`Interceptor::order`],
/// ties broken by [`Interceptor::name`] lexicographically.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use hyperion_core::intercept::{
///     Interceptor as _, LoggingInterceptor, Registry, TracingInterceptor,
/// };
///
/// let registry = Registry::new();
/// registry.register(Arc::new(TracingInterceptor::new()));
/// registry.register(Arc::new(LoggingInterceptor::new()));
///
/// let names: Vec<_> = registry.freeze().iter().map(|i| i.name().to_owned()).collect();
/// assert_eq!(names, ["tracing", "logging"]);
/// ```
#[must_use]
#[derive(Default)]
pub struct Registry {
    pending: Mutex<Vec<Arc<dyn Interceptor>>>,
    frozen: OnceLock<Vec<Arc<dyn Interceptor>>>,
}

impl Registry {
    /// Creates an empty [`Registry`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide default registry.
    ///
    /// Contexts built without an explicit registry resolve against this
    /// one.
    pub fn global() -> Arc<Self> {
        GLOBAL.clone()
    }

    /// Registers an interceptor.
    ///
    /// # Panics
    ///
    /// Panics if the registry has been frozen (the first pipeline walk
    /// freezes it), or if an interceptor with the same name has already
    /// been registered.
    pub fn register(&self, interceptor: Arc<dyn Interceptor>) {
        let mut pending = self.pending.lock().expect("Registry mutex poisoned");

        if self.frozen.get().is_some() {
            panic!(
                "interceptor '{}' registered after the registry was frozen. \
                 Register all interceptors at process start, before the first \
                 use_intercept call.",
                interceptor.name()
            );
        }

        if pending.iter().any(|x| x.name() == interceptor.name()) {
            panic!(
                "interceptor conflict: '{}' has already been registered. \
                 Interceptor names are unique process-wide.",
                interceptor.name()
            );
        }

        pending.push(interceptor);
    }

    /// Freezes the registry and returns the ordered interceptor set.
    ///
    /// The first call sorts by `(order, name)` and makes the set
    /// immutable; later calls return the same snapshot.
    pub fn freeze(&self) -> &[Arc<dyn Interceptor>] {
        self.frozen.get_or_init(|| {
            let mut pending = self.pending.lock().expect("Registry mutex poisoned");
            let mut entries = std::mem::take(&mut *pending);
            entries.sort_by(|a, b| {
                a.order()
                    .cmp(&b.order())
                    .then_with(|| a.name().cmp(b.name()))
            });

            #[cfg(feature = "tracing")]
            tracing::debug!(
                target: crate::TRACING_TARGET_INTERCEPT,
                count = entries.len(),
                "interceptor registry frozen"
            );

            entries
        })
    }

    /// Returns `true` once the registry has been frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.get().is_some()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("frozen", &self.is_frozen())
            .finish_non_exhaustive()
    }
}
