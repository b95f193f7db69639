//! Interceptor contract, registry, and per-call pipeline.
//!
//! An [`Interceptor`] is a named, ordered hook that wraps a service
//! method: its `intercept` runs before the body and returns a derived
//! [`Context`] plus an end-callback that runs after the body, observing
//! the method's final error. Interceptors compose by nesting on the
//! call stack: `(order, name)` ascending on entry, LIFO on exit.
//!
//! # Built-in Interceptors
//!
//! - [`TracingInterceptor`] - opens a span per call, records errors
//! - [`LoggingInterceptor`] - records entry/exit, duration, and errors
//!
//! Additional interceptors are user-defined; the contract is closed
//! only by the [`Interceptor`] shape.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use crate::context::Context;
use crate::{Error, Result};

mod builtin;
mod registry;

pub use builtin::{LoggingInterceptor, TracingInterceptor};
pub use registry::Registry;

/// Type alias for a boxed end-callback returned by [`Interceptor::intercept`].
///
/// Invoked after the method body with the method's final error, if any.
/// End-callbacks observe the error; the shared reference keeps them
/// from rewriting it.
pub type EndFn = Box<dyn FnOnce(Option<&Error>) + Send>;

/// A named, ordered hook wrapping service method calls.
///
/// Names are unique process-wide. `order` is the primary sort key,
/// ascending = outermost; ties break on `name` lexicographically.
pub trait Interceptor: Send + Sync {
    /// Returns the unique interceptor name.
    fn name(&self) -> &str;

    /// Returns the sort order; lower runs first on entry, last on exit.
    fn order(&self) -> i32;

    /// Runs before the method body.
    ///
    /// `full_path` is `"{component}.{method}"`. Returns the (possibly
    /// derived) [`Context`] downstream code sees and the end-callback
    /// to run after the body. An interceptor that does not derive the
    /// context returns it unchanged.
    ///
    /// # Errors
    ///
    /// An initialization failure aborts the pipeline: interceptors
    /// after this one do not run, the end-callbacks collected so far
    /// run in LIFO order observing the error, and the method body is
    /// skipped.
    fn intercept(&self, cx: Context, full_path: &str) -> Result<(Context, EndFn)>;
}

/// Selection options for a single [`use_intercept`] call.
///
/// Options accumulate: every `with_only` call intersects with the
/// previous selection, and every `with_exclude` call subtracts more
/// names.
///
/// # Examples
///
/// ```
/// use hyperion_core::intercept::InterceptOptions;
///
/// // Only the tracing interceptor runs.
/// let opts = InterceptOptions::new().with_only(["tracing"]);
///
/// // Everything but logging runs.
/// let opts = InterceptOptions::new().with_exclude(["logging"]);
/// ```
///
/// [`use_intercept`]: crate::context::Context::use_intercept
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct InterceptOptions {
    only: Option<HashSet<String>>,
    exclude: HashSet<String>,
}

impl InterceptOptions {
    /// Creates options selecting every registered interceptor.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only interceptors with the given names.
    ///
    /// Repeated calls intersect.
    pub fn with_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        self.only = Some(match self.only.take() {
            None => names,
            Some(prev) => prev.intersection(&names).cloned().collect(),
        });
        self
    }

    /// Drops interceptors with the given names.
    ///
    /// Repeated calls accumulate.
    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Returns `true` if the named interceptor is selected.
    #[must_use]
    pub fn selects(&self, name: &str) -> bool {
        if let Some(only) = &self.only
            && !only.contains(name)
        {
            return false;
        }

        !self.exclude.contains(name)
    }
}

/// Composed finalizer returned by [`use_intercept`].
///
/// [`finish`] runs the collected end-callbacks in reverse registration
/// order (LIFO), each observing the same error. A panicking
/// end-callback does not prevent later end-callbacks from running; the
/// first panic resumes once all of them ran.
///
/// Dropping an `End` without calling [`finish`] (an early `?` between
/// `use_intercept` and the finish line) runs the end-callbacks with no
/// error as a backstop, so spans still close. Explicit [`finish`] is
/// the documented protocol.
///
/// [`use_intercept`]: crate::context::Context::use_intercept
/// [`finish`]: End::finish
#[must_use = "end-callbacks only observe the method error when `finish` is called"]
pub struct End {
    ends: Vec<EndFn>,
}

impl End {
    /// Runs the collected end-callbacks in LIFO order.
    ///
    /// `err` is the method's final error: pass
    /// `result.as_ref().err()` so every finalizer observes success or
    /// failure after the body executed.
    pub fn finish(mut self, err: Option<&Error>) {
        let ends = std::mem::take(&mut self.ends);
        run_ends(ends, err);
    }
}

impl Drop for End {
    fn drop(&mut self) {
        if self.ends.is_empty() {
            return;
        }

        let ends = std::mem::take(&mut self.ends);
        if std::thread::panicking() {
            // Already unwinding: still run the finalizers, but a panic
            // inside one must not abort the process.
            for end in ends.into_iter().rev() {
                let _ = panic::catch_unwind(AssertUnwindSafe(|| end(None)));
            }
        } else {
            run_ends(ends, None);
        }
    }
}

impl std::fmt::Debug for End {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("End")
            .field("pending", &self.ends.len())
            .finish_non_exhaustive()
    }
}

/// Invokes `ends` in reverse order; the first panic resumes after all ran.
fn run_ends(ends: Vec<EndFn>, err: Option<&Error>) {
    let mut first_panic = None;

    for end in ends.into_iter().rev() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| end(err)))
            && first_panic.is_none()
        {
            first_panic = Some(payload);
        }
    }

    if let Some(payload) = first_panic {
        panic::resume_unwind(payload);
    }
}

/// Walks the registry for one method call.
///
/// Shared implementation behind [`Context::use_intercept`].
///
/// [`Context::use_intercept`]: crate::context::Context::use_intercept
pub(crate) fn run_pipeline(
    cx: &Context,
    component: &str,
    method: &str,
    options: InterceptOptions,
) -> Result<(Context, End)> {
    let full_path = format!("{component}.{method}");

    let selected: Vec<_> = cx
        .registry()
        .freeze()
        .iter()
        .filter(|x| options.selects(x.name()))
        .cloned()
        .collect();

    #[cfg(feature = "tracing")]
    ::tracing::trace!(
        target: crate::TRACING_TARGET_INTERCEPT,
        path = %full_path,
        selected = selected.len(),
        "running interceptor pipeline"
    );

    let mut current = cx.clone();
    let mut ends: Vec<EndFn> = Vec::with_capacity(selected.len());

    for interceptor in selected {
        match interceptor.intercept(current, &full_path) {
            Ok((derived, end)) => {
                current = derived;
                ends.push(end);
            }
            Err(error) => {
                // Finalizers collected so far still unwind, observing
                // the initialization error; the body never runs.
                run_ends(ends, Some(&error));
                return Err(error);
            }
        }
    }

    Ok((current, End { ends }))
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::context::Context;
    use crate::intercept::{EndFn, InterceptOptions, Interceptor, Registry};
    use crate::{Error, ErrorKind, Result};

    /// Records `start:<name>` / `end:<name>[:<err>]` events.
    struct Probe {
        name: &'static str,
        order: i32,
        fail: bool,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Probe {
        fn new(name: &'static str, order: i32, events: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                order,
                fail: false,
                events,
            })
        }

        fn failing(name: &'static str, order: i32, events: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                order,
                fail: true,
                events,
            })
        }
    }

    impl Interceptor for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn intercept(&self, cx: Context, _full_path: &str) -> Result<(Context, EndFn)> {
            self.events.lock().unwrap().push(format!("start:{}", self.name));

            if self.fail {
                return Err(Error::new(
                    ErrorKind::Intercept,
                    format!("{} init failed", self.name),
                ));
            }

            let name = self.name;
            let events = self.events.clone();
            let end: EndFn = Box::new(move |err| {
                let event = match err {
                    Some(e) => format!("end:{name}:{}", e.message()),
                    None => format!("end:{name}"),
                };
                events.lock().unwrap().push(event);
            });

            Ok((cx, end))
        }
    }

    fn harness(probes: Vec<Arc<Probe>>) -> (Context, Arc<Mutex<Vec<String>>>) {
        let events = probes
            .first()
            .map(|p| p.events.clone())
            .unwrap_or_default();
        let registry = Arc::new(Registry::new());
        for probe in probes {
            registry.register(probe);
        }
        let cx = Context::builder().registry(registry).build();
        (cx, events)
    }

    #[test]
    fn entry_ascending_exit_lifo() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (cx, events) = harness(vec![
            Probe::new("tracing", 100, events.clone()),
            Probe::new("logging", 200, events),
        ]);

        let (_cx, end) = cx
            .use_intercept("svc", "method", InterceptOptions::new())
            .unwrap();
        end.finish(None);

        assert_eq!(
            *events.lock().unwrap(),
            ["start:tracing", "start:logging", "end:logging", "end:tracing"]
        );
    }

    #[test]
    fn order_ties_break_on_name() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (cx, events) = harness(vec![
            Probe::new("beta", 50, events.clone()),
            Probe::new("alpha", 50, events),
        ]);

        let (_cx, end) = cx
            .use_intercept("svc", "method", InterceptOptions::new())
            .unwrap();
        end.finish(None);

        assert_eq!(
            *events.lock().unwrap(),
            ["start:alpha", "start:beta", "end:beta", "end:alpha"]
        );
    }

    #[test]
    fn every_end_observes_the_final_error() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (cx, events) = harness(vec![
            Probe::new("tracing", 100, events.clone()),
            Probe::new("logging", 200, events),
        ]);

        let (_cx, end) = cx
            .use_intercept("svc", "method", InterceptOptions::new())
            .unwrap();
        let result: Result<()> = Err(Error::new(ErrorKind::Other, "boom"));
        end.finish(result.as_ref().err());

        assert_eq!(
            *events.lock().unwrap(),
            [
                "start:tracing",
                "start:logging",
                "end:logging:boom",
                "end:tracing:boom"
            ]
        );
    }

    #[test]
    fn with_only_selects() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (cx, events) = harness(vec![
            Probe::new("tracing", 100, events.clone()),
            Probe::new("logging", 200, events),
        ]);

        let (_cx, end) = cx
            .use_intercept("svc", "m", InterceptOptions::new().with_only(["tracing"]))
            .unwrap();
        end.finish(None);

        assert_eq!(*events.lock().unwrap(), ["start:tracing", "end:tracing"]);
    }

    #[test]
    fn with_exclude_subtracts() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (cx, events) = harness(vec![
            Probe::new("tracing", 100, events.clone()),
            Probe::new("logging", 200, events),
        ]);

        let (_cx, end) = cx
            .use_intercept("svc", "m", InterceptOptions::new().with_exclude(["tracing"]))
            .unwrap();
        end.finish(None);

        assert_eq!(*events.lock().unwrap(), ["start:logging", "end:logging"]);
    }

    #[test]
    fn options_accumulate() {
        let opts = InterceptOptions::new()
            .with_only(["a", "b"])
            .with_only(["b", "c"]);
        assert!(opts.selects("b"));
        assert!(!opts.selects("a"));
        assert!(!opts.selects("c"));

        let opts = InterceptOptions::new()
            .with_exclude(["a"])
            .with_exclude(["b"]);
        assert!(!opts.selects("a"));
        assert!(!opts.selects("b"));
        assert!(opts.selects("c"));

        // Exclusion wins over inclusion.
        let opts = InterceptOptions::new()
            .with_only(["a", "b"])
            .with_exclude(["a"]);
        assert!(!opts.selects("a"));
        assert!(opts.selects("b"));
    }

    #[test]
    fn init_failure_unwinds_collected_ends() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (cx, events) = harness(vec![
            Probe::new("first", 10, events.clone()),
            Probe::failing("second", 20, events.clone()),
            Probe::new("third", 30, events),
        ]);

        let err = cx
            .use_intercept("svc", "m", InterceptOptions::new())
            .map(drop)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Intercept);
        assert_eq!(
            *events.lock().unwrap(),
            ["start:first", "start:second", "end:first:second init failed"]
        );
    }

    #[test]
    fn panicking_end_does_not_block_later_ends() {
        struct Panicking;

        impl Interceptor for Panicking {
            fn name(&self) -> &str {
                "panicking"
            }

            fn order(&self) -> i32 {
                100
            }

            fn intercept(&self, cx: Context, _full_path: &str) -> Result<(Context, EndFn)> {
                Ok((cx, Box::new(|_| panic!("end blew up"))))
            }
        }

        struct Counting {
            ran: Arc<AtomicUsize>,
        }

        impl Interceptor for Counting {
            fn name(&self) -> &str {
                "counting"
            }

            fn order(&self) -> i32 {
                50
            }

            fn intercept(&self, cx: Context, _full_path: &str) -> Result<(Context, EndFn)> {
                let ran = self.ran.clone();
                Ok((
                    cx,
                    Box::new(move |_| {
                        ran.fetch_add(1, Ordering::SeqCst);
                    }),
                ))
            }
        }

        let ran = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(Registry::new());
        registry.register(Arc::new(Panicking));
        registry.register(Arc::new(Counting { ran: ran.clone() }));
        let cx = Context::builder().registry(registry).build();

        let (_cx, end) = cx.use_intercept("svc", "m", InterceptOptions::new()).unwrap();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| end.finish(None)));

        // The panic from the inner end resurfaces, but the outer
        // (order 50) end still ran.
        assert!(outcome.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_end_is_a_backstop() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (cx, events) = harness(vec![Probe::new("tracing", 100, events)]);

        let (_cx, end) = cx.use_intercept("svc", "m", InterceptOptions::new()).unwrap();
        drop(end);

        assert_eq!(*events.lock().unwrap(), ["start:tracing", "end:tracing"]);
    }

    #[test]
    #[should_panic(expected = "already been registered")]
    fn duplicate_registration_panics() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let registry = Registry::new();
        registry.register(Probe::new("dup", 1, events.clone()));
        registry.register(Probe::new("dup", 2, events));
    }

    #[test]
    #[should_panic(expected = "after the registry was frozen")]
    fn registration_after_freeze_panics() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let registry = Registry::new();
        registry.register(Probe::new("early", 1, events.clone()));
        let _ = registry.freeze();
        registry.register(Probe::new("late", 2, events));
    }

    #[test]
    fn freeze_is_stable() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let registry = Registry::new();
        registry.register(Probe::new("b", 2, events.clone()));
        registry.register(Probe::new("a", 1, events));

        let first: Vec<_> = registry.freeze().iter().map(|x| x.name().to_owned()).collect();
        let second: Vec<_> = registry.freeze().iter().map(|x| x.name().to_owned()).collect();
        assert_eq!(first, ["a", "b"]);
        assert_eq!(first, second);
        assert!(registry.is_frozen());
    }

    #[test]
    fn empty_registry_runs_the_body_bare() {
        let cx = Context::builder()
            .registry(Arc::new(Registry::new()))
            .build();

        let (_cx, end) = cx.use_intercept("svc", "m", InterceptOptions::new()).unwrap();
        end.finish(None);
    }
}
