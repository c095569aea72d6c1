use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quarry_core::error::QuarryError;
use quarry_core::types::{Dependencies, Value};
use quarry_graph::{factory, Factory, Registry};
use tokio_util::sync::CancellationToken;

/// Counts factory invocations across a whole graph.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// A factory that bumps the counter and returns the new count.
    pub fn factory<P: 'static>(&self) -> Factory<P> {
        let count = self.0.clone();
        factory(move |_, _, _| {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(Value::new(n)) }
        })
    }
}

/// A factory that always succeeds with `0usize`.
pub fn factory_ok<P: 'static>() -> Factory<P> {
    factory(|_, _, _| async { Ok(Value::new(0usize)) })
}

/// A factory that always fails with `some-error`.
pub fn factory_error<P: 'static>() -> Factory<P> {
    factory(|_, _, _| async { Err(QuarryError::execution("some-error")) })
}

/// Wrap `base` so it fails unless it receives exactly `names` as
/// dependencies.
pub fn with_deps<P: Send + Sync + 'static>(base: Factory<P>, names: &[&str]) -> Factory<P> {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    factory(move |cancel: CancellationToken, params: Arc<P>, deps: Dependencies| {
        let checked = check_deps(&names, deps.names());
        let next = base(cancel, params, deps);
        async move {
            checked?;
            next.await
        }
    })
}

/// Like `with_deps`, but only counts dependencies that carry a value.
pub fn with_resolved_deps<P: Send + Sync + 'static>(
    base: Factory<P>,
    names: &[&str],
) -> Factory<P> {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    factory(move |cancel: CancellationToken, params: Arc<P>, deps: Dependencies| {
        let resolved = deps.names().filter(|name| deps.value(name).is_some());
        let checked = check_deps(&names, resolved);
        let next = base(cancel, params, deps);
        async move {
            checked?;
            next.await
        }
    })
}

fn check_deps<'a>(
    names: &[String],
    got: impl Iterator<Item = &'a str>,
) -> Result<(), QuarryError> {
    let mut got: Vec<&str> = got.collect();
    got.sort_unstable();
    let mut want: Vec<&str> = names.iter().map(String::as_str).collect();
    want.sort_unstable();
    if got != want {
        return Err(QuarryError::execution(format!(
            "deps mismatch: want {want:?}, got {got:?}"
        )));
    }
    Ok(())
}

/// Ten factories reachable from `root`, with `h` shared by `root`'s subtree
/// and the unrelated `j`:
///
/// ```text
/// root -> a -> c -> d -> e
///              c -> f
/// root -> b -> g -> h -> i
///                   j -> h
/// ```
///
/// Returns the number of factories `root` reaches alongside the registry.
pub fn simple_graph<P: Send + Sync + 'static>(base: Option<Factory<P>>) -> (usize, Registry<P>) {
    let base = base.unwrap_or_else(factory_ok);
    let graph: [(&str, &[&str]); 11] = [
        ("root", &["a", "b"]),
        ("a", &["c"]),
        ("b", &["g"]),
        ("c", &["d", "f"]),
        ("d", &["e"]),
        ("e", &[]),
        ("f", &[]),
        ("g", &["h"]),
        ("h", &["i"]),
        ("i", &[]),
        ("j", &["h"]),
    ];
    let mut q = Registry::new();
    for (name, deps) in graph {
        q.must_add_factory(name, with_deps(base.clone(), deps));
        for dep in deps {
            q.must_add_dependency(name, *dep);
        }
    }
    (10, q)
}

/// `top` depends on `left` and `right`, which both depend on `bottom`.
///
/// Returns the number of distinct factories (4) alongside the registry.
pub fn diamond_graph<P: Send + Sync + 'static>(base: Option<Factory<P>>) -> (usize, Registry<P>) {
    let base = base.unwrap_or_else(factory_ok);
    let graph: [(&str, &[&str]); 4] = [
        ("top", &["left", "right"]),
        ("left", &["bottom"]),
        ("right", &["bottom"]),
        ("bottom", &[]),
    ];
    let mut q = Registry::new();
    for (name, deps) in graph {
        q.must_add_factory(name, with_deps(base.clone(), deps));
        for dep in deps {
            q.must_add_dependency(name, *dep);
        }
    }
    (4, q)
}
