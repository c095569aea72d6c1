use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use quarry_core::config::ResolverConfig;
use quarry_core::error::{QuarryError, Result};
use quarry_core::event::{EventBus, ResolveEvent};
use quarry_core::types::Value;

use crate::registry::Registry;
use crate::session::Session;

/// A frozen registry that resolves named values.
///
/// Cloning is cheap; every clone shares the same graph. Each `get` call runs
/// in its own session, so nothing memoized in one request leaks into another
/// (apart from values cached by [`crate::singleton`] factories).
pub struct Quarry<P> {
    registry: Arc<Registry<P>>,
    events: Option<Arc<EventBus>>,
    deadline: Option<Duration>,
}

impl<P> Clone for Quarry<P> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            events: self.events.clone(),
            deadline: self.deadline,
        }
    }
}

impl<P> Registry<P> {
    /// Freeze the registry. No factories or edges can be added afterwards.
    pub fn into_quarry(self) -> Quarry<P> {
        Quarry {
            registry: Arc::new(self),
            events: None,
            deadline: None,
        }
    }
}

impl<P> Quarry<P> {
    /// Publish resolution events to `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Bound every `get` call by `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Apply resolver settings: the default deadline and an event bus sized
    /// by `event_capacity`.
    pub fn with_config(mut self, config: &ResolverConfig) -> Self {
        self.deadline = config.deadline();
        self.events = Some(Arc::new(EventBus::new(config.event_capacity)));
        self
    }

    pub fn events(&self) -> Option<&Arc<EventBus>> {
        self.events.as_ref()
    }

    pub fn registry(&self) -> &Registry<P> {
        &self.registry
    }
}

impl<P> Quarry<P>
where
    P: Send + Sync + 'static,
{
    /// Resolve `name` and everything it depends on.
    ///
    /// Fails with the first error encountered. A token that is already
    /// cancelled fails immediately without running any factory.
    pub async fn get(
        &self,
        cancel: &CancellationToken,
        params: impl Into<Arc<P>>,
        name: &str,
    ) -> Result<Value> {
        let deadline = self.deadline.map(|d| Instant::now() + d);
        self.run(cancel, params.into(), name, deadline).await
    }

    /// Like `get`, but gives up with `DeadlineExceeded` at `deadline`.
    ///
    /// Expiry cancels the session without preempting factories that are
    /// already running; they finish in the background and their results are
    /// discarded.
    pub async fn get_with_deadline(
        &self,
        cancel: &CancellationToken,
        params: impl Into<Arc<P>>,
        name: &str,
        deadline: Instant,
    ) -> Result<Value> {
        self.run(cancel, params.into(), name, Some(deadline)).await
    }

    /// Resolve `name` and downcast it to `T`.
    pub async fn get_as<T: Any + Send + Sync>(
        &self,
        cancel: &CancellationToken,
        params: impl Into<Arc<P>>,
        name: &str,
    ) -> Result<Arc<T>> {
        self.get(cancel, params, name).await?.downcast_named(name)
    }

    /// Panics if `get` fails.
    pub async fn must_get(
        &self,
        cancel: &CancellationToken,
        params: impl Into<Arc<P>>,
        name: &str,
    ) -> Value {
        match self.get(cancel, params, name).await {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        params: Arc<P>,
        name: &str,
        deadline: Option<Instant>,
    ) -> Result<Value> {
        if cancel.is_cancelled() {
            return Err(QuarryError::Cancelled);
        }
        if deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(QuarryError::DeadlineExceeded);
        }

        let session = Session::new(
            self.registry.clone(),
            params,
            cancel.child_token(),
            self.events.clone(),
        );
        debug!(session_id = %session.id(), name, "Resolving");
        session.publish(ResolveEvent::SessionStarted {
            session_id: session.id().clone(),
            name: name.to_string(),
        });

        // The root runs in its own task like every branch, so an expired
        // deadline detaches it instead of dropping a running factory.
        let resolution = tokio::spawn(session.get_once(None, name));
        let joined = match deadline {
            None => Ok(resolution.await),
            Some(deadline) => tokio::time::timeout_at(deadline, resolution).await,
        };
        let result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                session.cancel();
                Err(QuarryError::Panicked(name.to_string()))
            }
            Err(_) => {
                session.cancel();
                Err(QuarryError::DeadlineExceeded)
            }
        };

        match &result {
            Ok(_) => debug!(session_id = %session.id(), name, "Resolved"),
            Err(e) => warn!(session_id = %session.id(), name, error = %e, "Resolution failed"),
        }
        session.publish(ResolveEvent::SessionFinished {
            session_id: session.id().clone(),
            name: name.to_string(),
            succeeded: result.is_ok(),
        });
        result
    }
}

impl<P> std::fmt::Debug for Quarry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quarry")
            .field("registry", &self.registry)
            .field("deadline", &self.deadline)
            .field("events", &self.events.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{condition, factory, provider, singleton, Factory};
    use quarry_core::types::Dependencies;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn factory_ok<P: 'static>() -> Factory<P> {
        factory(|_, _, _| async { Ok(Value::new("ok")) })
    }

    fn factory_err<P: 'static>(message: &'static str) -> Factory<P> {
        factory(move |_, _, _| async move { Err(QuarryError::execution(message)) })
    }

    fn counting<P: 'static>(count: &Arc<AtomicUsize>) -> Factory<P> {
        let count = count.clone();
        factory(move |_, _, _| {
            count.fetch_add(1, Ordering::SeqCst);
            async { Ok(Value::new("ok")) }
        })
    }

    fn sleeping<P: 'static>(ms: u64) -> Factory<P> {
        factory(move |_, _, _| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(Value::new("slept"))
        })
    }

    /// root -> {a, b}, a -> c, c -> {d, f}, d -> e, b -> g, g -> h, h -> i,
    /// plus an unrelated j -> h.
    fn diamond(count: &Arc<AtomicUsize>) -> Registry<()> {
        let mut q = Registry::new();
        for name in ["root", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j"] {
            q.must_add_factory(name, counting(count));
        }
        for (parent, child) in [
            ("root", "a"),
            ("a", "c"),
            ("c", "d"),
            ("c", "f"),
            ("d", "e"),
            ("root", "b"),
            ("b", "g"),
            ("g", "h"),
            ("h", "i"),
            ("j", "h"),
        ] {
            q.must_add_dependency(parent, child);
        }
        q
    }

    #[tokio::test]
    async fn test_get_returns_value() {
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("root", factory_ok());
        q.must_add_factory("a", factory_ok());
        q.must_add_dependency("root", "a");
        let q = q.into_quarry();

        let value = q.get(&CancellationToken::new(), (), "root").await.unwrap();
        assert_eq!(*value.downcast::<&str>().unwrap(), "ok");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_diamond_runs_each_factory_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let q = diamond(&count).into_quarry();

        q.get(&CancellationToken::new(), (), "root").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_dependencies_resolved_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut q: Registry<()> = Registry::new();
        for name in ["root", "a", "b", "c", "d", "e", "f"] {
            q.must_add_factory(name, counting(&count));
        }
        for (parent, child) in [
            ("root", "a"),
            ("root", "e"),
            ("e", "f"),
            ("e", "d"),
            ("a", "b"),
            ("a", "c"),
            ("b", "c"),
            ("c", "d"),
        ] {
            q.must_add_dependency(parent, child);
        }
        let q = q.into_quarry();

        q.get(&CancellationToken::new(), (), "root").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_each_get_is_a_new_session() {
        let count = Arc::new(AtomicUsize::new(0));
        let q = diamond(&count).into_quarry();
        let cancel = CancellationToken::new();

        q.get(&cancel, (), "root").await.unwrap();
        q.get(&cancel, (), "root").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 20);
    }

    fn conditional_graph(count: &Arc<AtomicUsize>, seen: &Arc<AtomicUsize>) -> Quarry<bool> {
        let mut q: Registry<bool> = Registry::new();
        let root_count = count.clone();
        let seen = seen.clone();
        q.must_add_factory(
            "root",
            factory(move |_, _, deps: Dependencies| {
                root_count.fetch_add(1, Ordering::SeqCst);
                assert!(deps.contains("a"));
                if deps.value("a").is_some() {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
                async { Ok(Value::unit()) }
            }),
        );
        q.must_add_factory("a", counting(count));
        q.must_add_factory("b", counting(count));
        q.must_add_factory("c", counting(count));
        q.must_add_dependency_when("root", "a", [condition(|p: &bool| *p)]);
        q.must_add_dependency("a", "b");
        q.must_add_dependency("b", "c");
        q.into_quarry()
    }

    #[tokio::test]
    async fn test_failed_condition_skips_subtree() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(AtomicUsize::new(0));
        let q = conditional_graph(&count, &seen);

        q.get(&CancellationToken::new(), false, "root").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_met_condition_resolves_subtree() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(AtomicUsize::new(0));
        let q = conditional_graph(&count, &seen);

        q.get(&CancellationToken::new(), true, "root").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_top_level_factory() {
        let q: Quarry<()> = Registry::new().into_quarry();

        let err = q.get(&CancellationToken::new(), (), "root").await.unwrap_err();
        assert!(matches!(err, QuarryError::FactoryNotFound(ref name) if name == "root"));
    }

    #[tokio::test]
    async fn test_missing_dependency_names_parent() {
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("root", factory_ok());
        q.must_add_dependency("root", "doesnt-exist");
        let q = q.into_quarry();

        let err = q.get(&CancellationToken::new(), (), "root").await.unwrap_err();
        assert!(err.is_not_found());
        let msg = err.to_string();
        assert!(msg.contains("root"));
        assert!(msg.contains("doesnt-exist"));
    }

    #[tokio::test]
    async fn test_cancelled_token_runs_nothing() {
        let count = Arc::new(AtomicUsize::new(0));
        let q = diamond(&count).into_quarry();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = q.get(&cancel, (), "root").await.unwrap_err();
        assert!(matches!(err, QuarryError::Cancelled));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_resolution_fails() {
        let cancel = CancellationToken::new();
        let mut q: Registry<()> = Registry::new();
        let trigger = cancel.clone();
        q.must_add_factory("root", factory_ok());
        q.must_add_factory("a", factory_ok());
        q.must_add_factory(
            "b",
            factory(move |_, _, _| {
                trigger.cancel();
                async { Ok(Value::unit()) }
            }),
        );
        q.must_add_factory("c", factory_ok());
        q.must_add_dependency("root", "a");
        q.must_add_dependency("a", "b");
        q.must_add_dependency("b", "c");
        let q = q.into_quarry();

        let err = q.get(&cancel, (), "root").await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sibling_failure_fails_request() {
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("root", factory_ok());
        q.must_add_factory("slow", sleeping(50));
        q.must_add_factory("broken", factory_err("storage offline"));
        q.must_add_dependency("root", "slow");
        q.must_add_dependency("root", "broken");
        let q = q.into_quarry();

        let err = q.get(&CancellationToken::new(), (), "root").await.unwrap_err();
        assert_eq!(err.to_string(), "storage offline");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_real_failure_outranks_sibling_cancellation() {
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("root", factory_ok());
        q.must_add_factory("deep", factory_ok());
        q.must_add_factory("quick", sleeping(30));
        q.must_add_factory(
            "leaf",
            factory(|_, _, _| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(QuarryError::execution("storage offline"))
            }),
        );
        q.must_add_factory("slowleaf", sleeping(150));
        q.must_add_dependency("root", "deep");
        q.must_add_dependency("root", "quick");
        q.must_add_dependency("deep", "leaf");
        q.must_add_dependency("deep", "slowleaf");
        let q = q.into_quarry();

        // `quick` reports a cancellation to `root` long before `deep` reports
        // the leaf's failure.
        let err = q.get(&CancellationToken::new(), (), "root").await.unwrap_err();
        assert!(matches!(err, QuarryError::Execution(_)));
        assert_eq!(err.to_string(), "storage offline");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_running_factory_completes_after_cancel() {
        let finished = Arc::new(AtomicBool::new(false));
        let done = finished.clone();
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("root", factory_ok());
        q.must_add_factory(
            "slow",
            factory(move |_, _, _| {
                let done = done.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    done.store(true, Ordering::SeqCst);
                    Ok(Value::new("slow"))
                }
            }),
        );
        q.must_add_factory(
            "broken",
            factory(|_, _, _| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(QuarryError::execution("storage offline"))
            }),
        );
        q.must_add_dependency("root", "slow");
        q.must_add_dependency("root", "broken");
        let q = q.into_quarry().with_events(bus);

        let err = q.get(&CancellationToken::new(), (), "root").await.unwrap_err();
        assert_eq!(err.to_string(), "storage offline");
        assert!(finished.load(Ordering::SeqCst));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events.iter().any(
            |e| matches!(e, ResolveEvent::FactoryStarted { name, .. } if name == "slow")
        ));
        assert!(!events.iter().any(
            |e| matches!(e, ResolveEvent::FactoryFinished { name, .. } if name == "slow")
        ));
    }

    #[tokio::test]
    async fn test_factory_error_is_verbatim() {
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("root", factory_err("bad request"));
        let q = q.into_quarry();

        let err = q.get(&CancellationToken::new(), (), "root").await.unwrap_err();
        assert!(matches!(err, QuarryError::Execution(_)));
        assert_eq!(err.to_string(), "bad request");
    }

    #[tokio::test]
    async fn test_panicking_factory_is_reported() {
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("root", factory_ok());
        q.must_add_factory(
            "explodes",
            factory(|_, _, _| async {
                let explode = true;
                if explode {
                    panic!("kaboom");
                }
                Ok(Value::unit())
            }),
        );
        q.must_add_dependency("root", "explodes");
        let q = q.into_quarry();

        let err = q.get(&CancellationToken::new(), (), "root").await.unwrap_err();
        assert!(matches!(err, QuarryError::Panicked(ref name) if name == "explodes"));
    }

    #[tokio::test]
    async fn test_params_are_shared_by_the_tree() {
        let params = Arc::new(7i64);
        let count = Arc::new(AtomicUsize::new(0));
        let mut q: Registry<i64> = Registry::new();
        for name in ["root", "a", "b", "c"] {
            let expected = params.clone();
            let count = count.clone();
            q.must_add_factory(
                name,
                factory(move |_, params: Arc<i64>, _| {
                    count.fetch_add(1, Ordering::SeqCst);
                    assert!(Arc::ptr_eq(&expected, &params));
                    async move { Ok(Value::from_arc(params)) }
                }),
            );
        }
        q.must_add_dependency("root", "a");
        q.must_add_dependency("a", "b");
        q.must_add_dependency("b", "c");
        let q = q.into_quarry();

        let value = q
            .get_as::<i64>(&CancellationToken::new(), params.clone(), "root")
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&value, &params));
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_dependencies_hold_declared_children() {
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory(
            "sum",
            factory(|_, _, deps: Dependencies| async move {
                assert_eq!(deps.len(), 2);
                let left = deps.get::<u32>("left")?;
                let right = deps.get::<u32>("right")?;
                Ok(Value::new(*left + *right))
            }),
        );
        q.must_add_factory("left", provider(2u32));
        q.must_add_factory("right", provider(40u32));
        q.must_add_factory("unused", provider(1u32));
        q.must_add_dependency("sum", "left");
        q.must_add_dependency("sum", "right");
        let q = q.into_quarry();

        let sum = q
            .get_as::<u32>(&CancellationToken::new(), (), "sum")
            .await
            .unwrap();
        assert_eq!(*sum, 42);
    }

    #[tokio::test]
    async fn test_get_as_type_mismatch() {
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("name", provider("quarry".to_string()));
        let q = q.into_quarry();

        let err = q
            .get_as::<u64>(&CancellationToken::new(), (), "name")
            .await
            .unwrap_err();
        assert!(matches!(err, QuarryError::TypeMismatch { ref name, .. } if name == "name"));
    }

    #[tokio::test]
    async fn test_singleton_shared_across_sessions() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory(
            "service",
            singleton(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Ok(Value::new("service")) }
            }),
        );
        q.must_add_factory("root", factory_ok());
        q.must_add_dependency("root", "service");
        let q = q.into_quarry();

        let cancel = CancellationToken::new();
        q.get(&cancel, (), "root").await.unwrap();
        q.get(&cancel, (), "root").await.unwrap();
        q.get(&cancel, (), "service").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_singleton_error_shared_across_sessions() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory(
            "conn",
            singleton(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Err(QuarryError::execution("dial failed")) }
            }),
        );
        let q = q.into_quarry();

        let cancel = CancellationToken::new();
        for _ in 0..2 {
            let err = q.get(&cancel, (), "conn").await.unwrap_err();
            assert_eq!(err.to_string(), "dial failed");
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("root", factory_ok());
        q.must_add_factory("slow", sleeping(500));
        q.must_add_dependency("root", "slow");
        let q = q.into_quarry().with_deadline(Duration::from_millis(20));

        let err = q.get(&CancellationToken::new(), (), "root").await.unwrap_err();
        assert!(matches!(err, QuarryError::DeadlineExceeded));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deadline_does_not_preempt_root_factory() {
        let finished = Arc::new(AtomicBool::new(false));
        let done = finished.clone();
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory(
            "root",
            factory(move |_, _, _| {
                let done = done.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(60)).await;
                    done.store(true, Ordering::SeqCst);
                    Ok(Value::unit())
                }
            }),
        );
        let q = q.into_quarry().with_deadline(Duration::from_millis(10));

        let err = q.get(&CancellationToken::new(), (), "root").await.unwrap_err();
        assert!(matches!(err, QuarryError::DeadlineExceeded));
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_past_deadline_runs_nothing() {
        let count = Arc::new(AtomicUsize::new(0));
        let q = diamond(&count).into_quarry();

        let err = q
            .get_with_deadline(&CancellationToken::new(), (), "root", Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, QuarryError::DeadlineExceeded));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deadline_from_config() {
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("slow", sleeping(500));
        let config = ResolverConfig {
            deadline_ms: Some(10),
            event_capacity: 8,
        };
        let q = q.into_quarry().with_config(&config);
        assert!(q.events().is_some());

        let err = q.get(&CancellationToken::new(), (), "slow").await.unwrap_err();
        assert!(matches!(err, QuarryError::DeadlineExceeded));
    }

    #[tokio::test]
    #[should_panic(expected = "does not exist")]
    async fn test_must_get_panics_on_error() {
        let q: Quarry<()> = Registry::new().into_quarry();
        q.must_get(&CancellationToken::new(), (), "root").await;
    }

    #[tokio::test]
    async fn test_events_describe_session() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(AtomicUsize::new(0));
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let q = conditional_graph(&count, &seen).with_events(bus);

        q.get(&CancellationToken::new(), false, "root").await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(ResolveEvent::SessionStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(ResolveEvent::SessionFinished { succeeded: true, .. })
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            ResolveEvent::DependencySkipped { parent, child, .. } if parent == "root" && child == "a"
        )));
        let finished = events
            .iter()
            .filter(|e| matches!(e, ResolveEvent::FactoryFinished { .. }))
            .count();
        assert_eq!(finished, 1);
        let session_id = events[0].session_id().clone();
        assert!(events.iter().all(|e| e.session_id() == &session_id));
    }

    #[tokio::test]
    async fn test_failure_event_published() {
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let mut q: Registry<()> = Registry::new();
        q.must_add_factory("root", factory_err("nope"));
        let q = q.into_quarry().with_events(bus);

        q.get(&CancellationToken::new(), (), "root").await.unwrap_err();

        let mut failed = None;
        while let Ok(event) = rx.try_recv() {
            if let ResolveEvent::FactoryFailed { name, error, .. } = event {
                failed = Some((name, error));
            }
        }
        assert_eq!(failed, Some(("root".to_string(), "nope".to_string())));
    }
}
