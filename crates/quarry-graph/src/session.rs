use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use quarry_core::error::{QuarryError, Result};
use quarry_core::event::{EventBus, ResolveEvent};
use quarry_core::types::{Dependencies, SessionId, Value};

use crate::condition::{check_conditions, Condition};
use crate::registry::{EdgeMap, Registry};

/// Shared outcome of one name within one session.
type Delegate = Arc<OnceCell<Result<Value>>>;

/// State of a single top-level request.
///
/// Every name is resolved at most once per session; concurrent requests for
/// the same name wait on the same delegate. The first failure cancels the
/// session token, which all other branches observe.
pub(crate) struct Session<P> {
    id: SessionId,
    registry: Arc<Registry<P>>,
    params: Arc<P>,
    cancel: CancellationToken,
    delegates: Mutex<HashMap<String, Delegate>>,
    events: Option<Arc<EventBus>>,
}

impl<P> Session<P>
where
    P: Send + Sync + 'static,
{
    pub(crate) fn new(
        registry: Arc<Registry<P>>,
        params: Arc<P>,
        cancel: CancellationToken,
        events: Option<Arc<EventBus>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::new(),
            registry,
            params,
            cancel,
            delegates: Mutex::new(HashMap::new()),
            events,
        })
    }

    pub(crate) fn id(&self) -> &SessionId {
        &self.id
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn publish(&self, event: ResolveEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    /// Resolve `name` through its run-once delegate.
    ///
    /// The delegate table lock is held only to look up or create the
    /// delegate, never while it runs.
    pub(crate) fn get_once(
        self: &Arc<Self>,
        parent: Option<&str>,
        name: &str,
    ) -> BoxFuture<'static, Result<Value>> {
        let delegate = {
            let mut delegates = self
                .delegates
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            delegates.entry(name.to_string()).or_default().clone()
        };
        let session = self.clone();
        let parent = parent.map(str::to_string);
        let name = name.to_string();
        Box::pin(async move {
            delegate
                .get_or_init(|| session.resolve(parent, name))
                .await
                .clone()
        })
    }

    async fn resolve(self: &Arc<Self>, parent: Option<String>, name: String) -> Result<Value> {
        let Some(factory) = self.registry.factories.get(&name).cloned() else {
            let err = match parent {
                Some(parent) => QuarryError::DependencyNotFound {
                    name: name.clone(),
                    parent,
                },
                None => QuarryError::FactoryNotFound(name.clone()),
            };
            return Err(self.fail(&name, err));
        };

        let deps = match self.registry.adjacency.get(&name) {
            Some(edges) => self.resolve_dependencies(&name, edges).await.map_err(|e| {
                self.cancel();
                e
            })?,
            None => Dependencies::new(),
        };

        debug!(session_id = %self.id, factory = %name, "Running factory");
        self.publish(ResolveEvent::FactoryStarted {
            session_id: self.id.clone(),
            name: name.clone(),
        });
        let started = Instant::now();

        let cancel = self.cancel.clone();
        let params = self.params.clone();
        let outcome = AssertUnwindSafe(async move { factory(cancel, params, deps).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(QuarryError::Panicked(name.clone())));

        let value = match outcome {
            Ok(value) => value,
            Err(e) => return Err(self.fail(&name, e)),
        };

        // A sibling may have failed while this factory ran.
        if self.cancel.is_cancelled() {
            debug!(session_id = %self.id, factory = %name, "Discarding result of cancelled session");
            return Err(QuarryError::Cancelled);
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(session_id = %self.id, factory = %name, elapsed_ms, "Factory complete");
        self.publish(ResolveEvent::FactoryFinished {
            session_id: self.id.clone(),
            name,
            elapsed_ms,
        });
        Ok(value)
    }

    /// Resolve every dependency edge of `parent` in its own task and wait for
    /// all of them. The first real failure observed is returned; a
    /// cancellation is returned only when no branch failed otherwise.
    async fn resolve_dependencies(
        self: &Arc<Self>,
        parent: &str,
        edges: &EdgeMap<P>,
    ) -> Result<Dependencies> {
        let mut branches: FuturesUnordered<_> = edges
            .iter()
            .map(|(child, conditions)| {
                let session = self.clone();
                let parent = parent.to_string();
                let child = child.clone();
                let conditions = conditions.clone();
                tokio::spawn(async move {
                    let outcome =
                        AssertUnwindSafe(session.resolve_branch(&parent, &child, &conditions))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|_| Err(QuarryError::Panicked(child.clone())));
                    (child, outcome)
                })
            })
            .collect();

        let mut deps = Dependencies::new();
        let mut first_err: Option<QuarryError> = None;
        while let Some(joined) = branches.next().await {
            let err = match joined {
                Ok((child, Ok(value))) => {
                    deps.insert(child, value);
                    continue;
                }
                Ok((_, Err(e))) => e,
                Err(_) => QuarryError::Cancelled,
            };
            self.cancel();
            // A cancellation reported by a sibling is only a symptom; the
            // failure that caused it replaces it when it arrives.
            match &first_err {
                None => first_err = Some(err),
                Some(prev) if prev.is_cancellation() && !err.is_cancellation() => {
                    first_err = Some(err)
                }
                Some(_) => {}
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(deps),
        }
    }

    /// One dependency edge. `Ok(None)` means its conditions were not met and
    /// nothing below it ran.
    async fn resolve_branch(
        self: &Arc<Self>,
        parent: &str,
        child: &str,
        conditions: &[Condition<P>],
    ) -> Result<Option<Value>> {
        if self.cancel.is_cancelled() {
            return Err(QuarryError::Cancelled);
        }
        if !check_conditions(self.params.as_ref(), conditions) {
            debug!(session_id = %self.id, parent, child, "Dependency conditions not met, skipping");
            self.publish(ResolveEvent::DependencySkipped {
                session_id: self.id.clone(),
                parent: parent.to_string(),
                child: child.to_string(),
            });
            return Ok(None);
        }
        self.get_once(Some(parent), child).await.map(Some)
    }

    /// Cancel the session and report a failure originating at `name`.
    fn fail(&self, name: &str, err: QuarryError) -> QuarryError {
        self.cancel();
        if !err.is_cancellation() {
            debug!(session_id = %self.id, factory = %name, error = %err, "Factory failed");
            self.publish(ResolveEvent::FactoryFailed {
                session_id: self.id.clone(),
                name: name.to_string(),
                error: err.to_string(),
            });
        }
        err
    }
}
