use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use quarry_core::error::Result;
use quarry_core::types::{Dependencies, Value};

/// Future returned by every factory.
pub type FactoryFuture = BoxFuture<'static, Result<Value>>;

/// A named computation in the graph.
///
/// Receives the session's cancellation token, the request parameters shared
/// by the whole resolution tree, and its resolved dependencies.
pub type Factory<P> =
    Arc<dyn Fn(CancellationToken, Arc<P>, Dependencies) -> FactoryFuture + Send + Sync>;

/// Build a `Factory` from an async closure.
pub fn factory<P, F, Fut>(f: F) -> Factory<P>
where
    P: 'static,
    F: Fn(CancellationToken, Arc<P>, Dependencies) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(
        move |cancel: CancellationToken, params: Arc<P>, deps: Dependencies| -> FactoryFuture {
            Box::pin(f(cancel, params, deps))
        },
    )
}

/// A factory that ignores its inputs and always yields `value`.
pub fn provider<P, T>(value: T) -> Factory<P>
where
    P: 'static,
    T: Send + Sync + 'static,
{
    let value = Value::new(value);
    Arc::new(move |_: CancellationToken, _: Arc<P>, _: Dependencies| -> FactoryFuture {
        let value = value.clone();
        Box::pin(async move { Ok(value) })
    })
}

/// Wrap a parameterless computation so it runs at most once for the life of
/// the returned factory, across every session that uses it.
///
/// The first outcome is kept forever, errors included. Callers racing the
/// first invocation wait for it and observe the same outcome.
pub fn singleton<P, F, Fut>(f: F) -> Factory<P>
where
    P: 'static,
    F: Fn(CancellationToken, Dependencies) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    let f = Arc::new(f);
    let outcome: Arc<OnceCell<Result<Value>>> = Arc::new(OnceCell::new());
    Arc::new(move |cancel: CancellationToken, _: Arc<P>, deps: Dependencies| -> FactoryFuture {
        let f = f.clone();
        let outcome = outcome.clone();
        Box::pin(async move { outcome.get_or_init(|| f(cancel, deps)).await.clone() })
    })
}
