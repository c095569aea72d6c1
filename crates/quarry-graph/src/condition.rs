use std::sync::Arc;

/// Decides whether a dependency edge is fulfilled for a request.
///
/// Conditions only ever see the parameters of the top-level request, never
/// the values of resolved dependencies.
pub type Condition<P> = Arc<dyn Fn(&P) -> bool + Send + Sync>;

/// Build a `Condition` from a closure.
pub fn condition<P, F>(f: F) -> Condition<P>
where
    F: Fn(&P) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// True when every condition holds. An empty list always holds.
pub fn check_conditions<P>(params: &P, conditions: &[Condition<P>]) -> bool {
    conditions.iter().all(|condition| condition(params))
}
