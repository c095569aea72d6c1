use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use quarry_core::error::Result;
use quarry_core::types::{Dependencies, Value};
use quarry_graph::{factory, Registry};

use crate::notifications::INBOX;
use crate::request::{Inbox, SampleResponse, User};
use crate::users::USER;

pub const RESPONSE: &str = "response";

/// Register `response`, which combines `user` and `inbox`.
pub fn register<P>(q: &mut Registry<P>) -> Result<()>
where
    P: Send + Sync + 'static,
{
    q.add_factory(RESPONSE, factory(build_response::<P>))?;
    q.add_dependency(RESPONSE, USER)?;
    q.add_dependency(RESPONSE, INBOX)?;
    Ok(())
}

async fn build_response<P>(
    _cancel: CancellationToken,
    _params: Arc<P>,
    deps: Dependencies,
) -> Result<Value> {
    let user = deps.get::<User>(USER)?;
    let inbox = deps.get::<Inbox>(INBOX)?;
    Ok(Value::new(SampleResponse {
        user: user.as_ref().clone(),
        inbox: inbox.as_ref().clone(),
    }))
}
