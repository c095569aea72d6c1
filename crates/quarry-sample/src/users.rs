use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use quarry_core::error::{QuarryError, Result};
use quarry_core::types::{Dependencies, Value};
use quarry_graph::{factory, provider, Registry};

use crate::request::{HasToken, User};

pub const USER_SERVICE: &str = "userService";
pub const USER: &str = "user";

/// Looks up the user behind a token.
#[derive(Debug, Default)]
pub struct UserService;

impl UserService {
    pub async fn fetch_user_for_token(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<User> {
        debug!("UserService::fetch_user_for_token");
        if cancel.is_cancelled() {
            return Err(QuarryError::Cancelled);
        }
        if token.is_empty() {
            return Err(QuarryError::execution("missing token"));
        }
        Ok(User {
            username: "taco".to_string(),
            email: "taco@example.com".to_string(),
        })
    }
}

/// Register `userService` and `user`.
pub fn register<P>(q: &mut Registry<P>) -> Result<()>
where
    P: HasToken + Send + Sync + 'static,
{
    q.add_factory(USER_SERVICE, provider(UserService))?;

    q.add_factory(USER, factory(fetch_user::<P>))?;
    q.add_dependency(USER, USER_SERVICE)?;
    Ok(())
}

async fn fetch_user<P: HasToken>(
    cancel: CancellationToken,
    params: Arc<P>,
    deps: Dependencies,
) -> Result<Value> {
    let service = deps.get::<UserService>(USER_SERVICE)?;
    let user = service.fetch_user_for_token(&cancel, params.token()).await?;
    Ok(Value::new(user))
}
