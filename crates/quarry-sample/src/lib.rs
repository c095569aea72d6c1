//! Sample collaborators: a user lookup, a notification inbox, and a response
//! that combines them.
//!
//! Each module exposes `register`, which adds its factories to a registry.
//! [`register_all`] assembles the complete sample graph:
//!
//! ```text
//! response -> user -> userService
//! response -> inbox -> notifications -> {notificationService, user}
//!             inbox -> unreadNotifications (only when show_unread)
//!                      unreadNotifications -> notifications
//! ```

pub mod notifications;
pub mod request;
pub mod response;
pub mod users;

pub use request::{
    HasToken, HasUnreadOption, Inbox, Notification, NotificationStatus, SampleRequest,
    SampleResponse, User,
};
pub use response::RESPONSE;

use quarry_core::error::Result;
use quarry_graph::Registry;

/// Register every sample collaborator, in dependency order.
pub fn register_all<P>(q: &mut Registry<P>) -> Result<()>
where
    P: HasToken + HasUnreadOption + Send + Sync + 'static,
{
    users::register(q)?;
    notifications::register(q)?;
    response::register(q)?;
    Ok(())
}
