use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use quarry_core::error::{QuarryError, Result};
use quarry_core::types::{Dependencies, Value};
use quarry_graph::{condition, factory, singleton, Registry};

use crate::request::{HasUnreadOption, Inbox, Notification, NotificationStatus, User};
use crate::users::USER;

pub const NOTIFICATION_SERVICE: &str = "notificationService";
pub const NOTIFICATIONS: &str = "notifications";
pub const UNREAD_NOTIFICATIONS: &str = "unreadNotifications";
pub const INBOX: &str = "inbox";

/// Delivers notifications addressed to a user.
#[derive(Debug, Default)]
pub struct NotificationService {
    admin: Option<User>,
}

impl NotificationService {
    pub fn new() -> Self {
        Self {
            admin: Some(User {
                username: "admin".to_string(),
                email: "admin@example.com".to_string(),
            }),
        }
    }

    pub async fn fetch_notifications(
        &self,
        cancel: &CancellationToken,
        user: &User,
    ) -> Result<Vec<Notification>> {
        debug!("NotificationService::fetch_notifications");
        if cancel.is_cancelled() {
            return Err(QuarryError::Cancelled);
        }
        let admin = self
            .admin
            .clone()
            .ok_or_else(|| QuarryError::execution("notification service has no sender"))?;

        Ok(vec![
            Notification {
                title: "hello".to_string(),
                body: format!("Hello, {}!", user.username),
                to: user.clone(),
                from: admin.clone(),
                status: NotificationStatus::Unread,
            },
            Notification {
                title: "graph time".to_string(),
                body: "Graphs are pretty fun".to_string(),
                to: user.clone(),
                from: admin,
                status: NotificationStatus::Read,
            },
        ])
    }
}

/// Register `notificationService`, `notifications`, `unreadNotifications`
/// and `inbox`. Requires `user` to be registered as well.
pub fn register<P>(q: &mut Registry<P>) -> Result<()>
where
    P: HasUnreadOption + Send + Sync + 'static,
{
    q.add_factory(
        NOTIFICATION_SERVICE,
        singleton(|_, _| async { Ok(Value::new(NotificationService::new())) }),
    )?;

    q.add_factory(NOTIFICATIONS, factory(fetch_notifications::<P>))?;
    q.add_dependency(NOTIFICATIONS, NOTIFICATION_SERVICE)?;
    q.add_dependency(NOTIFICATIONS, USER)?;

    q.add_factory(UNREAD_NOTIFICATIONS, factory(fetch_unread_notifications::<P>))?;
    q.add_dependency(UNREAD_NOTIFICATIONS, NOTIFICATIONS)?;

    q.add_factory(INBOX, factory(fetch_inbox::<P>))?;
    q.add_dependency(INBOX, NOTIFICATIONS)?;
    q.add_dependency_when(
        INBOX,
        UNREAD_NOTIFICATIONS,
        [condition(|p: &P| p.show_unread())],
    )?;
    Ok(())
}

async fn fetch_notifications<P>(
    cancel: CancellationToken,
    _params: Arc<P>,
    deps: Dependencies,
) -> Result<Value> {
    let user = deps.get::<User>(USER)?;
    let service = deps.get::<NotificationService>(NOTIFICATION_SERVICE)?;
    let notifications = service.fetch_notifications(&cancel, &user).await?;
    Ok(Value::new(notifications))
}

async fn fetch_unread_notifications<P>(
    _cancel: CancellationToken,
    _params: Arc<P>,
    deps: Dependencies,
) -> Result<Value> {
    let notifications = deps.get::<Vec<Notification>>(NOTIFICATIONS)?;
    let unread: Vec<Notification> = notifications
        .iter()
        .filter(|n| n.status != NotificationStatus::Read)
        .cloned()
        .collect();
    Ok(Value::new(unread))
}

async fn fetch_inbox<P>(
    _cancel: CancellationToken,
    _params: Arc<P>,
    deps: Dependencies,
) -> Result<Value> {
    let notifications = deps.get::<Vec<Notification>>(NOTIFICATIONS)?;
    let unread = deps.get_optional::<Vec<Notification>>(UNREAD_NOTIFICATIONS)?;
    Ok(Value::new(Inbox {
        notifications: notifications.as_ref().clone(),
        unread_notifications: unread.map(|u| u.as_ref().clone()),
    }))
}
