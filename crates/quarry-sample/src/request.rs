use serde::{Deserialize, Serialize};

/// Parameters of one sample request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleRequest {
    pub token: String,
    pub show_unread: bool,
}

/// Requests that carry an authentication token.
pub trait HasToken {
    fn token(&self) -> &str;
}

/// Requests that can ask for unread notifications separately.
pub trait HasUnreadOption {
    fn show_unread(&self) -> bool;
}

impl HasToken for SampleRequest {
    fn token(&self) -> &str {
        &self.token
    }
}

impl HasUnreadOption for SampleRequest {
    fn show_unread(&self) -> bool {
        self.show_unread
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Unread,
    Read,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub to: User,
    pub from: User,
    pub status: NotificationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbox {
    pub notifications: Vec<Notification>,
    /// Only filled when the request asked for unread notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_notifications: Option<Vec<Notification>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleResponse {
    pub user: User,
    pub inbox: Inbox,
}
