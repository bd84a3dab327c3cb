//! Notifications delivered to household members

use crate::repository::{EntityKind, Record};
use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Identifier
    pub id: EntityId,
    /// Recipient
    pub user_id: String,
    /// Short headline
    pub title: String,
    /// Message body
    pub body: String,
    /// Delivery channel (`"email"`, `"push"`, ...)
    pub channel: String,
    /// Whether the recipient has opened it
    pub read: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Record for Notification {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// `list` filter for notifications
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationFilter {
    /// Restrict to one recipient
    pub user_id: Option<String>,
    /// Only unread notifications
    pub unread_only: bool,
}

impl NotificationFilter {
    /// Unread notifications of one user
    #[must_use]
    pub fn unread_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            unread_only: true,
        }
    }

    /// Whether `notification` passes the filter
    #[must_use]
    pub fn matches(&self, notification: &Notification) -> bool {
        self.user_id
            .as_ref()
            .map_or(true, |user| &notification.user_id == user)
            && (!self.unread_only || !notification.read)
    }
}

/// `create` payload for notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationInput {
    /// Recipient
    pub user_id: String,
    /// Short headline
    pub title: String,
    /// Message body
    pub body: String,
    /// Delivery channel
    pub channel: String,
}

/// `update` payload for notifications
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPatch {
    /// Mark read or unread
    pub read: Option<bool>,
    /// Replace headline
    pub title: Option<String>,
}

/// Notification entity kind
#[derive(Debug, Clone, Copy)]
pub struct Notifications;

impl EntityKind for Notifications {
    const NAME: &'static str = "notification";
    type Entity = Notification;
    type Filter = NotificationFilter;
    type Input = NotificationInput;
    type Patch = NotificationPatch;
}
