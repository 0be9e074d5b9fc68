use uuid::Uuid;

use crate::{PostId, Time, UserId, STUB_UUID};

/// How many notifications one load fetches. The unread badge counts
/// within this window only.
pub const NOTIFICATION_FETCH_LIMIT: usize = 20;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    pub fn stub() -> NotificationId {
        NotificationId(STUB_UUID)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum NotificationKind {
    /// Someone commented on a post the recipient authored or
    /// commented on. Created by the backend as a side effect of the
    /// comment insert, never by this client.
    NewComment,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    pub post_id: PostId,
    pub actor_id: UserId,
    pub actor_name: String,
    /// Human-readable tail, rendered after the actor's name.
    pub body: String,
    pub is_read: bool,
    pub date: Time,
}
