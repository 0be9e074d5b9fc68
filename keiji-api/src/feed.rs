use crate::{PostId, UserId};

/// Key identifying one change-stream registration: a table plus its
/// filter, the way the backend scopes realtime channels.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum ChangeTopic {
    Posts,
    CommentsOn(PostId),
    NotificationsFor(UserId),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Pushed when data under a topic changed. Deliberately carries no
/// payload: subscribers refetch instead of patching, so a batched
/// mutation can collapse into a single message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Change {
    pub topic: ChangeTopic,
    pub kind: ChangeKind,
}
