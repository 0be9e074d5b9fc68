use uuid::Uuid;

use crate::STUB_UUID;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_moderator: bool,
}

/// Who is looking at a thread right now. Ephemeral: built from the
/// current session (or its absence) and never persisted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Viewer {
    Anonymous,
    User { id: UserId, moderator: bool },
}

impl Viewer {
    pub fn id(&self) -> Option<UserId> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User { id, .. } => Some(*id),
        }
    }

    pub fn is_moderator(&self) -> bool {
        matches!(self, Viewer::User { moderator: true, .. })
    }

    /// Whether this viewer may delete content written by `author`.
    /// This only drives which actions the UI offers; the store itself
    /// does its own enforcement.
    pub fn may_delete(&self, author: UserId) -> bool {
        match self {
            Viewer::Anonymous => false,
            Viewer::User { id, moderator } => *moderator || *id == author,
        }
    }
}
