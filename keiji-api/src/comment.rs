use uuid::Uuid;

use crate::{Error, PostId, Time, User, UserId, STUB_UUID};

pub const MAX_COMMENT_LEN: usize = 500;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

/// One flat comment record. `parent_id == None` means top-level on
/// the post. A parent, when set, belongs to the same post and was
/// created strictly earlier, so parent chains cannot cycle.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub body: String,
    /// Starts a masked thread: the body of this comment and of its
    /// descendants is only rendered for a few viewers.
    pub hidden: bool,
    pub parent_id: Option<CommentId>,
    pub date: Time,
}

/// Insertion payload: the store assigns id and timestamp.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub post_id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub body: String,
    pub hidden: bool,
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    pub fn new(author: &User, post: PostId, body: String) -> NewComment {
        NewComment {
            post_id: post,
            author_id: author.id,
            author_name: author.name.clone(),
            body: body.trim().to_string(),
            hidden: false,
            parent_id: None,
        }
    }

    pub fn reply_to(mut self, parent: CommentId) -> NewComment {
        self.parent_id = Some(parent);
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.author_name)?;
        crate::validate_body(&self.body, MAX_COMMENT_LEN)
    }
}
