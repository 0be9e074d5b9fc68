mod auth;
mod comment;
mod error;
mod feed;
mod notification;
mod post;
mod store;
mod user;

pub use auth::{Auth, AuthToken, NewSession, Session, SessionChange, SessionFeed};
pub use comment::{Comment, CommentId, NewComment, MAX_COMMENT_LEN};
pub use error::Error;
pub use feed::{Change, ChangeKind, ChangeTopic};
pub use notification::{
    Notification, NotificationId, NotificationKind, NOTIFICATION_FETCH_LIMIT,
};
pub use post::{NewPost, Post, PostId, MAX_ATTACHMENT_BYTES, MAX_POST_LEN};
pub use store::{ObjectStore, Store, Subscription};
pub use user::{User, UserId, Viewer};

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<chrono::Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

pub fn validate_string(s: &str) -> Result<(), Error> {
    match s.contains('\0') {
        true => Err(Error::NullByteInString(s.to_string())),
        false => Ok(()),
    }
}

/// Trim, then check emptiness and the length cap. Shared by posts and
/// comments, which differ only in `max`.
pub(crate) fn validate_body(body: &str, max: usize) -> Result<(), Error> {
    validate_string(body)?;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyContent);
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(Error::ContentTooLong { len, max });
    }
    Ok(())
}
