use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    Change, ChangeTopic, Comment, CommentId, Error, NewComment, NewPost, Notification,
    NotificationId, Post, PostId, UserId,
};

/// Receiving end of one change-stream registration. Dropping it
/// unregisters: the store side prunes closed channels on the next
/// relay.
#[derive(Debug)]
pub struct Subscription {
    topic: ChangeTopic,
    receiver: mpsc::UnboundedReceiver<Change>,
}

impl Subscription {
    pub fn new(topic: ChangeTopic, receiver: mpsc::UnboundedReceiver<Change>) -> Subscription {
        Subscription { topic, receiver }
    }

    pub fn topic(&self) -> ChangeTopic {
        self.topic
    }

    /// None once the store side is gone.
    pub async fn next(&mut self) -> Option<Change> {
        self.receiver.recv().await
    }

    /// Non-blocking variant, used to drain a burst of changes that
    /// one refetch will cover anyway.
    pub fn try_next(&mut self) -> Option<Change> {
        self.receiver.try_recv().ok()
    }
}

/// The relational store, as far as this client needs it. Every method
/// is a single atomic operation on the backend.
#[async_trait]
pub trait Store {
    async fn fetch_post(&self, id: PostId) -> Result<Post, Error>;

    /// Pinned posts first, then newest first.
    async fn fetch_posts(&self) -> Result<Vec<Post>, Error>;

    /// The full flat comment set of one post, oldest first. Ties keep
    /// store insertion order, which is assumed stable.
    async fn fetch_comments(&self, post: PostId) -> Result<Vec<Comment>, Error>;

    /// The store assigns id and timestamp and returns the record.
    async fn insert_post(&self, post: NewPost) -> Result<Post, Error>;

    /// The store assigns id and timestamp and returns the record.
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, Error>;

    async fn delete_post(&self, id: PostId) -> Result<(), Error>;

    async fn delete_comment(&self, id: CommentId) -> Result<(), Error>;

    async fn set_pinned(&self, id: PostId, pinned: bool) -> Result<(), Error>;

    /// Up to `limit` of the user's notifications, newest first.
    async fn fetch_notifications(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, Error>;

    async fn mark_notification_read(&self, id: NotificationId) -> Result<(), Error>;

    /// Bulk update scoped to the user's unread notifications.
    async fn mark_all_notifications_read(&self, user: UserId) -> Result<(), Error>;

    async fn clear_notifications(&self, user: UserId) -> Result<(), Error>;

    async fn subscribe(&self, topic: ChangeTopic) -> Result<Subscription, Error>;
}

/// Binary object storage for attached images.
#[async_trait]
pub trait ObjectStore {
    /// Returns the key under which the bytes ended up stored.
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<String, Error>;

    fn public_url(&self, key: &str) -> String;
}
