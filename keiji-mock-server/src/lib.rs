use std::{
    collections::HashMap,
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::Utc;
use keiji_client::api::{
    Auth, AuthToken, Change, ChangeKind, ChangeTopic, Comment, CommentId, Error, NewComment,
    NewPost, NewSession, Notification, NotificationId, NotificationKind, ObjectStore, Post,
    PostId, Session, SessionChange, SessionFeed, Store, Subscription, User, UserId, Uuid,
    MAX_ATTACHMENT_BYTES,
};
use tokio::sync::mpsc;

/// In-memory stand-in for the managed backend: relational tables,
/// change-feed relaying, object storage, sessions, and the
/// notification fan-out trigger that the real backend runs on comment
/// insertion. Exists to serve the integration tests.
pub struct MockServer {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    profiles: HashMap<UserId, Profile>,
    sessions: HashMap<AuthToken, UserId>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    notifications: Vec<Notification>,
    feeds: Vec<(ChangeTopic, mpsc::UnboundedSender<Change>)>,
    session_feeds: Vec<mpsc::UnboundedSender<SessionChange>>,
    objects: HashMap<String, Vec<u8>>,
}

#[derive(Debug)]
struct Profile {
    name: String,
    email: String,
    // tests don't hash passwords
    pass: String,
    is_moderator: bool,
}

impl Inner {
    fn relay(&mut self, topic: ChangeTopic, kind: ChangeKind) {
        let change = Change { topic, kind };
        self.feeds
            .retain(|(t, sender)| *t != topic || sender.send(change).is_ok());
    }

    fn relay_session(&mut self, change: SessionChange) {
        self.session_feeds.retain(|s| s.send(change).is_ok());
    }

    fn user(&self, id: UserId) -> Option<User> {
        self.profiles.get(&id).map(|p| User {
            id,
            name: p.name.clone(),
            email: p.email.clone(),
            is_moderator: p.is_moderator,
        })
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("mock server lock poisoned")
    }

    pub fn admin_create_user(
        &self,
        name: &str,
        email: &str,
        pass: &str,
        moderator: bool,
    ) -> Result<User, Error> {
        let mut inner = self.lock();
        if inner.profiles.values().any(|p| p.name == name) {
            return Err(Error::NameAlreadyUsed(name.to_string()));
        }
        let id = UserId(Uuid::new_v4());
        inner.profiles.insert(
            id,
            Profile {
                name: name.to_string(),
                email: email.to_string(),
                pass: pass.to_string(),
                is_moderator: moderator,
            },
        );
        Ok(inner.user(id).expect("just inserted profile"))
    }

    pub fn user(&self, id: UserId) -> Result<User, Error> {
        self.lock().user(id).ok_or(Error::NotFound(id.0))
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

#[async_trait]
impl Store for MockServer {
    async fn fetch_post(&self, id: PostId) -> Result<Post, Error> {
        let inner = self.lock();
        inner
            .posts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(Error::NotFound(id.0))
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>, Error> {
        let inner = self.lock();
        let mut posts = inner.posts.clone();
        posts.sort_by(|a, b| b.pinned.cmp(&a.pinned).then(b.date.cmp(&a.date)));
        Ok(posts)
    }

    async fn fetch_comments(&self, post: PostId) -> Result<Vec<Comment>, Error> {
        let inner = self.lock();
        if !inner.posts.iter().any(|p| p.id == post) {
            return Err(Error::NotFound(post.0));
        }
        let mut comments: Vec<Comment> = inner
            .comments
            .iter()
            .filter(|c| c.post_id == post)
            .cloned()
            .collect();
        // insertion order is creation order, so a stable sort keeps
        // ties the way the client expects
        comments.sort_by_key(|c| c.date);
        Ok(comments)
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post, Error> {
        post.validate()?;
        let mut inner = self.lock();
        let stored = Post {
            id: PostId(Uuid::new_v4()),
            author_id: post.author_id,
            author_name: post.author_name,
            body: post.body.trim().to_string(),
            image_urls: post.image_urls,
            pinned: false,
            date: Utc::now(),
        };
        inner.posts.push(stored.clone());
        inner.relay(ChangeTopic::Posts, ChangeKind::Insert);
        Ok(stored)
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, Error> {
        comment.validate()?;
        let mut inner = self.lock();
        let post = inner
            .posts
            .iter()
            .find(|p| p.id == comment.post_id)
            .cloned()
            .ok_or(Error::NotFound(comment.post_id.0))?;
        if let Some(parent) = comment.parent_id {
            // the parent must exist and belong to the same post
            inner
                .comments
                .iter()
                .find(|c| c.id == parent && c.post_id == comment.post_id)
                .ok_or(Error::NotFound(parent.0))?;
        }

        // recipients: post author plus every distinct prior commenter,
        // minus the actor
        let mut recipients: Vec<UserId> = vec![post.author_id];
        for c in inner.comments.iter().filter(|c| c.post_id == post.id) {
            if !recipients.contains(&c.author_id) {
                recipients.push(c.author_id);
            }
        }
        recipients.retain(|r| *r != comment.author_id);

        let stored = Comment {
            id: CommentId(Uuid::new_v4()),
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_name: comment.author_name,
            body: comment.body.trim().to_string(),
            hidden: comment.hidden,
            parent_id: comment.parent_id,
            date: Utc::now(),
        };
        inner.comments.push(stored.clone());
        inner.relay(ChangeTopic::CommentsOn(post.id), ChangeKind::Insert);

        for recipient in recipients {
            let body = match recipient == post.author_id {
                true => "commented on your post",
                false => "also commented on a post you commented on",
            };
            let n = Notification {
                id: NotificationId(Uuid::new_v4()),
                recipient_id: recipient,
                kind: NotificationKind::NewComment,
                post_id: post.id,
                actor_id: stored.author_id,
                actor_name: stored.author_name.clone(),
                body: body.to_string(),
                is_read: false,
                date: stored.date,
            };
            inner.notifications.push(n);
            inner.relay(
                ChangeTopic::NotificationsFor(recipient),
                ChangeKind::Insert,
            );
        }
        Ok(stored)
    }

    async fn delete_post(&self, id: PostId) -> Result<(), Error> {
        let mut inner = self.lock();
        let before = inner.posts.len();
        inner.posts.retain(|p| p.id != id);
        if inner.posts.len() == before {
            return Err(Error::NotFound(id.0));
        }
        // cascades like the backend's foreign keys do
        let had_comments = inner.comments.iter().any(|c| c.post_id == id);
        inner.comments.retain(|c| c.post_id != id);
        inner.relay(ChangeTopic::Posts, ChangeKind::Delete);
        if had_comments {
            inner.relay(ChangeTopic::CommentsOn(id), ChangeKind::Delete);
        }
        Ok(())
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), Error> {
        let mut inner = self.lock();
        let deleted = inner
            .comments
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(Error::NotFound(id.0))?;
        // only this record: replies keep their dangling parent id
        inner.comments.retain(|c| c.id != id);
        inner.relay(ChangeTopic::CommentsOn(deleted.post_id), ChangeKind::Delete);
        Ok(())
    }

    async fn set_pinned(&self, id: PostId, pinned: bool) -> Result<(), Error> {
        let mut inner = self.lock();
        let post = inner
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(Error::NotFound(id.0))?;
        post.pinned = pinned;
        inner.relay(ChangeTopic::Posts, ChangeKind::Update);
        Ok(())
    }

    async fn fetch_notifications(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, Error> {
        let inner = self.lock();
        let mut items: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.date.cmp(&a.date));
        items.truncate(limit);
        Ok(items)
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<(), Error> {
        let mut inner = self.lock();
        let n = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(Error::NotFound(id.0))?;
        n.is_read = true;
        let recipient = n.recipient_id;
        inner.relay(ChangeTopic::NotificationsFor(recipient), ChangeKind::Update);
        Ok(())
    }

    async fn mark_all_notifications_read(&self, user: UserId) -> Result<(), Error> {
        let mut inner = self.lock();
        let mut changed = false;
        for n in inner
            .notifications
            .iter_mut()
            .filter(|n| n.recipient_id == user && !n.is_read)
        {
            n.is_read = true;
            changed = true;
        }
        if changed {
            // one bulk update, one change message
            inner.relay(ChangeTopic::NotificationsFor(user), ChangeKind::Update);
        }
        Ok(())
    }

    async fn clear_notifications(&self, user: UserId) -> Result<(), Error> {
        let mut inner = self.lock();
        let before = inner.notifications.len();
        inner.notifications.retain(|n| n.recipient_id != user);
        if inner.notifications.len() != before {
            inner.relay(ChangeTopic::NotificationsFor(user), ChangeKind::Delete);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: ChangeTopic) -> Result<Subscription, Error> {
        let mut inner = self.lock();
        let (sender, receiver) = mpsc::unbounded_channel();
        inner.feeds.push((topic, sender));
        Ok(Subscription::new(topic, receiver))
    }
}

#[async_trait]
impl ObjectStore for MockServer {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<String, Error> {
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(Error::AttachmentTooLarge(bytes.len()));
        }
        let mut inner = self.lock();
        inner.objects.insert(key.to_string(), bytes);
        Ok(key.to_string())
    }

    fn public_url(&self, key: &str) -> String {
        format!("mock://objects/{key}")
    }
}

#[async_trait]
impl Auth for MockServer {
    async fn create_session(&self, session: NewSession) -> Result<Session, Error> {
        session.validate()?;
        let mut inner = self.lock();
        let (id, profile) = inner
            .profiles
            .iter()
            .find(|(_, p)| p.name == session.user)
            .ok_or(Error::PermissionDenied)?;
        if profile.pass != session.password {
            return Err(Error::PermissionDenied);
        }
        let id = *id;
        let token = AuthToken(Uuid::new_v4());
        inner.sessions.insert(token, id);
        inner.relay_session(SessionChange::SignedIn(id));
        let user = inner.user(id).expect("profile disappeared");
        Ok(Session { token, user })
    }

    async fn session(&self, token: AuthToken) -> Result<Option<Session>, Error> {
        let inner = self.lock();
        Ok(inner.sessions.get(&token).and_then(|id| {
            inner.user(*id).map(|user| Session { token, user })
        }))
    }

    async fn destroy_session(&self, token: AuthToken) -> Result<(), Error> {
        let mut inner = self.lock();
        let id = inner
            .sessions
            .remove(&token)
            .ok_or(Error::PermissionDenied)?;
        inner.relay_session(SessionChange::SignedOut(id));
        Ok(())
    }

    async fn session_feed(&self) -> Result<SessionFeed, Error> {
        let mut inner = self.lock();
        let (sender, receiver) = mpsc::unbounded_channel();
        inner.session_feeds.push(sender);
        Ok(SessionFeed::new(receiver))
    }
}
