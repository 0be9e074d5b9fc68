use std::sync::Arc;

use crate::{
    api::{
        ChangeTopic, Comment, CommentId, Error, NewComment, Post, PostId, Store, Subscription,
        Viewer,
    },
    tree::{self, CommentNode},
    visibility::{self, CommentIndex, Visibility},
};

/// Replies are refused under a comment already nested this deep.
/// Roots are at depth 0. Presentation policy, not enforced by the
/// tree builder.
pub const MAX_REPLY_DEPTH: usize = 3;

/// One post plus the flat comment snapshot it was loaded with. The
/// forest and the visibility decisions are both derived from the flat
/// set, which is the single source of truth between refetches.
#[derive(Clone, Debug)]
pub struct ThreadData {
    pub post: Post,
    comments: Vec<Comment>,
    index: CommentIndex,
}

impl ThreadData {
    pub fn new(post: Post, comments: Vec<Comment>) -> ThreadData {
        let index = CommentIndex::new(&comments);
        ThreadData {
            post,
            comments,
            index,
        }
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn index(&self) -> &CommentIndex {
        &self.index
    }

    /// Rebuilt from scratch on every call; cheap at thread sizes and
    /// immune to partial-mutation bugs.
    pub fn tree(&self) -> Vec<CommentNode> {
        tree::build(&self.comments)
    }

    pub fn visibility(&self, comment: CommentId, viewer: &Viewer) -> Visibility {
        visibility::resolve(&self.index, self.post.author_id, comment, viewer)
    }

    pub fn depth(&self, comment: CommentId) -> Option<usize> {
        self.index.depth(comment)
    }

    /// Whether a new reply may be submitted under `parent` (None for
    /// a new top-level comment).
    pub fn can_reply_to(&self, parent: Option<CommentId>) -> bool {
        match parent {
            None => true,
            Some(p) => matches!(self.index.depth(p), Some(d) if d < MAX_REPLY_DEPTH),
        }
    }

    /// Insert or replace by id, keeping the flat set ordered by
    /// creation date (stable for ties).
    fn upsert(&mut self, comment: Comment) {
        if let Some(existing) = self.comments.iter_mut().find(|c| c.id == comment.id) {
            *existing = comment;
        } else {
            let pos = self.comments.partition_point(|c| c.date <= comment.date);
            self.comments.insert(pos, comment);
        }
        self.index = CommentIndex::new(&self.comments);
    }

    /// Removes exactly this record. Descendants stay in the flat set;
    /// the tree builder drops them from the render, and the store
    /// remains the source of truth for whether they exist at all.
    fn remove(&mut self, id: CommentId) {
        self.comments.retain(|c| c.id != id);
        self.index = CommentIndex::new(&self.comments);
    }
}

/// Load state of one open thread. A refetch keeps the previous
/// `Ready` data visible until the fresh snapshot lands: no blank
/// flash.
#[derive(Clone, Debug, Default)]
pub enum ViewState {
    #[default]
    Idle,
    Loading,
    Ready(ThreadData),
}

impl ViewState {
    pub fn ready(&self) -> Option<&ThreadData> {
        match self {
            ViewState::Ready(data) => Some(data),
            _ => None,
        }
    }
}

/// Ticket for one in-flight load. Responses can come back in any
/// order; the later-issued ticket wins.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct LoadGen(u64);

/// Owns the on-screen copy of one post's thread and keeps it
/// consistent with the store: full refetch on every change event,
/// optimistic inserts reconciled by id.
pub struct ThreadView<S> {
    store: Arc<S>,
    post_id: PostId,
    state: ViewState,
    issued: u64,
    applied: u64,
    subscription: Option<Subscription>,
}

impl<S> ThreadView<S> {
    pub fn new(store: Arc<S>, post_id: PostId) -> ThreadView<S> {
        ThreadView {
            store,
            post_id,
            state: ViewState::Idle,
            issued: 0,
            applied: 0,
            subscription: None,
        }
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn data(&self) -> Option<&ThreadData> {
        self.state.ready()
    }

    /// Hands out the generation for a load about to start.
    pub fn begin_load(&mut self) -> LoadGen {
        self.issued += 1;
        if matches!(self.state, ViewState::Idle) {
            self.state = ViewState::Loading;
        }
        LoadGen(self.issued)
    }

    /// Applies one load response, unless a later-issued load already
    /// landed. Returns whether the response was taken.
    pub fn apply(&mut self, gen: LoadGen, data: ThreadData) -> bool {
        if gen.0 < self.applied {
            tracing::debug!(gen = gen.0, applied = self.applied, "discarding stale thread load");
            return false;
        }
        self.applied = gen.0;
        self.state = ViewState::Ready(data);
        true
    }

    /// Idempotent by id: re-adding an id already present replaces the
    /// record instead of duplicating it, and so does the refetch that
    /// carries the same id later.
    pub fn add_comment_optimistic(&mut self, comment: Comment) {
        match &mut self.state {
            ViewState::Ready(data) => data.upsert(comment),
            _ => tracing::warn!(comment = ?comment.id, "optimistic insert before thread is ready"),
        }
    }

    pub fn unsubscribe(&mut self) {
        self.subscription = None;
    }
}

impl<S: Store> ThreadView<S> {
    async fn fetch(&self) -> Result<ThreadData, Error> {
        let post = self.store.fetch_post(self.post_id).await?;
        let comments = self.store.fetch_comments(self.post_id).await?;
        Ok(ThreadData::new(post, comments))
    }

    /// One full load cycle: post record plus the whole flat comment
    /// set. On failure nothing changes locally (an initial load drops
    /// back to `Idle`) and the error is surfaced to the caller; no
    /// retry here.
    pub async fn load(&mut self) -> Result<(), Error> {
        let gen = self.begin_load();
        match self.fetch().await {
            Ok(data) => {
                self.apply(gen, data);
                Ok(())
            }
            Err(e) => {
                if self.applied == 0 {
                    self.state = ViewState::Idle;
                }
                Err(e)
            }
        }
    }

    /// Registers on the change stream for this post's comments. Every
    /// delivered event means "refetch everything": no incremental
    /// patching from event payloads.
    pub async fn subscribe(&mut self) -> Result<(), Error> {
        let sub = self
            .store
            .subscribe(ChangeTopic::CommentsOn(self.post_id))
            .await?;
        self.subscription = Some(sub);
        Ok(())
    }

    /// Waits for the next change and reloads. Returns false once the
    /// stream is gone (or was never opened).
    pub async fn sync_next(&mut self) -> Result<bool, Error> {
        let change = match self.subscription.as_mut() {
            None => return Ok(false),
            Some(sub) => match sub.next().await {
                None => {
                    self.subscription = None;
                    return Ok(false);
                }
                Some(change) => {
                    // a burst of queued changes is covered by one refetch
                    while sub.try_next().is_some() {}
                    change
                }
            },
        };
        tracing::debug!(?change, "comment change, refetching thread");
        self.load().await?;
        Ok(true)
    }

    /// Validates, refuses replies past the depth cap, submits, then
    /// inserts the stored record locally so the author sees it before
    /// the subscription-driven refetch arrives.
    pub async fn submit_comment(&mut self, comment: NewComment) -> Result<Comment, Error> {
        comment.validate()?;
        if let Some(data) = self.data() {
            if !data.can_reply_to(comment.parent_id) {
                return Err(Error::ReplyDepthExceeded);
            }
        }
        let stored = self.store.insert_comment(comment).await?;
        self.add_comment_optimistic(stored.clone());
        Ok(stored)
    }

    /// Requests deletion and drops the record from the local
    /// snapshot. No client-side cascade.
    pub async fn delete_comment(&mut self, id: CommentId) -> Result<(), Error> {
        self.store.delete_comment(id).await?;
        if let ViewState::Ready(data) = &mut self.state {
            data.remove(id);
        }
        Ok(())
    }
}
