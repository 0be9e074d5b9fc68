use std::sync::Arc;

use crate::api::{
    ChangeTopic, Error, NewPost, ObjectStore, Post, PostId, Store, Subscription,
    MAX_ATTACHMENT_BYTES,
};

/// Ticket for one in-flight posts load.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct LoadGen(u64);

/// The posts list with its search filter. Simpler sibling of the
/// thread and notification controllers: flat list, no derived tree.
pub struct PostsFeed<S> {
    store: Arc<S>,
    posts: Vec<Post>,
    query: String,
    issued: u64,
    applied: u64,
    subscription: Option<Subscription>,
}

/// Pinned posts first, then newest first. The store delivers this
/// order; local mutations restore it.
fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.pinned.cmp(&a.pinned).then(b.date.cmp(&a.date)));
}

impl<S> PostsFeed<S> {
    pub fn new(store: Arc<S>) -> PostsFeed<S> {
        PostsFeed {
            store,
            posts: Vec::new(),
            query: String::new(),
            issued: 0,
            applied: 0,
            subscription: None,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Case-insensitive substring match over body and author name; an
    /// empty (or all-whitespace) query matches everything.
    pub fn visible_posts(&self) -> Vec<&Post> {
        let query = self.query.trim().to_lowercase();
        self.posts
            .iter()
            .filter(|p| {
                query.is_empty()
                    || p.body.to_lowercase().contains(&query)
                    || p.author_name.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn begin_load(&mut self) -> LoadGen {
        self.issued += 1;
        LoadGen(self.issued)
    }

    pub fn apply(&mut self, gen: LoadGen, posts: Vec<Post>) -> bool {
        if gen.0 < self.applied {
            tracing::debug!(gen = gen.0, applied = self.applied, "discarding stale posts load");
            return false;
        }
        self.applied = gen.0;
        self.posts = posts;
        true
    }

    pub fn unsubscribe(&mut self) {
        self.subscription = None;
    }
}

impl<S: Store> PostsFeed<S> {
    pub async fn load(&mut self) -> Result<(), Error> {
        let gen = self.begin_load();
        let posts = self.store.fetch_posts().await?;
        self.apply(gen, posts);
        Ok(())
    }

    pub async fn subscribe(&mut self) -> Result<(), Error> {
        let sub = self.store.subscribe(ChangeTopic::Posts).await?;
        self.subscription = Some(sub);
        Ok(())
    }

    /// Waits for the next change and reloads. Returns false once the
    /// stream is gone.
    pub async fn sync_next(&mut self) -> Result<bool, Error> {
        let change = match self.subscription.as_mut() {
            None => return Ok(false),
            Some(sub) => match sub.next().await {
                None => {
                    self.subscription = None;
                    return Ok(false);
                }
                Some(change) => {
                    while sub.try_next().is_some() {}
                    change
                }
            },
        };
        tracing::debug!(?change, "posts change, refetching feed");
        self.load().await?;
        Ok(true)
    }

    /// Uploads the attachments, stamps their public urls onto the
    /// payload, inserts, and shows the stored record without waiting
    /// for the refetch.
    pub async fn create_post<O: ObjectStore>(
        &mut self,
        objects: &O,
        mut post: NewPost,
        attachments: Vec<(String, Vec<u8>)>,
    ) -> Result<Post, Error> {
        post.validate()?;
        for (name, bytes) in attachments {
            if bytes.len() > MAX_ATTACHMENT_BYTES {
                return Err(Error::AttachmentTooLarge(bytes.len()));
            }
            let key = format!("{}-{}", post.author_id.0, name);
            let key = objects.upload(&key, bytes).await?;
            post.image_urls.push(objects.public_url(&key));
        }
        let stored = self.store.insert_post(post).await?;
        self.upsert_local(stored.clone());
        Ok(stored)
    }

    pub async fn delete_post(&mut self, id: PostId) -> Result<(), Error> {
        self.store.delete_post(id).await?;
        self.posts.retain(|p| p.id != id);
        Ok(())
    }

    pub async fn set_pinned(&mut self, id: PostId, pinned: bool) -> Result<(), Error> {
        self.store.set_pinned(id, pinned).await?;
        if let Some(p) = self.posts.iter_mut().find(|p| p.id == id) {
            p.pinned = pinned;
        }
        sort_posts(&mut self.posts);
        Ok(())
    }

    fn upsert_local(&mut self, post: Post) {
        match self.posts.iter_mut().find(|p| p.id == post.id) {
            Some(existing) => *existing = post,
            None => self.posts.push(post),
        }
        sort_posts(&mut self.posts);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::api::{Time, UserId, Uuid};

    fn at(secs: i64) -> Time {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn post(author: &str, body: &str, secs: i64, pinned: bool) -> Post {
        Post {
            id: PostId(Uuid::new_v4()),
            author_id: UserId(Uuid::new_v4()),
            author_name: author.to_string(),
            body: body.to_string(),
            image_urls: Vec::new(),
            pinned,
            date: at(secs),
        }
    }

    fn feed_with(posts: Vec<Post>) -> PostsFeed<()> {
        let mut feed = PostsFeed::new(Arc::new(()));
        let gen = feed.begin_load();
        feed.apply(gen, posts);
        feed
    }

    #[test]
    fn empty_query_matches_everything() {
        let feed = feed_with(vec![
            post("taro", "first", 1, false),
            post("hanako", "second", 2, false),
        ]);
        assert_eq!(feed.visible_posts().len(), 2);
    }

    #[test]
    fn search_matches_body_and_author_case_insensitively() {
        let mut feed = feed_with(vec![
            post("Taro", "Rust threads are fun", 1, false),
            post("hanako", "gardening tips", 2, false),
        ]);

        feed.set_query("RUST");
        assert_eq!(feed.visible_posts().len(), 1);
        assert_eq!(feed.visible_posts()[0].body, "Rust threads are fun");

        feed.set_query("taro");
        assert_eq!(feed.visible_posts().len(), 1);

        feed.set_query("  gardening  ");
        assert_eq!(feed.visible_posts().len(), 1);

        feed.set_query("nothing matches this");
        assert!(feed.visible_posts().is_empty());
    }

    #[test]
    fn pinned_posts_sort_first_then_newest() {
        let old_pinned = post("a", "old pinned", 1, true);
        let newest = post("b", "newest", 9, false);
        let older = post("c", "older", 5, false);
        let mut posts = vec![older.clone(), newest.clone(), old_pinned.clone()];
        sort_posts(&mut posts);
        let ids: Vec<PostId> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![old_pinned.id, newest.id, older.id]);
    }

    #[test]
    fn later_issued_load_wins() {
        let mut feed: PostsFeed<()> = PostsFeed::new(Arc::new(()));
        let g1 = feed.begin_load();
        let g2 = feed.begin_load();
        assert!(feed.apply(g2, vec![post("a", "kept", 1, false)]));
        assert!(!feed.apply(g1, Vec::new()));
        assert_eq!(feed.posts().len(), 1);
    }
}
