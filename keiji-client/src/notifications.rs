use std::sync::Arc;

use crate::api::{
    ChangeTopic, Error, Notification, NotificationId, Store, Subscription, UserId,
    NOTIFICATION_FETCH_LIMIT,
};

/// Ticket for one in-flight notification load; same out-of-order
/// rules as thread loads.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct LoadGen(u64);

/// Owns the unread/read state of one user's notification list. Local
/// optimistic flips are a best-effort approximation of truth, always
/// superseded by the next successful load.
pub struct NotificationFeed<S> {
    store: Arc<S>,
    user: UserId,
    items: Vec<Notification>,
    unread: usize,
    issued: u64,
    applied: u64,
    subscription: Option<Subscription>,
}

impl<S> NotificationFeed<S> {
    pub fn new(store: Arc<S>, user: UserId) -> NotificationFeed<S> {
        NotificationFeed {
            store,
            user,
            items: Vec::new(),
            unread: 0,
            issued: 0,
            applied: 0,
            subscription: None,
        }
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    /// Newest first, at most [`NOTIFICATION_FETCH_LIMIT`] entries.
    pub fn notifications(&self) -> &[Notification] {
        &self.items
    }

    /// Badge counter. Counts unread among the fetched window only:
    /// unread notifications beyond the fetch limit are not counted.
    pub fn unread(&self) -> usize {
        self.unread
    }

    pub fn begin_load(&mut self) -> LoadGen {
        self.issued += 1;
        LoadGen(self.issued)
    }

    pub fn apply(&mut self, gen: LoadGen, items: Vec<Notification>) -> bool {
        if gen.0 < self.applied {
            tracing::debug!(gen = gen.0, applied = self.applied, "discarding stale notification load");
            return false;
        }
        self.applied = gen.0;
        self.unread = items.iter().filter(|n| !n.is_read).count();
        self.items = items;
        true
    }

    pub fn unsubscribe(&mut self) {
        self.subscription = None;
    }

    fn flip_read_local(&mut self, id: NotificationId) {
        if let Some(n) = self.items.iter_mut().find(|n| n.id == id) {
            if !n.is_read {
                n.is_read = true;
                self.unread = self.unread.saturating_sub(1);
            }
        }
    }
}

impl<S: Store> NotificationFeed<S> {
    pub async fn load(&mut self) -> Result<(), Error> {
        let gen = self.begin_load();
        let items = self
            .store
            .fetch_notifications(self.user, NOTIFICATION_FETCH_LIMIT)
            .await?;
        self.apply(gen, items);
        Ok(())
    }

    pub async fn subscribe(&mut self) -> Result<(), Error> {
        let sub = self
            .store
            .subscribe(ChangeTopic::NotificationsFor(self.user))
            .await?;
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
        tracing::debug!(?change, "notification change, refetching");
        self.load().await?;
        Ok(true)
    }

    /// Flips locally before the store confirms. A store failure is
    /// logged and surfaced but the flip is not rolled back: the next
    /// refetch corrects whatever diverged.
    pub async fn mark_read(&mut self, id: NotificationId) -> Result<(), Error> {
        self.flip_read_local(id);
        if let Err(e) = self.store.mark_notification_read(id).await {
            tracing::error!(notification = ?id, err = %e, "failed marking notification read");
            return Err(e);
        }
        Ok(())
    }

    /// Optimistically zeroes the counter, then issues one bulk update
    /// scoped to the user's unread notifications.
    pub async fn mark_all_read(&mut self) -> Result<(), Error> {
        for n in &mut self.items {
            n.is_read = true;
        }
        self.unread = 0;
        if let Err(e) = self.store.mark_all_notifications_read(self.user).await {
            tracing::error!(user = ?self.user, err = %e, "failed marking all notifications read");
            return Err(e);
        }
        Ok(())
    }

    /// Empties the local list and issues one bulk delete.
    pub async fn clear_all(&mut self) -> Result<(), Error> {
        self.items.clear();
        self.unread = 0;
        if let Err(e) = self.store.clear_notifications(self.user).await {
            tracing::error!(user = ?self.user, err = %e, "failed clearing notifications");
            return Err(e);
        }
        Ok(())
    }
}
