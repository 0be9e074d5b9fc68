use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{Error, User, UserId, Viewer, STUB_UUID};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub Uuid);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(STUB_UUID)
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewSession {
    pub user: String,
    pub password: String,
    pub device: String,
}

impl NewSession {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.user)?;
        crate::validate_string(&self.password)?;
        crate::validate_string(&self.device)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Session {
    pub token: AuthToken,
    pub user: User,
}

impl Session {
    pub fn viewer(&self) -> Viewer {
        Viewer::User {
            id: self.user.id,
            moderator: self.user.is_moderator,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum SessionChange {
    SignedIn(UserId),
    SignedOut(UserId),
}

/// Same contract as [`Subscription`](crate::Subscription), for
/// session changes.
#[derive(Debug)]
pub struct SessionFeed {
    receiver: mpsc::UnboundedReceiver<SessionChange>,
}

impl SessionFeed {
    pub fn new(receiver: mpsc::UnboundedReceiver<SessionChange>) -> SessionFeed {
        SessionFeed { receiver }
    }

    pub async fn next(&mut self) -> Option<SessionChange> {
        self.receiver.recv().await
    }
}

/// Credential issuance and session lookup, owned by the backend. The
/// client only ever turns a session into a [`Viewer`].
#[async_trait]
pub trait Auth {
    async fn create_session(&self, session: NewSession) -> Result<Session, Error>;

    async fn session(&self, token: AuthToken) -> Result<Option<Session>, Error>;

    async fn destroy_session(&self, token: AuthToken) -> Result<(), Error>;

    async fn session_feed(&self) -> Result<SessionFeed, Error>;
}
