use uuid::Uuid;

use crate::{Error, Time, User, UserId, STUB_UUID};

pub const MAX_POST_LEN: usize = 2000;
pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn stub() -> PostId {
        PostId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub body: String,
    pub image_urls: Vec<String>,
    pub pinned: bool,
    pub date: Time,
}

/// Insertion payload: the store assigns id and timestamp.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewPost {
    pub author_id: UserId,
    pub author_name: String,
    pub body: String,
    pub image_urls: Vec<String>,
}

impl NewPost {
    pub fn new(author: &User, body: String) -> NewPost {
        NewPost {
            author_id: author.id,
            author_name: author.name.clone(),
            body: body.trim().to_string(),
            image_urls: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.author_name)?;
        for url in &self.image_urls {
            crate::validate_string(url)?;
        }
        crate::validate_body(&self.body, MAX_POST_LEN)
    }
}
