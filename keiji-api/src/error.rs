use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not found {0}")]
    NotFound(Uuid),

    #[error("Name already used {0}")]
    NameAlreadyUsed(String),

    #[error("Empty content is not allowed")]
    EmptyContent,

    #[error("Content too long ({len} > {max})")]
    ContentTooLong { len: usize, max: usize },

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Attachment too large ({0} bytes)")]
    AttachmentTooLarge(usize),

    #[error("Reply depth limit reached")]
    ReplyDepthExceeded,
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NameAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::EmptyContent => StatusCode::BAD_REQUEST,
            Error::ContentTooLong { .. } => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::AttachmentTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::ReplyDepthExceeded => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::StoreUnavailable(msg) => json!({
                "message": msg,
                "type": "store-unavailable",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::NotFound(id) => json!({
                "message": "record not found",
                "type": "not-found",
                "id": id,
            }),
            Error::NameAlreadyUsed(n) => json!({
                "message": "name already used",
                "type": "conflict-name",
                "name": n,
            }),
            Error::EmptyContent => json!({
                "message": "content is empty",
                "type": "empty-content",
            }),
            Error::ContentTooLong { len, max } => json!({
                "message": "content is too long",
                "type": "content-too-long",
                "len": len,
                "max": max,
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::AttachmentTooLarge(bytes) => json!({
                "message": "attachment is too large",
                "type": "attachment-too-large",
                "bytes": bytes,
            }),
            Error::ReplyDepthExceeded => json!({
                "message": "reply depth limit reached",
                "type": "reply-depth",
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "store-unavailable" => Error::StoreUnavailable(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "not-found" => Error::NotFound(
                    data.get("id")
                        .and_then(|id| id.as_str())
                        .and_then(|id| Uuid::from_str(id).ok())
                        .ok_or_else(|| anyhow!("error is a not-found without a proper id"))?,
                ),
                "conflict-name" => Error::NameAlreadyUsed(String::from(
                    data.get("name")
                        .and_then(|n| n.as_str())
                        .ok_or_else(|| anyhow!("error is a name conflict without a name"))?,
                )),
                "empty-content" => Error::EmptyContent,
                "content-too-long" => Error::ContentTooLong {
                    len: data
                        .get("len")
                        .and_then(|l| l.as_u64())
                        .ok_or_else(|| anyhow!("content-too-long error without a len"))?
                        as usize,
                    max: data
                        .get("max")
                        .and_then(|m| m.as_u64())
                        .ok_or_else(|| anyhow!("content-too-long error without a max"))?
                        as usize,
                },
                "null-byte" => Error::NullByteInString(String::from(
                    data.get("string").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is a null-byte-in-string without a string")
                    })?,
                )),
                "attachment-too-large" => Error::AttachmentTooLarge(
                    data.get("bytes")
                        .and_then(|b| b.as_u64())
                        .ok_or_else(|| anyhow!("attachment-too-large error without a size"))?
                        as usize,
                ),
                "reply-depth" => Error::ReplyDepthExceeded,
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
