pub mod tree;
pub use tree::CommentNode;

pub mod visibility;
pub use visibility::{CommentIndex, Visibility};

mod thread;
pub use thread::{ThreadData, ThreadView, ViewState, MAX_REPLY_DEPTH};

mod notifications;
pub use notifications::NotificationFeed;

mod feed;
pub use feed::PostsFeed;

pub mod api {
    pub use keiji_api::*;
}
