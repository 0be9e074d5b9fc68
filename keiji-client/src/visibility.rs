use std::collections::HashMap;

use crate::api::{Comment, CommentId, UserId, Viewer};

/// Flat id-indexed snapshot of one post's comments. Ancestor chains
/// are walked through this index by repeated map lookup, never
/// through the rendered tree; parent ids are acyclic by construction
/// (a parent is always created strictly earlier).
#[derive(Clone, Debug, Default)]
pub struct CommentIndex {
    records: HashMap<CommentId, Comment>,
}

impl CommentIndex {
    pub fn new(comments: &[Comment]) -> CommentIndex {
        CommentIndex {
            records: comments.iter().map(|c| (c.id, c.clone())).collect(),
        }
    }

    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ancestors of `id`, nearest first. The walk ends at a root or
    /// at a parent that is not part of the snapshot.
    pub fn ancestors(&self, id: CommentId) -> Ancestors<'_> {
        Ancestors {
            index: self,
            next: self.get(id).and_then(|c| c.parent_id),
        }
    }

    /// Nesting level in the thread, roots at 0. None for a comment
    /// that is not in the snapshot.
    pub fn depth(&self, id: CommentId) -> Option<usize> {
        self.get(id)?;
        Some(self.ancestors(id).count())
    }
}

pub struct Ancestors<'a> {
    index: &'a CommentIndex,
    next: Option<CommentId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Comment;

    fn next(&mut self) -> Option<&'a Comment> {
        let id = self.next.take()?;
        let comment = self.index.get(id)?;
        self.next = comment.parent_id;
        Some(comment)
    }
}

/// What one viewer gets to see of one comment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Visibility {
    /// Real body, or masked placeholder.
    pub content_visible: bool,
    /// Whether to show the "hidden" badge. Only ever true for a
    /// viewer that can read the content: a masked viewer is not told
    /// whether the thread is hidden or merely absent.
    pub hidden_badge: bool,
}

impl Visibility {
    fn plain() -> Visibility {
        Visibility {
            content_visible: true,
            hidden_badge: false,
        }
    }

    fn unmasked() -> Visibility {
        Visibility {
            content_visible: true,
            hidden_badge: true,
        }
    }

    fn masked() -> Visibility {
        Visibility {
            content_visible: false,
            hidden_badge: false,
        }
    }
}

/// Decides whether `viewer` may read the body of `comment`.
///
/// A comment belongs to a masked thread when it or any ancestor is
/// flagged hidden. Inside a masked thread the body stays readable for
/// the comment's own author, the post's author, and the author of any
/// ancestor comment up to the root; everyone else, anonymous viewers
/// included, gets the placeholder. Moderator status grants nothing
/// here. Total: never errors, a dangling parent just ends the walk.
///
/// Advisory only: the full record set is readable at the storage
/// layer, this decision happens at render time.
pub fn resolve(
    index: &CommentIndex,
    post_author: UserId,
    comment: CommentId,
    viewer: &Viewer,
) -> Visibility {
    let Some(c) = index.get(comment) else {
        return Visibility::masked();
    };
    if !c.hidden && !index.ancestors(comment).any(|a| a.hidden) {
        return Visibility::plain();
    }
    let Some(viewer_id) = viewer.id() else {
        return Visibility::masked();
    };
    let allowed = viewer_id == c.author_id
        || viewer_id == post_author
        || index.ancestors(comment).any(|a| a.author_id == viewer_id);
    match allowed {
        true => Visibility::unmasked(),
        false => Visibility::masked(),
    }
}
