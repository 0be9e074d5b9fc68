use std::collections::{HashMap, HashSet};

use crate::api::{Comment, CommentId};

/// One rendered node: a comment plus its replies, oldest first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(|c| c.count()).sum::<usize>()
    }

    pub fn find(&self, id: CommentId) -> Option<&CommentNode> {
        if self.comment.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// Builds the reply forest from the flat snapshot of one post's
/// comments, as the store delivers it: created ascending, ties in
/// stable store order. Sibling order is input order.
///
/// A comment whose declared parent is not part of the snapshot is
/// dropped from the forest, not promoted to the roots. That is what
/// keeps a deleted parent's replies out of the rendered thread while
/// they still sit in the store.
pub fn build(comments: &[Comment]) -> Vec<CommentNode> {
    let ids: HashSet<CommentId> = comments.iter().map(|c| c.id).collect();
    let mut roots: Vec<&Comment> = Vec::new();
    let mut replies: HashMap<CommentId, Vec<&Comment>> = HashMap::new();
    for c in comments {
        match c.parent_id {
            None => roots.push(c),
            Some(p) if ids.contains(&p) => replies.entry(p).or_default().push(c),
            Some(p) => {
                tracing::warn!(comment = ?c.id, parent = ?p, "dropping comment with unknown parent");
            }
        }
    }
    roots.iter().map(|c| assemble(c, &replies)).collect()
}

fn assemble(comment: &Comment, replies: &HashMap<CommentId, Vec<&Comment>>) -> CommentNode {
    CommentNode {
        comment: comment.clone(),
        children: replies
            .get(&comment.id)
            .map(|cs| cs.iter().map(|c| assemble(c, replies)).collect())
            .unwrap_or_default(),
    }
}

pub fn count(forest: &[CommentNode]) -> usize {
    forest.iter().map(|n| n.count()).sum()
}

pub fn find(forest: &[CommentNode], id: CommentId) -> Option<&CommentNode> {
    forest.iter().find_map(|n| n.find(id))
}
