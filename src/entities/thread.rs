//! Per-post state: the immutable post fields plus the lockable comment chain.

use crate::types::{Comment, ParentRef, Post, PostId, Timestamp};
use parking_lot::Mutex;

/// One post and everything that may change about it.
///
/// The post's own fields never change after creation. The enabled flag and
/// the comment chain share one mutex, so disabling comments and appending
/// to the chain are serialized per post and never across posts.
pub(crate) struct PostSlot {
    pub(crate) id: PostId,
    title: String,
    content: String,
    author: String,
    pub(crate) created_at: Timestamp,
    pub(crate) thread: Mutex<Thread>,
}

/// Mutable part of a post.
pub(crate) struct Thread {
    pub(crate) comments_enabled: bool,
    /// Linear chain in creation order; each entry's parent is its predecessor.
    pub(crate) comments: Vec<Comment>,
}

impl PostSlot {
    pub(crate) fn new(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            author: post.author,
            created_at: post.created_at,
            thread: Mutex::new(Thread {
                comments_enabled: post.comments_enabled,
                comments: Vec::new(),
            }),
        }
    }

    /// Owned copy of the post as it is right now.
    pub(crate) fn snapshot(&self) -> Post {
        let comments_enabled = self.thread.lock().comments_enabled;
        self.to_post(comments_enabled)
    }

    pub(crate) fn to_post(&self, comments_enabled: bool) -> Post {
        Post {
            id: self.id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            author: self.author.clone(),
            comments_enabled,
            created_at: self.created_at,
        }
    }
}

impl Thread {
    /// Parent for the next comment: the chain tail, or the post itself.
    pub(crate) fn next_parent(&self, post_id: &PostId) -> ParentRef {
        match self.comments.last() {
            Some(last) => ParentRef::Comment(last.id.clone()),
            None => ParentRef::Post(post_id.clone()),
        }
    }

    pub(crate) fn last_created(&self) -> Option<Timestamp> {
        self.comments.last().map(|c| c.created_at)
    }
}
