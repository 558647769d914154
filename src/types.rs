//! Core types for the forum store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Maximum comment length, in Unicode scalar values.
pub const MAX_COMMENT_CHARS: usize = 2000;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Fresh random identifier (UUID v4).
            pub fn generate() -> Self {
                $name(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

string_id!(
    /// Opaque, globally unique post identifier.
    PostId
);

string_id!(
    /// Opaque, globally unique comment identifier.
    CommentId
);

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }

    /// Current time, bumped past `prev` so creation order and time order agree.
    pub fn now_after(prev: Option<Timestamp>) -> Self {
        let now = Self::now();
        match prev {
            Some(prev) if now <= prev => Timestamp(prev.0.saturating_add(1)),
            _ => now,
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// What a comment hangs off: the post itself (first comment) or its predecessor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ParentRef {
    Post(PostId),
    Comment(CommentId),
}

impl ParentRef {
    /// The raw identifier, as stored in the `parent_id` column.
    pub fn as_str(&self) -> &str {
        match self {
            ParentRef::Post(id) => id.as_str(),
            ParentRef::Comment(id) => id.as_str(),
        }
    }
}

/// A top-level discussion item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author: String,
    pub comments_enabled: bool,
    pub created_at: Timestamp,
}

/// A reply attached to a post, linked into the post's comment chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    /// Assigned by the store; never the caller's choice.
    pub parent: ParentRef,
    pub author: String,
    pub content: String,
    pub created_at: Timestamp,
}

/// Input for inserting a post (before `created_at` is assigned).
#[derive(Clone, Debug)]
pub struct PostInput {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author: String,
    pub comments_enabled: bool,
}

impl PostInput {
    pub fn new(
        id: impl Into<PostId>,
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            author: author.into(),
            comments_enabled: true,
        }
    }

    /// Start with commenting switched off.
    pub fn comments_disabled(mut self) -> Self {
        self.comments_enabled = false;
        self
    }
}

/// Input for inserting a comment (before parent and `created_at` are assigned).
#[derive(Clone, Debug)]
pub struct CommentInput {
    pub id: CommentId,
    pub post_id: PostId,
    /// Accepted but overwritten by the chain successor computation.
    pub parent: Option<ParentRef>,
    pub author: String,
    pub content: String,
}

impl CommentInput {
    pub fn new(
        id: impl Into<CommentId>,
        post_id: impl Into<PostId>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            post_id: post_id.into(),
            parent: None,
            author: author.into(),
            content: content.into(),
        }
    }

    pub fn with_parent(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Post as submitted by an API client; the id is generated on creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author: String,
    pub comments_enabled: bool,
}

/// Comment as submitted by an API client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub post_id: PostId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub author: String,
    pub content: String,
}

/// A post together with a page of its comments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostWithComments {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// Offset/limit window over an ordered listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Page {
    /// Maximum items to return (None = no limit).
    pub limit: Option<usize>,
    /// Items to skip from the start.
    pub offset: usize,
}

impl Page {
    /// Everything, from the start.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    /// Apply this window to an ordered sequence.
    pub fn apply<'a, T: Clone + 'a>(&self, items: impl IntoIterator<Item = &'a T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).cloned().collect(),
            None => iter.cloned().collect(),
        }
    }
}
