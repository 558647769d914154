//! Persistent backend.
//!
//! Mirrors the two-table layout of a relational deployment:
//! `posts(id, title, content, author, comments_enabled, created_at)` and
//! `comments(id, post_id, parent_id, content, author, created_at)`, each
//! kept as an append-only log of checksummed MessagePack frames.
//!
//! ```text
//! <path>/MANIFEST      magic + version
//! <path>/LOCK          exclusive advisory lock
//! <path>/posts.log     Insert(row) | DisableComments { id }
//! <path>/comments.log  Insert(row)
//! ```

mod log;
mod store;

pub use log::TableLog;
pub use store::{LogConfig, LogStorage};
