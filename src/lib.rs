//! # Forum Store
//!
//! Storage and live-update core for a minimal discussion forum.
//!
//! ## Core Concepts
//!
//! - **Posts**: Top-level items; commenting can be switched off, never back on
//! - **Comment chains**: Each post's comments form one linear chain in creation order
//! - **Storage**: One contract, in-memory or log-backed, chosen at startup
//! - **Subscriptions**: Bounded, non-blocking fan-out of new comments per post
//!
//! ## Example
//!
//! ```ignore
//! use forum_store::{Context, Forum, ForumConfig, NewComment, NewPost};
//!
//! let forum = Forum::open(ForumConfig::default())?;
//! let ctx = Context::background();
//!
//! let post = forum.create_post(&ctx, NewPost {
//!     title: "Hello".into(),
//!     content: "First post".into(),
//!     author: "ann".into(),
//!     comments_enabled: true,
//! })?;
//!
//! let listener = forum.subscribe(&ctx, &post.id)?;
//! let comment = forum.create_comment(&ctx, NewComment {
//!     post_id: post.id.clone(),
//!     parent_id: None,
//!     author: "bob".into(),
//!     content: "hi!".into(),
//! })?;
//! ```

pub mod context;
pub mod entities;
pub mod error;
pub mod forum;
pub mod persistent;
pub mod storage;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use context::Context;
pub use entities::{EntityStore, Journal, NoJournal};
pub use error::{Result, StoreError};
pub use forum::{Forum, ForumConfig};
pub use persistent::{LogConfig, LogStorage, TableLog};
pub use storage::{open_storage, BackendConfig, MemoryStorage, Storage};
pub use subscriptions::{
    CloseReason, CommentEvent, HubConfig, ListenerHandle, ListenerId, OverflowPolicy,
    SubscriptionHub,
};
pub use types::*;
