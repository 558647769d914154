//! Live comment subscriptions.
//!
//! Listeners register for one post and receive every comment published for
//! it afterwards. Subscriptions support:
//! - Many listeners per post
//! - Bounded buffers with a drop-or-disconnect overflow policy
//! - Idempotent unsubscribe and pruning of dropped handles
//!
//! # Example
//!
//! ```ignore
//! let hub = SubscriptionHub::new();
//! let handle = hub.subscribe(&Context::background(), &post_id)?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(CommentEvent::Comment { comment }) => println!("new comment: {}", comment.content),
//!         Ok(CommentEvent::Closed { reason }) => break,
//!         Err(_) => break,
//!     }
//! }
//! ```

mod hub;
mod types;

pub use hub::SubscriptionHub;
pub use types::{
    CloseReason, CommentEvent, HubConfig, ListenerHandle, ListenerId, OverflowPolicy,
};
