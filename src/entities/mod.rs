//! Entity store: canonical posts and per-post comment chains.
//!
//! Posts live in one table guarded by a short-lived lock. Each post owns a
//! slot with its own mutex covering the comments-enabled flag and the
//! comment chain, so:
//! - appends to one post are serialized and form a single linear chain
//! - disabling comments is atomic with respect to concurrent appends
//! - appends to different posts proceed in parallel
//!
//! A [`Journal`] sees every accepted mutation before memory changes, which
//! is how the persistent backend reuses this store.

mod journal;
mod store;
mod thread;

pub use journal::{Journal, NoJournal};
pub use store::EntityStore;
