//! Durability hook invoked by the entity store before it mutates memory.

use crate::error::Result;
use crate::types::{Comment, Post, PostId};

/// Receives every accepted mutation, inside the store's critical section.
///
/// Each method runs after validation and before the in-memory change. An
/// error aborts the mutation, so memory never gets ahead of the journal.
pub trait Journal: Send + Sync {
    fn post_created(&self, post: &Post) -> Result<()>;

    fn comment_created(&self, comment: &Comment) -> Result<()>;

    /// Only called on the true→false transition, never for repeats.
    fn comments_disabled(&self, post_id: &PostId) -> Result<()>;

    /// Flush anything buffered.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Journal for the purely in-memory backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoJournal;

impl Journal for NoJournal {
    fn post_created(&self, _post: &Post) -> Result<()> {
        Ok(())
    }

    fn comment_created(&self, _comment: &Comment) -> Result<()> {
        Ok(())
    }

    fn comments_disabled(&self, _post_id: &PostId) -> Result<()> {
        Ok(())
    }
}
