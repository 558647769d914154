//! Canonical in-memory posts and comment chains.

use super::journal::{Journal, NoJournal};
use super::thread::PostSlot;
use crate::context::Context;
use crate::error::{Result, StoreError};
use crate::types::{
    Comment, CommentId, CommentInput, Page, Post, PostId, PostInput, Timestamp,
    MAX_COMMENT_CHARS,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Post lookup plus creation order.
#[derive(Default)]
struct PostTable {
    by_id: HashMap<PostId, Arc<PostSlot>>,
    /// Slots in creation order.
    order: Vec<Arc<PostSlot>>,
}

impl PostTable {
    fn last_created(&self) -> Option<Timestamp> {
        self.order.last().map(|slot| slot.created_at)
    }

    fn insert(&mut self, slot: Arc<PostSlot>) {
        self.by_id.insert(slot.id.clone(), Arc::clone(&slot));
        self.order.push(slot);
    }
}

/// Owns every post and comment.
///
/// The post table lock is held only long enough to find or insert a slot.
/// Comment appends and disables lock the target post's slot alone, so
/// writers on different posts never wait for each other.
///
/// Comment ids are unique across all posts. The id set is only ever locked
/// while a slot lock is held, never the other way round.
pub struct EntityStore<J: Journal = NoJournal> {
    posts: RwLock<PostTable>,
    comment_ids: Mutex<HashSet<CommentId>>,
    journal: J,
}

impl EntityStore<NoJournal> {
    /// Create an empty, purely in-memory store.
    pub fn new() -> Self {
        Self::with_journal(NoJournal)
    }
}

impl Default for EntityStore<NoJournal> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J: Journal> EntityStore<J> {
    /// Create an empty store that reports mutations to `journal`.
    pub fn with_journal(journal: J) -> Self {
        Self {
            posts: RwLock::new(PostTable::default()),
            comment_ids: Mutex::new(HashSet::new()),
            journal,
        }
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    // --- Posts ---

    /// Insert a new post. The store assigns `created_at`.
    pub fn create_post(&self, ctx: &Context, input: PostInput) -> Result<Post> {
        ctx.check()?;

        let mut table = self.posts.write();
        ctx.check()?;

        if table.by_id.contains_key(&input.id) {
            return Err(StoreError::DuplicatePost(input.id));
        }

        let post = Post {
            id: input.id,
            title: input.title,
            content: input.content,
            author: input.author,
            comments_enabled: input.comments_enabled,
            created_at: Timestamp::now_after(table.last_created()),
        };

        self.journal.post_created(&post)?;
        table.insert(Arc::new(PostSlot::new(post.clone())));

        debug!(post_id = %post.id, author = %post.author, "post created");
        Ok(post)
    }

    /// Get a post by ID.
    pub fn get_post(&self, ctx: &Context, id: &PostId) -> Result<Post> {
        ctx.check()?;
        Ok(self.slot(id)?.snapshot())
    }

    /// List posts in creation order.
    pub fn list_posts(&self, ctx: &Context, page: Page) -> Result<Vec<Post>> {
        ctx.check()?;
        let slots = page.apply(&self.posts.read().order);
        Ok(slots.iter().map(|slot| slot.snapshot()).collect())
    }

    /// Switch commenting off. Repeated calls are no-ops.
    pub fn disable_comments(&self, ctx: &Context, post_id: &PostId) -> Result<()> {
        ctx.check()?;
        let slot = self.slot(post_id)?;

        let mut thread = slot.thread.lock();
        ctx.check()?;

        if !thread.comments_enabled {
            return Ok(());
        }

        self.journal.comments_disabled(post_id)?;
        thread.comments_enabled = false;

        debug!(post_id = %post_id, "comments disabled");
        Ok(())
    }

    // --- Comments ---

    /// Append a comment to its post's chain.
    ///
    /// The parent is always the current chain tail (or the post for the
    /// first comment); any parent on the input is ignored.
    pub fn create_comment(&self, ctx: &Context, input: CommentInput) -> Result<Comment> {
        ctx.check()?;
        let slot = self.slot(&input.post_id)?;
        let length = input.content.chars().count();

        let mut thread = slot.thread.lock();
        ctx.check()?;

        if !thread.comments_enabled {
            return Err(StoreError::CommentsDisabled(input.post_id));
        }
        if length > MAX_COMMENT_CHARS {
            return Err(StoreError::CommentTooLong {
                length,
                max: MAX_COMMENT_CHARS,
            });
        }

        let parent = thread.next_parent(&slot.id);
        if let Some(requested) = &input.parent {
            if *requested != parent {
                debug!(
                    comment_id = %input.id,
                    requested = requested.as_str(),
                    assigned = parent.as_str(),
                    "requested parent replaced by chain tail"
                );
            }
        }

        let comment = Comment {
            id: input.id,
            post_id: input.post_id,
            parent,
            author: input.author,
            content: input.content,
            created_at: Timestamp::now_after(thread.last_created()),
        };

        if !self.comment_ids.lock().insert(comment.id.clone()) {
            return Err(StoreError::DuplicateComment(comment.id));
        }
        if let Err(err) = self.journal.comment_created(&comment) {
            self.comment_ids.lock().remove(&comment.id);
            return Err(err);
        }
        thread.comments.push(comment.clone());

        debug!(
            comment_id = %comment.id,
            post_id = %comment.post_id,
            parent = comment.parent.as_str(),
            "comment created"
        );
        Ok(comment)
    }

    /// Comments on a post, in chain order.
    pub fn get_comments_by_post(
        &self,
        ctx: &Context,
        post_id: &PostId,
        page: Page,
    ) -> Result<Vec<Comment>> {
        ctx.check()?;
        let slot = self.slot(post_id)?;
        let thread = slot.thread.lock();
        Ok(page.apply(&thread.comments))
    }

    // --- Stats ---

    pub fn post_count(&self) -> usize {
        self.posts.read().order.len()
    }

    pub fn comment_count(&self) -> usize {
        let slots: Vec<_> = self.posts.read().order.clone();
        slots.iter().map(|slot| slot.thread.lock().comments.len()).sum()
    }

    /// Flush the journal.
    pub fn sync(&self) -> Result<()> {
        self.journal.sync()
    }

    // --- Replay (bypasses the journal) ---

    pub(crate) fn restore_post(&self, post: Post) -> Result<()> {
        let mut table = self.posts.write();
        if table.by_id.contains_key(&post.id) {
            return Err(StoreError::Corruption(format!(
                "post {} recorded twice",
                post.id
            )));
        }
        table.insert(Arc::new(PostSlot::new(post)));
        Ok(())
    }

    pub(crate) fn restore_disable(&self, post_id: &PostId) -> Result<()> {
        let slot = self.restored_slot(post_id)?;
        slot.thread.lock().comments_enabled = false;
        Ok(())
    }

    pub(crate) fn restore_comment(&self, comment: Comment) -> Result<()> {
        let slot = self.restored_slot(&comment.post_id)?;
        let mut thread = slot.thread.lock();
        let expected = thread.next_parent(&slot.id);
        if comment.parent != expected {
            return Err(StoreError::Corruption(format!(
                "comment {} breaks the chain of post {}: parent {} (expected {})",
                comment.id,
                comment.post_id,
                comment.parent.as_str(),
                expected.as_str()
            )));
        }
        if !self.comment_ids.lock().insert(comment.id.clone()) {
            return Err(StoreError::Corruption(format!(
                "comment {} recorded twice",
                comment.id
            )));
        }
        thread.comments.push(comment);
        Ok(())
    }

    fn restored_slot(&self, post_id: &PostId) -> Result<Arc<PostSlot>> {
        self.slot(post_id).map_err(|_| {
            StoreError::Corruption(format!("entry refers to unknown post {}", post_id))
        })
    }

    fn slot(&self, id: &PostId) -> Result<Arc<PostSlot>> {
        self.posts
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::PostNotFound(id.clone()))
    }
}
