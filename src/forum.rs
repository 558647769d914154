//! Forum: storage and live updates behind one handle.
//!
//! This is what a request resolver holds. It generates identifiers, makes
//! sure every committed comment reaches the hub, and refuses subscriptions
//! to posts that don't exist.

use crate::context::Context;
use crate::error::Result;
use crate::storage::{open_storage, BackendConfig, Storage};
use crate::subscriptions::{HubConfig, ListenerHandle, ListenerId, SubscriptionHub};
use crate::types::{
    Comment, CommentId, CommentInput, NewComment, NewPost, Page, ParentRef, Post, PostId,
    PostInput, PostWithComments,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Forum configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForumConfig {
    pub backend: BackendConfig,
    pub hub: HubConfig,
}

impl ForumConfig {
    /// Parse a JSON configuration document; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Storage plus subscription hub.
pub struct Forum {
    storage: Arc<dyn Storage>,
    hub: SubscriptionHub,
}

impl Forum {
    /// Open the configured backend and start an empty hub.
    pub fn open(config: ForumConfig) -> Result<Self> {
        let storage = open_storage(&config.backend)?;
        Ok(Self::with_storage(storage, config.hub))
    }

    pub fn with_storage(storage: Arc<dyn Storage>, hub: HubConfig) -> Self {
        Self {
            storage,
            hub: SubscriptionHub::with_config(hub),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn hub(&self) -> &SubscriptionHub {
        &self.hub
    }

    // --- Posts ---

    pub fn create_post(&self, ctx: &Context, new: NewPost) -> Result<Post> {
        let mut input = PostInput::new(PostId::generate(), new.title, new.content, new.author);
        input.comments_enabled = new.comments_enabled;
        self.storage.create_post(ctx, input)
    }

    pub fn post(&self, ctx: &Context, id: &PostId) -> Result<Post> {
        self.storage.get_post(ctx, id)
    }

    pub fn posts(&self, ctx: &Context, page: Page) -> Result<Vec<Post>> {
        self.storage.list_posts(ctx, page)
    }

    pub fn post_with_comments(
        &self,
        ctx: &Context,
        id: &PostId,
        page: Page,
    ) -> Result<PostWithComments> {
        let post = self.storage.get_post(ctx, id)?;
        let comments = self.storage.get_comments_by_post(ctx, id, page)?;
        Ok(PostWithComments { post, comments })
    }

    pub fn disable_comments(&self, ctx: &Context, id: &PostId) -> Result<()> {
        self.storage.disable_comments(ctx, id)
    }

    // --- Comments ---

    /// Store a comment and announce it to the post's listeners.
    ///
    /// Once stored, the comment is published even if `ctx` is cancelled in
    /// between, so listeners never miss a committed comment.
    pub fn create_comment(&self, ctx: &Context, new: NewComment) -> Result<Comment> {
        let mut input = CommentInput::new(
            CommentId::generate(),
            new.post_id,
            new.author,
            new.content,
        );
        if let Some(parent_id) = new.parent_id {
            let parent = requested_parent(&input.post_id, parent_id);
            input = input.with_parent(parent);
        }

        let comment = self.storage.create_comment(ctx, input)?;
        let delivered = self.hub.publish(&Context::background(), &comment)?;
        debug!(comment_id = %comment.id, delivered, "comment published");

        Ok(comment)
    }

    pub fn comments(&self, ctx: &Context, post_id: &PostId, page: Page) -> Result<Vec<Comment>> {
        self.storage.get_comments_by_post(ctx, post_id, page)
    }

    // --- Live updates ---

    /// Follow new comments on an existing post.
    pub fn subscribe(&self, ctx: &Context, post_id: &PostId) -> Result<ListenerHandle> {
        self.storage.get_post(ctx, post_id)?;
        self.hub.subscribe(ctx, post_id)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.hub.unsubscribe(id)
    }

    /// Close all listeners and flush storage.
    pub fn shutdown(&self) -> Result<()> {
        self.hub.shutdown();
        self.storage.sync()?;
        info!("forum shut down");
        Ok(())
    }
}

/// A client names either the post itself or a comment as the parent.
fn requested_parent(post_id: &PostId, parent_id: String) -> ParentRef {
    if parent_id == post_id.as_str() {
        ParentRef::Post(post_id.clone())
    } else {
        ParentRef::Comment(CommentId(parent_id))
    }
}
