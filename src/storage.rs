//! Storage facade shared by every backend.
//!
//! The API layer talks to `dyn Storage` only. Which backend sits behind it
//! is decided once, at startup, from a [`BackendConfig`].

use crate::context::Context;
use crate::entities::{EntityStore, Journal, NoJournal};
use crate::error::{Result, StoreError};
use crate::persistent::{LogConfig, LogStorage};
use crate::types::{Comment, CommentInput, Page, Post, PostId, PostInput};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Operations every backend provides, with identical failure semantics.
pub trait Storage: Send + Sync {
    fn create_post(&self, ctx: &Context, input: PostInput) -> Result<Post>;

    fn get_post(&self, ctx: &Context, id: &PostId) -> Result<Post>;

    /// Posts in creation order.
    fn list_posts(&self, ctx: &Context, page: Page) -> Result<Vec<Post>>;

    fn disable_comments(&self, ctx: &Context, post_id: &PostId) -> Result<()>;

    /// Append to the post's chain; the parent is assigned by the backend.
    fn create_comment(&self, ctx: &Context, input: CommentInput) -> Result<Comment>;

    /// Comments in creation order.
    fn get_comments_by_post(
        &self,
        ctx: &Context,
        post_id: &PostId,
        page: Page,
    ) -> Result<Vec<Comment>>;

    /// Flush pending writes.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// The purely in-memory backend.
pub type MemoryStorage = EntityStore<NoJournal>;

impl<J: Journal> Storage for EntityStore<J> {
    fn create_post(&self, ctx: &Context, input: PostInput) -> Result<Post> {
        EntityStore::create_post(self, ctx, input)
    }

    fn get_post(&self, ctx: &Context, id: &PostId) -> Result<Post> {
        EntityStore::get_post(self, ctx, id)
    }

    fn list_posts(&self, ctx: &Context, page: Page) -> Result<Vec<Post>> {
        EntityStore::list_posts(self, ctx, page)
    }

    fn disable_comments(&self, ctx: &Context, post_id: &PostId) -> Result<()> {
        EntityStore::disable_comments(self, ctx, post_id)
    }

    fn create_comment(&self, ctx: &Context, input: CommentInput) -> Result<Comment> {
        EntityStore::create_comment(self, ctx, input)
    }

    fn get_comments_by_post(
        &self,
        ctx: &Context,
        post_id: &PostId,
        page: Page,
    ) -> Result<Vec<Comment>> {
        EntityStore::get_comments_by_post(self, ctx, post_id, page)
    }

    fn sync(&self) -> Result<()> {
        EntityStore::sync(self)
    }
}

/// Which backend to run.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    #[default]
    Memory,
    Log(LogConfig),
}

impl FromStr for BackendConfig {
    type Err = StoreError;

    /// Accepts `memory` or `log:<path>`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            None if s == "memory" => Ok(BackendConfig::Memory),
            Some(("log", path)) if !path.is_empty() => Ok(BackendConfig::Log(LogConfig {
                path: PathBuf::from(path),
                ..Default::default()
            })),
            _ => Err(StoreError::InvalidConfig(format!(
                "unknown storage backend {:?} (expected memory or log:<path>)",
                s
            ))),
        }
    }
}

/// Open the configured backend.
pub fn open_storage(config: &BackendConfig) -> Result<Arc<dyn Storage>> {
    match config {
        BackendConfig::Memory => {
            info!("using in-memory storage");
            Ok(Arc::new(MemoryStorage::new()))
        }
        BackendConfig::Log(log) => {
            info!(path = %log.path.display(), "using log storage");
            Ok(Arc::new(LogStorage::open_or_create(log.clone())?))
        }
    }
}
