//! Directory-backed storage built on the entity store plus two table logs.

use super::log::TableLog;
use crate::context::Context;
use crate::entities::{EntityStore, Journal};
use crate::error::{Result, StoreError};
use crate::storage::Storage;
use crate::types::{
    Comment, CommentId, CommentInput, Page, ParentRef, Post, PostId, PostInput, Timestamp,
};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"FRM\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

const POSTS_LOG: &str = "posts.log";
const COMMENTS_LOG: &str = "comments.log";

/// Log storage configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory holding the manifest, lock and table logs.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Sync the logs every N writes.
    pub sync_interval: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./forum-data"),
            create_if_missing: true,
            sync_interval: 100,
        }
    }
}

/// Row of the `posts` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct PostRow {
    id: String,
    title: String,
    content: String,
    author: String,
    comments_enabled: bool,
    created_at: i64,
}

/// Row of the `comments` table. `parent_id` names the post or the previous comment.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CommentRow {
    id: String,
    post_id: String,
    parent_id: String,
    content: String,
    author: String,
    created_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
enum PostEntry {
    Insert(PostRow),
    DisableComments { id: String },
}

#[derive(Debug, Serialize, Deserialize)]
enum CommentEntry {
    Insert(CommentRow),
}

impl From<&Post> for PostRow {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.0.clone(),
            title: post.title.clone(),
            content: post.content.clone(),
            author: post.author.clone(),
            comments_enabled: post.comments_enabled,
            created_at: post.created_at.0,
        }
    }
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: PostId(row.id),
            title: row.title,
            content: row.content,
            author: row.author,
            comments_enabled: row.comments_enabled,
            created_at: Timestamp(row.created_at),
        }
    }
}

impl From<&Comment> for CommentRow {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id.0.clone(),
            post_id: comment.post_id.0.clone(),
            parent_id: comment.parent.as_str().to_string(),
            content: comment.content.clone(),
            author: comment.author.clone(),
            created_at: comment.created_at.0,
        }
    }
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        let parent = if row.parent_id == row.post_id {
            ParentRef::Post(PostId(row.parent_id))
        } else {
            ParentRef::Comment(CommentId(row.parent_id))
        };
        Self {
            id: CommentId(row.id),
            post_id: PostId(row.post_id),
            parent,
            author: row.author,
            content: row.content,
            created_at: Timestamp(row.created_at),
        }
    }
}

/// Journal writing to the two table logs.
struct TableJournal {
    posts: TableLog<PostEntry>,
    comments: TableLog<CommentEntry>,
}

impl Journal for TableJournal {
    fn post_created(&self, post: &Post) -> Result<()> {
        self.posts.append(&PostEntry::Insert(PostRow::from(post)))?;
        Ok(())
    }

    fn comment_created(&self, comment: &Comment) -> Result<()> {
        self.comments
            .append(&CommentEntry::Insert(CommentRow::from(comment)))?;
        Ok(())
    }

    fn comments_disabled(&self, post_id: &PostId) -> Result<()> {
        self.posts.append(&PostEntry::DisableComments {
            id: post_id.0.clone(),
        })?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.posts.sync()?;
        self.comments.sync()
    }
}

/// Persistent backend: every mutation is appended to a table log before it
/// becomes visible, and the logs are replayed into memory on open.
pub struct LogStorage {
    config: LogConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    store: EntityStore<TableJournal>,
}

impl LogStorage {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: LogConfig) -> Result<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new store.
    pub fn create(config: LogConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;
        Self::load(config)
    }

    /// Open an existing store.
    pub fn open(config: LogConfig) -> Result<Self> {
        if !config.path.exists() {
            return Err(StoreError::NotInitialized);
        }
        Self::verify_manifest(&config.path)?;
        Self::load(config)
    }

    fn load(config: LogConfig) -> Result<Self> {
        let lock_file = Self::acquire_lock(&config.path)?;

        let (posts, post_entries) =
            TableLog::<PostEntry>::open(config.path.join(POSTS_LOG), config.sync_interval)?;
        let (comments, comment_entries) =
            TableLog::<CommentEntry>::open(config.path.join(COMMENTS_LOG), config.sync_interval)?;

        let store = EntityStore::with_journal(TableJournal { posts, comments });
        Self::replay(&store, post_entries, comment_entries)?;

        info!(
            path = %config.path.display(),
            posts = store.post_count(),
            comments = store.comment_count(),
            "log storage opened"
        );

        Ok(Self {
            config,
            _lock_file: lock_file,
            store,
        })
    }

    fn replay(
        store: &EntityStore<TableJournal>,
        posts: Vec<PostEntry>,
        comments: Vec<CommentEntry>,
    ) -> Result<()> {
        for entry in posts {
            match entry {
                PostEntry::Insert(row) => store.restore_post(Post::from(row))?,
                PostEntry::DisableComments { id } => store.restore_disable(&PostId(id))?,
            }
        }
        for entry in comments {
            match entry {
                CommentEntry::Insert(row) => store.restore_comment(Comment::from(row))?,
            }
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn post_count(&self) -> usize {
        self.store.post_count()
    }

    pub fn comment_count(&self) -> usize {
        self.store.comment_count()
    }

    /// Force all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    fn write_manifest(path: &Path) -> Result<()> {
        use std::io::Write;

        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        use std::io::Read;

        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

impl Storage for LogStorage {
    fn create_post(&self, ctx: &Context, input: PostInput) -> Result<Post> {
        self.store.create_post(ctx, input)
    }

    fn get_post(&self, ctx: &Context, id: &PostId) -> Result<Post> {
        self.store.get_post(ctx, id)
    }

    fn list_posts(&self, ctx: &Context, page: Page) -> Result<Vec<Post>> {
        self.store.list_posts(ctx, page)
    }

    fn disable_comments(&self, ctx: &Context, post_id: &PostId) -> Result<()> {
        self.store.disable_comments(ctx, post_id)
    }

    fn create_comment(&self, ctx: &Context, input: CommentInput) -> Result<Comment> {
        self.store.create_comment(ctx, input)
    }

    fn get_comments_by_post(
        &self,
        ctx: &Context,
        post_id: &PostId,
        page: Page,
    ) -> Result<Vec<Comment>> {
        self.store.get_comments_by_post(ctx, post_id, page)
    }

    fn sync(&self) -> Result<()> {
        self.store.sync()
    }
}

impl Drop for LogStorage {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.store.sync();
    }
}
