//! Subscription hub broadcasting new comments to per-post listeners.

use crate::context::Context;
use crate::error::{Result, StoreError};
use crate::types::{Comment, PostId};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::types::{
    CloseReason, CommentEvent, HubConfig, ListenerHandle, ListenerId, OverflowPolicy,
};

/// Internal listener state.
struct Listener {
    sender: Sender<CommentEvent>,
}

impl Listener {
    /// Best-effort close notice; the buffer may already be full.
    fn close(self, reason: CloseReason) {
        let _ = self.sender.try_send(CommentEvent::Closed { reason });
    }
}

/// Listener registry.
#[derive(Default)]
struct Registry {
    /// Listeners keyed by the post they follow.
    by_post: HashMap<PostId, HashMap<ListenerId, Listener>>,
    /// Reverse index for unsubscribe.
    post_of: HashMap<ListenerId, PostId>,
    /// Set once by shutdown.
    closed: bool,
}

impl Registry {
    fn insert(&mut self, id: ListenerId, post_id: PostId, listener: Listener) {
        self.by_post
            .entry(post_id.clone())
            .or_default()
            .insert(id, listener);
        self.post_of.insert(id, post_id);
    }

    fn remove(&mut self, id: ListenerId) -> Option<Listener> {
        let post_id = self.post_of.remove(&id)?;
        let listeners = self.by_post.get_mut(&post_id)?;
        let listener = listeners.remove(&id);
        if listeners.is_empty() {
            self.by_post.remove(&post_id);
        }
        listener
    }
}

/// Fans newly created comments out to live listeners.
///
/// Delivery never blocks: each listener has a bounded buffer and a full
/// buffer is handled by the configured [`OverflowPolicy`], so one slow
/// listener can't hold up the others or the comment's creator.
pub struct SubscriptionHub {
    registry: RwLock<Registry>,
    /// Counter for generating listener IDs.
    next_id: AtomicU64,
    config: HubConfig,
}

impl SubscriptionHub {
    /// Create a hub with default configuration.
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Register a listener for comments on `post_id`.
    ///
    /// Only comments published after this call are delivered.
    pub fn subscribe(&self, ctx: &Context, post_id: &PostId) -> Result<ListenerHandle> {
        ctx.check()?;

        let mut registry = self.registry.write();
        if registry.closed {
            return Err(StoreError::HubClosed);
        }

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.config.buffer_size.max(1));
        registry.insert(id, post_id.clone(), Listener { sender });

        debug!(listener = %id, post_id = %post_id, "listener subscribed");
        Ok(ListenerHandle::new(id, post_id.clone(), receiver))
    }

    /// Remove a listener. Unknown or already-closed listeners are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        let removed = self.registry.write().remove(id);
        if let Some(listener) = removed {
            listener.close(CloseReason::Unsubscribed);
            debug!(listener = %id, "listener unsubscribed");
        }
    }

    /// Deliver a comment to every listener on its post.
    ///
    /// Returns how many listeners accepted it.
    pub fn publish(&self, ctx: &Context, comment: &Comment) -> Result<usize> {
        ctx.check()?;

        let event = CommentEvent::Comment {
            comment: comment.clone(),
        };
        let mut delivered = 0;
        let mut to_remove = Vec::new();

        {
            let registry = self.registry.read();
            if let Some(listeners) = registry.by_post.get(&comment.post_id) {
                for (id, listener) in listeners {
                    match listener.sender.try_send(event.clone()) {
                        Ok(()) => delivered += 1,
                        Err(TrySendError::Full(_)) => match self.config.overflow {
                            OverflowPolicy::Disconnect => {
                                to_remove.push((*id, Some(CloseReason::BufferOverflow)))
                            }
                            OverflowPolicy::DropNewest => {
                                debug!(listener = %id, comment_id = %comment.id, "listener buffer full, event skipped");
                            }
                        },
                        // Handle was dropped
                        Err(TrySendError::Disconnected(_)) => to_remove.push((*id, None)),
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            let mut registry = self.registry.write();
            for (id, reason) in to_remove {
                if let Some(listener) = registry.remove(id) {
                    match reason {
                        Some(reason) => {
                            warn!(listener = %id, post_id = %comment.post_id, "dropping slow listener");
                            listener.close(reason);
                        }
                        None => debug!(listener = %id, "pruned disconnected listener"),
                    }
                }
            }
        }

        Ok(delivered)
    }

    /// Close every listener and refuse new ones.
    pub fn shutdown(&self) {
        let mut registry = self.registry.write();
        if registry.closed {
            return;
        }
        registry.closed = true;

        let count = registry.post_of.len();
        registry.post_of.clear();
        for (_, listeners) in registry.by_post.drain() {
            for (_, listener) in listeners {
                listener.close(CloseReason::Shutdown);
            }
        }

        info!(listeners = count, "subscription hub shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.registry.read().closed
    }

    /// Get listener count.
    pub fn listener_count(&self) -> usize {
        self.registry.read().post_of.len()
    }

    /// Get listener count for one post.
    pub fn listener_count_for(&self, post_id: &PostId) -> usize {
        self.registry
            .read()
            .by_post
            .get(post_id)
            .map_or(0, |listeners| listeners.len())
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new()
    }
}
