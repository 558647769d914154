//! Subscription types for live comment updates.

use crate::types::{Comment, PostId};
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Hub configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Max buffered events per listener.
    /// Default: 64
    pub buffer_size: usize,

    /// What to do when a listener's buffer is full.
    pub overflow: OverflowPolicy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            overflow: OverflowPolicy::default(),
        }
    }
}

/// Policy for a listener that is not keeping up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Remove the listener; it sees its channel close once drained.
    #[default]
    Disconnect,
    /// Keep the listener but skip the event it has no room for.
    DropNewest,
}

/// Events delivered to a listener.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommentEvent {
    /// A comment was created on the subscribed post.
    Comment { comment: Comment },

    /// The listener was closed; nothing follows.
    Closed { reason: CloseReason },
}

/// Why a listener was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The hub shut down.
    Shutdown,
}

/// Unique identifier for a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving end of a subscription.
///
/// Dropping the handle is enough to leave: the hub prunes the listener on
/// its next publish to that post.
pub struct ListenerHandle {
    pub id: ListenerId,
    pub post_id: PostId,
    receiver: Receiver<CommentEvent>,
}

impl ListenerHandle {
    pub(crate) fn new(id: ListenerId, post_id: PostId, receiver: Receiver<CommentEvent>) -> Self {
        Self {
            id,
            post_id,
            receiver,
        }
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<CommentEvent, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<CommentEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<CommentEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Blocking iterator over comments; ends when the listener is closed.
    pub fn comments(&self) -> impl Iterator<Item = Comment> + '_ {
        self.receiver.iter().map_while(|event| match event {
            CommentEvent::Comment { comment } => Some(comment),
            CommentEvent::Closed { .. } => None,
        })
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("post_id", &self.post_id)
            .field("pending", &self.receiver.len())
            .finish()
    }
}
