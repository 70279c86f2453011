//! Set of live connections keyed by [`ConnectionId`].
//!
//! The registry's mutex is the one lock of the relay: registration,
//! unregistration and whole broadcast rounds all run under it, so a round
//! always sees a membership that cannot change underneath it.

use std::{
    collections::BTreeMap,
    fmt,
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
};

use futures::{Sink, SinkExt, channel::mpsc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::{error::RelayError, frame::Frame};

/// Outbound half of one connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = RelayError> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Builds an in-process connection: frames written to the sink show up on
/// the receiver.
pub fn channel_sink() -> (FrameSink, mpsc::UnboundedReceiver<Frame>) {
    let (tx, rx) = mpsc::unbounded();
    (Box::pin(tx.sink_map_err(|_| RelayError::PeerGone)), rx)
}

/// Membership as seen while holding the registry lock.
///
/// Members enumerate in ascending id order, which is the order broadcast
/// positions are assigned in.
#[derive(Default)]
pub(crate) struct Members {
    connections: BTreeMap<ConnectionId, FrameSink>,
    pending_sender: Option<ConnectionId>,
}

impl Members {
    pub(crate) fn len(&self) -> usize {
        self.connections.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub(crate) fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub(crate) fn pending_sender(&self) -> Option<ConnectionId> {
        self.pending_sender
    }

    pub(crate) fn set_pending_sender(&mut self, pending: Option<ConnectionId>) {
        self.pending_sender = pending;
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (ConnectionId, &mut FrameSink)> + '_ {
        self.connections.iter_mut().map(|(id, sink)| (*id, sink))
    }
}

pub struct ConnectionRegistry {
    members: Mutex<Members>,
    next_id: AtomicU64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            members: Mutex::new(Members::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Adds a connection. Registering an id that is already present replaces
    /// its sink, dropping the old one.
    pub async fn register(&self, id: ConnectionId, sink: FrameSink) {
        let mut members = self.members.lock().await;
        let replaced = members.connections.insert(id, sink).is_some();
        debug!(connection = %id, replaced, size = members.len(), "registered connection");
    }

    /// Removes a connection if present. Returns whether anything was removed.
    ///
    /// A connection holding the pending sender reference loses it here, so the
    /// reference only ever names a live member.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut members = self.members.lock().await;
        let removed = members.connections.remove(&id).is_some();
        if members.pending_sender == Some(id) {
            members.pending_sender = None;
        }
        if removed {
            debug!(connection = %id, size = members.len(), "unregistered connection");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.lock().await.connections.contains_key(&id)
    }

    pub async fn ids(&self) -> Vec<ConnectionId> {
        self.members.lock().await.ids()
    }

    pub async fn pending_sender(&self) -> Option<ConnectionId> {
        self.members.lock().await.pending_sender
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Members> {
        self.members.lock().await
    }
}
