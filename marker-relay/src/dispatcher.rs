//! One broadcast round per inbound message.
//!
//! The dispatcher holds the registry lock for the whole round: the marker
//! recipient is drawn over the current membership, every member is written
//! to, and only then is the lock released. Two rounds never interleave, and
//! registration waits for an in-flight round to finish.

use std::sync::Arc;

use clap::ValueEnum;
use futures::SinkExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    frame::Frame,
    registry::{ConnectionId, ConnectionRegistry},
    selection::IndexSource,
};

/// Payload policy of a round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Inbound content is discarded; non-selected members get `"HELLO"`.
    #[default]
    Greeting,
    /// Inbound content is relayed verbatim; the selected member gets the
    /// marker unless it sent the message.
    Echo,
}

/// Outcome of a single broadcast round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// Members the round wrote to, successfully or not.
    pub addressed: usize,
    pub delivered: usize,
    pub failed: Vec<ConnectionId>,
    /// Member at the drawn position.
    pub selected: Option<ConnectionId>,
    /// Member that received the marker, if any.
    pub marked: Option<ConnectionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    pub connections: usize,
    pub variant: Variant,
    pub pending_sender: Option<ConnectionId>,
}

pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    picker: Arc<dyn IndexSource>,
    variant: Variant,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        picker: Arc<dyn IndexSource>,
        variant: Variant,
    ) -> Self {
        Self {
            registry,
            picker,
            variant,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Runs one round for `frame`, received from `sender`.
    ///
    /// Write failures are logged and recorded in the report; the round keeps
    /// going for the remaining members. An empty registry yields an empty
    /// report without consulting the index source.
    pub async fn dispatch(&self, sender: ConnectionId, frame: Frame) -> RoundReport {
        let mut members = self.registry.lock().await;

        if self.variant == Variant::Echo && members.pending_sender() == Some(sender) {
            members.set_pending_sender(None);
            debug!(connection = %sender, "pending sender spoke, reference cleared");
        }

        let count = members.len();
        if count == 0 {
            debug!(connection = %sender, "no members to broadcast to");
            return RoundReport::default();
        }

        let index = self.picker.pick(count).min(count - 1);
        let mut report = RoundReport {
            addressed: count,
            ..RoundReport::default()
        };

        for (position, (id, sink)) in members.iter_mut().enumerate() {
            let selected = position == index;
            if selected {
                report.selected = Some(id);
            }

            let marks = selected && (self.variant == Variant::Greeting || id != sender);
            let outbound = if marks {
                report.marked = Some(id);
                Frame::marker()
            } else {
                self.relay_payload(&frame)
            };

            match sink.send(outbound).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(connection = %id, error = %err, "failed to deliver frame");
                    report.failed.push(id);
                }
            }
        }

        if self.variant == Variant::Echo {
            if let Some(marked) = report.marked {
                members.set_pending_sender(Some(marked));
            }
        }

        debug!(
            connection = %sender,
            addressed = report.addressed,
            delivered = report.delivered,
            selected = ?report.selected,
            marked = ?report.marked,
            "broadcast round complete"
        );
        report
    }

    /// Membership and pending sender captured under a single lock.
    pub async fn stats(&self) -> RelayStats {
        let members = self.registry.lock().await;
        RelayStats {
            connections: members.len(),
            variant: self.variant,
            pending_sender: members.pending_sender(),
        }
    }

    fn relay_payload(&self, frame: &Frame) -> Frame {
        match self.variant {
            Variant::Greeting => Frame::greeting(),
            Variant::Echo => frame.clone(),
        }
    }
}
