use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    gateway::ConnectionGateway,
    rooms::{msg::Envelope, ConnectionId},
};

/// Point-to-point forwarding of offers, answers and candidates.
///
/// Holds no state of its own. Per (sender, target) order is kept because each
/// channel's frames are relayed one at a time into the target's FIFO outbox.
#[derive(Clone)]
pub struct SignalRelay {
    gateway: Arc<ConnectionGateway>,
}

impl SignalRelay {
    pub fn new(gateway: Arc<ConnectionGateway>) -> Self {
        Self { gateway }
    }

    /// Returns whether the envelope was queued for its target. Targets that
    /// are not live members of the sender's room are dropped silently.
    pub async fn relay(&self, from: ConnectionId, mut envelope: Envelope) -> bool {
        let target = envelope.target.clone();
        let kind = envelope.kind;
        let queued = self
            .gateway
            .send_to_peer(from, &target, |membership| {
                if envelope.sender != membership.participant_id {
                    warn!(
                        connection_id = %from,
                        claimed = %envelope.sender,
                        participant_id = %membership.participant_id,
                        "signal sender does not match channel, using channel identity"
                    );
                    envelope.sender = membership.participant_id.clone();
                }
                envelope.into_event()
            })
            .await;

        queued.unwrap_or_else(|| {
            debug!(connection_id = %from, %target, ?kind, "dropping signal for unaddressable target");
            false
        })
    }
}
