//! Live channels and every room-membership side effect they cause.
//!
//! Every event a membership change produces is queued on the recipients'
//! outboxes inside the registry critical section that made the change, so
//! each channel observes membership in registry order. Queueing never blocks
//! (outboxes are unbounded); the socket writes happen in each channel's
//! writer task, outside any lock.
//!
//! Lock order is registry, then channels.

use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::{
    appresult::AppResult,
    rooms::{
        msg::ServerEvent,
        registry::{Membership, RoomRegistry},
        ConnectionId, ParticipantId,
    },
};

pub type Outbox = mpsc::UnboundedSender<ServerEvent>;
pub type SharedRegistry = Arc<Mutex<RoomRegistry>>;

pub const ROOM_NOT_FOUND_MESSAGE: &str = "Room does not exist";

pub struct ConnectionGateway {
    registry: SharedRegistry,
    channels: Mutex<HashMap<ConnectionId, Outbox>>,
}

impl ConnectionGateway {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            channels: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Registers a freshly opened channel. It belongs to no room yet.
    pub async fn open(&self, outbox: Outbox) -> ConnectionId {
        let conn = ConnectionId::new();
        self.channels.lock().await.insert(conn, outbox);
        debug!(connection_id = %conn, "channel opened");
        conn
    }

    #[cfg(test)]
    pub(crate) async fn is_open(&self, conn: ConnectionId) -> bool {
        self.channels.lock().await.contains_key(&conn)
    }

    /// Adds the channel to `room_id` as `participant_id`.
    ///
    /// An unknown room is reported to this channel alone with an `error`
    /// event; the channel stays usable.
    pub async fn join(
        &self,
        conn: ConnectionId,
        room_id: &str,
        participant_id: &str,
    ) -> AppResult<()> {
        let mut registry = self.registry.lock().await;
        let displaced = match registry.add_participant(room_id, participant_id, conn) {
            Ok(displaced) => displaced,
            Err(err) => {
                drop(registry);
                warn!(connection_id = %conn, room_id, participant_id, "join for unknown room");
                self.send_to(conn, ServerEvent::Error(ROOM_NOT_FOUND_MESSAGE.to_owned())).await;
                return Err(err);
            }
        };

        let channels = self.channels.lock().await;
        if let Some(previous) = &displaced.previous {
            let remaining: Vec<_> = registry
                .peers(&previous.room_id, &previous.participant_id)
                .into_iter()
                .map(|(_, peer)| peer)
                .filter(|peer| *peer != conn)
                .collect();
            queue(&channels, remaining, &ServerEvent::UserDisconnected(previous.participant_id.clone()));
        }
        let (peer_ids, peer_conns): (Vec<ParticipantId>, Vec<ConnectionId>) =
            registry.peers(room_id, participant_id).into_iter().unzip();
        queue(&channels, [conn], &ServerEvent::CurrentParticipants(peer_ids));
        queue(&channels, peer_conns, &ServerEvent::UserConnected(participant_id.to_owned()));
        drop(channels);
        drop(registry);

        if let Some(previous) = displaced.previous {
            info!(
                connection_id = %conn,
                room_id = %previous.room_id,
                participant_id = %previous.participant_id,
                "participant moved out of previous membership"
            );
        }
        if let Some(stale) = displaced.replaced {
            info!(connection_id = %conn, stale_connection_id = %stale, room_id, participant_id, "participant id taken over by new channel");
        }
        info!(connection_id = %conn, room_id, participant_id, "participant joined room");
        Ok(())
    }

    /// Drops the channel's membership, telling the rest of the room.
    /// A channel without membership is left alone.
    pub async fn leave(&self, conn: ConnectionId) -> Option<Membership> {
        let mut registry = self.registry.lock().await;
        let membership = registry.remove_participant_by_connection(conn)?;
        let remaining: Vec<_> = registry
            .peers(&membership.room_id, &membership.participant_id)
            .into_iter()
            .map(|(_, peer)| peer)
            .collect();
        let notified = queue(
            &*self.channels.lock().await,
            remaining,
            &ServerEvent::UserDisconnected(membership.participant_id.clone()),
        );
        drop(registry);

        info!(
            connection_id = %conn,
            room_id = %membership.room_id,
            participant_id = %membership.participant_id,
            notified,
            "participant left room"
        );
        Some(membership)
    }

    /// Channel closed, gracefully or not. Safe to call more than once.
    pub async fn close(&self, conn: ConnectionId) -> Option<Membership> {
        let membership = self.leave(conn).await;
        if self.channels.lock().await.remove(&conn).is_some() {
            debug!(connection_id = %conn, "channel closed");
        }
        membership
    }

    /// Queues an event for `target`, a live member of the same room as
    /// `from`. `event` sees the sender's membership. `None` when either side
    /// is not in a room.
    pub async fn send_to_peer<F>(&self, from: ConnectionId, target: &str, event: F) -> Option<bool>
    where
        F: FnOnce(&Membership) -> ServerEvent,
    {
        let registry = self.registry.lock().await;
        let membership = registry.membership(from)?;
        let target_conn = registry.connection_of(&membership.room_id, target)?;
        let event = event(membership);
        Some(queue(&*self.channels.lock().await, [target_conn], &event) == 1)
    }

    /// Sends face-detection results to everyone else in the sender's room.
    pub async fn share_face_data(&self, conn: ConnectionId, faces: Value) -> usize {
        let registry = self.registry.lock().await;
        let Some(membership) = registry.membership(conn) else {
            debug!(connection_id = %conn, "face data from channel outside any room");
            return 0;
        };
        let peers = registry
            .peers(&membership.room_id, &membership.participant_id)
            .into_iter()
            .map(|(_, peer)| peer);
        let event = ServerEvent::FaceDetectionUpdate {
            user_id: membership.participant_id.clone(),
            faces,
        };
        queue(&*self.channels.lock().await, peers, &event)
    }

    /// Queues one event on a single channel. `false` if it is gone.
    pub async fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        queue(&*self.channels.lock().await, [conn], &event) == 1
    }
}

/// Best-effort fan-out; each target is tried independently.
fn queue(
    channels: &HashMap<ConnectionId, Outbox>,
    targets: impl IntoIterator<Item = ConnectionId>,
    event: &ServerEvent,
) -> usize {
    let mut queued = 0;
    for conn in targets {
        match channels.get(&conn) {
            Some(outbox) if outbox.send(event.clone()).is_ok() => queued += 1,
            Some(_) => debug!(connection_id = %conn, "outbox closed, skipping"),
            None => {}
        }
    }
    queued
}
