pub mod msg;
pub mod registry;
mod new;
mod room;
mod ws;

use std::fmt;

use axum::{routing::{get, post}, Router};
use uuid::Uuid;

use crate::AppState;

pub use new::{create, CreatedRoom};
pub use room::{lookup, RoomLookup};

/// Short alphanumeric token handed out by [`registry::RoomRegistry::create_room`].
pub type RoomId = String;

/// Caller-chosen name, unique within one room.
pub type ParticipantId = String;

/// Handle for one open channel, assigned when it connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-room", post(new::create_room))
        .route("/room/{room_id}", get(room::room))
        .route("/ws", get(ws::room_ws))
}
