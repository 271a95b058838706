use std::collections::{BTreeSet, HashMap};

use rand::{distr::Alphanumeric, Rng};
use time::OffsetDateTime;

use crate::{appresult::{AppError, AppResult}, config::DEFAULT_ROOM_ID_LENGTH};

use super::{ConnectionId, ParticipantId, RoomId};

#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub participants: HashMap<ParticipantId, ConnectionId>,
    pub created_at: OffsetDateTime,
}

/// Where a live connection currently sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
}

/// What a join pushed out of the registry.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Displaced {
    /// Connection that held the participant id before this join.
    pub replaced: Option<ConnectionId>,
    /// Membership the joining connection held before, when different.
    pub previous: Option<Membership>,
}

/// In-memory rooms plus a connection -> membership index kept in step with
/// every mutation. Not synchronised itself; the owner wraps it in one lock.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    by_connection: HashMap<ConnectionId, Membership>,
    id_length: usize,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_ID_LENGTH)
    }
}

impl RoomRegistry {
    pub fn new(id_length: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            by_connection: HashMap::new(),
            id_length,
        }
    }

    pub fn create_room(&mut self) -> RoomId {
        let mut rng = rand::rng();
        let id = loop {
            let candidate: RoomId = (&mut rng)
                .sample_iter(Alphanumeric)
                .take(self.id_length)
                .map(char::from)
                .collect();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        self.rooms.insert(id.clone(), Room {
            id: id.clone(),
            participants: HashMap::new(),
            created_at: OffsetDateTime::now_utc(),
        });
        id
    }

    pub fn room_exists(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    #[cfg(test)]
    pub(crate) fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Empty when the room is absent; use [`Self::room_exists`] to tell apart.
    pub fn participants(&self, room_id: &str) -> BTreeSet<ParticipantId> {
        self.rooms
            .get(room_id)
            .map(|room| room.participants.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every member of the room except `excluding`, with its connection.
    pub fn peers(&self, room_id: &str, excluding: &str) -> Vec<(ParticipantId, ConnectionId)> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };

        let mut peers: Vec<_> = room
            .participants
            .iter()
            .filter(|(participant_id, _)| participant_id.as_str() != excluding)
            .map(|(participant_id, conn)| (participant_id.clone(), *conn))
            .collect();
        peers.sort();
        peers
    }

    pub fn connection_of(&self, room_id: &str, participant_id: &str) -> Option<ConnectionId> {
        self.rooms.get(room_id)?.participants.get(participant_id).copied()
    }

    pub fn membership(&self, conn: ConnectionId) -> Option<&Membership> {
        self.by_connection.get(&conn)
    }

    /// Registers `participant_id` in the room under `conn`.
    ///
    /// A participant id already present is replaced: the stale connection is
    /// reported in [`Displaced::replaced`] and no longer belongs to any room.
    /// If `conn` held a different membership, it is dropped first and
    /// reported in [`Displaced::previous`].
    pub fn add_participant(
        &mut self,
        room_id: &str,
        participant_id: &str,
        conn: ConnectionId,
    ) -> AppResult<Displaced> {
        if !self.rooms.contains_key(room_id) {
            return Err(AppError::RoomNotFound(room_id.to_owned()));
        }

        let membership = Membership {
            room_id: room_id.to_owned(),
            participant_id: participant_id.to_owned(),
        };
        let previous = self
            .by_connection
            .get(&conn)
            .filter(|current| **current != membership)
            .cloned();
        if let Some(previous) = &previous {
            self.by_connection.remove(&conn);
            if let Some(old_room) = self.rooms.get_mut(&previous.room_id) {
                old_room.participants.remove(&previous.participant_id);
                // the target room survives even if this was its only member
                if old_room.participants.is_empty() && previous.room_id != room_id {
                    self.rooms.remove(&previous.room_id);
                }
            }
        }

        let Some(room) = self.rooms.get_mut(room_id) else {
            return Err(AppError::RoomNotFound(room_id.to_owned()));
        };
        let replaced = room
            .participants
            .insert(participant_id.to_owned(), conn)
            .filter(|old| *old != conn);
        if let Some(old) = replaced {
            self.by_connection.remove(&old);
        }
        self.by_connection.insert(conn, membership);

        Ok(Displaced { replaced, previous })
    }

    /// Returns the removed connection. Deletes the room once it is empty.
    pub fn remove_participant(&mut self, room_id: &str, participant_id: &str) -> Option<ConnectionId> {
        let room = self.rooms.get_mut(room_id)?;
        let conn = room.participants.remove(participant_id)?;
        if room.participants.is_empty() {
            self.rooms.remove(room_id);
        }
        self.by_connection.remove(&conn);
        Some(conn)
    }

    pub fn remove_participant_by_connection(&mut self, conn: ConnectionId) -> Option<Membership> {
        let membership = self.by_connection.get(&conn)?.clone();
        self.remove_participant(&membership.room_id, &membership.participant_id);
        Some(membership)
    }
}
