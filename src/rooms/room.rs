use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Serialize;

use crate::{gateway::SharedRegistry, AppError, AppResult};

use super::RoomId;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomLookup {
    pub room_id: RoomId,
    pub participant_count: usize,
    pub exists: bool,
}

/// Read-only existence check ahead of joining.
pub async fn lookup(registry: &SharedRegistry, room_id: &str) -> AppResult<RoomLookup> {
    let registry = registry.lock().await;
    let room = registry
        .room(room_id)
        .ok_or_else(|| AppError::RoomNotFound(room_id.to_owned()))?;

    Ok(RoomLookup {
        room_id: room.id.clone(),
        participant_count: room.participants.len(),
        exists: true,
    })
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room(
    State(registry): State<SharedRegistry>,
    Path(room_id): Path<RoomId>,
) -> AppResult<Json<RoomLookup>> {
    Ok(Json(lookup(&registry, &room_id).await?))
}
