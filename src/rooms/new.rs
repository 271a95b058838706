use axum::{debug_handler, extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::gateway::SharedRegistry;

use super::RoomId;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoom {
    pub room_id: RoomId,
    pub success: bool,
}

pub async fn create(registry: &SharedRegistry) -> CreatedRoom {
    let room_id = registry.lock().await.create_room();
    info!(room_id = %room_id, "room created");
    CreatedRoom { room_id, success: true }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_room(State(registry): State<SharedRegistry>) -> Json<CreatedRoom> {
    Json(create(&registry).await)
}
