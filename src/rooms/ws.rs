use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{gateway::ConnectionGateway, relay::SignalRelay, AppError};

use super::{
    msg::{ClientEvent, Envelope, ServerEvent, SignalKind},
    ConnectionId,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    State(gateway): State<Arc<ConnectionGateway>>,
    State(relay): State<SignalRelay>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_channel(socket, gateway, relay))
}

/// Runs one channel until the peer goes away, then cleans up its membership.
async fn serve_channel(socket: WebSocket, gateway: Arc<ConnectionGateway>, relay: SignalRelay) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = gateway.open(tx).await;

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(err) => {
                    warn!(connection_id = %conn, error = %err, "could not encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        let frame = tokio::select! {
            frame = receiver.next() => frame,
            _ = &mut send_task => {
                debug!(connection_id = %conn, "writer stopped");
                break;
            }
        };

        let data = match frame {
            None | Some(Ok(Message::Close(_))) => break,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(msg)) => msg.into_data(),
            Some(Err(err)) => {
                let err = AppError::from(err);
                warn!(connection_id = %conn, error = %err, "channel dropped");
                break;
            }
        };

        match ClientEvent::parse(&data) {
            Ok(event) => dispatch(&gateway, &relay, conn, event).await,
            Err(err) => warn!(connection_id = %conn, error = %err, "dropping frame"),
        }
    }

    gateway.close(conn).await;
    send_task.abort();
}

async fn dispatch(
    gateway: &ConnectionGateway,
    relay: &SignalRelay,
    conn: ConnectionId,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinRoom(room_id, participant_id) => {
            if let Err(err) = gateway.join(conn, &room_id, &participant_id).await {
                debug!(connection_id = %conn, error = %err, "join rejected");
            }
        }
        ClientEvent::LeaveRoom => {
            gateway.leave(conn).await;
        }
        ClientEvent::WebrtcOffer(signal) => {
            relay.relay(conn, Envelope::new(SignalKind::Offer, signal)).await;
        }
        ClientEvent::WebrtcAnswer(signal) => {
            relay.relay(conn, Envelope::new(SignalKind::Answer, signal)).await;
        }
        ClientEvent::WebrtcIceCandidate(signal) => {
            relay.relay(conn, Envelope::new(SignalKind::Candidate, signal)).await;
        }
        ClientEvent::FaceDetectionData(data) => {
            gateway.share_face_data(conn, data.faces).await;
        }
    }
}
