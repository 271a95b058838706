use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AppResult;

use super::{ParticipantId, RoomId};

/// Frames a participant sends over its channel.
///
/// On the wire every frame is `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(RoomId, ParticipantId),
    LeaveRoom,
    WebrtcOffer(InboundSignal),
    WebrtcAnswer(InboundSignal),
    WebrtcIceCandidate(InboundSignal),
    FaceDetectionData(FaceDetectionData),
}

impl ClientEvent {
    pub fn parse(frame: &[u8]) -> AppResult<Self> {
        Ok(serde_json::from_slice(frame)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundSignal {
    pub target: ParticipantId,
    pub sender: ParticipantId,
    #[serde(alias = "offer", alias = "answer", alias = "candidate")]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FaceDetectionData {
    pub faces: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

/// A signaling message on its way from one participant to another.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: SignalKind,
    pub target: ParticipantId,
    pub sender: ParticipantId,
    pub payload: Value,
}

impl Envelope {
    pub fn new(kind: SignalKind, signal: InboundSignal) -> Self {
        Self {
            kind,
            target: signal.target,
            sender: signal.sender,
            payload: signal.payload,
        }
    }

    pub fn into_event(self) -> ServerEvent {
        let Envelope { kind, target, sender, payload } = self;
        match kind {
            SignalKind::Offer => ServerEvent::WebrtcOffer { sender, offer: payload },
            SignalKind::Answer => ServerEvent::WebrtcAnswer { sender, answer: payload },
            SignalKind::Candidate => ServerEvent::WebrtcIceCandidate {
                target,
                sender,
                candidate: payload,
            },
        }
    }
}

/// Frames the server pushes to a participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    CurrentParticipants(Vec<ParticipantId>),
    UserConnected(ParticipantId),
    UserDisconnected(ParticipantId),
    WebrtcOffer {
        sender: ParticipantId,
        offer: Value,
    },
    WebrtcAnswer {
        sender: ParticipantId,
        answer: Value,
    },
    WebrtcIceCandidate {
        target: ParticipantId,
        sender: ParticipantId,
        candidate: Value,
    },
    FaceDetectionUpdate {
        #[serde(rename = "userId")]
        user_id: ParticipantId,
        faces: Value,
    },
    Error(String),
}

impl ServerEvent {
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> AppResult<ClientEvent> {
        ClientEvent::parse(value.to_string().as_bytes())
    }

    #[test]
    fn join_room_takes_positional_args() {
        let event = parse(json!({ "event": "join-room", "data": ["Ab12Cd", "alice"] })).unwrap();
        assert_eq!(event, ClientEvent::JoinRoom("Ab12Cd".into(), "alice".into()));
    }

    #[test]
    fn leave_room_needs_no_data() {
        assert_eq!(parse(json!({ "event": "leave-room" })).unwrap(), ClientEvent::LeaveRoom);
    }

    #[test]
    fn signals_keep_payload_opaque() {
        let sdp = json!({ "type": "offer", "sdp": "v=0\r\n..." });
        let event = parse(json!({
            "event": "webrtc-offer",
            "data": { "target": "bob", "sender": "alice", "offer": sdp },
        }))
        .unwrap();

        let ClientEvent::WebrtcOffer(signal) = event else {
            panic!("expected an offer");
        };
        assert_eq!(signal.target, "bob");
        assert_eq!(signal.payload, sdp);

        let candidate = parse(json!({
            "event": "webrtc-ice-candidate",
            "data": { "target": "bob", "sender": "alice", "candidate": null },
        }))
        .unwrap();
        assert!(matches!(candidate, ClientEvent::WebrtcIceCandidate(s) if s.payload.is_null()));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        for frame in [
            json!({ "event": "webrtc-offer", "data": { "target": "bob", "sender": "alice" } }),
            json!({ "event": "webrtc-answer", "data": { "sender": "alice", "answer": {} } }),
            json!({ "event": "join-room", "data": ["only-room"] }),
            json!({ "event": "shout", "data": "hi" }),
            json!(["join-room", "R", "A"]),
        ] {
            assert!(parse(frame.clone()).is_err(), "accepted {frame}");
        }
        assert!(ClientEvent::parse(b"not json").is_err());
    }

    #[test]
    fn envelope_becomes_kind_specific_event() {
        let envelope = Envelope {
            kind: SignalKind::Answer,
            target: "alice".into(),
            sender: "bob".into(),
            payload: json!("sdp"),
        };

        let encoded: Value = serde_json::from_str(&envelope.into_event().to_json().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({ "event": "webrtc-answer", "data": { "sender": "bob", "answer": "sdp" } })
        );
    }

    #[test]
    fn server_events_use_wire_names() {
        let cases = [
            (ServerEvent::CurrentParticipants(vec![]), json!({ "event": "current-participants", "data": [] })),
            (ServerEvent::UserConnected("b".into()), json!({ "event": "user-connected", "data": "b" })),
            (ServerEvent::UserDisconnected("b".into()), json!({ "event": "user-disconnected", "data": "b" })),
            (
                ServerEvent::FaceDetectionUpdate { user_id: "a".into(), faces: json!([]) },
                json!({ "event": "face-detection-update", "data": { "userId": "a", "faces": [] } }),
            ),
            (ServerEvent::Error("Room does not exist".into()), json!({ "event": "error", "data": "Room does not exist" })),
        ];

        for (event, expected) in cases {
            let encoded: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
            assert_eq!(encoded, expected);
        }
    }
}
