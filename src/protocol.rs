use std::sync::Arc;

use serde::{Deserialize, Serialize, ser::SerializeMap};

use crate::{
    connections::ConnectionId,
    error::ErrorKind,
    rooms::{Message, PresenceSnapshot, Room, RoomId},
};

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    GetRooms,
    CreateRoom(String),
    JoinRoom(RoomId),
    LeaveRoom(RoomId),
    SendMessage(SendMessage),
    SendFile(SendFile),
    WebrtcOffer(SignalRequest),
    WebrtcAnswer(SignalRequest),
    WebrtcIceCandidate(SignalRequest),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        use ClientEvent::*;
        match self {
            GetRooms => "get-rooms",
            CreateRoom(_) => "create-room",
            JoinRoom(_) => "join-room",
            LeaveRoom(_) => "leave-room",
            SendMessage(_) => "send-message",
            SendFile(_) => "send-file",
            WebrtcOffer(_) => "webrtc-offer",
            WebrtcAnswer(_) => "webrtc-answer",
            WebrtcIceCandidate(_) => "webrtc-ice-candidate",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub room_id: RoomId,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFile {
    pub room_id: RoomId,
    pub file: String,
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
}

// browsers send the payload under `offer`, `answer` or `candidate`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRequest {
    pub room_id: RoomId,
    #[serde(alias = "offer", alias = "answer", alias = "candidate")]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn event_name(self) -> &'static str {
        match self {
            SignalKind::Offer => "webrtc-offer",
            SignalKind::Answer => "webrtc-answer",
            SignalKind::IceCandidate => "webrtc-ice-candidate",
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "candidate",
        }
    }
}

#[derive(Debug)]
pub struct RelayedSignal {
    pub kind: SignalKind,
    pub room_id: RoomId,
    pub from: ConnectionId,
    pub payload: serde_json::Value,
}

impl Serialize for RelayedSignal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("roomId", &self.room_id)?;
        map.serialize_entry("from", &self.from)?;
        map.serialize_entry(self.kind.field_name(), &self.payload)?;
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub event: Option<&'static str>,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum ServerEvent {
    Connected(ConnectionId),
    RoomList(Vec<Room>),
    RoomCreated(Room),
    MessageHistory {
        room_id: RoomId,
        messages: Arc<[Arc<Message>]>,
    },
    UserList(Arc<PresenceSnapshot>),
    Message(Arc<Message>),
    FileReceived(Arc<Message>),
    Signal(Arc<RelayedSignal>),
    Error(ErrorReport),
}

impl ServerEvent {
    pub fn to_frame(&self, me: ConnectionId) -> serde_json::Result<String> {
        let frame = match self {
            ServerEvent::Connected(id) => Frame::Connected(Hello {
                id: *id,
                username: id.display_name(),
            }),
            ServerEvent::RoomList(rooms) => Frame::RoomList(rooms),
            ServerEvent::RoomCreated(room) => Frame::RoomCreated(room),
            ServerEvent::MessageHistory { room_id, messages } => {
                Frame::MessageHistory(HistoryView {
                    room_id: *room_id,
                    messages: messages.iter().map(|m| MessageView::new(m, me)).collect(),
                })
            }
            ServerEvent::UserList(snapshot) => Frame::UserList(snapshot),
            ServerEvent::Message(message) => Frame::Message(MessageView::new(message, me)),
            ServerEvent::FileReceived(message) => {
                Frame::FileReceived(MessageView::new(message, me))
            }
            ServerEvent::Signal(signal) => match signal.kind {
                SignalKind::Offer => Frame::WebrtcOffer(signal),
                SignalKind::Answer => Frame::WebrtcAnswer(signal),
                SignalKind::IceCandidate => Frame::WebrtcIceCandidate(signal),
            },
            ServerEvent::Error(report) => Frame::Error(report),
        };
        serde_json::to_string(&frame)
    }
}

#[derive(Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
enum Frame<'a> {
    Connected(Hello),
    RoomList(&'a [Room]),
    RoomCreated(&'a Room),
    MessageHistory(HistoryView<'a>),
    UserList(&'a PresenceSnapshot),
    Message(MessageView<'a>),
    FileReceived(MessageView<'a>),
    WebrtcOffer(&'a RelayedSignal),
    WebrtcAnswer(&'a RelayedSignal),
    WebrtcIceCandidate(&'a RelayedSignal),
    Error(&'a ErrorReport),
}

#[derive(Serialize)]
struct Hello {
    id: ConnectionId,
    username: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryView<'a> {
    room_id: RoomId,
    messages: Vec<MessageView<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageView<'a> {
    #[serde(flatten)]
    message: &'a Message,
    is_own: bool,
}

impl<'a> MessageView<'a> {
    fn new(message: &'a Message, me: ConnectionId) -> Self {
        Self {
            is_own: message.is_authored_by(me),
            message,
        }
    }
}
