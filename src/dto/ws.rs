use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::{
    format_system_time,
    pvp::{
        MatchFoundPayload, MatchResultPayload, OpponentLeftPayload, RoundResultPayload,
        RoundStartPayload,
    },
};

/// Discriminator carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    MatchFound,
    RoundStart,
    RoundResult,
    MatchResult,
    Error,
    OpponentLeft,
    Ping,
    Pong,
}

/// Wire shape of every server message: `{type, data, error, timestamp}`.
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    timestamp: String,
}

/// Messages pushed to a match connection.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    MatchFound(MatchFoundPayload),
    RoundStart(RoundStartPayload),
    RoundResult(Box<RoundResultPayload>),
    MatchResult(Box<MatchResultPayload>),
    OpponentLeft(OpponentLeftPayload),
    Error(String),
    Ping,
    Pong,
}

impl OutboundMessage {
    /// Envelope `type` of this message.
    pub fn kind(&self) -> MessageType {
        match self {
            OutboundMessage::MatchFound(_) => MessageType::MatchFound,
            OutboundMessage::RoundStart(_) => MessageType::RoundStart,
            OutboundMessage::RoundResult(_) => MessageType::RoundResult,
            OutboundMessage::MatchResult(_) => MessageType::MatchResult,
            OutboundMessage::OpponentLeft(_) => MessageType::OpponentLeft,
            OutboundMessage::Error(_) => MessageType::Error,
            OutboundMessage::Ping => MessageType::Ping,
            OutboundMessage::Pong => MessageType::Pong,
        }
    }

    /// Serialize into the envelope format, stamped with the current time.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        fn encode<T: Serialize>(
            kind: MessageType,
            data: Option<&T>,
            error: Option<&str>,
        ) -> Result<String, serde_json::Error> {
            serde_json::to_string(&Envelope {
                kind,
                data,
                error,
                timestamp: format_system_time(SystemTime::now()),
            })
        }

        let kind = self.kind();
        match self {
            OutboundMessage::MatchFound(payload) => encode(kind, Some(payload), None),
            OutboundMessage::RoundStart(payload) => encode(kind, Some(payload), None),
            OutboundMessage::RoundResult(payload) => encode(kind, Some(payload.as_ref()), None),
            OutboundMessage::MatchResult(payload) => encode(kind, Some(payload.as_ref()), None),
            OutboundMessage::OpponentLeft(payload) => encode(kind, Some(payload), None),
            OutboundMessage::Error(message) => encode::<()>(kind, None, Some(message.as_str())),
            OutboundMessage::Ping | OutboundMessage::Pong => encode::<()>(kind, None, None),
        }
    }
}

/// Envelope accepted from clients. Only the type is inspected.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: InboundKind,
}

/// Message types a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InboundKind {
    Ping,
    Pong,
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Parse a client envelope; unknown types are kept as `Unknown`.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
