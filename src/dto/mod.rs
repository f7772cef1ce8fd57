use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Scenario and chart views sent to players.
pub mod common;
/// Health check payload.
pub mod health;
/// Queue, match, round and history payloads.
pub mod pvp;
/// Custom validators for request bodies.
pub mod validation;
/// Socket envelopes in both directions.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
