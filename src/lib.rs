//! Library crate for smartstocks-pvp, exposing modules for the binary and integration tests.

/// Runtime configuration loaded from JSON.
pub mod config;
/// Ranking data and the stats collaborator.
pub mod dao;
/// Wire types for REST bodies and socket envelopes.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP and WebSocket routes.
pub mod routes;
/// Matchmaking, match driving and connection handling.
pub mod services;
/// Shared in-memory state.
pub mod state;
