/// Ranking data shared with the stats collaborator.
pub mod models;
/// Stats collaborator abstraction and its in-memory implementation.
pub mod stats_store;
/// Error types shared by stats backends.
pub mod storage;
