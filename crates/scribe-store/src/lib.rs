//! Scribe Store - SQLite storage for indexed chunks.

mod chunks;
mod database;
mod error;
mod index;
mod migrations;

pub use chunks::StoredChunk;
pub use database::Database;
pub use error::{StoreError, StoreResult};
pub use index::SqliteIndex;
