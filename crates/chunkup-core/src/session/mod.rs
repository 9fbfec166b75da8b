//! Durable upload sessions.
//!
//! Stores each session's identity (size, fingerprint, chunk size, optional
//! chunk digests) and its set of confirmed chunk indices, so an upload can be
//! resumed after a restart and stale sessions can be swept.

mod persist;
mod sqlite;
mod store;
mod types;

pub use persist::{MemorySessionDb, SessionPersistence};
pub use sqlite::SqliteSessionDb;
pub use store::{SessionLease, SessionStore, DEFAULT_RETENTION};
pub use types::{unix_millis, UploadSession};

#[cfg(test)]
mod tests;
