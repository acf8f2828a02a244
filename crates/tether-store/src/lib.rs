//! # tether-store
//!
//! Persistent key and session storage for the secure-channel client.
//!
//! The store is split into capability traits ([`traits`]) that a
//! [`Device`](device::Device) composes, plus a SQLite implementation in
//! [`sql`]. The physical schema is evolved by the [`Migrator`] in
//! [`migrations`] from an explicit, ordered list of steps.
//!
//! ## Schema
//!
//! - One database file, WAL mode, foreign keys enforced
//! - Every table is prefixed `tether_`
//! - Per-device rows cascade on device delete
//! - Fixed-size byte columns carry `CHECK (length(..) = N)` constraints
//! - Schema version stored in the single-row `tether_version` table

pub mod device;
pub mod migrations;
pub mod schema;
pub mod sql;
pub mod traits;

pub use device::{Device, DeviceStores};
pub use migrations::{Migration, Migrator};
pub use sql::{SqlContainer, SqlStore};
pub use traits::{
    AppStateStore, AppStateSyncKeyStore, ChatSettingsStore, ContactStore, DeviceContainer,
    IdentityStore, IdentityTrust, PreKeyStore, SenderKeyStore, SessionStore,
};

use rusqlite::Connection;

/// Store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("migration step {index} ({name}) failed: {source}")]
    MigrationStep {
        index: u32,
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("device has no address")]
    MissingAddress,

    #[error("device is missing {0}")]
    Incomplete(&'static str),

    #[error("prekey id space exhausted")]
    PreKeyIdsExhausted,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("crypto error: {0}")]
    Crypto(#[from] tether_crypto::CryptoError),

    #[error("invalid address: {0}")]
    Jid(#[from] tether_types::JidError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Connection pragmas applied on every open.
pub fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

/// Reject a byte field whose length is not exactly `expected`.
pub(crate) fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<()> {
    if actual != expected {
        return Err(StoreError::InvalidLength {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}
