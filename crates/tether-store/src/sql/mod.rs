//! SQLite implementation of the store capabilities.
//!
//! One connection is shared behind a mutex by the container and every
//! per-device [`SqlStore`]. Multi-statement operations run in a transaction
//! while holding that lock.

mod app_state;
mod chat_settings;
mod contacts;
mod container;
mod identities;
mod pre_keys;
mod sender_keys;
mod sessions;

pub use container::SqlContainer;

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tether_types::Jid;

use crate::{Result, StoreError};

/// Connection shared between a container and its device stores.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// All store capabilities of one device, backed by SQLite.
pub struct SqlStore {
    conn: SharedConnection,
    jid: String,
}

impl SqlStore {
    pub fn new(conn: SharedConnection, jid: &Jid) -> Self {
        Self {
            conn,
            jid: jid.to_string(),
        }
    }

    /// Address of the owning device.
    pub fn jid(&self) -> &str {
        &self.jid
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore").field("jid", &self.jid).finish()
    }
}

/// Convert a stored blob to a fixed-size array.
pub(crate) fn to_fixed<const N: usize>(field: &'static str, bytes: &[u8]) -> Result<[u8; N]> {
    <[u8; N]>::try_from(bytes).map_err(|_| StoreError::InvalidLength {
        field,
        expected: N,
        actual: bytes.len(),
    })
}

pub(crate) fn lock(conn: &SharedConnection) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| StoreError::LockPoisoned)
}
