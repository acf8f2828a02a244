//! App-state synchronization bookkeeping records.
//!
//! Only keys, versions and MACs are modelled here; merging mutations is the
//! job of the sync layer above.

use serde::{Deserialize, Serialize};

/// Exact length of app-state sync key data.
pub const SYNC_KEY_DATA_SIZE: usize = 32;

/// Exact length of index and value MACs.
pub const MUTATION_MAC_SIZE: usize = 32;

/// Exact length of the app-state LT-hash.
pub const APP_STATE_HASH_SIZE: usize = 128;

/// A key shared between the user's devices for app-state encryption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStateSyncKey {
    pub key_data: Vec<u8>,
    pub fingerprint: Vec<u8>,
    pub timestamp: i64,
}

/// The MAC pair recorded for one mutation of a state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStateMutationMac {
    /// `None` marks an ordering placeholder with no index.
    pub index_mac: Option<Vec<u8>>,
    pub value_mac: Vec<u8>,
}
