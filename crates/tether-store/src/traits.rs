//! Store capabilities composed onto a [`Device`](crate::device::Device).
//!
//! Every capability is its own trait so a device can mix implementations;
//! [`SqlStore`](crate::sql::SqlStore) implements all of them for one device.
//! Implementations must be safe to call from several tasks at once.

use std::collections::HashMap;

use tether_crypto::keys::PreKey;
use tether_types::appstate::APP_STATE_HASH_SIZE;
use tether_types::{AppStateMutationMac, AppStateSyncKey, ContactInfo, Jid, LocalChatSettings};

use crate::device::{Device, DeviceStores};
use crate::Result;

/// Outcome of checking a peer identity key against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityTrust {
    /// Nothing stored yet for this peer.
    FirstUse,
    /// The stored key matches.
    Trusted,
    /// A different key is stored. Blocking or warning is the caller's call.
    Changed,
}

impl IdentityTrust {
    /// True unless the identity changed.
    pub fn is_trusted(self) -> bool {
        !matches!(self, Self::Changed)
    }
}

/// Trusted identity keys of peers.
pub trait IdentityStore: Send + Sync {
    /// Store `key` as the trusted key of `address`, replacing any previous one.
    fn put_identity(&self, address: &str, key: &[u8; 32]) -> Result<()>;
    fn is_trusted_identity(&self, address: &str, key: &[u8; 32]) -> Result<IdentityTrust>;
}

/// Opaque ratchet session state per peer.
pub trait SessionStore: Send + Sync {
    fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>>;
    fn has_session(&self, address: &str) -> Result<bool>;
    /// Overwrite the whole session blob.
    fn put_session(&self, address: &str, session: &[u8]) -> Result<()>;
}

/// One-time prekey pool.
pub trait PreKeyStore: Send + Sync {
    /// Up to `count` unuploaded keys, generating new ones for any shortfall.
    fn get_or_generate_pre_keys(&self, count: u32) -> Result<Vec<PreKey>>;
    /// Allocate and store a single new key.
    fn generate_one_pre_key(&self) -> Result<PreKey>;
    fn get_pre_key(&self, id: u32) -> Result<Option<PreKey>>;
    fn remove_pre_key(&self, id: u32) -> Result<()>;
    /// Mark every key with id <= `up_to_id` as uploaded.
    fn mark_pre_keys_uploaded(&self, up_to_id: u32) -> Result<()>;
    fn uploaded_pre_key_count(&self) -> Result<u32>;
}

/// Group sender keys.
pub trait SenderKeyStore: Send + Sync {
    fn put_sender_key(&self, group: &str, user: &str, session: &[u8]) -> Result<()>;
    fn get_sender_key(&self, group: &str, user: &str) -> Result<Option<Vec<u8>>>;
}

/// App-state sync keys by key id.
pub trait AppStateSyncKeyStore: Send + Sync {
    fn put_app_state_sync_key(&self, id: &[u8], key: &AppStateSyncKey) -> Result<()>;
    fn get_app_state_sync_key(&self, id: &[u8]) -> Result<Option<AppStateSyncKey>>;
}

/// App-state versions and mutation MACs.
pub trait AppStateStore: Send + Sync {
    fn put_app_state_version(
        &self,
        name: &str,
        version: u64,
        hash: &[u8; APP_STATE_HASH_SIZE],
    ) -> Result<()>;
    /// `(0, zero hash)` when nothing is stored.
    fn get_app_state_version(&self, name: &str) -> Result<(u64, [u8; APP_STATE_HASH_SIZE])>;
    /// Remove the version and, through the foreign key, its MACs.
    fn delete_app_state_version(&self, name: &str) -> Result<()>;

    /// Insert all `mutations` for `version` atomically.
    fn put_mutation_macs(
        &self,
        name: &str,
        version: u64,
        mutations: &[AppStateMutationMac],
    ) -> Result<()>;
    /// Remove the MACs recorded under any of `index_macs`.
    fn delete_mutation_macs(&self, name: &str, index_macs: &[Vec<u8>]) -> Result<()>;
    /// Value MAC of the newest version holding `index_mac`.
    fn get_mutation_mac(&self, name: &str, index_mac: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// Contact names.
pub trait ContactStore: Send + Sync {
    /// Returns whether the name changed and the previous name.
    fn put_push_name(&self, user: &Jid, push_name: &str) -> Result<(bool, String)>;
    fn put_business_name(&self, user: &Jid, business_name: &str) -> Result<()>;
    fn put_contact_name(&self, user: &Jid, full_name: &str, first_name: &str) -> Result<()>;
    fn get_contact(&self, user: &Jid) -> Result<ContactInfo>;
    fn get_all_contacts(&self) -> Result<HashMap<Jid, ContactInfo>>;
}

/// Local chat preferences.
pub trait ChatSettingsStore: Send + Sync {
    /// `muted_until` is Unix seconds; 0 unmutes.
    fn put_muted_until(&self, chat: &Jid, muted_until: u64) -> Result<()>;
    fn put_pinned(&self, chat: &Jid, pinned: bool) -> Result<()>;
    fn put_archived(&self, chat: &Jid, archived: bool) -> Result<()>;
    fn get_chat_settings(&self, chat: &Jid) -> Result<LocalChatSettings>;
}

/// Persists devices and hands out their per-device stores.
pub trait DeviceContainer: Send + Sync {
    fn put_device(&self, device: &Device) -> Result<()>;
    /// Delete the device and every row that belongs to it.
    fn delete_device(&self, device: &Device) -> Result<()>;
    fn device_stores(&self, jid: &Jid) -> DeviceStores;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_trust() {
        assert!(IdentityTrust::FirstUse.is_trusted());
        assert!(IdentityTrust::Trusted.is_trusted());
        assert!(!IdentityTrust::Changed.is_trusted());
    }
}
