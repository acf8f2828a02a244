//! Per-peer contact and chat metadata.

use serde::{Deserialize, Serialize};

/// Names known for a contact. `found` is false when nothing is stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub found: bool,
    pub first_name: String,
    pub full_name: String,
    pub push_name: String,
    pub business_name: String,
}

/// Local preferences of a chat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalChatSettings {
    pub found: bool,
    /// Unix seconds until which the chat is muted; 0 when not muted.
    pub muted_until: u64,
    pub pinned: bool,
    pub archived: bool,
}
