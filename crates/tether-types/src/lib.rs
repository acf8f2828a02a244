//! # tether-types
//!
//! Shared value types for the secure-channel client: addresses, contact and
//! chat metadata, app-state bookkeeping records and the device's
//! account-signed identity.

pub mod appstate;
pub mod contact;
pub mod identity;
pub mod jid;

pub use appstate::{AppStateMutationMac, AppStateSyncKey};
pub use contact::{ContactInfo, LocalChatSettings};
pub use identity::AdvSignedDeviceIdentity;
pub use jid::{Jid, JidError};
