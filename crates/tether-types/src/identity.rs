//! Account-signed identity of a paired device.

/// Proof that the primary account vouches for this device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvSignedDeviceIdentity {
    /// Serialized identity details as signed by the account.
    pub details: Vec<u8>,
    /// Account identity key that produced `account_signature`, when known.
    pub account_signature_key: Option<[u8; 32]>,
    pub account_signature: [u8; 64],
    pub device_signature: [u8; 64],
}
