//! Payload sent, encrypted, in the final handshake message.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tether_store::{Device, StoreError};
use tether_transport::cbor;

use crate::Result;

/// Who the client is: an already paired device, or a new one registering.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientPayload {
    Login {
        user: String,
        device: u16,
        passive: bool,
    },
    Registration {
        registration_id: u32,
        #[serde_as(as = "serde_with::Bytes")]
        identity_key: [u8; 32],
        signed_pre_key_id: u32,
        #[serde_as(as = "serde_with::Bytes")]
        signed_pre_key: [u8; 32],
        #[serde_as(as = "serde_with::Bytes")]
        signed_pre_key_signature: [u8; 64],
    },
}

impl ClientPayload {
    /// Login when the device has an address, registration otherwise.
    pub fn for_device(device: &Device) -> Result<Self> {
        if let Some(jid) = &device.id {
            return Ok(Self::Login {
                user: jid.user.clone(),
                device: jid.device,
                passive: true,
            });
        }

        let identity = device
            .identity_key
            .as_ref()
            .ok_or(StoreError::Incomplete("identity key"))?;
        let signed_pre_key = device
            .signed_pre_key
            .as_ref()
            .ok_or(StoreError::Incomplete("signed prekey"))?;
        Ok(Self::Registration {
            registration_id: device.registration_id,
            identity_key: *identity.public(),
            signed_pre_key_id: signed_pre_key.key_id,
            signed_pre_key: *signed_pre_key.key_pair.public(),
            signed_pre_key_signature: signed_pre_key.signature,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(cbor::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(cbor::from_slice(data)?)
    }
}
