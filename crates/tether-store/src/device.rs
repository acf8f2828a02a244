//! The local device: long-term key material plus its composed stores.

use std::fmt;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use tether_crypto::keys::{KeyPair, SignedPreKey};
use tether_types::{AdvSignedDeviceIdentity, Jid};

use crate::traits::{
    AppStateStore, AppStateSyncKeyStore, ChatSettingsStore, ContactStore, DeviceContainer,
    IdentityStore, PreKeyStore, SenderKeyStore, SessionStore,
};
use crate::{Result, StoreError};

/// Id given to the first signed prekey of a device.
pub const FIRST_SIGNED_PRE_KEY_ID: u32 = 1;

/// The capability stores of one device.
#[derive(Clone)]
pub struct DeviceStores {
    pub identities: Arc<dyn IdentityStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub pre_keys: Arc<dyn PreKeyStore>,
    pub sender_keys: Arc<dyn SenderKeyStore>,
    pub app_state_keys: Arc<dyn AppStateSyncKeyStore>,
    pub app_state: Arc<dyn AppStateStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub chat_settings: Arc<dyn ChatSettingsStore>,
}

impl DeviceStores {
    /// Use one implementation for every capability.
    pub fn from_single<T>(store: Arc<T>) -> Self
    where
        T: IdentityStore
            + SessionStore
            + PreKeyStore
            + SenderKeyStore
            + AppStateSyncKeyStore
            + AppStateStore
            + ContactStore
            + ChatSettingsStore
            + 'static,
    {
        Self {
            identities: store.clone(),
            sessions: store.clone(),
            pre_keys: store.clone(),
            sender_keys: store.clone(),
            app_state_keys: store.clone(),
            app_state: store.clone(),
            contacts: store.clone(),
            chat_settings: store,
        }
    }
}

impl fmt::Debug for DeviceStores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceStores").finish_non_exhaustive()
    }
}

/// A local device identity.
pub struct Device {
    pub noise_key: Option<KeyPair>,
    pub identity_key: Option<KeyPair>,
    pub signed_pre_key: Option<SignedPreKey>,
    /// 0 until generated.
    pub registration_id: u32,
    pub adv_secret_key: Option<[u8; 32]>,

    /// Unset until the device is paired.
    pub id: Option<Jid>,
    pub account: Option<AdvSignedDeviceIdentity>,
    pub platform: String,
    pub business_name: String,
    pub push_name: String,

    stores: Option<DeviceStores>,
    container: Arc<dyn DeviceContainer>,
}

impl Device {
    /// An empty, unsaved device belonging to `container`.
    pub fn new(container: Arc<dyn DeviceContainer>) -> Self {
        Self {
            noise_key: None,
            identity_key: None,
            signed_pre_key: None,
            registration_id: 0,
            adv_secret_key: None,
            id: None,
            account: None,
            platform: String::new(),
            business_name: String::new(),
            push_name: String::new(),
            stores: None,
            container,
        }
    }

    /// Stores of a saved device. `None` until the device has an address and was saved.
    pub fn stores(&self) -> Option<&DeviceStores> {
        self.stores.as_ref()
    }

    /// True once stores are attached.
    pub fn is_initialized(&self) -> bool {
        self.stores.is_some()
    }

    pub(crate) fn attach_stores(&mut self, stores: DeviceStores) {
        self.stores = Some(stores);
    }

    /// Generate any missing long-term material.
    ///
    /// Covers the noise key, identity key, signed prekey, registration id and
    /// adv secret. Present values are never replaced. If something was
    /// generated and the device has an address, it is saved. Returns whether
    /// anything was generated.
    pub fn materialize_identity(&mut self) -> Result<bool> {
        let mut generated = Vec::new();

        if self.noise_key.is_none() {
            self.noise_key = Some(KeyPair::generate());
            generated.push("noise key");
        }
        if self.identity_key.is_none() {
            self.identity_key = Some(KeyPair::generate());
            generated.push("identity key");
        }
        if self.signed_pre_key.is_none() {
            let identity = self
                .identity_key
                .as_ref()
                .ok_or(StoreError::Incomplete("identity key"))?;
            self.signed_pre_key = Some(identity.create_signed_pre_key(FIRST_SIGNED_PRE_KEY_ID)?);
            generated.push("signed prekey");
        }
        if self.registration_id == 0 {
            self.registration_id = OsRng.gen_range(1..=u32::MAX);
            generated.push("registration id");
        }
        if self.adv_secret_key.is_none() {
            let mut secret = [0u8; 32];
            OsRng.fill_bytes(&mut secret);
            self.adv_secret_key = Some(secret);
            generated.push("adv secret");
        }

        if generated.is_empty() {
            return Ok(false);
        }
        tracing::debug!(?generated, "generated device identity material");
        if self.id.is_some() {
            self.save()?;
        }
        Ok(true)
    }

    /// Persist the device; attaches its stores on first save.
    pub fn save(&mut self) -> Result<()> {
        let jid = self.id.clone().ok_or(StoreError::MissingAddress)?;
        self.check_complete()?;
        self.container.put_device(self)?;
        if self.stores.is_none() {
            self.stores = Some(self.container.device_stores(&jid));
        }
        tracing::info!(jid = %jid, "saved device");
        Ok(())
    }

    /// Delete the device and everything stored for it.
    pub fn delete(&mut self) -> Result<()> {
        let jid = self.id.clone().ok_or(StoreError::MissingAddress)?;
        self.container.delete_device(self)?;
        self.stores = None;
        self.id = None;
        tracing::info!(jid = %jid, "deleted device");
        Ok(())
    }

    fn check_complete(&self) -> Result<()> {
        if self.noise_key.is_none() {
            return Err(StoreError::Incomplete("noise key"));
        }
        if self.identity_key.is_none() {
            return Err(StoreError::Incomplete("identity key"));
        }
        if self.signed_pre_key.is_none() {
            return Err(StoreError::Incomplete("signed prekey"));
        }
        if self.adv_secret_key.is_none() {
            return Err(StoreError::Incomplete("adv secret"));
        }
        Ok(())
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("registration_id", &self.registration_id)
            .field("noise_key", &self.noise_key)
            .field("identity_key", &self.identity_key)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
