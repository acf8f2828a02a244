//! Device table access.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, Row};
use tether_crypto::keys::{KeyPair, SignedPreKey};
use tether_types::{AdvSignedDeviceIdentity, Jid};

use super::{lock, to_fixed, SharedConnection, SqlStore};
use crate::device::{Device, DeviceStores};
use crate::migrations::Migrator;
use crate::traits::DeviceContainer;
use crate::{configure, Result, StoreError};

const SELECT_DEVICE: &str = "SELECT jid, registration_id, noise_key, identity_key,
        signed_pre_key, signed_pre_key_id, signed_pre_key_sig,
        adv_key, adv_details, adv_account_sig, adv_account_sig_key, adv_device_sig,
        platform, business_name, push_name
    FROM tether_device";

/// Owns the database and the devices stored in it.
#[derive(Clone)]
pub struct SqlContainer {
    conn: SharedConnection,
}

struct DeviceRow {
    jid: String,
    registration_id: u32,
    noise_key: Vec<u8>,
    identity_key: Vec<u8>,
    signed_pre_key: Vec<u8>,
    signed_pre_key_id: u32,
    signed_pre_key_sig: Vec<u8>,
    adv_key: Vec<u8>,
    adv_details: Option<Vec<u8>>,
    adv_account_sig: Option<Vec<u8>>,
    adv_account_sig_key: Option<Vec<u8>>,
    adv_device_sig: Option<Vec<u8>>,
    platform: String,
    business_name: String,
    push_name: String,
}

impl DeviceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            jid: row.get(0)?,
            registration_id: row.get(1)?,
            noise_key: row.get(2)?,
            identity_key: row.get(3)?,
            signed_pre_key: row.get(4)?,
            signed_pre_key_id: row.get(5)?,
            signed_pre_key_sig: row.get(6)?,
            adv_key: row.get(7)?,
            adv_details: row.get(8)?,
            adv_account_sig: row.get(9)?,
            adv_account_sig_key: row.get(10)?,
            adv_device_sig: row.get(11)?,
            platform: row.get(12)?,
            business_name: row.get(13)?,
            push_name: row.get(14)?,
        })
    }
}

impl SqlContainer {
    /// Open the database at `path`, configure it and run pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_migrator(conn, &Migrator::standard())
    }

    /// In-memory container (for testing).
    pub fn open_memory() -> Result<Self> {
        Self::with_migrator(Connection::open_in_memory()?, &Migrator::standard())
    }

    /// Configure `conn` and bring it up to date with `migrator`.
    pub fn with_migrator(mut conn: Connection, migrator: &Migrator) -> Result<Self> {
        configure(&conn)?;
        migrator.upgrade(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The shared connection.
    pub fn connection(&self) -> SharedConnection {
        Arc::clone(&self.conn)
    }

    /// A fresh, unsaved device belonging to this container.
    pub fn new_device(&self) -> Device {
        Device::new(Arc::new(self.clone()))
    }

    pub fn get_device(&self, jid: &Jid) -> Result<Option<Device>> {
        let row = {
            let conn = lock(&self.conn)?;
            conn.query_row(
                &format!("{SELECT_DEVICE} WHERE jid = ?1"),
                [jid.to_string()],
                DeviceRow::from_row,
            )
            .optional()?
        };
        row.map(|row| self.device_from_row(row)).transpose()
    }

    /// The first stored device, if any.
    pub fn get_first_device(&self) -> Result<Option<Device>> {
        Ok(self.get_all_devices()?.into_iter().next())
    }

    pub fn get_all_devices(&self) -> Result<Vec<Device>> {
        let rows = {
            let conn = lock(&self.conn)?;
            let mut stmt = conn.prepare(&format!("{SELECT_DEVICE} ORDER BY jid"))?;
            let rows = stmt
                .query_map([], DeviceRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        rows.into_iter()
            .map(|row| self.device_from_row(row))
            .collect()
    }

    fn device_from_row(&self, row: DeviceRow) -> Result<Device> {
        let jid: Jid = row.jid.parse()?;
        let identity_key = KeyPair::from_private(to_fixed("identity_key", &row.identity_key)?);
        let signed_pre_key = SignedPreKey {
            key_id: row.signed_pre_key_id,
            key_pair: KeyPair::from_private(to_fixed("signed_pre_key", &row.signed_pre_key)?),
            signature: to_fixed("signed_pre_key_sig", &row.signed_pre_key_sig)?,
        };

        let account = match (row.adv_details, row.adv_account_sig, row.adv_device_sig) {
            (Some(details), Some(account_sig), Some(device_sig)) => Some(AdvSignedDeviceIdentity {
                details,
                account_signature_key: row
                    .adv_account_sig_key
                    .as_deref()
                    .map(|key| to_fixed("adv_account_sig_key", key))
                    .transpose()?,
                account_signature: to_fixed("adv_account_sig", &account_sig)?,
                device_signature: to_fixed("adv_device_sig", &device_sig)?,
            }),
            (None, None, None) => None,
            _ => {
                return Err(StoreError::Corrupt(format!(
                    "device {jid} has a partial account signature"
                )))
            }
        };

        let mut device = Device::new(Arc::new(self.clone()));
        device.noise_key = Some(KeyPair::from_private(to_fixed("noise_key", &row.noise_key)?));
        device.identity_key = Some(identity_key);
        device.signed_pre_key = Some(signed_pre_key);
        device.registration_id = row.registration_id;
        device.adv_secret_key = Some(to_fixed("adv_key", &row.adv_key)?);
        device.account = account;
        device.platform = row.platform;
        device.business_name = row.business_name;
        device.push_name = row.push_name;
        device.attach_stores(self.device_stores(&jid));
        device.id = Some(jid);
        Ok(device)
    }
}

impl DeviceContainer for SqlContainer {
    fn put_device(&self, device: &Device) -> Result<()> {
        let jid = device.id.as_ref().ok_or(StoreError::MissingAddress)?;
        let noise = device.noise_key.as_ref().ok_or(StoreError::Incomplete("noise key"))?;
        let identity = device
            .identity_key
            .as_ref()
            .ok_or(StoreError::Incomplete("identity key"))?;
        let spk = device
            .signed_pre_key
            .as_ref()
            .ok_or(StoreError::Incomplete("signed prekey"))?;
        let adv_key = device
            .adv_secret_key
            .as_ref()
            .ok_or(StoreError::Incomplete("adv secret"))?;
        let account = device.account.as_ref();

        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO tether_device (jid, registration_id, noise_key, identity_key,
                signed_pre_key, signed_pre_key_id, signed_pre_key_sig,
                adv_key, adv_details, adv_account_sig, adv_account_sig_key, adv_device_sig,
                platform, business_name, push_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT (jid) DO UPDATE SET
                registration_id = excluded.registration_id,
                noise_key = excluded.noise_key,
                identity_key = excluded.identity_key,
                signed_pre_key = excluded.signed_pre_key,
                signed_pre_key_id = excluded.signed_pre_key_id,
                signed_pre_key_sig = excluded.signed_pre_key_sig,
                adv_key = excluded.adv_key,
                adv_details = excluded.adv_details,
                adv_account_sig = excluded.adv_account_sig,
                adv_account_sig_key = excluded.adv_account_sig_key,
                adv_device_sig = excluded.adv_device_sig,
                platform = excluded.platform,
                business_name = excluded.business_name,
                push_name = excluded.push_name",
            rusqlite::params![
                jid.to_string(),
                device.registration_id,
                noise.private().as_slice(),
                identity.private().as_slice(),
                spk.key_pair.private().as_slice(),
                spk.key_id,
                spk.signature.as_slice(),
                adv_key.as_slice(),
                account.map(|a| a.details.as_slice()),
                account.map(|a| a.account_signature.as_slice()),
                account
                    .and_then(|a| a.account_signature_key.as_ref())
                    .map(|k| k.as_slice()),
                account.map(|a| a.device_signature.as_slice()),
                device.platform,
                device.business_name,
                device.push_name,
            ],
        )?;
        Ok(())
    }

    fn delete_device(&self, device: &Device) -> Result<()> {
        let jid = device.id.as_ref().ok_or(StoreError::MissingAddress)?;
        let conn = lock(&self.conn)?;
        conn.execute("DELETE FROM tether_device WHERE jid = ?1", [jid.to_string()])?;
        Ok(())
    }

    fn device_stores(&self, jid: &Jid) -> DeviceStores {
        DeviceStores::from_single(Arc::new(SqlStore::new(self.connection(), jid)))
    }
}

impl std::fmt::Debug for SqlContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlContainer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(container: &SqlContainer, user: &str) -> Device {
        let mut device = container.new_device();
        device.id = Some(Jid::device(user, 2));
        device.push_name = "Ada".into();
        device.materialize_identity().expect("materialize");
        device
    }

    #[test]
    fn test_roundtrip_preserves_keys() {
        let container = SqlContainer::open_memory().expect("open");
        let device = saved(&container, "555");

        let loaded = container.get_first_device().expect("query").expect("device");
        assert_eq!(loaded.id, device.id);
        assert_eq!(loaded.push_name, "Ada");
        assert_eq!(
            loaded.identity_key.as_ref().expect("identity").public(),
            device.identity_key.as_ref().expect("identity").public()
        );
        let spk = loaded.signed_pre_key.as_ref().expect("spk");
        spk.verify(loaded.identity_key.as_ref().expect("identity").public())
            .expect("stored signature still verifies");
        assert!(loaded.account.is_none());
        assert!(loaded.is_initialized());
    }

    #[test]
    fn test_account_roundtrip() {
        let container = SqlContainer::open_memory().expect("open");
        let mut device = saved(&container, "556");
        device.account = Some(AdvSignedDeviceIdentity {
            details: vec![1, 2, 3],
            account_signature_key: Some([4u8; 32]),
            account_signature: [5u8; 64],
            device_signature: [6u8; 64],
        });
        device.save().expect("save");

        let loaded = container
            .get_device(&Jid::device("556", 2))
            .expect("query")
            .expect("device");
        assert_eq!(loaded.account, device.account);
    }

    #[test]
    fn test_get_missing_device() {
        let container = SqlContainer::open_memory().expect("open");
        assert!(container
            .get_device(&Jid::device("404", 1))
            .expect("query")
            .is_none());
    }

    #[test]
    fn test_all_devices_sorted() {
        let container = SqlContainer::open_memory().expect("open");
        saved(&container, "2");
        saved(&container, "1");
        let all = container.get_all_devices().expect("query");
        let users: Vec<_> = all
            .iter()
            .map(|d| d.id.as_ref().expect("id").user.clone())
            .collect();
        assert_eq!(users, ["1", "2"]);
    }

    #[test]
    fn test_save_is_upsert() {
        let container = SqlContainer::open_memory().expect("open");
        let mut device = saved(&container, "777");
        device.push_name = "Grace".into();
        device.save().expect("second save");
        let all = container.get_all_devices().expect("query");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].push_name, "Grace");
    }
}
