//! Peer identity keys (trust on first use).

use rusqlite::OptionalExtension;

use super::SqlStore;
use crate::traits::{IdentityStore, IdentityTrust};
use crate::Result;

impl IdentityStore for SqlStore {
    fn put_identity(&self, address: &str, key: &[u8; 32]) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tether_identity_keys (our_jid, their_id, identity) VALUES (?1, ?2, ?3)
             ON CONFLICT (our_jid, their_id) DO UPDATE SET identity = excluded.identity",
            rusqlite::params![self.jid, address, key.as_slice()],
        )?;
        Ok(())
    }

    fn is_trusted_identity(&self, address: &str, key: &[u8; 32]) -> Result<IdentityTrust> {
        let conn = self.conn()?;
        let stored: Option<Vec<u8>> = conn
            .query_row(
                "SELECT identity FROM tether_identity_keys WHERE our_jid = ?1 AND their_id = ?2",
                rusqlite::params![self.jid, address],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match stored {
            None => IdentityTrust::FirstUse,
            Some(stored) if stored.as_slice() == key.as_slice() => IdentityTrust::Trusted,
            Some(_) => {
                tracing::warn!(address, "peer identity key changed");
                IdentityTrust::Changed
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::test_support::saved_device_store;

    #[test]
    fn test_trust_on_first_use() {
        let (_container, store) = saved_device_store();
        assert_eq!(
            store.is_trusted_identity("200:0", &[1u8; 32]).expect("check"),
            IdentityTrust::FirstUse
        );
        store.put_identity("200:0", &[1u8; 32]).expect("put");
        assert_eq!(
            store.is_trusted_identity("200:0", &[1u8; 32]).expect("check"),
            IdentityTrust::Trusted
        );
        assert_eq!(
            store.is_trusted_identity("200:0", &[2u8; 32]).expect("check"),
            IdentityTrust::Changed
        );
    }

    #[test]
    fn test_put_overwrites() {
        let (_container, store) = saved_device_store();
        store.put_identity("200:0", &[1u8; 32]).expect("put");
        store.put_identity("200:0", &[2u8; 32]).expect("put");
        assert_eq!(
            store.is_trusted_identity("200:0", &[2u8; 32]).expect("check"),
            IdentityTrust::Trusted
        );
    }
}
