//! One-time prekey pool.
//!
//! Ids come from the device's `next_pre_key_id` counter, read and advanced
//! inside the same `IMMEDIATE` transaction that inserts the keys.

use rusqlite::{OptionalExtension, Transaction, TransactionBehavior};
use tether_crypto::keys::{KeyPair, PreKey, PRE_KEY_ID_LIMIT};

use super::{to_fixed, SqlStore};
use crate::traits::PreKeyStore;
use crate::{Result, StoreError};

impl SqlStore {
    fn generate_pre_keys(&self, tx: &Transaction<'_>, count: u32) -> Result<Vec<PreKey>> {
        let next: u32 = tx.query_row(
            "SELECT next_pre_key_id FROM tether_device WHERE jid = ?1",
            [&self.jid],
            |row| row.get(0),
        )?;
        let end = next
            .checked_add(count)
            .filter(|end| *end <= PRE_KEY_ID_LIMIT)
            .ok_or(StoreError::PreKeyIdsExhausted)?;

        let mut stmt = tx.prepare(
            "INSERT INTO tether_pre_keys (jid, key_id, key, uploaded) VALUES (?1, ?2, ?3, false)",
        )?;
        let mut keys = Vec::with_capacity(count as usize);
        for id in next..end {
            let key = PreKey::generate(id)?;
            stmt.execute(rusqlite::params![self.jid, id, key.key_pair.private().as_slice()])?;
            keys.push(key);
        }
        tx.execute(
            "UPDATE tether_device SET next_pre_key_id = ?1 WHERE jid = ?2",
            rusqlite::params![end, self.jid],
        )?;
        tracing::debug!(first = next, count, "generated prekeys");
        Ok(keys)
    }
}

fn pre_key_from_row(key_id: u32, private: &[u8]) -> Result<PreKey> {
    Ok(PreKey {
        key_id,
        key_pair: KeyPair::from_private(to_fixed("pre_key", private)?),
    })
}

impl PreKeyStore for SqlStore {
    fn get_or_generate_pre_keys(&self, count: u32) -> Result<Vec<PreKey>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let rows = {
            let mut stmt = tx.prepare(
                "SELECT key_id, key FROM tether_pre_keys
                 WHERE jid = ?1 AND uploaded = false ORDER BY key_id LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![self.jid, count], |row| {
                    Ok((row.get::<_, u32>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        let mut keys = rows
            .iter()
            .map(|(id, private)| pre_key_from_row(*id, private))
            .collect::<Result<Vec<_>>>()?;

        let missing = count.saturating_sub(keys.len() as u32);
        if missing > 0 {
            keys.extend(self.generate_pre_keys(&tx, missing)?);
        }
        tx.commit()?;
        Ok(keys)
    }

    fn generate_one_pre_key(&self) -> Result<PreKey> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let key = self
            .generate_pre_keys(&tx, 1)?
            .pop()
            .ok_or(StoreError::PreKeyIdsExhausted)?;
        tx.commit()?;
        Ok(key)
    }

    fn get_pre_key(&self, id: u32) -> Result<Option<PreKey>> {
        let conn = self.conn()?;
        let private: Option<Vec<u8>> = conn
            .query_row(
                "SELECT key FROM tether_pre_keys WHERE jid = ?1 AND key_id = ?2",
                rusqlite::params![self.jid, id],
                |row| row.get(0),
            )
            .optional()?;
        private.map(|p| pre_key_from_row(id, &p)).transpose()
    }

    fn remove_pre_key(&self, id: u32) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM tether_pre_keys WHERE jid = ?1 AND key_id = ?2",
            rusqlite::params![self.jid, id],
        )?;
        Ok(())
    }

    fn mark_pre_keys_uploaded(&self, up_to_id: u32) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE tether_pre_keys SET uploaded = true WHERE jid = ?1 AND key_id <= ?2",
            rusqlite::params![self.jid, up_to_id],
        )?;
        Ok(())
    }

    fn uploaded_pre_key_count(&self) -> Result<u32> {
        let conn = self.conn()?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM tether_pre_keys WHERE jid = ?1 AND uploaded = true",
            [&self.jid],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::sql::test_support::saved_device_store;

    fn ids(keys: &[PreKey]) -> Vec<u32> {
        keys.iter().map(|k| k.key_id).collect()
    }

    #[test]
    fn test_get_or_generate_reuses_unuploaded() {
        let (_container, store) = saved_device_store();
        let first = store.get_or_generate_pre_keys(10).expect("first");
        let second = store.get_or_generate_pre_keys(10).expect("second");
        assert_eq!(first.len(), 10);
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(ids(&first), (1..=10).collect::<Vec<_>>());
        assert_eq!(first[3].key_pair.public(), second[3].key_pair.public());
    }

    #[test]
    fn test_get_or_generate_tops_up() {
        let (_container, store) = saved_device_store();
        store.get_or_generate_pre_keys(5).expect("five");
        store.mark_pre_keys_uploaded(5).expect("mark");
        let next = store.get_or_generate_pre_keys(3).expect("three");
        assert_eq!(ids(&next), [6, 7, 8]);
    }

    #[test]
    fn test_mark_uploaded_counts() {
        let (_container, store) = saved_device_store();
        store.get_or_generate_pre_keys(10).expect("generate");
        store.mark_pre_keys_uploaded(4).expect("mark");
        assert_eq!(store.uploaded_pre_key_count().expect("count"), 4);
        store.mark_pre_keys_uploaded(4).expect("idempotent");
        assert_eq!(store.uploaded_pre_key_count().expect("count"), 4);

        let remaining = store.get_or_generate_pre_keys(10).expect("unuploaded");
        assert_eq!(ids(&remaining)[..6], [5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_removed_ids_are_not_reissued() {
        let (_container, store) = saved_device_store();
        store.get_or_generate_pre_keys(3).expect("generate");
        store.remove_pre_key(3).expect("remove");
        assert!(store.get_pre_key(3).expect("get").is_none());
        assert_eq!(store.generate_one_pre_key().expect("one").key_id, 4);
    }

    #[test]
    fn test_get_pre_key_roundtrip() {
        let (_container, store) = saved_device_store();
        let key = store.generate_one_pre_key().expect("one");
        let loaded = store.get_pre_key(key.key_id).expect("get").expect("exists");
        assert_eq!(loaded.key_pair.public(), key.key_pair.public());
    }

    #[test]
    fn test_id_space_exhaustion() {
        let (container, store) = saved_device_store();
        container
            .connection()
            .lock()
            .expect("lock")
            .execute(
                "UPDATE tether_device SET next_pre_key_id = ?1",
                [PRE_KEY_ID_LIMIT - 1],
            )
            .expect("update");

        assert_eq!(
            store.generate_one_pre_key().expect("last id").key_id,
            PRE_KEY_ID_LIMIT - 1
        );
        assert!(matches!(
            store.generate_one_pre_key(),
            Err(StoreError::PreKeyIdsExhausted)
        ));
    }

    #[test]
    fn test_concurrent_generation_has_unique_ids() {
        let (_container, store) = saved_device_store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| store.generate_one_pre_key().expect("generate").key_id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("join") {
                assert!(seen.insert(id), "id {id} issued twice");
            }
        }
        assert_eq!(seen.len(), 100);
    }
}
