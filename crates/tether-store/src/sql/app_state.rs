//! App-state sync keys, versions and mutation MACs.

use rusqlite::{OptionalExtension, TransactionBehavior};
use tether_types::appstate::{APP_STATE_HASH_SIZE, MUTATION_MAC_SIZE, SYNC_KEY_DATA_SIZE};
use tether_types::{AppStateMutationMac, AppStateSyncKey};

use super::{to_fixed, SqlStore};
use crate::traits::{AppStateStore, AppStateSyncKeyStore};
use crate::{check_len, Result};

impl AppStateSyncKeyStore for SqlStore {
    fn put_app_state_sync_key(&self, id: &[u8], key: &AppStateSyncKey) -> Result<()> {
        check_len("key_data", SYNC_KEY_DATA_SIZE, key.key_data.len())?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tether_app_state_sync_keys (jid, key_id, key_data, timestamp, fingerprint)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (jid, key_id) DO UPDATE SET
                key_data = excluded.key_data,
                timestamp = excluded.timestamp,
                fingerprint = excluded.fingerprint",
            rusqlite::params![self.jid, id, key.key_data, key.timestamp, key.fingerprint],
        )?;
        Ok(())
    }

    fn get_app_state_sync_key(&self, id: &[u8]) -> Result<Option<AppStateSyncKey>> {
        let conn = self.conn()?;
        let key = conn
            .query_row(
                "SELECT key_data, timestamp, fingerprint FROM tether_app_state_sync_keys
                 WHERE jid = ?1 AND key_id = ?2",
                rusqlite::params![self.jid, id],
                |row| {
                    Ok(AppStateSyncKey {
                        key_data: row.get(0)?,
                        timestamp: row.get(1)?,
                        fingerprint: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(key)
    }
}

impl AppStateStore for SqlStore {
    fn put_app_state_version(
        &self,
        name: &str,
        version: u64,
        hash: &[u8; APP_STATE_HASH_SIZE],
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tether_app_state_version (jid, name, version, hash) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (jid, name)
             DO UPDATE SET version = excluded.version, hash = excluded.hash",
            rusqlite::params![self.jid, name, version as i64, hash.as_slice()],
        )?;
        Ok(())
    }

    fn get_app_state_version(&self, name: &str) -> Result<(u64, [u8; APP_STATE_HASH_SIZE])> {
        let conn = self.conn()?;
        let row: Option<(i64, Vec<u8>)> = conn
            .query_row(
                "SELECT version, hash FROM tether_app_state_version WHERE jid = ?1 AND name = ?2",
                rusqlite::params![self.jid, name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((version, hash)) => Ok((version as u64, to_fixed("hash", &hash)?)),
            None => Ok((0, [0u8; APP_STATE_HASH_SIZE])),
        }
    }

    fn delete_app_state_version(&self, name: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM tether_app_state_version WHERE jid = ?1 AND name = ?2",
            rusqlite::params![self.jid, name],
        )?;
        Ok(())
    }

    fn put_mutation_macs(
        &self,
        name: &str,
        version: u64,
        mutations: &[AppStateMutationMac],
    ) -> Result<()> {
        for mutation in mutations {
            if let Some(index_mac) = &mutation.index_mac {
                check_len("index_mac", MUTATION_MAC_SIZE, index_mac.len())?;
            }
            check_len("value_mac", MUTATION_MAC_SIZE, mutation.value_mac.len())?;
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tether_app_state_mutation_macs (jid, name, version, index_mac, value_mac)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for mutation in mutations {
                stmt.execute(rusqlite::params![
                    self.jid,
                    name,
                    version as i64,
                    mutation.index_mac,
                    mutation.value_mac,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_mutation_macs(&self, name: &str, index_macs: &[Vec<u8>]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(
                "DELETE FROM tether_app_state_mutation_macs
                 WHERE jid = ?1 AND name = ?2 AND index_mac = ?3",
            )?;
            for index_mac in index_macs {
                stmt.execute(rusqlite::params![self.jid, name, index_mac])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_mutation_mac(&self, name: &str, index_mac: &[u8]) -> Result<Option<Vec<u8>>> {
        check_len("index_mac", MUTATION_MAC_SIZE, index_mac.len())?;
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value_mac FROM tether_app_state_mutation_macs
                 WHERE jid = ?1 AND name = ?2 AND index_mac = ?3
                 ORDER BY version DESC LIMIT 1",
                rusqlite::params![self.jid, name, index_mac],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}
