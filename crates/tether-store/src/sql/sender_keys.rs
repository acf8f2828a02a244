use rusqlite::OptionalExtension;

use super::SqlStore;
use crate::traits::SenderKeyStore;
use crate::Result;

impl SenderKeyStore for SqlStore {
    fn put_sender_key(&self, group: &str, user: &str, session: &[u8]) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tether_sender_keys (our_jid, chat_id, sender_id, sender_key)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (our_jid, chat_id, sender_id)
             DO UPDATE SET sender_key = excluded.sender_key",
            rusqlite::params![self.jid, group, user, session],
        )?;
        Ok(())
    }

    fn get_sender_key(&self, group: &str, user: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let key = conn
            .query_row(
                "SELECT sender_key FROM tether_sender_keys
                 WHERE our_jid = ?1 AND chat_id = ?2 AND sender_id = ?3",
                rusqlite::params![self.jid, group, user],
                |row| row.get(0),
            )
            .optional()?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::test_support::saved_device_store;

    #[test]
    fn test_sender_keys_scoped_by_group_and_sender() {
        let (_container, store) = saved_device_store();
        store.put_sender_key("g1", "u1", b"a").expect("put");
        store.put_sender_key("g1", "u2", b"b").expect("put");
        store.put_sender_key("g2", "u1", b"c").expect("put");
        store.put_sender_key("g1", "u1", b"d").expect("overwrite");

        assert_eq!(store.get_sender_key("g1", "u1").expect("get"), Some(b"d".to_vec()));
        assert_eq!(store.get_sender_key("g1", "u2").expect("get"), Some(b"b".to_vec()));
        assert_eq!(store.get_sender_key("g2", "u1").expect("get"), Some(b"c".to_vec()));
        assert_eq!(store.get_sender_key("g2", "u2").expect("get"), None);
    }
}
