use rusqlite::OptionalExtension;

use super::SqlStore;
use crate::traits::SessionStore;
use crate::Result;

impl SessionStore for SqlStore {
    fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let session: Option<Option<Vec<u8>>> = conn
            .query_row(
                "SELECT session FROM tether_sessions WHERE our_jid = ?1 AND their_id = ?2",
                rusqlite::params![self.jid, address],
                |row| row.get(0),
            )
            .optional()?;
        Ok(session.flatten())
    }

    fn has_session(&self, address: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM tether_sessions WHERE our_jid = ?1 AND their_id = ?2)",
            rusqlite::params![self.jid, address],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn put_session(&self, address: &str, session: &[u8]) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tether_sessions (our_jid, their_id, session) VALUES (?1, ?2, ?3)
             ON CONFLICT (our_jid, their_id) DO UPDATE SET session = excluded.session",
            rusqlite::params![self.jid, address, session],
        )?;
        Ok(())
    }
}
