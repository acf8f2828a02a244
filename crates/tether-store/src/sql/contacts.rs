use std::collections::HashMap;

use rusqlite::{OptionalExtension, Row};
use tether_types::{ContactInfo, Jid};

use super::SqlStore;
use crate::traits::ContactStore;
use crate::Result;

fn contact_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ContactInfo> {
    Ok(ContactInfo {
        found: true,
        first_name: row.get::<_, Option<String>>(offset)?.unwrap_or_default(),
        full_name: row.get::<_, Option<String>>(offset + 1)?.unwrap_or_default(),
        push_name: row.get::<_, Option<String>>(offset + 2)?.unwrap_or_default(),
        business_name: row.get::<_, Option<String>>(offset + 3)?.unwrap_or_default(),
    })
}

impl ContactStore for SqlStore {
    fn put_push_name(&self, user: &Jid, push_name: &str) -> Result<(bool, String)> {
        let conn = self.conn()?;
        let their_jid = user.to_string();
        let previous: Option<Option<String>> = conn
            .query_row(
                "SELECT push_name FROM tether_contacts WHERE our_jid = ?1 AND their_jid = ?2",
                rusqlite::params![self.jid, their_jid],
                |row| row.get(0),
            )
            .optional()?;
        let previous = previous.flatten().unwrap_or_default();
        if previous == push_name {
            return Ok((false, String::new()));
        }

        conn.execute(
            "INSERT INTO tether_contacts (our_jid, their_jid, push_name) VALUES (?1, ?2, ?3)
             ON CONFLICT (our_jid, their_jid) DO UPDATE SET push_name = excluded.push_name",
            rusqlite::params![self.jid, their_jid, push_name],
        )?;
        Ok((true, previous))
    }

    fn put_business_name(&self, user: &Jid, business_name: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tether_contacts (our_jid, their_jid, business_name) VALUES (?1, ?2, ?3)
             ON CONFLICT (our_jid, their_jid) DO UPDATE SET business_name = excluded.business_name",
            rusqlite::params![self.jid, user.to_string(), business_name],
        )?;
        Ok(())
    }

    fn put_contact_name(&self, user: &Jid, full_name: &str, first_name: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tether_contacts (our_jid, their_jid, first_name, full_name)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (our_jid, their_jid) DO UPDATE SET
                first_name = excluded.first_name,
                full_name = excluded.full_name",
            rusqlite::params![self.jid, user.to_string(), first_name, full_name],
        )?;
        Ok(())
    }

    fn get_contact(&self, user: &Jid) -> Result<ContactInfo> {
        let conn = self.conn()?;
        let contact = conn
            .query_row(
                "SELECT first_name, full_name, push_name, business_name FROM tether_contacts
                 WHERE our_jid = ?1 AND their_jid = ?2",
                rusqlite::params![self.jid, user.to_string()],
                |row| contact_from_row(row, 0),
            )
            .optional()?;
        Ok(contact.unwrap_or_default())
    }

    fn get_all_contacts(&self) -> Result<HashMap<Jid, ContactInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT their_jid, first_name, full_name, push_name, business_name FROM tether_contacts
             WHERE our_jid = ?1",
        )?;
        let rows = stmt
            .query_map([&self.jid], |row| {
                Ok((row.get::<_, String>(0)?, contact_from_row(row, 1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(jid, info)| -> Result<(Jid, ContactInfo)> { Ok((jid.parse()?, info)) })
            .collect()
    }
}
