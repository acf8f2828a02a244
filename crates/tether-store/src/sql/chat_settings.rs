use rusqlite::OptionalExtension;
use tether_types::{Jid, LocalChatSettings};

use super::SqlStore;
use crate::traits::ChatSettingsStore;
use crate::Result;

impl SqlStore {
    fn put_chat_setting(
        &self,
        chat: &Jid,
        column: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO tether_chat_settings (our_jid, chat_jid, {column}) VALUES (?1, ?2, ?3)
                 ON CONFLICT (our_jid, chat_jid) DO UPDATE SET {column} = excluded.{column}"
            ),
            rusqlite::params![self.jid, chat.to_string(), value],
        )?;
        Ok(())
    }
}

impl ChatSettingsStore for SqlStore {
    fn put_muted_until(&self, chat: &Jid, muted_until: u64) -> Result<()> {
        self.put_chat_setting(chat, "muted_until", &(muted_until as i64))
    }

    fn put_pinned(&self, chat: &Jid, pinned: bool) -> Result<()> {
        self.put_chat_setting(chat, "pinned", &pinned)
    }

    fn put_archived(&self, chat: &Jid, archived: bool) -> Result<()> {
        self.put_chat_setting(chat, "archived", &archived)
    }

    fn get_chat_settings(&self, chat: &Jid) -> Result<LocalChatSettings> {
        let conn = self.conn()?;
        let settings = conn
            .query_row(
                "SELECT muted_until, pinned, archived FROM tether_chat_settings
                 WHERE our_jid = ?1 AND chat_jid = ?2",
                rusqlite::params![self.jid, chat.to_string()],
                |row| {
                    Ok(LocalChatSettings {
                        found: true,
                        muted_until: row.get::<_, i64>(0)? as u64,
                        pinned: row.get(1)?,
                        archived: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(settings.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::test_support::saved_device_store;

    #[test]
    fn test_settings_upsert_per_field() {
        let (_container, store) = saved_device_store();
        let chat = Jid::new("123-456", tether_types::jid::GROUP_SERVER);
        assert!(!store.get_chat_settings(&chat).expect("get").found);

        store.put_pinned(&chat, true).expect("pin");
        store.put_muted_until(&chat, 1_900_000_000).expect("mute");
        let settings = store.get_chat_settings(&chat).expect("get");
        assert_eq!(
            settings,
            LocalChatSettings {
                found: true,
                muted_until: 1_900_000_000,
                pinned: true,
                archived: false,
            }
        );

        store.put_archived(&chat, true).expect("archive");
        store.put_muted_until(&chat, 0).expect("unmute");
        let settings = store.get_chat_settings(&chat).expect("get");
        assert!(settings.archived && settings.pinned);
        assert_eq!(settings.muted_until, 0);
    }
}
