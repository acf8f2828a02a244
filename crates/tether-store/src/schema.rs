//! Released schema steps.
//!
//! Steps are applied in order and never edited once released; fixing a
//! mistake means appending a new step.

use rusqlite::Transaction;

use crate::migrations::Migration;

/// Every released step, oldest first.
pub fn steps() -> Vec<Migration> {
    vec![
        Migration::new("initial tables", create_tables),
        Migration::new("account key and prekey counter", add_prekey_counter),
    ]
}

const CREATE_TABLES: &str = r#"
CREATE TABLE tether_device (
    jid TEXT PRIMARY KEY,

    registration_id INTEGER NOT NULL CHECK ( registration_id >= 0 AND registration_id < 4294967296 ),

    noise_key    BLOB NOT NULL CHECK ( length(noise_key) = 32 ),
    identity_key BLOB NOT NULL CHECK ( length(identity_key) = 32 ),

    signed_pre_key     BLOB    NOT NULL CHECK ( length(signed_pre_key) = 32 ),
    signed_pre_key_id  INTEGER NOT NULL CHECK ( signed_pre_key_id >= 0 AND signed_pre_key_id < 16777216 ),
    signed_pre_key_sig BLOB    NOT NULL CHECK ( length(signed_pre_key_sig) = 64 ),

    adv_key         BLOB NOT NULL CHECK ( length(adv_key) = 32 ),
    adv_details     BLOB,
    adv_account_sig BLOB CHECK ( adv_account_sig IS NULL OR length(adv_account_sig) = 64 ),
    adv_device_sig  BLOB CHECK ( adv_device_sig IS NULL OR length(adv_device_sig) = 64 ),

    platform      TEXT NOT NULL DEFAULT '',
    business_name TEXT NOT NULL DEFAULT '',
    push_name     TEXT NOT NULL DEFAULT ''
);

CREATE TABLE tether_identity_keys (
    our_jid  TEXT,
    their_id TEXT,
    identity BLOB NOT NULL CHECK ( length(identity) = 32 ),

    PRIMARY KEY (our_jid, their_id),
    FOREIGN KEY (our_jid) REFERENCES tether_device(jid) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE tether_pre_keys (
    jid      TEXT,
    key_id   INTEGER          CHECK ( key_id >= 0 AND key_id < 16777216 ),
    key      BLOB    NOT NULL CHECK ( length(key) = 32 ),
    uploaded BOOLEAN NOT NULL,

    PRIMARY KEY (jid, key_id),
    FOREIGN KEY (jid) REFERENCES tether_device(jid) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE tether_sessions (
    our_jid  TEXT,
    their_id TEXT,
    session  BLOB,

    PRIMARY KEY (our_jid, their_id),
    FOREIGN KEY (our_jid) REFERENCES tether_device(jid) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE tether_sender_keys (
    our_jid    TEXT,
    chat_id    TEXT,
    sender_id  TEXT,
    sender_key BLOB NOT NULL,

    PRIMARY KEY (our_jid, chat_id, sender_id),
    FOREIGN KEY (our_jid) REFERENCES tether_device(jid) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE tether_app_state_sync_keys (
    jid         TEXT,
    key_id      BLOB,
    key_data    BLOB    NOT NULL CHECK ( length(key_data) = 32 ),
    timestamp   INTEGER NOT NULL,
    fingerprint BLOB    NOT NULL,

    PRIMARY KEY (jid, key_id),
    FOREIGN KEY (jid) REFERENCES tether_device(jid) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE tether_app_state_version (
    jid     TEXT,
    name    TEXT,
    version INTEGER NOT NULL,
    hash    BLOB    NOT NULL CHECK ( length(hash) = 128 ),

    PRIMARY KEY (jid, name),
    FOREIGN KEY (jid) REFERENCES tether_device(jid) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE tether_app_state_mutation_macs (
    jid       TEXT,
    name      TEXT,
    version   INTEGER,
    index_mac BLOB          CHECK ( length(index_mac) = 32 ),
    value_mac BLOB NOT NULL CHECK ( length(value_mac) = 32 ),

    PRIMARY KEY (jid, name, version, index_mac),
    FOREIGN KEY (jid, name) REFERENCES tether_app_state_version(jid, name) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE tether_contacts (
    our_jid       TEXT,
    their_jid     TEXT,
    first_name    TEXT,
    full_name     TEXT,
    push_name     TEXT,
    business_name TEXT,

    PRIMARY KEY (our_jid, their_jid),
    FOREIGN KEY (our_jid) REFERENCES tether_device(jid) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE tether_chat_settings (
    our_jid     TEXT,
    chat_jid    TEXT,
    muted_until INTEGER NOT NULL DEFAULT 0,
    pinned      BOOLEAN NOT NULL DEFAULT false,
    archived    BOOLEAN NOT NULL DEFAULT false,

    PRIMARY KEY (our_jid, chat_jid),
    FOREIGN KEY (our_jid) REFERENCES tether_device(jid) ON DELETE CASCADE ON UPDATE CASCADE
);
"#;

// Ids come from a per-device counter so that removing the newest prekey
// cannot cause its id to be issued again.
const ADD_PREKEY_COUNTER: &str = r#"
ALTER TABLE tether_device ADD COLUMN adv_account_sig_key BLOB
    CHECK ( adv_account_sig_key IS NULL OR length(adv_account_sig_key) = 32 );
ALTER TABLE tether_device ADD COLUMN next_pre_key_id INTEGER NOT NULL DEFAULT 1;

UPDATE tether_device SET next_pre_key_id = COALESCE(
    (SELECT MAX(key_id) + 1 FROM tether_pre_keys WHERE tether_pre_keys.jid = tether_device.jid),
    1
);
"#;

fn create_tables(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(CREATE_TABLES)
}

fn add_prekey_counter(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(ADD_PREKEY_COUNTER)
}
