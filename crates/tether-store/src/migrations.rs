//! Schema migration runner.
//!
//! The schema version is the number of steps applied from the front of the
//! registry, stored in `tether_version` (a missing row reads as 0). Each step
//! commits together with its version bump, so an interrupted run resumes at
//! the first step that did not commit. Migrations are forward-only.

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::{schema, Result, StoreError};

/// A single schema step.
pub type MigrationFn = fn(&Transaction<'_>) -> rusqlite::Result<()>;

/// A named, released schema step.
#[derive(Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub apply: MigrationFn,
}

impl Migration {
    pub const fn new(name: &'static str, apply: MigrationFn) -> Self {
        Self { name, apply }
    }
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration").field("name", &self.name).finish()
    }
}

/// Ordered registry of schema steps.
#[derive(Debug, Clone)]
pub struct Migrator {
    steps: Vec<Migration>,
}

impl Migrator {
    /// A registry over an explicit list of steps.
    pub fn new(steps: Vec<Migration>) -> Self {
        Self { steps }
    }

    /// The released steps.
    pub fn standard() -> Self {
        Self::new(schema::steps())
    }

    /// Version reached once every step has run.
    pub fn latest(&self) -> u32 {
        self.steps.len() as u32
    }

    /// Version currently recorded in the database.
    pub fn current_version(conn: &Connection) -> Result<u32> {
        ensure_version_table(conn)?;
        read_version(conn)
    }

    /// Apply every pending step. Returns how many steps ran.
    ///
    /// Each step runs in its own `IMMEDIATE` transaction and the version is
    /// re-read under that lock, so two runners never apply the same step.
    pub fn upgrade(&self, conn: &mut Connection) -> Result<usize> {
        ensure_version_table(conn)?;
        let latest = self.latest();
        let mut applied = 0;

        loop {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let version = read_version(&tx)?;
            if version > latest {
                return Err(StoreError::Migration(format!(
                    "database version {version} is newer than supported {latest}"
                )));
            }
            let Some(step) = self.steps.get(version as usize) else {
                break;
            };

            tracing::debug!(version, step = step.name, "running schema migration");
            (step.apply)(&tx).map_err(|source| StoreError::MigrationStep {
                index: version,
                name: step.name,
                source,
            })?;
            write_version(&tx, version + 1)?;
            tx.commit()?;

            tracing::info!(version = version + 1, step = step.name, "applied schema migration");
            applied += 1;
        }

        Ok(applied)
    }
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS tether_version (version INTEGER)")?;
    Ok(())
}

fn read_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT version FROM tether_version LIMIT 1", [], |row| row.get(0))
        .optional()?;
    Ok(version.unwrap_or(0))
}

fn write_version(tx: &Transaction<'_>, version: u32) -> Result<()> {
    tx.execute("DELETE FROM tether_version", [])?;
    tx.execute("INSERT INTO tether_version (version) VALUES (?1)", [version])?;
    Ok(())
}
