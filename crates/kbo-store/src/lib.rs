//! The embedded relational store: connection setup, schema management, and
//! the bulk insert / incremental delete primitives shared by every pipeline
//! step (C6).

pub mod schema;

use rusqlite::hooks::Action;
use rusqlite::Connection;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database is not empty; full import requires an empty store")]
    NotEmpty,
    #[error("no captured CREATE statement for table {0}")]
    SchemaMismatch(String),
}

/// Owns the single writer connection to the embedded database for the
/// lifetime of a pipeline run. Readers (the lookup/search planners) open
/// their own read-only connections.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if absent) the database file at `path` and applies
    /// the pragmas that hold for the lifetime of the connection: WAL
    /// journaling, NORMAL synchronous mode, an in-memory temp store, and a
    /// large negative (KiB-denominated) cache size.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -200_000i64)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory store; used by tests and `rebuild_cache` dry runs.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Creates every base table (§3.2) that does not already exist, along
    /// with its indexes. Safe to call on a fresh or a pre-populated store.
    pub fn init_schema(&self) -> Result<(), Error> {
        for table in schema::ALL_TABLES {
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {};",
                strip_create(table.create_ddl, table.name)
            ))?;
            for index in table.index_ddl {
                self.conn.execute_batch(&with_if_not_exists(index))?;
            }
        }
        Ok(())
    }

    /// Returns true iff every base table is empty (the full-import invariant).
    pub fn is_empty(&self) -> Result<bool, Error> {
        for table in schema::ALL_TABLES {
            let count: i64 = self.conn.query_row(
                &format!("SELECT count(*) FROM {}", table.name),
                [],
                |row| row.get(0),
            )?;
            if count > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Full-mode reset of a single table: drop it and re-execute its
    /// captured `CREATE` DDL, then its indexes. Used at the start of each
    /// full-import step so a step failure can't leave a half-dropped table
    /// (the drop+recreate happens inside the step's own transaction).
    pub fn reset_table(&self, table: &schema::TableDef) -> Result<(), Error> {
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {}", table.name))?;
        self.conn.execute_batch(table.create_ddl)?;
        for index in table.index_ddl {
            self.conn.execute_batch(index)?;
        }
        Ok(())
    }

    /// Loads `keys` into a fresh temp table and deletes matching rows from
    /// `table` by `key_column`, for the incremental delete-before-insert path.
    pub fn delete_by_keys(
        &self,
        table: &str,
        key_column: &str,
        keys: impl Iterator<Item = String>,
    ) -> Result<usize, Error> {
        self.conn
            .execute_batch("CREATE TEMP TABLE IF NOT EXISTS _delete_keys (key TEXT)")?;
        self.conn.execute_batch("DELETE FROM _delete_keys")?;
        {
            let mut stmt = self
                .conn
                .prepare("INSERT INTO _delete_keys (key) VALUES (?1)")?;
            for key in keys {
                stmt.execute([key])?;
            }
        }
        let affected = self.conn.execute(
            &format!(
                "DELETE FROM {table} WHERE {key_column} IN (SELECT key FROM _delete_keys)"
            ),
            [],
        )?;
        self.conn.execute_batch("DROP TABLE _delete_keys")?;
        Ok(affected)
    }
}

/// Inserted/updated/deleted row counters, derived from the store's
/// `update_hook` rather than tallied by hand at each call site (C7's
/// preferred source of truth when the engine can get it).
#[derive(Debug, Default, Clone, Copy)]
pub struct RowChangeCounts {
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
}

/// A handle installed for the duration of one pipeline step. Dropping it
/// (or calling `finish`) uninstalls the hook and returns the tallied counts.
pub struct ChangeTracker<'a> {
    conn: &'a Connection,
    counts: Rc<RefCell<RowChangeCounts>>,
}

impl<'a> ChangeTracker<'a> {
    pub fn finish(self) -> RowChangeCounts {
        self.conn.update_hook(None::<fn(Action, &str, &str, i64)>);
        *self.counts.borrow()
    }
}

impl Store {
    /// Installs a row-change hook for the scope of a step; see
    /// `ChangeTracker::finish`.
    pub fn track_changes(&self) -> ChangeTracker<'_> {
        let counts = Rc::new(RefCell::new(RowChangeCounts::default()));
        let counts_for_hook = counts.clone();
        self.conn.update_hook(Some(move |action: Action, _db: &str, _table: &str, _rowid: i64| {
            let mut counts = counts_for_hook.borrow_mut();
            match action {
                Action::SQLITE_INSERT => counts.inserted += 1,
                Action::SQLITE_UPDATE => counts.updated += 1,
                Action::SQLITE_DELETE => counts.deleted += 1,
                _ => {}
            }
        }));
        ChangeTracker { conn: &self.conn, counts }
    }
}

/// `execute_batch` doesn't need `IF NOT EXISTS` rewriting for CREATE TABLE
/// since schema.rs DDL is already a plain `CREATE TABLE name (...)`; this
/// just inserts the `IF NOT EXISTS` qualifier once.
fn strip_create(ddl: &str, name: &str) -> String {
    let prefix = format!("CREATE TABLE {name} ");
    if let Some(rest) = ddl.strip_prefix(&prefix) {
        format!("{name} {rest}")
    } else {
        ddl.to_string()
    }
}

/// Rewrites `CREATE [UNIQUE] INDEX name ...` into its `IF NOT EXISTS` form.
fn with_if_not_exists(index_ddl: &str) -> String {
    if let Some(rest) = index_ddl.strip_prefix("CREATE UNIQUE INDEX ") {
        format!("CREATE UNIQUE INDEX IF NOT EXISTS {rest}")
    } else if let Some(rest) = index_ddl.strip_prefix("CREATE INDEX ") {
        format!("CREATE INDEX IF NOT EXISTS {rest}")
    } else {
        index_ddl.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_is_empty() {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn non_empty_store_detected() {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO code (category, code_value) VALUES (?1, ?2)",
                rusqlite::params!["Language", "NL"],
            )
            .unwrap();
        assert!(!store.is_empty().unwrap());
    }

    #[test]
    fn change_tracker_counts_inserts() {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        let tracker = store.track_changes();
        store
            .connection()
            .execute(
                "INSERT INTO code (category, code_value) VALUES ('Language','NL')",
                [],
            )
            .unwrap();
        let counts = tracker.finish();
        assert_eq!(counts.inserted, 1);
        assert_eq!(counts.deleted, 0);
    }

    #[test]
    fn delete_by_keys_removes_matching_rows() {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        let conn = store.connection();
        conn.execute(
            "INSERT INTO code (category, code_value) VALUES ('Language','NL')",
            [],
        )
        .unwrap();
        let code_id: i64 = conn.query_row("SELECT id FROM code", [], |r| r.get(0)).unwrap();
        conn.execute(
            "INSERT INTO enterprise (enterprise_number, juridical_situation_id, type_of_enterprise_id, start_date) VALUES ('1',?1,?1,'2020-01-01')",
            rusqlite::params![code_id],
        ).unwrap();
        conn.execute(
            "INSERT INTO enterprise (enterprise_number, juridical_situation_id, type_of_enterprise_id, start_date) VALUES ('2',?1,?1,'2020-01-01')",
            rusqlite::params![code_id],
        ).unwrap();
        let affected = store
            .delete_by_keys("enterprise", "enterprise_number", vec!["1".to_string()].into_iter())
            .unwrap();
        assert_eq!(affected, 1);
        let count: i64 = conn.query_row("SELECT count(*) FROM enterprise", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
