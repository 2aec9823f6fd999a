//! SQLite-backed document store

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use tracing::{debug, info};

use crate::record::{Filter, Record};

/// Database file created inside the store directory
pub const DB_FILE_NAME: &str = "petitionstore.db";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE TABLE IF NOT EXISTS record_indexes (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    field TEXT NOT NULL,
    value_str TEXT,
    value_int INTEGER,
    value_bool INTEGER,
    PRIMARY KEY (collection, id, field)
);

CREATE INDEX IF NOT EXISTS idx_record_indexes_field
    ON record_indexes (collection, field, value_str, value_int);
"#;

/// Document store over a single SQLite database
///
/// The store is synchronous; async callers should own it from a single task
/// (see the StateManager actor in the main crate).
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the store in `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        debug!(dir = %dir.display(), "Store::open: called");
        std::fs::create_dir_all(dir).context(format!("Failed to create store directory {}", dir.display()))?;

        let path = dir.join(DB_FILE_NAME);
        let conn = Connection::open(&path).context(format!("Failed to open database {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;

        info!(path = %path.display(), "Opened petition store");
        Ok(Self { conn, path: Some(path) })
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        debug!("Store::open_in_memory: called");
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        Ok(Self { conn, path: None })
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// SQLite `data_version`: changes whenever another connection commits
    ///
    /// Writes made through this store never change it, so callers can spot
    /// other writers (e.g. another process) by polling.
    pub fn data_version(&self) -> Result<i64> {
        let version = self.conn.query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Insert a new record. Fails if a record with the same id exists.
    pub fn create<T: Record>(&mut self, record: T) -> Result<String> {
        let collection = T::collection_name();
        let id = record.id().to_string();
        debug!(%collection, %id, "Store::create: called");

        let data = serde_json::to_string(&record)?;
        let tx = self.conn.transaction()?;
        insert_record(&tx, collection, &id, &data, &record)?;
        tx.commit()?;

        Ok(id)
    }

    /// Insert a new record unless another record of the collection already
    /// holds the same value in the indexed `field`; `None` in that case.
    ///
    /// The check and the insert run in one immediate transaction, so two
    /// writers (on this or another connection) cannot both win.
    pub fn create_unique<T: Record>(&mut self, record: T, field: &str) -> Result<Option<String>> {
        let collection = T::collection_name();
        let id = record.id().to_string();
        debug!(%collection, %id, %field, "Store::create_unique: called");

        let value = record
            .indexed_fields()
            .remove(field)
            .ok_or_else(|| eyre!("{} is not an indexed field of {}", field, collection))?;
        let data = serde_json::to_string(&record)?;
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sql = format!(
            "SELECT 1 FROM record_indexes WHERE collection = ?1 AND field = ?2 AND {} = ?3 LIMIT 1",
            value.column()
        );
        let taken: Option<i64> = tx
            .query_row(&sql, params![collection, field, value.to_sql_value()], |row| row.get(0))
            .optional()?;
        if taken.is_some() {
            debug!(%collection, %field, "Store::create_unique: value already taken");
            return Ok(None);
        }

        insert_record(&tx, collection, &id, &data, &record)?;
        tx.commit()?;
        Ok(Some(id))
    }

    /// Insert or replace a record
    pub fn put<T: Record>(&mut self, record: T) -> Result<()> {
        let collection = T::collection_name();
        let id = record.id().to_string();
        debug!(%collection, %id, "Store::put: called");

        let data = serde_json::to_string(&record)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![collection, id, data, record.updated_at()],
        )?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        write_indexes(&tx, collection, &id, &record)?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch a record by id
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
        let collection = T::collection_name();
        debug!(%collection, %id, "Store::get: called");

        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context(format!("Corrupt record {}/{}", collection, id))?,
            )),
            None => Ok(None),
        }
    }

    /// List records matching all filters, in id order
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>> {
        let collection = T::collection_name();
        debug!(%collection, filter_count = filters.len(), "Store::list: called");

        let mut sql = String::from("SELECT r.data FROM records r WHERE r.collection = ?1");
        let mut values = vec![rusqlite::types::Value::Text(collection.to_string())];

        for filter in filters {
            values.push(rusqlite::types::Value::Text(filter.field.clone()));
            let field_param = values.len();
            values.push(filter.value.to_sql_value());
            let value_param = values.len();
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM record_indexes i WHERE i.collection = r.collection AND i.id = r.id \
                 AND i.field = ?{} AND i.{} {} ?{})",
                field_param,
                filter.value.column(),
                filter.op.as_sql(),
                value_param
            ));
        }
        sql.push_str(" ORDER BY r.id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            let json = row?;
            records.push(serde_json::from_str(&json).context(format!("Corrupt record in {}", collection))?);
        }
        debug!(%collection, count = records.len(), "Store::list: done");
        Ok(records)
    }

    /// Delete a record. Returns whether anything was removed.
    pub fn delete<T: Record>(&mut self, id: &str) -> Result<bool> {
        let collection = T::collection_name();
        debug!(%collection, %id, "Store::delete: called");

        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Rebuild the index rows of every record in a collection
    pub fn rebuild_indexes<T: Record>(&mut self) -> Result<usize> {
        let collection = T::collection_name();
        debug!(%collection, "Store::rebuild_indexes: called");

        let records: Vec<T> = self.list(&[])?;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM record_indexes WHERE collection = ?1", params![collection])?;
        for record in &records {
            write_indexes(&tx, collection, record.id(), record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }
}

fn insert_record<T: Record>(conn: &Connection, collection: &str, id: &str, data: &str, record: &T) -> Result<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_some() {
        return Err(eyre!("Record already exists: {}/{}", collection, id));
    }

    conn.execute(
        "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![collection, id, data, record.updated_at()],
    )?;
    write_indexes(conn, collection, id, record)
}

fn write_indexes<T: Record>(conn: &Connection, collection: &str, id: &str, record: &T) -> Result<()> {
    for (field, value) in record.indexed_fields() {
        let sql = format!(
            "INSERT INTO record_indexes (collection, id, field, {}) VALUES (?1, ?2, ?3, ?4)",
            value.column()
        );
        conn.execute(&sql, params![collection, id, field, value.to_sql_value()])?;
    }
    Ok(())
}
