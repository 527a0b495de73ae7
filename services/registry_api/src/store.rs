use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::model::{Challenge, Document, HistoryEntry, PropertyRecord, User};

// Values are serde_json bytes unless noted.
const PROPERTIES: TableDefinition<u64, &[u8]> = TableDefinition::new("properties");
const LOCATIONS: TableDefinition<&str, u64> = TableDefinition::new("locations");
const HISTORY: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("history");
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const CHALLENGES: TableDefinition<&str, &[u8]> = TableDefinition::new("challenges");
const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");
// raw bytes keyed by content digest
const BLOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("blobs");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const HISTORY_SEQ: &str = "history_seq";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

macro_rules! storage_error_from {
    ($($t:ty),* $(,)?) => {
        $(impl From<$t> for StoreError {
            fn from(e: $t) -> Self {
                StoreError::Storage(e.to_string())
            }
        })*
    };
}

storage_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Embedded mirror database. Cheap to clone; all clones share one redb
/// handle, which serializes writers internally.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open or create the database at `path`, creating every table.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(PROPERTIES)?;
            write_txn.open_table(LOCATIONS)?;
            write_txn.open_table(HISTORY)?;
            write_txn.open_table(USERS)?;
            write_txn.open_table(CHALLENGES)?;
            write_txn.open_table(DOCUMENTS)?;
            write_txn.open_table(BLOBS)?;
            write_txn.open_table(META)?;
        }
        write_txn.commit()?;
        debug!("opened registry store at {}", path.display());

        Ok(Self { db: Arc::new(db) })
    }

    pub fn get_property(&self, token_id: u64) -> Result<Option<PropertyRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROPERTIES)?;
        match table.get(token_id)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_properties(&self) -> Result<Vec<PropertyRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROPERTIES)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    pub fn location_owner(&self, location: &str) -> Result<Option<u64>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LOCATIONS)?;
        Ok(table.get(location)?.map(|v| v.value()))
    }

    /// Insert a new property, claim its location and record its first
    /// history entry in one transaction. `check` sees whether the token id
    /// and the location are already taken and may veto the insert.
    pub fn insert_property<E, F>(
        &self,
        record: &PropertyRecord,
        entry: &HistoryEntry,
        check: F,
    ) -> Result<(), E>
    where
        E: From<StoreError>,
        F: FnOnce(Option<&PropertyRecord>, Option<u64>) -> Result<(), E>,
    {
        let write_txn = self.db.begin_write().map_err(StoreError::from)?;
        {
            let mut properties = write_txn.open_table(PROPERTIES).map_err(StoreError::from)?;
            let mut locations = write_txn.open_table(LOCATIONS).map_err(StoreError::from)?;

            let existing: Option<PropertyRecord> = match properties
                .get(record.token_id)
                .map_err(StoreError::from)?
            {
                Some(v) => Some(serde_json::from_slice(v.value()).map_err(StoreError::from)?),
                None => None,
            };
            let holder = locations
                .get(record.location.as_str())
                .map_err(StoreError::from)?
                .map(|v| v.value());
            check(existing.as_ref(), holder)?;

            let bytes = serde_json::to_vec(record).map_err(StoreError::from)?;
            properties
                .insert(record.token_id, bytes.as_slice())
                .map_err(StoreError::from)?;
            locations
                .insert(record.location.as_str(), record.token_id)
                .map_err(StoreError::from)?;
        }
        Self::push_history(&write_txn, record.token_id, entry)?;
        write_txn.commit().map_err(StoreError::from)?;
        Ok(())
    }

    /// Read-modify-write of one property. `f` returns the history entry to
    /// append, if any, or an error that aborts the transaction untouched.
    pub fn update_property<E, F>(&self, token_id: u64, f: F) -> Result<Option<PropertyRecord>, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut PropertyRecord) -> Result<Vec<HistoryEntry>, E>,
    {
        // An error from `f` drops the transaction uncommitted.
        let write_txn = self.db.begin_write().map_err(StoreError::from)?;
        let (record, entries) = {
            let mut properties = write_txn.open_table(PROPERTIES).map_err(StoreError::from)?;
            let bytes = properties
                .get(token_id)
                .map_err(StoreError::from)?
                .map(|v| v.value().to_vec());
            let Some(bytes) = bytes else {
                return Ok(None);
            };
            let mut record: PropertyRecord =
                serde_json::from_slice(&bytes).map_err(StoreError::from)?;
            let entries = f(&mut record)?;
            let bytes = serde_json::to_vec(&record).map_err(StoreError::from)?;
            properties
                .insert(token_id, bytes.as_slice())
                .map_err(StoreError::from)?;
            (record, entries)
        };
        for entry in &entries {
            Self::push_history(&write_txn, token_id, entry)?;
        }
        write_txn.commit().map_err(StoreError::from)?;
        Ok(Some(record))
    }

    fn push_history(
        write_txn: &redb::WriteTransaction,
        token_id: u64,
        entry: &HistoryEntry,
    ) -> Result<(), StoreError> {
        let mut meta = write_txn.open_table(META)?;
        let seq = meta.get(HISTORY_SEQ)?.map(|v| v.value()).unwrap_or(0) + 1;
        meta.insert(HISTORY_SEQ, seq)?;

        let mut history = write_txn.open_table(HISTORY)?;
        let bytes = serde_json::to_vec(entry)?;
        history.insert((token_id, seq), bytes.as_slice())?;
        Ok(())
    }

    /// History of one property, oldest first.
    pub fn history(&self, token_id: u64) -> Result<Vec<HistoryEntry>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HISTORY)?;
        let mut out = Vec::new();
        for entry in table.range((token_id, 0)..=(token_id, u64::MAX))? {
            let (_, v) = entry?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    pub fn get_user(&self, address: &str) -> Result<Option<User>, StoreError> {
        self.get_json(USERS, address)
    }

    pub fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.put_json(USERS, &user.wallet_address, user)
    }

    pub fn put_challenge(&self, address: &str, challenge: &Challenge) -> Result<(), StoreError> {
        self.put_json(CHALLENGES, address, challenge)
    }

    /// Remove and return the pending challenge, so each one is usable once.
    pub fn take_challenge(&self, address: &str) -> Result<Option<Challenge>, StoreError> {
        let write_txn = self.db.begin_write()?;
        let challenge = {
            let mut table = write_txn.open_table(CHALLENGES)?;
            let removed = table.remove(address)?.map(|v| v.value().to_vec());
            match removed {
                Some(bytes) => Some(serde_json::from_slice(&bytes)?),
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(challenge)
    }

    pub fn get_document(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        self.get_json(DOCUMENTS, &id.to_string())
    }

    pub fn put_document(&self, doc: &Document) -> Result<(), StoreError> {
        self.put_json(DOCUMENTS, &doc.id.to_string(), doc)
    }

    /// Drop the document record. The pinned content stays, since other
    /// records may share the same digest.
    pub fn delete_document(&self, id: Uuid) -> Result<bool, StoreError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            let key = id.to_string();
            let existed = table.remove(key.as_str())?.is_some();
            existed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    pub fn documents_for(&self, token_id: u64) -> Result<Vec<Document>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            let doc: Document = serde_json::from_slice(v.value())?;
            if doc.property_token_id == token_id {
                out.push(doc);
            }
        }
        out.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(out)
    }

    pub fn put_blob(&self, digest: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BLOBS)?;
            table.insert(digest, bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_blob(&self, digest: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BLOBS)?;
        Ok(table.get(digest)?.map(|v| v.value().to_vec()))
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        def: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(def)?;
        match table.get(key)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    fn put_json<T: serde::Serialize>(
        &self,
        def: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(def)?;
            table.insert(key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
