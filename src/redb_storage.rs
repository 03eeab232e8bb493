use crate::error::{BlacklistError, Result};
use crate::storage::{
    BitArray, BitStorage, StorageBackend, UrlStorage, bits_to_line, merge_bits,
    parse_bit_line,
};
use redb::{Database, ReadableTable, TableDefinition};
use std::{path::Path, sync::Arc};
use tracing::debug;

// Define table schemas for ReDB
const CONFIG_TABLE: TableDefinition<&str, &str> = TableDefinition::new("config");
const BITS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("bits");
const URLS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("urls");

const RECORD_KEY: &str = "hash_config";
const BITS_KEY: &str = "bit_array";

/// Single-file redb backend. The bit array is kept in the same `'0'`/`'1'`
/// text form as the file backend; URLs are table keys, so adding the same
/// URL twice bumps a counter instead of growing the store.
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Creates the database file, or opens it when it already exists.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db =
            Database::create(db_path.as_ref()).map_err(redb::Error::from)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Number of times `url` was added since it was last removed.
    pub fn occurrences(&self, url: &str) -> Result<u64> {
        let read_txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = match read_txn.open_table(URLS_TABLE) {
            Ok(table) => table,
            Err(_) => return Ok(0),
        };
        Ok(table
            .get(url)
            .map_err(redb::Error::from)?
            .map(|count| count.value())
            .unwrap_or(0))
    }
}

impl StorageBackend for RedbStorage {
    type Bits = RedbStorage;
    type Urls = RedbStorage;

    fn load_record(&self) -> Result<Option<String>> {
        let read_txn = self.db.begin_read().map_err(redb::Error::from)?;

        // Try to open config table, return None if it doesn't exist
        let config_table = match read_txn.open_table(CONFIG_TABLE) {
            Ok(table) => table,
            Err(_) => return Ok(None),
        };

        Ok(config_table
            .get(RECORD_KEY)
            .map_err(redb::Error::from)?
            .map(|record| record.value().to_string()))
    }

    fn store_record(&mut self, record: &str) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut config_table = write_txn
                .open_table(CONFIG_TABLE)
                .map_err(redb::Error::from)?;
            config_table
                .insert(RECORD_KEY, record)
                .map_err(redb::Error::from)?;
        }
        write_txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }

    fn parts(&self) -> (Self::Bits, Self::Urls) {
        (self.clone(), self.clone())
    }
}

impl BitStorage for RedbStorage {
    fn reset_bits(&mut self, size: usize) -> Result<()> {
        let zeros = "0".repeat(size);
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut bits_table = write_txn
                .open_table(BITS_TABLE)
                .map_err(redb::Error::from)?;
            bits_table
                .insert(BITS_KEY, zeros.as_bytes())
                .map_err(redb::Error::from)?;
        }
        write_txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }

    fn load_bits(&self) -> Result<Option<BitArray>> {
        let read_txn = self.db.begin_read().map_err(redb::Error::from)?;
        let bits_table = match read_txn.open_table(BITS_TABLE) {
            Ok(table) => table,
            Err(_) => return Ok(None),
        };

        match bits_table.get(BITS_KEY).map_err(redb::Error::from)? {
            Some(bytes) => {
                let line = std::str::from_utf8(bytes.value()).map_err(|e| {
                    BlacklistError::MalformedState(format!(
                        "bit array is not text: {e}"
                    ))
                })?;
                parse_bit_line(line).map(Some)
            }
            None => Ok(None),
        }
    }

    fn store_bits(&mut self, bits: &BitArray) -> Result<()> {
        let mut merged = bits.clone();
        if let Some(stored) = self.load_bits()? {
            merge_bits(&mut merged, &stored);
        }
        let line = bits_to_line(&merged);

        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut bits_table = write_txn
                .open_table(BITS_TABLE)
                .map_err(redb::Error::from)?;
            bits_table
                .insert(BITS_KEY, line.as_bytes())
                .map_err(redb::Error::from)?;
        }
        write_txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }
}

impl UrlStorage for RedbStorage {
    fn reset_urls(&mut self) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        write_txn
            .delete_table(URLS_TABLE)
            .map_err(redb::Error::from)?;
        write_txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }

    fn load_urls(&self) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read().map_err(redb::Error::from)?;
        let urls_table = match read_txn.open_table(URLS_TABLE) {
            Ok(table) => table,
            Err(_) => return Ok(Vec::new()),
        };

        let mut urls = Vec::new();
        for entry in urls_table.iter().map_err(redb::Error::from)? {
            let (url, _count) = entry.map_err(redb::Error::from)?;
            urls.push(url.value().to_string());
        }
        Ok(urls)
    }

    fn append_url(&mut self, url: &str) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut urls_table = write_txn
                .open_table(URLS_TABLE)
                .map_err(redb::Error::from)?;
            let count = urls_table
                .get(url)
                .map_err(redb::Error::from)?
                .map(|count| count.value())
                .unwrap_or(0);
            urls_table
                .insert(url, count + 1)
                .map_err(redb::Error::from)?;
        }
        write_txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }

    fn remove_url(&mut self, url: &str) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut urls_table = write_txn
                .open_table(URLS_TABLE)
                .map_err(redb::Error::from)?;
            let removed = urls_table
                .remove(url)
                .map_err(redb::Error::from)?
                .map(|count| count.value())
                .unwrap_or(0);
            debug!(url, removed, "Removed url from redb");
        }
        write_txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }
}
