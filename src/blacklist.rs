use crate::error::Result;
use crate::storage::UrlStorage;
use crate::url::is_valid_url;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Exact-match URL set, persisted one URL per line.
///
/// Persistence is append-only, so the durable copy may repeat a URL that
/// was added more than once. Loading de-duplicates, and `delete` removes
/// every repetition.
pub struct Blacklist<S: UrlStorage> {
    storage: S,
    urls: BTreeSet<String>,
}

impl<S: UrlStorage> Blacklist<S> {
    /// Starts empty and recreates durable storage when `fresh`, otherwise
    /// loads every stored line. Lines that are not well-formed URLs are
    /// skipped.
    pub fn initialize(mut storage: S, fresh: bool) -> Result<Self> {
        let mut urls = BTreeSet::new();

        if fresh {
            storage.reset_urls()?;
        } else {
            for line in storage.load_urls()? {
                if is_valid_url(&line) {
                    urls.insert(line);
                } else {
                    warn!(line = %line, "Skipping malformed blacklist entry");
                }
            }
        }

        debug!(count = urls.len(), fresh, "Blacklist ready");
        Ok(Self { storage, urls })
    }

    /// Inserts into memory, then appends to durable storage.
    pub fn add(&mut self, url: &str) -> Result<()> {
        self.urls.insert(url.to_string());
        self.storage.append_url(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Removes every occurrence from durable storage, then from memory.
    /// Absent URLs are left alone. On a failed write the URL stays, so
    /// the delete can be retried.
    pub fn delete(&mut self, url: &str) -> Result<()> {
        if self.urls.contains(url) {
            self.storage.remove_url(url)?;
            self.urls.remove(url);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// URLs in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
