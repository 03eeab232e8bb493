//! URL blacklist backed by a persistent Bloom filter and an exact-match store.
//!
//! HowTo:
//!    * Hash Indexer: the configuration is an array size plus repeat counts
//!      `r_1..r_k`. Function `i` digests the URL, then re-digests the decimal
//!      text of the previous digest `r_i - 1` more times, and takes the result
//!      modulo the array size.
//!    * Membership Filter: a bit array that only ever gains ones. A URL is
//!      "possibly present" when all of its positions are set.
//!    * Blacklist: the exact set of URLs, consulted only when the filter hits.
//!
//! Commands:
//!     * ADD (`POST`): set the URL's bits, insert the URL. -> `201 Created`
//!     * CONTAIN (`GET`): filter check, then exact check on a filter hit.
//!       -> `200 Ok` followed by `false`, `true false` or `true true`
//!     * DELETE: remove the URL from the blacklist only. -> `204 No Content`
//!       or `404 Not Found`
//!
//! Persistence:
//!     * Both structures write through on every mutation.
//!     * A configuration record (array size + repeat counts) decides whether
//!       a start reuses persisted state or starts fresh.
//!
//! Obvious problems:
//!     * Deleted URLs keep their bits, so the filter keeps saying "possibly
//!       present" for them and the exact store has to answer.
//!     * The file backend appends a line for every ADD, repeated ADDs of the
//!       same URL grow the blacklist file.

#[cfg(feature = "server")]
pub mod api;
mod blacklist;
mod command;
mod config;
mod engine;
mod error;
mod filter;
mod hash;
#[cfg(feature = "redb")]
mod redb_storage;
#[cfg(feature = "server")]
pub mod server;
mod storage;
#[cfg(feature = "server")]
pub mod types;
pub mod url;

pub use blacklist::Blacklist;
pub use command::{Operation, Request, Response};
pub use config::{RunMode, reconcile};
pub use engine::{BlacklistEngine, EngineStats};
pub use error::{BlacklistError, Result};
pub use filter::MembershipFilter;
pub use hash::{
    HashConfig, HashConfigBuilder, HashConfigBuilderError, HashFunction,
    chained_digest, compute_bit_positions, default_hash_function,
};
#[cfg(feature = "redb")]
pub use redb_storage::RedbStorage;
pub use storage::{
    BLACKLIST_FILE, BLOOM_FILE, BitArray, BitStorage, BlacklistFile, BloomFile,
    FileStorage, InMemoryStorage, PARAMS_FILE, StorageBackend, UrlStorage,
    bits_to_line, parse_bit_line,
};
#[cfg(feature = "server")]
pub use types::{
    AppState, ServerConfig, ServerConfigBuilder, ServerConfigBuilderError,
    StorageKind,
};
