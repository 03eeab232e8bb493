use crate::blacklist::Blacklist;
use crate::command::{Operation, Request, Response};
use crate::config::{RunMode, reconcile};
use crate::error::{BlacklistError, Result};
use crate::filter::MembershipFilter;
use crate::hash::HashConfig;
use crate::storage::{BitStorage, StorageBackend, UrlStorage};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

type DynBits = Box<dyn BitStorage + Send>;
type DynUrls = Box<dyn UrlStorage + Send>;

struct EngineState {
    filter: MembershipFilter<DynBits>,
    blacklist: Blacklist<DynUrls>,
}

/// Snapshot of the engine's structures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineStats {
    pub array_size: usize,
    pub hash_functions: usize,
    pub bits_set: usize,
    pub blacklisted: usize,
}

/// Owned context composing the hash indexer, the membership filter and the
/// blacklist behind one lock.
///
/// Every request, reads included, runs start to finish under the same
/// exclusive lock, durable writes among them.
pub struct BlacklistEngine {
    config: HashConfig,
    run_mode: RunMode,
    previous_record: Option<String>,
    state: Mutex<EngineState>,
}

impl BlacklistEngine {
    /// Decides the run mode from the stored configuration record, then
    /// initializes both structures empty (fresh run) or from storage
    /// (continued run).
    ///
    /// On a fresh run the new record is stored last, after both structures
    /// were reset, so a failed start never leaves a record that names the
    /// new configuration next to data written under the old one.
    pub fn open<S>(config: HashConfig, mut storage: S) -> Result<Self>
    where
        S: StorageBackend,
        S::Bits: Send + 'static,
        S::Urls: Send + 'static,
    {
        let previous_record = storage.load_record()?;
        let run_mode = reconcile(previous_record.as_deref(), &config);
        let fresh = run_mode.is_fresh();
        let (bits, urls) = storage.parts();

        let filter = MembershipFilter::initialize(
            Box::new(bits) as DynBits,
            config.array_size,
            fresh,
        )?;
        let blacklist = Blacklist::initialize(Box::new(urls) as DynUrls, fresh)?;

        if fresh {
            storage.store_record(&config.record_line())?;
        }

        Ok(Self {
            config,
            run_mode,
            previous_record,
            state: Mutex::new(EngineState { filter, blacklist }),
        })
    }

    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// The configuration record found in storage at open, `None` on a
    /// first run.
    pub fn previous_record(&self) -> Option<&str> {
        self.previous_record.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState>> {
        self.state.lock().map_err(|_| {
            BlacklistError::StorageError("engine state lock poisoned".into())
        })
    }

    /// Runs one request to completion under the engine lock.
    ///
    /// Storage failures abort only this request; in-memory state keeps
    /// whatever was applied before the failing write.
    pub fn execute(&self, request: &Request) -> Result<Response> {
        let mut state = self.lock()?;
        let url = request.url.as_str();

        let response = match request.operation {
            Operation::Add => {
                let positions = self.config.bit_positions(url);
                state.filter.add(&positions)?;
                state.blacklist.add(url)?;
                Response::Created
            }
            Operation::Contain => {
                let positions = self.config.bit_positions(url);
                let filter_hit = state.filter.contains(&positions);
                // A filter miss is authoritative, skip the exact lookup.
                let exact_hit = filter_hit && state.blacklist.contains(url);
                Response::Contains {
                    filter_hit,
                    exact_hit,
                }
            }
            Operation::Delete => {
                // Filter bits stay set, they may be shared with other URLs.
                if state.blacklist.contains(url) {
                    state.blacklist.delete(url)?;
                    Response::NoContent
                } else {
                    Response::NotFound
                }
            }
        };

        debug!(operation = %request.operation, url, response = ?response, "Executed request");
        Ok(response)
    }

    /// Parses and executes one protocol line, rendering the result.
    ///
    /// Unparsable lines become `400 Bad Request` without touching state,
    /// storage failures become `500 Internal Server Error`.
    pub fn handle_line(&self, line: &str) -> String {
        self.respond(line).to_string()
    }

    /// Like [`handle_line`](Self::handle_line) but returns the structured
    /// response.
    pub fn respond(&self, line: &str) -> Response {
        let request = match line.parse::<Request>() {
            Ok(request) => request,
            Err(e) => {
                debug!(line, error = %e, "Rejected request line");
                return Response::BadRequest;
            }
        };

        match self.execute(&request) {
            Ok(response) => response,
            Err(e) => {
                warn!(operation = %request.operation, url = %request.url, error = %e, "Request failed");
                Response::InternalError
            }
        }
    }

    pub fn stats(&self) -> Result<EngineStats> {
        let state = self.lock()?;
        Ok(EngineStats {
            array_size: state.filter.array_size(),
            hash_functions: self.config.repeats.len(),
            bits_set: state.filter.count_ones(),
            blacklisted: state.blacklist.len(),
        })
    }

    /// Blacklisted URLs in lexical order.
    pub fn blacklisted(&self) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state.blacklist.iter().map(str::to_string).collect())
    }

    /// The bit array in its durable text form.
    pub fn bits(&self) -> Result<String> {
        Ok(self.lock()?.filter.bits_as_string())
    }
}

impl std::fmt::Debug for BlacklistEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BlacklistEngine {{ array_size: {}, repeats: {:?}, run_mode: {:?} }}",
            self.config.array_size, self.config.repeats, self.run_mode
        )
    }
}
