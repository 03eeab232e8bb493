use crate::hash::HashConfig;
use tracing::info;

/// Whether persisted state can be reused for the requested configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// No record, or a record for another configuration. Both structures
    /// start empty.
    Fresh,
    /// The stored record matches; both structures load from storage.
    Continued,
}

impl RunMode {
    pub fn is_fresh(self) -> bool {
        matches!(self, RunMode::Fresh)
    }
}

/// Decides the run mode by comparing the stored configuration record with
/// `config`. Nothing is written: the caller stores the new record only once
/// a fresh start has reset both structures.
pub fn reconcile(stored: Option<&str>, config: &HashConfig) -> RunMode {
    let requested = config.record_line();

    match stored {
        Some(stored) if stored.trim() == requested => {
            info!(record = %requested, "Configuration unchanged, reusing persisted state");
            RunMode::Continued
        }
        stored => {
            info!(
                record = %requested,
                previous = ?stored,
                "Configuration changed or missing, starting fresh"
            );
            RunMode::Fresh
        }
    }
}
