//! Persistent run numbering.
//!
//! Every artifact of a run is tagged with the run number, so the counter is
//! written back before any conversion work starts. Storage sits behind
//! [`CounterStore`] so tests can swap in an in-memory store.
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::PathBuf;

/// Persistence for the last-used run number.
pub trait CounterStore {
    /// Return the persisted value, `None` when nothing has been stored yet.
    ///
    /// Corrupt content is reported as an error.
    fn load(&self) -> Result<Option<u64>>;

    fn store(&self, value: u64) -> Result<()>;
}

/// Single-integer counter file at the project root.
///
/// There is no locking: one writer per process invocation is assumed.
#[derive(Debug, Clone)]
pub struct FileCounterStore {
    path: PathBuf,
}

impl FileCounterStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CounterStore for FileCounterStore {
    fn load(&self) -> Result<Option<u64>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let trimmed = text.trim();
        let value = trimmed.parse::<u64>().map_err(|err| {
            anyhow!(
                "invalid counter content {:?} in {}: {err}",
                trimmed,
                self.path.display()
            )
        })?;
        Ok(Some(value))
    }

    fn store(&self, value: u64) -> Result<()> {
        fs::write(&self.path, value.to_string())
            .with_context(|| format!("write {}", self.path.display()))
    }
}

/// Hands out run numbers backed by a [`CounterStore`].
pub struct RunCounter<S> {
    store: S,
}

impl<S: CounterStore> RunCounter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Return the next run number and persist it.
    ///
    /// Missing or corrupt state starts over at 1. A failed write still
    /// returns the computed number.
    pub fn next(&self) -> u64 {
        let run_number = match self.store.load() {
            Ok(Some(previous)) => previous.saturating_add(1),
            Ok(None) => {
                tracing::info!("no run counter found, starting at 1");
                1
            }
            Err(err) => {
                tracing::warn!(error = %err, "run counter unreadable, resetting to 1");
                1
            }
        };

        match self.store.store(run_number) {
            Ok(()) => tracing::info!(run = run_number, "run counter updated"),
            Err(err) => tracing::warn!(
                run = run_number,
                error = %err,
                "could not persist run counter, proceeding anyway"
            ),
        }
        run_number
    }
}
