// ABOUTME: Per-release operation lock to prevent concurrent operations on the same name.
// ABOUTME: Tracks holder info, the in-flight machine state and a cancel signal.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use super::machine::State;
use crate::types::ReleaseName;

/// The kind of operation holding a release lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Install,
    Upgrade,
    Rollback,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Install => "install",
            Operation::Upgrade => "upgrade",
            Operation::Rollback => "rollback",
            Operation::Delete => "delete",
        })
    }
}

/// Information about who holds a release lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockHolderInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    pub operation: Operation,
}

impl LockHolderInfo {
    fn new(operation: Operation) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            operation,
        }
    }
}

impl fmt::Display for LockHolderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} by {} (pid {}) since {}",
            self.operation, self.holder, self.pid, self.started_at
        )
    }
}

/// Snapshot of an operation in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub info: LockHolderInfo,
    pub state: State,
}

struct Entry {
    info: LockHolderInfo,
    state: State,
    cancel: watch::Sender<bool>,
}

type Entries = Arc<Mutex<HashMap<ReleaseName, Entry>>>;

/// Registry of release names with an operation in flight.
#[derive(Clone, Default)]
pub struct ReleaseLocks {
    entries: Entries,
}

impl ReleaseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `name`, or report who holds it.
    pub fn acquire(
        &self,
        name: &ReleaseName,
        operation: Operation,
    ) -> Result<ReleaseLock, LockHolderInfo> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(name) {
            return Err(existing.info.clone());
        }

        let (cancel, cancel_rx) = watch::channel(false);
        entries.insert(
            name.clone(),
            Entry {
                info: LockHolderInfo::new(operation),
                state: State::Initial,
                cancel,
            },
        );
        tracing::debug!(release = %name, %operation, "acquired release lock");

        Ok(ReleaseLock {
            entries: Arc::clone(&self.entries),
            name: name.clone(),
            cancel: cancel_rx,
        })
    }

    pub fn is_held(&self, name: &ReleaseName) -> bool {
        self.entries.lock().contains_key(name)
    }

    pub fn in_flight(&self, name: &ReleaseName) -> Option<InFlight> {
        self.entries.lock().get(name).map(|entry| InFlight {
            info: entry.info.clone(),
            state: entry.state,
        })
    }

    /// Signal cancellation if the operation on `name` is in `expected`.
    ///
    /// Returns whether a signal was sent.
    pub fn request_cancel(&self, name: &ReleaseName, expected: State) -> bool {
        let entries = self.entries.lock();
        match entries.get(name) {
            Some(entry) if entry.state == expected => entry.cancel.send(true).is_ok(),
            _ => false,
        }
    }
}

/// A held release lock that releases on drop.
pub struct ReleaseLock {
    entries: Entries,
    name: ReleaseName,
    cancel: watch::Receiver<bool>,
}

impl fmt::Debug for ReleaseLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseLock")
            .field("name", &self.name)
            .finish()
    }
}

impl ReleaseLock {
    pub fn name(&self) -> &ReleaseName {
        &self.name
    }

    /// Record the machine state so cancel requests can check it.
    pub fn set_state(&self, state: State) {
        if let Some(entry) = self.entries.lock().get_mut(&self.name) {
            entry.state = state;
        }
    }

    pub fn cancel_signal(&mut self) -> &mut watch::Receiver<bool> {
        &mut self.cancel
    }

    /// Whether a cancel was ever accepted for this operation.
    pub fn cancel_requested(&self) -> bool {
        *self.cancel.borrow()
    }
}

impl Drop for ReleaseLock {
    fn drop(&mut self) {
        self.entries.lock().remove(&self.name);
        tracing::debug!(release = %self.name, "released release lock");
    }
}
