//! # Worker specification for supervised execution.
//!
//! Defines [`WorkerSpec`] a configuration bundle that describes one process
//! the watchdog launches and supervises (binary path, logical name,
//! heartbeat interval).
//!
//! A spec can be created:
//! - **Explicitly** with [`WorkerSpec::new`]
//! - **From config** by [`Config::from_file`](crate::Config::from_file)
//!
//! ## Rules
//! - The spec never changes across restarts: every respawn of a slot
//!   launches the same binary with the same heartbeat contract.
//! - A `None` heartbeat means "inherit the config-wide default"; resolve it
//!   with [`Config::heartbeat_for`](crate::Config::heartbeat_for).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Specification for one supervised worker process.
///
/// Bundles together:
/// - The logical name used in events and logs
/// - The binary path passed to exec
/// - An optional per-worker heartbeat interval
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use procvisor::WorkerSpec;
///
/// let spec = WorkerSpec::new("core", "/usr/libexec/pulse-worker", Some(Duration::from_secs(2)));
/// assert_eq!(spec.name(), "core");
/// assert_eq!(spec.heartbeat(), Some(Duration::from_secs(2)));
///
/// // Inherit the config-wide default interval:
/// let spec2 = WorkerSpec::new("aux", "/usr/libexec/pulse-worker", None);
/// assert!(spec2.heartbeat().is_none());
///
/// // Or override it on an existing spec:
/// let spec3 = spec2.with_heartbeat(Some(Duration::from_secs(4)));
/// assert_eq!(spec3.heartbeat(), Some(Duration::from_secs(4)));
/// ```
#[derive(Clone, Debug)]
pub struct WorkerSpec {
    name: Arc<str>,
    path: PathBuf,
    heartbeat: Option<Duration>,
}

impl WorkerSpec {
    /// Creates a new worker specification.
    ///
    /// ### Parameters
    /// - `name`: logical name (unique within a config)
    /// - `path`: binary to execute
    /// - `heartbeat`: pulse interval, or `None` to inherit the default
    pub fn new(
        name: impl Into<Arc<str>>,
        path: impl Into<PathBuf>,
        heartbeat: Option<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            heartbeat,
        }
    }

    /// Returns the logical worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the worker name as a cheap shared handle (for events).
    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Returns the binary path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the per-worker heartbeat interval, if declared.
    pub fn heartbeat(&self) -> Option<Duration> {
        self.heartbeat
    }

    /// Returns a new spec with an updated heartbeat interval.
    pub fn with_heartbeat(mut self, heartbeat: Option<Duration>) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}
