//! # Global watchdog configuration.
//!
//! [`Config`] defines the supervisor's behavior: health-check cadence,
//! reap grace period, default heartbeat interval, event bus capacity,
//! log destination, and the worker set itself.
//!
//! Configuration is loaded from a JSON file ([`Config::from_file`]) or
//! assembled in code; either way [`Config::validate`] enforces the
//! structural constraints before a supervisor will accept it.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use procvisor::{Config, WorkerSpec};
//!
//! let mut cfg = Config::default();
//! cfg.check_interval = Duration::from_secs(5);
//! cfg.grace = Duration::from_secs(10);
//! cfg.workers.push(WorkerSpec::new("core", "/usr/libexec/pulse-worker", None));
//!
//! assert!(cfg.validate().is_ok());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::RuntimeError;
use crate::workers::{WorkerSpec, MAX_WORKERS};

/// Global configuration for the watchdog supervisor.
///
/// Controls check cadence, reap grace, heartbeat defaults, event bus
/// capacity, logging destination, and the supervised worker set.
#[derive(Clone, Debug)]
pub struct Config {
    /// Interval between health-check cycles.
    pub check_interval: Duration,
    /// Maximum time to wait for a terminated worker to exit before
    /// escalating to SIGKILL during the reap sequence.
    pub grace: Duration,
    /// Heartbeat interval applied to workers that do not declare their own.
    pub default_heartbeat: Duration,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
    /// Log destination; `None` writes to stderr.
    pub log_file: Option<PathBuf>,
    /// Workers to supervise, in slot order.
    pub workers: Vec<WorkerSpec>,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `check_interval = 5s`
    /// - `grace = 10s`
    /// - `default_heartbeat = 2s`
    /// - `bus_capacity = 1024`
    /// - `log_file = None` (stderr)
    /// - `workers = []` (must be populated before use)
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            grace: Duration::from_secs(10),
            default_heartbeat: Duration::from_secs(2),
            bus_capacity: 1024,
            log_file: None,
            workers: Vec::new(),
        }
    }
}

impl Config {
    /// Loads and validates configuration from a JSON file.
    ///
    /// Durations are given in whole seconds in the file; absent keys fall
    /// back to the [`Config::default`] values. Worker entries without a
    /// `heartbeat_secs` inherit `default_heartbeat_secs`.
    ///
    /// # Errors
    /// - [`RuntimeError::ConfigIo`] if the file cannot be read.
    /// - [`RuntimeError::ConfigParse`] if it is not valid JSON.
    /// - [`RuntimeError::ConfigInvalid`] if it violates [`Config::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| RuntimeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile =
            serde_json::from_str(&raw).map_err(|source| RuntimeError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        let defaults = Config::default();
        let default_heartbeat = file
            .default_heartbeat_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_heartbeat);

        let workers = file
            .workers
            .into_iter()
            .map(|w| {
                WorkerSpec::new(
                    w.name,
                    w.path,
                    w.heartbeat_secs.map(Duration::from_secs),
                )
            })
            .collect();

        let cfg = Config {
            check_interval: file
                .check_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.check_interval),
            grace: file
                .grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace),
            default_heartbeat,
            bus_capacity: file.bus_capacity.unwrap_or(defaults.bus_capacity),
            log_file: file.log_file,
            workers,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the structural constraints every supervisor relies on.
    ///
    /// # Errors
    /// Returns [`RuntimeError::ConfigInvalid`] when:
    /// - the worker set is empty or exceeds [`MAX_WORKERS`];
    /// - a worker name is empty or duplicated;
    /// - a worker path is empty;
    /// - `check_interval` or `grace` is zero;
    /// - any heartbeat is under one second — workers receive their
    ///   interval as whole seconds, so a sub-second value would truncate
    ///   to an illegal `0` on the launch command line.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.workers.is_empty() {
            return Err(invalid("workers list is empty"));
        }
        if self.workers.len() > MAX_WORKERS {
            return Err(invalid(format!(
                "{} workers configured, table capacity is {MAX_WORKERS}",
                self.workers.len()
            )));
        }
        if self.check_interval.is_zero() {
            return Err(invalid("check_interval_secs must be non-zero"));
        }
        if self.grace.is_zero() {
            return Err(invalid("grace_secs must be non-zero"));
        }
        if self.default_heartbeat < Duration::from_secs(1) {
            return Err(invalid("default_heartbeat_secs must be at least one second"));
        }
        for (i, w) in self.workers.iter().enumerate() {
            if w.name().is_empty() {
                return Err(invalid(format!("worker #{i} has an empty name")));
            }
            if w.path().as_os_str().is_empty() {
                return Err(invalid(format!("worker {:?} has an empty path", w.name())));
            }
            if let Some(hb) = w.heartbeat() {
                if hb < Duration::from_secs(1) {
                    return Err(invalid(format!(
                        "worker {:?} heartbeat_secs must be at least one second",
                        w.name()
                    )));
                }
            }
        }
        let mut names: Vec<&str> = self.workers.iter().map(|w| w.name()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.workers.len() {
            return Err(invalid("worker names must be unique"));
        }
        Ok(())
    }

    /// Effective heartbeat interval for a worker: its own, or the default.
    pub fn heartbeat_for(&self, spec: &WorkerSpec) -> Duration {
        spec.heartbeat().unwrap_or(self.default_heartbeat)
    }
}

fn invalid(reason: impl Into<String>) -> RuntimeError {
    RuntimeError::ConfigInvalid {
        reason: reason.into(),
    }
}

/// On-disk representation; all keys optional except `workers`.
#[derive(Deserialize)]
struct ConfigFile {
    check_interval_secs: Option<u64>,
    grace_secs: Option<u64>,
    default_heartbeat_secs: Option<u64>,
    bus_capacity: Option<usize>,
    log_file: Option<PathBuf>,
    workers: Vec<WorkerEntry>,
}

#[derive(Deserialize)]
struct WorkerEntry {
    name: String,
    path: PathBuf,
    heartbeat_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.check_interval, Duration::from_secs(5));
        assert_eq!(cfg.grace, Duration::from_secs(10));
        assert_eq!(cfg.default_heartbeat, Duration::from_secs(2));
        assert_eq!(cfg.bus_capacity, 1024);
        assert!(cfg.log_file.is_none());
        assert!(cfg.workers.is_empty());
    }

    #[test]
    fn test_from_file_full_document() {
        let f = write_config(
            r#"{
                "check_interval_secs": 3,
                "grace_secs": 7,
                "default_heartbeat_secs": 1,
                "bus_capacity": 256,
                "log_file": "/var/log/procvisor.log",
                "workers": [
                    {"name": "core", "path": "/usr/libexec/pulse-worker"},
                    {"name": "aux", "path": "/usr/libexec/pulse-worker", "heartbeat_secs": 4}
                ]
            }"#,
        );
        let cfg = Config::from_file(f.path()).unwrap();
        assert_eq!(cfg.check_interval, Duration::from_secs(3));
        assert_eq!(cfg.grace, Duration::from_secs(7));
        assert_eq!(cfg.bus_capacity, 256);
        assert_eq!(cfg.log_file.as_deref(), Some(Path::new("/var/log/procvisor.log")));
        assert_eq!(cfg.workers.len(), 2);
        // "core" inherits the file-level default, "aux" keeps its own.
        assert_eq!(cfg.heartbeat_for(&cfg.workers[0]), Duration::from_secs(1));
        assert_eq!(cfg.heartbeat_for(&cfg.workers[1]), Duration::from_secs(4));
    }

    #[test]
    fn test_from_file_minimal_document_uses_defaults() {
        let f = write_config(r#"{"workers": [{"name": "w", "path": "/bin/true"}]}"#);
        let cfg = Config::from_file(f.path()).unwrap();
        assert_eq!(cfg.check_interval, Duration::from_secs(5));
        assert_eq!(cfg.heartbeat_for(&cfg.workers[0]), Duration::from_secs(2));
    }

    #[test]
    fn test_from_file_missing_path_is_io_error() {
        let err = Config::from_file("/nonexistent/procvisor.json").unwrap_err();
        assert_eq!(err.as_label(), "config_io");
    }

    #[test]
    fn test_from_file_bad_json_is_parse_error() {
        let f = write_config("{not json");
        let err = Config::from_file(f.path()).unwrap_err();
        assert_eq!(err.as_label(), "config_parse");
    }

    #[test]
    fn test_validate_rejects_empty_worker_set() {
        let cfg = Config::default();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.as_label(), "config_invalid");
    }

    #[test]
    fn test_validate_rejects_overflowing_worker_set() {
        let mut cfg = Config::default();
        for i in 0..=MAX_WORKERS {
            cfg.workers
                .push(WorkerSpec::new(format!("w{i}"), "/bin/true", None));
        }
        let err = cfg.validate().unwrap_err();
        assert!(err.as_message().contains("capacity"));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut cfg = Config::default();
        cfg.workers.push(WorkerSpec::new("dup", "/bin/true", None));
        cfg.workers.push(WorkerSpec::new("dup", "/bin/false", None));
        let err = cfg.validate().unwrap_err();
        assert!(err.as_message().contains("unique"));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut cfg = Config::default();
        cfg.workers.push(WorkerSpec::new("w", "/bin/true", None));
        cfg.check_interval = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.workers
            .push(WorkerSpec::new("w", "/bin/true", Some(Duration::ZERO)));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_subsecond_heartbeats() {
        // The launch contract passes the interval in whole seconds; a
        // sub-second heartbeat would reach the worker as "0".
        let mut cfg = Config::default();
        cfg.workers.push(WorkerSpec::new(
            "w",
            "/bin/true",
            Some(Duration::from_millis(500)),
        ));
        let err = cfg.validate().unwrap_err();
        assert!(err.as_message().contains("at least one second"));

        let mut cfg = Config::default();
        cfg.workers.push(WorkerSpec::new("w", "/bin/true", None));
        cfg.default_heartbeat = Duration::from_millis(250);
        assert!(cfg.validate().is_err());
    }
}
