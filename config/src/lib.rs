//! The Config Plane (spec §4.7): structural diff over the typed config
//! tree, hot-reload sequencing, filesystem watching, and backup-before-write.
//!
//! The YAML loader/validator's field-by-field schema for exchange
//! credentials, notification transports, and the admin web surface is
//! commodity plumbing spec.md §1 treats as an external collaborator; this
//! crate's job is the diff/hot-reload/backup decision logic around it, not
//! re-specifying every leaf of that schema.

pub mod backup;
pub mod diff;
pub mod error;
pub mod schema;
pub mod watcher;

pub use backup::{backup_before_write, DEFAULT_MAX_BACKUPS};
pub use diff::{diff_configs, ChangeKind, ConfigChange};
pub use error::ConfigError;
pub use schema::{EngineConfig, TradingConfig};
pub use watcher::{reload, spawn_watcher, ReloadCallback, ReloadOutcome};
