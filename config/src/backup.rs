//! Backup-before-write (spec §4.7): copy the current file before an admin
//! write succeeds, retaining at most `max_backups` newest-first.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::ConfigError;

pub const DEFAULT_MAX_BACKUPS: usize = 50;

pub fn backup_before_write(config_path: &Path, backup_dir: &Path, max_backups: usize) -> Result<PathBuf, ConfigError> {
    fs::create_dir_all(backup_dir)?;
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let dest = backup_dir.join(format!("config.yaml.backup.{stamp}.yaml"));
    fs::copy(config_path, &dest)?;
    prune_backups(backup_dir, max_backups)?;
    Ok(dest)
}

fn prune_backups(backup_dir: &Path, max_backups: usize) -> Result<(), ConfigError> {
    let mut entries: Vec<_> = fs::read_dir(backup_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("config.yaml.backup."))
        .collect();
    entries.sort_by_key(|e| std::cmp::Reverse(e.file_name()));
    for stale in entries.into_iter().skip(max_backups) {
        let _ = fs::remove_file(stale.path());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prunes_down_to_max_backups() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, "app: {}").unwrap();
        let backup_dir = dir.path().join("config_backups");

        for i in 0..5 {
            let stamp = format!("2020010100000{i}");
            fs::create_dir_all(&backup_dir).unwrap();
            fs::write(backup_dir.join(format!("config.yaml.backup.{stamp}.yaml")), "x").unwrap();
        }
        prune_backups(&backup_dir, 3).unwrap();
        let remaining = fs::read_dir(&backup_dir).unwrap().count();
        assert_eq!(remaining, 3);
    }

    #[test]
    fn backup_before_write_copies_current_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, "app: {}").unwrap();
        let backup_dir = dir.path().join("config_backups");
        let dest = backup_before_write(&config_path, &backup_dir, DEFAULT_MAX_BACKUPS).unwrap();
        assert!(dest.exists());
    }
}
