// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-app file sink with size-based rotation.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use sdv_core::LogLine;

/// Appends formatted lines to `<logs>/<app>.log`, rotating to `.1` at the
/// configured size. Only one rotation generation is kept.
pub(crate) struct FileSink {
    path: PathBuf,
    rotate_bytes: u64,
    file: Option<File>,
    written: u64,
}

impl FileSink {
    pub fn new(path: PathBuf, rotate_bytes: u64) -> Self {
        Self { path, rotate_bytes, file: None, written: 0 }
    }

    fn ensure_open(&mut self) -> std::io::Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            self.written = file.metadata()?.len();
            self.file = Some(file);
        }
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(std::io::Error::other("sink file vanished")),
        }
    }

    pub fn append(&mut self, line: &LogLine) -> std::io::Result<()> {
        let rotate = self.written >= self.rotate_bytes;
        if rotate {
            self.rotate()?;
        }
        let file = self.ensure_open()?;
        let formatted = format!(
            "{} [{}] {}\n",
            line.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            line.stream.as_str(),
            line.content,
        );
        file.write_all(formatted.as_bytes())?;
        self.written += formatted.len() as u64;
        Ok(())
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.file = None;
        self.written = 0;
        let rotated = rotated_path(&self.path);
        if self.path.exists() {
            std::fs::rename(&self.path, rotated)?;
        }
        Ok(())
    }
}

fn rotated_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".1");
    PathBuf::from(name)
}

/// Remove rotated sink files older than `days`. Called once at startup.
pub(crate) fn purge_rotated(logs_dir: &Path, days: u64) {
    let cutoff = std::time::SystemTime::now()
        .checked_sub(std::time::Duration::from_secs(days * 24 * 60 * 60));
    let Some(cutoff) = cutoff else { return };
    let Ok(entries) = std::fs::read_dir(logs_dir) else { return };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_rotation = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(".log.1"))
            .unwrap_or(false);
        if !is_rotation {
            continue;
        }
        let old = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|modified| modified < cutoff)
            .unwrap_or(false);
        if old {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to purge rotated log");
            }
        }
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
