// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use crate::Error;
use crate::LogMode;
use crate::SharedLocks;
use crate::console::Console;

/// Appends batches of lines to the destination file.
#[derive(Debug)]
pub(crate) struct FileWriter {
    destination: PathBuf,
    console: Arc<dyn Console>,
    locks: SharedLocks,
}

impl FileWriter {
    pub(crate) fn new(destination: PathBuf, console: Arc<dyn Console>, locks: SharedLocks) -> Self {
        Self {
            destination,
            console,
            locks,
        }
    }

    /// Write `batch` in order, preceded by a marker line if the destination was just rotated
    /// away to `previous`.
    ///
    /// In [`LogMode::OnlyConsole`] the file is never touched. If the file cannot be opened or
    /// written, the batch is lost and an error is returned.
    pub(crate) fn write(
        &self,
        mode: LogMode,
        batch: &[String],
        previous: Option<&Path>,
    ) -> Result<(), Error> {
        if mode == LogMode::OnlyConsole {
            for line in batch {
                self.console.write_line(line);
            }
            return Ok(());
        }

        if let Some(parent) = self.destination.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                Error::new("failed to create log directory")
                    .with_context("path", parent.display())
                    .with_source(err)
            })?;
        }

        let echo = mode == LogMode::Full;
        let _guard = self.locks.lock_write();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.destination)
            .map_err(|err| {
                Error::new("failed to open log file")
                    .with_context("path", self.destination.display())
                    .with_source(err)
            })?;

        let mut writer = BufWriter::new(file);
        if let Some(previous) = previous {
            let marker = format!("Previous log {}\n", previous.display());
            writer.write_all(marker.as_bytes()).map_err(Error::from_io_error)?;
        }
        for line in batch {
            writer
                .write_all(line.as_bytes())
                .map_err(Error::from_io_error)?;
            if echo {
                self.console.write_line(line);
            }
        }
        writer.flush().map_err(Error::from_io_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::console::Capture;

    fn lines(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| format!("{line}\n")).collect()
    }

    #[test]
    fn test_append_creates_directories() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("nested").join("logs").join("app.log");
        let capture = Capture::default();
        let writer = FileWriter::new(
            destination.clone(),
            Arc::new(capture.clone()),
            SharedLocks::new(),
        );

        writer
            .write(LogMode::OnlyFile, &lines(&["one", "two"]), None)
            .unwrap();
        writer
            .write(LogMode::OnlyFile, &lines(&["three"]), None)
            .unwrap();

        assert_eq!(fs::read_to_string(destination).unwrap(), "one\ntwo\nthree\n");
        assert!(capture.lines().is_empty());
    }

    #[test]
    fn test_marker_precedes_batch() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("app.log");
        let previous = dir.path().join("app_2024_08_10.log");
        let writer = FileWriter::new(
            destination.clone(),
            Arc::new(Capture::default()),
            SharedLocks::new(),
        );

        writer
            .write(LogMode::OnlyFile, &lines(&["fresh"]), Some(&previous))
            .unwrap();

        let content = fs::read_to_string(destination).unwrap();
        assert_eq!(
            content,
            format!("Previous log {}\nfresh\n", previous.display())
        );
    }

    #[test]
    fn test_full_mode_echoes_to_console() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("app.log");
        let capture = Capture::default();
        let writer = FileWriter::new(
            destination.clone(),
            Arc::new(capture.clone()),
            SharedLocks::new(),
        );

        writer
            .write(LogMode::Full, &lines(&["a", "b"]), None)
            .unwrap();
        assert_eq!(capture.lines(), lines(&["a", "b"]));
        assert_eq!(fs::read_to_string(destination).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_console_mode_never_touches_the_file() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("logs").join("app.log");
        let capture = Capture::default();
        let writer = FileWriter::new(
            destination.clone(),
            Arc::new(capture.clone()),
            SharedLocks::new(),
        );

        writer
            .write(LogMode::OnlyConsole, &lines(&["a"]), None)
            .unwrap();
        assert_eq!(capture.lines(), lines(&["a"]));
        assert!(!destination.exists());
        assert!(!dir.path().join("logs").exists());
    }

    #[test]
    fn test_unopenable_destination_is_an_error() {
        let dir = TempDir::new().unwrap();
        // a directory cannot be opened for appending
        let destination = dir.path().join("app.log");
        fs::create_dir(&destination).unwrap();
        let writer = FileWriter::new(
            destination,
            Arc::new(Capture::default()),
            SharedLocks::new(),
        );

        let err = writer
            .write(LogMode::OnlyFile, &lines(&["lost"]), None)
            .unwrap_err();
        assert!(err.to_string().contains("failed to open log file"));
    }
}
