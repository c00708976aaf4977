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

//! A bridge to forward logs from the `log` crate to a [`BatchWriter`].

use std::sync::Arc;

use crate::BatchWriter;
use crate::Level;
use crate::LogRecord;

/// A [`log::Log`] implementation writing through a [`BatchWriter`].
///
/// The record target becomes the module name. `log` records carry no function name, so the
/// function field stays empty and the context block falls back to `{file:line}` only. Records
/// below the minimum level of the writer are dropped.
#[derive(Debug, Clone)]
pub struct BatchLog {
    writer: Arc<BatchWriter>,
}

impl BatchLog {
    /// Create a bridge to `writer`.
    pub fn new(writer: Arc<BatchWriter>) -> Self {
        Self { writer }
    }
}

impl log::Log for BatchLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        level_of(metadata.level()).is_enabled_by(self.writer.level())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut entry = LogRecord::new(level_of(record.level()), record.args().to_string())
            .module(record.target());
        if let Some(file) = record.file() {
            entry = entry.file(file);
        }
        if let Some(line) = record.line() {
            entry = entry.line(line);
        }

        self.writer.enqueue(&entry);
    }

    fn flush(&self) {
        self.writer.wake();
    }
}

fn level_of(level: log::Level) -> Level {
    match level {
        log::Level::Error => Level::Error,
        log::Level::Warn => Level::Warning,
        log::Level::Info => Level::Info,
        log::Level::Debug => Level::Debug,
        log::Level::Trace => Level::Trace,
    }
}

/// Set up the log crate global logger.
///
/// This function calls [`log::set_boxed_logger`] to install a [`BatchLog`] over `writer`. The
/// global maximum log level is set to `Trace`, filtering is left to the writer.
///
/// # Errors
///
/// Return an error if the log crate global logger has already been set.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use logforth_batch::BatchWriterBuilder;
///
/// let dir = tempfile::tempdir().unwrap();
/// let writer = BatchWriterBuilder::new("app").folder(dir.path()).build().unwrap();
/// if let Err(err) = logforth_batch::bridge::try_setup_log_crate(Arc::new(writer)) {
///     eprintln!("failed to setup log crate: {err}");
/// }
/// ```
pub fn try_setup_log_crate(writer: Arc<BatchWriter>) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(BatchLog::new(writer)))?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

/// Set up the log crate global logger.
///
/// Same as [`try_setup_log_crate`], but panics if a global logger is already set.
///
/// # Panics
///
/// Panic if the log crate global logger has already been set.
pub fn setup_log_crate(writer: Arc<BatchWriter>) {
    try_setup_log_crate(writer).expect(
        "logforth_batch::bridge::setup_log_crate must be called before the log crate global logger initialized",
    )
}
