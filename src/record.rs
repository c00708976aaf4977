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

//! Log records handed to a [`BatchWriter`](crate::BatchWriter).

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;

use crate::Error;

/// An enum representing the available verbosity levels of the writer.
///
/// Levels are ordered from the most verbose to the most severe, so `Level::Trace < Level::Fatal`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Designates very low priority, often extremely verbose, information.
    Trace,
    /// Designates lower priority information.
    Debug,
    /// Designates useful information.
    Info,
    /// Designates hazardous situations.
    Warning,
    /// Designates serious errors.
    Error,
    /// Designates errors the application cannot recover from.
    Fatal,
}

impl Level {
    /// Return the string representation of the `Level`.
    ///
    /// This returns the same string as the `fmt::Display` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "Trace",
            Level::Debug => "Debug",
            Level::Info => "Info",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::Fatal => "Fatal",
        }
    }

    /// Whether a record of this level passes the minimum level `min`.
    pub fn is_enabled_by(&self, min: Level) -> bool {
        *self >= min
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;
    fn from_str(s: &str) -> Result<Level, Self::Err> {
        for (name, level) in [
            ("trace", Level::Trace),
            ("debug", Level::Debug),
            ("info", Level::Info),
            ("warning", Level::Warning),
            ("warn", Level::Warning),
            ("error", Level::Error),
            ("fatal", Level::Fatal),
        ] {
            if s.eq_ignore_ascii_case(name) {
                return Ok(level);
            }
        }

        Err(Error::new(format!("malformed level: {s:?}")))
    }
}

/// A single log event, immutable once built.
///
/// # Examples
///
/// ```
/// use logforth_batch::Level;
/// use logforth_batch::LogRecord;
///
/// let record = LogRecord::new(Level::Warning, "disk low")
///     .module("storage")
///     .file("src/disk.rs")
///     .line(42);
/// assert_eq!(record.level(), Level::Warning);
/// ```
#[derive(Clone, Debug)]
pub struct LogRecord {
    timestamp: Timestamp,
    thread_id: String,
    module: String,
    level: Level,
    function: String,
    file: String,
    line: u32,
    message: String,
}

impl LogRecord {
    /// Create a record stamped with the current time and the current thread.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Timestamp::now(),
            thread_id: current_thread_id(),
            module: String::new(),
            level,
            function: String::new(),
            file: String::new(),
            line: 0,
            message: message.into(),
        }
    }

    /// Set the timestamp.
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the thread identifier.
    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    /// Set the module name.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Set the function name.
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    /// Set the source file.
    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Set the source line. `0` means unknown.
    pub fn line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    /// The time this record was created.
    pub fn time(&self) -> Timestamp {
        self.timestamp
    }

    /// The identifier of the thread that produced this record.
    pub fn thread(&self) -> &str {
        &self.thread_id
    }

    /// The module that produced this record.
    pub fn module_name(&self) -> &str {
        &self.module
    }

    /// The level of this record.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The function that produced this record, empty if unknown.
    pub fn function_name(&self) -> &str {
        &self.function
    }

    /// The source file of this record, empty if unknown.
    pub fn filename(&self) -> &str {
        &self.file
    }

    /// The source line of this record, `0` if unknown.
    pub fn line_number(&self) -> u32 {
        self.line
    }

    /// The message of this record.
    pub fn payload(&self) -> &str {
        &self.message
    }
}

/// Name of the current thread, or its id if it is unnamed.
pub(crate) fn current_thread_id() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error.is_enabled_by(Level::Warning));
        assert!(!Level::Info.is_enabled_by(Level::Warning));
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("WARNING".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("fatal".parse::<Level>().unwrap(), Level::Fatal);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_record_builder() {
        let record = LogRecord::new(Level::Info, "hello")
            .module("net")
            .function("connect")
            .file("net.rs")
            .line(7)
            .thread_id("worker-1");
        assert_eq!(record.module_name(), "net");
        assert_eq!(record.function_name(), "connect");
        assert_eq!(record.filename(), "net.rs");
        assert_eq!(record.line_number(), 7);
        assert_eq!(record.thread(), "worker-1");
        assert_eq!(record.payload(), "hello");
    }
}
