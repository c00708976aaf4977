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

//! A batching log writer: records are formatted on the calling threads, buffered, and appended
//! to a file in batches by a dedicated worker thread.
//!
//! # Overview
//!
//! A [`BatchWriter`] never performs I/O on the enqueueing thread. A wake signal is sent to the
//! worker at most once per debounce interval, and a watchdog pushes lines that linger while the
//! worker is idle. Before each batch the destination is renamed with a `_yyyy_MM_dd` suffix when
//! the calendar day changed, and the renamed file can be compressed by an external archiver.
//! Failures never reach the caller: they are counted in [`WriterStatus`] and reported to a
//! [`Trap`].
//!
//! # Examples
//!
//! ```
//! use logforth_batch::BatchWriterBuilder;
//! use logforth_batch::Level;
//! use logforth_batch::LogMode;
//! use logforth_batch::LogRecord;
//! use logforth_batch::layout::MessageDisplay;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let writer = BatchWriterBuilder::new("app")
//!     .folder(dir.path())
//!     .mode(LogMode::OnlyFile)
//!     .message_display(MessageDisplay::LOG_LEVEL | MessageDisplay::MESSAGE)
//!     .build()
//!     .unwrap();
//!
//! writer.log(&LogRecord::new(Level::Warning, "disk low"));
//! writer.stop();
//!
//! let content = std::fs::read_to_string(writer.destination()).unwrap();
//! assert!(content.starts_with("[Warning] disk low\n"));
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod archive;
pub mod console;
pub mod layout;
pub mod trap;

#[cfg(feature = "bridge-log")]
pub mod bridge;

mod clock;
mod error;
mod file;
mod locks;
mod record;
mod rotation;
mod status;
mod worker;
mod writer;

pub use self::error::Error;
pub use self::locks::SharedLocks;
pub use self::record::Level;
pub use self::record::LogRecord;
pub use self::rotation::FileSuffix;
pub use self::status::WriterStatus;
pub use self::trap::Trap;
pub use self::writer::BatchWriter;
pub use self::writer::BatchWriterBuilder;
pub use self::writer::DEFAULT_DEBOUNCE;
pub use self::writer::DEFAULT_IDLE_TIMEOUT;
pub use self::writer::DEFAULT_WATCHDOG_INTERVAL;
pub use self::writer::LogMode;
pub use self::writer::WriterConfig;
