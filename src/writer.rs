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
use std::mem;
use std::num::NonZeroU64;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::thread::JoinHandle;
use std::time::Duration;

use jiff::civil::Date;

use crate::Error;
use crate::Level;
use crate::LogRecord;
use crate::SharedLocks;
use crate::Trap;
use crate::WriterStatus;
use crate::archive::Archive;
use crate::clock::Clock;
use crate::console::Console;
use crate::console::Stdout;
use crate::file::FileWriter;
use crate::layout::DefaultLayout;
use crate::layout::Layout;
use crate::layout::MessageDisplay;
use crate::rotation::FileSuffix;
use crate::rotation::RotationPolicy;
use crate::trap::DefaultTrap;
use crate::worker::Shared;
use crate::worker::Watchdog;
use crate::worker::Worker;

/// Minimum time between two wake signals caused by ordinary enqueues.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Idle time after which the watchdog pushes lingering lines.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the watchdog looks at the buffer.
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);

/// Where the lines of a writer go.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogMode {
    /// Enqueueing does nothing.
    Disabled,
    /// Append to the destination file.
    #[default]
    OnlyFile,
    /// Print to the console sink, never touch the file system.
    OnlyConsole,
    /// Append to the destination file and echo to the console sink.
    Full,
}

impl LogMode {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(n: u8) -> Self {
        match n {
            0 => LogMode::Disabled,
            1 => LogMode::OnlyFile,
            2 => LogMode::OnlyConsole,
            _ => LogMode::Full,
        }
    }

    fn writes_file(self) -> bool {
        matches!(self, LogMode::OnlyFile | LogMode::Full)
    }
}

/// A snapshot of the identity of a writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    destination: PathBuf,
    folder: PathBuf,
    mode: LogMode,
    level: Level,
    file_suffix: FileSuffix,
    message_display: MessageDisplay,
}

impl WriterConfig {
    /// The file lines are appended to.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// The folder holding the destination and its rotated siblings.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// The mode at the time of the snapshot.
    pub fn mode(&self) -> LogMode {
        self.mode
    }

    /// The minimum level at the time of the snapshot.
    pub fn level(&self) -> Level {
        self.level
    }

    /// How size rotated files are told apart.
    pub fn file_suffix(&self) -> FileSuffix {
        self.file_suffix
    }

    /// The fields rendered in each line.
    pub fn message_display(&self) -> MessageDisplay {
        self.message_display
    }
}

/// A builder to configure and create a [`BatchWriter`].
///
/// # Examples
///
/// ```
/// use logforth_batch::BatchWriterBuilder;
/// use logforth_batch::Level;
/// use logforth_batch::LogRecord;
///
/// let dir = tempfile::tempdir().unwrap();
/// let writer = BatchWriterBuilder::new("service")
///     .folder(dir.path())
///     .level(Level::Info)
///     .build()
///     .unwrap();
///
/// writer.log(&LogRecord::new(Level::Error, "connection reset"));
/// writer.stop();
///
/// let content = std::fs::read_to_string(dir.path().join("service.log")).unwrap();
/// assert!(content.contains("connection reset"));
/// ```
#[derive(Debug)]
pub struct BatchWriterBuilder {
    filename: String,
    folder: Option<PathBuf>,
    level: Level,
    mode: LogMode,
    file_suffix: FileSuffix,
    message_display: MessageDisplay,
    max_file_size: Option<NonZeroU64>,
    layout: Box<dyn Layout>,
    console: Box<dyn Console>,
    archive: Option<Box<dyn Archive>>,
    trap: Box<dyn Trap>,
    locks: SharedLocks,
    debounce: Duration,
    idle_timeout: Duration,
    watchdog_interval: Duration,
    thread_name: String,
    clock: Clock,
    #[cfg(test)]
    rename_faults: Option<Arc<std::sync::atomic::AtomicU32>>,
}

impl BatchWriterBuilder {
    /// Create a new builder for a writer appending to `filename`.
    ///
    /// An empty name stands for `<yyyy-MM-dd>.log` of the current day. A name without an
    /// extension gets `.log` appended.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            folder: None,
            level: Level::Warning,
            mode: LogMode::default(),
            file_suffix: FileSuffix::default(),
            message_display: MessageDisplay::default(),
            max_file_size: None,
            layout: Box::new(DefaultLayout::default()),
            console: Box::new(Stdout::default()),
            archive: None,
            trap: Box::new(DefaultTrap::default()),
            locks: SharedLocks::global(),
            debounce: DEFAULT_DEBOUNCE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            thread_name: "logforth-batch".to_string(),
            clock: Clock::DefaultClock,
            #[cfg(test)]
            rename_faults: None,
        }
    }

    /// Set the destination folder.
    ///
    /// Defaults to `logs/` under the current working directory.
    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Set the minimum level accepted by [`BatchWriter::log`].
    ///
    /// The level also gates the source context of rendered lines: it is only shown at
    /// [`Level::Debug`] and below. Defaults to [`Level::Warning`].
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the mode. Defaults to [`LogMode::OnlyFile`].
    pub fn mode(mut self, mode: LogMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set how size rotated files are named.
    pub fn file_suffix(mut self, file_suffix: FileSuffix) -> Self {
        self.file_suffix = file_suffix;
        self
    }

    /// Set the fields rendered in each line.
    pub fn message_display(mut self, message_display: MessageDisplay) -> Self {
        self.message_display = message_display;
        self
    }

    /// Rotate the destination when it reaches `max_file_size` bytes within a day.
    ///
    /// Zero disables size rotation, which is the default.
    pub fn max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = NonZeroU64::new(max_file_size);
        self
    }

    /// Set the layout turning records into lines.
    pub fn layout(mut self, layout: impl Into<Box<dyn Layout>>) -> Self {
        self.layout = layout.into();
        self
    }

    /// Set the console sink used by [`LogMode::OnlyConsole`] and [`LogMode::Full`].
    pub fn console(mut self, console: impl Into<Box<dyn Console>>) -> Self {
        self.console = console.into();
        self
    }

    /// Compress files renamed by the daily rotation.
    ///
    /// No archiving happens by default.
    pub fn archive(mut self, archive: impl Into<Box<dyn Archive>>) -> Self {
        self.archive = Some(archive.into());
        self
    }

    /// Set the trap receiving write, rotation and archive failures.
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    /// Set the write and archive locks.
    ///
    /// Defaults to [`SharedLocks::global`].
    pub fn locks(mut self, locks: SharedLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Set the minimum time between wake signals caused by enqueues.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set how long lines may wait while the worker is idle before the watchdog pushes them.
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Set how often the watchdog looks at the buffer.
    pub fn watchdog_interval(mut self, watchdog_interval: Duration) -> Self {
        self.watchdog_interval = watchdog_interval;
        self
    }

    /// Set the name of the worker thread. The watchdog thread gets a `-watchdog` suffix.
    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    #[cfg(test)]
    pub(crate) fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub(crate) fn rename_faults(mut self, faults: Arc<std::sync::atomic::AtomicU32>) -> Self {
        self.rename_faults = Some(faults);
        self
    }

    /// Build the writer, creating the destination folder in file modes and starting the worker
    /// unless the mode is [`LogMode::Disabled`].
    pub fn build(self) -> Result<BatchWriter, Error> {
        let BatchWriterBuilder {
            filename,
            folder,
            level,
            mode,
            file_suffix,
            message_display,
            max_file_size,
            layout,
            console,
            archive,
            trap,
            locks,
            debounce,
            idle_timeout,
            watchdog_interval,
            thread_name,
            clock,
            #[cfg(test)]
            rename_faults,
        } = self;

        let folder = match folder {
            Some(folder) => folder,
            None => std::env::current_dir()
                .map_err(|err| {
                    Error::new("failed to resolve current directory").with_source(err)
                })?
                .join("logs"),
        };
        let destination = folder.join(file_name(&filename, clock.now().date()));

        if mode.writes_file() {
            create_folder(&folder)?;
        }

        let (sender, receiver) = crossbeam_channel::bounded(1);
        let status = Arc::new(WriterStatus::default());
        let shared = Arc::new(Shared::new(
            sender,
            mode,
            level,
            message_display,
            layout,
            debounce,
            idle_timeout,
            status,
        ));

        #[allow(unused_mut)]
        let mut rotation =
            RotationPolicy::new(destination.clone(), max_file_size, file_suffix, clock);
        #[cfg(test)]
        if let Some(faults) = rename_faults {
            rotation.rename_faults = faults;
        }

        let trap: Arc<dyn Trap> = Arc::from(trap);
        let file = FileWriter::new(destination.clone(), Arc::from(console), locks.clone());
        let worker = Worker::new(
            shared.clone(),
            receiver,
            rotation,
            file,
            archive,
            locks,
            trap.clone(),
        );

        let writer = BatchWriter {
            shared,
            lifecycle: Mutex::new(Lifecycle::Idle(Box::new(worker))),
            destination,
            folder,
            file_suffix,
            thread_name,
            watchdog_interval,
            trap,
        };

        if mode != LogMode::Disabled {
            writer.start(&mut writer.lifecycle())?;
        }

        Ok(writer)
    }
}

fn file_name(filename: &str, today: Date) -> String {
    if filename.is_empty() {
        format!("{}.log", today.strftime("%Y-%m-%d"))
    } else if !filename.contains('.') {
        format!("{filename}.log")
    } else {
        filename.to_string()
    }
}

fn create_folder(folder: &Path) -> Result<(), Error> {
    fs::create_dir_all(folder).map_err(|err| {
        Error::new("failed to create log directory")
            .with_context("path", folder.display())
            .with_source(err)
    })
}

#[derive(Debug)]
enum Lifecycle {
    Idle(Box<Worker>),
    Running {
        worker: JoinHandle<()>,
        watchdog: Option<Watchdog>,
    },
    Stopped,
}

/// A handle to a batching log writer.
///
/// Records are formatted on the calling thread and buffered. A dedicated worker thread writes
/// the buffered lines in batches, at most once per debounce interval under steady load, and
/// renames the destination when the calendar day changes.
///
/// Dropping the writer stops it, see [`BatchWriter::stop`].
#[derive(Debug)]
pub struct BatchWriter {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    destination: PathBuf,
    folder: PathBuf,
    file_suffix: FileSuffix,
    thread_name: String,
    watchdog_interval: Duration,
    trap: Arc<dyn Trap>,
}

impl BatchWriter {
    /// Format `record` and buffer it, regardless of its level.
    ///
    /// This never blocks on I/O and never fails. In [`LogMode::Disabled`] it does nothing.
    pub fn enqueue(&self, record: &LogRecord) {
        self.shared.enqueue(record);
    }

    /// Buffer `record` if its level is at least the minimum level.
    pub fn log(&self, record: &LogRecord) {
        if record.level().is_enabled_by(self.level()) {
            self.enqueue(record);
        }
    }

    /// Switch the mode.
    ///
    /// File modes create the destination folder, and any mode but [`LogMode::Disabled`] starts
    /// the worker if it is not running yet. Failures go to the trap.
    pub fn set_mode(&self, mode: LogMode) {
        self.shared.set_mode(mode);

        if mode.writes_file() {
            if let Err(err) = create_folder(&self.folder) {
                self.trap.trap(&err);
            }
        }

        if mode != LogMode::Disabled && !self.shared.is_stopped() {
            if let Err(err) = self.start(&mut self.lifecycle()) {
                self.trap.trap(&err);
            }
        }
    }

    /// The current mode.
    pub fn mode(&self) -> LogMode {
        self.shared.mode()
    }

    /// Set the minimum level.
    pub fn set_level(&self, level: Level) {
        self.shared.set_level(level);
    }

    /// The current minimum level.
    pub fn level(&self) -> Level {
        self.shared.level()
    }

    /// A snapshot of the configuration.
    pub fn config(&self) -> WriterConfig {
        WriterConfig {
            destination: self.destination.clone(),
            folder: self.folder.clone(),
            mode: self.mode(),
            level: self.level(),
            file_suffix: self.file_suffix,
            message_display: self.shared.display(),
        }
    }

    /// The file lines are appended to.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Counters describing what the worker did so far.
    pub fn status(&self) -> &WriterStatus {
        self.shared.status()
    }

    /// The number of lines waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.shared.pending()
    }

    /// Wake the worker if lines are buffered and it has been idle longer than the idle timeout.
    ///
    /// The watchdog thread calls this periodically.
    pub fn force_push(&self) {
        self.shared.force_push();
    }

    /// Ask the worker to drain the buffer now, ignoring the debounce interval.
    pub fn wake(&self) {
        self.shared.wake();
    }

    /// Stop the writer.
    ///
    /// Every line buffered before this call is written, followed by a `Closed <timestamp>` line.
    /// Returns once the worker thread has exited. Records enqueued afterwards are accepted but
    /// stay in memory. Calling it again does nothing.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle();
        self.shared.request_stop();

        match mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(mut worker) => worker.finish(),
            Lifecycle::Running { worker, watchdog } => {
                if let Some(watchdog) = watchdog {
                    watchdog.stop();
                }
                self.shared.send_stop();
                if worker.join().is_err() {
                    let err = Error::new("batch writer thread panicked")
                        .with_context("thread", &self.thread_name);
                    self.trap.trap(&err);
                }
            }
            Lifecycle::Stopped => {}
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start(&self, lifecycle: &mut Lifecycle) -> Result<(), Error> {
        let worker = match mem::replace(lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(worker) => *worker,
            other => {
                *lifecycle = other;
                return Ok(());
            }
        };

        let handle = std::thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || worker.run())
            .map_err(|err| {
                Error::new("failed to spawn batch writer thread")
                    .with_context("thread", &self.thread_name)
                    .with_source(err)
            })?;

        let watchdog = match Watchdog::spawn(
            self.shared.clone(),
            self.watchdog_interval,
            format!("{}-watchdog", self.thread_name),
        ) {
            Ok(watchdog) => Some(watchdog),
            Err(err) => {
                let err = Error::new("failed to spawn batch writer watchdog").with_source(err);
                self.trap.trap(&err);
                None
            }
        };

        *lifecycle = Lifecycle::Running {
            worker: handle,
            watchdog,
        };
        Ok(())
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        self.stop();
    }
}
