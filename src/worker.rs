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

use std::mem;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;

use crate::Error;
use crate::Level;
use crate::LogMode;
use crate::LogRecord;
use crate::SharedLocks;
use crate::Trap;
use crate::WriterStatus;
use crate::archive::Archive;
use crate::file::FileWriter;
use crate::layout::Layout;
use crate::layout::LayoutContext;
use crate::layout::MessageDisplay;
use crate::rotation::Rollover;
use crate::rotation::RotationPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Wake,
    Stop,
}

#[derive(Debug)]
struct Buffer {
    lines: Vec<String>,
    last_wake_check: Instant,
    last_active: Instant,
}

/// State shared between producers, the worker thread and the watchdog.
#[derive(Debug)]
pub(crate) struct Shared {
    buffer: Mutex<Buffer>,
    sender: Sender<Signal>,
    stopped: AtomicBool,
    mode: AtomicU8,
    level: AtomicU8,
    display: MessageDisplay,
    layout: Box<dyn Layout>,
    debounce: Duration,
    idle_timeout: Duration,
    status: Arc<WriterStatus>,
}

impl Shared {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        sender: Sender<Signal>,
        mode: LogMode,
        level: Level,
        display: MessageDisplay,
        layout: Box<dyn Layout>,
        debounce: Duration,
        idle_timeout: Duration,
        status: Arc<WriterStatus>,
    ) -> Self {
        let now = Instant::now();
        Self {
            buffer: Mutex::new(Buffer {
                lines: vec![],
                last_wake_check: now,
                last_active: now,
            }),
            sender,
            stopped: AtomicBool::new(false),
            mode: AtomicU8::new(mode.as_u8()),
            level: AtomicU8::new(level_to_u8(level)),
            display,
            layout,
            debounce,
            idle_timeout,
            status,
        }
    }

    fn buffer(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn mode(&self) -> LogMode {
        LogMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub(crate) fn set_mode(&self, mode: LogMode) {
        self.mode.store(mode.as_u8(), Ordering::Release);
    }

    pub(crate) fn level(&self) -> Level {
        level_from_u8(self.level.load(Ordering::Acquire))
    }

    pub(crate) fn set_level(&self, level: Level) {
        self.level.store(level_to_u8(level), Ordering::Release);
    }

    pub(crate) fn display(&self) -> MessageDisplay {
        self.display
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn pending(&self) -> usize {
        self.buffer().lines.len()
    }

    pub(crate) fn status(&self) -> &Arc<WriterStatus> {
        &self.status
    }

    /// Format `record` and append it to the pending lines.
    pub(crate) fn enqueue(&self, record: &LogRecord) {
        if self.mode() == LogMode::Disabled {
            return;
        }

        let ctx = LayoutContext {
            display: self.display,
            level: self.level(),
        };
        let mut line = self.layout.format(record, &ctx);
        line.push('\n');

        let mut buffer = self.buffer();
        buffer.lines.push(line);

        let now = Instant::now();
        if now.duration_since(buffer.last_wake_check) > self.debounce {
            if !self.is_stopped() {
                self.signal_wake();
            }
            buffer.last_wake_check = now;
        }
    }

    /// Wake the worker if lines have been waiting while it was idle for too long.
    pub(crate) fn force_push(&self) {
        let buffer = self.buffer();
        if !buffer.lines.is_empty()
            && buffer.last_active.elapsed() > self.idle_timeout
            && !self.is_stopped()
        {
            self.signal_wake();
        }
    }

    pub(crate) fn wake(&self) {
        if !self.is_stopped() {
            self.signal_wake();
        }
    }

    /// Mark the writer as stopping. Enqueue keeps buffering but never wakes the worker again.
    pub(crate) fn request_stop(&self) {
        let _buffer = self.buffer();
        self.stopped.store(true, Ordering::Release);
    }

    pub(crate) fn send_stop(&self) {
        // the worker being gone already is fine, it has nothing left to do
        let _ = self.sender.send(Signal::Stop);
    }

    fn signal_wake(&self) {
        self.status.record_wake();
        // a full channel already holds a pending wake, and a disconnected one has no worker left
        let _ = self.sender.try_send(Signal::Wake);
    }

    fn take_batch(&self) -> Vec<String> {
        mem::take(&mut self.buffer().lines)
    }

    fn mark_active(&self) {
        self.buffer().last_active = Instant::now();
    }
}

fn level_to_u8(level: Level) -> u8 {
    level as u8
}

fn level_from_u8(n: u8) -> Level {
    match n {
        0 => Level::Trace,
        1 => Level::Debug,
        2 => Level::Info,
        3 => Level::Warning,
        4 => Level::Error,
        _ => Level::Fatal,
    }
}

/// The single consumer of the pending lines.
#[derive(Debug)]
pub(crate) struct Worker {
    shared: Arc<Shared>,
    receiver: Receiver<Signal>,
    rotation: RotationPolicy,
    file: FileWriter,
    archive: Option<Box<dyn Archive>>,
    locks: SharedLocks,
    trap: Arc<dyn Trap>,
}

impl Worker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        receiver: Receiver<Signal>,
        rotation: RotationPolicy,
        file: FileWriter,
        archive: Option<Box<dyn Archive>>,
        locks: SharedLocks,
        trap: Arc<dyn Trap>,
    ) -> Self {
        Self {
            shared,
            receiver,
            rotation,
            file,
            archive,
            locks,
            trap,
        }
    }

    #[cfg(test)]
    pub(crate) fn rotation(&self) -> &RotationPolicy {
        &self.rotation
    }

    pub(crate) fn run(mut self) {
        while let Ok(Signal::Wake) = self.receiver.recv() {
            self.drain();
        }
        self.finish();
    }

    fn drain(&mut self) {
        let batch = self.shared.take_batch();
        if batch.is_empty() {
            return;
        }

        self.write_batch(&batch, false);
        self.shared.mark_active();
        self.shared.status.record_drain();
    }

    /// Flush whatever is still buffered, followed by the closing trailer.
    pub(crate) fn finish(&mut self) {
        let mut batch = self.shared.take_batch();
        if batch.is_empty() && self.shared.mode() == LogMode::Disabled {
            return;
        }

        let now = self.rotation.now();
        batch.push(format!("Closed {}\n", now.strftime("%Y-%m-%d %H:%M:%S")));
        self.write_batch(&batch, true);
        self.shared.mark_active();
        self.shared.status.record_drain();
    }

    fn write_batch(&mut self, batch: &[String], stopping: bool) {
        let mode = self.shared.mode();
        if mode == LogMode::OnlyConsole {
            if let Err(err) = self.file.write(mode, batch, None) {
                self.trap.trap(&err);
            }
            return;
        }

        let previous = self.rotate(stopping);
        match self.file.write(mode, batch, previous.as_deref()) {
            Ok(()) => self.shared.status.record_write(true),
            Err(err) => {
                self.shared.status.record_write(false);
                let err = Error::new("failed to write log batch")
                    .with_context("lines", batch.len())
                    .with_source(err);
                self.trap.trap(&err);
            }
        }
    }

    fn rotate(&mut self, stopping: bool) -> Option<PathBuf> {
        match self.rotation.rotate() {
            Ok(None) => None,
            Ok(Some(rollover)) => {
                self.shared.status.record_rotation();
                if let Rollover::Daily(path) = &rollover {
                    // shutdown must not wait on the archiver
                    if !stopping {
                        self.archive(path);
                    }
                }
                Some(rollover.path().to_path_buf())
            }
            Err(err) => {
                self.shared.status.record_rotation_failure();
                let err = Error::new("failed to rotate log file, retry on next drain")
                    .with_source(err);
                self.trap.trap(&err);
                None
            }
        }
    }

    fn archive(&self, path: &Path) {
        let Some(archive) = &self.archive else {
            return;
        };

        let _guard = self.locks.lock_archive();
        match archive.archive(path) {
            Ok(report) => {
                let success = report.success();
                if !success {
                    let err = Error::new("failed to archive rotated log")
                        .with_context("report", &report);
                    self.trap.trap(&err);
                }
                self.shared.status.record_archive(Some(report), success);
            }
            Err(err) => {
                self.shared.status.record_archive(None, false);
                let err = Error::new("failed to archive rotated log")
                    .with_context("path", path.display())
                    .with_source(err);
                self.trap.trap(&err);
            }
        }
    }
}

/// Periodically asks the shared state to push lingering lines.
#[derive(Debug)]
pub(crate) struct Watchdog {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    pub(crate) fn spawn(
        shared: Arc<Shared>,
        interval: Duration,
        thread_name: String,
    ) -> std::io::Result<Watchdog> {
        let (shutdown, shutdown_receiver) = crossbeam_channel::bounded::<()>(0);
        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let ticker = crossbeam_channel::tick(interval);
                loop {
                    crossbeam_channel::select! {
                        recv(ticker) -> _ => shared.force_push(),
                        recv(shutdown_receiver) -> _ => break,
                    }
                }
            })?;
        Ok(Watchdog { shutdown, handle })
    }

    pub(crate) fn stop(self) {
        let Watchdog { shutdown, handle } = self;
        drop(shutdown);
        let _ = handle.join();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::str::FromStr;
    use std::sync::atomic::Ordering;

    use jiff::Zoned;
    use tempfile::TempDir;

    use super::*;
    use crate::archive::ArchiveReport;
    use crate::archive::archive_name;
    use crate::clock::Clock;
    use crate::clock::ManualClock;
    use crate::console::Capture;
    use crate::layout::DefaultLayout;
    use crate::rotation::FileSuffix;

    #[derive(Debug, Default, Clone)]
    struct Collect(Arc<Mutex<Vec<String>>>);

    impl Trap for Collect {
        fn trap(&self, err: &Error) {
            self.0.lock().unwrap().push(err.to_string());
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Recording(Arc<Mutex<Vec<PathBuf>>>);

    impl Archive for Recording {
        fn archive(&self, path: &Path) -> Result<ArchiveReport, Error> {
            self.0.lock().unwrap().push(path.to_path_buf());
            Ok(ArchiveReport::new(
                path,
                archive_name(path),
                true,
                Some(0),
                Duration::ZERO,
            ))
        }
    }

    struct Fixture {
        shared: Arc<Shared>,
        worker: Worker,
        receiver: Receiver<Signal>,
        clock: ManualClock,
        traps: Collect,
        archived: Recording,
        destination: PathBuf,
    }

    fn fixture(dir: &TempDir, mode: LogMode, debounce: Duration, idle: Duration) -> Fixture {
        let destination = dir.path().join("app.log");
        let clock = ManualClock::new(Zoned::from_str("2024-08-10T17:12:52[UTC]").unwrap());
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let shared = Arc::new(Shared::new(
            sender,
            mode,
            Level::Warning,
            MessageDisplay::MESSAGE,
            Box::new(DefaultLayout::default()),
            debounce,
            idle,
            Arc::new(WriterStatus::default()),
        ));
        let traps = Collect::default();
        let archived = Recording::default();
        let locks = SharedLocks::new();
        let worker = Worker::new(
            shared.clone(),
            receiver.clone(),
            RotationPolicy::new(
                destination.clone(),
                None,
                FileSuffix::DateTime,
                Clock::ManualClock(clock.clone()),
            ),
            FileWriter::new(destination.clone(), Arc::new(Capture::default()), locks.clone()),
            Some(Box::new(archived.clone())),
            locks,
            Arc::new(traps.clone()),
        );
        Fixture {
            shared,
            worker,
            receiver,
            clock,
            traps,
            archived,
            destination,
        }
    }

    fn idle_fixture(dir: &TempDir) -> Fixture {
        fixture(
            dir,
            LogMode::OnlyFile,
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        )
    }

    fn push(shared: &Shared, message: &str) {
        shared.enqueue(&LogRecord::new(Level::Error, message));
    }

    #[test]
    fn test_drain_writes_batch_in_order() {
        let dir = TempDir::new().unwrap();
        let mut f = idle_fixture(&dir);

        push(&f.shared, "one");
        push(&f.shared, "two");
        push(&f.shared, "three");
        assert_eq!(f.shared.pending(), 3);

        f.worker.drain();
        assert_eq!(f.shared.pending(), 0);
        assert_eq!(
            fs::read_to_string(&f.destination).unwrap(),
            "one\ntwo\nthree\n"
        );
        assert_eq!(f.shared.status().drain_cycles(), 1);

        // nothing buffered, nothing to do
        f.worker.drain();
        assert_eq!(f.shared.status().drain_cycles(), 1);
    }

    #[test]
    fn test_finish_appends_trailer_last() {
        let dir = TempDir::new().unwrap();
        let mut f = idle_fixture(&dir);

        push(&f.shared, "residual");
        f.shared.request_stop();
        f.worker.finish();

        let content = fs::read_to_string(&f.destination).unwrap();
        assert_eq!(content, "residual\nClosed 2024-08-10 17:12:52\n");
    }

    #[test]
    fn test_finish_in_disabled_mode_without_lines_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut f = fixture(
            &dir,
            LogMode::Disabled,
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        );

        push(&f.shared, "dropped");
        assert_eq!(f.shared.pending(), 0);
        f.worker.finish();
        assert!(!f.destination.exists());
    }

    #[test]
    fn test_daily_rotation_archives_and_marks_new_file() {
        let dir = TempDir::new().unwrap();
        let mut f = idle_fixture(&dir);

        push(&f.shared, "saturday");
        f.worker.drain();

        f.clock
            .set_now(Zoned::from_str("2024-08-11T00:00:01[UTC]").unwrap());
        push(&f.shared, "sunday");
        f.worker.drain();

        let rotated = dir.path().join("app_2024_08_10.log");
        assert_eq!(fs::read_to_string(&rotated).unwrap(), "saturday\n");
        assert_eq!(
            fs::read_to_string(&f.destination).unwrap(),
            format!("Previous log {}\nsunday\n", rotated.display())
        );
        assert_eq!(*f.archived.0.lock().unwrap(), vec![rotated]);

        let status = f.shared.status();
        assert_eq!(status.rotations(), 1);
        assert_eq!(status.archive_runs(), 1);
        assert_eq!(status.archive_failures(), 0);
        assert!(status.last_archive().unwrap().success());
    }

    #[test]
    fn test_rotation_at_shutdown_skips_archive() {
        let dir = TempDir::new().unwrap();
        let mut f = idle_fixture(&dir);

        push(&f.shared, "saturday");
        f.worker.drain();

        f.clock
            .set_now(Zoned::from_str("2024-08-11T00:00:01[UTC]").unwrap());
        f.shared.request_stop();
        f.worker.finish();

        assert!(dir.path().join("app_2024_08_10.log").exists());
        assert!(f.archived.0.lock().unwrap().is_empty());
        assert_eq!(f.shared.status().archive_runs(), 0);
    }

    #[test]
    fn test_failed_rotation_keeps_writing_and_retries() {
        let dir = TempDir::new().unwrap();
        let mut f = idle_fixture(&dir);

        push(&f.shared, "saturday");
        f.worker.drain();

        f.clock
            .set_now(Zoned::from_str("2024-08-11T00:00:01[UTC]").unwrap());
        f.worker
            .rotation()
            .rename_faults
            .store(1, Ordering::SeqCst);
        push(&f.shared, "sunday");
        f.worker.drain();

        // the batch still lands in the undated file
        assert_eq!(
            fs::read_to_string(&f.destination).unwrap(),
            "saturday\nsunday\n"
        );
        assert_eq!(f.shared.status().rotation_failures(), 1);
        assert!(!f.shared.status().last_write_failed());
        assert_eq!(f.traps.0.lock().unwrap().len(), 1);

        push(&f.shared, "retry");
        f.worker.drain();

        let rotated = dir.path().join("app_2024_08_10.log");
        assert_eq!(
            fs::read_to_string(&rotated).unwrap(),
            "saturday\nsunday\n"
        );
        assert_eq!(
            fs::read_to_string(&f.destination).unwrap(),
            format!("Previous log {}\nretry\n", rotated.display())
        );
        assert_eq!(f.shared.status().rotations(), 1);
    }

    #[test]
    fn test_write_failure_is_trapped() {
        let dir = TempDir::new().unwrap();
        let mut f = idle_fixture(&dir);
        fs::create_dir(&f.destination).unwrap();

        push(&f.shared, "lost");
        f.worker.drain();

        assert!(f.shared.status().last_write_failed());
        assert_eq!(f.shared.status().write_failures(), 1);
        let traps = f.traps.0.lock().unwrap();
        assert_eq!(traps.len(), 1);
        assert!(traps[0].starts_with("failed to write log batch"));
    }

    #[test]
    fn test_debounce_limits_wake_signals() {
        let dir = TempDir::new().unwrap();
        let f = idle_fixture(&dir);

        for i in 0..100 {
            push(&f.shared, &format!("line {i}"));
        }
        assert_eq!(f.shared.status().wake_signals(), 0);
        assert!(f.receiver.is_empty());

        let dir = TempDir::new().unwrap();
        let f = fixture(
            &dir,
            LogMode::OnlyFile,
            Duration::ZERO,
            Duration::from_secs(3600),
        );
        for i in 0..3 {
            std::thread::sleep(Duration::from_millis(2));
            push(&f.shared, &format!("line {i}"));
        }
        assert_eq!(f.shared.status().wake_signals(), 3);
        // pending wakes coalesce into one signal
        assert_eq!(f.receiver.len(), 1);
    }

    #[test]
    fn test_force_push_wakes_idle_worker_only_with_lines() {
        let dir = TempDir::new().unwrap();
        let f = fixture(
            &dir,
            LogMode::OnlyFile,
            Duration::from_secs(3600),
            Duration::ZERO,
        );

        std::thread::sleep(Duration::from_millis(2));
        f.shared.force_push();
        assert!(f.receiver.is_empty());

        push(&f.shared, "lingering");
        std::thread::sleep(Duration::from_millis(2));
        f.shared.force_push();
        assert_eq!(f.receiver.try_recv(), Ok(Signal::Wake));

        f.shared.request_stop();
        f.shared.force_push();
        assert!(f.receiver.is_empty());
    }

    #[test]
    fn test_enqueue_after_stop_never_wakes() {
        let dir = TempDir::new().unwrap();
        let f = fixture(
            &dir,
            LogMode::OnlyFile,
            Duration::ZERO,
            Duration::from_secs(3600),
        );

        f.shared.request_stop();
        std::thread::sleep(Duration::from_millis(2));
        push(&f.shared, "late");
        assert_eq!(f.shared.pending(), 1);
        assert!(f.receiver.is_empty());
    }

    #[test]
    fn test_watchdog_pushes_lingering_lines() {
        let dir = TempDir::new().unwrap();
        let f = fixture(
            &dir,
            LogMode::OnlyFile,
            Duration::from_secs(3600),
            Duration::from_millis(10),
        );
        push(&f.shared, "lingering");

        let watchdog = Watchdog::spawn(
            f.shared.clone(),
            Duration::from_millis(5),
            "watchdog-test".to_string(),
        )
        .unwrap();
        let signal = f.receiver.recv_timeout(Duration::from_secs(5));
        watchdog.stop();

        assert_eq!(signal, Ok(Signal::Wake));
    }
}
