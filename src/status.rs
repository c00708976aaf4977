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

use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::archive::ArchiveReport;

/// Observable counters of a [`BatchWriter`](crate::BatchWriter).
///
/// No failure inside the writer is raised to the caller of `enqueue`. Each failure path bumps
/// one of these counters instead, so monitoring and tests can observe it.
#[derive(Debug, Default)]
pub struct WriterStatus {
    wake_signals: AtomicU64,
    drain_cycles: AtomicU64,
    rotations: AtomicU64,
    rotation_failures: AtomicU64,
    write_failures: AtomicU64,
    last_write_failed: AtomicBool,
    archive_runs: AtomicU64,
    archive_failures: AtomicU64,
    last_archive: Mutex<Option<ArchiveReport>>,
}

impl WriterStatus {
    /// Number of wake signals issued to the worker by enqueues, the watchdog and explicit wakes.
    pub fn wake_signals(&self) -> u64 {
        self.wake_signals.load(Ordering::Acquire)
    }

    /// Number of completed drain cycles, the final one included.
    pub fn drain_cycles(&self) -> u64 {
        self.drain_cycles.load(Ordering::Acquire)
    }

    /// Number of successful renames of the destination file.
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Acquire)
    }

    /// Number of renames that failed and were postponed to the next cycle.
    pub fn rotation_failures(&self) -> u64 {
        self.rotation_failures.load(Ordering::Acquire)
    }

    /// Number of batches dropped because the destination could not be written.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Acquire)
    }

    /// Whether the most recent file write failed.
    pub fn last_write_failed(&self) -> bool {
        self.last_write_failed.load(Ordering::Acquire)
    }

    /// Number of archiver invocations.
    pub fn archive_runs(&self) -> u64 {
        self.archive_runs.load(Ordering::Acquire)
    }

    /// Number of archiver invocations that timed out, crashed or exited with a nonzero code.
    pub fn archive_failures(&self) -> u64 {
        self.archive_failures.load(Ordering::Acquire)
    }

    /// The report of the most recent archiver invocation, if any.
    pub fn last_archive(&self) -> Option<ArchiveReport> {
        let guard = self.last_archive.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    pub(crate) fn record_wake(&self) {
        self.wake_signals.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_drain(&self) {
        self.drain_cycles.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_rotation_failure(&self) {
        self.rotation_failures.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_write(&self, ok: bool) {
        if !ok {
            self.write_failures.fetch_add(1, Ordering::AcqRel);
        }
        self.last_write_failed.store(!ok, Ordering::Release);
    }

    pub(crate) fn record_archive(&self, report: Option<ArchiveReport>, ok: bool) {
        self.archive_runs.fetch_add(1, Ordering::AcqRel);
        if !ok {
            self.archive_failures.fetch_add(1, Ordering::AcqRel);
        }
        let mut guard = self.last_archive.lock().unwrap_or_else(|e| e.into_inner());
        *guard = report;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_flag_tracks_latest_outcome() {
        let status = WriterStatus::default();
        assert!(!status.last_write_failed());

        status.record_write(false);
        assert!(status.last_write_failed());
        assert_eq!(status.write_failures(), 1);

        status.record_write(true);
        assert!(!status.last_write_failed());
        assert_eq!(status.write_failures(), 1);
    }

    #[test]
    fn test_archive_failures_are_counted_separately() {
        let status = WriterStatus::default();
        status.record_archive(None, true);
        status.record_archive(None, false);
        assert_eq!(status.archive_runs(), 2);
        assert_eq!(status.archive_failures(), 1);
        assert!(status.last_archive().is_none());
    }
}
