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

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;

/// Locks shared between writer instances.
///
/// The write lock serializes physical appends, so two writers pointed at the same file never
/// interleave partial batches. The archive lock allows one external compressor run at a time.
///
/// Writers use [`SharedLocks::global`] unless told otherwise. Tests and embedders that want
/// independent writers can hand out [`SharedLocks::new`] instead.
#[derive(Debug, Clone, Default)]
pub struct SharedLocks {
    write: Arc<Mutex<()>>,
    archive: Arc<Mutex<()>>,
}

impl SharedLocks {
    /// Create a pair of locks not shared with any other writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide pair of locks.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<SharedLocks> = OnceLock::new();
        GLOBAL.get_or_init(SharedLocks::new).clone()
    }

    /// Whether both handles refer to the same locks.
    pub fn same_as(&self, other: &SharedLocks) -> bool {
        Arc::ptr_eq(&self.write, &other.write) && Arc::ptr_eq(&self.archive, &other.archive)
    }

    pub(crate) fn lock_write(&self) -> MutexGuard<'_, ()> {
        self.write.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn lock_archive(&self) -> MutexGuard<'_, ()> {
        self.archive.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_locks_are_shared() {
        assert!(SharedLocks::global().same_as(&SharedLocks::global()));
        assert!(!SharedLocks::new().same_as(&SharedLocks::global()));
    }

    #[test]
    fn test_locks_are_independent() {
        let locks = SharedLocks::new();
        let _write = locks.lock_write();
        // holding the write lock must not block archiving
        let archive = locks.archive.try_lock();
        assert!(archive.is_ok());
    }
}
