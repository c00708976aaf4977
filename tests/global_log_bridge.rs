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
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use logforth_batch::BatchWriterBuilder;
use logforth_batch::Level;
use logforth_batch::SharedLocks;
use logforth_batch::layout::MessageDisplay;
use tempfile::TempDir;

#[test]
fn test_log_crate_records_reach_the_file() {
    let temp_dir = TempDir::new().expect("failed to create a temporary directory");
    let writer = BatchWriterBuilder::new("bridge")
        .folder(temp_dir.path())
        .level(Level::Info)
        .message_display(MessageDisplay::LOG_LEVEL | MessageDisplay::MODULE_NAME | MessageDisplay::MESSAGE)
        .debounce(Duration::from_secs(3600))
        .idle_timeout(Duration::from_secs(3600))
        .locks(SharedLocks::new())
        .build()
        .unwrap();
    let writer = Arc::new(writer);
    logforth_batch::bridge::setup_log_crate(writer.clone());

    log::debug!(target: "bridge", "not shown");
    log::info!(target: "bridge", "listening on {}", 8080);
    log::error!(target: "bridge", "shutting down");
    log::logger().flush();

    let deadline = Instant::now() + Duration::from_secs(10);
    while writer.status().drain_cycles() == 0 {
        assert!(Instant::now() < deadline, "timed out waiting for a drain");
        std::thread::sleep(Duration::from_millis(5));
    }

    let content = fs::read_to_string(writer.destination()).unwrap();
    assert_eq!(
        content,
        "[Info][bridge] listening on 8080\n[Error][bridge] shutting down\n"
    );

    writer.stop();
    assert!(logforth_batch::bridge::try_setup_log_crate(writer).is_err());
}
