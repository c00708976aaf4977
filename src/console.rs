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

//! Console sinks a writer echoes lines to.

use std::fmt;
use std::io;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

/// A line-oriented console output.
///
/// Lines handed to the sink already carry their trailing line terminator.
pub trait Console: fmt::Debug + Send + Sync + 'static {
    /// Emit one line.
    fn write_line(&self, line: &str);
}

impl<T: Console> From<T> for Box<dyn Console> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

/// A console sink that prints lines to stdout.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Stdout {}

impl Console for Stdout {
    fn write_line(&self, line: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(line.as_bytes());
        let _ = stdout.flush();
    }
}

/// A console sink that keeps every line in memory.
///
/// Clones share the same storage, so one clone can be handed to a writer while another is
/// inspected.
///
/// # Examples
///
/// ```
/// use logforth_batch::console::Capture;
/// use logforth_batch::console::Console;
///
/// let capture = Capture::default();
/// capture.clone().write_line("hello\n");
/// assert_eq!(capture.lines(), vec!["hello\n".to_string()]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Capture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Capture {
    /// A copy of the lines seen so far.
    pub fn lines(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.clone()
    }
}

impl Console for Capture {
    fn write_line(&self, line: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.push(line.to_string());
    }
}
