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

use std::fmt::Write;

use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::Level;
use crate::LogRecord;
use crate::layout::Layout;
use crate::layout::LayoutContext;
use crate::layout::MessageDisplay;

/// The default line layout of a batch writer.
///
/// With [`MessageDisplay::DEFAULT`] every line follows one pattern:
///
/// ```text
/// [Warning][storage][2024-08-10 17:12:52:123][main]{src/disk.rs:42} disk low
/// ```
///
/// Otherwise only the selected fields are written, in the order level, module, timestamp,
/// thread, context and message. The context block (`{file:line}` or `{file}{function}`) is
/// only rendered when the writer itself is configured at [`Level::Debug`] or more verbose.
///
/// # Examples
///
/// ```
/// use logforth_batch::Level;
/// use logforth_batch::LogRecord;
/// use logforth_batch::layout::DefaultLayout;
/// use logforth_batch::layout::Layout;
/// use logforth_batch::layout::LayoutContext;
/// use logforth_batch::layout::MessageDisplay;
///
/// let ctx = LayoutContext {
///     display: MessageDisplay::LOG_LEVEL | MessageDisplay::MESSAGE,
///     level: Level::Warning,
/// };
/// let record = LogRecord::new(Level::Warning, "disk low");
/// assert_eq!(DefaultLayout::default().format(&record, &ctx), "[Warning] disk low");
/// ```
#[derive(Debug, Clone)]
pub struct DefaultLayout {
    timezone: TimeZone,
}

impl Default for DefaultLayout {
    fn default() -> Self {
        Self {
            timezone: TimeZone::system(),
        }
    }
}

impl DefaultLayout {
    /// Set the timezone for timestamps.
    ///
    /// Defaults to the system timezone if not set.
    pub fn timezone(mut self, tz: TimeZone) -> Self {
        self.timezone = tz;
        self
    }

    fn format_time(&self, ts: Timestamp) -> String {
        ts.to_zoned(self.timezone.clone())
            .strftime("%Y-%m-%d %H:%M:%S:%3f")
            .to_string()
    }
}

fn context_block(record: &LogRecord, ctx: &LayoutContext) -> String {
    if ctx.level > Level::Debug {
        return String::new();
    }

    let display = ctx.display;
    let file = record.filename();
    let line = record.line_number();
    let function = record.function_name();

    if display.contains(MessageDisplay::FILE | MessageDisplay::LINE) && !file.is_empty() && line > 0
    {
        format!("{{{file}:{line}}}")
    } else if display.contains(MessageDisplay::FILE | MessageDisplay::FUNCTION)
        && !file.is_empty()
        && !function.is_empty()
    {
        format!("{{{file}}}{{{function}}}")
    } else {
        String::new()
    }
}

impl Layout for DefaultLayout {
    fn format(&self, record: &LogRecord, ctx: &LayoutContext) -> String {
        let display = ctx.display;
        let context = context_block(record, ctx);
        let level = record.level();
        let module = record.module_name();
        let thread = record.thread();
        let message = record.payload();

        if display.contains(MessageDisplay::DEFAULT) {
            let time = self.format_time(record.time());
            return format!("[{level}][{module}][{time}][{thread}]{context} {message}");
        }

        let mut text = String::new();
        // writing into a String never fails
        if display.contains(MessageDisplay::LOG_LEVEL) {
            write!(&mut text, "[{level}]").unwrap();
        }
        if display.contains(MessageDisplay::MODULE_NAME) {
            write!(&mut text, "[{module}]").unwrap();
        }
        if display.contains(MessageDisplay::DATE_TIME) {
            let time = self.format_time(record.time());
            write!(&mut text, "[{time}]").unwrap();
        }
        if display.contains(MessageDisplay::THREAD_ID) {
            write!(&mut text, "[{thread}]").unwrap();
        }
        text.push_str(&context);
        if display.contains(MessageDisplay::MESSAGE) {
            if !text.is_empty() && !text.ends_with(' ') {
                text.push(' ');
            }
            text.push_str(message);
        }

        text
    }
}
