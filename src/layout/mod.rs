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

//! Layouts turn a [`LogRecord`] into one line of text.

use std::fmt;
use std::ops::BitOr;
use std::ops::BitOrAssign;

use crate::Level;
use crate::LogRecord;

mod text;

pub use self::text::DefaultLayout;

/// The formatter contract of a writer.
///
/// A layout is total: it always produces a line and never fails. The returned text must not
/// carry the trailing line terminator; the writer appends it.
pub trait Layout: fmt::Debug + Send + Sync + 'static {
    /// Format a record as a single line.
    fn format(&self, record: &LogRecord, ctx: &LayoutContext) -> String;
}

impl<T: Layout> From<T> for Box<dyn Layout> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

/// Writer-owned settings a layout may consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutContext {
    /// Which fields should be displayed.
    pub display: MessageDisplay,
    /// The minimum level configured on the writer, not the level of the record.
    pub level: Level,
}

/// A set of flags selecting the fields of a rendered line.
///
/// # Examples
///
/// ```
/// use logforth_batch::layout::MessageDisplay;
///
/// let display = MessageDisplay::LOG_LEVEL | MessageDisplay::MESSAGE;
/// assert!(display.contains(MessageDisplay::MESSAGE));
/// assert!(!display.contains(MessageDisplay::DEFAULT));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageDisplay(u16);

impl MessageDisplay {
    /// The fixed pattern `[level][module][timestamp][thread]{context} message`.
    pub const DEFAULT: MessageDisplay = MessageDisplay(1);
    /// The level in brackets.
    pub const LOG_LEVEL: MessageDisplay = MessageDisplay(1 << 1);
    /// The module name in brackets.
    pub const MODULE_NAME: MessageDisplay = MessageDisplay(1 << 2);
    /// The timestamp in brackets.
    pub const DATE_TIME: MessageDisplay = MessageDisplay(1 << 3);
    /// The thread identifier in brackets.
    pub const THREAD_ID: MessageDisplay = MessageDisplay(1 << 4);
    /// The source file, part of the context block.
    pub const FILE: MessageDisplay = MessageDisplay(1 << 5);
    /// The source line, shown together with [`FILE`](Self::FILE).
    pub const LINE: MessageDisplay = MessageDisplay(1 << 6);
    /// The function name, shown together with [`FILE`](Self::FILE).
    pub const FUNCTION: MessageDisplay = MessageDisplay(1 << 7);
    /// The message text.
    pub const MESSAGE: MessageDisplay = MessageDisplay(1 << 8);

    /// A set with no flags.
    pub const fn empty() -> Self {
        MessageDisplay(0)
    }

    /// Every field, in the composed (non-default) form.
    pub const fn full() -> Self {
        MessageDisplay(0b1_1111_1110)
    }

    /// Whether all flags of `other` are set in `self`.
    pub const fn contains(&self, other: MessageDisplay) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl Default for MessageDisplay {
    fn default() -> Self {
        MessageDisplay::DEFAULT
    }
}

impl BitOr for MessageDisplay {
    type Output = MessageDisplay;

    fn bitor(self, rhs: MessageDisplay) -> MessageDisplay {
        MessageDisplay(self.0 | rhs.0)
    }
}

impl BitOrAssign for MessageDisplay {
    fn bitor_assign(&mut self, rhs: MessageDisplay) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for MessageDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(MessageDisplay, &str); 9] = [
            (MessageDisplay::DEFAULT, "DEFAULT"),
            (MessageDisplay::LOG_LEVEL, "LOG_LEVEL"),
            (MessageDisplay::MODULE_NAME, "MODULE_NAME"),
            (MessageDisplay::DATE_TIME, "DATE_TIME"),
            (MessageDisplay::THREAD_ID, "THREAD_ID"),
            (MessageDisplay::FILE, "FILE"),
            (MessageDisplay::LINE, "LINE"),
            (MessageDisplay::FUNCTION, "FUNCTION"),
            (MessageDisplay::MESSAGE, "MESSAGE"),
        ];

        let names = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>();
        write!(f, "MessageDisplay({})", names.join(" | "))
    }
}
