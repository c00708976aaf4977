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

use std::fmt;
use std::io;

/// The error of a batch writer.
///
/// Only construction returns it. Failures on the worker thread are handed to a
/// [`Trap`](crate::Trap) instead, since callers of
/// [`BatchWriter::enqueue`](crate::BatchWriter::enqueue) never see errors.
pub struct Error {
    message: String,
    context: Vec<(&'static str, String)>,
    sources: Vec<anyhow::Error>,
}

impl Error {
    /// Create an error with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: vec![],
            sources: vec![],
        }
    }

    /// Attach a key-value pair describing where the error happened.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub(crate) fn from_io_error(err: io::Error) -> Error {
        Error::new("failed to write log file").with_source(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;

        let mut pairs = self.context.iter();
        if let Some((key, value)) = pairs.next() {
            write!(f, ", context: {{ {key}: {value}")?;
            for (key, value) in pairs {
                write!(f, ", {key}: {value}")?;
            }
            f.write_str(" }")?;
        }

        let mut sources = self.sources.iter();
        if let Some(source) = sources.next() {
            write!(f, ", sources: [{source}")?;
            for source in sources {
                write!(f, ", {source}")?;
            }
            f.write_str("]")?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f
                .debug_struct("Error")
                .field("message", &self.message)
                .field("context", &self.context)
                .field("sources", &self.sources)
                .finish();
        }

        writeln!(f, "{}", self.message)?;
        for (key, value) in &self.context {
            writeln!(f, "    {key}: {value}")?;
        }
        for source in &self.sources {
            writeln!(f, "    caused by: {source:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.sources.first().map(|source| source.as_ref())
    }
}
