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

//! Archivers compress log files after a daily rotation.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use wait_timeout::ChildExt;

use crate::Error;

/// An archiver invoked on a freshly rotated log file.
///
/// Archiving is best effort. A failed or timed out run never undoes the rotation, the renamed
/// file simply stays on disk uncompressed.
pub trait Archive: fmt::Debug + Send + Sync + 'static {
    /// Compress the file at `path`, blocking until done or timed out.
    ///
    /// Returns an error only if the archiver could not be started at all.
    fn archive(&self, path: &Path) -> Result<ArchiveReport, Error>;
}

impl<T: Archive> From<T> for Box<dyn Archive> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

/// Outcome of one archiver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    source: PathBuf,
    archive: PathBuf,
    finished: bool,
    exit_code: Option<i32>,
    elapsed: Duration,
}

impl ArchiveReport {
    /// Create a report.
    ///
    /// `exit_code` is `None` if the process did not finish or was killed by a signal.
    pub fn new(
        source: impl Into<PathBuf>,
        archive: impl Into<PathBuf>,
        finished: bool,
        exit_code: Option<i32>,
        elapsed: Duration,
    ) -> Self {
        Self {
            source: source.into(),
            archive: archive.into(),
            finished,
            exit_code,
            elapsed,
        }
    }

    /// The rotated file that was archived.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The archive the compressor was asked to produce.
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Whether the process finished before the timeout.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Whether the process finished without an exit code, i.e. it crashed.
    pub fn crashed(&self) -> bool {
        self.finished && self.exit_code.is_none()
    }

    /// The exit code of the process, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Wall-clock duration of the run.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whether the run finished and exited with code zero.
    pub fn success(&self) -> bool {
        self.finished && self.exit_code == Some(0)
    }
}

impl fmt::Display for ArchiveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let finished = if self.finished { "yes" } else { "no" };
        let exit = match (self.finished, self.exit_code) {
            (false, _) => "the process timed out".to_string(),
            (true, None) => "the process crashed".to_string(),
            (true, Some(code)) => format!("the process exited with code {code}"),
        };
        write!(
            f,
            "{} to archive: {}. finished: {finished}, {exit}. elapsed: {}ms",
            self.source.display(),
            self.archive.display(),
            self.elapsed.as_millis()
        )
    }
}

/// Compress rotated logs with an external 7-Zip executable.
///
/// The command line is `<program> a -t7z -mx9 <archive> <path>`, where `<archive>` is `<path>`
/// with its extension replaced by `7z`. Output of the compressor is discarded.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use logforth_batch::archive::SevenZip;
///
/// let archiver = SevenZip::new("/usr/bin/7z").timeout(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct SevenZip {
    program: PathBuf,
    timeout: Duration,
}

impl Default for SevenZip {
    fn default() -> Self {
        Self::new("7z")
    }
}

impl SevenZip {
    /// Default time an archiver run may take before it is killed.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

    /// Create an archiver that runs `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set the time limit of one run.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The archive produced for `path`: same location, extension replaced by `7z`.
pub fn archive_name(path: &Path) -> PathBuf {
    path.with_extension("7z")
}

impl Archive for SevenZip {
    fn archive(&self, path: &Path) -> Result<ArchiveReport, Error> {
        let archive = archive_name(path);
        let start = Instant::now();

        let mut child = Command::new(&self.program)
            .args(["a", "-t7z", "-mx9"])
            .arg(&archive)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                Error::new("failed to start archiver")
                    .with_context("program", self.program.display())
                    .with_source(err)
            })?;

        let status = child
            .wait_timeout(self.timeout)
            .map_err(|err| Error::new("failed to wait for archiver").with_source(err))?;

        let (finished, exit_code) = match status {
            Some(status) => (true, status.code()),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                (false, None)
            }
        };

        Ok(ArchiveReport::new(
            path,
            archive,
            finished,
            exit_code,
            start.elapsed(),
        ))
    }
}
