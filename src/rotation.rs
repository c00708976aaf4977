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
use std::io;
use std::num::NonZeroU64;
use std::path::Path;
use std::path::PathBuf;

use jiff::Zoned;
use jiff::civil::Date;

use crate::Error;
use crate::clock::Clock;

/// Upper bound of the `(n)` candidates probed when looking for a free file name.
const MAX_SEQUENCE: u32 = 10_000;

/// How a file renamed by the size threshold is told apart from its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileSuffix {
    /// Append the rename time, as in `app_10_08_24__17_12_52.log`.
    #[default]
    DateTime,
    /// Append the first free sequence number, as in `app(3).log`.
    SequentialNumber,
}

/// A rename performed by [`RotationPolicy::rotate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rollover {
    /// The calendar day changed; eligible for archiving.
    Daily(PathBuf),
    /// The size threshold was reached.
    Size(PathBuf),
}

impl Rollover {
    pub(crate) fn path(&self) -> &Path {
        match self {
            Rollover::Daily(path) | Rollover::Size(path) => path,
        }
    }
}

/// Decides before each drain cycle whether the destination must be renamed.
#[derive(Debug)]
pub(crate) struct RotationPolicy {
    destination: PathBuf,
    current_date: Date,
    max_file_size: Option<NonZeroU64>,
    file_suffix: FileSuffix,
    clock: Clock,
    #[cfg(test)]
    pub(crate) rename_faults: std::sync::Arc<std::sync::atomic::AtomicU32>,
}

impl RotationPolicy {
    pub(crate) fn new(
        destination: PathBuf,
        max_file_size: Option<NonZeroU64>,
        file_suffix: FileSuffix,
        clock: Clock,
    ) -> Self {
        let current_date = fs::metadata(&destination)
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|mtime| Zoned::try_from(mtime).ok())
            .map(|mtime| mtime.date())
            .unwrap_or_else(|| clock.now().date());

        Self {
            destination,
            current_date,
            max_file_size,
            file_suffix,
            clock,
            #[cfg(test)]
            rename_faults: Default::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn current_date(&self) -> Date {
        self.current_date
    }

    pub(crate) fn now(&self) -> Zoned {
        self.clock.now()
    }

    /// Rename the destination if the day changed, or else if it grew past the size threshold.
    ///
    /// On failure the destination is left in place and the current date is kept, so the next
    /// call tries again.
    pub(crate) fn rotate(&mut self) -> Result<Option<Rollover>, Error> {
        let now = self.clock.now();
        let today = now.date();

        if self.current_date != today {
            if !self.destination.exists() {
                // nothing was written on the previous day
                self.current_date = today;
                return Ok(None);
            }

            let suffix = self.current_date.strftime("%Y_%m_%d").to_string();
            let dated = suffixed_path(&self.destination, &suffix);
            let renamed = if dated.exists() {
                free_sequential_path(&dated)?
            } else {
                dated
            };
            self.rename(&renamed)?;
            self.current_date = today;
            return Ok(Some(Rollover::Daily(renamed)));
        }

        let Some(max_file_size) = self.max_file_size else {
            return Ok(None);
        };

        let size = match fs::metadata(&self.destination) {
            Ok(metadata) => metadata.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::new("failed to read log file size")
                    .with_context("path", self.destination.display())
                    .with_source(err));
            }
        };
        if size < max_file_size.get() {
            return Ok(None);
        }

        let renamed = match self.file_suffix {
            FileSuffix::DateTime => {
                let suffix = now.strftime("%d_%m_%y__%H_%M_%S").to_string();
                let dated = suffixed_path(&self.destination, &suffix);
                if dated.exists() {
                    free_sequential_path(&dated)?
                } else {
                    dated
                }
            }
            FileSuffix::SequentialNumber => free_sequential_path(&self.destination)?,
        };
        self.rename(&renamed)?;
        Ok(Some(Rollover::Size(renamed)))
    }

    fn rename(&self, to: &Path) -> Result<(), Error> {
        #[cfg(test)]
        {
            use std::sync::atomic::Ordering;
            let injected = self
                .rename_faults
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if injected.is_ok() {
                let err = io::Error::other("injected rename failure");
                return Err(rename_error(&self.destination, to, err));
            }
        }

        rename(&self.destination, to)
    }
}

fn rename(from: &Path, to: &Path) -> Result<(), Error> {
    fs::rename(from, to).map_err(|err| rename_error(from, to, err))
}

fn rename_error(from: &Path, to: &Path, err: io::Error) -> Error {
    Error::new("failed to rotate log")
        .with_context("from", from.display())
        .with_context("to", to.display())
        .with_source(err)
}

fn split_name(path: &Path) -> (String, Option<String>) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned());
    (stem, extension)
}

fn with_name(path: &Path, stem: &str, extension: Option<&str>) -> PathBuf {
    let filename = match extension {
        Some(extension) => format!("{stem}.{extension}"),
        None => stem.to_string(),
    };
    path.with_file_name(filename)
}

/// Insert `_<suffix>` between the file stem and the extension.
pub(crate) fn suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let (stem, extension) = split_name(path);
    with_name(path, &format!("{stem}_{suffix}"), extension.as_deref())
}

/// The first `<stem>(n).<ext>` sibling of `path` that does not exist yet.
pub(crate) fn free_sequential_path(path: &Path) -> Result<PathBuf, Error> {
    let (stem, extension) = split_name(path);
    for n in 1..=MAX_SEQUENCE {
        let candidate = with_name(path, &format!("{stem}({n})"), extension.as_deref());
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(Error::new("no free file name for rotated log")
        .with_context("path", path.display())
        .with_context("tried", MAX_SEQUENCE))
}
