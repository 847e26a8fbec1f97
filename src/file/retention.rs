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
use std::num::NonZeroUsize;
use std::path::Path;
use std::path::PathBuf;

use jiff::civil::DateTime;

use crate::Error;
use crate::file::rotation::parse_timestamp;

/// Deletes old rotated files so that at most a fixed number remain.
///
/// Rotated files are those next to the base path whose name is the base name followed by a
/// dot and a suffix. The suffix is parsed as a rotation timestamp. Files with a suffix that
/// does not parse are considered the oldest and are deleted first.
///
/// # Examples
///
/// ```no_run
/// use std::num::NonZeroUsize;
///
/// use logroll::file::Retention;
///
/// let retention = Retention::new("/var/log/app.log", NonZeroUsize::new(7).unwrap());
/// let deleted = retention.apply().unwrap();
/// println!("deleted {deleted} old log files");
/// ```
#[derive(Debug, Clone)]
pub struct Retention {
    base: PathBuf,
    max_files: NonZeroUsize,
}

#[derive(Debug)]
struct LogFile {
    filepath: PathBuf,
    datetime: DateTime,
}

// newest first; ties broken by name so the order is stable
fn newest_first(a: &LogFile, b: &LogFile) -> std::cmp::Ordering {
    b.datetime
        .cmp(&a.datetime)
        .then_with(|| b.filepath.cmp(&a.filepath))
}

impl Retention {
    /// Keep at most `max_files` rotated files of `base`.
    pub fn new(base: impl Into<PathBuf>, max_files: NonZeroUsize) -> Self {
        Self {
            base: base.into(),
            max_files,
        }
    }

    /// Delete the rotated files beyond the limit, returning how many were deleted.
    ///
    /// A failure to delete one file does not stop the others from being deleted; the first
    /// failure is returned once all have been attempted.
    pub fn apply(&self) -> Result<usize, Error> {
        let mut files = self.list_logfiles()?;
        if files.len() <= self.max_files.get() {
            return Ok(0);
        }

        files.sort_by(newest_first);

        let mut deleted = 0;
        let mut first_err = None;
        for file in files.iter().skip(self.max_files.get()) {
            match fs::remove_file(&file.filepath) {
                Ok(()) => deleted += 1,
                // someone else got there first
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(Error::from_path_io(
                            "failed to remove old log",
                            &file.filepath,
                            err,
                        ));
                    }
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(deleted),
        }
    }

    fn list_logfiles(&self) -> Result<Vec<LogFile>, Error> {
        let (dir, prefix) = split_base(&self.base)?;

        let read_dir = fs::read_dir(dir)
            .map_err(|err| Error::from_path_io("failed to read log dir", dir, err))?;

        let files = read_dir
            .filter_map(|entry| {
                let entry = entry.ok()?;

                // the sink only creates regular files; never touch the symlink or directories
                if !entry.file_type().ok()?.is_file() {
                    return None;
                }

                let filename = entry.file_name();
                // if the filename is not a UTF-8 string, skip it.
                let filename = filename.to_str()?;
                let suffix = filename.strip_prefix(&prefix)?;
                let timestamp = suffix.rsplit('.').next().unwrap_or(suffix);
                let datetime = parse_timestamp(timestamp).unwrap_or(DateTime::MIN);

                Some(LogFile {
                    filepath: entry.path(),
                    datetime,
                })
            })
            .collect();

        Ok(files)
    }
}

/// Split a base path into its directory and the `"<name>."` prefix of its rotated files.
fn split_base(base: &Path) -> Result<(&Path, String), Error> {
    let name = base
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::new("log base path must end with a UTF-8 file name")
                .with_context("path", base.display())
        })?;
    let dir = match base.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Ok((dir, format!("{name}.")))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), name).unwrap();
    }

    fn remaining(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn test_keeps_the_most_recent_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for hour in ["03", "00", "05", "01", "04", "02"] {
            touch(dir, &format!("app.log.2024-08-10_{hour}"));
        }

        let retention = Retention::new(dir.join("app.log"), NonZeroUsize::new(3).unwrap());
        assert_eq!(retention.apply().unwrap(), 3);
        assert_eq!(
            remaining(dir),
            [
                "app.log.2024-08-10_03",
                "app.log.2024-08-10_04",
                "app.log.2024-08-10_05"
            ]
        );

        // already within the limit
        assert_eq!(retention.apply().unwrap(), 0);
    }

    #[test]
    fn test_orders_by_timestamp_not_by_name() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "app.log.2023-12-31_23");
        touch(dir, "app.log.2024-01-01_00");
        touch(dir, "app.log.2024-01-01_09");

        let retention = Retention::new(dir.join("app.log"), NonZeroUsize::new(1).unwrap());
        assert_eq!(retention.apply().unwrap(), 2);
        assert_eq!(remaining(dir), ["app.log.2024-01-01_09"]);
    }

    #[test]
    fn test_malformed_suffixes_are_pruned_first() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "app.log.2024-08-10_00");
        touch(dir, "app.log.2024-08-11_00");
        touch(dir, "app.log.bak");
        touch(dir, "app.log.not-a-date");

        let retention = Retention::new(dir.join("app.log"), NonZeroUsize::new(2).unwrap());
        assert_eq!(retention.apply().unwrap(), 2);
        assert_eq!(
            remaining(dir),
            ["app.log.2024-08-10_00", "app.log.2024-08-11_00"]
        );
    }

    #[test]
    fn test_ignores_unrelated_files_and_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "app.log.2024-08-10_00");
        touch(dir, "app.log.2024-08-10_01");
        touch(dir, "app.log.2024-08-10_02");
        touch(dir, "other.log.2024-08-10_00");
        touch(dir, "app.logfile");
        fs::create_dir(dir.join("app.log.2020-01-01_00")).unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink("app.log.2024-08-10_02", dir.join("app.log")).unwrap();

        let retention = Retention::new(dir.join("app.log"), NonZeroUsize::new(1).unwrap());
        assert_eq!(retention.apply().unwrap(), 2);

        let left = remaining(dir);
        assert!(left.contains(&"app.log.2024-08-10_02".to_string()));
        assert!(left.contains(&"other.log.2024-08-10_00".to_string()));
        assert!(left.contains(&"app.logfile".to_string()));
        assert!(left.contains(&"app.log.2020-01-01_00".to_string()));
        assert!(!left.contains(&"app.log.2024-08-10_00".to_string()));
        assert!(!left.contains(&"app.log.2024-08-10_01".to_string()));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("missing").join("app.log");

        let retention = Retention::new(base, NonZeroUsize::new(1).unwrap());
        let err = retention.apply().unwrap_err();
        assert!(err.to_string().contains("failed to read log dir"), "{err}");
    }
}
