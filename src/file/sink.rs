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
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::num::NonZeroUsize;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::thread::JoinHandle;
use std::time::Duration;

use jiff::Zoned;

use crate::Error;
use crate::Sink;
use crate::Trap;
use crate::file::BufferedWriter;
use crate::file::Retention;
use crate::file::Rotation;
use crate::file::buffered::check_flush_interval;
use crate::file::clock::Clock;
use crate::file::rotation::Segment;
use crate::file::rotation::format_timestamp;
use crate::trap::DefaultTrap;

/// A builder to configure and create a [`FileSink`].
#[derive(Debug)]
pub struct FileSinkBuilder {
    path: PathBuf,
    rotation: Rotation,
    max_files: Option<NonZeroUsize>,
    buffer_capacity: Option<NonZeroUsize>,
    flush_interval: Option<Duration>,
    clock: Clock,
    trap: Box<dyn Trap>,
}

impl FileSinkBuilder {
    /// Create a new file sink builder.
    ///
    /// `path` is the stable name of the log: a symlink with this name always points at the
    /// file currently being written.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rotation: Rotation::Daily,
            max_files: None,
            buffer_capacity: None,
            flush_interval: None,
            clock: Clock::DefaultClock,
            trap: Box::new(DefaultTrap::default()),
        }
    }

    /// Set the rotation strategy to roll over log files daily at 00:00 in the local time zone.
    ///
    /// This is the default.
    pub fn rollover_daily(self) -> Self {
        self.rotation(Rotation::Daily)
    }

    /// Set the rotation strategy to roll over log files hourly.
    pub fn rollover_hourly(self) -> Self {
        self.rotation(Rotation::Hourly)
    }

    /// Set the rotation strategy.
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the maximum number of log files to keep.
    ///
    /// Default to keeping every file.
    pub fn max_log_files(mut self, n: NonZeroUsize) -> Self {
        self.max_files = Some(n);
        self
    }

    /// Set the capacity in bytes of the write buffer.
    ///
    /// Default to 8 KiB.
    pub fn buffer_capacity(mut self, n: NonZeroUsize) -> Self {
        self.buffer_capacity = Some(n);
        self
    }

    /// Set how often buffered records are flushed in the background.
    ///
    /// A zero interval is rejected by [`build`](Self::build).
    ///
    /// Default to 5 seconds.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Set the trap for errors that happen off the caller's path, such as rotation and
    /// cleanup failures.
    ///
    /// Default to [`DefaultTrap`].
    ///
    /// # Examples
    ///
    /// ```
    /// use logroll::file::FileSinkBuilder;
    /// use logroll::trap::DefaultTrap;
    ///
    /// let builder = FileSinkBuilder::new("logs/app.log");
    /// builder.trap(DefaultTrap::default());
    /// ```
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    #[cfg(test)]
    fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Build the [`FileSink`], opening the file for the current time window.
    ///
    /// # Errors
    ///
    /// Return an error if either:
    ///
    /// * The path is empty or does not end with a file name.
    /// * The flush interval is zero.
    /// * The log directory or the log file cannot be created.
    /// * The background flush thread cannot be spawned.
    pub fn build(self) -> Result<FileSink, Error> {
        let Self {
            path,
            rotation,
            max_files,
            buffer_capacity,
            flush_interval,
            clock,
            trap,
        } = self;

        if let Some(interval) = flush_interval {
            check_flush_interval(interval)?;
        }

        let base = std::path::absolute(&path)
            .map_err(|err| Error::from_path_io("failed to resolve log path", &path, err))?;
        if base.file_name().is_none() {
            return Err(Error::new("log path must end with a file name")
                .with_context("path", path.display()));
        }

        let trap: Arc<dyn Trap> = Arc::from(trap);
        let now = clock.now();
        let (current, file) = open_log_file(&base, &now)?;
        if let Err(err) = link_current(&base, &current) {
            trap.trap(&err);
        }

        let mut builder = BufferedWriter::<File>::builder()
            .thread_name("logroll-file-flush")
            .shared_trap(trap.clone());
        if let Some(n) = buffer_capacity {
            builder = builder.capacity(n);
        }
        if let Some(interval) = flush_interval {
            builder = builder.flush_interval(interval);
        }
        let writer = builder.build(file)?;

        let state = State {
            segment: rotation.segment(&now),
            current,
            clock,
            cleanups: vec![],
        };

        Ok(FileSink {
            base,
            rotation,
            max_files,
            writer,
            state: Mutex::new(state),
            trap,
        })
    }
}

/// A sink writing records to a file that is rotated on calendar boundaries.
///
/// Records go to `<path>.<YYYY-MM-DD_HH>`, the timestamp being the time the file was
/// opened. A symlink at `<path>` points at the file currently in use. When a record is
/// written in a new day (or hour, with [`Rotation::Hourly`]), a new file is opened and the
/// oldest files beyond [`max_log_files`](FileSinkBuilder::max_log_files) are deleted in
/// the background.
///
/// # Examples
///
/// ```no_run
/// use std::num::NonZeroUsize;
///
/// use logroll::Sink;
/// use logroll::file::FileSinkBuilder;
///
/// let sink = FileSinkBuilder::new("logs/app.log")
///     .rollover_hourly()
///     .max_log_files(NonZeroUsize::new(24).unwrap())
///     .build()
///     .unwrap();
///
/// sink.write(b"service started").unwrap();
/// sink.close().unwrap();
/// ```
#[derive(Debug)]
pub struct FileSink {
    base: PathBuf,
    rotation: Rotation,
    max_files: Option<NonZeroUsize>,
    writer: BufferedWriter<File>,
    state: Mutex<State>,
    trap: Arc<dyn Trap>,
}

#[derive(Debug)]
struct State {
    segment: Segment,
    current: PathBuf,
    clock: Clock,
    // retention threads not yet joined, oldest first
    cleanups: Vec<JoinHandle<()>>,
}

impl FileSink {
    /// The absolute path of the symlink pointing at the current file.
    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// The path of the file currently being written.
    pub fn current_path(&self) -> PathBuf {
        self.state().current.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn rollover_if_needed(&self) {
        let mut state = self.state();
        let now = state.clock.now();
        let segment = self.rotation.segment(&now);
        if segment == state.segment {
            return;
        }

        // on failure the segment is left untouched, so the next write retries
        if let Err(err) = self.rollover(&mut state, &now, segment) {
            let err = Error::new("failed to rotate log file").with_source(err);
            self.trap.trap(&err);
        }
    }

    fn rollover(&self, state: &mut State, now: &Zoned, segment: Segment) -> Result<(), Error> {
        let (current, file) = open_log_file(&self.base, now)?;
        drop(self.writer.rotate(file)?);

        if let Err(err) = link_current(&self.base, &current) {
            self.trap.trap(&err);
        }
        state.segment = segment;
        state.current = current;

        if let Some(max_files) = self.max_files {
            self.spawn_cleanup(state, Retention::new(self.base.clone(), max_files));
        }
        Ok(())
    }

    fn spawn_cleanup(&self, state: &mut State, retention: Retention) {
        let (finished, running) = std::mem::take(&mut state.cleanups)
            .into_iter()
            .partition::<Vec<_>, _>(|handle| handle.is_finished());
        state.cleanups = running;
        for handle in finished {
            if let Err(err) = join_cleanup(handle) {
                self.trap.trap(&err);
            }
        }

        let trap = self.trap.clone();
        let spawned = std::thread::Builder::new()
            .name("logroll-retention".to_string())
            .spawn(move || {
                if let Err(err) = retention.apply() {
                    let err = Error::new("failed to delete oldest logs").with_source(err);
                    trap.trap(&err);
                }
            });

        match spawned {
            Ok(handle) => state.cleanups.push(handle),
            Err(err) => {
                let err = Error::new("failed to spawn log cleanup thread").with_source(err);
                self.trap.trap(&err);
            }
        }
    }
}

impl Sink for FileSink {
    fn write(&self, record: &[u8]) -> Result<(), Error> {
        self.rollover_if_needed();
        self.writer.write(record)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        self.writer.flush()
    }

    fn close(&self) -> Result<(), Error> {
        let closed = self.writer.close();

        let cleanups = std::mem::take(&mut self.state().cleanups);
        let mut cleaned = Ok(());
        for handle in cleanups {
            let joined = join_cleanup(handle);
            if cleaned.is_ok() {
                cleaned = joined;
            }
        }

        closed.and(cleaned)
    }
}

fn join_cleanup(handle: JoinHandle<()>) -> Result<(), Error> {
    handle
        .join()
        .map_err(|_| Error::new("log cleanup thread panicked"))
}

fn timed_path(base: &Path, now: &Zoned) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(".");
    path.push(format_timestamp(now));
    PathBuf::from(path)
}

fn open_log_file(base: &Path, now: &Zoned) -> Result<(PathBuf, File), Error> {
    let path = timed_path(base, now);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|err| Error::from_path_io("failed to create log directory", dir, err))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| Error::from_path_io("failed to open log file", &path, err))?;
    Ok((path, file))
}

/// Point the symlink at `base` to the basename of `current`.
fn link_current(base: &Path, current: &Path) -> Result<(), Error> {
    match fs::symlink_metadata(base) {
        Ok(metadata) if metadata.file_type().is_symlink() => fs::remove_file(base)
            .map_err(|err| Error::from_path_io("failed to remove stale log symlink", base, err))?,
        Ok(_) => {
            return Err(Error::new("log path exists and is not a symlink")
                .with_context("path", base.display()));
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(Error::from_path_io("failed to inspect log symlink", base, err)),
    }

    let target = current.file_name().map(Path::new).unwrap_or(current);
    symlink(target, base)
        .map_err(|err| Error::from_path_io("failed to create log symlink", base, err))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_: &Path, _: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}
