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

use std::io::BufWriter;
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;

use crate::Error;
use crate::Trap;
use crate::trap::DefaultTrap;

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(8 * 1024).unwrap();
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// A line-oriented buffered writer whose underlying handle can be swapped while in use.
///
/// Records are appended to an in-process buffer and written to the handle when the buffer
/// fills up, when [`flush`](Self::flush) is called, and periodically by a background
/// thread. Every record is terminated by a newline.
///
/// All operations are serialized by one lock, so a record is never split across two
/// handles by a concurrent [`rotate`](Self::rotate).
#[derive(Debug)]
pub struct BufferedWriter<W: Write + Send + 'static> {
    shared: Arc<Shared<W>>,
    flusher: Mutex<Option<Flusher>>,
}

#[derive(Debug)]
struct Shared<W: Write + Send + 'static> {
    // `None` once closed
    writer: Mutex<Option<BufWriter<W>>>,
    trap: Arc<dyn Trap>,
}

#[derive(Debug)]
struct Flusher {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl<W: Write + Send + 'static> Shared<W> {
    fn writer(&self) -> MutexGuard<'_, Option<BufWriter<W>>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush_if_open(&self) -> Result<(), Error> {
        match self.writer().as_mut() {
            Some(writer) => writer.flush().map_err(Error::from_io_error),
            None => Ok(()),
        }
    }

    fn run_flusher(&self, interval: Duration, shutdown: Receiver<()>) {
        let ticker = crossbeam_channel::tick(interval);
        loop {
            crossbeam_channel::select! {
                recv(ticker) -> _ => {
                    if let Err(err) = self.flush_if_open() {
                        let err = Error::new("failed to flush buffered records").with_source(err);
                        self.trap.trap(&err);
                    }
                }
                recv(shutdown) -> _ => {
                    if let Err(err) = self.flush_if_open() {
                        let err = Error::new("failed to flush buffered records on shutdown")
                            .with_source(err);
                        self.trap.trap(&err);
                    }
                    return;
                }
            }
        }
    }
}

impl<W: Write + Send + 'static> BufferedWriter<W> {
    /// Creates a new [`BufferedWriterBuilder`].
    ///
    /// # Examples
    ///
    /// ```
    /// use logroll::file::BufferedWriter;
    ///
    /// let writer = BufferedWriter::<Vec<u8>>::builder().build(Vec::new()).unwrap();
    /// assert_eq!(writer.write(b"hello").unwrap(), 6);
    /// writer.close().unwrap();
    /// ```
    #[must_use]
    pub fn builder() -> BufferedWriterBuilder {
        BufferedWriterBuilder::new()
    }

    fn writer(&self) -> MutexGuard<'_, Option<BufWriter<W>>> {
        self.shared.writer()
    }

    /// Append one record, adding a trailing newline if the record lacks one.
    ///
    /// Returns the number of bytes accepted, including the added newline.
    ///
    /// # Panics
    ///
    /// Panics if the writer has been closed.
    pub fn write(&self, record: &[u8]) -> Result<usize, Error> {
        let mut guard = self.writer();
        let Some(writer) = guard.as_mut() else {
            panic!("write to a closed buffered writer");
        };

        let needs_newline = record.last() != Some(&b'\n');
        let len = record.len() + usize::from(needs_newline);

        if writer.buffer().len() + len > writer.capacity() {
            writer.flush().map_err(Error::from_io_error)?;
        }
        writer.write_all(record).map_err(Error::from_io_error)?;
        if needs_newline {
            writer.write_all(b"\n").map_err(Error::from_io_error)?;
        }
        Ok(len)
    }

    /// Write all buffered bytes to the current handle.
    ///
    /// # Panics
    ///
    /// Panics if the writer has been closed.
    pub fn flush(&self) -> Result<(), Error> {
        let mut guard = self.writer();
        let Some(writer) = guard.as_mut() else {
            panic!("flush of a closed buffered writer");
        };
        writer.flush().map_err(Error::from_io_error)
    }

    /// Flush the buffer into the current handle, then switch to `handle`.
    ///
    /// Returns the previous handle. If flushing fails, the error is returned, the buffered
    /// bytes are kept and the current handle stays in place.
    ///
    /// # Panics
    ///
    /// Panics if the writer has been closed.
    pub fn rotate(&self, handle: W) -> Result<W, Error> {
        let mut guard = self.writer();
        let Some(writer) = guard.as_mut() else {
            panic!("rotate of a closed buffered writer");
        };
        writer.flush().map_err(|err| {
            Error::new("failed to flush buffered records before rotation").with_source(err)
        })?;
        Ok(std::mem::replace(writer.get_mut(), handle))
    }

    /// Stop the background flush thread, flush the remaining bytes and release the handle.
    ///
    /// # Panics
    ///
    /// Panics if the writer has already been closed.
    pub fn close(&self) -> Result<(), Error> {
        let flusher = self.flusher.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(Flusher { shutdown, handle }) = flusher else {
            panic!("buffered writer closed twice");
        };

        // a disconnected channel is the shutdown signal
        drop(shutdown);
        let joined = handle
            .join()
            .map_err(|_| Error::new("buffered writer flush thread panicked"));

        let writer = self.writer().take();
        let released = match writer {
            Some(writer) => writer.into_inner().map(drop).map_err(|err| {
                Error::new("failed to flush buffered records on close").with_source(err.into_error())
            }),
            None => Ok(()),
        };

        joined.and(released)
    }
}

impl<W: Write + Send + 'static> Drop for BufferedWriter<W> {
    fn drop(&mut self) {
        let flusher = self.flusher.get_mut().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(Flusher { shutdown, handle }) = flusher {
            drop(shutdown);
            let _ = handle.join();
        }

        if let Some(mut writer) = self.writer().take() {
            if let Err(err) = writer.flush() {
                let err = Error::new("failed to flush buffered writer on drop").with_source(err);
                self.shared.trap.trap(&err);
            }
        }
    }
}

/// A builder for configuring [`BufferedWriter`].
#[derive(Debug)]
pub struct BufferedWriterBuilder {
    capacity: NonZeroUsize,
    flush_interval: Duration,
    thread_name: String,
    trap: Arc<dyn Trap>,
}

impl Default for BufferedWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferedWriterBuilder {
    /// Creates a new [`BufferedWriterBuilder`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            thread_name: "logroll-flush".to_string(),
            trap: Arc::new(DefaultTrap::default()),
        }
    }

    /// Set the buffer capacity in bytes.
    ///
    /// Default to 8 KiB.
    #[must_use]
    pub fn capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the interval of the background flush.
    ///
    /// The interval must not be zero, otherwise [`build`](Self::build) fails.
    ///
    /// Default to 5 seconds.
    #[must_use]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the name of the background flush thread.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the trap receiving errors of the background flush.
    ///
    /// Default to [`DefaultTrap`].
    #[must_use]
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = Arc::from(trap.into());
        self
    }

    pub(crate) fn shared_trap(mut self, trap: Arc<dyn Trap>) -> Self {
        self.trap = trap;
        self
    }

    /// Builds the [`BufferedWriter`] over `handle` and starts its background flush thread.
    ///
    /// # Errors
    ///
    /// Return an error if either:
    ///
    /// * The flush interval is zero.
    /// * The background thread cannot be spawned.
    pub fn build<W: Write + Send + 'static>(self, handle: W) -> Result<BufferedWriter<W>, Error> {
        let Self {
            capacity,
            flush_interval,
            thread_name,
            trap,
        } = self;

        check_flush_interval(flush_interval)?;

        let shared = Arc::new(Shared {
            writer: Mutex::new(Some(BufWriter::with_capacity(capacity.get(), handle))),
            trap,
        });

        let (shutdown, shutdown_receiver) = crossbeam_channel::bounded(0);
        let handle = {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name(thread_name)
                .spawn(move || shared.run_flusher(flush_interval, shutdown_receiver))
                .map_err(|err| Error::new("failed to spawn flush thread").with_source(err))?
        };

        Ok(BufferedWriter {
            shared,
            flusher: Mutex::new(Some(Flusher { shutdown, handle })),
        })
    }
}

pub(crate) fn check_flush_interval(interval: Duration) -> Result<(), Error> {
    if interval.is_zero() {
        return Err(Error::new("flush interval must be greater than zero")
            .with_context("interval", format!("{interval:?}")));
    }
    Ok(())
}
