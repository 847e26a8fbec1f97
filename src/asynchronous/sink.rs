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

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::Error;
use crate::Sink;
use crate::Trap;
use crate::asynchronous::Counters;
use crate::asynchronous::state::AsyncState;
use crate::asynchronous::worker::Worker;
use crate::trap::DefaultTrap;

const DEFAULT_QUEUE_CAPACITY: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

/// A sink that hands records to a dedicated thread which writes them to an inner sink.
///
/// Writes never report failures of the inner sink; those go to the configured [`Trap`].
/// Records written by one thread reach the inner sink in the order they were written.
///
/// [`flush`](Sink::flush) waits until every record written before it has reached the inner
/// sink, then flushes the inner sink. [`close`](Sink::close) waits until every accepted
/// record has been delivered, then closes the inner sink.
///
/// Writing to, flushing or closing an `Async` after it was closed panics. So does closing
/// it while another thread is still writing.
#[derive(Debug)]
pub struct Async {
    sink: Arc<dyn Sink>,
    overflow: Overflow,
    counters: Arc<Counters>,
    state: AsyncState,
}

impl Async {
    /// The number of records accepted but not yet written to the inner sink.
    pub fn pending(&self) -> usize {
        self.counters.pending.load(Ordering::SeqCst)
    }

    /// The number of records discarded because the queue was full.
    ///
    /// Always zero with [`Overflow::Block`].
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::SeqCst)
    }
}

impl Sink for Async {
    fn write(&self, record: &[u8]) -> Result<(), Error> {
        self.state.send_record(record.to_vec(), self.overflow)
    }

    fn flush(&self) -> Result<(), Error> {
        self.state.flush()
    }

    fn close(&self) -> Result<(), Error> {
        let drained = self.state.close();
        let closed = self.sink.close();
        drained.and(closed)
    }
}

/// A builder for configuring an [`Async`] sink.
pub struct AsyncBuilder {
    thread_name: String,
    queue_capacity: NonZeroUsize,
    trap: Box<dyn Trap>,
    overflow: Overflow,
}

impl AsyncBuilder {
    /// Create a new async sink builder.
    pub fn new(thread_name: impl Into<String>) -> AsyncBuilder {
        AsyncBuilder {
            thread_name: thread_name.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            trap: Box::new(DefaultTrap::default()),
            overflow: Overflow::Block,
        }
    }

    /// Set the number of records that can wait in the queue.
    ///
    /// Default to 1024.
    pub fn queue_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the overflow policy.
    pub fn overflow(mut self, overflow: Overflow) -> Self {
        self.overflow = overflow;
        self
    }

    /// Set the overflow policy to block when the queue is full.
    ///
    /// This is the default.
    pub fn overflow_block(self) -> Self {
        self.overflow(Overflow::Block)
    }

    /// Set the overflow policy to drop incoming records when the queue is full.
    pub fn overflow_drop_incoming(self) -> Self {
        self.overflow(Overflow::DropIncoming)
    }

    /// Set the trap receiving errors of the inner sink.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    /// Build the async sink around `sink` and start its worker thread.
    pub fn build(self, sink: impl Into<Box<dyn Sink>>) -> Async {
        let Self {
            thread_name,
            queue_capacity,
            trap,
            overflow,
        } = self;

        let sink: Arc<dyn Sink> = Arc::from(sink.into());
        let counters = Arc::new(Counters::default());
        let (sender, receiver) = crossbeam_channel::bounded(queue_capacity.get());

        let trap: Arc<dyn Trap> = Arc::from(trap);
        let worker = Worker::new(receiver, sink.clone(), counters.clone(), trap.clone());
        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || worker.run())
            .expect("failed to spawn async sink thread");
        let state = AsyncState::new(sender, handle, counters.clone(), trap);

        Async {
            sink,
            overflow,
            counters,
            state,
        }
    }
}

/// Overflow policy for [`Async`].
///
/// When the queue is full, an incoming record is handled according to the specified policy.
/// Flush requests always wait for room in the queue.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum Overflow {
    /// Blocks until the queue is not full.
    #[default]
    Block,
    /// Drops the incoming record.
    DropIncoming,
}
