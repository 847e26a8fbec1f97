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

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crossbeam_channel::Receiver;

use crate::Error;
use crate::Sink;
use crate::Trap;
use crate::asynchronous::Counters;
use crate::asynchronous::Task;

pub(crate) struct Worker {
    receiver: Receiver<Task>,
    sink: Arc<dyn Sink>,
    counters: Arc<Counters>,
    trap: Arc<dyn Trap>,
}

impl Worker {
    pub(crate) fn new(
        receiver: Receiver<Task>,
        sink: Arc<dyn Sink>,
        counters: Arc<Counters>,
        trap: Arc<dyn Trap>,
    ) -> Self {
        Self {
            receiver,
            sink,
            counters,
            trap,
        }
    }

    /// Serve tasks in queue order until every sender is gone and the queue is empty.
    ///
    /// A flush is served only after every record queued before it was written.
    pub(crate) fn run(self) {
        let Self {
            receiver,
            sink,
            counters,
            trap,
        } = self;

        while let Ok(task) = receiver.recv() {
            match task {
                Task::Record(record) => {
                    if let Err(err) = catch_panic(|| sink.write(&record)) {
                        let err = Error::new("failed to write record").with_source(err);
                        trap.trap(&err);
                    }
                    counters.pending.fetch_sub(1, Ordering::SeqCst);
                }
                Task::Flush(done) => {
                    let result = catch_panic(|| sink.flush())
                        .map_err(|err| Error::new("failed to flush").with_source(err));
                    // the caller may have given up waiting
                    let _ = done.send(result);
                }
            }
        }
    }
}

/// Run one sink call, turning a panic into an error so the worker keeps serving the queue.
fn catch_panic(f: impl FnOnce() -> Result<(), Error>) -> Result<(), Error> {
    std::panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(Error::new("sink panicked").with_context("panic", panic_message(&*payload)))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic payload"
    }
}
