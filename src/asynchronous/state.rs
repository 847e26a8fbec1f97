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

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;

use arc_swap::ArcSwapOption;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;

use crate::Error;
use crate::Trap;
use crate::asynchronous::Counters;
use crate::asynchronous::Overflow;
use crate::asynchronous::Task;

#[derive(Debug)]
pub(crate) struct AsyncState {
    state: ArcSwapOption<State>,
    counters: Arc<Counters>,
    trap: Arc<dyn Trap>,
}

#[derive(Debug)]
struct State {
    sender: Sender<Task>,
    handle: JoinHandle<()>,
}

impl AsyncState {
    pub(crate) fn new(
        sender: Sender<Task>,
        handle: JoinHandle<()>,
        counters: Arc<Counters>,
        trap: Arc<dyn Trap>,
    ) -> Self {
        let state = State { sender, handle };
        Self {
            state: ArcSwapOption::from(Some(Arc::new(state))),
            counters,
            trap,
        }
    }

    pub(crate) fn send_record(&self, record: Vec<u8>, overflow: Overflow) -> Result<(), Error> {
        let state = self.state.load();
        let Some(state) = state.as_ref() else {
            panic!("write to a closed async sink");
        };

        // counted before sending, so the worker can never release a unit that was not taken
        self.counters.pending.fetch_add(1, Ordering::SeqCst);

        let task = Task::Record(record);
        let disconnected = match overflow {
            Overflow::Block => state.sender.send(task).is_err(),
            Overflow::DropIncoming => match state.sender.try_send(task) {
                Ok(()) => false,
                Err(TrySendError::Full(_)) => {
                    self.counters.pending.fetch_sub(1, Ordering::SeqCst);
                    self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                    false
                }
                Err(TrySendError::Disconnected(_)) => true,
            },
        };

        // the worker outlives every sender unless its thread died; the record is lost either way
        if disconnected {
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            let err = Error::new("async sink worker has terminated, record discarded");
            self.trap.trap(&err);
        }
        Ok(())
    }

    pub(crate) fn flush(&self) -> Result<(), Error> {
        let (done, result) = oneshot::channel();
        {
            let state = self.state.load();
            let Some(state) = state.as_ref() else {
                panic!("flush of a closed async sink");
            };
            state
                .sender
                .send(Task::Flush(done))
                .map_err(|_| Error::new("failed to send flush task to async sink"))?;
        }

        result
            .recv()
            .map_err(|_| Error::new("async sink worker terminated before flushing"))?
    }

    pub(crate) fn close(&self) -> Result<(), Error> {
        let Some(state) = self.state.swap(None) else {
            panic!("async sink closed twice");
        };
        let Some(State { sender, handle }) = Arc::into_inner(state) else {
            panic!("async sink closed while records are still being written");
        };

        // drop our sender, the worker breaks its loop once the queue is drained
        drop(sender);

        handle
            .join()
            .map_err(|_| Error::new("async sink worker thread panicked"))
    }
}

impl Drop for AsyncState {
    fn drop(&mut self) {
        if let Some(state) = self.state.swap(None)
            && let Some(State { sender, handle }) = Arc::into_inner(state)
        {
            drop(sender);
            let _ = handle.join();
        }
    }
}
