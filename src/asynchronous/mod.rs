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

//! A sink decorator delivering records on a dedicated thread.
//!
//! # Example
//!
//! ```
//! use logroll::Sink;
//! use logroll::asynchronous::AsyncBuilder;
//! use logroll::sink::Memory;
//!
//! let memory = Memory::default();
//! let sink = AsyncBuilder::new("logroll-async")
//!     .overflow_drop_incoming()
//!     .build(memory.clone());
//!
//! sink.write(b"delivered by the worker thread\n").unwrap();
//! sink.flush().unwrap();
//! assert_eq!(memory.contents(), "delivered by the worker thread\n");
//!
//! sink.close().unwrap();
//! ```

use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;

use crate::Error;

mod sink;
mod state;
mod worker;

pub use self::sink::Async;
pub use self::sink::AsyncBuilder;
pub use self::sink::Overflow;

pub(crate) enum Task {
    Record(Vec<u8>),
    Flush(oneshot::Sender<Result<(), Error>>),
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    // admitted to the queue but not yet written
    pub(crate) pending: AtomicUsize,
    pub(crate) dropped: AtomicU64,
}
