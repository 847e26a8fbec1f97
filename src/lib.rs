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

//! Logroll delivers formatted log records to sinks without making the caller wait on I/O.
//!
//! # Overview
//!
//! Every destination implements [`Sink`]: it accepts a finished byte record, flushes and
//! closes. The crate provides:
//!
//! * [`file::FileSink`], which writes to a file rotated daily or hourly, keeps a stable
//!   symlink pointing at the current file and deletes old files beyond a retention limit.
//! * [`asynchronous::Async`], which wraps any sink and writes to it from a dedicated thread,
//!   either blocking or dropping records when its queue is full.
//! * [`sink::Stdout`], [`sink::Stderr`] and [`sink::Memory`] for consoles and tests.
//!
//! Errors that happen off the caller's path, such as a failed background flush, are
//! reported to a [`Trap`].
//!
//! # Examples
//!
//! A rotating file written from a background thread:
//!
//! ```
//! use std::num::NonZeroUsize;
//!
//! use logroll::Sink;
//! use logroll::asynchronous::AsyncBuilder;
//! use logroll::file::FileSinkBuilder;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let file = FileSinkBuilder::new(dir.path().join("app.log"))
//!     .rollover_hourly()
//!     .max_log_files(NonZeroUsize::new(48).unwrap())
//!     .build()
//!     .unwrap();
//!
//! let sink = AsyncBuilder::new("logroll-file").build(file);
//! sink.write(b"INFO service started").unwrap();
//! sink.flush().unwrap();
//!
//! assert_eq!(
//!     std::fs::read_to_string(dir.path().join("app.log")).unwrap(),
//!     "INFO service started\n"
//! );
//! sink.close().unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod asynchronous;
pub mod file;
pub mod sink;
pub mod trap;

mod error;

pub use self::error::Error;
pub use self::sink::Sink;
pub use self::trap::Trap;
