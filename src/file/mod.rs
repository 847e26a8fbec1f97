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

//! Sink for writing records to time-rotated files.
//!
//! # Example
//!
//!```
//! use std::num::NonZeroUsize;
//!
//! use logroll::Sink;
//! use logroll::file::FileSinkBuilder;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let sink = FileSinkBuilder::new(dir.path().join("app.log"))
//!     .rollover_daily()
//!     .max_log_files(NonZeroUsize::new(7).unwrap())
//!     .build()
//!     .unwrap();
//!
//! sink.write(b"This record will be written to a rotated file.").unwrap();
//! sink.close().unwrap();
//! ```

pub use self::buffered::BufferedWriter;
pub use self::buffered::BufferedWriterBuilder;
pub use self::retention::Retention;
pub use self::rotation::Rotation;
pub use self::sink::FileSink;
pub use self::sink::FileSinkBuilder;

mod buffered;
mod clock;
mod retention;
mod rotation;
mod sink;
