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

//! The capability every log destination implements.

use std::fmt;
use std::sync::Arc;

use crate::Error;

mod memory;
mod stdio;

pub use self::memory::Memory;
pub use self::stdio::Stderr;
pub use self::stdio::Stdout;

/// A destination for already-formatted log records.
///
/// A sink is shared between producer threads, so every method takes `&self`.
pub trait Sink: fmt::Debug + Send + Sync + 'static {
    /// Accept one formatted record.
    ///
    /// On success the whole record has been accepted. An error is returned only for an
    /// unrecoverable failure of the underlying medium.
    fn write(&self, record: &[u8]) -> Result<(), Error>;

    /// Force any buffered bytes to the underlying medium.
    fn flush(&self) -> Result<(), Error>;

    /// Release the resources held by this sink after delivering everything previously
    /// accepted.
    ///
    /// A sink must be closed at most once. Writing to a closed sink is a programming
    /// error, and implementations are free to panic on it.
    fn close(&self) -> Result<(), Error>;
}

impl<T: Sink + ?Sized> Sink for Arc<T> {
    fn write(&self, record: &[u8]) -> Result<(), Error> {
        (**self).write(record)
    }

    fn flush(&self) -> Result<(), Error> {
        (**self).flush()
    }

    fn close(&self) -> Result<(), Error> {
        (**self).close()
    }
}

impl<T: Sink> From<T> for Box<dyn Sink> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
