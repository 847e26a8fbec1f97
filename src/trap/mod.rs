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

//! Report errors that have no synchronous caller waiting for them.
//!
//! The async worker, the background flush thread, rotation and retention cleanup all run
//! off the caller's path. Their failures are handed to a [`Trap`] instead of being returned.

use std::fmt;

use crate::Error;

mod default;

pub use self::default::DefaultTrap;

/// A receiver of errors raised off the write path.
pub trait Trap: fmt::Debug + Send + Sync + 'static {
    /// Handle an error. Implementations must not panic.
    fn trap(&self, err: &Error);
}

impl<T: Trap> From<T> for Box<dyn Trap> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
