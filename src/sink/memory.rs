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
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::Error;
use crate::sink::Sink;

/// A sink that collects records in memory.
///
/// Clones share the same buffer, so a test can hand one clone to a pipeline and inspect
/// the output through another.
///
/// # Examples
///
/// ```
/// use logroll::Sink;
/// use logroll::sink::Memory;
///
/// let memory = Memory::default();
/// memory.write(b"first\n").unwrap();
/// assert_eq!(memory.contents(), "first\n");
/// ```
#[derive(Debug, Default, Clone)]
pub struct Memory {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Memory {
    fn buf(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buf.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A copy of every byte written so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.buf().clone()
    }

    /// Everything written so far, decoded as UTF-8 with invalid sequences replaced.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf()).into_owned()
    }

    /// Discard everything written so far.
    pub fn reset(&self) {
        self.buf().clear();
    }
}

impl Sink for Memory {
    fn write(&self, record: &[u8]) -> Result<(), Error> {
        self.buf().extend_from_slice(record);
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}
