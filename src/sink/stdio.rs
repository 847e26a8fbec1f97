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

use std::io;
use std::io::Write;

use crate::Error;
use crate::sink::Sink;

/// A sink that writes records to standard output.
///
/// Records are written verbatim; the formatter is expected to terminate each line.
///
/// # Examples
///
/// ```
/// use logroll::Sink;
/// use logroll::sink::Stdout;
///
/// let stdout = Stdout::default();
/// stdout.write(b"hello\n").unwrap();
/// ```
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Stdout {}

impl Sink for Stdout {
    fn write(&self, record: &[u8]) -> Result<(), Error> {
        io::stdout()
            .lock()
            .write_all(record)
            .map_err(Error::from_io_error)
    }

    fn flush(&self) -> Result<(), Error> {
        io::stdout().flush().map_err(Error::from_io_error)
    }

    fn close(&self) -> Result<(), Error> {
        self.flush()
    }
}

/// A sink that writes records to standard error.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Stderr {}

impl Sink for Stderr {
    fn write(&self, record: &[u8]) -> Result<(), Error> {
        io::stderr()
            .lock()
            .write_all(record)
            .map_err(Error::from_io_error)
    }

    fn flush(&self) -> Result<(), Error> {
        io::stderr().flush().map_err(Error::from_io_error)
    }

    fn close(&self) -> Result<(), Error> {
        self.flush()
    }
}
