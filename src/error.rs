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

use std::fmt;
use std::io;
use std::path::Path;

/// The error returned by sinks and writers in this crate.
///
/// An error carries a human-readable message, optional key-value context (for example the
/// path of the file being written), and the chain of underlying causes.
pub struct Error {
    message: String,
    context: Vec<(&'static str, String)>,
    sources: Vec<anyhow::Error>,
}

impl Error {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: vec![],
            sources: vec![],
        }
    }

    /// Attach a key-value pair describing the circumstances of the error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        self.sources.push(src.into());
        self
    }

    /// The message of this error, without context or sources.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Look up a context value by key.
    pub fn context(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Return an iterator over all sources of this error.
    pub fn sources(&self) -> impl ExactSizeIterator<Item = &(dyn std::error::Error + 'static)> {
        self.sources.iter().map(|v| v.as_ref())
    }

    /// Wrap an [`io::Error`] raised while performing I/O.
    pub fn from_io_error(err: io::Error) -> Error {
        Error::new("failed to perform io").with_source(err)
    }

    pub(crate) fn from_path_io(message: &str, path: &Path, err: io::Error) -> Error {
        Error::new(message)
            .with_context("path", path.display())
            .with_source(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;

        if !self.context.is_empty() {
            f.write_str(", context: { ")?;
            for (i, (k, v)) in self.context.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{k}: {v}")?;
            }
            f.write_str(" }")?;
        }

        if !self.sources.is_empty() {
            f.write_str(", sources: [")?;
            for (i, source) in self.sources.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{source}")?;
            }
            f.write_str("]")?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f
                .debug_struct("Error")
                .field("message", &self.message)
                .field("context", &self.context)
                .field("sources", &self.sources)
                .finish();
        }

        writeln!(f, "{}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in &self.context {
                writeln!(f, "   {k}: {v}")?;
            }
        }

        if !self.sources.is_empty() {
            writeln!(f)?;
            writeln!(f, "Sources:")?;
            for source in &self.sources {
                writeln!(f, "   {source:#}")?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.sources.first().map(|v| v.as_ref())
    }
}
