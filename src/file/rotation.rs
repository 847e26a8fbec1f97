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

use jiff::Zoned;
use jiff::civil::Date;
use jiff::civil::DateTime;
use jiff::civil::Time;

/// The `strftime` format of the timestamp appended to rotated file names.
///
/// The hour is always part of the name, so a daily file opened in the afternoon carries the
/// hour it was opened at.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The calendar window after which a file sink switches to a new file.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[non_exhaustive]
pub enum Rotation {
    /// Start a new file when the calendar day changes.
    #[default]
    Daily,
    /// Start a new file when the hour or the calendar day changes.
    Hourly,
}

/// The slice of time a log file belongs to. Two instants in the same segment write to the
/// same file.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) struct Segment {
    date: Date,
    hour: Option<i8>,
}

impl Rotation {
    pub(crate) fn segment(&self, now: &Zoned) -> Segment {
        let hour = match self {
            Rotation::Daily => None,
            Rotation::Hourly => Some(now.hour()),
        };
        Segment {
            date: now.date(),
            hour,
        }
    }
}

pub(crate) fn format_timestamp(now: &Zoned) -> String {
    now.strftime(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp produced by [`format_timestamp`].
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime> {
    let (date, hour) = s.split_once('_')?;
    if hour.len() != 2 {
        return None;
    }
    let date = Date::strptime(DATE_FORMAT, date).ok()?;
    let hour = hour.parse::<i8>().ok()?;
    let time = Time::new(hour, 0, 0, 0).ok()?;
    Some(date.to_datetime(time))
}
