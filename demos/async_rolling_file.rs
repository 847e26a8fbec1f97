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

use std::num::NonZeroUsize;
use std::time::Duration;

use logroll::Sink;
use logroll::asynchronous::AsyncBuilder;
use logroll::file::FileSinkBuilder;
use logroll::sink::Stderr;

fn main() {
    let file = FileSinkBuilder::new("logs/async_rolling_file.log")
        .rollover_hourly()
        .max_log_files(NonZeroUsize::new(24).unwrap())
        .flush_interval(Duration::from_secs(1))
        .build()
        .unwrap();
    eprintln!("writing to {}", file.current_path().display());

    let sink = AsyncBuilder::new("demo-async-file")
        .overflow_drop_incoming()
        .build(file);

    for i in 0..10_000 {
        sink.write(format!("INFO request {i} served").as_bytes()).unwrap();
    }
    sink.flush().unwrap();

    let console = Stderr::default();
    let summary = format!("pending: {}, dropped: {}\n", sink.pending(), sink.dropped());
    console.write(summary.as_bytes()).unwrap();

    sink.close().unwrap();
}
