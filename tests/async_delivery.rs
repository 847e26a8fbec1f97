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
use std::sync::Arc;
use std::sync::Barrier;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use logroll::Error;
use logroll::Sink;
use logroll::Trap;
use logroll::asynchronous::AsyncBuilder;
use logroll::sink::Memory;

/// A sink whose writes wait until the test lets them through.
#[derive(Debug)]
struct GatedSink {
    started: Sender<()>,
    gate: Receiver<()>,
    inner: Memory,
}

impl Sink for GatedSink {
    fn write(&self, record: &[u8]) -> Result<(), Error> {
        let _ = self.started.send(());
        // a disconnected gate lets every write through
        let _ = self.gate.recv();
        self.inner.write(record)
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug)]
struct BarrierFlush {
    started: Arc<AtomicBool>,
    barrier: Arc<Barrier>,
}

impl Sink for BarrierFlush {
    fn write(&self, _: &[u8]) -> Result<(), Error> {
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        self.started.store(true, Ordering::SeqCst);
        self.barrier.wait();
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug)]
struct Failing;

impl Sink for Failing {
    fn write(&self, _: &[u8]) -> Result<(), Error> {
        Err(Error::new("disk full"))
    }

    fn flush(&self) -> Result<(), Error> {
        Err(Error::new("flush failed"))
    }

    fn close(&self) -> Result<(), Error> {
        Err(Error::new("close failed"))
    }
}

#[derive(Debug)]
struct CloseTracker {
    inner: Memory,
    closed_with: Arc<Mutex<Option<String>>>,
}

impl Sink for CloseTracker {
    fn write(&self, record: &[u8]) -> Result<(), Error> {
        self.inner.write(record)
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        *self.closed_with.lock().unwrap() = Some(self.inner.contents());
        Ok(())
    }
}

/// A sink that panics on its first write and delivers every later one.
#[derive(Debug)]
struct PanicsOnce {
    panicked: AtomicBool,
    inner: Memory,
}

impl Sink for PanicsOnce {
    fn write(&self, record: &[u8]) -> Result<(), Error> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("sink exploded");
        }
        self.inner.write(record)
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug)]
struct ChannelTrap(Sender<String>);

impl Trap for ChannelTrap {
    fn trap(&self, err: &Error) {
        let _ = self.0.send(err.to_string());
    }
}

#[derive(Debug)]
struct NoopTrap;

impl Trap for NoopTrap {
    fn trap(&self, _: &Error) {}
}

#[test]
fn records_arrive_in_write_order() {
    let memory = Memory::default();
    let sink = AsyncBuilder::new("async-fifo").build(memory.clone());

    let expected = (0..5000).map(|i| format!("record {i}\n")).collect::<String>();
    for i in 0..5000 {
        sink.write(format!("record {i}\n").as_bytes()).unwrap();
    }
    sink.close().unwrap();

    assert_eq!(memory.contents(), expected);
}

#[test]
fn each_producer_keeps_its_order() {
    const PRODUCERS: usize = 8;
    const RECORDS: usize = 500;

    let memory = Memory::default();
    let sink = Arc::new(
        AsyncBuilder::new("async-producers")
            .queue_capacity(NonZeroUsize::new(16).unwrap())
            .build(memory.clone()),
    );

    let handles = (0..PRODUCERS)
        .map(|p| {
            let sink = sink.clone();
            std::thread::spawn(move || {
                for n in 0..RECORDS {
                    sink.write(format!("{p} {n}\n").as_bytes()).unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }
    sink.close().unwrap();

    let mut next = [0; PRODUCERS];
    for line in memory.contents().lines() {
        let (p, n) = line.split_once(' ').unwrap();
        let p = p.parse::<usize>().unwrap();
        let n = n.parse::<usize>().unwrap();
        assert_eq!(n, next[p], "producer {p} out of order");
        next[p] += 1;
    }
    assert_eq!(next, [RECORDS; PRODUCERS]);
}

#[test]
fn flush_is_a_barrier_for_earlier_records() {
    let memory = Memory::default();
    let sink = AsyncBuilder::new("async-flush-barrier").build(memory.clone());

    for round in 0..20 {
        for i in 0..50 {
            sink.write(format!("{round}-{i}\n").as_bytes()).unwrap();
        }
        sink.flush().unwrap();
        assert_eq!(memory.contents().lines().count(), (round + 1) * 50);
    }

    sink.close().unwrap();
}

#[test]
fn flush_waits_for_inner_flush() {
    let started = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(2));

    let sink = AsyncBuilder::new("async-flush-wait").build(BarrierFlush {
        started: started.clone(),
        barrier: barrier.clone(),
    });
    let sink = Arc::new(sink);

    let flush_handle = {
        let sink = sink.clone();
        std::thread::spawn(move || sink.flush())
    };

    while !started.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }
    assert!(!flush_handle.is_finished());

    barrier.wait();
    flush_handle
        .join()
        .expect("flush thread panicked")
        .expect("flush should succeed");

    sink.close().unwrap();
}

#[test]
fn flush_propagates_inner_error() {
    let sink = AsyncBuilder::new("async-flush-error")
        .trap(NoopTrap)
        .build(Failing);

    let err = sink.flush().unwrap_err().to_string();
    assert!(err.contains("failed to flush"), "{err}");
    assert!(err.contains("flush failed"), "{err}");

    let err = sink.close().unwrap_err().to_string();
    assert!(err.contains("close failed"), "{err}");
}

#[test]
fn write_errors_go_to_the_trap() {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let sink = AsyncBuilder::new("async-write-error")
        .trap(ChannelTrap(sender))
        .build(Failing);

    sink.write(b"first").unwrap();
    sink.write(b"second").unwrap();

    for _ in 0..2 {
        let err = receiver.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(err.contains("failed to write record"), "{err}");
        assert!(err.contains("disk full"), "{err}");
    }

    // the worker survives a failing sink
    sink.write(b"third").unwrap();
    let err = receiver.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(err.contains("disk full"), "{err}");

    assert!(sink.close().is_err());
}

#[test]
fn panicking_sink_does_not_stop_delivery() {
    let memory = Memory::default();
    let (sender, receiver) = crossbeam_channel::unbounded();
    let sink = AsyncBuilder::new("async-panic")
        .trap(ChannelTrap(sender))
        .build(PanicsOnce {
            panicked: AtomicBool::new(false),
            inner: memory.clone(),
        });

    sink.write(b"lost\n").unwrap();
    let err = receiver.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(err.contains("failed to write record"), "{err}");
    assert!(err.contains("sink exploded"), "{err}");

    for i in 0..10 {
        sink.write(format!("{i}\n").as_bytes()).unwrap();
    }
    sink.flush().unwrap();
    sink.close().unwrap();

    let expected = (0..10).map(|i| format!("{i}\n")).collect::<String>();
    assert_eq!(memory.contents(), expected);
    assert_eq!(sink.pending(), 0);
    assert!(receiver.try_recv().is_err());
}

#[test]
fn close_drains_before_closing_inner() {
    let memory = Memory::default();
    let closed_with = Arc::new(Mutex::new(None));
    let sink = AsyncBuilder::new("async-drain").build(CloseTracker {
        inner: memory.clone(),
        closed_with: closed_with.clone(),
    });

    for i in 0..1000 {
        sink.write(format!("{i}\n").as_bytes()).unwrap();
    }
    sink.close().unwrap();

    assert_eq!(sink.pending(), 0);
    let seen = closed_with.lock().unwrap().clone().unwrap();
    assert_eq!(seen.lines().count(), 1000);
    assert_eq!(seen, memory.contents());
}

#[test]
fn drop_policy_never_drops_within_capacity() {
    let memory = Memory::default();
    let sink = AsyncBuilder::new("async-drop-within")
        .queue_capacity(NonZeroUsize::new(1024).unwrap())
        .overflow_drop_incoming()
        .build(memory.clone());

    for i in 0..1024 {
        sink.write(format!("{i}\n").as_bytes()).unwrap();
    }
    sink.close().unwrap();

    assert_eq!(sink.dropped(), 0);
    assert_eq!(memory.contents().lines().count(), 1024);
}

#[test]
fn drop_policy_discards_beyond_capacity() {
    let memory = Memory::default();
    let (started_sender, started) = crossbeam_channel::unbounded();
    let (gate_sender, gate) = crossbeam_channel::unbounded();

    let sink = AsyncBuilder::new("async-drop-beyond")
        .queue_capacity(NonZeroUsize::new(4).unwrap())
        .overflow_drop_incoming()
        .build(GatedSink {
            started: started_sender,
            gate,
            inner: memory.clone(),
        });

    // the worker takes the first record and blocks inside the sink
    sink.write(b"0\n").unwrap();
    started.recv_timeout(Duration::from_secs(10)).unwrap();

    // four fill the queue, the rest are dropped without an error
    for i in 1..10 {
        sink.write(format!("{i}\n").as_bytes()).unwrap();
    }
    assert_eq!(sink.dropped(), 5);
    assert_eq!(sink.pending(), 5);

    drop(gate_sender);
    sink.close().unwrap();

    assert_eq!(memory.contents(), "0\n1\n2\n3\n4\n");
    assert_eq!(sink.pending(), 0);
    assert_eq!(sink.dropped(), 5);
}

#[test]
fn block_policy_waits_for_room() {
    let memory = Memory::default();
    let (started_sender, started) = crossbeam_channel::unbounded();
    let (gate_sender, gate) = crossbeam_channel::unbounded();

    let sink = Arc::new(
        AsyncBuilder::new("async-block")
            .queue_capacity(NonZeroUsize::new(2).unwrap())
            .overflow_block()
            .build(GatedSink {
                started: started_sender,
                gate,
                inner: memory.clone(),
            }),
    );

    sink.write(b"0\n").unwrap();
    started.recv_timeout(Duration::from_secs(10)).unwrap();
    sink.write(b"1\n").unwrap();
    sink.write(b"2\n").unwrap();

    let producer = {
        let sink = sink.clone();
        std::thread::spawn(move || sink.write(b"3\n"))
    };
    std::thread::sleep(Duration::from_millis(100));
    assert!(!producer.is_finished(), "write should block on a full queue");

    // let every queued write through
    for _ in 0..4 {
        gate_sender.send(()).unwrap();
    }
    producer.join().unwrap().unwrap();
    sink.close().unwrap();

    assert_eq!(memory.contents(), "0\n1\n2\n3\n");
    assert_eq!(sink.dropped(), 0);
}

#[test]
#[should_panic(expected = "write to a closed async sink")]
fn write_after_close_panics() {
    let sink = AsyncBuilder::new("async-write-after-close").build(Memory::default());
    sink.close().unwrap();
    let _ = sink.write(b"too late");
}

#[test]
#[should_panic(expected = "async sink closed twice")]
fn double_close_panics() {
    let sink = AsyncBuilder::new("async-double-close").build(Memory::default());
    sink.close().unwrap();
    let _ = sink.close();
}

#[test]
fn drop_without_close_delivers_queued_records() {
    let memory = Memory::default();
    {
        let sink = AsyncBuilder::new("async-drop").build(memory.clone());
        for i in 0..100 {
            sink.write(format!("{i}\n").as_bytes()).unwrap();
        }
    }
    assert_eq!(memory.contents().lines().count(), 100);
}
