//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use decode_hub::engine::MockEngine;
use decode_hub::host::{FrameSink, FrameView, HostRuntime, NativeRuntime};
use decode_hub::{HostError, Registry, SinkError};

/// Install a test subscriber, honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn registry() -> Registry<MockEngine> {
    init_tracing();
    Registry::init(&[], Arc::new(NativeRuntime)).unwrap()
}

/// A frame as seen by a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenFrame {
    pub width: u32,
    pub height: u32,
    pub len: usize,
    pub first_byte: Option<u8>,
    pub thread: ThreadId,
}

/// Sink recording every frame it receives
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<SeenFrame>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn frames(&self) -> Vec<SeenFrame> {
        self.frames.lock().clone()
    }

    pub fn last(&self) -> Option<SeenFrame> {
        self.frames.lock().last().cloned()
    }

    /// Poll until at least `n` frames arrived or `timeout` passed
    pub fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.count() >= n {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        self.count() >= n
    }
}

impl FrameSink for RecordingSink {
    fn on_raw_frame(&self, frame: FrameView<'_>) -> Result<(), SinkError> {
        self.frames.lock().push(SeenFrame {
            width: frame.width(),
            height: frame.height(),
            len: frame.data().len(),
            first_byte: frame.data().first().copied(),
            thread: thread::current().id(),
        });
        Ok(())
    }
}

/// Runtime that only knows threads it attached or was told about
#[derive(Default)]
pub struct TrackingRuntime {
    attached: Mutex<HashSet<ThreadId>>,
    pub attaches: AtomicUsize,
    pub detaches: AtomicUsize,
}

impl TrackingRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark the current thread as created by the host
    pub fn register_current(&self) {
        self.attached.lock().insert(thread::current().id());
    }

    pub fn attaches(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn detaches(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }
}

impl HostRuntime for TrackingRuntime {
    fn is_current_thread_attached(&self) -> bool {
        self.attached.lock().contains(&thread::current().id())
    }

    fn attach_current_thread(&self) -> Result<(), HostError> {
        self.attached.lock().insert(thread::current().id());
        self.attaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detach_current_thread(&self) {
        self.attached.lock().remove(&thread::current().id());
        self.detaches.fetch_add(1, Ordering::SeqCst);
    }
}
