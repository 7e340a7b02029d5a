//! Host boundary
//!
//! Frames leave the crate through a [`FrameSink`] owned by the host
//! application. Delivery runs on the engine thread that produced the frame,
//! so each call is wrapped in an [`AttachGuard`] that makes the thread known
//! to the host runtime for exactly the duration of the call.
//!
//! ```text
//!   engine thread ── display() ──► deliver()
//!                                    │ AttachGuard::acquire (attach if unknown)
//!                                    │ sink.on_raw_frame(FrameView)
//!                                    └ drop guard (detach if attached here)
//! ```
//!
//! Failures on this path never reach the engine: an unreachable runtime
//! drops the frame, a failing or panicking sink is logged and counted.

pub mod channel;
pub mod guard;
#[cfg(feature = "jni")]
pub mod java;

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::engine::PixelFormat;
use crate::error::{HostError, SinkError};

pub use channel::{ChannelSink, DecodedFrame};
pub use guard::AttachGuard;

/// Host execution environment that engine threads must join before calling
/// into host state
pub trait HostRuntime: Send + Sync {
    /// Whether the calling thread is already known to the host
    fn is_current_thread_attached(&self) -> bool;

    /// Make the calling thread known to the host
    fn attach_current_thread(&self) -> Result<(), HostError>;

    /// Undo [`attach_current_thread`](Self::attach_current_thread)
    fn detach_current_thread(&self);
}

/// Runtime for hosts where every thread can call into host state directly
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl HostRuntime for NativeRuntime {
    fn is_current_thread_attached(&self) -> bool {
        true
    }

    fn attach_current_thread(&self) -> Result<(), HostError> {
        Ok(())
    }

    fn detach_current_thread(&self) {}
}

/// Read-only view of a decoded frame, valid for one delivery
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> FrameView<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: usize, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            stride,
            format,
        }
    }

    /// Raw pixel bytes, `stride * height` long
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// One row of pixels, `None` past the last row
    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        self.data.get(start..start + self.stride)
    }
}

/// Host-side consumer of decoded frames
///
/// Called on engine threads. The view must not be retained past return;
/// copy the bytes if they are needed later.
pub trait FrameSink: Send + Sync {
    fn on_raw_frame(&self, frame: FrameView<'_>) -> Result<(), SinkError>;
}

impl<F> FrameSink for F
where
    F: Fn(FrameView<'_>) -> Result<(), SinkError> + Send + Sync,
{
    fn on_raw_frame(&self, frame: FrameView<'_>) -> Result<(), SinkError> {
        self(frame)
    }
}

/// Outcome of a single delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The sink accepted the frame
    Delivered,
    /// The host runtime could not be reached; the frame was dropped
    Dropped,
    /// The sink returned an error or panicked
    Failed,
}

/// Deliver one frame to a sink from the current thread.
///
/// With `catch_panics` set, a panicking sink is contained here instead of
/// unwinding into the engine thread.
pub fn deliver(
    runtime: &dyn HostRuntime,
    sink: &dyn FrameSink,
    frame: FrameView<'_>,
    catch_panics: bool,
) -> Delivery {
    let _guard = match AttachGuard::acquire(runtime) {
        Ok(guard) => guard,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping frame, host runtime unreachable");
            return Delivery::Dropped;
        }
    };

    let result = if catch_panics {
        match catch_unwind(AssertUnwindSafe(|| sink.on_raw_frame(frame))) {
            Ok(result) => result,
            Err(_) => Err(SinkError::new("sink panicked")),
        }
    } else {
        sink.on_raw_frame(frame)
    };

    match result {
        Ok(()) => Delivery::Delivered,
        Err(e) => {
            tracing::warn!(
                error = %e,
                width = frame.width(),
                height = frame.height(),
                "Frame sink failed"
            );
            Delivery::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct UnreachableRuntime;

    impl HostRuntime for UnreachableRuntime {
        fn is_current_thread_attached(&self) -> bool {
            false
        }

        fn attach_current_thread(&self) -> Result<(), HostError> {
            Err(HostError::Unreachable("vm gone".into()))
        }

        fn detach_current_thread(&self) {
            panic!("detach without attach");
        }
    }

    /// Counts attach and detach calls; threads are never known up front
    #[derive(Default)]
    struct CountingRuntime {
        attaches: AtomicUsize,
        detaches: AtomicUsize,
    }

    impl HostRuntime for CountingRuntime {
        fn is_current_thread_attached(&self) -> bool {
            false
        }

        fn attach_current_thread(&self) -> Result<(), HostError> {
            self.attaches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn detach_current_thread(&self) {
            self.detaches.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_frame_view_rows() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let view = FrameView::new(&data, 1, 3, 2, PixelFormat::Rv16);

        assert_eq!(view.row(0), Some(&[1u8, 2][..]));
        assert_eq!(view.row(2), Some(&[5u8, 6][..]));
        assert_eq!(view.row(3), None);
    }

    #[test]
    fn test_deliver_to_closure_sink() {
        let seen = AtomicUsize::new(0);
        let sink = |frame: FrameView<'_>| -> Result<(), SinkError> {
            seen.store(frame.data().len(), Ordering::SeqCst);
            Ok(())
        };
        let data = vec![0u8; 8];
        let view = FrameView::new(&data, 2, 2, 4, PixelFormat::Rv16);

        assert_eq!(deliver(&NativeRuntime, &sink, view, true), Delivery::Delivered);
        assert_eq!(seen.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_unreachable_runtime_drops_frame() {
        let called = AtomicUsize::new(0);
        let sink = |_: FrameView<'_>| -> Result<(), SinkError> {
            called.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        let view = FrameView::new(&[], 0, 0, 0, PixelFormat::Rv16);

        assert_eq!(deliver(&UnreachableRuntime, &sink, view, true), Delivery::Dropped);
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_detach_after_sink_error() {
        let runtime = CountingRuntime::default();
        let sink = |_: FrameView<'_>| -> Result<(), SinkError> { Err(SinkError::new("closed")) };
        let view = FrameView::new(&[], 0, 0, 0, PixelFormat::Rv16);

        assert_eq!(deliver(&runtime, &sink, view, true), Delivery::Failed);
        assert_eq!(runtime.attaches.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.detaches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detach_after_sink_panic() {
        let runtime = CountingRuntime::default();
        let sink = |_: FrameView<'_>| -> Result<(), SinkError> { panic!("boom") };
        let view = FrameView::new(&[], 0, 0, 0, PixelFormat::Rv16);

        assert_eq!(deliver(&runtime, &sink, view, true), Delivery::Failed);
        assert_eq!(runtime.detaches.load(Ordering::SeqCst), 1);
    }
}
