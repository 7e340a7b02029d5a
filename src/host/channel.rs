//! Broadcast frame sink
//!
//! Copies each delivered frame once into a reference-counted [`Bytes`] and
//! fans it out to any number of async consumers over a
//! `tokio::sync::broadcast` channel. Receivers share the same allocation;
//! slow receivers lag and skip frames instead of stalling the engine thread.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::engine::PixelFormat;
use crate::error::SinkError;

use super::{FrameSink, FrameView};

/// An owned copy of a delivered frame
///
/// Cheap to clone due to `Bytes` reference counting.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Delivery sequence number, starting at 0
    pub sequence: u64,
    /// Pixel data
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: usize,
    pub format: PixelFormat,
}

/// Frame sink publishing owned frames to async subscribers
#[derive(Debug)]
pub struct ChannelSink {
    tx: broadcast::Sender<DecodedFrame>,
    sequence: AtomicU64,
}

impl ChannelSink {
    /// Create a sink buffering up to `capacity` frames per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            sequence: AtomicU64::new(0),
        }
    }

    /// Subscribe to frames delivered from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DecodedFrame> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Frames delivered so far
    pub fn frames_sent(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new(4)
    }
}

impl FrameSink for ChannelSink {
    fn on_raw_frame(&self, frame: FrameView<'_>) -> Result<(), SinkError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let decoded = DecodedFrame {
            sequence,
            data: Bytes::copy_from_slice(frame.data()),
            width: frame.width(),
            height: frame.height(),
            stride: frame.stride(),
            format: frame.format(),
        };

        // No subscribers is not an error, the frame is simply not observed
        let _ = self.tx.send(decoded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    fn view(data: &[u8]) -> FrameView<'_> {
        FrameView::new(data, 2, 1, 4, PixelFormat::Rv16)
    }

    #[tokio::test]
    async fn test_subscribers_share_frame() {
        let sink = ChannelSink::new(8);
        let mut rx1 = sink.subscribe();
        let mut rx2 = sink.subscribe();
        assert_eq!(sink.receiver_count(), 2);

        sink.on_raw_frame(view(&[1, 2, 3, 4])).unwrap();

        let a = rx1.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        assert_eq!(a.sequence, 0);
        assert_eq!(&a.data[..], &[1, 2, 3, 4]);
        assert_eq!(a.width, 2);
        assert_eq!(a.height, 1);
        // same allocation
        assert_eq!(a.data.as_ptr(), b.data.as_ptr());
    }

    #[test]
    fn test_send_without_subscribers() {
        let sink = ChannelSink::default();
        assert!(sink.on_raw_frame(view(&[0; 4])).is_ok());
        assert_eq!(sink.frames_sent(), 1);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let sink = ChannelSink::new(2);
        let mut rx = sink.subscribe();

        for i in 0..5u8 {
            sink.on_raw_frame(view(&[i; 4])).unwrap();
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        let next = rx.recv().await.unwrap();
        assert_eq!(next.sequence, 3);
    }

    #[test]
    fn test_frame_outlives_view() {
        let sink = ChannelSink::new(1);
        let mut rx = sink.subscribe();
        {
            let data = vec![9u8; 4];
            sink.on_raw_frame(view(&data)).unwrap();
        }
        let frame = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(&frame.data[..], &[9, 9, 9, 9]);
    }
}
