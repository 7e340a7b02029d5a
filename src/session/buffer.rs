//! Raw frame buffer
//!
//! The engine decodes straight into this buffer. It is sized on every format
//! negotiation to `stride * height` bytes and borrowed through
//! [`LockedFrame`] between `lock` and `unlock`.

use std::ops::{Deref, DerefMut};

use parking_lot::MutexGuard;

use crate::engine::{PixelFormat, VideoFormat};
use crate::error::SessionError;

use super::gate::CallbackPass;

/// Owned pixel storage plus the geometry it was last sized for
#[derive(Debug, Default)]
pub struct FrameBuffer {
    data: Vec<u8>,
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: usize,
}

impl FrameBuffer {
    /// Create an empty, unnegotiated buffer
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// Resize for new dimensions.
    ///
    /// The previous contents are discarded. Fails without touching the
    /// buffer if the frame would exceed `limit` bytes or cannot be
    /// allocated.
    pub fn reconfigure(&mut self, width: u32, height: u32, limit: usize) -> Result<(), SessionError> {
        if width == 0 || height == 0 {
            return Err(SessionError::InvalidFormat { width, height });
        }

        let stride = width as usize * self.format.bytes_per_pixel();
        let size = stride
            .checked_mul(height as usize)
            .filter(|size| *size <= limit)
            .ok_or(SessionError::Allocation {
                requested: stride.saturating_mul(height as usize),
                limit,
            })?;

        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| SessionError::Allocation {
                requested: size,
                limit,
            })?;
        data.resize(size, 0);

        self.data = data;
        self.width = width;
        self.height = height;
        self.stride = stride;
        Ok(())
    }

    /// Whether a format has been negotiated
    pub fn is_configured(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// The video format this buffer currently holds
    pub fn video_format(&self) -> VideoFormat {
        VideoFormat {
            chroma: self.format,
            width: self.width,
            height: self.height,
            pitch: self.stride,
            lines: self.height as usize,
        }
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
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

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Buffer state guarded by the session's frame mutex
#[derive(Debug)]
pub(crate) struct FrameSlot {
    pub(crate) buffer: FrameBuffer,
    /// Dimensions that win over engine proposals, either caller-forced or
    /// adopted from the first negotiation
    pub(crate) pinned: Option<(u32, u32)>,
}

impl FrameSlot {
    pub(crate) fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        let pinned = if width > 0 && height > 0 {
            Some((width, height))
        } else {
            None
        };

        Self {
            buffer: FrameBuffer::new(format),
            pinned,
        }
    }
}

/// Writable view over the frame buffer, held from `lock` to `unlock`
///
/// Keeps the session's callback gate entered, so shutdown waits for the
/// engine to finish writing.
pub struct LockedFrame<'a> {
    slot: MutexGuard<'a, FrameSlot>,
    _pass: CallbackPass<'a>,
}

impl<'a> LockedFrame<'a> {
    pub(crate) fn new(slot: MutexGuard<'a, FrameSlot>, pass: CallbackPass<'a>) -> Self {
        Self { slot, _pass: pass }
    }

    /// Bytes per row
    pub fn pitch(&self) -> usize {
        self.slot.buffer.stride()
    }

    /// Number of rows
    pub fn lines(&self) -> usize {
        self.slot.buffer.height() as usize
    }

    pub fn format(&self) -> VideoFormat {
        self.slot.buffer.video_format()
    }
}

impl Deref for LockedFrame<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.slot.buffer.as_slice()
    }
}

impl DerefMut for LockedFrame<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.slot.buffer.as_mut_slice()
    }
}

impl std::fmt::Debug for LockedFrame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedFrame")
            .field("pitch", &self.pitch())
            .field("lines", &self.lines())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_unconfigured() {
        let buffer = FrameBuffer::new(PixelFormat::Rv16);
        assert!(!buffer.is_configured());
        assert!(buffer.is_empty());
        assert_eq!(buffer.width(), 0);
        assert_eq!(buffer.height(), 0);
    }

    #[test]
    fn test_reconfigure_sizes_buffer() {
        let mut buffer = FrameBuffer::new(PixelFormat::Rv16);
        buffer.reconfigure(320, 240, usize::MAX).unwrap();

        assert!(buffer.is_configured());
        assert_eq!(buffer.stride(), 640);
        assert_eq!(buffer.len(), 320 * 240 * 2);

        buffer.reconfigure(16, 8, usize::MAX).unwrap();
        assert_eq!(buffer.len(), 16 * 8 * 2);
        assert_eq!(buffer.video_format().lines, 8);
    }

    #[test]
    fn test_reconfigure_respects_limit() {
        let mut buffer = FrameBuffer::new(PixelFormat::Rgba);
        buffer.reconfigure(2, 2, 1024).unwrap();

        let err = buffer.reconfigure(1920, 1080, 1024).unwrap_err();
        assert_eq!(
            err,
            SessionError::Allocation {
                requested: 1920 * 1080 * 4,
                limit: 1024
            }
        );
        // previous geometry is kept
        assert_eq!(buffer.width(), 2);
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn test_reconfigure_rejects_zero() {
        let mut buffer = FrameBuffer::new(PixelFormat::Rv16);
        assert!(matches!(
            buffer.reconfigure(0, 480, usize::MAX),
            Err(SessionError::InvalidFormat { width: 0, height: 480 })
        ));
    }

    #[test]
    fn test_slot_pins_only_complete_dimensions() {
        assert_eq!(FrameSlot::new(PixelFormat::Rv16, 640, 480).pinned, Some((640, 480)));
        assert_eq!(FrameSlot::new(PixelFormat::Rv16, 640, 0).pinned, None);
        assert_eq!(FrameSlot::new(PixelFormat::Rv16, 0, 0).pinned, None);
    }
}
