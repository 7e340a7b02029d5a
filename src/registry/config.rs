//! Registry configuration

use std::time::Duration;

use crate::engine::PixelFormat;

/// Default ceiling for a single frame buffer (64MB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Default time to wait for in-flight callbacks when a session stops
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration shared by every session of a registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Pixel layout requested from the engine
    pub pixel_format: PixelFormat,

    /// Largest frame buffer a negotiation may allocate
    pub max_frame_bytes: usize,

    /// How long stopping a session waits for callbacks already running
    pub drain_timeout: Duration,

    /// Contain sink panics instead of unwinding into engine threads
    pub catch_sink_panics: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Rv16,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            catch_sink_panics: true,
        }
    }
}

impl RegistryConfig {
    /// Set the pixel format
    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Set the frame buffer ceiling
    pub fn max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Set the drain timeout
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Let sink panics unwind into the engine thread
    pub fn propagate_sink_panics(mut self) -> Self {
        self.catch_sink_panics = false;
        self
    }
}
