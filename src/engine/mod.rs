//! Decoder engine contract
//!
//! The decoder engine is an external collaborator: it demuxes and decodes on
//! threads it owns, and calls back into the crate to negotiate the output
//! format and to borrow the frame buffer it decodes into.
//!
//! ```text
//!   Engine::init(args) ──► Engine ──open_media(locator)──► Media
//!                                                           │ add_option(..)
//!                                                           ▼ into_player()
//!                                                         Player
//!                                 set_video_callbacks(Arc<dyn VideoCallbacks>)
//!                                                           │ play()
//!                         engine thread                     ▼
//!        format(proposed) ─► lock() ─► decode ─► unlock() ─► display()
//! ```
//!
//! Releasing an engine object is dropping it. A player's `stop` must return
//! only once no new callback can begin; callbacks already running are
//! drained by the session (see [`crate::session`]).

pub mod mock;

use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, SessionError};
use crate::session::LockedFrame;

pub use mock::{MockEngine, MockPlayerHandle};

/// Raw pixel layouts a session can ask the engine to decode into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 16-bit RGB 5:6:5
    #[default]
    Rv16,
    /// 24-bit packed RGB
    Rv24,
    /// 32-bit RGB with padding byte
    Rv32,
    /// 32-bit RGBA
    Rgba,
}

impl PixelFormat {
    /// Bytes used by a single pixel
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rv16 => 2,
            PixelFormat::Rv24 => 3,
            PixelFormat::Rv32 | PixelFormat::Rgba => 4,
        }
    }

    /// Four character code the engine expects
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            PixelFormat::Rv16 => *b"RV16",
            PixelFormat::Rv24 => *b"RV24",
            PixelFormat::Rv32 => *b"RV32",
            PixelFormat::Rgba => *b"RGBA",
        }
    }

    /// Parse a four character code
    pub fn from_fourcc(code: &[u8]) -> Option<Self> {
        match code {
            b"RV16" => Some(PixelFormat::Rv16),
            b"RV24" => Some(PixelFormat::Rv24),
            b"RV32" => Some(PixelFormat::Rv32),
            b"RGBA" => Some(PixelFormat::Rgba),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // fourcc codes are always ASCII
        let code = self.fourcc();
        write!(f, "{}", String::from_utf8_lossy(&code))
    }
}

/// Video output format exchanged during negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    /// Pixel layout
    pub chroma: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per row
    pub pitch: usize,
    /// Number of rows
    pub lines: usize,
}

impl VideoFormat {
    /// Create a tightly packed format
    pub fn new(chroma: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            chroma,
            width,
            height,
            pitch: width as usize * chroma.bytes_per_pixel(),
            lines: height as usize,
        }
    }

    /// Size in bytes of one frame in this format
    pub fn frame_size(&self) -> usize {
        self.pitch * self.lines
    }
}

/// Callbacks the engine invokes on its own threads
///
/// For one player the engine serializes these calls; different players may
/// call concurrently.
pub trait VideoCallbacks: Send + Sync {
    /// Negotiate the output format.
    ///
    /// The engine proposes a format and must decode into the returned one.
    /// An error means the stream cannot proceed and no frames may be
    /// delivered for it.
    fn format(&self, proposed: VideoFormat) -> Result<VideoFormat, SessionError>;

    /// Borrow the buffer for the next decoded picture. Never blocks; `None`
    /// means the engine must skip this picture.
    fn lock(&self) -> Option<LockedFrame<'_>>;

    /// Return the buffer after the picture has been written.
    fn unlock(&self, frame: LockedFrame<'_>);

    /// The last unlocked picture is ready to be shown.
    fn display(&self);
}

/// A shared decoder engine instance
pub trait Engine: Send + Sync + Sized + 'static {
    /// Media opened from a locator, not yet bound to a player
    type Media: Media<Player = Self::Player>;

    /// A player decoding one media
    type Player: Player;

    /// Construct the engine from command-line style options
    fn init(args: &[String]) -> Result<Self, EngineError>;

    /// Resolve a locator into media, `None` if it cannot be opened
    fn open_media(&self, locator: &str) -> Option<Self::Media>;
}

/// Media handle prior to playback
pub trait Media {
    type Player: Player;

    /// Apply one engine directive (e.g. `:network-caching=300`)
    fn add_option(&mut self, option: &str);

    /// Create a player for this media; the media itself is released
    fn into_player(self) -> Result<Self::Player, EngineError>;
}

/// Player handle for a single stream
pub trait Player: Send + 'static {
    /// Install format, lock, unlock and display callbacks
    fn set_video_callbacks(&mut self, callbacks: Arc<dyn VideoCallbacks>);

    /// Begin playback
    fn play(&mut self) -> Result<(), EngineError>;

    /// Stop playback. No callback may begin once this returns.
    fn stop(&mut self);
}
