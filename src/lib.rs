//! decode-hub: concurrent registry of decoder sessions
//!
//! Runs many independent decode streams on an external decoder engine and
//! hands every decoded raw frame to a host-side sink, crossing from the
//! engine's own threads into the host's execution environment.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//!
//! use decode_hub::engine::MockEngine;
//! use decode_hub::host::{FrameView, NativeRuntime};
//! use decode_hub::{Registry, SinkError};
//!
//! # fn main() -> decode_hub::Result<()> {
//! let registry = Registry::<MockEngine>::init(&[], Arc::new(NativeRuntime))?;
//!
//! let sink = Arc::new(|frame: FrameView<'_>| -> Result<(), SinkError> {
//!     println!("{}x{} frame, {} bytes", frame.width(), frame.height(), frame.data().len());
//!     Ok(())
//! });
//!
//! assert!(registry.start("mock://camera-1", sink, 0, 0, &[]));
//! assert!(registry.stop("mock://camera-1"));
//! registry.release_all();
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod host;
pub mod registry;
pub mod session;
pub mod stats;

pub use engine::{Engine, Media, PixelFormat, Player, VideoCallbacks, VideoFormat};
pub use error::{EngineError, Error, HostError, Result, SessionError, SinkError};
pub use host::{ChannelSink, DecodedFrame, FrameSink, FrameView, HostRuntime, NativeRuntime};
pub use registry::{Registry, RegistryConfig};
pub use session::{SessionInfo, SessionPhase};
pub use stats::SessionStats;
