//! Decode sessions
//!
//! A [`Session`] is one active stream: it owns the engine player and a
//! shared [`SessionCore`] which the engine calls back into on its own
//! threads.
//!
//! ```text
//!   Session<E>                        engine threads
//!   ├─ player: E::Player ─────────────► format / lock / unlock / display
//!   └─ core: Arc<SessionCore> ◄───────────────┘
//!        ├─ frame: Mutex<FrameSlot>   (buffer + pinned dimensions)
//!        ├─ sink: RwLock<Option<Arc<dyn FrameSink>>>
//!        └─ gate: CallbackGate        (close + drain on shutdown)
//! ```
//!
//! Shutdown always runs in the same order: stop the player, close the gate
//! and drain running callbacks, drop the sink, release the player. Once it
//! returns no callback can reach the buffer or the sink.

pub mod buffer;
pub(crate) mod gate;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::engine::{Engine, Media, Player, VideoCallbacks, VideoFormat};
use crate::error::{Error, Result, SessionError};
use crate::host::{self, FrameSink, FrameView, HostRuntime};
use crate::registry::RegistryConfig;
use crate::stats::{SessionCounters, SessionStats};

use buffer::FrameSlot;
use gate::CallbackGate;

pub use buffer::{FrameBuffer, LockedFrame};
pub use state::{SessionPhase, SessionState};

/// Session state shared with engine threads
pub struct SessionCore {
    stream_id: String,
    frame: Mutex<FrameSlot>,
    sink: RwLock<Option<Arc<dyn FrameSink>>>,
    runtime: Arc<dyn HostRuntime>,
    state: Mutex<SessionState>,
    counters: SessionCounters,
    gate: CallbackGate,
    max_frame_bytes: usize,
    catch_sink_panics: bool,
}

impl SessionCore {
    pub(crate) fn new(
        stream_id: &str,
        sink: Arc<dyn FrameSink>,
        runtime: Arc<dyn HostRuntime>,
        width: u32,
        height: u32,
        config: &RegistryConfig,
    ) -> Self {
        Self {
            stream_id: stream_id.to_owned(),
            frame: Mutex::new(FrameSlot::new(config.pixel_format, width, height)),
            sink: RwLock::new(Some(sink)),
            runtime,
            state: Mutex::new(SessionState::new()),
            counters: SessionCounters::new(),
            gate: CallbackGate::new(),
            max_frame_bytes: config.max_frame_bytes,
            catch_sink_panics: config.catch_sink_panics,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Negotiated `(width, height)`, both zero before negotiation.
    ///
    /// Never waits on the frame buffer, so it stays responsive while a
    /// delivery is in progress.
    pub fn dimensions(&self) -> (u32, u32) {
        self.state.lock().dimensions
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase
    }

    pub fn has_sink(&self) -> bool {
        self.sink.read().is_some()
    }

    pub fn stats(&self) -> SessionStats {
        let state = self.state.lock();
        self.counters.snapshot(state.negotiations, state.uptime())
    }

    /// Describe the session
    pub fn info(&self) -> SessionInfo {
        let state = self.state.lock();
        let (width, height) = state.dimensions;
        SessionInfo {
            stream_id: self.stream_id.clone(),
            phase: state.phase,
            width,
            height,
            stats: self.counters.snapshot(state.negotiations, state.uptime()),
        }
    }

    /// Close the gate and wait for running callbacks, then drop the sink
    fn close(&self, drain_timeout: Duration) {
        self.state.lock().stop();

        if !self.gate.close(drain_timeout) {
            tracing::warn!(
                stream = %self.stream_id,
                in_flight = self.gate.in_flight(),
                timeout_ms = drain_timeout.as_millis() as u64,
                "Callbacks still running after drain timeout"
            );
        }

        self.sink.write().take();
    }

    fn mark_released(&self) {
        self.state.lock().release();
    }
}

impl VideoCallbacks for SessionCore {
    fn format(&self, proposed: VideoFormat) -> std::result::Result<VideoFormat, SessionError> {
        let _pass = self.gate.enter().ok_or(SessionError::Closed)?;
        let mut slot = self.frame.lock();

        let (width, height) = match slot.pinned {
            Some(dims) => dims,
            None => (proposed.width, proposed.height),
        };

        if let Err(e) = slot.buffer.reconfigure(width, height, self.max_frame_bytes) {
            tracing::warn!(
                stream = %self.stream_id,
                width,
                height,
                error = %e,
                "Format negotiation failed"
            );
            return Err(e);
        }
        slot.pinned = Some((width, height));

        let format = slot.buffer.video_format();
        drop(slot);

        self.state.lock().on_negotiated(width, height);
        tracing::debug!(
            stream = %self.stream_id,
            proposed_width = proposed.width,
            proposed_height = proposed.height,
            width,
            height,
            chroma = %format.chroma,
            "Format negotiated"
        );

        Ok(format)
    }

    fn lock(&self) -> Option<LockedFrame<'_>> {
        let pass = self.gate.enter()?;
        match self.frame.try_lock() {
            Some(slot) if slot.buffer.is_configured() => Some(LockedFrame::new(slot, pass)),
            _ => {
                self.counters.record_lock_miss();
                None
            }
        }
    }

    fn unlock(&self, frame: LockedFrame<'_>) {
        drop(frame);
    }

    fn display(&self) {
        let Some(_pass) = self.gate.enter() else {
            return;
        };
        let Some(sink) = self.sink.read().clone() else {
            return;
        };

        let slot = self.frame.lock();
        if !slot.buffer.is_configured() {
            return;
        }

        let buffer = &slot.buffer;
        let view = FrameView::new(
            buffer.as_slice(),
            buffer.width(),
            buffer.height(),
            buffer.stride(),
            buffer.pixel_format(),
        );
        let outcome = host::deliver(
            self.runtime.as_ref(),
            sink.as_ref(),
            view,
            self.catch_sink_panics,
        );
        drop(slot);

        self.counters.record_display(outcome);
        self.state.lock().on_display();
        tracing::trace!(stream = %self.stream_id, ?outcome, "Frame displayed");
    }
}

/// Point-in-time description of a session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub stream_id: String,
    pub phase: SessionPhase,
    pub width: u32,
    pub height: u32,
    pub stats: SessionStats,
}

/// One active stream bound to an engine player
pub struct Session<E: Engine> {
    core: Arc<SessionCore>,
    player: Option<E::Player>,
    drain_timeout: Duration,
}

impl<E: Engine> Session<E> {
    /// Open `stream_id` on the engine and start playback.
    ///
    /// On failure every resource created so far is released before the
    /// error is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        engine: &E,
        stream_id: &str,
        sink: Arc<dyn FrameSink>,
        runtime: Arc<dyn HostRuntime>,
        width: u32,
        height: u32,
        media_options: &[String],
        config: &RegistryConfig,
    ) -> Result<Self> {
        let mut media = engine
            .open_media(stream_id)
            .ok_or_else(|| Error::MediaOpen(stream_id.to_owned()))?;

        for option in media_options {
            media.add_option(option);
        }

        let mut player = media
            .into_player()
            .map_err(|e| Error::PlaybackStart(e.to_string()))?;

        let core = Arc::new(SessionCore::new(stream_id, sink, runtime, width, height, config));
        player.set_video_callbacks(core.clone());

        let mut session = Self {
            core,
            player: Some(player),
            drain_timeout: config.drain_timeout,
        };

        if let Some(player) = session.player.as_mut() {
            if let Err(e) = player.play() {
                session.shutdown();
                return Err(Error::PlaybackStart(e.to_string()));
            }
        }

        Ok(session)
    }

    pub fn stream_id(&self) -> &str {
        self.core.stream_id()
    }

    /// Engine-facing side of the session
    pub fn core(&self) -> &Arc<SessionCore> {
        &self.core
    }

    pub fn is_released(&self) -> bool {
        self.player.is_none()
    }

    pub fn info(&self) -> SessionInfo {
        self.core.info()
    }

    /// Stop decoding and release the player and sink. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(mut player) = self.player.take() else {
            return;
        };

        player.stop();
        self.core.close(self.drain_timeout);
        drop(player);
        self.core.mark_released();

        tracing::debug!(stream = %self.core.stream_id, "Session released");
    }
}

impl<E: Engine> Drop for Session<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
