//! Session registry implementation
//!
//! The registry owns the shared engine and every session started on it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::host::{FrameSink, HostRuntime};
use crate::session::{Session, SessionInfo};

use super::config::RegistryConfig;

/// Registry of decode sessions keyed by stream identifier
///
/// The registry value is the handle returned by initialisation: every
/// operation goes through it, and [`release_all`](Self::release_all)
/// consumes it. Share it between caller threads with `Arc`.
///
/// A single mutex guards the session map and is only held for lookups,
/// inserts and removals. Opening, stopping and draining a session happen
/// outside it, and engine callbacks never take it, so a stuck sink or a
/// slow restart on one stream does not stall registry operations on
/// another. Starts for the same identifier are serialized by a per-stream
/// turn lock.
pub struct Registry<E: Engine> {
    /// Map of stream identifier to session
    sessions: Mutex<HashMap<String, Session<E>>>,

    /// Per-stream turn locks, present while a start for that stream runs
    turns: Mutex<HashMap<String, Arc<Mutex<()>>>>,

    /// Host runtime used by every session's deliveries
    runtime: Arc<dyn HostRuntime>,

    /// Configuration
    config: RegistryConfig,

    /// Shared decoder engine, released after all sessions
    engine: E,
}

impl<E: Engine> Registry<E> {
    /// Construct the shared engine with default configuration
    pub fn init(args: &[String], runtime: Arc<dyn HostRuntime>) -> Result<Self> {
        Self::init_with_config(args, runtime, RegistryConfig::default())
    }

    /// Construct the shared engine with custom configuration
    pub fn init_with_config(
        args: &[String],
        runtime: Arc<dyn HostRuntime>,
        config: RegistryConfig,
    ) -> Result<Self> {
        let engine = E::init(args).map_err(|e| {
            tracing::error!(error = %e, "Engine initialisation failed");
            Error::EngineInit(e)
        })?;

        tracing::info!(
            args = args.len(),
            pixel_format = %config.pixel_format,
            "Engine initialised"
        );

        Ok(Self {
            sessions: Mutex::new(HashMap::new()),
            turns: Mutex::new(HashMap::new()),
            runtime,
            config,
            engine,
        })
    }

    /// Get the shared engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Start decoding `stream_id`, delivering frames to `sink`.
    ///
    /// Returns `false` if the stream could not be started; see
    /// [`try_start`](Self::try_start) for the reason.
    pub fn start(
        &self,
        stream_id: &str,
        sink: Arc<dyn FrameSink>,
        width: u32,
        height: u32,
        media_options: &[String],
    ) -> bool {
        match self.try_start(stream_id, sink, width, height, media_options) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(stream = %stream_id, error = %e, "Failed to start stream");
                false
            }
        }
    }

    /// Start decoding `stream_id`, replacing any session already bound to it.
    ///
    /// `width` and `height` force the output size when both are positive;
    /// otherwise the engine's first proposal is adopted. An existing session
    /// for the same identifier is stopped and released before the new one
    /// is opened. On error nothing is registered.
    pub fn try_start(
        &self,
        stream_id: &str,
        sink: Arc<dyn FrameSink>,
        width: u32,
        height: u32,
        media_options: &[String],
    ) -> Result<()> {
        let turn = self.turn(stream_id);
        let result = {
            let _turn = turn.lock();
            self.replace(stream_id, sink, width, height, media_options)
        };
        self.finish_turn(stream_id, turn);
        result
    }

    fn replace(
        &self,
        stream_id: &str,
        sink: Arc<dyn FrameSink>,
        width: u32,
        height: u32,
        media_options: &[String],
    ) -> Result<()> {
        let previous = self.sessions.lock().remove(stream_id);
        if let Some(mut previous) = previous {
            tracing::info!(stream = %stream_id, "Restarting existing stream");
            previous.shutdown();
        }

        let session = Session::open(
            &self.engine,
            stream_id,
            sink,
            Arc::clone(&self.runtime),
            width,
            height,
            media_options,
            &self.config,
        )?;

        let active = {
            let mut sessions = self.sessions.lock();
            sessions.insert(stream_id.to_owned(), session);
            sessions.len()
        };

        tracing::info!(
            stream = %stream_id,
            width,
            height,
            options = media_options.len(),
            sessions = active,
            "Stream started"
        );

        Ok(())
    }

    /// Turn lock for `stream_id`, created on first use
    fn turn(&self, stream_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.turns.lock().entry(stream_id.to_owned()).or_default())
    }

    /// Drop the turn lock entry once no other start is waiting on it
    fn finish_turn(&self, stream_id: &str, turn: Arc<Mutex<()>>) {
        let mut turns = self.turns.lock();
        // the map's reference plus ours
        if Arc::strong_count(&turn) == 2 {
            turns.remove(stream_id);
        }
    }

    /// Stop and release the session for `stream_id`.
    ///
    /// Returns `false` if no such session exists.
    pub fn stop(&self, stream_id: &str) -> bool {
        let removed = self.sessions.lock().remove(stream_id);

        match removed {
            Some(mut session) => {
                // Torn down outside the map lock; the entry is already gone
                session.shutdown();
                tracing::info!(stream = %stream_id, "Stream released");
                true
            }
            None => {
                tracing::debug!(stream = %stream_id, "Stream not found to release");
                false
            }
        }
    }

    /// Stop every session, then release the engine.
    ///
    /// Consumes the registry, so no operation can follow it.
    pub fn release_all(mut self) {
        self.teardown();
    }

    /// Check if a session exists for `stream_id`
    pub fn contains(&self, stream_id: &str) -> bool {
        self.sessions.lock().contains_key(stream_id)
    }

    /// Number of active sessions
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Identifiers of all active sessions, in no particular order
    pub fn stream_ids(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Describe the session for `stream_id`
    pub fn session_info(&self, stream_id: &str) -> Option<SessionInfo> {
        let core = self
            .sessions
            .lock()
            .get(stream_id)
            .map(|session| Arc::clone(session.core()))?;
        Some(core.info())
    }

    fn teardown(&mut self) {
        let sessions: Vec<(String, Session<E>)> = self.sessions.get_mut().drain().collect();

        for (stream_id, mut session) in sessions {
            tracing::info!(stream = %stream_id, "Stopping stream");
            session.shutdown();
        }
    }
}

impl<E: Engine> Drop for Registry<E> {
    fn drop(&mut self) {
        self.teardown();
        tracing::info!("Engine released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngine, VideoFormat};
    use crate::error::SinkError;
    use crate::host::{FrameView, NativeRuntime};
    use crate::session::SessionPhase;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        frames: AtomicUsize,
    }

    impl FrameSink for CountingSink {
        fn on_raw_frame(&self, _frame: FrameView<'_>) -> std::result::Result<(), SinkError> {
            self.frames.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn registry() -> Registry<MockEngine> {
        Registry::init(&[], Arc::new(NativeRuntime)).unwrap()
    }

    #[test]
    fn test_init_rejects_bad_option() {
        let result = Registry::<MockEngine>::init(&["not-an-option".into()], Arc::new(NativeRuntime));
        assert!(matches!(result, Err(Error::EngineInit(_))));
    }

    #[test]
    fn test_start_and_stop() {
        let registry = registry();
        let sink = Arc::new(CountingSink::default());

        assert!(registry.start("mock://a", sink, 0, 0, &[]));
        assert!(registry.contains("mock://a"));
        assert_eq!(registry.len(), 1);

        assert!(registry.stop("mock://a"));
        assert!(registry.is_empty());
        assert!(!registry.stop("mock://a"));
    }

    #[test]
    fn test_start_unopenable_media() {
        let registry = registry();
        let sink = Arc::new(CountingSink::default());

        let err = registry
            .try_start("file:///missing.mp4", sink.clone(), 0, 0, &[])
            .unwrap_err();
        assert_eq!(err, Error::MediaOpen("file:///missing.mp4".into()));
        assert!(!registry.start("file:///missing.mp4", sink, 0, 0, &[]));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_play_tears_down_player() {
        let registry = registry();
        let sink = Arc::new(CountingSink::default());

        let err = registry
            .try_start("mock://a", sink, 0, 0, &[":mock-fail-play".into()])
            .unwrap_err();
        assert!(matches!(err, Error::PlaybackStart(_)));
        assert!(registry.is_empty());

        let player = registry.engine().player("mock://a").unwrap();
        assert!(player.is_released());
        assert!(!player.has_callbacks());
    }

    #[test]
    fn test_turns_do_not_accumulate() {
        let registry = registry();
        for _ in 0..3 {
            assert!(registry.start("mock://a", Arc::new(CountingSink::default()), 0, 0, &[]));
        }
        assert!(!registry.start("rtsp://camera", Arc::new(CountingSink::default()), 0, 0, &[]));

        assert!(registry.turns.lock().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_session_info() {
        let registry = registry();
        let sink = Arc::new(CountingSink::default());
        registry.start("mock://a", sink.clone(), 0, 0, &[]);

        let player = registry.engine().player("mock://a").unwrap();
        player.negotiate(320, 240).unwrap();
        assert!(player.render(0x11));

        let info = registry.session_info("mock://a").unwrap();
        assert_eq!(info.stream_id, "mock://a");
        assert_eq!((info.width, info.height), (320, 240));
        assert_eq!(info.phase, SessionPhase::Playing);
        assert_eq!(info.stats.frames_delivered, 1);
        assert_eq!(sink.frames.load(Ordering::SeqCst), 1);
        assert!(registry.session_info("mock://b").is_none());
    }

    #[test]
    fn test_release_all_stops_players() {
        let registry = registry();
        let engine = registry.engine().clone();
        for id in ["mock://a", "mock://b", "mock://c"] {
            assert!(registry.start(id, Arc::new(CountingSink::default()), 0, 0, &[]));
        }

        registry.release_all();

        for id in ["mock://a", "mock://b", "mock://c"] {
            let player = engine.player(id).unwrap();
            assert!(player.is_released());
            assert_eq!(player.negotiate(16, 16), None::<VideoFormat>);
        }
    }
}
