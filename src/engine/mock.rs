//! In-process mock engine
//!
//! Stands in for a real decoder so registries can be driven end to end
//! without media. Tests reach the players a registry created through
//! [`MockEngine::player`] and play the engine's part by hand: negotiate a
//! format, render frames, or run a decode loop on an engine-owned thread.
//!
//! Behaviour is steered with options, the way a real engine takes them:
//!
//! | option                 | where        | effect                             |
//! |------------------------|--------------|------------------------------------|
//! | anything without `-`   | engine args  | `init` fails                       |
//! | locator not `mock://`  | open         | media cannot be opened             |
//! | `:mock-fail-player`    | media        | player creation fails              |
//! | `:mock-fail-play`      | media        | `play` fails                       |
//! | `:mock-leak-callbacks` | media        | `stop` keeps callbacks installed   |

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::EngineError;

use super::{Engine, Media, PixelFormat, Player, VideoCallbacks, VideoFormat};

const LOCATOR_SCHEME: &str = "mock://";
const OPT_FAIL_PLAYER: &str = ":mock-fail-player";
const OPT_FAIL_PLAY: &str = ":mock-fail-play";
const OPT_LEAK_CALLBACKS: &str = ":mock-leak-callbacks";

/// Player lifecycle as seen by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockPlayerState {
    Idle,
    Playing,
    Stopped,
    Released,
}

struct PlayerShared {
    locator: String,
    options: Vec<String>,
    callbacks: Mutex<Option<Arc<dyn VideoCallbacks>>>,
    state: Mutex<MockPlayerState>,
    stop_requested: AtomicBool,
    decoder: Mutex<Option<JoinHandle<()>>>,
}

impl PlayerShared {
    fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    fn callbacks(&self) -> Option<Arc<dyn VideoCallbacks>> {
        self.callbacks.lock().clone()
    }

    /// Join the decode thread unless we are running on it
    fn join_decoder(&self) {
        let handle = self.decoder.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            let _ = handle.join();
        }
    }
}

#[derive(Default)]
struct EngineInner {
    args: Vec<String>,
    players: Mutex<HashMap<String, Vec<Arc<PlayerShared>>>>,
}

/// Mock decoder engine
///
/// Cloning yields another handle to the same engine.
#[derive(Clone, Default)]
pub struct MockEngine {
    inner: Arc<EngineInner>,
}

impl MockEngine {
    /// Options the engine was initialised with
    pub fn args(&self) -> &[String] {
        &self.inner.args
    }

    /// The most recent player created for `locator`
    pub fn player(&self, locator: &str) -> Option<MockPlayerHandle> {
        self.players(locator).pop()
    }

    /// Every player created for `locator`, oldest first
    pub fn players(&self, locator: &str) -> Vec<MockPlayerHandle> {
        self.inner
            .players
            .lock()
            .get(locator)
            .map(|players| {
                players
                    .iter()
                    .map(|shared| MockPlayerHandle {
                        shared: Arc::clone(shared),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of players ever created
    pub fn player_count(&self) -> usize {
        self.inner.players.lock().values().map(Vec::len).sum()
    }
}

impl Engine for MockEngine {
    type Media = MockMedia;
    type Player = MockPlayer;

    fn init(args: &[String]) -> Result<Self, EngineError> {
        if let Some(bad) = args.iter().find(|arg| !arg.starts_with('-')) {
            return Err(EngineError::Init(format!("unknown option '{}'", bad)));
        }

        Ok(Self {
            inner: Arc::new(EngineInner {
                args: args.to_vec(),
                players: Mutex::new(HashMap::new()),
            }),
        })
    }

    fn open_media(&self, locator: &str) -> Option<MockMedia> {
        if !locator.starts_with(LOCATOR_SCHEME) {
            return None;
        }

        Some(MockMedia {
            engine: Arc::clone(&self.inner),
            locator: locator.to_owned(),
            options: Vec::new(),
        })
    }
}

/// Media opened by [`MockEngine`]
pub struct MockMedia {
    engine: Arc<EngineInner>,
    locator: String,
    options: Vec<String>,
}

impl Media for MockMedia {
    type Player = MockPlayer;

    fn add_option(&mut self, option: &str) {
        self.options.push(option.to_owned());
    }

    fn into_player(self) -> Result<MockPlayer, EngineError> {
        if self.options.iter().any(|o| o == OPT_FAIL_PLAYER) {
            return Err(EngineError::Player(format!("refused {}", self.locator)));
        }

        let shared = Arc::new(PlayerShared {
            locator: self.locator.clone(),
            options: self.options,
            callbacks: Mutex::new(None),
            state: Mutex::new(MockPlayerState::Idle),
            stop_requested: AtomicBool::new(false),
            decoder: Mutex::new(None),
        });

        self.engine
            .players
            .lock()
            .entry(self.locator)
            .or_default()
            .push(Arc::clone(&shared));

        Ok(MockPlayer { shared })
    }
}

/// Player created by [`MockEngine`]
pub struct MockPlayer {
    shared: Arc<PlayerShared>,
}

impl Player for MockPlayer {
    fn set_video_callbacks(&mut self, callbacks: Arc<dyn VideoCallbacks>) {
        *self.shared.callbacks.lock() = Some(callbacks);
    }

    fn play(&mut self) -> Result<(), EngineError> {
        if self.shared.has_option(OPT_FAIL_PLAY) {
            return Err(EngineError::Play(format!("cannot play {}", self.shared.locator)));
        }
        *self.shared.state.lock() = MockPlayerState::Playing;
        Ok(())
    }

    fn stop(&mut self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        self.shared.join_decoder();

        if !self.shared.has_option(OPT_LEAK_CALLBACKS) {
            self.shared.callbacks.lock().take();
        }
        *self.shared.state.lock() = MockPlayerState::Stopped;
    }
}

impl Drop for MockPlayer {
    fn drop(&mut self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        self.shared.join_decoder();

        if !self.shared.has_option(OPT_LEAK_CALLBACKS) {
            self.shared.callbacks.lock().take();
        }
        *self.shared.state.lock() = MockPlayerState::Released;
    }
}

/// Test-side handle playing the engine's part for one player
#[derive(Clone)]
pub struct MockPlayerHandle {
    shared: Arc<PlayerShared>,
}

impl MockPlayerHandle {
    pub fn locator(&self) -> &str {
        &self.shared.locator
    }

    pub fn options(&self) -> &[String] {
        &self.shared.options
    }

    pub fn state(&self) -> MockPlayerState {
        *self.shared.state.lock()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == MockPlayerState::Playing
    }

    pub fn is_stopped(&self) -> bool {
        matches!(
            self.state(),
            MockPlayerState::Stopped | MockPlayerState::Released
        )
    }

    pub fn is_released(&self) -> bool {
        self.state() == MockPlayerState::Released
    }

    /// Whether callbacks are currently installed
    pub fn has_callbacks(&self) -> bool {
        self.shared.callbacks.lock().is_some()
    }

    /// Propose `width` x `height` and return the format the session chose.
    ///
    /// `None` if no callbacks are installed or negotiation failed.
    pub fn negotiate(&self, width: u32, height: u32) -> Option<VideoFormat> {
        let callbacks = self.shared.callbacks()?;
        callbacks
            .format(VideoFormat::new(PixelFormat::Rv32, width, height))
            .ok()
    }

    /// Decode one frame: lock, fill with `value`, unlock, display.
    ///
    /// Returns `false` if the frame could not be locked.
    pub fn render(&self, value: u8) -> bool {
        let Some(callbacks) = self.shared.callbacks() else {
            return false;
        };

        let Some(mut frame) = callbacks.lock() else {
            return false;
        };
        frame.fill(value);
        callbacks.unlock(frame);
        callbacks.display();
        true
    }

    /// Issue a display callback without decoding
    pub fn display(&self) -> bool {
        match self.shared.callbacks() {
            Some(callbacks) => {
                callbacks.display();
                true
            }
            None => false,
        }
    }

    /// Run a decode loop on an engine-owned thread.
    ///
    /// Negotiates `width` x `height`, then renders up to `frames` frames
    /// `interval` apart until the player is stopped. `stop` joins the
    /// thread.
    ///
    /// A player runs one decode loop at a time: returns `false` without
    /// spawning while a previous loop is still running.
    pub fn spawn_decoder(&self, width: u32, height: u32, frames: usize, interval: Duration) -> bool {
        let mut decoder = self.shared.decoder.lock();
        if let Some(previous) = decoder.take() {
            if !previous.is_finished() {
                tracing::warn!(locator = %self.shared.locator, "Mock decoder already running");
                *decoder = Some(previous);
                return false;
            }
            let _ = previous.join();
        }

        let handle = self.clone();
        let worker = thread::Builder::new()
            .name(format!("mock-decoder {}", self.shared.locator))
            .spawn(move || {
                if handle.negotiate(width, height).is_none() {
                    return;
                }
                for i in 0..frames {
                    if handle.shared.stop_requested.load(Ordering::SeqCst) {
                        break;
                    }
                    handle.render(i as u8);
                    thread::sleep(interval);
                }
            });

        match worker {
            Ok(worker) => {
                *decoder = Some(worker);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn mock decoder");
                false
            }
        }
    }

    /// Wait for the decode loop to finish
    pub fn join_decoder(&self) {
        self.shared.join_decoder();
    }
}
