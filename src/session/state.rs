//! Session state machine
//!
//! Tracks a decode session from creation to release.

use std::time::{Duration, Instant};

/// Session lifecycle phase
///
/// ```text
/// Created ──format──► Negotiated ──display──► Playing
///                         ▲                      │
///                         └───────format─────────┘
/// any ──shutdown──► Stopped ──► Released
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Player created, no format negotiated yet
    Created,
    /// Output format agreed with the engine
    Negotiated,
    /// Frames are being displayed
    Playing,
    /// Engine stopped, callbacks drained
    Stopped,
    /// Sink and player released
    Released,
}

/// Session state with lifecycle timestamps
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Current phase
    pub phase: SessionPhase,

    /// When the session was created
    pub created_at: Instant,

    /// When the last negotiation completed
    pub negotiated_at: Option<Instant>,

    /// Number of successful negotiations
    pub negotiations: u32,

    /// Negotiated `(width, height)`, both zero before negotiation
    pub dimensions: (u32, u32),

    /// When the session was stopped
    pub stopped_at: Option<Instant>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Created,
            created_at: Instant::now(),
            negotiated_at: None,
            negotiations: 0,
            dimensions: (0, 0),
            stopped_at: None,
        }
    }

    /// Record a completed negotiation. Ignored once stopped.
    pub fn on_negotiated(&mut self, width: u32, height: u32) {
        if self.is_live() {
            self.phase = SessionPhase::Negotiated;
            self.negotiated_at = Some(Instant::now());
            self.negotiations += 1;
            self.dimensions = (width, height);
        }
    }

    /// Record a displayed frame
    pub fn on_display(&mut self) {
        if self.phase == SessionPhase::Negotiated {
            self.phase = SessionPhase::Playing;
        }
    }

    /// Engine stopped
    pub fn stop(&mut self) {
        if self.is_live() {
            self.phase = SessionPhase::Stopped;
            self.stopped_at = Some(Instant::now());
        }
    }

    /// Resources released
    pub fn release(&mut self) {
        self.stop();
        self.phase = SessionPhase::Released;
    }

    /// Whether the session still accepts engine callbacks
    pub fn is_live(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Created | SessionPhase::Negotiated | SessionPhase::Playing
        )
    }

    /// Time since the session was created
    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
