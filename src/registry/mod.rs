//! Session registry
//!
//! The registry maps stream identifiers to decode sessions and owns the
//! decoder engine they share.
//!
//! # Architecture
//!
//! ```text
//!                        Registry<E>
//!              ┌──────────────────────────────┐
//!              │ engine: E                    │
//!              │ sessions: Mutex<HashMap<id,  │
//!              │   Session { player, core }   │
//!              │ >>                           │
//!              └──────────────┬───────────────┘
//!      start / stop / release_all (caller threads)
//!                             │
//!         ┌───────────────────┼───────────────────┐
//!         ▼                   ▼                   ▼
//!    [Session a]         [Session b]         [Session c]
//!  engine thread a     engine thread b     engine thread c
//!  format/lock/display format/lock/display format/lock/display
//!         │                   │                   │
//!         └──► deliver() ──► FrameSink (host thread attach/detach)
//! ```
//!
//! # Restart semantics
//!
//! Starting an identifier that is already active fully stops and releases
//! the old session before the new one opens. Both happen under a turn lock
//! for that identifier, so two concurrent starts for one identifier are
//! serialized and exactly one session remains. The map lock itself is only
//! held to remove and insert entries: draining a slow session on one stream
//! never holds up `start`, `stop` or introspection on another.

pub mod config;
pub mod store;

pub use config::RegistryConfig;
pub use store::Registry;
