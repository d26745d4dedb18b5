//! # chat-core
//!
//! Pure presence logic for lanchat (no I/O, instant tests).
//!
//! This crate implements the membership state machine and the resync policy
//! without any network I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (multicast sockets, timers) is performed by `chat-client`,
//! which interprets the actions produced by [`PresenceEngine`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod membership;
pub mod presence;
pub mod resync;

pub use membership::{MembershipDiff, MembershipSet};
pub use presence::{Action, Event, PresenceEngine, PresenceEvent, DEFAULT_MEMBER_TTL_TICKS};
pub use resync::{ResyncSchedule, DEFAULT_RESYNC_INTERVAL};
