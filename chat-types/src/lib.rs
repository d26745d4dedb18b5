//! # chat-types
//!
//! Wire format types for the lanchat multicast presence protocol.
//!
//! This crate provides the foundational types used across all lanchat crates:
//! - [`MemberName`] - The identity of a group member
//! - [`Message`] - Protocol messages (chat, connect, disconnect, snapshots)
//! - [`Message::encode`] / [`Message::decode`] - The text codec
//! - [`NameError`], [`DecodeError`] - Error types
//!
//! The wire format is a single UTF-8 line per datagram:
//!
//! ```text
//! <TAG>: <payload>
//!
//! alice: hello everyone                 chat from alice
//! SYSTEM: CONNECTED: alice              presence announcement
//! SYSTEM: DISCONNECTED: alice           departure
//! SYSTEM: MEMBERLIST: alice\nbob        full snapshot
//! SYSTEM: REQUEST_MEMBERLIST: alice     ask listeners for a snapshot
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod member;
mod messages;

pub use error::{DecodeError, NameError};
pub use member::MemberName;
pub use messages::{Message, MAX_DATAGRAM_SIZE, SEPARATOR, SYSTEM_TAG, UNKNOWN_SENDER};
