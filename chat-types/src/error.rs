//! Error types for lanchat wire types.

use thiserror::Error;

/// Reasons a string cannot be used as a [`MemberName`](crate::MemberName).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The name is empty.
    #[error("member name is empty")]
    Empty,

    /// The name has leading or trailing whitespace.
    #[error("member name has surrounding whitespace: {0:?}")]
    SurroundingWhitespace(String),

    /// The name contains a newline (the snapshot separator).
    #[error("member name contains a newline: {0:?}")]
    ContainsNewline(String),

    /// The name contains the `": "` tag separator.
    #[error("member name contains the tag separator: {0:?}")]
    ContainsSeparator(String),

    /// The name collides with a protocol tag.
    #[error("member name is reserved: {0}")]
    Reserved(String),
}

/// Reasons a datagram is not a well-formed protocol message.
///
/// Never fatal: [`Message::decode`](crate::Message::decode) falls back to
/// treating the input as chat text from the `unknown` pseudo-sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload is not valid UTF-8.
    #[error("datagram is not valid UTF-8")]
    InvalidUtf8,

    /// No `": "` separator, so there is no tag.
    #[error("missing tag separator")]
    MissingTag,

    /// The chat sender tag is not a valid member name.
    #[error("invalid sender: {0}")]
    InvalidSender(#[source] NameError),

    /// `SYSTEM` payload with an unrecognised verb.
    #[error("unknown system message: {0:?}")]
    UnknownSystemMessage(String),

    /// A `CONNECTED`/`DISCONNECTED` payload carries an invalid name.
    #[error("invalid member name in {verb}: {source}")]
    InvalidMember {
        /// The system verb that carried the name.
        verb: &'static str,
        /// Why the name was rejected.
        #[source]
        source: NameError,
    },
}
