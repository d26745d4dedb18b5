//! Protocol messages and the text codec for lanchat.
//!
//! Every datagram is `"<TAG>: <payload>"`. Chat messages use the sender's
//! name as the tag; control messages use the reserved `SYSTEM` tag followed
//! by a verb. Decoding is lenient: input that is not a well-formed message
//! becomes chat text from the [`UNKNOWN_SENDER`] pseudo-sender, so a peer can
//! never make the receiver fail.

use crate::{DecodeError, MemberName};

/// Maximum datagram payload in bytes. Longer encodings are truncated.
pub const MAX_DATAGRAM_SIZE: usize = 256;

/// Separator between tag and payload.
pub const SEPARATOR: &str = ": ";

/// Tag carried by all control messages.
pub const SYSTEM_TAG: &str = "SYSTEM";

/// Sender attributed to datagrams without a usable tag.
pub const UNKNOWN_SENDER: &str = "unknown";

const CONNECTED: &str = "CONNECTED";
const DISCONNECTED: &str = "DISCONNECTED";
const MEMBERLIST: &str = "MEMBERLIST";
const REQUEST_MEMBERLIST: &str = "REQUEST_MEMBERLIST";

/// All possible protocol messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Free text from a member.
    Chat {
        /// Who wrote the text.
        sender: MemberName,
        /// The text, verbatim.
        text: String,
    },
    /// Announces that a member is present.
    SystemConnect {
        /// The announcing member.
        username: MemberName,
    },
    /// Announces that a member has left.
    SystemDisconnect {
        /// The departing member.
        username: MemberName,
    },
    /// Full membership snapshot, in the sender's display order.
    MemberList {
        /// Present members.
        names: Vec<MemberName>,
    },
    /// Asks every listener to broadcast a snapshot.
    RequestMemberList {
        /// Who is asking, when known. Informational only: replies are
        /// always broadcast.
        requester: Option<MemberName>,
    },
}

impl Message {
    /// Short name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Chat { .. } => "CHAT",
            Message::SystemConnect { .. } => CONNECTED,
            Message::SystemDisconnect { .. } => DISCONNECTED,
            Message::MemberList { .. } => MEMBERLIST,
            Message::RequestMemberList { .. } => REQUEST_MEMBERLIST,
        }
    }

    /// Render the wire text for this message.
    pub fn to_wire(&self) -> String {
        match self {
            Message::Chat { sender, text } => format!("{}{}{}", sender, SEPARATOR, text),
            Message::SystemConnect { username } => system_line(CONNECTED, username.as_str()),
            Message::SystemDisconnect { username } => {
                system_line(DISCONNECTED, username.as_str())
            }
            Message::MemberList { names } => {
                let joined = names
                    .iter()
                    .map(MemberName::as_str)
                    .collect::<Vec<_>>()
                    .join("\n");
                system_line(MEMBERLIST, &joined)
            }
            Message::RequestMemberList { requester: None } => {
                format!("{}{}{}", SYSTEM_TAG, SEPARATOR, REQUEST_MEMBERLIST)
            }
            Message::RequestMemberList {
                requester: Some(name),
            } => system_line(REQUEST_MEMBERLIST, name.as_str()),
        }
    }

    /// Encode to wire bytes (not truncated).
    pub fn encode(&self) -> Vec<u8> {
        self.to_wire().into_bytes()
    }

    /// Encode to wire bytes, truncated to [`MAX_DATAGRAM_SIZE`].
    ///
    /// Truncation happens on a UTF-8 character boundary, so the result is
    /// always valid UTF-8. A snapshot is cut after the last name that fits
    /// whole, so receivers never see a clipped name as a member.
    pub fn encode_datagram(&self) -> Vec<u8> {
        let wire = self.to_wire();
        let datagram = match self {
            Message::MemberList { .. } => truncate_to_line(&wire),
            _ => truncate_to_datagram(&wire),
        };
        datagram.as_bytes().to_vec()
    }

    /// Strictly decode wire bytes.
    ///
    /// Returns why the input is malformed instead of falling back.
    pub fn try_decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let line = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
        let (tag, payload) = line.split_once(SEPARATOR).ok_or(DecodeError::MissingTag)?;

        if tag == SYSTEM_TAG {
            return parse_system(payload);
        }

        let sender = MemberName::new(tag).map_err(DecodeError::InvalidSender)?;
        Ok(Message::Chat {
            sender,
            text: payload.to_string(),
        })
    }

    /// Leniently decode wire bytes. Never fails.
    ///
    /// Malformed input becomes [`Message::unparsed`].
    pub fn decode(bytes: &[u8]) -> Self {
        Self::try_decode(bytes).unwrap_or_else(|_| Self::unparsed(bytes))
    }

    /// The fallback for malformed input: the whole datagram as chat text from
    /// the `unknown` pseudo-sender.
    pub fn unparsed(bytes: &[u8]) -> Self {
        Message::Chat {
            sender: MemberName::unknown(),
            text: String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Truncate a wire string to at most [`MAX_DATAGRAM_SIZE`] bytes without
/// splitting a UTF-8 character.
fn truncate_to_datagram(wire: &str) -> &str {
    if wire.len() <= MAX_DATAGRAM_SIZE {
        return wire;
    }
    let mut end = MAX_DATAGRAM_SIZE;
    while !wire.is_char_boundary(end) {
        end -= 1;
    }
    &wire[..end]
}

/// Like [`truncate_to_datagram`], but drop the partial line at the end.
///
/// A single line longer than the limit has no earlier boundary and is cut
/// on a character boundary instead.
fn truncate_to_line(wire: &str) -> &str {
    let cut = truncate_to_datagram(wire);
    if cut.len() == wire.len() {
        return wire;
    }
    match cut.rfind('\n') {
        Some(end) => &cut[..end],
        None => cut,
    }
}

fn system_line(verb: &str, argument: &str) -> String {
    format!("{}{}{}{}{}", SYSTEM_TAG, SEPARATOR, verb, SEPARATOR, argument)
}

fn parse_system(payload: &str) -> Result<Message, DecodeError> {
    let (verb, argument) = match payload.split_once(':') {
        Some((verb, argument)) => (verb.trim(), Some(argument)),
        None => (payload.trim(), None),
    };

    match verb {
        CONNECTED => Ok(Message::SystemConnect {
            username: parse_member(CONNECTED, argument)?,
        }),
        DISCONNECTED => Ok(Message::SystemDisconnect {
            username: parse_member(DISCONNECTED, argument)?,
        }),
        MEMBERLIST => Ok(Message::MemberList {
            names: parse_names(argument.unwrap_or("")),
        }),
        REQUEST_MEMBERLIST => Ok(Message::RequestMemberList {
            requester: argument.and_then(|a| MemberName::new(a.trim()).ok()),
        }),
        _ => Err(DecodeError::UnknownSystemMessage(payload.to_string())),
    }
}

fn parse_member(verb: &'static str, argument: Option<&str>) -> Result<MemberName, DecodeError> {
    MemberName::new(argument.unwrap_or("").trim())
        .map_err(|source| DecodeError::InvalidMember { verb, source })
}

/// Split a snapshot payload into names, dropping empty lines and anything
/// that is not a valid member name.
fn parse_names(payload: &str) -> Vec<MemberName> {
    payload
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| MemberName::new(line).ok())
        .collect()
}
