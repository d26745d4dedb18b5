//! # chat-client
//!
//! Client library for lanchat, a serverless chat over IP multicast.
//!
//! This is the library that front-ends use to take part in a chat group.
//!
//! ## Features
//!
//! - **Presence sync**: every participant converges on the same member list
//!   through announcements, snapshots and periodic resync
//! - **Transport Abstraction**: Pluggable transport layer (UDP multicast,
//!   in-process hub, mock)
//! - **Pure State Machine**: Uses chat-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use chat_client::{ChatSession, MulticastTransport, SessionConfig};
//!
//! let config = SessionConfig::default();
//! let transport =
//!     MulticastTransport::bind(config.group, config.port, config.multicast_options())?;
//! let (session, mut events) = ChatSession::start(name, transport, config.session_options());
//!
//! session.join().await?;
//! session.send_chat("hello").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
mod receive;
mod resync;
pub mod session;
pub mod transport;

pub use config::{ConfigError, SessionConfig, SessionOptions, DEFAULT_GROUP, DEFAULT_PORT};
pub use session::{ChatSession, SessionError, SessionEvent};
pub use transport::{
    Delivery, MemoryHub, MemoryTransport, MockTransport, MulticastOptions, MulticastTransport,
    Transport, TransportError,
};
