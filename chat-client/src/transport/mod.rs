//! Transport abstraction for lanchat.
//!
//! A transport moves opaque datagrams to and from one multicast group. It
//! knows nothing about the wire format; encoding lives in `chat-types`.
//!
//! # Design
//!
//! The transport trait is async and connectionless:
//! - `send()` broadcasts one datagram to the whole group (fire-and-forget)
//! - `recv()` waits for the next datagram from any member, including ourselves
//! - `close()` stops the transport and wakes a pending `recv()`
//!
//! # Example
//!
//! ```ignore
//! let transport = MulticastTransport::bind(group, port, MulticastOptions::default())?;
//! transport.send(b"SYSTEM: CONNECTED: alice").await?;
//! let datagram = transport.recv().await?;
//! ```

mod memory;
mod mock;
mod multicast;

pub use memory::{Delivery, MemoryHub, MemoryTransport};
pub use mock::MockTransport;
pub use multicast::{MulticastOptions, MulticastTransport};

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket could not be set up.
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The transport was closed.
    #[error("transport closed")]
    Closed,
}

/// Transport trait for exchanging datagrams with a multicast group.
///
/// Implementations handle the underlying delivery mechanism
/// (UDP multicast, in-process hub, mock).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Broadcast bytes to every member of the group.
    ///
    /// Fails only on local failure; delivery is never confirmed.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive the next datagram.
    ///
    /// Blocks until data is available. Returns [`TransportError::Closed`]
    /// once the transport has been closed.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if the transport is still open.
    fn is_open(&self) -> bool;

    /// Close the transport. Idempotent; may be called from any task.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Wait until the `closed` flag becomes true.
///
/// Also resolves if the sender side is dropped.
pub(crate) async fn wait_closed(mut closed: tokio::sync::watch::Receiver<bool>) {
    loop {
        if *closed.borrow_and_update() {
            return;
        }
        if closed.changed().await.is_err() {
            return;
        }
    }
}
