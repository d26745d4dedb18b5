//! Background receive loop.
//!
//! Pulls datagrams off the transport, decodes them and feeds them to the
//! presence engine in arrival order. Ends when the transport closes or fails.

use std::sync::Arc;

use chat_core::Event;
use chat_types::Message;
use tokio::task::JoinHandle;

use crate::session::{SessionEvent, Shared};
use crate::transport::{Transport, TransportError};

/// Spawn the receive loop for a session.
///
/// Emits [`SessionEvent::TransportFailed`] on a fatal transport error and
/// always finishes with [`SessionEvent::Closed`].
///
/// A fatal error also closes the transport, which stops the resync task and
/// makes further session commands fail with `Closed`.
pub(crate) fn spawn_receive_loop<T>(shared: Arc<Shared<T>>) -> JoinHandle<()>
where
    T: Transport + 'static,
{
    tokio::spawn(async move {
        tracing::debug!("Receive loop started");

        loop {
            let bytes = match shared.transport.recv().await {
                Ok(bytes) => bytes,
                Err(TransportError::Closed) => {
                    tracing::debug!("Transport closed, receive loop stopping");
                    break;
                }
                Err(e) => {
                    tracing::error!("Receive failed: {}", e);
                    fail(&shared, e).await;
                    break;
                }
            };

            let message = match Message::try_decode(&bytes) {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!("Undecodable datagram ({} bytes): {}", bytes.len(), e);
                    Message::unparsed(&bytes)
                }
            };
            tracing::debug!("Received {}", message.kind());

            match shared.dispatch(Event::MessageReceived { message }).await {
                Ok(()) => {}
                Err(TransportError::Closed) => {
                    tracing::debug!("Transport closed while replying");
                    break;
                }
                Err(e) => {
                    tracing::error!("Reply failed: {}", e);
                    fail(&shared, e).await;
                    break;
                }
            }
        }

        shared.emit(SessionEvent::Closed);
    })
}

/// Shut the transport down after a fatal error and tell the display.
async fn fail<T: Transport>(shared: &Shared<T>, error: TransportError) {
    if let Err(e) = shared.transport.close().await {
        tracing::warn!("Failed to close transport after error: {}", e);
    }
    shared.emit(SessionEvent::TransportFailed {
        error: error.to_string(),
    });
}
