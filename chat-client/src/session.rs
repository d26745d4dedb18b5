//! ChatSession - the main interface for lanchat.
//!
//! This module provides [`ChatSession`], which joins a multicast group,
//! keeps the member list converged and delivers chat to the display layer.
//!
//! # Architecture
//!
//! ChatSession uses a pure state machine (from chat-core) for presence logic
//! and interprets its actions to perform actual I/O via the Transport trait.
//!
//! ```text
//! Display ──commands──► ChatSession ──► Transport ──► Group
//!    ▲                      │  ▲
//!    └──── SessionEvent ────┘  └── receive task / resync task
//!                     chat-core (pure state machine)
//! ```
//!
//! The engine sits behind one async mutex. The command context, the receive
//! task and the resync task all go through it, and actions produced under the
//! lock are executed before it is released, so notifications reach the
//! display in the order the engine produced them.
//!
//! # Example
//!
//! ```ignore
//! use chat_client::{ChatSession, MockTransport, SessionOptions};
//!
//! let (session, mut events) =
//!     ChatSession::start(name, MockTransport::new(), SessionOptions::default());
//! session.join().await?;
//! session.send_chat("hello").await?;
//! while let Some(event) = events.recv().await { /* render */ }
//! session.leave().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use chat_core::{Action, Event, PresenceEngine, PresenceEvent, ResyncSchedule};
use chat_types::{MemberName, Message};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::SessionOptions;
use crate::receive::spawn_receive_loop;
use crate::resync::spawn_resync_task;
use crate::transport::{Transport, TransportError};

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The operation requires a joined session.
    #[error("not joined")]
    NotJoined,

    /// The session has been closed.
    #[error("session closed")]
    Closed,
}

/// Notifications delivered to the display layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Chat text arrived (our own messages included, via loopback).
    Chat {
        /// Who sent it.
        sender: MemberName,
        /// The text.
        text: String,
    },
    /// The set of present members changed.
    MembershipChanged {
        /// Everyone present now, in display order.
        members: Vec<MemberName>,
        /// Who became present.
        joined: Vec<MemberName>,
        /// Who became absent.
        left: Vec<MemberName>,
    },
    /// The transport failed; the session cannot continue.
    TransportFailed {
        /// Description of the failure.
        error: String,
    },
    /// The receive task stopped. No further events follow.
    Closed,
}

impl From<PresenceEvent> for SessionEvent {
    fn from(event: PresenceEvent) -> Self {
        match event {
            PresenceEvent::ChatReceived { sender, text } => SessionEvent::Chat { sender, text },
            PresenceEvent::MembershipChanged {
                members,
                joined,
                left,
            } => SessionEvent::MembershipChanged {
                members,
                joined,
                left,
            },
        }
    }
}

/// State shared between the session handle and its background tasks.
pub(crate) struct Shared<T> {
    pub(crate) transport: T,
    engine: Mutex<PresenceEngine>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<T: Transport> Shared<T> {
    /// Feed an event to the engine and execute the resulting actions.
    ///
    /// Every action runs even if a broadcast fails; the first failure is
    /// returned.
    pub(crate) async fn dispatch(&self, event: Event) -> Result<(), TransportError> {
        let mut engine = self.engine.lock().await;
        let actions = engine.handle(event);

        let mut first_error = None;
        for action in actions {
            match action {
                Action::Broadcast(message) => {
                    if let Err(e) = self.broadcast(&message).await {
                        first_error.get_or_insert(e);
                    }
                }
                Action::Emit(event) => self.emit(event.into()),
            }
        }
        drop(engine);

        first_error.map_or(Ok(()), Err)
    }

    async fn broadcast(&self, message: &Message) -> Result<(), TransportError> {
        let datagram = message.encode_datagram();
        let full_len = message.to_wire().len();
        if datagram.len() < full_len {
            tracing::warn!(
                "{} message truncated from {} to {} bytes",
                message.kind(),
                full_len,
                datagram.len()
            );
        }
        tracing::debug!("Broadcasting {}", message.kind());
        self.transport.send(&datagram).await
    }

    /// Deliver an event to the display layer. Dropped if nobody listens.
    pub(crate) fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Session event dropped, display receiver gone");
        }
    }
}

/// A participant in a multicast chat group.
///
/// The receive task starts immediately, so membership is tracked even
/// before [`join`](Self::join). Presence is announced only after joining.
pub struct ChatSession<T: Transport + 'static> {
    shared: Arc<Shared<T>>,
    resync: ResyncSchedule,
    leave_grace: Duration,
    receive_task: Mutex<Option<JoinHandle<()>>>,
    resync_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport + 'static> ChatSession<T> {
    /// Create a session over `transport` and start receiving.
    ///
    /// Returns the session and the display-layer event stream. Must be called
    /// from within a Tokio runtime.
    pub fn start(
        local: MemberName,
        transport: T,
        options: SessionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let engine = PresenceEngine::new(local)
            .with_member_ttl(options.member_ttl_ticks)
            .with_echo_suppression(options.loopback);
        let shared = Arc::new(Shared {
            transport,
            engine: Mutex::new(engine),
            events,
        });

        let receive_task = spawn_receive_loop(Arc::clone(&shared));

        let session = Self {
            shared,
            resync: options.resync,
            leave_grace: options.leave_grace,
            receive_task: Mutex::new(Some(receive_task)),
            resync_task: Mutex::new(None),
        };
        (session, receiver)
    }

    /// The local identity.
    pub async fn local(&self) -> MemberName {
        self.shared.engine.lock().await.local().clone()
    }

    /// Announce our presence and start periodic re-announcement.
    ///
    /// Joining twice is a no-op.
    pub async fn join(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.is_joined().await {
            return Ok(());
        }

        tracing::info!("Joining as {}", self.local().await);
        self.shared.dispatch(Event::JoinRequested).await?;

        let mut resync_task = self.resync_task.lock().await;
        if resync_task.is_none() {
            *resync_task = Some(spawn_resync_task(Arc::clone(&self.shared), self.resync));
        }
        Ok(())
    }

    /// Whether we have joined and not yet left.
    pub async fn is_joined(&self) -> bool {
        self.shared.engine.lock().await.is_joined()
    }

    /// Send chat text to the group. Empty text is ignored.
    pub async fn send_chat(&self, text: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        if !self.is_joined().await {
            return Err(SessionError::NotJoined);
        }
        self.shared
            .dispatch(Event::ChatRequested {
                text: text.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Ask every member to broadcast its view of the group.
    pub async fn request_member_list(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.shared.dispatch(Event::MemberListRequested).await?;
        Ok(())
    }

    /// Members currently present, in display order.
    pub async fn members(&self) -> Vec<MemberName> {
        self.shared.engine.lock().await.members().to_vec()
    }

    /// Announce departure and shut the session down.
    ///
    /// Stops the resync task, broadcasts `DISCONNECTED` if joined, waits the
    /// leave grace window so the datagram gets out, then closes the
    /// transport and waits for the receive task to finish. Calling it on a
    /// closed session is a no-op.
    pub async fn leave(&self) -> Result<(), SessionError> {
        if let Some(task) = self.resync_task.lock().await.take() {
            task.abort();
        }

        let mut announce_error = None;
        if self.shared.transport.is_open() && self.is_joined().await {
            tracing::info!("Leaving as {}", self.local().await);
            if let Err(e) = self.shared.dispatch(Event::LeaveRequested).await {
                tracing::warn!("Failed to announce departure: {}", e);
                announce_error = Some(e);
            } else if !self.leave_grace.is_zero() {
                tokio::time::sleep(self.leave_grace).await;
            }
        }

        self.shared.transport.close().await?;

        if let Some(task) = self.receive_task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::warn!("Receive task ended abnormally: {}", e);
            }
        }

        match announce_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Access the transport (tests and diagnostics).
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.shared.transport.is_open() {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }
}

impl<T: Transport + 'static> Drop for ChatSession<T> {
    fn drop(&mut self) {
        if let Some(task) = self.resync_task.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.receive_task.get_mut().take() {
            task.abort();
        }
    }
}
