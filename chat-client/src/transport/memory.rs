//! In-process multicast segment.
//!
//! [`MemoryHub`] delivers every datagram to every attached endpoint, the
//! sender included, like a multicast group with loopback enabled. A loss
//! filter can drop individual deliveries to exercise the resync path.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chat_types::MAX_DATAGRAM_SIZE;
use tokio::sync::{mpsc, watch};

use super::{wait_closed, Transport, TransportError};

/// One datagram on its way to one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
    /// Endpoint that sent the datagram.
    pub from: usize,
    /// Endpoint about to receive it.
    pub to: usize,
    /// The datagram.
    pub data: &'a [u8],
}

type LossFilter = Arc<dyn Fn(&Delivery<'_>) -> bool + Send + Sync>;

/// A simulated multicast segment.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

#[derive(Default)]
struct HubInner {
    next_id: usize,
    endpoints: BTreeMap<usize, mpsc::UnboundedSender<Vec<u8>>>,
    /// Returns `true` to deliver, `false` to drop.
    filter: Option<LossFilter>,
}

impl fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("MemoryHub")
            .field("endpoints", &inner.endpoints.len())
            .field("filtered", &inner.filter.is_some())
            .finish()
    }
}

impl MemoryHub {
    /// Create an empty segment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint.
    pub fn endpoint(&self) -> MemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.endpoints.insert(id, tx);

        let (closed, _) = watch::channel(false);
        MemoryTransport {
            id,
            hub: self.clone(),
            incoming: tokio::sync::Mutex::new(rx),
            closed,
        }
    }

    /// Install a loss filter. Deliveries for which `deliver` returns
    /// `false` are dropped.
    pub fn set_filter<F>(&self, deliver: F)
    where
        F: Fn(&Delivery<'_>) -> bool + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        inner.filter = Some(Arc::new(deliver));
    }

    /// Remove the loss filter; every datagram is delivered again.
    pub fn clear_filter(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.filter = None;
    }

    /// Number of attached endpoints.
    pub fn endpoint_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.endpoints.len()
    }

    fn broadcast(&self, from: usize, data: &[u8]) {
        let inner = self.inner.lock().unwrap();
        for (&to, tx) in &inner.endpoints {
            let delivery = Delivery { from, to, data };
            if let Some(filter) = &inner.filter {
                if !filter(&delivery) {
                    tracing::trace!("Dropped datagram {} -> {}", from, to);
                    continue;
                }
            }
            // A receiver that went away is simply off the segment.
            let _ = tx.send(data.to_vec());
        }
    }

    fn detach(&self, id: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.endpoints.remove(&id);
    }
}

/// An endpoint attached to a [`MemoryHub`].
#[derive(Debug)]
pub struct MemoryTransport {
    id: usize,
    hub: MemoryHub,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: watch::Sender<bool>,
}

impl MemoryTransport {
    /// This endpoint's id on the hub, as seen by the loss filter.
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let len = data.len().min(MAX_DATAGRAM_SIZE);
        self.hub.broadcast(self.id, &data[..len]);
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(TransportError::Closed);
        }

        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            datagram = incoming.recv() => datagram.ok_or(TransportError::Closed),
            _ = wait_closed(closed) => Err(TransportError::Closed),
        }
    }

    fn is_open(&self) -> bool {
        !*self.closed.borrow()
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.send_replace(true) {
            self.hub.detach(self.id);
        }
        Ok(())
    }
}
