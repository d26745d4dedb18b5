//! UDP multicast transport.
//!
//! Every participant binds the same group port with address reuse enabled,
//! so several chat processes can run on one host. Loopback is on by default:
//! a participant receives its own datagrams, and the presence engine relies
//! on that being harmless.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use chat_types::MAX_DATAGRAM_SIZE;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::watch;

use super::{wait_closed, Transport, TransportError};

/// Socket options for [`MulticastTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulticastOptions {
    /// Local interface to join the group on (`0.0.0.0` = let the OS pick).
    pub interface: Ipv4Addr,
    /// Multicast TTL (1 = stay on the local segment).
    pub ttl: u32,
    /// Deliver our own datagrams back to us.
    pub loopback: bool,
}

impl Default for MulticastOptions {
    fn default() -> Self {
        Self {
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: 1,
            loopback: true,
        }
    }
}

/// Transport over an IPv4 multicast group.
#[derive(Debug)]
pub struct MulticastTransport {
    socket: UdpSocket,
    target: SocketAddrV4,
    closed: watch::Sender<bool>,
}

impl MulticastTransport {
    /// Bind the group port and join `group`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(
        group: Ipv4Addr,
        port: u16,
        options: MulticastOptions,
    ) -> Result<Self, TransportError> {
        if !group.is_multicast() {
            return Err(TransportError::BindFailed(format!(
                "{} is not a multicast address",
                group
            )));
        }

        let socket = Self::open_socket(group, port, &options)
            .map_err(|e| TransportError::BindFailed(format!("{}:{}: {}", group, port, e)))?;
        let socket = UdpSocket::from_std(socket.into())
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;

        tracing::info!(
            "Joined multicast group {}:{} on {} (ttl={}, loopback={})",
            group,
            port,
            options.interface,
            options.ttl,
            options.loopback
        );

        let (closed, _) = watch::channel(false);
        Ok(Self {
            socket,
            target: SocketAddrV4::new(group, port),
            closed,
        })
    }

    fn open_socket(
        group: Ipv4Addr,
        port: u16,
        options: &MulticastOptions,
    ) -> std::io::Result<Socket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuse_port(true)?;

        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&bind_addr.into())?;

        socket.join_multicast_v4(&group, &options.interface)?;
        if !options.interface.is_unspecified() {
            socket.set_multicast_if_v4(&options.interface)?;
        }
        socket.set_multicast_loop_v4(options.loopback)?;
        socket.set_multicast_ttl_v4(options.ttl)?;
        socket.set_nonblocking(true)?;
        Ok(socket)
    }
}

#[async_trait]
impl Transport for MulticastTransport {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }

        let data = if data.len() > MAX_DATAGRAM_SIZE {
            tracing::warn!(
                "Datagram of {} bytes truncated to {}",
                data.len(),
                MAX_DATAGRAM_SIZE
            );
            &data[..MAX_DATAGRAM_SIZE]
        } else {
            data
        };

        self.socket
            .send_to(data, self.target)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        tracing::trace!("Sent {} bytes to {}", data.len(), self.target);
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(TransportError::Closed);
        }

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        tokio::select! {
            result = self.socket.recv_from(&mut buf) => {
                let (len, from) = result.map_err(|e| {
                    if self.is_open() {
                        TransportError::ReceiveFailed(e.to_string())
                    } else {
                        TransportError::Closed
                    }
                })?;
                tracing::trace!("Received {} bytes from {}", len, from);
                Ok(buf[..len].to_vec())
            }
            _ = wait_closed(closed) => Err(TransportError::Closed),
        }
    }

    fn is_open(&self) -> bool {
        !*self.closed.borrow()
    }

    async fn close(&self) -> Result<(), TransportError> {
        let was_closed = self.closed.send_replace(true);
        if !was_closed {
            tracing::info!("Left multicast group {}", self.target);
        }
        Ok(())
    }
}
