//! Connectionless UDP link to the tracking-data consumer.
//!
//! The link binds a local port, announces itself to the server, and then
//! fires datagrams without acknowledgement.  Replies are drained without
//! blocking from the frame loop; any datagram from the server's address
//! marks the link as connected.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use anyhow::Context;
use tracing::{debug, info, warn};

/// First datagram sent after binding.
pub const CONNECT_MESSAGE: &str = "Connection request";
/// Best-effort farewell sent before the socket is dropped.
pub const DISCONNECT_MESSAGE: &str = "__DISCONNECT__";

const RECV_BUFFER_SIZE: usize = 4096;

/// Link state as shown in status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Never connected, or disconnected.
    Idle,
    /// Bound and announced, no reply yet.
    Waiting,
    /// The server has answered at least once.
    Connected,
    /// A send was attempted without a socket.
    NotConnected,
    SendError,
    ReceiveError,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Connected => "connected",
            Self::NotConnected => "not-connected",
            Self::SendError => "send-error",
            Self::ReceiveError => "receive-error",
        }
    }
}

#[derive(Debug)]
pub struct UdpLink {
    server: SocketAddr,
    local_port: u16,
    socket: Option<UdpSocket>,
    status: LinkStatus,
}

impl UdpLink {
    /// Create an unbound link.  `local_port` 0 picks an ephemeral port.
    pub fn new(server: SocketAddr, local_port: u16) -> Self {
        Self {
            server,
            local_port,
            socket: None,
            status: LinkStatus::Idle,
        }
    }

    /// Bind the local port and announce to the server.
    pub fn connect(&mut self) -> anyhow::Result<()> {
        if self.socket.is_some() {
            self.disconnect();
        }

        let bind_addr = SocketAddr::from(([0, 0, 0, 0], self.local_port));
        let socket = UdpSocket::bind(bind_addr)
            .with_context(|| format!("failed to bind UDP port {}", self.local_port))?;
        socket
            .set_nonblocking(true)
            .context("failed to set UDP socket non-blocking")?;

        info!(server = %self.server, local = ?socket.local_addr().ok(), "UDP link waiting for server");
        self.socket = Some(socket);
        self.status = LinkStatus::Waiting;
        self.send(CONNECT_MESSAGE);
        Ok(())
    }

    /// Send one datagram.  Failures are logged and reported as `false`.
    pub fn send(&mut self, message: &str) -> bool {
        let Some(socket) = self.socket.as_ref() else {
            if self.status != LinkStatus::NotConnected {
                warn!("not connected, cannot send message");
            }
            self.status = LinkStatus::NotConnected;
            return false;
        };

        match socket.send_to(message.as_bytes(), self.server) {
            Ok(_) => {
                debug!(len = message.len(), "datagram sent");
                true
            }
            Err(e) => {
                warn!(server = %self.server, "send error: {}", e);
                self.status = LinkStatus::SendError;
                false
            }
        }
    }

    /// Drain every pending datagram without blocking.
    pub fn poll_incoming(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        let Some(socket) = self.socket.as_ref() else {
            return messages;
        };

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            match socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    if from.ip() == self.server.ip() && self.status != LinkStatus::Connected {
                        info!(server = %self.server, "UDP link connected");
                        self.status = LinkStatus::Connected;
                    }
                    messages.push(String::from_utf8_lossy(&buf[..len]).into_owned());
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("receive error: {}", e);
                    self.status = LinkStatus::ReceiveError;
                    break;
                }
            }
        }
        messages
    }

    /// Say goodbye and drop the socket.
    pub fn disconnect(&mut self) {
        let Some(socket) = self.socket.take() else {
            return;
        };
        if let Err(e) = socket.send_to(DISCONNECT_MESSAGE.as_bytes(), self.server) {
            warn!("failed to send disconnect message: {}", e);
        }
        info!(server = %self.server, "UDP link closed");
        self.status = LinkStatus::Idle;
    }

    /// Retarget the link, reconnecting if it is open.
    pub fn set_server(&mut self, server: SocketAddr) -> anyhow::Result<()> {
        if self.socket.is_some() {
            self.disconnect();
            self.server = server;
            self.connect()?;
        } else {
            self.server = server;
        }
        Ok(())
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Bound local address, once connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Generate s-expression for debug status.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:server \"{}\" :status :{} :open {})",
            self.server,
            self.status.as_str(),
            if self.is_open() { "t" } else { "nil" },
        )
    }
}

impl Drop for UdpLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}
