//! Outbound channel carrying trap events to the controller.

use std::fmt;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use ptrap_wire::{InterruptPacket, NET_MAX_LENGTH};
use tracing::{debug, trace};

/// A server-initiated connection that receives [`InterruptPacket`]s.
///
/// The channel is write-only. Dropping it closes the connection.
pub struct NotificationChannel {
    writer: Box<dyn Write + Send>,
    peer: Option<SocketAddr>,
}

impl fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl NotificationChannel {
    /// Connect to the controller at `addr`.
    ///
    /// `timeout` bounds both the connect and every later write, so a
    /// controller that stops reading cannot stall the caller.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(timeout))?;
        debug!(%addr, "notification channel connected");
        Ok(Self {
            writer: Box::new(stream),
            peer: Some(addr),
        })
    }

    /// Wrap an arbitrary writer.
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self { writer, peer: None }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Write one event record.
    pub fn send(&mut self, packet: &InterruptPacket) -> io::Result<()> {
        let bytes = packet.encode();
        for chunk in bytes.chunks(NET_MAX_LENGTH) {
            self.writer.write_all(chunk)?;
        }
        self.writer.flush()?;
        trace!(lwpid = packet.lwpid, status = packet.status, "interrupt sent");
        Ok(())
    }
}
