//! Byte transport abstraction.
//!
//! The engine only needs to send bytes and wait for bytes with a timeout.
//! Production code would wrap a TCP stream; tests use the in-memory
//! transports from the harness.

use std::time::Duration;

use bytes::Bytes;

/// Transport failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Nothing arrived within the timeout
    #[error("no data within {0:?}")]
    Timeout(Duration),

    /// The peer closed the connection
    #[error("transport closed")]
    Closed,

    /// Underlying I/O failure
    #[error("transport I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                Self::Timeout(Duration::ZERO)
            },
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe => Self::Closed,
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Blocking, message-agnostic byte pipe to the peer.
pub trait Transport: Send {
    /// Write all of `bytes`.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next chunk of bytes.
    ///
    /// Chunk boundaries carry no meaning: one record may arrive split over
    /// several chunks, or several records in one.
    fn receive(&mut self, timeout: Duration) -> Result<Bytes, TransportError>;

    /// Close the transport. Later sends fail with [`TransportError::Closed`].
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send(bytes)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        (**self).receive(timeout)
    }

    fn close(&mut self) {
        (**self).close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_transport_errors() {
        let closed = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert_eq!(TransportError::from(closed), TransportError::Closed);

        let timeout = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert!(matches!(TransportError::from(timeout), TransportError::Timeout(_)));

        let other = std::io::Error::other("boom");
        assert_eq!(TransportError::from(other), TransportError::Io("boom".to_string()));
    }
}
