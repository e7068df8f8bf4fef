//! In-memory transports.
//!
//! [`LoopbackTransport`] connects two connections in the same process, so a
//! trace can drive both ends of a handshake. [`ScriptedTransport`] plays
//! canned peer responses and records what was written.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, PoisonError,
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    time::Duration,
};

use bytes::Bytes;
use tlsmith_core::{Transport, TransportError};

/// One end of an in-process byte pipe.
#[derive(Debug)]
pub struct LoopbackTransport {
    outbound: Option<Sender<Bytes>>,
    inbound: Receiver<Bytes>,
}

impl LoopbackTransport {
    /// Two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel();
        let (b_tx, b_rx) = mpsc::channel();
        (Self { outbound: Some(a_tx), inbound: b_rx }, Self { outbound: Some(b_tx), inbound: a_rx })
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        outbound.send(Bytes::copy_from_slice(bytes)).map_err(|_| TransportError::Closed)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        self.inbound.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => TransportError::Timeout(timeout),
            RecvTimeoutError::Disconnected => TransportError::Closed,
        })
    }

    fn close(&mut self) {
        self.outbound = None;
    }
}

/// Shared record of everything written to a [`ScriptedTransport`].
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<Bytes>>>);

impl SentLog {
    fn push(&self, bytes: Bytes) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(bytes);
    }

    /// Every write, in order.
    pub fn writes(&self) -> Vec<Bytes> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// All writes joined.
    pub fn concatenated(&self) -> Vec<u8> {
        self.writes().iter().flat_map(|chunk| chunk.iter().copied()).collect()
    }
}

/// Transport that replays canned reads.
///
/// Each `receive` returns the next scripted chunk. Once the script runs out
/// every `receive` times out immediately, without sleeping.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: VecDeque<Bytes>,
    sent: SentLog,
    closed: bool,
}

impl ScriptedTransport {
    /// Transport replaying `responses`, plus a handle on its writes.
    pub fn new<I, B>(responses: I) -> (Self, SentLog)
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let sent = SentLog::default();
        let transport = Self {
            responses: responses.into_iter().map(Into::into).collect(),
            sent: sent.clone(),
            closed: false,
        };
        (transport, sent)
    }

    /// Transport replaying `bytes` split at the given offsets.
    pub fn split(bytes: &[u8], cuts: &[usize]) -> (Self, SentLog) {
        let mut chunks = Vec::with_capacity(cuts.len() + 1);
        let mut start = 0;
        for &cut in cuts {
            let cut = cut.clamp(start, bytes.len());
            chunks.push(Bytes::copy_from_slice(&bytes[start..cut]));
            start = cut;
        }
        chunks.push(Bytes::copy_from_slice(&bytes[start..]));
        Self::new(chunks)
    }

    /// Chunks not yet read.
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sent.push(Bytes::copy_from_slice(bytes));
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        self.responses.pop_front().ok_or(TransportError::Timeout(timeout))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_delivers_in_order() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.send(b"one").expect("send");
        a.send(b"two").expect("send");

        let timeout = Duration::from_millis(10);
        assert_eq!(b.receive(timeout).expect("first").as_ref(), b"one");
        assert_eq!(b.receive(timeout).expect("second").as_ref(), b"two");
        assert_eq!(b.receive(timeout), Err(TransportError::Timeout(timeout)));
    }

    #[test]
    fn closed_loopback_reports_closed() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.close();

        assert_eq!(a.send(b"x"), Err(TransportError::Closed));
        assert_eq!(b.receive(Duration::from_millis(10)), Err(TransportError::Closed));
    }

    #[test]
    fn scripted_transport_splits_and_records() {
        let (mut transport, sent) = ScriptedTransport::split(b"abcdef", &[2, 2, 5]);
        let timeout = Duration::ZERO;

        let chunks: Vec<Bytes> = std::iter::from_fn(|| transport.receive(timeout).ok()).collect();
        assert_eq!(chunks.concat(), b"abcdef");
        assert_eq!(chunks.len(), 4);

        transport.send(b"hi").expect("send");
        assert_eq!(sent.concatenated(), b"hi");
    }
}
