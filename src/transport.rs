//! The underlying bidirectional frame transport is an external collaborator:
//! a concrete WebSocket or TCP implementation is out of scope here. This
//! module defines the narrow interface `SConn` drives it through, plus an
//! in-memory transport used by tests and anything embedding this crate
//! without a real socket.

use crate::error::TransportError;

/// Outcome of one non-blocking pump of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    /// Nothing noteworthy; connection is alive.
    Connected,
    /// The transport was lost; `connect_break` invites a `reconnect()`.
    ConnectBreak,
    /// The initial dial timed out.
    DialTimeout,
    /// The connection was explicitly closed (locally or by the peer).
    ConnectionClosed,
}

/// The result of one `Transport::update` call.
#[derive(Debug, Clone)]
pub struct TransportUpdate {
    pub ok: bool,
    pub status: TransportStatus,
    pub error: Option<String>,
}

impl TransportUpdate {
    pub fn ok() -> Self {
        TransportUpdate {
            ok: true,
            status: TransportStatus::Connected,
            error: None,
        }
    }

    pub fn broken(status: TransportStatus, error: impl Into<String>) -> Self {
        TransportUpdate {
            ok: false,
            status,
            error: Some(error.into()),
        }
    }
}

/// A whole-frame, bidirectional, non-blocking byte transport.
///
/// Implementations deliver complete frames (the 2-byte length-prefix framing
/// is already stripped) and must never block in `update`.
pub trait Transport {
    /// Queue a frame for transmission. Implementations may buffer internally.
    fn send(&mut self, frame: &[u8]);

    /// Non-blocking pump: advances the transport's internal I/O one step.
    fn update(&mut self) -> TransportUpdate;

    /// Drain and return any whole frames received since the last call.
    fn take_frames(&mut self) -> Vec<Vec<u8>>;

    fn is_connected(&self) -> bool;

    fn close(&mut self);
}

/// An in-process transport used for tests and embedding without real I/O:
/// frames pushed with `deliver` surface on the next `update`/`take_frames`,
/// and frames passed to `send` are recorded in `sent` for inspection.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub sent: Vec<Vec<u8>>,
    pending_inbound: Vec<Vec<u8>>,
    connected: bool,
    next_status: Option<TransportStatus>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            sent: Vec::new(),
            pending_inbound: Vec::new(),
            connected: true,
            next_status: None,
        }
    }

    /// Queue a frame as if it had arrived from the peer.
    pub fn deliver(&mut self, frame: Vec<u8>) {
        self.pending_inbound.push(frame);
    }

    /// Force the next `update()` to report a broken connection.
    pub fn break_connection(&mut self) {
        self.connected = false;
        self.next_status = Some(TransportStatus::ConnectBreak);
    }
}

impl Transport for MockTransport {
    fn send(&mut self, frame: &[u8]) {
        self.sent.push(frame.to_vec());
    }

    fn update(&mut self) -> TransportUpdate {
        if let Some(status) = self.next_status.take() {
            return TransportUpdate::broken(status.clone(), format!("{:?}", status));
        }
        TransportUpdate::ok()
    }

    fn take_frames(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending_inbound)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) {
        self.connected = false;
    }
}

impl From<TransportStatus> for TransportError {
    fn from(status: TransportStatus) -> Self {
        match status {
            TransportStatus::DialTimeout => TransportError::DialTimeout,
            TransportStatus::ConnectionClosed => TransportError::ConnectionClosed,
            TransportStatus::ConnectBreak => TransportError::ConnectBreak,
            TransportStatus::Connected => {
                unreachable!("Connected status never converts to an error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_transport_records_sent_frames() {
        let mut t = MockTransport::new();
        t.send(b"hello");
        assert_eq!(t.sent, vec![b"hello".to_vec()]);
    }

    #[test]
    fn test_mock_transport_delivers_then_drains() {
        let mut t = MockTransport::new();
        t.deliver(b"a".to_vec());
        t.deliver(b"b".to_vec());
        assert_eq!(t.take_frames(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(t.take_frames().is_empty());
    }

    #[test]
    fn test_mock_transport_break_connection() {
        let mut t = MockTransport::new();
        t.break_connection();
        let update = t.update();
        assert!(!update.ok);
        assert_eq!(update.status, TransportStatus::ConnectBreak);
        assert!(!t.is_connected());
    }
}
