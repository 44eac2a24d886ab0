//! Resumable session state machine.
//!
//! Drives a [`Transport`] through the handshake, steady-state forwarding, and
//! reconnect protocol described in the external interface: a DH-authenticated
//! handshake establishes a shared secret, after which `forward` carries
//! opaque application frames, and `reconnect` re-derives how much data each
//! side actually received so the unacknowledged tail can be replayed from
//! the local cache.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::crypto::{self, DhPrivateKey, SHARED_SECRET_SIZE};
use crate::error::{ResumptionError, SprotoError, TransportError};
use crate::replay::ReplayCache;
use crate::transport::{Transport, TransportStatus};

/// Current phase of the resumable session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SConnState {
    NewConnect,
    Forward,
    Reconnect,
    ReconnectError,
    ReconnectMatchError,
    ReconnectCacheError,
    Close,
}

/// Structured result of one `SConn::update()` tick.
#[derive(Debug)]
pub struct UpdateResult {
    pub ok: bool,
    pub status: TransportStatus,
    pub error: Option<SprotoError>,
}

impl UpdateResult {
    fn ok() -> Self {
        UpdateResult {
            ok: true,
            status: TransportStatus::Connected,
            error: None,
        }
    }
}

type ReconnectCallback = Box<dyn FnOnce(bool)>;

/// A resumable session over a whole-frame [`Transport`].
pub struct SConn<T: Transport> {
    transport: T,
    state: SConnState,
    session_id: Option<u64>,
    reconnect_index: u64,
    sent_bytes: u64,
    recv_bytes: u64,
    dh_key: Option<DhPrivateKey>,
    shared_secret: Option<[u8; SHARED_SECRET_SIZE]>,
    replay_cache: ReplayCache,
    pre_handshake_queue: Vec<Vec<u8>>,
    inbound: VecDeque<Vec<u8>>,
    recv_queue: VecDeque<Vec<u8>>,
    pending_reconnect_cb: Option<ReconnectCallback>,
}

impl<T: Transport> SConn<T> {
    /// Begin a new session: generates a DH keypair and transmits the
    /// `newconnect` handshake frame.
    pub fn connect(mut transport: T, target_server: &str, flag: &str) -> Self {
        let dh_key = DhPrivateKey::generate();
        let pub_b64 = crypto::base64_encode(&dh_key.public_value());
        let handshake = format!("0\n{}\n{}\n{}", pub_b64, target_server, flag);
        transport.send(handshake.as_bytes());

        SConn {
            transport,
            state: SConnState::NewConnect,
            session_id: None,
            reconnect_index: 0,
            sent_bytes: 0,
            recv_bytes: 0,
            dh_key: Some(dh_key),
            shared_secret: None,
            replay_cache: ReplayCache::new(),
            pre_handshake_queue: Vec::new(),
            inbound: VecDeque::new(),
            recv_queue: VecDeque::new(),
            pending_reconnect_cb: None,
        }
    }

    pub fn state(&self) -> SConnState {
        self.state
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session_id
    }

    pub fn reconnect_index(&self) -> u64 {
        self.reconnect_index
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    pub fn recv_bytes(&self) -> u64 {
        self.recv_bytes
    }

    pub fn is_connected(&self) -> bool {
        self.state == SConnState::Forward
    }

    /// Send application data. Behavior depends on the current state: queued
    /// pre-handshake, transmitted and cached in `forward`, cached-only (not
    /// transmitted) mid-`reconnect`, or silently dropped in terminal states.
    pub fn send(&mut self, data: &[u8]) {
        match self.state {
            SConnState::NewConnect => {
                self.pre_handshake_queue.push(data.to_vec());
            }
            SConnState::Forward => {
                self.transport.send(data);
                self.sent_bytes += data.len() as u64;
                self.replay_cache.insert(data);
            }
            SConnState::Reconnect => {
                self.sent_bytes += data.len() as u64;
                self.replay_cache.insert(data);
            }
            SConnState::ReconnectError
            | SConnState::ReconnectMatchError
            | SConnState::ReconnectCacheError
            | SConnState::Close => {
                debug!("sconn: dropping send on terminal state {:?}", self.state);
            }
        }
    }

    /// Pop one application frame received while in `forward`, if any.
    pub fn recv(&mut self) -> Option<Vec<u8>> {
        self.recv_queue.pop_front()
    }

    /// Tick the session: pumps the transport, then dispatches at most one
    /// queued inbound frame through the current state's handler.
    pub fn update(&mut self) -> UpdateResult {
        let transport_update = self.transport.update();
        if !transport_update.ok {
            let err: TransportError = transport_update.status.clone().into();
            return UpdateResult {
                ok: false,
                status: transport_update.status,
                error: Some(SprotoError::Transport(err)),
            };
        }

        self.inbound.extend(self.transport.take_frames());

        if let Some(frame) = self.inbound.pop_front() {
            if let Err(e) = self.dispatch(frame) {
                return UpdateResult {
                    ok: false,
                    status: TransportStatus::Connected,
                    error: Some(e),
                };
            }
        }

        UpdateResult::ok()
    }

    fn dispatch(&mut self, frame: Vec<u8>) -> Result<(), SprotoError> {
        match self.state {
            SConnState::NewConnect => self.handle_newconnect_reply(&frame),
            SConnState::Forward => {
                self.recv_bytes += frame.len() as u64;
                self.recv_queue.push_back(frame);
                Ok(())
            }
            SConnState::Reconnect => self.handle_reconnect_reply(&frame),
            SConnState::ReconnectError
            | SConnState::ReconnectMatchError
            | SConnState::ReconnectCacheError
            | SConnState::Close => {
                debug!("sconn: dropping inbound frame on terminal state {:?}", self.state);
                Ok(())
            }
        }
    }

    fn handle_newconnect_reply(&mut self, frame: &[u8]) -> Result<(), SprotoError> {
        let text = String::from_utf8_lossy(frame);
        let mut lines = text.split('\n');

        let id_str = lines.next().unwrap_or("");
        let server_pub_b64 = lines.next().unwrap_or("");

        let id: u64 = id_str.parse().map_err(|_| {
            SprotoError::Resumption(ResumptionError::ReconnectError {
                code: format!("malformed handshake reply id '{}'", id_str),
            })
        })?;

        let server_pub = crypto::base64_decode(server_pub_b64).map_err(|e| {
            SprotoError::Resumption(ResumptionError::ReconnectError {
                code: format!("malformed handshake reply pubkey: {}", e),
            })
        })?;

        let dh_key = self
            .dh_key
            .take()
            .expect("newconnect reply handled only once, dh_key is present until then");
        let secret = dh_key.shared_secret(&server_pub);

        self.session_id = Some(id);
        self.shared_secret = Some(secret);
        self.state = SConnState::Forward;

        for queued in std::mem::take(&mut self.pre_handshake_queue) {
            self.transport.send(&queued);
            self.sent_bytes += queued.len() as u64;
            self.replay_cache.insert(&queued);
        }

        Ok(())
    }

    fn handle_reconnect_reply(&mut self, frame: &[u8]) -> Result<(), SprotoError> {
        let text = String::from_utf8_lossy(frame);
        let mut lines = text.split('\n');

        let server_recv_str = lines.next().unwrap_or("");
        let code = lines.next().unwrap_or("").to_string();

        let server_recv: u64 = match server_recv_str.parse() {
            Ok(v) => v,
            Err(_) => {
                self.state = SConnState::ReconnectError;
                self.invoke_reconnect_cb(false);
                return Err(SprotoError::Resumption(ResumptionError::ReconnectError {
                    code: format!("malformed reconnect reply bytes '{}'", server_recv_str),
                }));
            }
        };

        if code != "200" {
            self.state = SConnState::ReconnectError;
            self.invoke_reconnect_cb(false);
            return Err(SprotoError::Resumption(ResumptionError::ReconnectError { code }));
        }

        if server_recv > self.sent_bytes {
            self.state = SConnState::ReconnectMatchError;
            self.invoke_reconnect_cb(false);
            return Err(SprotoError::Resumption(ResumptionError::ReconnectMatchError {
                server_recv,
                sent_bytes: self.sent_bytes,
            }));
        }

        if server_recv < self.sent_bytes {
            let needed = self.sent_bytes - server_recv;
            match self.replay_cache.get(needed) {
                Some(tail) => {
                    self.transport.send(&tail);
                }
                None => {
                    self.state = SConnState::ReconnectCacheError;
                    self.invoke_reconnect_cb(false);
                    return Err(SprotoError::Resumption(ResumptionError::ReconnectCacheError {
                        needed,
                        available: self.replay_cache.cached_len(),
                    }));
                }
            }
        }

        self.state = SConnState::Forward;
        self.invoke_reconnect_cb(true);
        Ok(())
    }

    fn invoke_reconnect_cb(&mut self, ok: bool) {
        if let Some(cb) = self.pending_reconnect_cb.take() {
            cb(ok);
        }
    }

    /// Attempt to resume the session: only valid from `forward` or `reconnect`.
    /// Composes and transmits the reconnect handshake frame, proving
    /// knowledge of the shared secret via HMAC-MD5 without transmitting it.
    pub fn reconnect(&mut self, cb: Option<ReconnectCallback>) {
        if !matches!(self.state, SConnState::Forward | SConnState::Reconnect) {
            warn!("sconn: reconnect() called from state {:?}, ignoring", self.state);
            if let Some(cb) = cb {
                cb(false);
            }
            return;
        }

        let session_id = self
            .session_id
            .expect("forward/reconnect states always have a session id");
        let secret = self
            .shared_secret
            .expect("forward/reconnect states always have a shared secret");

        self.reconnect_index += 1;
        let content = format!("{}\n{}\n{}\n", session_id, self.reconnect_index, self.recv_bytes);
        let hmac = crypto::hmac_md5_of_hash(&secret, content.as_bytes());
        let frame = format!("{}{}\n", content, crypto::base64_encode(&hmac));

        self.transport.send(frame.as_bytes());
        self.state = SConnState::Reconnect;
        self.pending_reconnect_cb = cb;
    }

    /// Tear the session down. Subsequent sends and inbound frames are no-ops.
    pub fn close(&mut self) {
        self.transport.close();
        self.state = SConnState::Close;
        self.pre_handshake_queue.clear();
        self.recv_queue.clear();
        self.inbound.clear();
        self.pending_reconnect_cb = None;
    }

    /// Direct access to the underlying transport, for the host layer to
    /// drive tests against a [`MockTransport`](crate::transport::MockTransport)
    /// without exposing the transport as part of the public surface.
    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn handshake_reply(id: u64, server_pub: &[u8]) -> Vec<u8> {
        format!("{}\n{}\n", id, crypto::base64_encode(server_pub)).into_bytes()
    }

    #[test]
    fn test_scenario_handshake() {
        let transport = MockTransport::new();
        let mut conn = SConn::connect(transport, "zone1", "0");
        assert_eq!(conn.state(), SConnState::NewConnect);

        let server_key = DhPrivateKey::generate();
        let client_pub = conn.dh_key.as_ref().unwrap().public_value();
        let expected_secret = server_key.shared_secret(&client_pub);
        let server_pub = server_key.public_value();

        conn.transport_mut().deliver(handshake_reply(42, &server_pub));
        let result = conn.update();

        assert!(result.ok);
        assert_eq!(conn.state(), SConnState::Forward);
        assert_eq!(conn.session_id(), Some(42));
        assert_eq!(conn.shared_secret.unwrap(), expected_secret);
    }

    #[test]
    fn test_send_before_handshake_is_queued_not_cached() {
        let transport = MockTransport::new();
        let mut conn = SConn::connect(transport, "zone1", "0");
        conn.send(b"queued message");
        assert_eq!(conn.sent_bytes(), 0);
        assert!(conn.replay_cache.is_empty());
    }

    #[test]
    fn test_forward_send_transmits_and_caches() {
        let transport = MockTransport::new();
        let mut conn = SConn::connect(transport, "zone1", "0");
        complete_handshake(&mut conn);

        conn.send(b"payload");
        assert_eq!(conn.sent_bytes(), 7);
        assert_eq!(conn.replay_cache.get(7).unwrap(), b"payload".to_vec());
    }

    #[test]
    fn test_scenario_resumption_with_retransmit() {
        let transport = MockTransport::new();
        let mut conn = SConn::connect(transport, "zone1", "0");
        complete_handshake(&mut conn);

        conn.send(&vec![1u8; 600]);
        conn.send(&vec![2u8; 400]);
        assert_eq!(conn.sent_bytes(), 1000);

        conn.reconnect(None);
        assert_eq!(conn.state(), SConnState::Reconnect);
        assert_eq!(conn.reconnect_index(), 1);

        conn.transport_mut().deliver(b"600\n200\n".to_vec());
        let result = conn.update();

        assert!(result.ok);
        assert_eq!(conn.state(), SConnState::Forward);
        assert_eq!(conn.sent_bytes(), 1000);

        let last_sent = conn.transport_mut().sent.last().unwrap().clone();
        assert_eq!(last_sent, vec![2u8; 400]);
    }

    #[test]
    fn test_scenario_resumption_cache_overflow_failure() {
        let transport = MockTransport::new();
        let mut conn = SConn::connect(transport, "zone1", "0");
        complete_handshake(&mut conn);

        // Evict the first 500 of 2000 sent bytes by inserting more than the
        // cache can hold, mirroring the scenario's "already evicted" setup.
        conn.sent_bytes = 2000;
        for _ in 0..2 {
            conn.replay_cache.insert(&vec![9u8; 750]);
        }

        let invoked = std::rc::Rc::new(std::cell::RefCell::new(None));
        let invoked_clone = invoked.clone();
        conn.reconnect(Some(Box::new(move |ok| {
            *invoked_clone.borrow_mut() = Some(ok);
        })));

        conn.transport_mut().deliver(b"100\n200\n".to_vec());
        let result = conn.update();

        assert!(!result.ok);
        assert_eq!(conn.state(), SConnState::ReconnectCacheError);
        assert_eq!(*invoked.borrow(), Some(false));
    }

    #[test]
    fn test_reconnect_match_error_when_server_overclaims() {
        let transport = MockTransport::new();
        let mut conn = SConn::connect(transport, "zone1", "0");
        complete_handshake(&mut conn);
        conn.send(b"only-ten!!"); // 10 bytes

        conn.reconnect(None);
        conn.transport_mut().deliver(b"999\n200\n".to_vec());
        let result = conn.update();

        assert!(!result.ok);
        assert_eq!(conn.state(), SConnState::ReconnectMatchError);
    }

    #[test]
    fn test_reconnect_error_on_non_200() {
        let transport = MockTransport::new();
        let mut conn = SConn::connect(transport, "zone1", "0");
        complete_handshake(&mut conn);

        conn.reconnect(None);
        conn.transport_mut().deliver(b"0\n403\n".to_vec());
        let result = conn.update();

        assert!(!result.ok);
        assert_eq!(conn.state(), SConnState::ReconnectError);
    }

    #[test]
    fn test_close_drops_queued_state() {
        let transport = MockTransport::new();
        let mut conn = SConn::connect(transport, "zone1", "0");
        complete_handshake(&mut conn);
        conn.send(b"hi");
        conn.close();
        assert_eq!(conn.state(), SConnState::Close);
        assert!(!conn.is_connected());

        // Sends and inbound frames after close are no-ops.
        conn.send(b"dropped");
        assert_eq!(conn.sent_bytes(), 2);
    }

    // Helper: drive a fresh SConn through a successful handshake.
    fn complete_handshake(conn: &mut SConn<MockTransport>) {
        let server_key = DhPrivateKey::generate();
        let client_pub = conn.dh_key.as_ref().unwrap().public_value();
        let server_pub = server_key.public_value();
        let _ = server_key.shared_secret(&client_pub);
        conn.transport_mut().deliver(handshake_reply(7, &server_pub));
        conn.update();
    }
}
