//! Request/response multiplexer: attaches session ids to outbound sproto
//! messages, matches inbound responses back to the call that sent them, and
//! routes inbound requests to registered handlers.
//!
//! Sits directly on top of an [`SConn`]: every outbound package is framed
//! and handed to the session's `send`, and every dispatched package is
//! pulled from the session's `recv`.

use std::collections::HashMap;

use log::warn;

use crate::codec;
use crate::error::{DecodeError, HostError};
use crate::pack;
use crate::sconn::SConn;
use crate::transport::Transport;
use crate::types::Sproto;
use crate::value::SprotoValue;

/// What a pending call is waiting for.
enum PendingKind {
    Typed(usize),
    ConfirmOnly,
}

struct Pending {
    kind: PendingKind,
    resolve: Box<dyn FnOnce(Result<Option<SprotoValue>, HostError>)>,
}

type Handler = Box<dyn FnMut(SprotoValue) -> Option<SprotoValue>>;

/// Request/response host wrapping a resumable session.
pub struct Host<T: Transport> {
    sconn: SConn<T>,
    sproto: Sproto,
    package_type_idx: usize,
    next_session: u32,
    pending: HashMap<u32, Pending>,
    handlers: HashMap<String, Handler>,
}

impl<T: Transport> Host<T> {
    /// Attach a host to a session, using `package_type_name` (typically
    /// `"base.package"`) as the schema-declared package header type.
    pub fn new(sconn: SConn<T>, sproto: Sproto, package_type_name: &str) -> Result<Self, HostError> {
        let package_type_idx = sproto
            .get_type_index(package_type_name)
            .ok_or_else(|| HostError::PackageTypeNotFound(package_type_name.to_string()))?;
        Ok(Host {
            sconn,
            sproto,
            package_type_idx,
            next_session: 0,
            pending: HashMap::new(),
            handlers: HashMap::new(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.sconn.is_connected()
    }

    pub fn close(&mut self) {
        self.sconn.close();
        for (_, pending) in self.pending.drain() {
            (pending.resolve)(Err(HostError::SessionClosed));
        }
    }

    pub fn reconnect(&mut self, cb: Option<Box<dyn FnOnce(bool)>>) {
        self.sconn.reconnect(cb);
    }

    /// Install a handler for inbound requests to `name`. Duplicate
    /// registration is an error.
    pub fn register(
        &mut self,
        name: &str,
        handler: impl FnMut(SprotoValue) -> Option<SprotoValue> + 'static,
    ) -> Result<(), HostError> {
        if self.handlers.contains_key(name) {
            return Err(HostError::DuplicateHandler(name.to_string()));
        }
        self.handlers.insert(name.to_string(), Box::new(handler));
        Ok(())
    }

    /// Send a request and register `resolve` to run when its response (or a
    /// closed-session error) arrives.
    pub fn call(
        &mut self,
        name: &str,
        args: &SprotoValue,
        resolve: impl FnOnce(Result<Option<SprotoValue>, HostError>) + 'static,
    ) -> Result<(), HostError> {
        let proto = self
            .sproto
            .get_protocol(name)
            .ok_or_else(|| HostError::UnknownProtocol(name.to_string()))?
            .clone();

        let kind = match proto.response {
            Some(idx) => PendingKind::Typed(idx),
            None if proto.confirm => PendingKind::ConfirmOnly,
            None => return Err(HostError::NotAwaitable(name.to_string())),
        };

        let session = self.next_session;
        self.next_session = self.next_session.wrapping_add(1);

        let frame = self.build_request(&proto.name, Some(session), args)?;
        self.pending.insert(
            session,
            Pending {
                kind,
                resolve: Box::new(resolve),
            },
        );

        self.sconn.send(&frame);
        Ok(())
    }

    /// Send a request with no session attached; no response is awaited.
    pub fn invoke(&mut self, name: &str, args: &SprotoValue) -> Result<(), HostError> {
        let frame = self.build_request(name, None, args)?;
        self.sconn.send(&frame);
        Ok(())
    }

    fn build_request(
        &self,
        name: &str,
        session: Option<u32>,
        args: &SprotoValue,
    ) -> Result<Vec<u8>, HostError> {
        let proto = self
            .sproto
            .get_protocol(name)
            .ok_or_else(|| HostError::UnknownProtocol(name.to_string()))?;

        let mut header_fields: Vec<(&str, SprotoValue)> =
            vec![("type", SprotoValue::Integer(proto.tag as i64))];
        if let Some(s) = session {
            header_fields.push(("session", SprotoValue::Integer(s as i64)));
        }
        let header = SprotoValue::from_fields(header_fields);
        let package_type = &self.sproto.types_list[self.package_type_idx];
        let header_bin = codec::encode(&self.sproto, package_type, &header)?;

        let body_bin = match proto.request {
            Some(req_idx) => {
                let req_type = &self.sproto.types_list[req_idx];
                codec::encode(&self.sproto, req_type, args)?
            }
            None => Vec::new(),
        };

        let mut combined = header_bin;
        combined.extend_from_slice(&body_bin);
        Ok(pack::pack(&combined))
    }

    /// Pump the underlying session, dispatching every frame it has received
    /// since the last call. Returns the underlying session's update result.
    pub fn update(&mut self) -> crate::sconn::UpdateResult {
        let result = self.sconn.update();
        while let Some(frame) = self.sconn.recv() {
            if let Err(e) = self.dispatch(&frame) {
                warn!("host: dropping undeliverable frame: {}", e);
            }
        }
        result
    }

    /// Unpack and route one inbound package: a request goes to its
    /// registered handler (replying if one is declared and returned), a
    /// response is matched to its pending call by session id.
    fn dispatch(&mut self, frame: &[u8]) -> Result<(), HostError> {
        let unpacked = pack::unpack(frame)?;
        let package_type = &self.sproto.types_list[self.package_type_idx];
        let header_len = codec::objlen(&self.sproto, package_type, &unpacked)?;
        let header = codec::decode(&self.sproto, package_type, &unpacked)?;
        let body = &unpacked[header_len..];

        let header_map = header
            .as_struct()
            .ok_or_else(|| HostError::Decode(DecodeError::InvalidData("package header is not a struct".into())))?;

        let proto_tag = header_map.get("type").and_then(|v| v.as_integer());
        let session = header_map.get("session").and_then(|v| v.as_integer());

        match proto_tag {
            Some(tag) => self.dispatch_request(tag as u16, session.map(|s| s as u32), body),
            None => {
                let session = session.ok_or_else(|| {
                    HostError::Decode(DecodeError::InvalidData("response without session".into()))
                })? as u32;
                self.dispatch_response(session, body)
            }
        }
    }

    fn dispatch_request(&mut self, tag: u16, session: Option<u32>, body: &[u8]) -> Result<(), HostError> {
        let proto = self
            .sproto
            .get_protocol_by_tag(tag)
            .ok_or_else(|| HostError::UnknownProtocol(format!("tag {}", tag)))?
            .clone();

        let request = match proto.request {
            Some(req_idx) if !body.is_empty() => {
                let req_type = &self.sproto.types_list[req_idx];
                codec::decode(&self.sproto, req_type, body)?
            }
            _ => SprotoValue::new_struct(),
        };

        let Some(handler) = self.handlers.get_mut(&proto.name) else {
            return Ok(());
        };
        let response = handler(request);

        if let (Some(session), Some(response_value)) = (session, response) {
            let response_bin = match proto.response {
                Some(resp_idx) => {
                    let resp_type = &self.sproto.types_list[resp_idx];
                    codec::encode(&self.sproto, resp_type, &response_value)?
                }
                None => Vec::new(),
            };

            let header = SprotoValue::from_fields(vec![(
                "session",
                SprotoValue::Integer(session as i64),
            )]);
            let package_type = &self.sproto.types_list[self.package_type_idx];
            let header_bin = codec::encode(&self.sproto, package_type, &header)?;

            let mut combined = header_bin;
            combined.extend_from_slice(&response_bin);
            self.sconn.send(&pack::pack(&combined));
        }

        Ok(())
    }

    fn dispatch_response(&mut self, session: u32, body: &[u8]) -> Result<(), HostError> {
        let Some(pending) = self.pending.remove(&session) else {
            return Err(HostError::UnknownSession(session));
        };

        let message = match pending.kind {
            PendingKind::Typed(idx) if !body.is_empty() => {
                let resp_type = &self.sproto.types_list[idx];
                Some(codec::decode(&self.sproto, resp_type, body)?)
            }
            PendingKind::Typed(_) | PendingKind::ConfirmOnly => None,
        };

        (pending.resolve)(Ok(message));
        Ok(())
    }
}
