// SPDX-License-Identifier: Apache-2.0

//! Transport-facing session layer.  The transport collaborator owns the
//! actual connections; this module defines the handle it passes around, the
//! outbound queue seam it implements, and the per-session protocol state.

use crate::errors::Error;
use crate::otrp::OtrpSession;
use crate::store::IManifestStore;
use crate::teep::TeepSession;

pub const TEEP_CBOR_MEDIA_TYPE: &str = "application/teep+cbor";
pub const TEEP_JSON_MEDIA_TYPE: &str = "application/teep+json";
pub const OTRP_JSON_MEDIA_TYPE: &str = "application/otrp+json";

/// Opaque identifier for one transport connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Where a session sits in its exchange.  Any processing failure is
/// terminal: a `Failed` session never sends or accepts anything further.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TamState {
    Idle,
    AwaitingQueryResponse,
    AwaitingInstallCompletion,
    Failed,
}

/// Outbound message queue provided by the transport collaborator.
pub trait IOutboundQueue {
    fn enqueue(
        &self,
        session: SessionHandle,
        media_type: &str,
        message: &[u8],
    ) -> Result<(), Error>;
}

/// A live exchange with one device, speaking whichever protocol the device
/// asked for at connect time.
pub enum Session {
    Teep(TeepSession),
    Otrp(OtrpSession),
}

impl Session {
    /// Handle a new connection: pick the protocol from the accept media
    /// type and send the opening request.
    pub fn process_connect(
        handle: SessionHandle,
        accept_media_type: &str,
        outbound: &dyn IOutboundQueue,
    ) -> Result<Self, Error> {
        match accept_media_type {
            TEEP_CBOR_MEDIA_TYPE | TEEP_JSON_MEDIA_TYPE => {
                let mut s = TeepSession::new(handle, accept_media_type)?;
                s.on_connect(outbound)?;
                Ok(Session::Teep(s))
            }
            OTRP_JSON_MEDIA_TYPE => {
                let mut s = OtrpSession::new(handle);
                s.on_connect(outbound)?;
                Ok(Session::Otrp(s))
            }
            other => Err(Error::UnsupportedParameter(format!(
                "accept media type {other}"
            ))),
        }
    }

    pub fn state(&self) -> TamState {
        match self {
            Session::Teep(s) => s.state(),
            Session::Otrp(s) => s.state(),
        }
    }

    /// Feed one inbound message to the session.
    pub fn on_message(
        &mut self,
        outbound: &dyn IOutboundQueue,
        manifests: &dyn IManifestStore,
        message: &[u8],
    ) -> Result<(), Error> {
        match self {
            Session::Teep(s) => s.on_message(outbound, manifests, message),
            Session::Otrp(s) => s.on_message(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockQueue {
        sent: Mutex<Vec<(SessionHandle, String)>>,
    }

    impl IOutboundQueue for MockQueue {
        fn enqueue(
            &self,
            session: SessionHandle,
            media_type: &str,
            _message: &[u8],
        ) -> Result<(), Error> {
            self.sent
                .lock()
                .unwrap()
                .push((session, media_type.to_string()));
            Ok(())
        }
    }

    #[test]
    fn connect_dispatches_on_media_type() {
        let queue = MockQueue::default();

        let teep =
            Session::process_connect(SessionHandle::new(1), TEEP_CBOR_MEDIA_TYPE, &queue)
                .unwrap();
        let otrp =
            Session::process_connect(SessionHandle::new(2), OTRP_JSON_MEDIA_TYPE, &queue)
                .unwrap();

        assert!(matches!(teep, Session::Teep(_)));
        assert!(matches!(otrp, Session::Otrp(_)));
        assert_eq!(teep.state(), TamState::AwaitingQueryResponse);
        assert_eq!(otrp.state(), TamState::AwaitingQueryResponse);

        let sent = queue.sent.lock().unwrap();
        assert_eq!(sent[0], (SessionHandle::new(1), TEEP_CBOR_MEDIA_TYPE.to_string()));
        assert_eq!(sent[1], (SessionHandle::new(2), OTRP_JSON_MEDIA_TYPE.to_string()));
    }

    #[test]
    fn connect_rejects_unknown_media_type() {
        let queue = MockQueue::default();

        let r = Session::process_connect(SessionHandle::new(3), "text/plain", &queue);

        assert!(matches!(r, Err(Error::UnsupportedParameter(_))));
        assert!(queue.sent.lock().unwrap().is_empty());
    }
}
