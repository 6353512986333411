// SPDX-License-Identifier: Apache-2.0

use super::message::{
    Install, QueryRequest, QueryResponse, RequestedComponentInfo, TeepMessage,
    DEFAULT_MAX_MESSAGE_SIZE, TEEP_MESSAGE_QUERY_REQUEST, TEEP_TRUSTED_COMPONENTS, TOKEN_LENGTH,
};
use crate::errors::Error;
use crate::session::{
    IOutboundQueue, SessionHandle, TamState, TEEP_CBOR_MEDIA_TYPE, TEEP_JSON_MEDIA_TYPE,
};
use crate::store::IManifestStore;
use crate::tam::secure_random;
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use tracing::{debug, info};

/// Decide whether a requested component gets installed.
///
/// Placeholder policy: install everything the device offers.  A real
/// deployment hangs its provisioning policy here.
fn should_install(_rci: &RequestedComponentInfo) -> bool {
    true
}

/// One TEEP exchange with a device, driven by the transport collaborator.
/// Messages must be fed in arrival order; any validation failure is terminal
/// for the session.
pub struct TeepSession {
    handle: SessionHandle,
    media_type: String,
    state: TamState,
}

impl TeepSession {
    /// Create a session for the given accept media type.  An unrecognized
    /// media type fails the connection setup.
    pub fn new(handle: SessionHandle, media_type: &str) -> Result<Self, Error> {
        match media_type {
            TEEP_CBOR_MEDIA_TYPE | TEEP_JSON_MEDIA_TYPE => Ok(Self {
                handle,
                media_type: media_type.to_string(),
                state: TamState::Idle,
            }),
            other => Err(Error::UnsupportedParameter(format!(
                "accept media type {other}"
            ))),
        }
    }

    pub fn state(&self) -> TamState {
        self.state
    }

    /// Handle the inbound connect event: compose and send a QueryRequest.
    pub fn on_connect(&mut self, outbound: &dyn IOutboundQueue) -> Result<(), Error> {
        if self.state != TamState::Idle {
            return Err(Error::MalformedMessage(format!(
                "connect event in state {:?}",
                self.state
            )));
        }

        info!(session = self.handle.id(), "received client connection");

        let encoded = if self.media_type == TEEP_JSON_MEDIA_TYPE {
            compose_json_query_request()?
        } else {
            QueryRequest::compose()?.encode(DEFAULT_MAX_MESSAGE_SIZE)?
        };

        debug!(session = self.handle.id(), "sending QueryRequest");

        outbound.enqueue(self.handle, &self.media_type, &encoded)?;

        self.state = TamState::AwaitingQueryResponse;

        Ok(())
    }

    /// Handle an inbound message from the device agent.  On any decode,
    /// authentication or composition failure the session moves to `Failed`
    /// and the error is returned; no reply is sent for failed input.
    pub fn on_message(
        &mut self,
        outbound: &dyn IOutboundQueue,
        manifests: &dyn IManifestStore,
        message: &[u8],
    ) -> Result<(), Error> {
        let r = self.handle_message(outbound, manifests, message);

        if r.is_err() {
            self.state = TamState::Failed;
        }

        r
    }

    fn handle_message(
        &mut self,
        outbound: &dyn IOutboundQueue,
        manifests: &dyn IManifestStore,
        message: &[u8],
    ) -> Result<(), Error> {
        if self.media_type == TEEP_JSON_MEDIA_TYPE {
            // No inbound TEEP/JSON message kind is implemented.
            return Err(Error::MalformedMessage(
                "unrecognized TEEP/JSON message".to_string(),
            ));
        }

        let msg = TeepMessage::decode(message)?;

        match msg {
            TeepMessage::QueryResponse(qr) => {
                if self.state != TamState::AwaitingQueryResponse {
                    return Err(Error::MalformedMessage(format!(
                        "QueryResponse in state {:?}",
                        self.state
                    )));
                }
                self.handle_query_response(outbound, manifests, qr)
            }
            TeepMessage::QueryRequest(_) | TeepMessage::Install(_) => {
                // TAM-originated kinds are never valid inbound.
                Err(Error::MalformedMessage(
                    "unexpected TAM-originated message kind".to_string(),
                ))
            }
        }
    }

    fn handle_query_response(
        &mut self,
        outbound: &dyn IOutboundQueue,
        manifests: &dyn IManifestStore,
        qr: QueryResponse,
    ) -> Result<(), Error> {
        info!(
            session = self.handle.id(),
            components = qr.requested_components.len(),
            "received QueryResponse"
        );

        let mut attached: Vec<Vec<u8>> = Vec::new();

        for rci in qr
            .requested_components
            .iter()
            .filter(|rci| should_install(rci))
        {
            match manifests.lookup(&rci.component_id) {
                Some(m) => attached.push(m),
                None => {
                    debug!(
                        component_id = %hex::encode(&rci.component_id),
                        "no manifest for requested component"
                    );
                }
            }
        }

        if attached.is_empty() {
            // Nothing to provision: the exchange is complete.
            self.state = TamState::Idle;
            return Ok(());
        }

        let install = Install::compose(attached)?;
        let encoded = install.encode(DEFAULT_MAX_MESSAGE_SIZE)?;

        info!(
            session = self.handle.id(),
            manifests = install.manifests.len(),
            "sending Install"
        );

        outbound.enqueue(self.handle, TEEP_CBOR_MEDIA_TYPE, &encoded)?;

        self.state = TamState::AwaitingInstallCompletion;

        Ok(())
    }
}

/// The TEEP/JSON rendition of a QueryRequest, for devices that accept the
/// JSON media type.
fn compose_json_query_request() -> Result<Vec<u8>, Error> {
    let token = general_purpose::URL_SAFE_NO_PAD.encode(secure_random(TOKEN_LENGTH)?);

    let request = json!({
        "TYPE": TEEP_MESSAGE_QUERY_REQUEST,
        "TOKEN": token,
        "REQUEST": [TEEP_TRUSTED_COMPONENTS],
    });

    serde_json::to_vec(&request).map_err(|e| Error::Internal(e.to_string()))
}
