// SPDX-License-Identifier: Apache-2.0

use super::jose::Jws;
use super::message::{
    compose_get_device_state_request, parse_device_state_info, parse_tee_state_tbs,
};
use crate::errors::Error;
use crate::session::{IOutboundQueue, SessionHandle, TamState, OTRP_JSON_MEDIA_TYPE};
use crate::tam::{device_verification_key, tam_key_pair};
use serde_json::Value;
use tracing::{debug, info};

/// Decide whether a requested trusted application gets installed.
///
/// Placeholder policy, same stance as the TEEP side: install everything.
fn should_install_ta(_taid: &str) -> bool {
    true
}

/// One legacy OTrP exchange with a device.
pub struct OtrpSession {
    handle: SessionHandle,
    state: TamState,
}

impl OtrpSession {
    pub fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            state: TamState::Idle,
        }
    }

    pub fn state(&self) -> TamState {
        self.state
    }

    /// Handle the inbound connect event: compose and send a
    /// GetDeviceStateRequest.
    pub fn on_connect(&mut self, outbound: &dyn IOutboundQueue) -> Result<(), Error> {
        if self.state != TamState::Idle {
            return Err(Error::MalformedMessage(format!(
                "connect event in state {:?}",
                self.state
            )));
        }

        info!(session = self.handle.id(), "received client connection");

        let message = compose_get_device_state_request()?;

        debug!(session = self.handle.id(), "sending GetDeviceStateRequest");

        outbound.enqueue(self.handle, OTRP_JSON_MEDIA_TYPE, &message)?;

        self.state = TamState::AwaitingQueryResponse;

        Ok(())
    }

    /// Handle an inbound OTrP message.  Dispatch is by the message-kind key
    /// of the top-level object; an unrecognized key fails immediately and
    /// the session moves to `Failed`.
    pub fn on_message(&mut self, message: &[u8]) -> Result<(), Error> {
        let r = self.handle_message(message);

        if r.is_err() {
            self.state = TamState::Failed;
        }

        r
    }

    fn handle_message(&mut self, message: &[u8]) -> Result<(), Error> {
        let v: Value = serde_json::from_slice(message)
            .map_err(|e| Error::MalformedMessage(e.to_string()))?;

        let obj = v
            .as_object()
            .ok_or_else(|| Error::MalformedMessage("expecting object type".to_string()))?;

        let (key, body) = obj
            .iter()
            .next()
            .ok_or_else(|| Error::MalformedMessage("empty message object".to_string()))?;

        match key.as_str() {
            "GetDeviceStateResponse" => {
                if self.state != TamState::AwaitingQueryResponse {
                    return Err(Error::MalformedMessage(format!(
                        "GetDeviceStateResponse in state {:?}",
                        self.state
                    )));
                }
                self.handle_get_device_state_response(body)?;
                self.state = TamState::Idle;
                Ok(())
            }
            unknown => Err(Error::MalformedMessage(format!(
                "unrecognized message key {unknown}"
            ))),
        }
    }

    /// A GetDeviceStateResponse is an array of per-TEE responses; the first
    /// failing entry fails the whole message.
    fn handle_get_device_state_response(&mut self, body: &Value) -> Result<(), Error> {
        let entries = body
            .as_array()
            .ok_or_else(|| Error::MalformedMessage("expecting array type".to_string()))?;

        for entry in entries {
            self.handle_tee_state_response(entry)?;
        }

        Ok(())
    }

    fn handle_tee_state_response(&mut self, entry: &Value) -> Result<(), Error> {
        let jws_value = entry
            .as_object()
            .ok_or_else(|| Error::MalformedMessage("expecting object type".to_string()))?
            .get("GetDeviceTEEStateResponse")
            .ok_or_else(|| {
                Error::MalformedMessage("missing GetDeviceTEEStateResponse".to_string())
            })?;

        let jws: Jws = serde_json::from_value(jws_value.clone())
            .map_err(|e| Error::MalformedMessage(e.to_string()))?;

        // The payload carries the TEE signer certificate inside the
        // encrypted edsi element, so it has to be opened before the
        // signature can be checked against the device-embedded key.
        let payload = jws.decoded_payload()?;
        let edsi = parse_tee_state_tbs(&payload)?;

        let keys = tam_key_pair()?;
        let plaintext = edsi.decrypt(keys.encryption_key())?;

        let state = parse_device_state_info(&plaintext)?;

        // Leap of faith: the verification key is derived from the
        // certificate embedded in the response itself.
        let device_key = device_verification_key(&state.cert_der)?;

        if !jws.verify(&device_key)? {
            return Err(Error::UntrustedSigner(
                "response signature does not verify under device certificate".to_string(),
            ));
        }

        // TEE acceptance policy and TFW signer/integrity checks plug in
        // here once defined.

        for taid in &state.ta_requests {
            if !should_install_ta(taid) {
                continue;
            }

            // InstallTARequest composition is the follow-up command for
            // accepted entries; not part of this exchange yet.
            info!(
                session = self.handle.id(),
                taid = %taid,
                "device requested trusted application"
            );
        }

        Ok(())
    }
}
