// SPDX-License-Identifier: Apache-2.0

use super::jose::{b64url_decode, b64url_encode, Jwe, Jws};
use crate::errors::Error;
use crate::tam::{secure_random, tam_der_certificate, tam_key_pair};
use serde_json::{json, Map, Value};

pub const OTRP_VERSION: &str = "1.0";

const REQUEST_ID_LENGTH: usize = 16;

/// A fresh request/transaction identifier: 16 random bytes, base64url.
/// OTrP does not say what the scope of uniqueness needs to be, so a
/// globally unique value is used.
fn fresh_id() -> Result<String, Error> {
    Ok(b64url_encode(&secure_random(REQUEST_ID_LENGTH)?))
}

/// Compose the to-be-signed GetDeviceStateTBSRequest body.
fn compose_get_device_state_tbs_request() -> Result<Vec<u8>, Error> {
    let tbs = json!({
        "GetDeviceStateTBSRequest": {
            "ver": OTRP_VERSION,
            "rid": fresh_id()?,
            "tid": fresh_id()?,
            // TODO: fill in the list of OCSP stapling data
            "ocspdat": [],
            // supportedsigalgs is optional and omitted
        }
    });

    serde_json::to_vec(&tbs).map_err(|e| Error::Internal(e.to_string()))
}

/// Compose a complete GetDeviceStateRequest: the TBS body wrapped in a JWS
/// signed with the TAM key, with the TAM certificate chain in the header.
pub fn compose_get_device_state_request() -> Result<Vec<u8>, Error> {
    let keys = tam_key_pair()?;
    let cert = tam_der_certificate()?;

    let tbs = compose_get_device_state_tbs_request()?;
    let jws = Jws::sign(&tbs, keys.signing_key(), cert)?;

    let mut message = Map::new();
    message.insert(
        "GetDeviceStateRequest".to_string(),
        serde_json::to_value(&jws).map_err(|e| Error::Internal(e.to_string()))?,
    );

    serde_json::to_vec(&Value::Object(message)).map_err(|e| Error::Internal(e.to_string()))
}

fn member<'a>(v: &'a Value, key: &str) -> Result<&'a Value, Error> {
    v.as_object()
        .ok_or_else(|| Error::MalformedMessage(format!("expecting object around {key}")))?
        .get(key)
        .ok_or_else(|| Error::MalformedMessage(format!("missing {key}")))
}

/// Extract the encrypted device-state element from a decoded
/// GetDeviceTEEStateResponse payload.
pub fn parse_tee_state_tbs(payload: &[u8]) -> Result<Jwe, Error> {
    let v: Value =
        serde_json::from_slice(payload).map_err(|e| Error::MalformedMessage(e.to_string()))?;

    let tbs = member(&v, "GetDeviceTEEStateTBSResponse")?;
    let edsi = member(tbs, "edsi")?;

    serde_json::from_value(edsi.clone()).map_err(|e| Error::MalformedMessage(e.to_string()))
}

/// Device state carried in the decrypted `dsi` element: the TEE signer
/// certificate and the trusted applications the device asks for.
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceStateInfo {
    pub cert_der: Vec<u8>,
    pub ta_requests: Vec<String>,
}

/// Parse the decrypted device-state information wrapper.
pub fn parse_device_state_info(plaintext: &[u8]) -> Result<DeviceStateInfo, Error> {
    let v: Value = serde_json::from_slice(plaintext)
        .map_err(|e| Error::MalformedMessage(e.to_string()))?;

    let dsi = member(&v, "dsi")?;
    let tee = member(dsi, "tee")?;

    let cert = tee
        .as_object()
        .ok_or_else(|| Error::MalformedMessage("tee MUST be object".to_string()))?
        .get("cert")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedCertificate("missing tee certificate".to_string()))?;

    let cert_der =
        b64url_decode(cert).map_err(|e| Error::MalformedCertificate(format!("{e:?}")))?;

    let mut ta_requests = Vec::new();
    if let Some(list) = tee.get("tarequestlist") {
        let entries = list.as_array().ok_or_else(|| {
            Error::MalformedMessage("tarequestlist MUST be array".to_string())
        })?;

        for entry in entries {
            let taid = member(entry, "taid")?.as_str().ok_or_else(|| {
                Error::MalformedMessage("taid MUST be string".to_string())
            })?;
            ta_requests.push(taid.to_string());
        }
    }

    Ok(DeviceStateInfo {
        cert_der,
        ta_requests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_request_is_signed_and_decodable() {
        let wire = compose_get_device_state_request().unwrap();

        let v: Value = serde_json::from_slice(&wire).unwrap();
        let jws: Jws =
            serde_json::from_value(v["GetDeviceStateRequest"].clone()).unwrap();

        // the TAM's own public key verifies its request
        let tam_pub = tam_key_pair().unwrap().public_key().unwrap();
        assert!(jws.verify(&tam_pub).unwrap());

        let tbs: Value = serde_json::from_slice(&jws.decoded_payload().unwrap()).unwrap();
        let body = &tbs["GetDeviceStateTBSRequest"];
        assert_eq!(body["ver"], OTRP_VERSION);
        assert!(body["rid"].is_string());
        assert!(body["tid"].is_string());
        assert!(body["ocspdat"].as_array().unwrap().is_empty());
    }

    #[test]
    fn request_ids_are_fresh_per_message() {
        let a: Value = serde_json::from_slice(&compose_get_device_state_request().unwrap())
            .unwrap();
        let b: Value = serde_json::from_slice(&compose_get_device_state_request().unwrap())
            .unwrap();

        let rid = |v: &Value| -> String {
            let jws: Jws = serde_json::from_value(v["GetDeviceStateRequest"].clone()).unwrap();
            let tbs: Value =
                serde_json::from_slice(&jws.decoded_payload().unwrap()).unwrap();
            tbs["GetDeviceStateTBSRequest"]["rid"]
                .as_str()
                .unwrap()
                .to_string()
        };

        assert_ne!(rid(&a), rid(&b));
    }

    #[test]
    fn tee_state_tbs_requires_edsi() {
        let payload = br#"{"GetDeviceTEEStateTBSResponse":{}}"#;

        let r = parse_tee_state_tbs(payload);

        assert_eq!(
            r.unwrap_err(),
            Error::MalformedMessage("missing edsi".to_string())
        );
    }

    #[test]
    fn device_state_info_requires_cert() {
        let plaintext = br#"{"dsi":{"tee":{}}}"#;

        let r = parse_device_state_info(plaintext);

        assert!(matches!(r, Err(Error::MalformedCertificate(_))));
    }

    #[test]
    fn device_state_info_parses_ta_requests() {
        let cert = b64url_encode(b"some-der");
        let plaintext = format!(
            r#"{{"dsi":{{"tee":{{"cert":"{cert}","tarequestlist":[{{"taid":"ta.one"}},{{"taid":"ta.two"}}]}}}}}}"#
        );

        let info = parse_device_state_info(plaintext.as_bytes()).unwrap();

        assert_eq!(info.cert_der, b"some-der");
        assert_eq!(info.ta_requests, vec!["ta.one", "ta.two"]);
    }

    #[test]
    fn device_state_info_without_request_list() {
        let cert = b64url_encode(b"some-der");
        let plaintext = format!(r#"{{"dsi":{{"tee":{{"cert":"{cert}"}}}}}}"#);

        let info = parse_device_state_info(plaintext.as_bytes()).unwrap();

        assert!(info.ta_requests.is_empty());
    }
}
