// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use crate::errors::Error;
use crate::tam::secure_random;
use bitmask::*;
use ciborium::de::from_reader;
use ciborium::ser::into_writer;
use ciborium::Value;
use tracing::debug;

pub const TEEP_MESSAGE_QUERY_REQUEST: i64 = 1;
pub const TEEP_MESSAGE_QUERY_RESPONSE: i64 = 2;
pub const TEEP_MESSAGE_INSTALL: i64 = 3;

pub const TEEP_LABEL_CIPHER_SUITES: i64 = 1;
pub const TEEP_LABEL_NONCE: i64 = 2;
pub const TEEP_LABEL_VERSIONS: i64 = 3;
pub const TEEP_LABEL_OCSP_DATA: i64 = 4;
pub const TEEP_LABEL_SELECTED_CIPHER_SUITE: i64 = 5;
pub const TEEP_LABEL_SELECTED_VERSION: i64 = 6;
pub const TEEP_LABEL_EVIDENCE: i64 = 7;
pub const TEEP_LABEL_TC_LIST: i64 = 8;
pub const TEEP_LABEL_EXT_LIST: i64 = 9;
pub const TEEP_LABEL_MANIFEST_LIST: i64 = 10;
pub const TEEP_LABEL_MSG: i64 = 11;
pub const TEEP_LABEL_ERR_MSG: i64 = 12;
pub const TEEP_LABEL_EVIDENCE_FORMAT: i64 = 13;
pub const TEEP_LABEL_REQUESTED_TC_LIST: i64 = 14;
pub const TEEP_LABEL_UNNEEDED_TC_LIST: i64 = 15;
pub const TEEP_LABEL_COMPONENT_ID: i64 = 16;
pub const TEEP_LABEL_TC_MANIFEST_SEQUENCE_NUMBER: i64 = 17;
pub const TEEP_LABEL_HAVE_BINARY: i64 = 18;

pub const TEEP_CIPHERSUITE_ES256: u64 = 1;
pub const TEEP_CIPHERSUITE_EDDSA: u64 = 2;

/// The data item a QueryRequest asks the device to report.
pub const TEEP_TRUSTED_COMPONENTS: u64 = 1;

pub const TOKEN_LENGTH: usize = 16;

/// Encoded messages larger than this are rejected with
/// [`Error::ResourceExhausted`] unless the caller supplies its own bound.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4096;

const SUPPORTED_VERSIONS: &[u64] = &[0];
const SUPPORTED_CIPHER_SUITES: &[u64] = &[TEEP_CIPHERSUITE_ES256, TEEP_CIPHERSUITE_EDDSA];

/// How the decoder treats an option label.  The distinction between
/// `RecognizedUnimplemented` (skip, stay compatible with peers that already
/// send it) and `Unknown` (hard failure) is load-bearing for protocol
/// compatibility and must not be collapsed into a single policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelPolicy {
    /// Recognized, and the value must come from an enumerated allow-list.
    Required,
    /// Recognized and fully decoded.
    RecognizedOptional,
    /// Recognized in the registry but not implemented here; skipped.
    RecognizedUnimplemented,
    /// Outside the known set; decoding fails.
    Unknown,
}

/// Classification table for QueryResponse options.
pub fn classify_query_response_label(label: i64) -> LabelPolicy {
    match label {
        TEEP_LABEL_SELECTED_VERSION | TEEP_LABEL_SELECTED_CIPHER_SUITE => LabelPolicy::Required,
        TEEP_LABEL_REQUESTED_TC_LIST => LabelPolicy::RecognizedOptional,
        TEEP_LABEL_EVIDENCE_FORMAT
        | TEEP_LABEL_EVIDENCE
        | TEEP_LABEL_TC_LIST
        | TEEP_LABEL_UNNEEDED_TC_LIST => LabelPolicy::RecognizedUnimplemented,
        _ => LabelPolicy::Unknown,
    }
}

/// Classification table for QueryRequest options.  No option is implemented
/// yet; the registered request labels are accepted and skipped.
pub fn classify_query_request_label(label: i64) -> LabelPolicy {
    match label {
        TEEP_LABEL_CIPHER_SUITES | TEEP_LABEL_NONCE | TEEP_LABEL_VERSIONS
        | TEEP_LABEL_OCSP_DATA => LabelPolicy::RecognizedUnimplemented,
        _ => LabelPolicy::Unknown,
    }
}

/// Generate a fresh random token for an outgoing message.
///
/// Draft -03 implies the TAM has to remember the token and match it against
/// the QueryResponse, but that adversely affects scalability and opens the
/// protocol to SYN-flood style DoS.  See
/// https://github.com/ietf-teep/teep-protocol/issues/40 for discussion.
/// We include a token for interoperability but never store or check it.
pub fn fresh_token() -> Result<Vec<u8>, Error> {
    secure_random(TOKEN_LENGTH)
}

/// Positional elements past the message's declared schema are rejected, the
/// same strict posture as a wrong-typed element.
fn reject_trailing(items: &[Value], expected: usize) -> Result<(), Error> {
    if items.len() > expected {
        return Err(Error::MalformedMessage(format!(
            "{} trailing elements after message body",
            items.len() - expected
        )));
    }

    Ok(())
}

fn encode_value(v: &Value, max_len: usize) -> Result<Vec<u8>, Error> {
    let mut buf: Vec<u8> = Vec::new();

    into_writer(v, &mut buf).map_err(|e| Error::ResourceExhausted(e.to_string()))?;

    if buf.len() > max_len {
        return Err(Error::ResourceExhausted(format!(
            "encoded message is {} bytes, limit is {max_len}",
            buf.len()
        )));
    }

    Ok(buf)
}

/// One entry of a QueryResponse requested-tc-list: a trusted-application
/// component the device is asking for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestedComponentInfo {
    pub component_id: Vec<u8>,            // 16, bytes
    pub manifest_sequence_number: Option<u64>, // 17, uint
    pub have_binary: bool,                // 18, uint (0/1)
}

impl RequestedComponentInfo {
    fn parse(contents: &[(Value, Value)]) -> Result<Self, Error> {
        let mut component_id: Option<Vec<u8>> = None;
        let mut manifest_sequence_number: Option<u64> = None;
        let mut have_binary = false;

        for (k, v) in contents.iter() {
            let label = to_label(k, "requested-tc-info")?;
            match label {
                TEEP_LABEL_COMPONENT_ID => {
                    if component_id.is_some() {
                        return Err(Error::DuplicateField("component-id".to_string()));
                    }
                    component_id = Some(to_bstr(v, "component-id")?);
                }
                TEEP_LABEL_TC_MANIFEST_SEQUENCE_NUMBER => {
                    manifest_sequence_number =
                        Some(to_uint(v, "tc-manifest-sequence-number")?);
                }
                TEEP_LABEL_HAVE_BINARY => {
                    have_binary = to_uint(v, "have-binary")? != 0;
                }
                unknown => {
                    return Err(Error::UnrecognizedField(format!(
                        "requested-tc-info label {unknown}"
                    )))
                }
            }
        }

        let component_id = component_id
            .ok_or_else(|| Error::MalformedMessage("missing component-id".to_string()))?;

        Ok(Self {
            component_id,
            manifest_sequence_number,
            have_binary,
        })
    }

    fn to_value(&self) -> Value {
        let mut contents: Vec<(Value, Value)> = vec![(
            Value::Integer(TEEP_LABEL_COMPONENT_ID.into()),
            Value::Bytes(self.component_id.clone()),
        )];

        if let Some(seq) = self.manifest_sequence_number {
            contents.push((
                Value::Integer(TEEP_LABEL_TC_MANIFEST_SEQUENCE_NUMBER.into()),
                Value::Integer(seq.into()),
            ));
        }

        if self.have_binary {
            contents.push((
                Value::Integer(TEEP_LABEL_HAVE_BINARY.into()),
                Value::Integer(1u64.into()),
            ));
        }

        Value::Map(contents)
    }
}

/// QueryRequest, sent by the TAM when a device connects.
#[derive(Debug, PartialEq, Eq)]
pub struct QueryRequest {
    pub token: Vec<u8>,
    /// Whether the trusted-components data item is requested from the device.
    pub trusted_components: bool,
}

impl QueryRequest {
    /// Compose a QueryRequest with a fresh token, asking the device for its
    /// trusted-component state.
    pub fn compose() -> Result<Self, Error> {
        Ok(Self {
            token: fresh_token()?,
            trusted_components: true,
        })
    }

    pub fn encode(&self, max_len: usize) -> Result<Vec<u8>, Error> {
        let mut items = vec![
            Value::Integer(TEEP_MESSAGE_QUERY_REQUEST.into()),
            Value::Bytes(self.token.clone()),
            // No optional items are defined for requests yet.
            Value::Map(Vec::new()),
        ];

        if self.trusted_components {
            items.push(Value::Integer(TEEP_TRUSTED_COMPONENTS.into()));
        }

        encode_value(&Value::Array(items), max_len)
    }

    fn parse_body(items: &[Value]) -> Result<Self, Error> {
        let token = to_bstr(
            items
                .first()
                .ok_or_else(|| Error::MalformedMessage("missing token".to_string()))?,
            "token",
        )?;

        let options = to_map(
            items
                .get(1)
                .ok_or_else(|| Error::MalformedMessage("missing options".to_string()))?,
            "options",
        )?;

        for (k, _v) in options.iter() {
            let label = to_label(k, "options")?;
            match classify_query_request_label(label) {
                LabelPolicy::RecognizedUnimplemented => {
                    debug!(label, "ignoring unimplemented option label");
                }
                _ => {
                    return Err(Error::UnrecognizedField(format!("option label {label}")));
                }
            }
        }

        let trusted_components = match items.get(2) {
            None => false,
            Some(v) => {
                let item = to_uint(v, "data-item-requested")?;
                if item != TEEP_TRUSTED_COMPONENTS {
                    return Err(Error::UnsupportedParameter(format!(
                        "data item {item}"
                    )));
                }
                true
            }
        };

        reject_trailing(items, 3)?;

        Ok(Self {
            token,
            trusted_components,
        })
    }
}

bitmask! {
    #[derive(Debug)]
    mask OptionsSet: u8 where flags Options {
        SelectedVersion     = 0x01,
        SelectedCipherSuite = 0x02,
        RequestedTcList     = 0x04,
    }
}

/// QueryResponse, received from a device in reply to a QueryRequest.
#[derive(Debug)]
pub struct QueryResponse {
    pub token: Vec<u8>,
    pub selected_version: Option<u64>,      // 6, uint, allow-list {0}
    pub selected_cipher_suite: Option<u64>, // 5, uint, allow-list {ES256, EdDSA}
    /// Components the device requests, in wire order.
    pub requested_components: Vec<RequestedComponentInfo>,

    options_set: OptionsSet,
}

impl Default for QueryResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryResponse {
    pub fn new() -> Self {
        Self {
            token: Default::default(),
            selected_version: None,
            selected_cipher_suite: None,
            requested_components: Default::default(),
            options_set: OptionsSet::none(),
        }
    }

    pub fn encode(&self, max_len: usize) -> Result<Vec<u8>, Error> {
        let mut options: Vec<(Value, Value)> = Vec::new();

        if let Some(v) = self.selected_version {
            options.push((
                Value::Integer(TEEP_LABEL_SELECTED_VERSION.into()),
                Value::Integer(v.into()),
            ));
        }

        if let Some(cs) = self.selected_cipher_suite {
            options.push((
                Value::Integer(TEEP_LABEL_SELECTED_CIPHER_SUITE.into()),
                Value::Integer(cs.into()),
            ));
        }

        if !self.requested_components.is_empty() {
            let entries = self
                .requested_components
                .iter()
                .map(RequestedComponentInfo::to_value)
                .collect();
            options.push((
                Value::Integer(TEEP_LABEL_REQUESTED_TC_LIST.into()),
                Value::Array(entries),
            ));
        }

        let items = vec![
            Value::Integer(TEEP_MESSAGE_QUERY_RESPONSE.into()),
            Value::Bytes(self.token.clone()),
            Value::Map(options),
        ];

        encode_value(&Value::Array(items), max_len)
    }

    fn parse_body(items: &[Value]) -> Result<Self, Error> {
        let mut qr = QueryResponse::new();

        qr.token = to_bstr(
            items
                .first()
                .ok_or_else(|| Error::MalformedMessage("missing token".to_string()))?,
            "token",
        )?;

        let options = to_map(
            items
                .get(1)
                .ok_or_else(|| Error::MalformedMessage("missing options".to_string()))?,
            "options",
        )?;

        qr.parse_options(options)?;

        reject_trailing(items, 2)?;

        Ok(qr)
    }

    fn parse_options(&mut self, contents: &[(Value, Value)]) -> Result<(), Error> {
        for (k, v) in contents.iter() {
            let label = to_label(k, "options")?;
            match classify_query_response_label(label) {
                LabelPolicy::Required | LabelPolicy::RecognizedOptional => {
                    self.set_option(label, v)?
                }
                LabelPolicy::RecognizedUnimplemented => {
                    debug!(label, "ignoring unimplemented option label");
                }
                LabelPolicy::Unknown => {
                    return Err(Error::UnrecognizedField(format!("option label {label}")));
                }
            }
        }
        Ok(())
    }

    fn set_option(&mut self, label: i64, v: &Value) -> Result<(), Error> {
        match label {
            TEEP_LABEL_SELECTED_VERSION => self.set_selected_version(v),
            TEEP_LABEL_SELECTED_CIPHER_SUITE => self.set_selected_cipher_suite(v),
            TEEP_LABEL_REQUESTED_TC_LIST => self.set_requested_components(v),
            unknown => Err(Error::UnrecognizedField(format!("option label {unknown}"))),
        }
    }

    fn set_selected_version(&mut self, v: &Value) -> Result<(), Error> {
        if self.options_set.contains(Options::SelectedVersion) {
            return Err(Error::DuplicateField("selected-version".to_string()));
        }

        let x = to_uint(v, "selected-version")?;

        if !SUPPORTED_VERSIONS.contains(&x) {
            return Err(Error::UnsupportedParameter(format!(
                "protocol version {x}"
            )));
        }

        self.selected_version = Some(x);

        self.options_set.set(Options::SelectedVersion);

        Ok(())
    }

    fn set_selected_cipher_suite(&mut self, v: &Value) -> Result<(), Error> {
        if self.options_set.contains(Options::SelectedCipherSuite) {
            return Err(Error::DuplicateField("selected-cipher-suite".to_string()));
        }

        let x = to_uint(v, "selected-cipher-suite")?;

        if !SUPPORTED_CIPHER_SUITES.contains(&x) {
            return Err(Error::UnsupportedParameter(format!("cipher suite {x}")));
        }

        self.selected_cipher_suite = Some(x);

        self.options_set.set(Options::SelectedCipherSuite);

        Ok(())
    }

    fn set_requested_components(&mut self, v: &Value) -> Result<(), Error> {
        if self.options_set.contains(Options::RequestedTcList) {
            return Err(Error::DuplicateField("requested-tc-list".to_string()));
        }

        let entries = to_array(v, "requested-tc-list")?;

        for (i, entry) in entries.iter().enumerate() {
            let contents = to_map(entry, &format!("requested-tc-info[{i}]"))?;
            self.requested_components
                .push(RequestedComponentInfo::parse(contents)?);
        }

        self.options_set.set(Options::RequestedTcList);

        Ok(())
    }
}

/// Install, sent by the TAM to provision the selected components.  Manifests
/// are opaque pre-encoded descriptors, carried as byte strings.
#[derive(Debug, PartialEq, Eq)]
pub struct Install {
    pub token: Vec<u8>,
    pub manifests: Vec<Vec<u8>>,
}

impl Install {
    /// Compose an Install with a fresh token carrying the given manifests.
    pub fn compose(manifests: Vec<Vec<u8>>) -> Result<Self, Error> {
        Ok(Self {
            token: fresh_token()?,
            manifests,
        })
    }

    pub fn encode(&self, max_len: usize) -> Result<Vec<u8>, Error> {
        let list = self
            .manifests
            .iter()
            .map(|m| Value::Bytes(m.clone()))
            .collect();

        let options = vec![(
            Value::Integer(TEEP_LABEL_MANIFEST_LIST.into()),
            Value::Array(list),
        )];

        let items = vec![
            Value::Integer(TEEP_MESSAGE_INSTALL.into()),
            Value::Bytes(self.token.clone()),
            Value::Map(options),
        ];

        encode_value(&Value::Array(items), max_len)
    }

    fn parse_body(items: &[Value]) -> Result<Self, Error> {
        let token = to_bstr(
            items
                .first()
                .ok_or_else(|| Error::MalformedMessage("missing token".to_string()))?,
            "token",
        )?;

        let options = to_map(
            items
                .get(1)
                .ok_or_else(|| Error::MalformedMessage("missing options".to_string()))?,
            "options",
        )?;

        let mut manifests: Vec<Vec<u8>> = Vec::new();
        let mut seen_list = false;

        for (k, v) in options.iter() {
            let label = to_label(k, "options")?;
            match label {
                TEEP_LABEL_MANIFEST_LIST => {
                    if seen_list {
                        return Err(Error::DuplicateField("manifest-list".to_string()));
                    }
                    for (i, m) in to_array(v, "manifest-list")?.iter().enumerate() {
                        manifests.push(to_bstr(m, &format!("manifest-list[{i}]"))?);
                    }
                    seen_list = true;
                }
                unknown => {
                    return Err(Error::UnrecognizedField(format!(
                        "option label {unknown}"
                    )))
                }
            }
        }

        reject_trailing(items, 2)?;

        Ok(Self { token, manifests })
    }
}

/// A decoded TEEP message, tagged by its wire type code.
#[derive(Debug)]
pub enum TeepMessage {
    QueryRequest(QueryRequest),
    QueryResponse(QueryResponse),
    Install(Install),
}

impl TeepMessage {
    /// Decode a CBOR-encoded TEEP message.
    ///
    /// The outer container must be an array whose first element is the
    /// message type code; positional elements are checked strictly in schema
    /// order before the options map is walked.
    pub fn decode(buf: &[u8]) -> Result<TeepMessage, Error> {
        let v: Value =
            from_reader(buf).map_err(|e| Error::MalformedMessage(e.to_string()))?;

        let items = match v {
            Value::Array(items) => items,
            _ => {
                return Err(Error::MalformedMessage(
                    "expecting array type".to_string(),
                ))
            }
        };

        let kind = to_label(
            items
                .first()
                .ok_or_else(|| Error::MalformedMessage("missing message type".to_string()))?,
            "message type",
        )?;

        match kind {
            TEEP_MESSAGE_QUERY_REQUEST => {
                QueryRequest::parse_body(&items[1..]).map(TeepMessage::QueryRequest)
            }
            TEEP_MESSAGE_QUERY_RESPONSE => {
                QueryResponse::parse_body(&items[1..]).map(TeepMessage::QueryResponse)
            }
            TEEP_MESSAGE_INSTALL => {
                Install::parse_body(&items[1..]).map(TeepMessage::Install)
            }
            unknown => Err(Error::MalformedMessage(format!(
                "unrecognized message type {unknown}"
            ))),
        }
    }

    pub fn encode(&self, max_len: usize) -> Result<Vec<u8>, Error> {
        match self {
            TeepMessage::QueryRequest(m) => m.encode(max_len),
            TeepMessage::QueryResponse(m) => m.encode(max_len),
            TeepMessage::Install(m) => m.encode(max_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn sample_token() -> Vec<u8> {
        hex!("000102030405060708090a0b0c0d0e0f").to_vec()
    }

    fn encode_raw(v: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        into_writer(v, &mut buf).unwrap();
        buf
    }

    #[test]
    fn query_request_round_trip() {
        let qr = QueryRequest {
            token: sample_token(),
            trusted_components: true,
        };

        let wire = qr.encode(DEFAULT_MAX_MESSAGE_SIZE).unwrap();

        let decoded = match TeepMessage::decode(&wire).unwrap() {
            TeepMessage::QueryRequest(m) => m,
            other => panic!("unexpected message: {other:?}"),
        };

        assert_eq!(decoded, qr);
        assert!(decoded.trusted_components);

        // round-trip stability
        let wire2 = decoded.encode(DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(wire, wire2);
    }

    #[test]
    fn query_response_round_trip() {
        let mut qr = QueryResponse::new();
        qr.token = sample_token();
        qr.selected_version = Some(0);
        qr.selected_cipher_suite = Some(TEEP_CIPHERSUITE_ES256);
        qr.requested_components.push(RequestedComponentInfo {
            component_id: hex!("aabb").to_vec(),
            manifest_sequence_number: Some(3),
            have_binary: false,
        });

        let wire = qr.encode(DEFAULT_MAX_MESSAGE_SIZE).unwrap();

        let decoded = match TeepMessage::decode(&wire).unwrap() {
            TeepMessage::QueryResponse(m) => m,
            other => panic!("unexpected message: {other:?}"),
        };

        assert_eq!(decoded.token, qr.token);
        assert_eq!(decoded.selected_version, Some(0));
        assert_eq!(decoded.selected_cipher_suite, Some(TEEP_CIPHERSUITE_ES256));
        assert_eq!(decoded.requested_components, qr.requested_components);

        let wire2 = decoded.encode(DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(wire, wire2);
    }

    #[test]
    fn install_round_trip() {
        let install = Install {
            token: sample_token(),
            manifests: vec![hex!("d8bb").to_vec(), hex!("0011223344").to_vec()],
        };

        let wire = install.encode(DEFAULT_MAX_MESSAGE_SIZE).unwrap();

        let decoded = match TeepMessage::decode(&wire).unwrap() {
            TeepMessage::Install(m) => m,
            other => panic!("unexpected message: {other:?}"),
        };

        assert_eq!(decoded, install);
    }

    #[test]
    fn outer_shape_not_array() {
        let wire = encode_raw(&Value::Map(Vec::new()));

        let r = TeepMessage::decode(&wire);

        assert!(matches!(r, Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn unrecognized_message_type() {
        let wire = encode_raw(&Value::Array(vec![
            Value::Integer(99.into()),
            Value::Bytes(sample_token()),
            Value::Map(Vec::new()),
        ]));

        let r = TeepMessage::decode(&wire);

        assert!(matches!(r, Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn missing_token_fails() {
        let wire = encode_raw(&Value::Array(vec![Value::Integer(
            TEEP_MESSAGE_QUERY_RESPONSE.into(),
        )]));

        let r = TeepMessage::decode(&wire);

        assert_eq!(
            r.unwrap_err(),
            Error::MalformedMessage("missing token".to_string())
        );
    }

    #[test]
    fn token_wrong_type_fails() {
        let wire = encode_raw(&Value::Array(vec![
            Value::Integer(TEEP_MESSAGE_QUERY_RESPONSE.into()),
            Value::Text("not bytes".to_string()),
            Value::Map(Vec::new()),
        ]));

        let r = TeepMessage::decode(&wire);

        assert!(matches!(r, Err(Error::MalformedMessage(_))));
    }

    fn query_response_with_options(options: Vec<(Value, Value)>) -> Vec<u8> {
        encode_raw(&Value::Array(vec![
            Value::Integer(TEEP_MESSAGE_QUERY_RESPONSE.into()),
            Value::Bytes(sample_token()),
            Value::Map(options),
        ]))
    }

    #[test]
    fn unknown_option_label_fails() {
        let wire = query_response_with_options(vec![(
            Value::Integer(1000.into()),
            Value::Integer(0.into()),
        )]);

        let r = TeepMessage::decode(&wire);

        assert_eq!(
            r.unwrap_err(),
            Error::UnrecognizedField("option label 1000".to_string())
        );
    }

    #[test]
    fn unimplemented_option_labels_are_skipped() {
        let wire = query_response_with_options(vec![
            (
                Value::Integer(TEEP_LABEL_EVIDENCE_FORMAT.into()),
                Value::Text("cbor".to_string()),
            ),
            (
                Value::Integer(TEEP_LABEL_TC_LIST.into()),
                Value::Array(Vec::new()),
            ),
        ]);

        let decoded = TeepMessage::decode(&wire).unwrap();

        match decoded {
            TeepMessage::QueryResponse(qr) => {
                assert!(qr.requested_components.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unsupported_version_fails() {
        let wire = query_response_with_options(vec![(
            Value::Integer(TEEP_LABEL_SELECTED_VERSION.into()),
            Value::Integer(7.into()),
        )]);

        let r = TeepMessage::decode(&wire);

        assert_eq!(
            r.unwrap_err(),
            Error::UnsupportedParameter("protocol version 7".to_string())
        );
    }

    #[test]
    fn unsupported_cipher_suite_fails() {
        let wire = query_response_with_options(vec![(
            Value::Integer(TEEP_LABEL_SELECTED_CIPHER_SUITE.into()),
            Value::Integer(9.into()),
        )]);

        let r = TeepMessage::decode(&wire);

        assert_eq!(
            r.unwrap_err(),
            Error::UnsupportedParameter("cipher suite 9".to_string())
        );
    }

    #[test]
    fn duplicate_option_fails() {
        let wire = query_response_with_options(vec![
            (
                Value::Integer(TEEP_LABEL_SELECTED_VERSION.into()),
                Value::Integer(0.into()),
            ),
            (
                Value::Integer(TEEP_LABEL_SELECTED_VERSION.into()),
                Value::Integer(0.into()),
            ),
        ]);

        let r = TeepMessage::decode(&wire);

        assert_eq!(
            r.unwrap_err(),
            Error::DuplicateField("selected-version".to_string())
        );
    }

    #[test]
    fn duplicate_component_id_fails() {
        let entry = Value::Map(vec![
            (
                Value::Integer(TEEP_LABEL_COMPONENT_ID.into()),
                Value::Bytes(hex!("aabb").to_vec()),
            ),
            (
                Value::Integer(TEEP_LABEL_COMPONENT_ID.into()),
                Value::Bytes(hex!("ccdd").to_vec()),
            ),
        ]);
        let wire = query_response_with_options(vec![(
            Value::Integer(TEEP_LABEL_REQUESTED_TC_LIST.into()),
            Value::Array(vec![entry]),
        )]);

        let r = TeepMessage::decode(&wire);

        assert_eq!(
            r.unwrap_err(),
            Error::DuplicateField("component-id".to_string())
        );
    }

    #[test]
    fn tc_info_without_component_id_fails() {
        let entry = Value::Map(vec![(
            Value::Integer(TEEP_LABEL_HAVE_BINARY.into()),
            Value::Integer(1.into()),
        )]);
        let wire = query_response_with_options(vec![(
            Value::Integer(TEEP_LABEL_REQUESTED_TC_LIST.into()),
            Value::Array(vec![entry]),
        )]);

        let r = TeepMessage::decode(&wire);

        assert_eq!(
            r.unwrap_err(),
            Error::MalformedMessage("missing component-id".to_string())
        );
    }

    #[test]
    fn tc_info_unknown_label_fails() {
        let entry = Value::Map(vec![
            (
                Value::Integer(TEEP_LABEL_COMPONENT_ID.into()),
                Value::Bytes(hex!("aabb").to_vec()),
            ),
            (Value::Integer(42.into()), Value::Integer(1.into())),
        ]);
        let wire = query_response_with_options(vec![(
            Value::Integer(TEEP_LABEL_REQUESTED_TC_LIST.into()),
            Value::Array(vec![entry]),
        )]);

        let r = TeepMessage::decode(&wire);

        assert!(matches!(r, Err(Error::UnrecognizedField(_))));
    }

    #[test]
    fn requested_components_preserve_wire_order() {
        let mk = |id: &[u8]| {
            Value::Map(vec![(
                Value::Integer(TEEP_LABEL_COMPONENT_ID.into()),
                Value::Bytes(id.to_vec()),
            )])
        };
        let wire = query_response_with_options(vec![(
            Value::Integer(TEEP_LABEL_REQUESTED_TC_LIST.into()),
            Value::Array(vec![mk(&hex!("01")), mk(&hex!("02")), mk(&hex!("03"))]),
        )]);

        let qr = match TeepMessage::decode(&wire).unwrap() {
            TeepMessage::QueryResponse(m) => m,
            other => panic!("unexpected message: {other:?}"),
        };

        let ids: Vec<&[u8]> = qr
            .requested_components
            .iter()
            .map(|r| r.component_id.as_slice())
            .collect();
        assert_eq!(ids, vec![&hex!("01")[..], &hex!("02")[..], &hex!("03")[..]]);
    }

    #[test]
    fn query_response_trailing_element_fails() {
        let wire = encode_raw(&Value::Array(vec![
            Value::Integer(TEEP_MESSAGE_QUERY_RESPONSE.into()),
            Value::Bytes(sample_token()),
            Value::Map(Vec::new()),
            Value::Integer(1.into()),
        ]));

        let r = TeepMessage::decode(&wire);

        assert_eq!(
            r.unwrap_err(),
            Error::MalformedMessage("1 trailing elements after message body".to_string())
        );
    }

    #[test]
    fn install_trailing_element_fails() {
        let wire = encode_raw(&Value::Array(vec![
            Value::Integer(TEEP_MESSAGE_INSTALL.into()),
            Value::Bytes(sample_token()),
            Value::Map(Vec::new()),
            Value::Bytes(vec![0u8; 4]),
        ]));

        let r = TeepMessage::decode(&wire);

        assert!(matches!(r, Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn query_request_trailing_element_fails() {
        let wire = encode_raw(&Value::Array(vec![
            Value::Integer(TEEP_MESSAGE_QUERY_REQUEST.into()),
            Value::Bytes(sample_token()),
            Value::Map(Vec::new()),
            Value::Integer(TEEP_TRUSTED_COMPONENTS.into()),
            Value::Integer(0.into()),
        ]));

        let r = TeepMessage::decode(&wire);

        assert!(matches!(r, Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn encode_respects_size_limit() {
        let install = Install {
            token: sample_token(),
            manifests: vec![vec![0u8; 8192]],
        };

        let r = install.encode(DEFAULT_MAX_MESSAGE_SIZE);

        assert!(matches!(r, Err(Error::ResourceExhausted(_))));
    }

    #[test]
    fn compose_generates_fresh_tokens() {
        let a = QueryRequest::compose().unwrap();
        let b = QueryRequest::compose().unwrap();

        assert_eq!(a.token.len(), TOKEN_LENGTH);
        assert_eq!(b.token.len(), TOKEN_LENGTH);
        assert_ne!(a.token, b.token);
    }
}
