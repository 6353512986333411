// SPDX-License-Identifier: Apache-2.0

use openssl::error::ErrorStack;

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Wrong outer container shape, wrong wire type, or a missing
    /// mandatory element.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    /// An option label outside the known set.  Known-but-unimplemented
    /// labels are skipped instead; see the per-label classification tables.
    #[error("Unrecognized field: {0}")]
    UnrecognizedField(String),
    /// A recognized label whose value is outside the acceptable set
    /// (e.g. an unknown protocol version or cipher suite).
    #[error("Unsupported parameter: {0}")]
    UnsupportedParameter(String),
    #[error("Duplicated field: {0}")]
    DuplicateField(String),
    #[error("Malformed certificate: {0}")]
    MalformedCertificate(String),
    /// Signature verification or envelope decryption failure.
    #[error("Untrusted signer: {0}")]
    UntrustedSigner(String),
    /// Buffer too small or allocation failure while encoding.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    /// The outbound queue collaborator rejected a composed message.
    #[error("Transport failure: {0}")]
    TransportFailure(String),
    /// Internal failure (key generation, randomness, serialization).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MalformedMessage(e)
            | Error::UnrecognizedField(e)
            | Error::UnsupportedParameter(e)
            | Error::DuplicateField(e)
            | Error::MalformedCertificate(e)
            | Error::UntrustedSigner(e)
            | Error::ResourceExhausted(e)
            | Error::TransportFailure(e)
            | Error::Internal(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

impl From<ErrorStack> for Error {
    fn from(e: ErrorStack) -> Self {
        Error::Internal(e.to_string())
    }
}
