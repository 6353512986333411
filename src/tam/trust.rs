// SPDX-License-Identifier: Apache-2.0

use crate::errors::Error;
use openssl::pkey::{PKey, Public};
use openssl::x509::{X509Ref, X509};

/// Leap-of-faith signer acceptance: the key embedded in the device's signed
/// response is trusted for the purpose of this exchange only.
///
/// This is the single seam for future policy: chaining the certificate to a
/// trust anchor embedded in the TAM, and evaluating TEE/TFW acceptance
/// policies, plug in here.
pub fn accept_device_signer(_cert: &X509Ref) -> bool {
    true
}

/// Parse a device certificate out of a decrypted response and derive an
/// ephemeral verification key from it.
pub fn device_verification_key(cert_der: &[u8]) -> Result<PKey<Public>, Error> {
    let cert =
        X509::from_der(cert_der).map_err(|e| Error::MalformedCertificate(e.to_string()))?;

    if !accept_device_signer(&cert) {
        return Err(Error::UntrustedSigner(
            "device certificate rejected by policy".to_string(),
        ));
    }

    cert.public_key()
        .map_err(|e| Error::MalformedCertificate(e.to_string()))
}
