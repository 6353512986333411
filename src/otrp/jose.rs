// SPDX-License-Identifier: Apache-2.0

use crate::errors::Error;
use base64::{engine::general_purpose, Engine as _};
use openssl::hash::MessageDigest;
use openssl::memcmp;
use openssl::pkey::{HasPublic, PKey, PKeyRef, Private};
use openssl::rsa::Padding;
use openssl::sign::{Signer, Verifier};
use openssl::symm::{decrypt as symm_decrypt, Cipher};
use serde::{Deserialize, Serialize};

const JWS_ALG: &str = "RS256";
const JWE_ALG: &str = "RSA1_5";
const JWE_ENC: &str = "A128CBC-HS256";

// A128CBC-HS256 content key: 16-byte HMAC key followed by 16-byte AES key.
const CEK_LEN: usize = 32;
const TAG_LEN: usize = 16;

pub(crate) fn b64url_encode(data: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(data)
}

pub(crate) fn b64url_decode(s: &str) -> Result<Vec<u8>, Error> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| Error::MalformedMessage(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct JoseProtected {
    alg: String,
    enc: Option<String>,
}

fn parse_protected(b64: &str) -> Result<JoseProtected, Error> {
    let raw = b64url_decode(b64)?;

    serde_json::from_slice(&raw).map_err(|e| Error::MalformedMessage(e.to_string()))
}

/// Unprotected JWS header carrying the signer certificate chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwsHeader {
    /// DER certificates, standard base64 per RFC 7515 §4.1.6.
    pub x5c: Vec<String>,
}

/// A flattened-serialization JWS object: the payload is carried
/// base64url-encoded and bound to the signature together with the protected
/// header.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jws {
    pub payload: String,
    pub protected: String,
    pub header: JwsHeader,
    pub signature: String,
}

impl Jws {
    /// Sign a raw payload with the given RSA key, attaching the DER
    /// certificate chain to the unprotected header.
    pub fn sign(
        payload: &[u8],
        signing_key: &PKey<Private>,
        cert_der: &[u8],
    ) -> Result<Jws, Error> {
        let protected = b64url_encode(format!(r#"{{"alg":"{JWS_ALG}"}}"#).as_bytes());
        let payload = b64url_encode(payload);

        let signing_input = format!("{protected}.{payload}");

        let mut signer = Signer::new(MessageDigest::sha256(), signing_key)?;
        let signature = signer.sign_oneshot_to_vec(signing_input.as_bytes())?;

        Ok(Jws {
            payload,
            protected,
            header: JwsHeader {
                x5c: vec![general_purpose::STANDARD.encode(cert_der)],
            },
            signature: b64url_encode(&signature),
        })
    }

    /// Verify the signature under the supplied key.  Returns `Ok(false)` on
    /// a well-formed but non-verifying signature; callers must reject the
    /// whole message rather than use any field from it.
    pub fn verify<T: HasPublic>(&self, key: &PKeyRef<T>) -> Result<bool, Error> {
        let protected = parse_protected(&self.protected)?;
        if protected.alg != JWS_ALG {
            return Err(Error::UnsupportedParameter(format!(
                "JWS algorithm {}",
                protected.alg
            )));
        }

        let signature = b64url_decode(&self.signature)?;
        let signing_input = format!("{}.{}", self.protected, self.payload);

        let mut verifier = Verifier::new(MessageDigest::sha256(), key)?;

        match verifier.verify_oneshot(&signature, signing_input.as_bytes()) {
            Ok(ok) => Ok(ok),
            // openssl reports some malformed signatures as errors rather
            // than as a clean mismatch
            Err(_) => Ok(false),
        }
    }

    /// The raw to-be-signed payload.
    pub fn decoded_payload(&self) -> Result<Vec<u8>, Error> {
        b64url_decode(&self.payload)
    }
}

/// A flattened-serialization JWE object (RSA1_5 key transport with
/// A128CBC-HS256 content encryption).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jwe {
    pub protected: String,
    pub encrypted_key: String,
    pub iv: String,
    pub ciphertext: String,
    pub tag: String,
}

impl Jwe {
    /// Decrypt the content with the given RSA private key.  Any failure in
    /// key unwrap, tag authentication or content decryption is reported as
    /// [`Error::UntrustedSigner`]; an empty plaintext is also a failure.
    pub fn decrypt(&self, key: &PKey<Private>) -> Result<Vec<u8>, Error> {
        let protected = parse_protected(&self.protected)?;
        if protected.alg != JWE_ALG {
            return Err(Error::UnsupportedParameter(format!(
                "JWE algorithm {}",
                protected.alg
            )));
        }
        if protected.enc.as_deref() != Some(JWE_ENC) {
            return Err(Error::UnsupportedParameter(format!(
                "JWE content encryption {:?}",
                protected.enc
            )));
        }

        let rsa = key.rsa()?;

        let wrapped = b64url_decode(&self.encrypted_key)?;
        let mut cek = vec![0u8; rsa.size() as usize];
        let n = rsa
            .private_decrypt(&wrapped, &mut cek, Padding::PKCS1)
            .map_err(|_| Error::UntrustedSigner("content key unwrap failed".to_string()))?;
        cek.truncate(n);

        if cek.len() != CEK_LEN {
            return Err(Error::UntrustedSigner(
                "unexpected content key size".to_string(),
            ));
        }
        let (mac_key, enc_key) = cek.split_at(CEK_LEN / 2);

        let iv = b64url_decode(&self.iv)?;
        let ciphertext = b64url_decode(&self.ciphertext)?;
        let tag = b64url_decode(&self.tag)?;

        if tag.len() != TAG_LEN {
            return Err(Error::UntrustedSigner(
                "unexpected authentication tag size".to_string(),
            ));
        }

        // Authenticate before decrypting: tag is the truncated
        // HMAC-SHA256 over AAD || IV || ciphertext || AL, where AAD is the
        // ASCII protected header and AL its bit length as a 64-bit
        // big-endian integer (RFC 7518 §5.2.3).
        let aad = self.protected.as_bytes();
        let al = ((aad.len() as u64) * 8).to_be_bytes();

        let hmac_key = PKey::hmac(mac_key)?;
        let mut signer = Signer::new(MessageDigest::sha256(), &hmac_key)?;
        signer.update(aad)?;
        signer.update(&iv)?;
        signer.update(&ciphertext)?;
        signer.update(&al)?;
        let mac = signer.sign_to_vec()?;

        if !memcmp::eq(&mac[..TAG_LEN], &tag) {
            return Err(Error::UntrustedSigner(
                "authentication tag mismatch".to_string(),
            ));
        }

        let plaintext = symm_decrypt(Cipher::aes_128_cbc(), enc_key, Some(&iv), &ciphertext)
            .map_err(|_| Error::UntrustedSigner("content decryption failed".to_string()))?;

        if plaintext.is_empty() {
            return Err(Error::UntrustedSigner(
                "decryption produced no data".to_string(),
            ));
        }

        Ok(plaintext)
    }
}

/// Encrypt a payload to the given RSA key, producing the flattened JWE this
/// module decrypts.  Only the device side of the exchange needs this, so it
/// is compiled for tests alone.
#[cfg(test)]
pub(crate) fn encrypt_for_tests<T: HasPublic>(
    plaintext: &[u8],
    key: &PKeyRef<T>,
) -> Jwe {
    use openssl::symm::encrypt as symm_encrypt;

    let protected =
        b64url_encode(format!(r#"{{"alg":"{JWE_ALG}","enc":"{JWE_ENC}"}}"#).as_bytes());

    let cek = crate::tam::secure_random(CEK_LEN).unwrap();
    let (mac_key, enc_key) = cek.split_at(CEK_LEN / 2);
    let iv = crate::tam::secure_random(16).unwrap();

    let rsa = key.rsa().unwrap();
    let mut wrapped = vec![0u8; rsa.size() as usize];
    let n = rsa
        .public_encrypt(&cek, &mut wrapped, Padding::PKCS1)
        .unwrap();
    wrapped.truncate(n);

    let ciphertext =
        symm_encrypt(Cipher::aes_128_cbc(), enc_key, Some(&iv), plaintext).unwrap();

    let aad = protected.as_bytes();
    let al = ((aad.len() as u64) * 8).to_be_bytes();

    let hmac_key = PKey::hmac(mac_key).unwrap();
    let mut signer = Signer::new(MessageDigest::sha256(), &hmac_key).unwrap();
    signer.update(aad).unwrap();
    signer.update(&iv).unwrap();
    signer.update(&ciphertext).unwrap();
    signer.update(&al).unwrap();
    let mac = signer.sign_to_vec().unwrap();

    Jwe {
        protected,
        encrypted_key: b64url_encode(&wrapped),
        iv: b64url_encode(&iv),
        ciphertext: b64url_encode(&ciphertext),
        tag: b64url_encode(&mac[..TAG_LEN]),
    }
}
