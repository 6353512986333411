// SPDX-License-Identifier: Apache-2.0

use crate::errors::Error;
use openssl::pkey::{PKey, Private, Public};
use openssl::rand::rand_bytes;
use openssl::rsa::Rsa;
use std::sync::OnceLock;

static TAM_KEY: OnceLock<TamKeyPair> = OnceLock::new();

const TAM_RSA_BITS: u32 = 2048;

/// The process-wide TAM signing identity.  Created lazily on first use and
/// immutable for the process lifetime.
pub struct TamKeyPair {
    signing: PKey<Private>,
}

impl TamKeyPair {
    fn generate() -> Result<Self, Error> {
        let rsa = Rsa::generate(TAM_RSA_BITS)?;

        Ok(Self {
            signing: PKey::from_rsa(rsa)?,
        })
    }

    pub fn signing_key(&self) -> &PKey<Private> {
        &self.signing
    }

    /// OTrP re-uses the signing RSA key in its key-transport role; the JOSE
    /// original re-labels the signing JWK as an "RSA1_5" encryption key.
    pub fn encryption_key(&self) -> &PKey<Private> {
        &self.signing
    }

    /// The public half, detached from the private key material.
    pub fn public_key(&self) -> Result<PKey<Public>, Error> {
        let der = self.signing.public_key_to_der()?;

        Ok(PKey::public_key_from_der(&der)?)
    }
}

/// Return the TAM key pair, generating it on first use.
///
/// A key generated by the loser of a concurrent first call is discarded
/// before anyone can observe it; every caller sees the same pair.
pub fn tam_key_pair() -> Result<&'static TamKeyPair, Error> {
    if let Some(k) = TAM_KEY.get() {
        return Ok(k);
    }

    let fresh = TamKeyPair::generate()?;

    Ok(TAM_KEY.get_or_init(|| fresh))
}

/// Cryptographically secure random bytes for tokens and request ids.
/// Failure aborts composition of the message being built.
pub fn secure_random(len: usize) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; len];

    rand_bytes(&mut buf)?;

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn key_pair_created_exactly_once_under_contention() {
        let ders: Vec<Vec<u8>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        tam_key_pair()
                            .unwrap()
                            .signing_key()
                            .public_key_to_der()
                            .unwrap()
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for d in &ders[1..] {
            assert_eq!(*d, ders[0]);
        }
    }

    #[test]
    fn encryption_key_is_signing_key() {
        let keys = tam_key_pair().unwrap();

        let a = keys.signing_key().public_key_to_der().unwrap();
        let b = keys.encryption_key().public_key_to_der().unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn secure_random_varies() {
        let a = secure_random(16).unwrap();
        let b = secure_random(16).unwrap();

        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
