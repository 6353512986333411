// SPDX-License-Identifier: Apache-2.0

use super::keys::{tam_key_pair, TamKeyPair};
use crate::errors::Error;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Builder, X509NameBuilder};
use std::sync::OnceLock;

static TAM_CERT: OnceLock<Vec<u8>> = OnceLock::new();

const TAM_CERT_DAYS: u32 = 365;

/// Return the TAM's self-signed DER certificate, constructing it from the
/// process-wide key pair on first use.  Same once-only contract as the key
/// pair itself.
pub fn tam_der_certificate() -> Result<&'static [u8], Error> {
    if let Some(c) = TAM_CERT.get() {
        return Ok(c.as_slice());
    }

    let keys = tam_key_pair()?;
    let fresh = build_self_signed(keys)?;

    Ok(TAM_CERT.get_or_init(|| fresh).as_slice())
}

fn build_self_signed(keys: &TamKeyPair) -> Result<Vec<u8>, Error> {
    self_signed_der(keys.signing_key(), "TAM")
}

/// Build a self-signed DER certificate over the given RSA key.
pub(crate) fn self_signed_der(key: &PKey<Private>, cn: &str) -> Result<Vec<u8>, Error> {
    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_text("CN", cn)?;
    let name = name.build();

    let mut serial = BigNum::new()?;
    serial.rand(64, MsbOption::MAYBE_ZERO, false)?;

    let mut builder = X509Builder::new()?;
    builder.set_version(2)?;
    builder.set_serial_number(serial.to_asn1_integer()?.as_ref())?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_not_before(Asn1Time::days_from_now(0)?.as_ref())?;
    builder.set_not_after(Asn1Time::days_from_now(TAM_CERT_DAYS)?.as_ref())?;

    let pubkey_der = key.public_key_to_der()?;
    let pubkey = PKey::public_key_from_der(&pubkey_der)?;
    builder.set_pubkey(&pubkey)?;

    builder.sign(key, MessageDigest::sha256())?;

    Ok(builder.build().to_der()?)
}
