// SPDX-License-Identifier: Apache-2.0

//! Process-wide TAM identity: the signing/encryption key pair, the
//! self-signed certificate derived from it, and the device-certificate
//! trust check used to authenticate responses.

pub use self::cert::tam_der_certificate;
pub use self::keys::{secure_random, tam_key_pair, TamKeyPair};
pub use self::trust::{accept_device_signer, device_verification_key};

pub(crate) mod cert;
mod keys;
mod trust;
