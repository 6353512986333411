// SPDX-License-Identifier: Apache-2.0

//! The otrp module implements the legacy JSON-based OTrP protocol: JOSE
//! envelope handling (flattened JWS and JWE over openssl primitives), the
//! GetDeviceState request/response messages, and the TAM-side session
//! handler.

pub use self::handler::OtrpSession;
pub use self::jose::{Jwe, Jws};
pub use self::message::compose_get_device_state_request;
pub use self::message::parse_device_state_info;
pub use self::message::parse_tee_state_tbs;
pub use self::message::DeviceStateInfo;
pub use self::message::OTRP_VERSION;

mod handler;
pub(crate) mod jose;
mod message;
