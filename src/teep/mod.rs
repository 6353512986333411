// SPDX-License-Identifier: Apache-2.0

//! The teep module implements the CBOR-based TEEP protocol: the message
//! codec (QueryRequest, QueryResponse, Install) and the TAM-side session
//! handler that drives the query/install exchange.
//!
//! Decoding is strict by default: positional elements are checked in schema
//! order and unknown option labels fail the message.  Labels that are
//! registered but not implemented here are the one deliberate exception;
//! they are logged and skipped so that newer agents keep interoperating.

pub use self::handler::TeepSession;
pub use self::message::Install;
pub use self::message::LabelPolicy;
pub use self::message::QueryRequest;
pub use self::message::QueryResponse;
pub use self::message::RequestedComponentInfo;
pub use self::message::TeepMessage;

mod common;
mod handler;
pub mod message;
