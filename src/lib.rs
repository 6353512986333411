// SPDX-License-Identifier: Apache-2.0

//! TAM-side message engine for trusted-component provisioning.
//!
//! This crate implements the message-processing core of a Trust Application
//! Manager: composing and parsing protocol messages, validating device
//! responses, and deciding which trusted-component manifests to send back.
//! Two wire protocols are supported:
//!
//! * TEEP, CBOR-encoded, for current device agents
//! * OTrP, JSON/JOSE-encoded, for legacy device agents
//!
//! The transport is deliberately out of scope: a broker collaborator feeds
//! connect events and inbound messages to [`session::Session`] and provides
//! the [`session::IOutboundQueue`] the engine replies through.

pub mod errors;
pub mod otrp;
pub mod session;
pub mod store;
pub mod tam;
pub mod teep;
