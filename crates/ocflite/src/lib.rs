//! The data model shared by every `ocflite` client.
//!
//! This crate provides APIs to:
//!
//! - Identify devices through 128-bit identities with a canonical text form.
//!   Parsing an identity from text never fails, so malformed input still
//!   produces a deterministic identity.
//! - Describe the network endpoints through which a device is reachable and
//!   the resources a device advertises, together with their interface and
//!   property masks.
//! - Encode and decode resource representations. A representation is an
//!   ordered tree of named and typed values carried as a compact binary
//!   payload. The encoder writes into a fixed-capacity buffer which can be
//!   reset and reused, and reports an error instead of truncating when the
//!   buffer is full.
//! - Map response status codes and describe access control entries
//!   provisioned on a device.
//!
//! A client deserializes the data model while logging and storing it.
//! A client can avoid importing deserialization functions by disabling the
//! `deserialize` feature at compile time.
//!
//! This crate can be compiled for both `std` and `no_std` environments.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![no_std]

extern crate alloc;

/// Access control entries.
pub mod ace;
/// Binary encoding and decoding of representations.
pub mod codec;
/// Network endpoints.
pub mod endpoint;
/// Encoding and decoding errors.
pub mod error;
/// Device identities.
pub mod identity;
/// Typed representations exchanged with resources.
pub mod representation;
/// Resource handles and their masks.
pub mod resource;
/// Response status codes.
pub mod status;

#[cfg(test)]
#[cfg(feature = "deserialize")]
pub(crate) fn serialize<T: serde::Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

#[cfg(test)]
#[cfg(feature = "deserialize")]
pub(crate) fn deserialize<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}
