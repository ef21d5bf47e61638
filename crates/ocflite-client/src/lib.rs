//! The `ocflite-client` library crate provides a set of APIs to discover the
//! resources of `OCF` devices, interact with them, and onboard the devices
//! themselves.
//!
//! Core functionalities of this crate include:
//!
//! - Discovering the first resource of a given type and running a scripted
//!   interaction with it: a read, a sequence of updates and an observation
//!   automatically stopped after a delay
//! - Discovering owned and unowned devices and tracking their provisioning
//!   state in a registry
//! - Transferring the ownership of devices, provisioning pairwise credentials
//!   and access control entries, and resetting devices
//!
//! The network and security engines are external collaborators plugged in
//! through the [`transport::Transport`] and [`transport::Onboarding`] traits.
//! They deliver their responses and outcomes back through a
//! [`client::EngineHandle`].
//!
//! A single `tokio` task drives the client engine. Foreground operations
//! never wait for the network, their outcomes are reported as
//! [`events::ClientEvent`]s.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// The observe chain run on a discovered resource.
pub mod chain;
/// The client handle and its engine worker.
pub mod client;
/// Client configuration.
pub mod config;
/// The dispatcher of discovered resources.
pub mod discovery;
/// Error management.
pub mod error;
/// All events reported by the client.
pub mod events;
/// The per-device provisioning state machine.
pub mod provisioning;
/// The registry of known devices.
pub mod registry;
/// In-flight request correlation.
pub mod request;
/// Responses and inbound events.
pub mod response;
/// One-shot delayed callbacks.
pub mod scheduler;
/// Interfaces of the network and security engines.
pub mod transport;

mod engine;

#[cfg(test)]
mod tests;
