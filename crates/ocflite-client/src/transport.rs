use std::fmt;
use std::path::Path;

use ocflite::ace::AccessControlEntry;
use ocflite::endpoint::{Endpoint, EndpointList};
use ocflite::identity::DeviceId;

use bytes::Bytes;

use serde::Serialize;

use crate::error::Result;

/// Path of the resource listing the resources of a device.
pub const DISCOVERY_URI: &str = "/oic/res";

/// An 8-byte token correlating a request with its responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token([u8; 8]);

impl Token {
    /// Creates a [`Token`] from its bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Returns the token bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// Quality of service class of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Qos {
    /// Confirmable requests, retransmitted until acknowledged.
    High,
    /// Non-confirmable requests.
    #[default]
    Low,
}

/// The observe option of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserveAction {
    /// Registers an observation.
    Register,
    /// Cancels an observation.
    Deregister,
}

/// A request handed to the [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Correlation token.
    pub token: Token,
    /// Request method.
    pub method: Method,
    /// Destination endpoint, or [`None`] for a multicast request.
    pub endpoint: Option<Endpoint>,
    /// Resource path.
    pub uri: String,
    /// Query string, without the leading `?`.
    pub query: Option<String>,
    /// Quality of service class.
    pub qos: Qos,
    /// Observe option.
    pub observe: Option<ObserveAction>,
    /// Encoded payload.
    pub payload: Bytes,
}

impl OutboundRequest {
    /// Creates a unicast [`OutboundRequest`] without payload.
    #[must_use]
    pub fn unicast(token: Token, method: Method, endpoint: Endpoint, uri: &str, qos: Qos) -> Self {
        Self {
            token,
            method,
            endpoint: Some(endpoint),
            uri: uri.into(),
            query: None,
            qos,
            observe: None,
            payload: Bytes::new(),
        }
    }

    /// Creates a multicast discovery request, optionally filtered by
    /// resource type.
    #[must_use]
    pub fn discovery(token: Token, resource_type: Option<&str>) -> Self {
        Self {
            token,
            method: Method::Get,
            endpoint: None,
            uri: DISCOVERY_URI.into(),
            query: resource_type.map(|rt| format!("rt={rt}")),
            qos: Qos::Low,
            observe: None,
            payload: Bytes::new(),
        }
    }

    /// Sets the observe option.
    #[must_use]
    #[inline]
    pub const fn observe(mut self, observe: ObserveAction) -> Self {
        self.observe = Some(observe);
        self
    }

    /// Sets the payload.
    #[must_use]
    #[inline]
    pub fn payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }
}

/// The network engine sending requests on behalf of the client.
///
/// Sending is fire-and-forget: responses are delivered later through
/// [`EngineHandle::deliver`](crate::client::EngineHandle::deliver).
pub trait Transport: Send + 'static {
    /// Sends a request.
    ///
    /// # Errors
    ///
    /// An error is returned when the request cannot be sent.
    fn send(&mut self, request: OutboundRequest) -> Result<()>;

    /// Releases the endpoints of a resource the client is not interested in.
    fn free_endpoints(&mut self, endpoints: EndpointList) {
        drop(endpoints);
    }
}

/// The security engine running the onboarding operations.
///
/// Every operation is fire-and-forget: its outcome is delivered later as an
/// [`OnboardingEvent`] through
/// [`EngineHandle::deliver`](crate::client::EngineHandle::deliver).
pub trait Onboarding: Send + 'static {
    /// Configures the directory where credentials are persisted.
    ///
    /// # Errors
    ///
    /// An error is returned when the storage cannot be used.
    fn configure_storage(&mut self, path: &Path) -> Result<()>;

    /// Starts discovering devices without an owner.
    ///
    /// # Errors
    ///
    /// An error is returned when the discovery cannot start.
    fn discover_unowned(&mut self) -> Result<()>;

    /// Starts discovering devices owned by this client.
    ///
    /// # Errors
    ///
    /// An error is returned when the discovery cannot start.
    fn discover_owned(&mut self) -> Result<()>;

    /// Starts the ownership transfer of a device.
    ///
    /// # Errors
    ///
    /// An error is returned when the operation cannot start.
    fn take_ownership(&mut self, device: DeviceId) -> Result<()>;

    /// Starts provisioning pairwise credentials between two devices.
    ///
    /// # Errors
    ///
    /// An error is returned when the operation cannot start.
    fn provision_pairwise_credentials(&mut self, first: DeviceId, second: DeviceId) -> Result<()>;

    /// Starts provisioning an access control entry on a device.
    ///
    /// # Errors
    ///
    /// An error is returned when the operation cannot start.
    fn provision_ace(&mut self, device: DeviceId, ace: &AccessControlEntry) -> Result<()>;

    /// Starts the factory reset of a device.
    ///
    /// # Errors
    ///
    /// An error is returned when the operation cannot start.
    fn reset_device(&mut self, device: DeviceId) -> Result<()>;
}

/// An outcome reported by the onboarding engine.
///
/// A negative status is a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingEvent {
    /// A device without an owner was found.
    UnownedDevice {
        /// Device identity.
        device: DeviceId,
        /// Device endpoints.
        endpoints: EndpointList,
    },
    /// A device owned by this client was found.
    OwnedDevice {
        /// Device identity.
        device: DeviceId,
        /// Device endpoints.
        endpoints: EndpointList,
    },
    /// An ownership transfer completed.
    OwnershipTransferred {
        /// Device identity.
        device: DeviceId,
        /// Completion status.
        status: i32,
    },
    /// A pairwise credentials provisioning completed.
    CredentialsProvisioned {
        /// First device identity.
        first: DeviceId,
        /// Second device identity.
        second: DeviceId,
        /// Completion status.
        status: i32,
    },
    /// An access control entry provisioning completed.
    AceProvisioned {
        /// Device identity.
        device: DeviceId,
        /// Completion status.
        status: i32,
    },
    /// A factory reset completed.
    DeviceReset {
        /// Device identity.
        device: DeviceId,
        /// Completion status.
        status: i32,
    },
}
