use std::fmt;

use ocflite::identity::DeviceId;
use ocflite::representation::Representation;
use ocflite::resource::ResourceHandle;
use ocflite::status::Status;

use crate::chain::StopReason;
use crate::error::ProvisioningFailure;
use crate::registry::RegistryEntry;
use crate::transport::Method;

/// An event the client engine reports to the foreground.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A resource of the requested type was discovered.
    ResourceDiscovered(ResourceHandle),
    /// A chained request was answered.
    ChainResponse {
        /// Position in the chain: `0` is the first read.
        index: usize,
        /// Request method.
        method: Method,
        /// Response status.
        status: Status,
        /// Response representation.
        representation: Representation,
    },
    /// An observed resource notified a new representation.
    Notification {
        /// Observe sequence number.
        sequence: u32,
        /// Response status.
        status: Status,
        /// Notified representation.
        representation: Representation,
    },
    /// The observation has been stopped.
    ObservationStopped(StopReason),
    /// A device has been added to the registry or its state changed.
    DeviceUpdated(RegistryEntry),
    /// A device has been removed from the registry.
    DeviceRemoved(DeviceId),
    /// Pairwise credentials were provisioned between two devices.
    CredentialsProvisioned {
        /// First device identity.
        first: DeviceId,
        /// Second device identity.
        second: DeviceId,
    },
    /// A provisioning operation failed.
    ProvisioningFailed(ProvisioningFailure),
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceDiscovered(resource) => {
                write!(f, "Discovered `{}` at `{}`", resource.uri, resource.anchor)
            }
            Self::ChainResponse {
                index,
                method,
                status,
                representation,
            } => write!(
                f,
                "{method} response {index}: {status} with {} properties",
                representation.len()
            ),
            Self::Notification {
                sequence, status, ..
            } => write!(f, "Notification {sequence}: {status}"),
            Self::ObservationStopped(reason) => write!(f, "Observation stopped: {reason:?}"),
            Self::DeviceUpdated(entry) => write!(f, "Device {} is {:?}", entry.device, entry.state),
            Self::DeviceRemoved(device) => write!(f, "Device {device} removed"),
            Self::CredentialsProvisioned { first, second } => {
                write!(f, "Credentials provisioned between {first} and {second}")
            }
            Self::ProvisioningFailed(failure) => fmt::Display::fmt(failure, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use ocflite::identity::DeviceId;
    use ocflite::status::Status;

    use crate::chain::StopReason;
    use crate::error::{ProvisioningFailure, ProvisioningOperation};

    use super::ClientEvent;

    #[test]
    fn display() {
        let device = DeviceId::parse("a4fba108-877c-469e-9270-b400839b0631");

        assert_eq!(
            ClientEvent::DeviceRemoved(device).to_string(),
            "Device a4fba108-877c-469e-9270-b400839b0631 removed"
        );
        assert_eq!(
            ClientEvent::Notification {
                sequence: 3,
                status: Status::Ok,
                representation: Default::default(),
            }
            .to_string(),
            "Notification 3: Ok (2.05)"
        );
        assert_eq!(
            ClientEvent::ObservationStopped(StopReason::Expired).to_string(),
            "Observation stopped: Expired"
        );
        assert_eq!(
            ClientEvent::ProvisioningFailed(ProvisioningFailure {
                device,
                operation: ProvisioningOperation::Reset,
                status: -1,
            })
            .to_string(),
            "reset failed on device a4fba108-877c-469e-9270-b400839b0631 with status -1"
        );
    }
}
