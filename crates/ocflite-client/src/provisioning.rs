use ocflite::ace::AccessControlEntry;
use ocflite::identity::DeviceId;

use tracing::{error, info, warn};

use crate::error::{Error, ErrorKind, ProvisioningFailure, ProvisioningOperation, Result};
use crate::events::ClientEvent;
use crate::registry::{DeviceRegistry, ProvisioningState};
use crate::transport::{Onboarding, OnboardingEvent};

/// The per-device provisioning state machine.
///
/// Operations check the registry before dispatching anything to the
/// onboarding engine. Their outcomes come back as [`OnboardingEvent`]s,
/// which [`Provisioner::apply`] turns into registry transitions. Each outcome
/// is applied exactly once and no operation is retried.
#[derive(Debug, Clone)]
pub struct Provisioner {
    registry: DeviceRegistry,
}

impl Provisioner {
    /// Creates a [`Provisioner`] over a registry.
    #[must_use]
    pub const fn new(registry: DeviceRegistry) -> Self {
        Self { registry }
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Starts the ownership transfer of an unowned device.
    ///
    /// # Errors
    ///
    /// An [`ErrorKind::UnknownDevice`] error is returned when the device is
    /// not in the registry as unowned.
    pub fn take_ownership(&self, onboarding: &mut dyn Onboarding, device: DeviceId) -> Result<()> {
        match self.registry.state(device) {
            Some(ProvisioningState::Unowned) => onboarding.take_ownership(device),
            Some(state) => Err(Error::new(
                ErrorKind::UnknownDevice,
                format!("Device {device} is not unowned but {state:?}."),
            )),
            None => Err(unknown(device)),
        }
    }

    /// Starts provisioning pairwise credentials between two owned devices.
    ///
    /// # Errors
    ///
    /// An [`ErrorKind::UnknownDevice`] error is returned when a device is not
    /// owned, an [`ErrorKind::Provisioning`] error when both identities are
    /// the same.
    pub fn provision_credentials(
        &self,
        onboarding: &mut dyn Onboarding,
        first: DeviceId,
        second: DeviceId,
    ) -> Result<()> {
        if first == second {
            return Err(Error::new(
                ErrorKind::Provisioning,
                format!("Pairwise credentials need two distinct devices, got {first} twice."),
            ));
        }
        self.require_owned(first)?;
        self.require_owned(second)?;
        onboarding.provision_pairwise_credentials(first, second)
    }

    /// Starts provisioning an access control entry on an owned device.
    ///
    /// # Errors
    ///
    /// An [`ErrorKind::Provisioning`] error is returned when the entry is
    /// invalid, an [`ErrorKind::UnknownDevice`] error when the device is not
    /// owned.
    pub fn provision_ace(
        &self,
        onboarding: &mut dyn Onboarding,
        device: DeviceId,
        ace: &AccessControlEntry,
    ) -> Result<()> {
        ace.validate()
            .map_err(|e| Error::new(ErrorKind::Provisioning, e))?;
        self.require_owned(device)?;
        onboarding.provision_ace(device, ace)
    }

    /// Starts the factory reset of a known device.
    ///
    /// # Errors
    ///
    /// An [`ErrorKind::UnknownDevice`] error is returned when the device is
    /// not in the registry.
    pub fn reset_device(&self, onboarding: &mut dyn Onboarding, device: DeviceId) -> Result<()> {
        if !self.registry.contains(device) {
            return Err(unknown(device));
        }
        onboarding.reset_device(device)
    }

    /// Applies an onboarding outcome to the registry, returning the events
    /// describing the changes.
    ///
    /// A failed ownership transfer, credentials provisioning or reset leaves
    /// the registry untouched.
    ///
    /// A failed access control entry provisioning evicts the device from the
    /// registry instead of moving it back to
    /// [`ProvisioningState::Owned`]. Callers have to discover the device
    /// again before retrying.
    pub fn apply(&self, event: OnboardingEvent) -> Vec<ClientEvent> {
        match event {
            OnboardingEvent::UnownedDevice { device, endpoints } => {
                info!("Discovered unowned device {device}");
                vec![ClientEvent::DeviceUpdated(
                    self.registry.merge_unowned(device, endpoints),
                )]
            }
            OnboardingEvent::OwnedDevice { device, endpoints } => {
                info!("Discovered owned device {device}");
                vec![ClientEvent::DeviceUpdated(
                    self.registry.merge_owned(device, endpoints),
                )]
            }
            OnboardingEvent::OwnershipTransferred { device, status } => {
                if status < 0 {
                    return vec![failed(device, ProvisioningOperation::TakeOwnership, status)];
                }
                info!("Took ownership of device {device}");
                self.transition(device, ProvisioningState::Owned)
            }
            OnboardingEvent::CredentialsProvisioned {
                first,
                second,
                status,
            } => {
                if status < 0 {
                    return vec![failed(
                        first,
                        ProvisioningOperation::PairwiseCredentials,
                        status,
                    )];
                }
                info!("Provisioned pairwise credentials between {first} and {second}");
                if !self.registry.add_credentials(first, second) {
                    info!("Credentials between {first} and {second} were already provisioned");
                }
                vec![ClientEvent::CredentialsProvisioned { first, second }]
            }
            OnboardingEvent::AceProvisioned { device, status } => {
                if status < 0 {
                    let mut events =
                        vec![failed(device, ProvisioningOperation::AccessControlEntry, status)];
                    if self.registry.remove(device).is_some() {
                        warn!("Device {device} evicted from the registry");
                        events.push(ClientEvent::DeviceRemoved(device));
                    }
                    return events;
                }
                info!("Provisioned access control entry on device {device}");
                self.transition(device, ProvisioningState::AceProvisioned)
            }
            OnboardingEvent::DeviceReset { device, status } => {
                if status < 0 {
                    return vec![failed(device, ProvisioningOperation::Reset, status)];
                }
                info!("Reset device {device}");
                match self.registry.remove(device) {
                    Some(_) => vec![ClientEvent::DeviceRemoved(device)],
                    None => {
                        warn!("Reset device {device} was not in the registry");
                        Vec::new()
                    }
                }
            }
        }
    }

    fn transition(&self, device: DeviceId, state: ProvisioningState) -> Vec<ClientEvent> {
        match self.registry.set_state(device, state) {
            Some(entry) => vec![ClientEvent::DeviceUpdated(entry)],
            None => {
                warn!("Device {device} left the registry before reaching {state:?}");
                Vec::new()
            }
        }
    }

    fn require_owned(&self, device: DeviceId) -> Result<()> {
        match self.registry.state(device) {
            Some(state) if state.is_owned() => Ok(()),
            Some(state) => Err(Error::new(
                ErrorKind::UnknownDevice,
                format!("Device {device} is not owned but {state:?}."),
            )),
            None => Err(unknown(device)),
        }
    }
}

fn unknown(device: DeviceId) -> Error {
    Error::new(
        ErrorKind::UnknownDevice,
        format!("Device {device} is not in the registry."),
    )
}

fn failed(device: DeviceId, operation: ProvisioningOperation, status: i32) -> ClientEvent {
    let failure = ProvisioningFailure {
        device,
        operation,
        status,
    };
    error!("{failure}");
    ClientEvent::ProvisioningFailed(failure)
}
