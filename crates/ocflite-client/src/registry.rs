use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ocflite::endpoint::EndpointList;
use ocflite::identity::DeviceId;

use hashbrown::{HashMap, HashSet};

use serde::Serialize;

use tracing::debug;

/// The provisioning state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProvisioningState {
    /// The device has no owner.
    Unowned,
    /// The device is owned by this client.
    Owned,
    /// An access control entry has been provisioned on the device.
    AceProvisioned,
}

impl ProvisioningState {
    /// Checks whether the device is owned by this client.
    #[must_use]
    pub const fn is_owned(self) -> bool {
        matches!(self, Self::Owned | Self::AceProvisioned)
    }
}

/// A device known to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    /// Device identity.
    pub device: DeviceId,
    /// Provisioning state.
    pub state: ProvisioningState,
    /// Endpoints through which the device is reachable.
    #[serde(skip)]
    pub endpoints: EndpointList,
}

#[derive(Debug, Default)]
struct Devices {
    entries: HashMap<DeviceId, RegistryEntry>,
    // Each pair is stored with its smaller identity first.
    credentials: HashSet<(DeviceId, DeviceId)>,
}

impl Devices {
    fn drop_credentials(&mut self, device: DeviceId) {
        self.credentials
            .retain(|(first, second)| *first != device && *second != device);
    }
}

/// The devices discovered or owned by the client, with their provisioning
/// state and the pairwise credentials provisioned among them.
///
/// Every access goes through a single lock, so at most one mutation is in
/// flight at a time. Cloning the registry clones a handle to the same
/// devices.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Arc<Mutex<Devices>>,
}

impl DeviceRegistry {
    /// Creates an empty [`DeviceRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every device, ordered by identity.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<_> = self.lock().entries.values().cloned().collect();
        entries.sort_by_key(|entry| entry.device);
        entries
    }

    /// Returns the devices in the given state, ordered by identity.
    #[must_use]
    pub fn devices_in(&self, state: ProvisioningState) -> Vec<DeviceId> {
        let mut devices: Vec<_> = self
            .lock()
            .entries
            .values()
            .filter(|entry| entry.state == state)
            .map(|entry| entry.device)
            .collect();
        devices.sort_unstable();
        devices
    }

    /// Returns the devices sharing pairwise credentials with a device,
    /// ordered by identity.
    #[must_use]
    pub fn credential_peers(&self, device: DeviceId) -> Vec<DeviceId> {
        let mut peers: Vec<_> = self
            .lock()
            .credentials
            .iter()
            .filter_map(|&(first, second)| {
                if first == device {
                    Some(second)
                } else if second == device {
                    Some(first)
                } else {
                    None
                }
            })
            .collect();
        peers.sort_unstable();
        peers
    }

    /// Returns the state of a device.
    #[must_use]
    pub fn state(&self, device: DeviceId) -> Option<ProvisioningState> {
        self.lock().entries.get(&device).map(|entry| entry.state)
    }

    /// Returns the endpoints of a device.
    #[must_use]
    pub fn endpoints(&self, device: DeviceId) -> Option<EndpointList> {
        self.lock()
            .entries
            .get(&device)
            .map(|entry| entry.endpoints.clone())
    }

    /// Checks whether a device is in the registry.
    #[must_use]
    pub fn contains(&self, device: DeviceId) -> bool {
        self.lock().entries.contains_key(&device)
    }

    /// Returns the number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Checks whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    // A device advertised as unowned restarts from `Unowned` and loses its
    // credentials.
    pub(crate) fn merge_unowned(&self, device: DeviceId, endpoints: EndpointList) -> RegistryEntry {
        let mut devices = self.lock();
        devices.drop_credentials(device);
        let entry = RegistryEntry {
            device,
            state: ProvisioningState::Unowned,
            endpoints,
        };
        if let Some(previous) = devices.entries.insert(device, entry.clone()) {
            debug!("Device {device} merged, was {:?}", previous.state);
        }
        entry
    }

    // A device advertised as owned leaves `Unowned` and keeps any later
    // state.
    pub(crate) fn merge_owned(&self, device: DeviceId, endpoints: EndpointList) -> RegistryEntry {
        let mut devices = self.lock();
        let entry = devices
            .entries
            .entry(device)
            .and_modify(|entry| {
                debug!("Device {device} merged, was {:?}", entry.state);
                if entry.state == ProvisioningState::Unowned {
                    entry.state = ProvisioningState::Owned;
                }
            })
            .or_insert_with(|| RegistryEntry {
                device,
                state: ProvisioningState::Owned,
                endpoints: EndpointList::new(),
            });
        entry.endpoints = endpoints;
        entry.clone()
    }

    pub(crate) fn set_state(
        &self,
        device: DeviceId,
        state: ProvisioningState,
    ) -> Option<RegistryEntry> {
        let mut devices = self.lock();
        let entry = devices.entries.get_mut(&device)?;
        debug!("Device {device} moves from {:?} to {state:?}", entry.state);
        entry.state = state;
        Some(entry.clone())
    }

    pub(crate) fn remove(&self, device: DeviceId) -> Option<RegistryEntry> {
        let mut devices = self.lock();
        devices.drop_credentials(device);
        devices.entries.remove(&device)
    }

    pub(crate) fn add_credentials(&self, first: DeviceId, second: DeviceId) -> bool {
        let pair = if first <= second {
            (first, second)
        } else {
            (second, first)
        };
        self.lock().credentials.insert(pair)
    }

    fn lock(&self) -> MutexGuard<'_, Devices> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
