use alloc::string::String;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::endpoint::EndpointList;

bitflags! {
    /// Interfaces exposed by a resource.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct InterfaceMask: u8 {
        /// `oic.if.s`: sensor.
        const S = 1 << 7;
        /// `oic.if.a`: actuator.
        const A = 1 << 6;
        /// `oic.if.rw`: read-write.
        const RW = 1 << 5;
        /// `oic.if.r`: read-only.
        const R = 1 << 4;
        /// `oic.if.b`: batch.
        const B = 1 << 3;
        /// `oic.if.ll`: links list.
        const LL = 1 << 2;
        /// `oic.if.baseline`: baseline.
        const BASELINE = 1 << 1;
    }
}

// Interface names, in the order they are reported.
const INTERFACE_NAMES: [(InterfaceMask, &str, &str); 7] = [
    (InterfaceMask::S, "S", "oic.if.s"),
    (InterfaceMask::A, "A", "oic.if.a"),
    (InterfaceMask::RW, "RW", "oic.if.rw"),
    (InterfaceMask::R, "R", "oic.if.r"),
    (InterfaceMask::B, "B", "oic.if.b"),
    (InterfaceMask::LL, "LL", "oic.if.ll"),
    (InterfaceMask::BASELINE, "BASELINE", "oic.if.baseline"),
];

impl InterfaceMask {
    /// Returns the interface identified by its protocol name, such as
    /// `oic.if.baseline`.
    #[must_use]
    pub fn from_protocol_name(name: &str) -> Option<Self> {
        INTERFACE_NAMES
            .iter()
            .find(|(_, _, protocol)| *protocol == name)
            .map(|(mask, _, _)| *mask)
    }

    /// Builds a mask from a sequence of protocol names.
    ///
    /// Unknown names are ignored.
    #[must_use]
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        names
            .into_iter()
            .filter_map(Self::from_protocol_name)
            .fold(Self::empty(), |mask, interface| mask | interface)
    }

    /// Returns the short names of the interfaces set in the mask.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        INTERFACE_NAMES
            .iter()
            .filter(|(mask, _, _)| self.contains(*mask))
            .map(|(_, short, _)| *short)
            .collect()
    }
}

bitflags! {
    /// Properties of a resource.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ResourceProperties: u8 {
        /// The resource is advertised during discovery.
        const DISCOVERABLE = 1 << 0;
        /// The resource can be observed.
        const OBSERVABLE = 1 << 1;
        /// The resource is only reachable over a secured session.
        const SECURE = 1 << 4;
        /// The resource notifies its observers periodically.
        const PERIODIC = 1 << 6;
    }
}

impl ResourceProperties {
    /// Returns the names of the properties set in the mask.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        [
            (Self::PERIODIC, "PERIODIC"),
            (Self::SECURE, "SECURE"),
            (Self::OBSERVABLE, "OBSERVABLE"),
            (Self::DISCOVERABLE, "DISCOVERABLE"),
        ]
        .into_iter()
        .filter(|(mask, _)| self.contains(*mask))
        .map(|(_, name)| name)
        .collect()
    }
}

/// A resource advertised by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    /// Identifier scoping the resource to its owning device.
    pub anchor: String,
    /// Resource path.
    pub uri: String,
    /// Resource types.
    pub types: Vec<String>,
    /// Exposed interfaces.
    pub interfaces: InterfaceMask,
    /// Resource properties.
    pub properties: ResourceProperties,
    /// Endpoints through which the resource is reachable.
    pub endpoints: EndpointList,
}

impl ResourceHandle {
    /// Creates a [`ResourceHandle`] without types, interfaces and properties.
    #[must_use]
    pub fn new(anchor: impl Into<String>, uri: impl Into<String>, endpoints: EndpointList) -> Self {
        Self {
            anchor: anchor.into(),
            uri: uri.into(),
            types: Vec::new(),
            interfaces: InterfaceMask::empty(),
            properties: ResourceProperties::empty(),
            endpoints,
        }
    }

    /// Adds a resource type.
    #[must_use]
    #[inline]
    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.types.push(resource_type.into());
        self
    }

    /// Sets the exposed interfaces.
    #[must_use]
    #[inline]
    pub const fn interfaces(mut self, interfaces: InterfaceMask) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Sets the resource properties.
    #[must_use]
    #[inline]
    pub const fn properties(mut self, properties: ResourceProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Checks whether the resource declares the given type.
    #[must_use]
    pub fn has_type(&self, resource_type: &str) -> bool {
        self.types.iter().any(|rt| rt == resource_type)
    }
}
