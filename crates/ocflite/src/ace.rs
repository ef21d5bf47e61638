use alloc::string::{String, ToString};
use alloc::vec::Vec;

use core::fmt;

use bitflags::bitflags;

use crate::error::EncodingError;
use crate::identity::DeviceId;
use crate::representation::{Representation, Value};

bitflags! {
    /// Operations granted by an [`AccessControlEntry`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        /// Create resources.
        const CREATE = 1 << 0;
        /// Retrieve resources.
        const RETRIEVE = 1 << 1;
        /// Update resources.
        const UPDATE = 1 << 2;
        /// Delete resources.
        const DELETE = 1 << 3;
        /// Observe resources.
        const NOTIFY = 1 << 4;
    }
}

/// Kind of connection an [`AceSubject::ConnectionType`] subject refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    /// Any unauthenticated, unencrypted connection.
    AnonClear,
    /// Any authenticated, encrypted connection.
    AuthCrypt,
}

impl ConnectionType {
    /// Returns the protocol name of a [`ConnectionType`].
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AnonClear => "anon-clear",
            Self::AuthCrypt => "auth-crypt",
        }
    }
}

/// The subject an [`AccessControlEntry`] grants permissions to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AceSubject {
    /// A single device.
    Device(DeviceId),
    /// Every client holding a role.
    Role {
        /// Role name.
        role: String,
        /// Authority which issued the role.
        authority: Option<String>,
    },
    /// Every client connected in a given way.
    ConnectionType(ConnectionType),
}

/// Resources covered by an [`AccessControlEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AceResource {
    /// A single resource path.
    Href(String),
    /// `+`: every discoverable resource.
    AllDiscoverable,
    /// `-`: every non-discoverable resource.
    AllNonDiscoverable,
    /// `*`: every resource.
    All,
}

impl AceResource {
    fn encode(&self) -> Representation {
        let mut resource = Representation::new();
        match self {
            Self::Href(href) => resource.push("href".into(), href.as_str().into()),
            Self::AllDiscoverable => resource.push("wc".into(), "+".into()),
            Self::AllNonDiscoverable => resource.push("wc".into(), "-".into()),
            Self::All => resource.push("wc".into(), "*".into()),
        }
        resource
    }
}

impl fmt::Display for AceResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Href(href) => href.as_str(),
            Self::AllDiscoverable => "+",
            Self::AllNonDiscoverable => "-",
            Self::All => "*",
        })
    }
}

/// An access control entry granting a subject permissions over a set of
/// resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessControlEntry {
    /// The subject the permissions are granted to.
    pub subject: AceSubject,
    /// The covered resources.
    pub resources: Vec<AceResource>,
    /// The granted permissions.
    pub permissions: Permissions,
}

impl AccessControlEntry {
    /// Creates an [`AccessControlEntry`] without resources and permissions.
    #[must_use]
    #[inline]
    pub const fn new(subject: AceSubject) -> Self {
        Self {
            subject,
            resources: Vec::new(),
            permissions: Permissions::empty(),
        }
    }

    /// Adds a covered resource.
    #[must_use]
    #[inline]
    pub fn resource(mut self, resource: AceResource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Sets the granted permissions.
    #[must_use]
    #[inline]
    pub const fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Checks whether the entry can be provisioned.
    ///
    /// # Errors
    ///
    /// An error is returned when the entry covers no resources, or its role
    /// subject has an empty role or authority.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.resources.is_empty() {
            return Err("an access control entry must cover at least one resource");
        }
        if let AceSubject::Role { role, authority } = &self.subject {
            if role.is_empty() {
                return Err("an access control entry role must not be empty");
            }
            if authority.as_deref().is_some_and(str::is_empty) {
                return Err("an access control entry role authority must not be empty");
            }
        }
        Ok(())
    }

    /// Builds the representation of the entry sent to a device.
    ///
    /// The entry is expected to be valid, see [`AccessControlEntry::validate`].
    ///
    /// # Errors
    ///
    /// An [`EncodingError`] is returned when a property cannot be inserted.
    pub fn to_representation(&self) -> Result<Representation, EncodingError> {
        let mut subject = Representation::new();
        match &self.subject {
            AceSubject::Device(id) => subject.insert("uuid", Value::String(id.to_string()))?,
            AceSubject::Role { role, authority } => {
                subject.insert("role", role.as_str())?;
                if let Some(authority) = authority {
                    subject.insert("authority", authority.as_str())?;
                }
            }
            AceSubject::ConnectionType(conn_type) => subject.insert("conntype", conn_type.name())?,
        }

        let mut ace = Representation::new();
        ace.insert("subject", subject)?;
        ace.insert(
            "resources",
            self.resources
                .iter()
                .map(AceResource::encode)
                .collect::<Vec<_>>(),
        )?;
        ace.insert("permission", i64::from(self.permissions.bits()))?;
        Ok(ace)
    }
}
