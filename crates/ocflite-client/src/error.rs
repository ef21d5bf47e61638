use std::borrow::Cow;
use std::fmt;

use ocflite::error::{DecodeError, EncodingError};
use ocflite::identity::DeviceId;

use serde::Serialize;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A request payload could not be encoded.
    Encoding,
    /// A response payload could not be decoded.
    Decoding,
    /// A response carries an error status.
    ProtocolStatus,
    /// A provisioning operation failed on a device.
    Provisioning,
    /// The transport could not send a request.
    Transport,
    /// The device is not in the registry or not in the required state.
    UnknownDevice,
    /// The client engine has been shut down.
    Shutdown,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Encoding => "Encoding",
            Self::Decoding => "Decoding",
            Self::ProtocolStatus => "Protocol Status",
            Self::Provisioning => "Provisioning",
            Self::Transport => "Transport",
            Self::UnknownDevice => "Unknown Device",
            Self::Shutdown => "Shutdown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A client error.
#[derive(PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    description: Cow<'static, str>,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error(f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error(f)
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    #[must_use]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    fn error(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl From<EncodingError> for Error {
    fn from(e: EncodingError) -> Self {
        Self::new(ErrorKind::Encoding, e.to_string())
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::new(ErrorKind::Decoding, e.to_string())
    }
}

/// A provisioning operation sent to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProvisioningOperation {
    /// Ownership transfer.
    TakeOwnership,
    /// Pairwise credentials provisioning.
    PairwiseCredentials,
    /// Access control entry provisioning.
    AccessControlEntry,
    /// Factory reset.
    Reset,
}

impl fmt::Display for ProvisioningOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TakeOwnership => "take ownership",
            Self::PairwiseCredentials => "provision pairwise credentials",
            Self::AccessControlEntry => "provision access control entry",
            Self::Reset => "reset",
        })
    }
}

/// A failed provisioning operation.
///
/// It carries what a caller needs to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProvisioningFailure {
    /// The device the operation was sent to.
    pub device: DeviceId,
    /// The operation.
    pub operation: ProvisioningOperation,
    /// The status reported by the onboarding engine.
    pub status: i32,
}

impl fmt::Display for ProvisioningFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed on device {} with status {}",
            self.operation, self.device, self.status
        )
    }
}

impl From<ProvisioningFailure> for Error {
    fn from(failure: ProvisioningFailure) -> Self {
        Self::new(ErrorKind::Provisioning, failure.to_string())
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
