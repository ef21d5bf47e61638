use core::fmt;

use serde::Serialize;

/// Status of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub enum Status {
    /// The request succeeded.
    Ok,
    /// A resource was created.
    Created,
    /// The resource was changed.
    Changed,
    /// The resource was deleted.
    Deleted,
    /// The resource did not change.
    NotModified,
    /// The request is malformed.
    BadRequest,
    /// The client is not authorized.
    Unauthorized,
    /// The request carries an unrecognized option.
    BadOption,
    /// The client is not allowed to access the resource.
    Forbidden,
    /// The resource does not exist.
    NotFound,
    /// The resource does not support the method.
    MethodNotAllowed,
    /// No acceptable representation exists.
    NotAcceptable,
    /// The request payload is too large.
    RequestEntityTooLarge,
    /// The payload format is not supported.
    UnsupportedMediaType,
    /// The server failed.
    InternalServerError,
    /// The server does not implement the request.
    NotImplemented,
    /// A proxy received a bad response.
    BadGateway,
    /// The server is not available.
    ServiceUnavailable,
    /// A proxy did not receive a response in time.
    GatewayTimeout,
    /// Proxying is not supported.
    ProxyingNotSupported,
}

// Mapping between statuses and `CoAP` response codes, written as
// `class << 5 | detail`.
const CODES: [(Status, u8); 20] = [
    (Status::Ok, code(2, 5)),
    (Status::Created, code(2, 1)),
    (Status::Changed, code(2, 4)),
    (Status::Deleted, code(2, 2)),
    (Status::NotModified, code(2, 3)),
    (Status::BadRequest, code(4, 0)),
    (Status::Unauthorized, code(4, 1)),
    (Status::BadOption, code(4, 2)),
    (Status::Forbidden, code(4, 3)),
    (Status::NotFound, code(4, 4)),
    (Status::MethodNotAllowed, code(4, 5)),
    (Status::NotAcceptable, code(4, 6)),
    (Status::RequestEntityTooLarge, code(4, 13)),
    (Status::UnsupportedMediaType, code(4, 15)),
    (Status::InternalServerError, code(5, 0)),
    (Status::NotImplemented, code(5, 1)),
    (Status::BadGateway, code(5, 2)),
    (Status::ServiceUnavailable, code(5, 3)),
    (Status::GatewayTimeout, code(5, 4)),
    (Status::ProxyingNotSupported, code(5, 5)),
];

const fn code(class: u8, detail: u8) -> u8 {
    (class << 5) | detail
}

impl Status {
    /// Returns the `CoAP` response code of a [`Status`].
    #[must_use]
    pub fn coap_code(&self) -> u8 {
        CODES
            .iter()
            .find(|(status, _)| status == self)
            .map_or(0, |(_, code)| *code)
    }

    /// Returns the [`Status`] matching a `CoAP` response code.
    #[must_use]
    pub fn from_coap_code(coap_code: u8) -> Option<Self> {
        CODES
            .iter()
            .find(|(_, code)| *code == coap_code)
            .map(|(status, _)| *status)
    }

    /// Whether the status belongs to the success class.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Ok | Self::Created | Self::Changed | Self::Deleted | Self::NotModified
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.coap_code();
        write!(f, "{self:?} ({}.{:02})", code >> 5, code & 0x1f)
    }
}
