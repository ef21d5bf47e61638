use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use core::fmt;
use core::net::{Ipv4Addr, Ipv6Addr};
use core::str::FromStr;

use bitflags::bitflags;

// Default `CoAP` port.
const COAP_PORT: u16 = 5683;
// Default `CoAP` over `DTLS` port.
const COAPS_PORT: u16 = 5684;

bitflags! {
    /// Transport flags of an [`Endpoint`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransportFlags: u16 {
        /// The endpoint was obtained through multicast discovery.
        const DISCOVERY = 1 << 0;
        /// The endpoint requires a secured session.
        const SECURED = 1 << 1;
        /// The endpoint is reachable over `IPv4`.
        const IPV4 = 1 << 2;
        /// The endpoint is reachable over `IPv6`.
        const IPV6 = 1 << 3;
        /// The endpoint is reachable over `TCP`.
        const TCP = 1 << 4;
        /// The endpoint is reachable over Bluetooth `GATT`.
        const GATT = 1 << 5;
        /// The endpoint is a multicast group.
        const MULTICAST = 1 << 6;
    }
}

/// Protocol version spoken by an [`Endpoint`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OcfVersion {
    /// `OCF 1.0.0`.
    #[default]
    Ocf1_0_0,
    /// `OIC 1.1.0`.
    Oic1_1_0,
}

impl OcfVersion {
    /// Returns the numeric value of an [`OcfVersion`].
    #[must_use]
    pub const fn value(&self) -> u16 {
        match self {
            Self::Ocf1_0_0 => 2048,
            Self::Oic1_1_0 => 2112,
        }
    }
}

impl fmt::Display for OcfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ocf1_0_0 => "OCF 1.0.0",
            Self::Oic1_1_0 => "OIC 1.1.0",
        })
    }
}

/// The transport-specific address of an [`Endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAddress {
    /// An `IPv4` address.
    Ipv4 {
        /// Address bytes.
        address: [u8; 4],
        /// Port number.
        port: u16,
    },
    /// An `IPv6` address.
    Ipv6 {
        /// Address bytes.
        address: [u8; 16],
        /// Port number.
        port: u16,
        /// Scope (interface) identifier of a link-local address.
        scope: u8,
    },
    /// A Bluetooth LE address.
    Bluetooth {
        /// Address type.
        kind: u8,
        /// Address bytes.
        address: [u8; 6],
    },
}

/// An error raised while parsing an [`Endpoint`] from its text form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointParseError {
    /// The scheme is not one of `coap`, `coaps`, `coap+tcp` or `coaps+tcp`.
    UnknownScheme,
    /// The host is not a valid `IPv4` or `IPv6` address.
    InvalidAddress,
    /// The port is not a valid number.
    InvalidPort,
}

impl fmt::Display for EndpointParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnknownScheme => "unknown endpoint scheme",
            Self::InvalidAddress => "invalid endpoint address",
            Self::InvalidPort => "invalid endpoint port",
        })
    }
}

impl core::error::Error for EndpointParseError {}

/// A network endpoint through which a device or a resource is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Transport flags.
    pub flags: TransportFlags,
    /// Transport-specific address.
    pub address: DeviceAddress,
    /// Index of the owning device.
    pub device: usize,
    /// Index of the network interface the endpoint was seen on.
    pub interface_index: u32,
    /// Protocol version.
    pub version: OcfVersion,
}

impl Endpoint {
    /// Creates an `IPv4` [`Endpoint`].
    ///
    /// The [`TransportFlags::IPV4`] flag is always set.
    #[must_use]
    pub const fn ipv4(address: [u8; 4], port: u16, flags: TransportFlags) -> Self {
        Self {
            flags: flags.union(TransportFlags::IPV4),
            address: DeviceAddress::Ipv4 { address, port },
            device: 0,
            interface_index: 0,
            version: OcfVersion::Ocf1_0_0,
        }
    }

    /// Creates an `IPv6` [`Endpoint`].
    ///
    /// The [`TransportFlags::IPV6`] flag is always set.
    #[must_use]
    pub const fn ipv6(address: [u8; 16], port: u16, flags: TransportFlags) -> Self {
        Self {
            flags: flags.union(TransportFlags::IPV6),
            address: DeviceAddress::Ipv6 {
                address,
                port,
                scope: 0,
            },
            device: 0,
            interface_index: 0,
            version: OcfVersion::Ocf1_0_0,
        }
    }

    /// Creates a Bluetooth LE [`Endpoint`].
    #[must_use]
    pub const fn bluetooth(kind: u8, address: [u8; 6]) -> Self {
        Self {
            flags: TransportFlags::GATT,
            address: DeviceAddress::Bluetooth { kind, address },
            device: 0,
            interface_index: 0,
            version: OcfVersion::Ocf1_0_0,
        }
    }

    /// Sets the owning device index.
    #[must_use]
    pub const fn device(mut self, device: usize) -> Self {
        self.device = device;
        self
    }

    /// Sets the network interface index.
    #[must_use]
    pub const fn interface_index(mut self, interface_index: u32) -> Self {
        self.interface_index = interface_index;
        self
    }

    /// Sets the protocol version.
    #[must_use]
    pub const fn version(mut self, version: OcfVersion) -> Self {
        self.version = version;
        self
    }

    /// Returns the port number, if the address carries one.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        match self.address {
            DeviceAddress::Ipv4 { port, .. } | DeviceAddress::Ipv6 { port, .. } => Some(port),
            DeviceAddress::Bluetooth { .. } => None,
        }
    }

    /// Whether the endpoint requires a secured session.
    #[must_use]
    pub const fn is_secured(&self) -> bool {
        self.flags.contains(TransportFlags::SECURED)
    }

    /// Whether the endpoint is an `IPv6` link-local address.
    #[must_use]
    pub fn is_ipv6_link_local(&self) -> bool {
        match self.address {
            DeviceAddress::Ipv6 { address, .. } => address[0] == 0xfe && address[1] & 0xc0 == 0x80,
            _ => false,
        }
    }

    /// Sets the `IPv6` scope, when the address is an `IPv6` one.
    pub const fn set_ipv6_scope(&mut self, new_scope: u8) {
        if let DeviceAddress::Ipv6 { ref mut scope, .. } = self.address {
            *scope = new_scope;
        }
    }

    /// Returns the `IPv6` scope, when the address is an `IPv6` one.
    #[must_use]
    pub const fn ipv6_scope(&self) -> Option<u8> {
        match self.address {
            DeviceAddress::Ipv6 { scope, .. } => Some(scope),
            _ => None,
        }
    }

    /// Returns the diagnostic form of the endpoint address.
    ///
    /// The transport flags drive the format:
    ///
    /// - `IPv4`: `a.b.c.d:port`
    /// - `IPv6`: eight colon-separated groups of four lower-case hexadecimal
    ///   digits followed by `:port`
    ///
    /// Any other endpoint has no diagnostic address.
    #[must_use]
    pub fn address_string(&self) -> Option<String> {
        if self.flags.contains(TransportFlags::IPV4) {
            if let DeviceAddress::Ipv4 { address, port } = self.address {
                return Some(format!(
                    "{}.{}.{}.{}:{port}",
                    address[0], address[1], address[2], address[3]
                ));
            }
        } else if self.flags.contains(TransportFlags::IPV6)
            && let DeviceAddress::Ipv6 { address, port, .. } = self.address
        {
            let mut text = String::with_capacity(46);
            for (index, word) in address.chunks_exact(2).enumerate() {
                if index > 0 {
                    text.push(':');
                }
                text.push_str(&format!("{:02x}{:02x}", word[0], word[1]));
            }
            text.push_str(&format!(":{port}"));
            return Some(text);
        }
        None
    }

    /// Parses an [`Endpoint`] from a `coap` URI, returning the endpoint
    /// together with the path that follows the authority, if any.
    ///
    /// # Errors
    ///
    /// Returns an [`EndpointParseError`] when the scheme is unknown, the host
    /// is not an IP address or the port is not a number.
    pub fn parse_with_path(text: &str) -> Result<(Self, Option<String>), EndpointParseError> {
        let (scheme, rest) = text
            .split_once("://")
            .ok_or(EndpointParseError::UnknownScheme)?;

        let (mut flags, default_port) = match scheme {
            "coap" => (TransportFlags::empty(), COAP_PORT),
            "coaps" => (TransportFlags::SECURED, COAPS_PORT),
            "coap+tcp" => (TransportFlags::TCP, COAP_PORT),
            "coaps+tcp" => (TransportFlags::SECURED | TransportFlags::TCP, COAPS_PORT),
            _ => return Err(EndpointParseError::UnknownScheme),
        };

        let (authority, path) = match rest.find('/') {
            Some(index) => (&rest[..index], Some(rest[index..].to_string())),
            None => (rest, None),
        };

        let endpoint = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or(EndpointParseError::InvalidAddress)?;
            let address =
                Ipv6Addr::from_str(host).map_err(|_| EndpointParseError::InvalidAddress)?;
            let port = parse_port(after, default_port)?;
            flags |= TransportFlags::IPV6;
            Self::ipv6(address.octets(), port, flags)
        } else {
            let (host, port) = match authority.split_once(':') {
                Some((host, port)) => (host, parse_port(&format!(":{port}"), default_port)?),
                None => (authority, default_port),
            };
            let address =
                Ipv4Addr::from_str(host).map_err(|_| EndpointParseError::InvalidAddress)?;
            flags |= TransportFlags::IPV4;
            Self::ipv4(address.octets(), port, flags)
        };

        Ok((endpoint, path))
    }

    fn scheme(&self) -> &'static str {
        match (
            self.flags.contains(TransportFlags::SECURED),
            self.flags.contains(TransportFlags::TCP),
        ) {
            (false, false) => "coap",
            (true, false) => "coaps",
            (false, true) => "coap+tcp",
            (true, true) => "coaps+tcp",
        }
    }
}

fn parse_port(text: &str, default_port: u16) -> Result<u16, EndpointParseError> {
    if text.is_empty() {
        return Ok(default_port);
    }
    text.strip_prefix(':')
        .and_then(|port| port.parse::<u16>().ok())
        .ok_or(EndpointParseError::InvalidPort)
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            DeviceAddress::Ipv4 { address, port } => {
                write!(f, "{}://{}:{port}", self.scheme(), Ipv4Addr::from(address))
            }
            DeviceAddress::Ipv6 { address, port, .. } => {
                write!(f, "{}://[{}]:{port}", self.scheme(), Ipv6Addr::from(address))
            }
            DeviceAddress::Bluetooth { address, .. } => write!(
                f,
                "gatt://{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                address[0], address[1], address[2], address[3], address[4], address[5]
            ),
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse_with_path(text).map(|(endpoint, _)| endpoint)
    }
}

/// The ordered list of [`Endpoint`]s through which one resource or device is
/// reachable.
///
/// The order is the discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointList(Vec<Endpoint>);

impl EndpointList {
    /// Creates an empty [`EndpointList`].
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates an [`EndpointList`] from a sequence of [`Endpoint`]s.
    #[must_use]
    #[inline]
    pub fn from_endpoints(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        Self(endpoints.into_iter().collect())
    }

    /// Appends an [`Endpoint`] at the end of the list.
    #[inline]
    pub fn push(&mut self, endpoint: Endpoint) {
        self.0.push(endpoint);
    }

    /// Returns the first [`Endpoint`], the preferred one for requests.
    #[must_use]
    pub fn first(&self) -> Option<&Endpoint> {
        self.0.first()
    }

    /// Returns an iterator over the [`Endpoint`]s.
    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, Endpoint> {
        self.0.iter()
    }

    /// Returns the number of [`Endpoint`]s.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the list is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a EndpointList {
    type Item = &'a Endpoint;
    type IntoIter = core::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for EndpointList {
    type Item = Endpoint;
    type IntoIter = alloc::vec::IntoIter<Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
