use core::convert::Infallible;
use core::fmt;
use core::str::FromStr;

use serde::{Serialize, Serializer};

use uuid::Uuid;

/// Length of the canonical textual form of a [`DeviceId`].
pub const DEVICE_ID_TEXT_LEN: usize = 36;

// Offsets of the hyphens inside the canonical textual form.
const HYPHEN_OFFSETS: [usize; 4] = [8, 13, 18, 23];

// Number of hexadecimal digits carried by a device identity.
const NIBBLES: usize = 32;

/// A 128-bit device identity.
///
/// Two identities are equal when their bytes are equal, whatever text they
/// were parsed from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Generates a random [`DeviceId`].
    #[must_use]
    #[inline]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`DeviceId`] from its raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the raw bytes of a [`DeviceId`].
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Parses a [`DeviceId`] from text.
    ///
    /// Parsing never fails. Hyphens are skipped, hexadecimal digits of either
    /// case contribute their value and any other character contributes a zero
    /// digit. Parsing stops once 32 digits have been read and missing digits
    /// are zero.
    ///
    /// Malformed input therefore yields a deterministic identity whose text
    /// form differs from the input.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut bytes = [0u8; 16];
        let mut nibbles = 0;

        for c in text.bytes() {
            if c == b'-' {
                continue;
            }
            if nibbles == NIBBLES {
                break;
            }

            let value = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                b'A'..=b'F' => c - b'A' + 10,
                _ => 0,
            };

            let index = nibbles / 2;
            if nibbles % 2 == 0 {
                bytes[index] = value << 4;
            } else {
                bytes[index] |= value;
            }
            nibbles += 1;
        }

        Self::from_bytes(bytes)
    }

    /// Checks whether the given text is the canonical form of an identity.
    ///
    /// The canonical form is 36 characters long, lower-case, with hyphens at
    /// offsets 8, 13, 18 and 23.
    #[must_use]
    pub fn is_canonical(text: &str) -> bool {
        text.len() == DEVICE_ID_TEXT_LEN
            && text.bytes().enumerate().all(|(offset, c)| {
                if HYPHEN_OFFSETS.contains(&offset) {
                    c == b'-'
                } else {
                    c.is_ascii_digit() || (b'a'..=b'f').contains(&c)
                }
            })
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({self})")
    }
}

impl FromStr for DeviceId {
    type Err = Infallible;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(text))
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "deserialize")]
impl<'de> serde::Deserialize<'de> for DeviceId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <alloc::string::String as serde::Deserialize>::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}
