use core::fmt;

/// An error raised while encoding a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingError {
    /// The payload does not fit into the buffer.
    BufferOverflow {
        /// Capacity of the buffer, in bytes.
        capacity: usize,
        /// Number of bytes the payload needed at the point of failure.
        required: usize,
    },
    /// A property has an empty name.
    EmptyName,
    /// An array of values holds an object.
    ObjectInArray,
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferOverflow { capacity, required } => write!(
                f,
                "payload needs at least {required} bytes but the buffer holds {capacity}"
            ),
            Self::EmptyName => f.write_str("property name is empty"),
            Self::ObjectInArray => {
                f.write_str("objects must be carried by an object array, not by an array")
            }
        }
    }
}

impl core::error::Error for EncodingError {}

/// An error raised while decoding a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is not well-formed.
    Malformed,
    /// The root is neither an object nor an array of objects.
    UnexpectedRoot,
    /// An object key is not a text string.
    NonTextKey,
    /// A property has an empty name.
    EmptyName,
    /// Objects and arrays are nested too deeply.
    TooDeep,
    /// An integer does not fit into 64 signed bits.
    ValueOutOfRange,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Malformed => "malformed payload",
            Self::UnexpectedRoot => "payload root is neither an object nor an array of objects",
            Self::NonTextKey => "object key is not a text string",
            Self::EmptyName => "property name is empty",
            Self::TooDeep => "payload is nested too deeply",
            Self::ValueOutOfRange => "integer out of range",
        })
    }
}

impl core::error::Error for DecodeError {}

impl From<minicbor::decode::Error> for DecodeError {
    fn from(e: minicbor::decode::Error) -> Self {
        if e.is_end_of_input() || e.is_type_mismatch() {
            log::debug!("Decoding failure: {e}");
        } else {
            log::warn!("Decoding failure: {e}");
        }
        Self::Malformed
    }
}
