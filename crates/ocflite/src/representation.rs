use alloc::string::String;
use alloc::vec::Vec;

use serde::Serialize;

use crate::error::EncodingError;

/// A typed value carried by a [`Representation`] property.
///
/// Objects are carried by [`Value::Object`] and [`Value::ObjectArray`] only:
/// a [`Value::Array`] holding objects cannot be encoded. An empty array and
/// an empty object array have the same payload, hence they compare equal.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub enum Value {
    /// A signed integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// A double-precision floating point number.
    Double(f64),
    /// A text string.
    String(String),
    /// A byte string.
    ByteString(Vec<u8>),
    /// An array of values.
    Array(Vec<Value>),
    /// A nested object.
    Object(Representation),
    /// An array of nested objects.
    ObjectArray(Vec<Representation>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::ByteString(a), Self::ByteString(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::ObjectArray(a), Self::ObjectArray(b)) => a == b,
            (Self::Array(values), Self::ObjectArray(objects))
            | (Self::ObjectArray(objects), Self::Array(values)) => {
                values.is_empty() && objects.is_empty()
            }
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::ByteString(value.into())
    }
}

impl From<Representation> for Value {
    fn from(value: Representation) -> Self {
        Self::Object(value)
    }
}

impl From<Vec<Representation>> for Value {
    fn from(value: Vec<Representation>) -> Self {
        Self::ObjectArray(value)
    }
}

/// An ordered sequence of named and typed properties.
///
/// Properties keep their insertion order. Duplicate names are allowed:
/// lookups return the first property with the requested name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct Representation(Vec<(String, Value)>);

impl Representation {
    /// Creates an empty [`Representation`].
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a property.
    ///
    /// # Errors
    ///
    /// An [`EncodingError::EmptyName`] is returned when the name is empty.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), EncodingError> {
        let name = name.into();
        if name.is_empty() {
            return Err(EncodingError::EmptyName);
        }
        self.push(name, value.into());
        Ok(())
    }

    pub(crate) fn push(&mut self, name: String, value: Value) {
        self.0.push((name, value));
    }

    /// Returns the value of the first property with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(property, _)| property == name)
            .map(|(_, value)| value)
    }

    /// Returns the integer property with the given name.
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the boolean property with the given name.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the double property with the given name.
    #[must_use]
    pub fn get_double(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Value::Double(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text string property with the given name.
    #[must_use]
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            Value::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the byte string property with the given name.
    #[must_use]
    pub fn get_byte_string(&self, name: &str) -> Option<&[u8]> {
        match self.get(name)? {
            Value::ByteString(value) => Some(value.as_slice()),
            _ => None,
        }
    }

    /// Returns the array property with the given name.
    #[must_use]
    pub fn get_array(&self, name: &str) -> Option<&[Value]> {
        match self.get(name)? {
            Value::Array(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Returns the text strings of the array property with the given name.
    ///
    /// Elements which are not text strings are skipped.
    #[must_use]
    pub fn get_string_array(&self, name: &str) -> Option<Vec<&str>> {
        self.get_array(name).map(|values| {
            values
                .iter()
                .filter_map(|value| match value {
                    Value::String(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        })
    }

    /// Returns the nested object with the given name.
    #[must_use]
    pub fn get_object(&self, name: &str) -> Option<&Self> {
        match self.get(name)? {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the array of nested objects with the given name.
    ///
    /// An empty array is returned as an empty slice.
    #[must_use]
    pub fn get_object_array(&self, name: &str) -> Option<&[Self]> {
        match self.get(name)? {
            Value::ObjectArray(objects) => Some(objects.as_slice()),
            Value::Array(values) if values.is_empty() => Some(&[][..]),
            _ => None,
        }
    }

    /// Returns an iterator over the properties, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of properties.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether there are no properties.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The root of a decoded payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub enum Payload {
    /// A single object.
    Object(Representation),
    /// An array of objects.
    Objects(Vec<Representation>),
}

impl Payload {
    /// Returns the root objects.
    #[must_use]
    pub fn objects(&self) -> &[Representation] {
        match self {
            Self::Object(object) => core::slice::from_ref(object),
            Self::Objects(objects) => objects.as_slice(),
        }
    }

    /// Returns the single root object, if the root is an object.
    #[must_use]
    pub const fn as_object(&self) -> Option<&Representation> {
        match self {
            Self::Object(object) => Some(object),
            Self::Objects(_) => None,
        }
    }
}
