use alloc::string::{String, ToString};
use alloc::vec::Vec;

use minicbor::data::Type;
use minicbor::encode::{self, Write};
use minicbor::{Decoder, Encoder};

use crate::error::{DecodeError, EncodingError};
use crate::representation::{Payload, Representation, Value};

/// Maximum nesting depth of objects and arrays accepted by [`decode`].
pub const MAX_DEPTH: usize = 16;

/// Default capacity of a [`RepBuffer`], in bytes.
pub const DEFAULT_CAPACITY: usize = 1024;

// Raised by the bounded writer when a write would exceed the capacity.
#[derive(Debug)]
struct Overflow;

// A writer appending into a vector which never grows past a fixed capacity.
struct BoundedWriter<'a> {
    data: &'a mut Vec<u8>,
    capacity: usize,
    required: usize,
}

impl Write for BoundedWriter<'_> {
    type Error = Overflow;

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        let required = self.data.len() + buf.len();
        if required > self.capacity {
            self.required = required;
            return Err(Overflow);
        }
        self.data.extend_from_slice(buf);
        Ok(())
    }
}

type EncodeResult = Result<(), encode::Error<Overflow>>;

// Drops the encoder handed back by every `minicbor` call.
fn step<W: Write>(
    result: Result<&mut Encoder<W>, encode::Error<W::Error>>,
) -> Result<(), encode::Error<W::Error>> {
    result.map(|_| ())
}

fn encode_value<W: Write>(
    e: &mut Encoder<W>,
    value: &Value,
) -> Result<(), encode::Error<W::Error>> {
    match value {
        Value::Int(value) => step(e.i64(*value)),
        Value::Bool(value) => step(e.bool(*value)),
        Value::Double(value) => step(e.f64(*value)),
        Value::String(value) => step(e.str(value)),
        Value::ByteString(value) => step(e.bytes(value)),
        Value::Array(values) => {
            step(e.begin_array())?;
            for value in values {
                encode_value(e, value)?;
            }
            step(e.end())
        }
        Value::Object(object) => encode_object(e, object),
        Value::ObjectArray(objects) => {
            step(e.begin_array())?;
            for object in objects {
                encode_object(e, object)?;
            }
            step(e.end())
        }
    }
}

fn encode_object<W: Write>(
    e: &mut Encoder<W>,
    object: &Representation,
) -> Result<(), encode::Error<W::Error>> {
    step(e.begin_map())?;
    for (name, value) in object.iter() {
        step(e.str(name))?;
        encode_value(e, value)?;
    }
    step(e.end())
}

fn encode_objects<W: Write>(
    e: &mut Encoder<W>,
    objects: &[Representation],
) -> Result<(), encode::Error<W::Error>> {
    step(e.begin_array())?;
    for object in objects {
        encode_object(e, object)?;
    }
    step(e.end())
}

// Rejects what cannot be decoded back: empty names and objects inside an
// array of values.
fn check_object(object: &Representation) -> Result<(), EncodingError> {
    for (name, value) in object.iter() {
        if name.is_empty() {
            return Err(EncodingError::EmptyName);
        }
        check_value(value)?;
    }
    Ok(())
}

fn check_value(value: &Value) -> Result<(), EncodingError> {
    match value {
        Value::Array(values) => values.iter().try_for_each(|value| match value {
            Value::Object(_) => Err(EncodingError::ObjectInArray),
            value => check_value(value),
        }),
        Value::Object(object) => check_object(object),
        Value::ObjectArray(objects) => objects.iter().try_for_each(check_object),
        _ => Ok(()),
    }
}

/// A fixed-capacity buffer holding an encoded payload.
///
/// The buffer is reused across requests: every encoding starts from an empty
/// buffer, so nothing written by a previous encoding leaks into the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl Default for RepBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RepBuffer {
    /// Creates a [`RepBuffer`] with the given capacity, in bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the buffer capacity, in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discards the buffer content, keeping its memory.
    #[inline]
    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Returns the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the number of encoded bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Checks whether the buffer is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resets the buffer and starts encoding a root object.
    pub fn begin_root_object(&mut self) -> ObjectEncoder<'_> {
        self.reset();
        let mut encoder = ObjectEncoder {
            encoder: Encoder::new(BoundedWriter {
                capacity: self.capacity,
                data: &mut self.data,
                required: 0,
            }),
            error: None,
        };
        encoder.emit(|e| step(e.begin_map()));
        encoder
    }

    /// Encodes a whole [`Representation`] as the root object.
    ///
    /// # Errors
    ///
    /// An [`EncodingError`] is returned when the payload does not fit into the
    /// buffer, a property has an empty name or an array of values holds an
    /// object. The buffer is left empty.
    pub fn encode(&mut self, object: &Representation) -> Result<usize, EncodingError> {
        let mut encoder = self.begin_root_object();
        for (name, value) in object.iter() {
            encoder.set(name, value)?;
        }
        encoder.end_root_object()
    }

    /// Encodes a [`Payload`], whose root is either an object or an array of
    /// objects.
    ///
    /// # Errors
    ///
    /// An [`EncodingError`] is returned when the payload does not fit into the
    /// buffer, a property has an empty name or an array of values holds an
    /// object. The buffer is left empty.
    pub fn encode_payload(&mut self, payload: &Payload) -> Result<usize, EncodingError> {
        let objects = match payload {
            Payload::Object(object) => return self.encode(object),
            Payload::Objects(objects) => objects,
        };
        objects.iter().try_for_each(check_object)?;

        self.reset();
        let mut e = Encoder::new(BoundedWriter {
            capacity: self.capacity,
            data: &mut self.data,
            required: 0,
        });
        if encode_objects(&mut e, objects).is_err() {
            let writer = e.writer_mut();
            let required = writer.required;
            writer.data.clear();
            return Err(EncodingError::BufferOverflow {
                capacity: self.capacity,
                required,
            });
        }
        Ok(self.data.len())
    }
}

/// An encoder writing the properties of a root object into a [`RepBuffer`].
///
/// The first failure is kept: every later call reports it again and
/// [`ObjectEncoder::end_root_object`] returns it, leaving the buffer empty.
pub struct ObjectEncoder<'a> {
    encoder: Encoder<BoundedWriter<'a>>,
    error: Option<EncodingError>,
}

impl<'a> ObjectEncoder<'a> {
    fn emit(&mut self, op: impl FnOnce(&mut Encoder<BoundedWriter<'a>>) -> EncodeResult) {
        if self.error.is_some() {
            return;
        }
        if op(&mut self.encoder).is_err() {
            let writer = self.encoder.writer();
            self.fail(EncodingError::BufferOverflow {
                capacity: writer.capacity,
                required: writer.required,
            });
        }
    }

    fn fail(&mut self, error: EncodingError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.encoder.writer_mut().data.clear();
    }

    fn property(
        &mut self,
        name: &str,
        op: impl FnOnce(&mut Encoder<BoundedWriter<'a>>) -> EncodeResult,
    ) -> Result<(), EncodingError> {
        if name.is_empty() {
            self.fail(EncodingError::EmptyName);
        }
        self.emit(|e| {
            step(e.str(name))?;
            op(e)
        });
        self.error.map_or(Ok(()), Err)
    }

    /// Writes an integer property.
    ///
    /// # Errors
    ///
    /// An [`EncodingError`] is returned when the buffer is full or the name
    /// is empty.
    pub fn set_int(&mut self, name: &str, value: i64) -> Result<(), EncodingError> {
        self.property(name, |e| step(e.i64(value)))
    }

    /// Writes a boolean property.
    ///
    /// # Errors
    ///
    /// An [`EncodingError`] is returned when the buffer is full or the name
    /// is empty.
    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<(), EncodingError> {
        self.property(name, |e| step(e.bool(value)))
    }

    /// Writes a double property.
    ///
    /// # Errors
    ///
    /// An [`EncodingError`] is returned when the buffer is full or the name
    /// is empty.
    pub fn set_double(&mut self, name: &str, value: f64) -> Result<(), EncodingError> {
        self.property(name, |e| step(e.f64(value)))
    }

    /// Writes a text string property.
    ///
    /// # Errors
    ///
    /// An [`EncodingError`] is returned when the buffer is full or the name
    /// is empty.
    pub fn set_text_string(&mut self, name: &str, value: &str) -> Result<(), EncodingError> {
        self.property(name, |e| step(e.str(value)))
    }

    /// Writes a byte string property.
    ///
    /// # Errors
    ///
    /// An [`EncodingError`] is returned when the buffer is full or the name
    /// is empty.
    pub fn set_byte_string(&mut self, name: &str, value: &[u8]) -> Result<(), EncodingError> {
        self.property(name, |e| step(e.bytes(value)))
    }

    /// Writes a property of any type, nested objects and arrays included.
    ///
    /// # Errors
    ///
    /// An [`EncodingError`] is returned when the buffer is full, a name,
    /// nested ones included, is empty or an array of values holds an object.
    pub fn set(&mut self, name: &str, value: &Value) -> Result<(), EncodingError> {
        if let Err(e) = check_value(value) {
            self.fail(e);
        }
        self.property(name, |e| encode_value(e, value))
    }

    /// Closes the root object and returns the size of the payload.
    ///
    /// # Errors
    ///
    /// The first error raised while encoding is returned.
    pub fn end_root_object(mut self) -> Result<usize, EncodingError> {
        self.emit(|e| step(e.end()));
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.encoder.writer().data.len()),
        }
    }
}

/// Decodes a payload.
///
/// An empty payload decodes to an empty object. Null, undefined, tagged and
/// simple items are skipped.
///
/// # Errors
///
/// A [`DecodeError`] is returned when the payload is not well-formed, its
/// root is neither an object nor an array of objects, a key is not a
/// non-empty text string, the nesting is deeper than [`MAX_DEPTH`] or an
/// integer does not fit into 64 signed bits.
pub fn decode(bytes: &[u8]) -> Result<Payload, DecodeError> {
    if bytes.is_empty() {
        return Ok(Payload::Object(Representation::new()));
    }

    let mut d = Decoder::new(bytes);
    let payload = match d.datatype()? {
        Type::Map | Type::MapIndef => Payload::Object(read_object(&mut d, 0)?),
        Type::Array | Type::ArrayIndef => {
            let len = d.array()?;
            let mut objects = Vec::new();
            for_each_entry(&mut d, len, |d| {
                if !matches!(d.datatype()?, Type::Map | Type::MapIndef) {
                    return Err(DecodeError::UnexpectedRoot);
                }
                objects.push(read_object(d, 1)?);
                Ok(())
            })?;
            Payload::Objects(objects)
        }
        _ => return Err(DecodeError::UnexpectedRoot),
    };

    if d.position() != bytes.len() {
        return Err(DecodeError::Malformed);
    }
    Ok(payload)
}

/// Decodes a payload whose root must be an object.
///
/// # Errors
///
/// Same as [`decode`], plus [`DecodeError::UnexpectedRoot`] when the root is
/// an array.
pub fn decode_object(bytes: &[u8]) -> Result<Representation, DecodeError> {
    match decode(bytes)? {
        Payload::Object(object) => Ok(object),
        Payload::Objects(_) => Err(DecodeError::UnexpectedRoot),
    }
}

// Visits the entries of a definite or indefinite container.
fn for_each_entry<'b>(
    d: &mut Decoder<'b>,
    len: Option<u64>,
    mut entry: impl FnMut(&mut Decoder<'b>) -> Result<(), DecodeError>,
) -> Result<(), DecodeError> {
    match len {
        Some(len) => {
            for _ in 0..len {
                entry(d)?;
            }
        }
        None => loop {
            if d.datatype()? == Type::Break {
                d.set_position(d.position() + 1);
                break;
            }
            entry(d)?;
        },
    }
    Ok(())
}

fn read_object(d: &mut Decoder<'_>, depth: usize) -> Result<Representation, DecodeError> {
    if depth >= MAX_DEPTH {
        return Err(DecodeError::TooDeep);
    }

    let len = d.map()?;
    let mut object = Representation::new();
    for_each_entry(d, len, |d| {
        if !matches!(d.datatype()?, Type::String | Type::StringIndef) {
            return Err(DecodeError::NonTextKey);
        }
        let name = read_text(d)?;
        if name.is_empty() {
            return Err(DecodeError::EmptyName);
        }
        if let Some(value) = read_value(d, depth + 1)? {
            object.push(name, value);
        }
        Ok(())
    })?;
    Ok(object)
}

fn read_array(d: &mut Decoder<'_>, depth: usize) -> Result<Value, DecodeError> {
    if depth >= MAX_DEPTH {
        return Err(DecodeError::TooDeep);
    }

    let len = d.array()?;
    let mut values = Vec::new();
    let mut objects = Vec::new();
    for_each_entry(d, len, |d| {
        if matches!(d.datatype()?, Type::Map | Type::MapIndef) {
            objects.push(read_object(d, depth + 1)?);
        } else if let Some(value) = read_value(d, depth + 1)? {
            values.push(value);
        }
        Ok(())
    })?;

    match (values.is_empty(), objects.is_empty()) {
        (_, true) => Ok(Value::Array(values)),
        (true, false) => Ok(Value::ObjectArray(objects)),
        (false, false) => Err(DecodeError::Malformed),
    }
}

fn read_value(d: &mut Decoder<'_>, depth: usize) -> Result<Option<Value>, DecodeError> {
    let value = match d.datatype()? {
        Type::Bool => Value::Bool(d.bool()?),
        Type::U8
        | Type::U16
        | Type::U32
        | Type::U64
        | Type::I8
        | Type::I16
        | Type::I32
        | Type::I64
        | Type::Int => {
            let int = d.int()?;
            Value::Int(i64::try_from(int).map_err(|_| DecodeError::ValueOutOfRange)?)
        }
        Type::F16 | Type::F32 | Type::F64 => Value::Double(d.f64()?),
        Type::String | Type::StringIndef => Value::String(read_text(d)?),
        Type::Bytes | Type::BytesIndef => Value::ByteString(read_bytes(d)?),
        Type::Map | Type::MapIndef => Value::Object(read_object(d, depth)?),
        Type::Array | Type::ArrayIndef => read_array(d, depth)?,
        ty @ (Type::Null | Type::Undefined | Type::Tag | Type::Simple) => {
            log::warn!("Skipping unsupported item of type {ty:?}");
            d.skip()?;
            return Ok(None);
        }
        _ => return Err(DecodeError::Malformed),
    };
    Ok(Some(value))
}

fn read_text(d: &mut Decoder<'_>) -> Result<String, DecodeError> {
    if d.datatype()? == Type::StringIndef {
        let mut text = String::new();
        for chunk in d.str_iter()? {
            text.push_str(chunk?);
        }
        Ok(text)
    } else {
        Ok(d.str()?.to_string())
    }
}

fn read_bytes(d: &mut Decoder<'_>) -> Result<Vec<u8>, DecodeError> {
    if d.datatype()? == Type::BytesIndef {
        let mut bytes = Vec::new();
        for chunk in d.bytes_iter()? {
            bytes.extend_from_slice(chunk?);
        }
        Ok(bytes)
    } else {
        Ok(d.bytes()?.to_vec())
    }
}
