//! Encoding of persisted attribute values.
//!
//! The registry is assembled once at startup and then shared read-only
//! (`Arc<CodecRegistry>`) with the storage collaborator and every
//! transaction; nothing registers codecs after [`CodecRegistryBuilder::build`].

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{GraphError, Result};
use crate::query::{Value, ValueKind};

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_DATETIME: u8 = 0x06;

fn tag_of(kind: ValueKind) -> u8 {
    match kind {
        ValueKind::Null => TAG_NULL,
        ValueKind::Bool => TAG_BOOL,
        ValueKind::Int => TAG_INT,
        ValueKind::Float => TAG_FLOAT,
        ValueKind::String => TAG_STRING,
        ValueKind::Bytes => TAG_BYTES,
        ValueKind::DateTime => TAG_DATETIME,
    }
}

fn kind_of(tag: u8) -> Option<ValueKind> {
    match tag {
        TAG_NULL => Some(ValueKind::Null),
        TAG_BOOL => Some(ValueKind::Bool),
        TAG_INT => Some(ValueKind::Int),
        TAG_FLOAT => Some(ValueKind::Float),
        TAG_STRING => Some(ValueKind::String),
        TAG_BYTES => Some(ValueKind::Bytes),
        TAG_DATETIME => Some(ValueKind::DateTime),
        _ => None,
    }
}

/// Encodes and decodes the payload of one value kind (tag excluded).
pub trait ValueCodec: Send + Sync {
    /// Appends the payload of `value` to `out`.
    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()>;
    /// Decodes a payload produced by [`ValueCodec::encode`].
    fn decode(&self, payload: &[u8]) -> Result<Value>;
}

fn mismatch(expected: &'static str, value: &Value) -> GraphError {
    GraphError::Codec(format!("{expected} codec cannot encode {value}"))
}

fn fixed<const N: usize>(payload: &[u8], what: &'static str) -> Result<[u8; N]> {
    payload
        .try_into()
        .map_err(|_| {
            GraphError::Codec(format!(
                "{what} payload must be {} bytes, got {}",
                N,
                payload.len()
            ))
        })
}

struct NullCodec;

impl ValueCodec for NullCodec {
    fn encode(&self, value: &Value, _out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            other => Err(mismatch("null", other)),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Value> {
        fixed::<0>(payload, "null").map(|_| Value::Null)
    }
}

struct BoolCodec;

impl ValueCodec for BoolCodec {
    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::Bool(b) => {
                out.push(u8::from(*b));
                Ok(())
            }
            other => Err(mismatch("bool", other)),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Value> {
        match fixed::<1>(payload, "bool")? {
            [0] => Ok(Value::Bool(false)),
            [1] => Ok(Value::Bool(true)),
            [b] => Err(GraphError::Codec(format!("invalid bool byte {b:#04x}"))),
        }
    }
}

struct IntCodec;

impl ValueCodec for IntCodec {
    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::Int(v) => {
                out.extend_from_slice(&v.to_be_bytes());
                Ok(())
            }
            other => Err(mismatch("int", other)),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Value> {
        Ok(Value::Int(i64::from_be_bytes(fixed(payload, "int")?)))
    }
}

struct FloatCodec;

impl ValueCodec for FloatCodec {
    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::Float(v) => {
                out.extend_from_slice(&v.to_bits().to_be_bytes());
                Ok(())
            }
            other => Err(mismatch("float", other)),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Value> {
        let bits = u64::from_be_bytes(fixed(payload, "float")?);
        Ok(Value::Float(f64::from_bits(bits)))
    }
}

struct StringCodec;

impl ValueCodec for StringCodec {
    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::String(s) => {
                out.extend_from_slice(s.as_bytes());
                Ok(())
            }
            other => Err(mismatch("string", other)),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Value> {
        std::str::from_utf8(payload)
            .map(|s| Value::String(s.to_owned()))
            .map_err(|e| GraphError::Codec(format!("invalid utf-8 string payload: {e}")))
    }
}

struct BytesCodec;

impl ValueCodec for BytesCodec {
    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::Bytes(b) => {
                out.extend_from_slice(b);
                Ok(())
            }
            other => Err(mismatch("bytes", other)),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(payload.to_vec()))
    }
}

struct DateTimeCodec;

impl ValueCodec for DateTimeCodec {
    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::DateTime(ms) => {
                out.extend_from_slice(&ms.to_be_bytes());
                Ok(())
            }
            other => Err(mismatch("datetime", other)),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Value> {
        Ok(Value::DateTime(i64::from_be_bytes(fixed(payload, "datetime")?)))
    }
}

/// Immutable table from value kind to codec.
pub struct CodecRegistry {
    codecs: FxHashMap<ValueKind, Arc<dyn ValueCodec>>,
}

impl CodecRegistry {
    /// Registry holding the built-in codec for every [`ValueKind`].
    pub fn builtin() -> Self {
        Self::builder().with_builtins().build()
    }

    /// Starts an empty builder.
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder {
            codecs: FxHashMap::default(),
        }
    }

    /// True when `kind` has a codec.
    pub fn supports(&self, kind: ValueKind) -> bool {
        self.codecs.contains_key(&kind)
    }

    /// Encodes `value` as a kind tag followed by its payload.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let kind = value.kind();
        let codec = self
            .codecs
            .get(&kind)
            .ok_or_else(|| GraphError::Codec(format!("no codec registered for {kind:?}")))?;
        let mut buf = vec![tag_of(kind)];
        codec.encode(value, &mut buf)?;
        Ok(buf)
    }

    /// Decodes bytes produced by [`CodecRegistry::encode`].
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let (&tag, payload) = bytes
            .split_first()
            .ok_or_else(|| GraphError::Codec("empty value encoding".into()))?;
        let kind =
            kind_of(tag).ok_or_else(|| GraphError::Codec(format!("unknown value tag {tag:#04x}")))?;
        let codec = self
            .codecs
            .get(&kind)
            .ok_or_else(|| GraphError::Codec(format!("no codec registered for {kind:?}")))?;
        codec.decode(payload)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Assembles a [`CodecRegistry`].
pub struct CodecRegistryBuilder {
    codecs: FxHashMap<ValueKind, Arc<dyn ValueCodec>>,
}

impl CodecRegistryBuilder {
    /// Registers the built-in codec for every kind not registered yet.
    pub fn with_builtins(mut self) -> Self {
        for kind in ValueKind::ALL {
            self.codecs
                .entry(kind)
                .or_insert_with(|| builtin_codec(kind));
        }
        self
    }

    /// Registers `codec` for `kind`, replacing any earlier registration.
    pub fn register(mut self, kind: ValueKind, codec: Arc<dyn ValueCodec>) -> Self {
        self.codecs.insert(kind, codec);
        self
    }

    /// Freezes the registry.
    pub fn build(self) -> CodecRegistry {
        CodecRegistry {
            codecs: self.codecs,
        }
    }
}

fn builtin_codec(kind: ValueKind) -> Arc<dyn ValueCodec> {
    match kind {
        ValueKind::Null => Arc::new(NullCodec),
        ValueKind::Bool => Arc::new(BoolCodec),
        ValueKind::Int => Arc::new(IntCodec),
        ValueKind::Float => Arc::new(FloatCodec),
        ValueKind::String => Arc::new(StringCodec),
        ValueKind::Bytes => Arc::new(BytesCodec),
        ValueKind::DateTime => Arc::new(DateTimeCodec),
    }
}
