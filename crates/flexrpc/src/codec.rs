//! # Codec
//!
//! The translation layer between `Value` and the `flexpack` wire format.
//!
//! ## Invariants
//! - **Total decode**: decoding never fails. Null, unknown, or malformed content
//!   becomes `Value::Nil`; a malformed element ends its enclosing list or map.
//! - **Width erasure**: integers widen to 64 bits and floats to `f64` on decode.
//! - **Tuple recovery**: a typed vector of 3 or 4 floats decodes as `Vec3` / `Quat`.
//!   Every other typed vector, including 2 floats, decodes as a plain `List`.
//!   A plain list of 3 or 4 floats is packed into a typed vector on encode, so
//!   it comes back as `Vec3` / `Quat` as well.

use std::collections::HashSet;

use flexpack::Decoder;
use flexpack::Encoder;
use flexpack::Scalar;
use flexpack::Tag;
use flexpack::TypedVector;

use crate::error::Error;
use crate::error::Result;
use crate::value::EncodedBuffer;
use crate::value::Value;

/// Default nesting limit for decoding untrusted buffers.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Encodes a value into a fresh buffer.
///
/// # Errors
/// - `Error::DuplicateKey` if a map holds the same key twice.
/// - `Error::Serialization(BlobTooLarge)` if a string or container exceeds `u32::MAX` bytes.
///
/// Nesting depth is not limited here, but `decode` turns containers nested
/// deeper than `DEFAULT_MAX_DEPTH` into `Value::Nil`. Use
/// `Decoding::with_max_depth` to read such values back intact.
pub fn encode(value: &Value) -> Result<EncodedBuffer> {
    let mut enc = Encoder::new();
    write_value(&mut enc, value)?;
    Ok(EncodedBuffer::from(enc.into_bytes()?))
}

fn write_value(enc: &mut Encoder, value: &Value) -> Result<()> {
    match value {
        Value::Nil => enc.null()?,
        Value::Bool(b) => enc.bool(*b)?,
        Value::Int(v) => enc.s64(*v)?,
        Value::UInt(v) => enc.u64(*v)?,
        Value::Float(v) => enc.f64(*v)?,
        Value::Text(s) => enc.str(s)?,
        Value::Vec2(x, y) => enc.typed_f64(&[*x, *y])?,
        Value::Vec3(x, y, z) => enc.typed_f64(&[*x, *y, *z])?,
        Value::Quat(x, y, z, w) => enc.typed_f64(&[*x, *y, *z, *w])?,
        Value::List(items) => {
            enc.list_begin()?;
            for item in items {
                write_value(enc, item)?;
            }
            enc.list_end()?;
        }
        Value::Map(pairs) => {
            let mut seen = HashSet::with_capacity(pairs.len());
            enc.map_begin()?;
            for (key, item) in pairs {
                if !seen.insert(key.as_str()) {
                    return Err(Error::DuplicateKey(key.clone()));
                }
                enc.key(key)?;
                write_value(enc, item)?;
            }
            enc.map_end()?;
        }
    }
    Ok(())
}

/// Decodes a buffer with the default depth limit.
pub fn decode(bytes: &[u8]) -> Value {
    Decoding::default().decode(bytes)
}

/// Decoding options.
#[derive(Debug, Clone, Copy)]
pub struct Decoding {
    max_depth: usize,
}

impl Default for Decoding {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl Decoding {
    /// Containers nested deeper than `max_depth` decode as `Value::Nil`.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Decodes the root item of `bytes`. Trailing bytes are ignored.
    pub fn decode(&self, bytes: &[u8]) -> Value {
        let mut dec = Decoder::new(bytes);
        self.read_value(&mut dec, 0)
    }

    fn read_value(&self, dec: &mut Decoder, depth: usize) -> Value {
        match self.try_read(dec, depth) {
            Ok(value) => value,
            Err(e) => {
                tracing::trace!(error = %e, "undecodable content, substituting nil");
                Value::Nil
            }
        }
    }

    fn try_read(&self, dec: &mut Decoder, depth: usize) -> flexpack::Result<Value> {
        let tag = dec.peek_tag()?;
        let value = match tag {
            Tag::Null => {
                dec.null()?;
                Value::Nil
            }
            Tag::BoolTrue | Tag::BoolFalse => Value::Bool(dec.bool()?),
            Tag::S8 | Tag::S16 | Tag::S32 | Tag::S64 => Value::Int(dec.int()?),
            Tag::U8 | Tag::U16 | Tag::U32 | Tag::U64 => Value::UInt(dec.uint()?),
            Tag::F32 | Tag::F64 => Value::Float(dec.float()?),
            Tag::String => Value::Text(dec.str()?.to_string()),
            Tag::Typed => recover_tuple(&dec.typed()?),
            Tag::List | Tag::Map if depth >= self.max_depth => {
                tracing::warn!(depth, "value nested too deeply, substituting nil");
                dec.skip()?;
                Value::Nil
            }
            Tag::List => {
                let items = dec.list()?;
                Value::List(items.map(|mut item| self.read_value(&mut item, depth + 1)).collect())
            }
            Tag::Map => {
                let mut entries = dec.map()?;
                let mut pairs = Vec::new();
                loop {
                    match entries.next() {
                        Ok(Some((key, mut item))) => {
                            pairs.push((key.to_string(), self.read_value(&mut item, depth + 1)));
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::trace!(error = %e, "malformed map entry, truncating map");
                            break;
                        }
                    }
                }
                Value::Map(pairs)
            }
            Tag::Key | Tag::Bytes | Tag::Variant => {
                dec.skip()?;
                Value::Nil
            }
        };
        Ok(value)
    }
}

/// Turns a typed vector back into a value.
///
/// Only float vectors of length 3 and 4 are treated as spatial tuples. Integer
/// vectors of the same lengths stay lists.
fn recover_tuple(vec: &TypedVector) -> Value {
    if vec.is_float() {
        let xs: Vec<f64> = vec.iter().filter_map(|s| match s {
            Scalar::Float(f) => Some(f),
            _ => None,
        }).collect();

        match xs[..] {
            [x, y, z] => return Value::Vec3(x, y, z),
            [x, y, z, w] => return Value::Quat(x, y, z, w),
            _ => {}
        }
    }

    Value::List(vec.iter().map(scalar_value).collect())
}

fn scalar_value(s: Scalar) -> Value {
    match s {
        Scalar::Int(v) => Value::Int(v),
        Scalar::UInt(v) => Value::UInt(v),
        Scalar::Float(v) => Value::Float(v),
    }
}
