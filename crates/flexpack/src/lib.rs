//! # Flexpack
//!
//! A small, self-describing, schema-less binary format.
//!
//! ## Philosophy
//!
//! - **Self-describing**: every item carries its own tag, so a reader needs no schema.
//! - **TLV Architecture**: `[Tag][Length?][Value]` lets a reader skip anything it does not understand.
//! - **Typed vectors**: short homogeneous numeric tuples (2D/3D vectors, quaternions)
//!   are packed without per-element tags.
//! - **Bounded**: encoders track open scopes explicitly; decoders are zero-copy, bounds-checked views.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs**: `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Len: 4b][Body: Len]`
//! - **Typed vectors**: `[Tag: 1b][Len: 4b][ElemTag: 1b][Elements: Len - 1]`
//!
//! All integers are Little-Endian.

use std::ops::RangeInclusive;


/// Flexpack serialization and deserialization errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Byte does not correspond to a valid Flexpack `Tag`.
    InvalidTag(u8),
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// Closing a scope that does not match the active scope stack.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// Attempted to close a scope when only the Root remains.
    ScopeUnderflow,
    /// Attempted to finalize the buffer with open scopes.
    ScopeStillOpen,
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Blob or container length exceeds `u32::MAX`.
    BlobTooLarge(usize),
    /// Attempted to write more than one payload into a Variant.
    TooManyItems(Scope),
    /// Attempted to close a Variant without a payload.
    EmptyVariant,
    /// A Map expected a Key where a value was written, or a value where a Key was written.
    InvalidMapEntry,
    /// A Key was written outside of a Map.
    StrayKey,
    /// A Map was closed after a Key without its value.
    DanglingKey,
    /// A typed vector header or body is inconsistent with its element tag.
    MalformedTyped,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTag(b) => write!(f, "Invalid Tag byte: {:#04x}", b),
            Error::ScopeMismatch { expected, actual } => {
                write!(f, "Scope Mismatch: expected {:?}, found {:?}", expected, actual)
            }
            Error::TooManyItems(s) => write!(f, "Too many items in scope {:?}; expected exactly 1", s),
            Error::BlobTooLarge(n) => write!(f, "Blob of {} bytes exceeds the u32 length limit", n),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for Flexpack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Lists with this many uniform numeric scalars are packed into a typed vector on close.
pub const TYPED_PACK_LENGTHS: RangeInclusive<usize> = 2..=4;

/// Identifies the type of the encoded value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Null = 0x00,
    BoolTrue = 0x01,
    BoolFalse = 0x02,

    // Fixed-width scalars
    U8 = 0x03,
    U16 = 0x04,
    U32 = 0x05,
    U64 = 0x06,
    S8 = 0x07,
    S16 = 0x08,
    S32 = 0x09,
    S64 = 0x0A,
    F32 = 0x0B,
    F64 = 0x0C,

    // Blobs (Tag + u32 Len + Bytes)
    String = 0x10,
    Key = 0x11,
    Bytes = 0x12,

    // Containers (Tag + u32 Len + Body)
    List = 0x20,
    Map = 0x21,
    Typed = 0x22,
    Variant = 0x30,
}

impl Tag {
    /// Returns the Tag variant for a given byte, or `None` if invalid.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Tag::Null),
            0x01 => Some(Tag::BoolTrue),
            0x02 => Some(Tag::BoolFalse),
            0x03 => Some(Tag::U8),
            0x04 => Some(Tag::U16),
            0x05 => Some(Tag::U32),
            0x06 => Some(Tag::U64),
            0x07 => Some(Tag::S8),
            0x08 => Some(Tag::S16),
            0x09 => Some(Tag::S32),
            0x0A => Some(Tag::S64),
            0x0B => Some(Tag::F32),
            0x0C => Some(Tag::F64),
            0x10 => Some(Tag::String),
            0x11 => Some(Tag::Key),
            0x12 => Some(Tag::Bytes),
            0x20 => Some(Tag::List),
            0x21 => Some(Tag::Map),
            0x22 => Some(Tag::Typed),
            0x30 => Some(Tag::Variant),
            _ => None,
        }
    }

    /// Byte width of a fixed-width numeric scalar, `None` for everything else.
    pub fn scalar_width(self) -> Option<usize> {
        match self {
            Tag::U8 | Tag::S8 => Some(1),
            Tag::U16 | Tag::S16 => Some(2),
            Tag::U32 | Tag::S32 | Tag::F32 => Some(4),
            Tag::U64 | Tag::S64 | Tag::F64 => Some(8),
            _ => None,
        }
    }

    /// True for `F32` and `F64`.
    pub fn is_float(self) -> bool {
        matches!(self, Tag::F32 | Tag::F64)
    }
}

/// Internal state tracking for the `Encoder` stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The virtual root; allows any item.
    Root,
    /// Ordered sequence; allows any number of items.
    List,
    /// Alternating `Key` / value pairs.
    Map,
    /// Strict container; allows exactly one item (the payload) after the name.
    Variant,
}

/// An active container scope on the `Encoder` stack.
struct Frame {
    start: usize,
    scope: Scope,
    count: usize,
    /// Tag shared by every direct child so far, if they are all the same numeric scalar.
    uniform: Option<Tag>,
    mixed: bool,
}

impl Frame {
    fn new(start: usize, scope: Scope) -> Self {
        Self { start, scope, count: 0, uniform: None, mixed: false }
    }

    fn record(&mut self, tag: Tag) {
        self.count += 1;
        if self.mixed {
            return;
        }
        match (self.uniform, tag.scalar_width()) {
            (None, Some(_)) if self.count == 1 => self.uniform = Some(tag),
            (Some(prev), Some(_)) if prev == tag => {}
            _ => self.mixed = true,
        }
    }

    /// The element tag to pack this list with, if it qualifies for a typed vector.
    fn packable(&self) -> Option<Tag> {
        if self.scope != Scope::List || self.mixed || !TYPED_PACK_LENGTHS.contains(&self.count) {
            return None;
        }
        self.uniform
    }
}

/// A bounded, state-machine driven encoder.
///
/// The Encoder maintains a stack of open scopes to enforce structural strictness
/// and automatically back-patch length headers.
///
/// # Structural Invariants
///
/// 1.  **Map Scopes**: items alternate `key()` then exactly one value.
/// 2.  **Variant Scopes**: exactly one payload item must be written.
/// 3.  **Root Scope**: the encoder must end in the Root scope to finalize bytes.
///
/// # Typed-vector optimization
///
/// Closing a list whose direct children are 2 to 4 scalars of one numeric tag
/// rewrites it in place as a `Tag::Typed` vector of that element tag.
pub struct Encoder {
    buf: Vec<u8>,
    /// Bottom is always `Scope::Root`.
    stack: Vec<Frame>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Creates a new encoder with default capacity.
    pub fn new() -> Self {
        let mut stack = Vec::with_capacity(8);
        stack.push(Frame::new(0, Scope::Root));
        Self { buf: Vec::with_capacity(256), stack }
    }

    /// Consumes the encoder and returns the final byte vector.
    ///
    /// # Errors
    /// Returns `Error::ScopeStillOpen` if the stack depth > 1.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    fn current_frame(&mut self) -> &mut Frame {
        // The root frame is never popped.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn check_write(&mut self, tag: Tag) -> Result<()> {
        let frame = self.current_frame();
        match frame.scope {
            Scope::Root | Scope::List => {
                if tag == Tag::Key { Err(Error::StrayKey) } else { Ok(()) }
            }
            Scope::Map => {
                let wants_key = frame.count % 2 == 0;
                if wants_key == (tag == Tag::Key) { Ok(()) } else { Err(Error::InvalidMapEntry) }
            }
            Scope::Variant => {
                if tag == Tag::Key {
                    Err(Error::StrayKey)
                } else if frame.count >= 1 {
                    Err(Error::TooManyItems(frame.scope))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn on_item_written(&mut self, tag: Tag) {
        self.current_frame().record(tag);
    }

    fn scalar(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(data);
        self.on_item_written(tag);
        Ok(())
    }

    fn blob(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        let len = data.len();
        if len > u32::MAX as usize { return Err(Error::BlobTooLarge(len)); }
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&(len as u32).to_le_bytes());
        self.buf.extend_from_slice(data);
        self.on_item_written(tag);
        Ok(())
    }

    fn begin_scope(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.check_write(tag)?;

        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&[0, 0, 0, 0]); // Length placeholder

        self.stack.push(Frame::new(self.buf.len(), scope));
        Ok(())
    }

    fn end_scope(&mut self, expected: Scope) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::ScopeUnderflow);
        }

        { // Validate Scope State
            let frame = self.current_frame();
            if frame.scope != expected {
                return Err(Error::ScopeMismatch { expected, actual: frame.scope });
            }
            match frame.scope {
                Scope::Variant if frame.count == 0 => return Err(Error::EmptyVariant),
                Scope::Map if frame.count % 2 == 1 => return Err(Error::DanglingKey),
                _ => {}
            }
        }

        let Some(frame) = self.stack.pop() else {
            return Err(Error::ScopeUnderflow);
        };

        if let Some(elem) = frame.packable() {
            self.pack_typed(&frame, elem)?;
            self.on_item_written(Tag::Typed);
            return Ok(());
        }

        let body_len = self.buf.len() - frame.start;
        if body_len > u32::MAX as usize {
            return Err(Error::BlobTooLarge(body_len));
        }
        let len_pos = frame.start - 4;
        self.buf[len_pos..frame.start].copy_from_slice(&(body_len as u32).to_le_bytes());

        let tag = match frame.scope {
            Scope::Map => Tag::Map,
            Scope::Variant => Tag::Variant,
            _ => Tag::List,
        };
        self.on_item_written(tag);
        Ok(())
    }

    /// Rewrites a closed list body of tagged scalars as a typed vector.
    fn pack_typed(&mut self, frame: &Frame, elem: Tag) -> Result<()> {
        let width = elem.scalar_width().ok_or(Error::MalformedTyped)?;
        let stride = width + 1;
        let body = self.buf.split_off(frame.start);
        let mut packed = Vec::with_capacity(frame.count * width);
        for item in body.chunks_exact(stride) {
            packed.extend_from_slice(&item[1..]);
        }

        // Drop the List tag and its length placeholder.
        self.buf.truncate(frame.start - 5);
        self.write_typed(elem, &packed);
        Ok(())
    }

    fn write_typed(&mut self, elem: Tag, packed: &[u8]) {
        self.buf.push(Tag::Typed as u8);
        self.buf.extend_from_slice(&((packed.len() + 1) as u32).to_le_bytes());
        self.buf.push(elem as u8);
        self.buf.extend_from_slice(packed);
    }

    fn typed<const W: usize>(&mut self, elem: Tag, items: impl ExactSizeIterator<Item = [u8; W]>) -> Result<()> {
        let len = items.len() * W + 1;
        if len > u32::MAX as usize { return Err(Error::BlobTooLarge(len)); }
        self.check_write(Tag::Typed)?;
        let packed: Vec<u8> = items.flatten().collect();
        self.write_typed(elem, &packed);
        self.on_item_written(Tag::Typed);
        Ok(())
    }

    /// Encodes a null marker.
    pub fn null(&mut self) -> Result<()> { self.scalar(Tag::Null, &[]) }

    /// Encodes a boolean value.
    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.scalar(if v { Tag::BoolTrue } else { Tag::BoolFalse }, &[])
    }

    /// Encodes an unsigned 8-bit integer.
    pub fn u8(&mut self, v: u8) -> Result<()> { self.scalar(Tag::U8, &[v]) }
    /// Encodes a signed 8-bit integer.
    pub fn s8(&mut self, v: i8) -> Result<()> { self.scalar(Tag::S8, &v.to_le_bytes()) }
    /// Encodes an unsigned 16-bit integer (LE).
    pub fn u16(&mut self, v: u16) -> Result<()> { self.scalar(Tag::U16, &v.to_le_bytes()) }
    /// Encodes a signed 16-bit integer (LE).
    pub fn s16(&mut self, v: i16) -> Result<()> { self.scalar(Tag::S16, &v.to_le_bytes()) }
    /// Encodes an unsigned 32-bit integer (LE).
    pub fn u32(&mut self, v: u32) -> Result<()> { self.scalar(Tag::U32, &v.to_le_bytes()) }
    /// Encodes a signed 32-bit integer (LE).
    pub fn s32(&mut self, v: i32) -> Result<()> { self.scalar(Tag::S32, &v.to_le_bytes()) }
    /// Encodes an unsigned 64-bit integer (LE).
    pub fn u64(&mut self, v: u64) -> Result<()> { self.scalar(Tag::U64, &v.to_le_bytes()) }
    /// Encodes a signed 64-bit integer (LE).
    pub fn s64(&mut self, v: i64) -> Result<()> { self.scalar(Tag::S64, &v.to_le_bytes()) }
    /// Encodes a 32-bit float (LE).
    pub fn f32(&mut self, v: f32) -> Result<()> { self.scalar(Tag::F32, &v.to_le_bytes()) }
    /// Encodes a 64-bit float (LE).
    pub fn f64(&mut self, v: f64) -> Result<()> { self.scalar(Tag::F64, &v.to_le_bytes()) }

    /// Encodes a UTF-8 string blob.
    pub fn str(&mut self, v: &str) -> Result<()> { self.blob(Tag::String, v.as_bytes()) }

    /// Encodes a map key. Only valid directly inside a Map, before each value.
    pub fn key(&mut self, v: &str) -> Result<()> { self.blob(Tag::Key, v.as_bytes()) }

    /// Encodes a raw byte blob.
    pub fn bytes(&mut self, v: &[u8]) -> Result<()> { self.blob(Tag::Bytes, v) }

    /// Encodes a typed vector of 64-bit floats.
    pub fn typed_f64(&mut self, v: &[f64]) -> Result<()> {
        self.typed(Tag::F64, v.iter().map(|x| x.to_le_bytes()))
    }

    /// Encodes a typed vector of signed 64-bit integers.
    pub fn typed_s64(&mut self, v: &[i64]) -> Result<()> {
        self.typed(Tag::S64, v.iter().map(|x| x.to_le_bytes()))
    }

    /// Encodes a typed vector of unsigned 64-bit integers.
    pub fn typed_u64(&mut self, v: &[u64]) -> Result<()> {
        self.typed(Tag::U64, v.iter().map(|x| x.to_le_bytes()))
    }

    /// Begins a List container.
    ///
    /// # Invariants
    /// - Must be closed via `list_end()`.
    /// - Allows any number of items.
    pub fn list_begin(&mut self) -> Result<()> { self.begin_scope(Tag::List, Scope::List) }
    /// Ends a List container, packing it into a typed vector when it qualifies.
    pub fn list_end(&mut self) -> Result<()> { self.end_scope(Scope::List) }

    /// Begins a Map container.
    ///
    /// # Invariants
    /// - Must be closed via `map_end()`.
    /// - **Strict:** children alternate `key()` and one value.
    pub fn map_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Map, Scope::Map) }
    /// Ends a Map container.
    pub fn map_end(&mut self) -> Result<()> { self.end_scope(Scope::Map) }

    /// Begins a Variant (Named Payload).
    ///
    /// Encodes the name string immediately.
    ///
    /// # Invariants
    /// - Must be closed via `variant_end()`.
    /// - **Strict:** Requires exactly one item (the payload) to be written after this call.
    pub fn variant_begin(&mut self, name: &str) -> Result<()> {
        if name.len() > u32::MAX as usize { return Err(Error::BlobTooLarge(name.len())); }
        self.begin_scope(Tag::Variant, Scope::Variant)?;
        // The name is metadata, not payload; it bypasses the item count.
        self.buf.push(Tag::String as u8);
        self.buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(name.as_bytes());
        Ok(())
    }
    /// Ends a Variant.
    pub fn variant_end(&mut self) -> Result<()> { self.end_scope(Scope::Variant) }
}

/// A numeric element read out of a typed vector, widened to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
}

/// A zero-copy, bounds-checked cursor over a byte slice.
///
/// Decoders are immutable views. Reading advances the internal cursor.
/// Container reads return new `Decoder` instances restricted to the container's body.
///
/// # Errors
/// All read operations return `Error::UnexpectedEnd` if the buffer is exhausted.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Returns the remaining bytes in the view.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Peeks the next Tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        let b = *self.buf.first().ok_or(Error::UnexpectedEnd)?;
        Tag::from_u8(b).ok_or(Error::InvalidTag(b))
    }

    fn consume(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() { return Err(Error::UnexpectedEnd); }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array()?) as usize)
    }

    fn check_tag(&mut self, expected: Tag) -> Result<()> {
        let tag = self.peek_tag()?;
        if tag == expected {
            self.consume(1)
        } else {
            Err(Error::InvalidTag(tag as u8))
        }
    }

    /// Skips the next item and its nested children.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.consume(1)?;

        match tag {
            Tag::Null | Tag::BoolTrue | Tag::BoolFalse => Ok(()),
            Tag::U8 | Tag::S8 | Tag::U16 | Tag::S16 |
            Tag::U32 | Tag::S32 | Tag::F32 |
            Tag::U64 | Tag::S64 | Tag::F64 => {
                self.consume(tag.scalar_width().unwrap_or(0))
            }
            // Structure: [Length: u32] [Body: Length]
            Tag::String | Tag::Key | Tag::Bytes |
            Tag::List | Tag::Map | Tag::Typed | Tag::Variant => {
                let len = self.read_len()?;
                self.consume(len)
            }
        }
    }

    /// Splits the next whole item off into its own decoder.
    pub fn next_item(&mut self) -> Result<Decoder<'a>> {
        let mut probe = self.clone();
        probe.skip()?;
        let len = self.remaining() - probe.remaining();
        Ok(Decoder::new(self.read_bytes(len)?))
    }

    /// Decodes a null marker.
    pub fn null(&mut self) -> Result<()> { self.check_tag(Tag::Null) }

    /// Decodes a bool.
    pub fn bool(&mut self) -> Result<bool> {
        let tag = self.peek_tag()?;
        match tag {
            Tag::BoolTrue => { self.consume(1)?; Ok(true) }
            Tag::BoolFalse => { self.consume(1)?; Ok(false) }
            _ => Err(Error::InvalidTag(tag as u8)),
        }
    }

    /// Decodes u8.
    pub fn u8(&mut self) -> Result<u8> { self.check_tag(Tag::U8)?; Ok(u8::from_le_bytes(self.read_array()?)) }
    /// Decodes s8.
    pub fn s8(&mut self) -> Result<i8> { self.check_tag(Tag::S8)?; Ok(i8::from_le_bytes(self.read_array()?)) }
    /// Decodes u16 (LE).
    pub fn u16(&mut self) -> Result<u16> { self.check_tag(Tag::U16)?; Ok(u16::from_le_bytes(self.read_array()?)) }
    /// Decodes s16 (LE).
    pub fn s16(&mut self) -> Result<i16> { self.check_tag(Tag::S16)?; Ok(i16::from_le_bytes(self.read_array()?)) }
    /// Decodes u32 (LE).
    pub fn u32(&mut self) -> Result<u32> { self.check_tag(Tag::U32)?; Ok(u32::from_le_bytes(self.read_array()?)) }
    /// Decodes s32 (LE).
    pub fn s32(&mut self) -> Result<i32> { self.check_tag(Tag::S32)?; Ok(i32::from_le_bytes(self.read_array()?)) }
    /// Decodes u64 (LE).
    pub fn u64(&mut self) -> Result<u64> { self.check_tag(Tag::U64)?; Ok(u64::from_le_bytes(self.read_array()?)) }
    /// Decodes s64 (LE).
    pub fn s64(&mut self) -> Result<i64> { self.check_tag(Tag::S64)?; Ok(i64::from_le_bytes(self.read_array()?)) }
    /// Decodes f32 (LE).
    pub fn f32(&mut self) -> Result<f32> { self.check_tag(Tag::F32)?; Ok(f32::from_le_bytes(self.read_array()?)) }
    /// Decodes f64 (LE).
    pub fn f64(&mut self) -> Result<f64> { self.check_tag(Tag::F64)?; Ok(f64::from_le_bytes(self.read_array()?)) }

    /// Decodes any signed integer width, widened to `i64`.
    pub fn int(&mut self) -> Result<i64> {
        match self.peek_tag()? {
            Tag::S8 => self.s8().map(i64::from),
            Tag::S16 => self.s16().map(i64::from),
            Tag::S32 => self.s32().map(i64::from),
            Tag::S64 => self.s64(),
            other => Err(Error::InvalidTag(other as u8)),
        }
    }

    /// Decodes any unsigned integer width, widened to `u64`.
    pub fn uint(&mut self) -> Result<u64> {
        match self.peek_tag()? {
            Tag::U8 => self.u8().map(u64::from),
            Tag::U16 => self.u16().map(u64::from),
            Tag::U32 => self.u32().map(u64::from),
            Tag::U64 => self.u64(),
            other => Err(Error::InvalidTag(other as u8)),
        }
    }

    /// Decodes either float width, widened to `f64`.
    pub fn float(&mut self) -> Result<f64> {
        match self.peek_tag()? {
            Tag::F32 => self.f32().map(f64::from),
            Tag::F64 => self.f64(),
            other => Err(Error::InvalidTag(other as u8)),
        }
    }

    fn utf8(&mut self, tag: Tag) -> Result<&'a str> {
        self.check_tag(tag)?;
        let len = self.read_len()?;
        std::str::from_utf8(self.read_bytes(len)?).map_err(|_| Error::InvalidUtf8)
    }

    /// Decodes a string slice (UTF-8).
    pub fn str(&mut self) -> Result<&'a str> { self.utf8(Tag::String) }

    /// Decodes a map key (UTF-8).
    pub fn key(&mut self) -> Result<&'a str> { self.utf8(Tag::Key) }

    /// Decodes a byte slice.
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        self.check_tag(Tag::Bytes)?;
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    fn enter_container(&mut self, expected: Tag) -> Result<Decoder<'a>> {
        self.check_tag(expected)?;
        let len = self.read_len()?;
        Ok(Decoder::new(self.read_bytes(len)?))
    }

    /// Decodes a List into an iterator.
    pub fn list(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter_container(Tag::List)? })
    }

    /// Decodes a Map into an iterator.
    pub fn map(&mut self) -> Result<MapIter<'a>> {
        Ok(MapIter { dec: self.enter_container(Tag::Map)? })
    }

    /// Decodes a typed vector.
    pub fn typed(&mut self) -> Result<TypedVector<'a>> {
        let mut body = self.enter_container(Tag::Typed)?;
        let elem_byte = *body.read_bytes(1).map_err(|_| Error::MalformedTyped)?.first().ok_or(Error::MalformedTyped)?;
        let elem = Tag::from_u8(elem_byte).ok_or(Error::MalformedTyped)?;
        let width = elem.scalar_width().ok_or(Error::MalformedTyped)?;
        if body.remaining() % width != 0 {
            return Err(Error::MalformedTyped);
        }
        Ok(TypedVector { elem, width, data: body.buf })
    }

    /// Decodes a Variant.
    ///
    /// Returns `(Name, PayloadDecoder)`.
    pub fn variant(&mut self) -> Result<(&'a str, Decoder<'a>)> {
        let mut inner = self.enter_container(Tag::Variant)?;
        let name = inner.str()?;
        Ok((name, inner))
    }
}

/// Iterator for items within a List.
///
/// Iteration stops at the end of the body or at the first item that cannot be
/// delimited.
#[derive(Debug)]
pub struct ListIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = Decoder<'a>;

    fn next(&mut self) -> Option<Decoder<'a>> {
        if self.dec.remaining() == 0 {
            return None;
        }
        self.dec.next_item().ok()
    }
}

/// Iterator for Key-Value pairs within a Map, in buffer order.
#[derive(Debug)]
pub struct MapIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> MapIter<'a> {
    /// Returns `(Key, ValueDecoder)` for the next pair, or `None`.
    pub fn next(&mut self) -> Result<Option<(&'a str, Decoder<'a>)>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        let key = self.dec.key()?;
        let val = self.dec.next_item()?;
        Ok(Some((key, val)))
    }
}

/// A homogeneous run of packed numeric scalars.
#[derive(Debug, Clone)]
pub struct TypedVector<'a> {
    elem: Tag,
    width: usize,
    data: &'a [u8],
}

impl<'a> TypedVector<'a> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len() / self.width
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Tag shared by every element.
    pub fn elem_tag(&self) -> Tag {
        self.elem
    }

    /// True when the elements are `F32` or `F64`.
    pub fn is_float(&self) -> bool {
        self.elem.is_float()
    }

    /// Reads element `i`, widened to 64 bits.
    pub fn get(&self, i: usize) -> Option<Scalar> {
        let raw = self.data.get(i * self.width..(i + 1) * self.width)?;
        let mut wide = [0u8; 8];
        wide[..self.width].copy_from_slice(raw);
        let sign_fill = raw.last().map_or(0, |b| if b & 0x80 != 0 { 0xFF } else { 0 });

        Some(match self.elem {
            Tag::F32 => Scalar::Float(f64::from(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))),
            Tag::F64 => Scalar::Float(f64::from_le_bytes(wide)),
            Tag::S8 | Tag::S16 | Tag::S32 | Tag::S64 => {
                wide[self.width..].fill(sign_fill);
                Scalar::Int(i64::from_le_bytes(wide))
            }
            _ => Scalar::UInt(u64::from_le_bytes(wide)),
        })
    }

    /// Iterates the elements in order.
    pub fn iter(&self) -> impl Iterator<Item = Scalar> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}
