//! # Field Codec
//!
//! Primitive wire encodings shared by every message shape.
//!
//! ## Wire Rules
//! - Integers are big-endian, fixed width.
//! - Fixed-point floats are a signed 32-bit `round(value * scale)`; vectors are
//!   two or three of them back to back.
//! - Strings are a `u16`/`u32` length followed by raw bytes. No terminator, no
//!   charset: the bytes are opaque to this layer.
//! - Fixed strings occupy exactly `n` bytes, zero padded.
//! - Lists are a count followed by that many element tuples.
//!
//! ## Safety
//! Decoding never reads past the buffer. A short buffer yields
//! [`ProtocolError::TruncatedMessage`]; a length or count that cannot possibly
//! fit in what is left yields [`ProtocolError::InvalidLength`] before anything
//! is allocated.

use crate::error::{ProtocolError, Result};
use bytes::{BufMut, BytesMut};
use std::borrow::Cow;
use std::fmt;

/// Default fixed-point scale ("f1000" on the wire).
pub const F1000: u32 = 1000;

/// Width of a length or count prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LenWidth {
    U8,
    U16,
    U32,
}

impl LenWidth {
    pub const fn size(self) -> usize {
        match self {
            LenWidth::U8 => 1,
            LenWidth::U16 => 2,
            LenWidth::U32 => 4,
        }
    }

    fn max_value(self) -> usize {
        match self {
            LenWidth::U8 => u8::MAX as usize,
            LenWidth::U16 => u16::MAX as usize,
            LenWidth::U32 => u32::MAX as usize,
        }
    }
}

/// Wire kind of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    U8,
    /// `u8`, zero is false.
    Bool,
    U16,
    U32,
    U64,
    S16,
    S32,
    /// `f32` carried as `s32` scaled by the given factor.
    Fixed(u32),
    FixedV2(u32),
    FixedV3(u32),
    /// Three `s16`: node and block coordinates.
    V3S16,
    /// Length-prefixed opaque bytes.
    Str(LenWidth),
    /// Exactly `n` bytes, zero padded.
    FixedStr(usize),
    /// Count-prefixed repetition of an element tuple.
    List(LenWidth, &'static [FieldKind]),
    /// A `u8` tag followed by the payload kind registered for it, or the
    /// fallback kind for unlisted tags.
    Switch(&'static [(u8, FieldKind)], &'static FieldKind),
}

impl FieldKind {
    /// Smallest number of bytes any value of this kind occupies.
    pub fn min_size(&self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::Bool => 1,
            FieldKind::U16 | FieldKind::S16 => 2,
            FieldKind::U32 | FieldKind::S32 | FieldKind::Fixed(_) => 4,
            FieldKind::U64 | FieldKind::FixedV2(_) => 8,
            FieldKind::FixedV3(_) => 12,
            FieldKind::V3S16 => 6,
            FieldKind::Str(width) | FieldKind::List(width, _) => width.size(),
            FieldKind::FixedStr(n) => *n,
            FieldKind::Switch(cases, fallback) => {
                1 + cases
                    .iter()
                    .map(|(_, kind)| kind.min_size())
                    .chain(std::iter::once(fallback.min_size()))
                    .min()
                    .unwrap_or(0)
            }
        }
    }

    fn switch_case(cases: &[(u8, FieldKind)], fallback: &FieldKind, tag: u8) -> FieldKind {
        cases
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, kind)| *kind)
            .unwrap_or(*fallback)
    }
}

/// A decoded field, typed by its [`FieldKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U8(u8),
    Bool(bool),
    U16(u16),
    U32(u32),
    U64(u64),
    S16(i16),
    S32(i32),
    F32(f32),
    V2F([f32; 2]),
    V3F([f32; 3]),
    V3S16([i16; 3]),
    /// Payload of `Str` and `FixedStr` kinds.
    Bytes(Vec<u8>),
    List(Vec<Vec<FieldValue>>),
    Switch(u8, Box<FieldValue>),
    /// Field not present at the version being spoken.
    Absent,
}

macro_rules! field_value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                FieldValue::$variant(value)
            }
        }

        impl TryFrom<FieldValue> for $ty {
            type Error = FieldValue;

            fn try_from(value: FieldValue) -> std::result::Result<Self, FieldValue> {
                match value {
                    FieldValue::$variant(v) => Ok(v),
                    other => Err(other),
                }
            }
        }
    )*};
}

field_value_conversions! {
    u8 => U8,
    bool => Bool,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i16 => S16,
    i32 => S32,
    f32 => F32,
    [f32; 2] => V2F,
    [f32; 3] => V3F,
    [i16; 3] => V3S16,
    Vec<u8> => Bytes,
    Vec<Vec<FieldValue>> => List,
}

/// Text carried on the wire.
///
/// The bytes are kept exactly as received so a decoded message re-encodes to
/// the same payload. Use [`WireStr::to_str_lossy`] or `Display` for a readable
/// rendering.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireStr(Vec<u8>);

impl WireStr {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The text if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// The text with invalid sequences replaced by U+FFFD.
    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl fmt::Display for WireStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

impl fmt::Debug for WireStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => fmt::Debug::fmt(text, f),
            None => write!(f, "b{:?}", self.0),
        }
    }
}

impl From<&str> for WireStr {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for WireStr {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&[u8]> for WireStr {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<u8>> for WireStr {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for WireStr {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq<str> for WireStr {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for WireStr {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl From<&WireStr> for FieldValue {
    fn from(value: &WireStr) -> Self {
        FieldValue::Bytes(value.0.clone())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Bytes(value.as_bytes().to_vec())
    }
}

impl TryFrom<FieldValue> for WireStr {
    type Error = FieldValue;

    fn try_from(value: FieldValue) -> std::result::Result<Self, FieldValue> {
        match value {
            FieldValue::Bytes(bytes) => Ok(Self(bytes)),
            other => Err(other),
        }
    }
}

/// Bounds-checked cursor over an incoming buffer.
#[derive(Debug)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(ProtocolError::TruncatedMessage { needed, remaining });
        }
        let slice = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub fn read_s16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    pub fn read_s32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn read_len(&mut self, width: LenWidth) -> Result<usize> {
        Ok(match width {
            LenWidth::U8 => self.read_u8()? as usize,
            LenWidth::U16 => self.read_u16()? as usize,
            LenWidth::U32 => self.read_u32()? as usize,
        })
    }

    fn read_fixed(&mut self, scale: u32) -> Result<f32> {
        let raw = self.read_s32()?;
        Ok((f64::from(raw) / f64::from(scale)) as f32)
    }
}

/// Encode `value` as `kind` into `out`.
///
/// # Errors
/// `FieldMismatch` when the value variant does not fit the kind, and
/// `InvalidLength` when a string or list is too long for its prefix.
pub fn encode_field(out: &mut BytesMut, kind: &FieldKind, value: &FieldValue) -> Result<()> {
    match (kind, value) {
        (FieldKind::U8, FieldValue::U8(v)) => out.put_u8(*v),
        (FieldKind::Bool, FieldValue::Bool(v)) => out.put_u8(u8::from(*v)),
        (FieldKind::U16, FieldValue::U16(v)) => out.put_u16(*v),
        (FieldKind::U32, FieldValue::U32(v)) => out.put_u32(*v),
        (FieldKind::U64, FieldValue::U64(v)) => out.put_u64(*v),
        (FieldKind::S16, FieldValue::S16(v)) => out.put_i16(*v),
        (FieldKind::S32, FieldValue::S32(v)) => out.put_i32(*v),
        (FieldKind::Fixed(scale), FieldValue::F32(v)) => out.put_i32(to_fixed(*v, *scale)),
        (FieldKind::FixedV2(scale), FieldValue::V2F(v)) => {
            for c in v {
                out.put_i32(to_fixed(*c, *scale));
            }
        }
        (FieldKind::FixedV3(scale), FieldValue::V3F(v)) => {
            for c in v {
                out.put_i32(to_fixed(*c, *scale));
            }
        }
        (FieldKind::V3S16, FieldValue::V3S16(v)) => {
            for c in v {
                out.put_i16(*c);
            }
        }
        (FieldKind::Str(width), FieldValue::Bytes(bytes)) => {
            put_len(out, *width, bytes.len())?;
            out.put_slice(bytes);
        }
        (FieldKind::FixedStr(n), FieldValue::Bytes(bytes)) => {
            if bytes.len() > *n {
                return Err(ProtocolError::InvalidLength {
                    claimed: bytes.len(),
                    remaining: *n,
                });
            }
            out.put_slice(bytes);
            out.put_bytes(0, n - bytes.len());
        }
        (FieldKind::List(width, element), FieldValue::List(items)) => {
            put_len(out, *width, items.len())?;
            for item in items {
                if item.len() != element.len() {
                    return Err(ProtocolError::FieldMismatch { field: "list element" });
                }
                for (k, v) in element.iter().zip(item) {
                    encode_field(out, k, v)?;
                }
            }
        }
        (FieldKind::Switch(cases, fallback), FieldValue::Switch(tag, inner)) => {
            out.put_u8(*tag);
            encode_field(out, &FieldKind::switch_case(cases, fallback, *tag), inner)?;
        }
        _ => return Err(ProtocolError::FieldMismatch { field: "value" }),
    }
    Ok(())
}

/// Decode one field of `kind` from the reader.
pub fn decode_field(reader: &mut FieldReader<'_>, kind: &FieldKind) -> Result<FieldValue> {
    Ok(match kind {
        FieldKind::U8 => FieldValue::U8(reader.read_u8()?),
        FieldKind::Bool => FieldValue::Bool(reader.read_u8()? != 0),
        FieldKind::U16 => FieldValue::U16(reader.read_u16()?),
        FieldKind::U32 => FieldValue::U32(reader.read_u32()?),
        FieldKind::U64 => FieldValue::U64(reader.read_u64()?),
        FieldKind::S16 => FieldValue::S16(reader.read_s16()?),
        FieldKind::S32 => FieldValue::S32(reader.read_s32()?),
        FieldKind::Fixed(scale) => FieldValue::F32(reader.read_fixed(*scale)?),
        FieldKind::FixedV2(scale) => {
            FieldValue::V2F([reader.read_fixed(*scale)?, reader.read_fixed(*scale)?])
        }
        FieldKind::FixedV3(scale) => FieldValue::V3F([
            reader.read_fixed(*scale)?,
            reader.read_fixed(*scale)?,
            reader.read_fixed(*scale)?,
        ]),
        FieldKind::V3S16 => FieldValue::V3S16([
            reader.read_s16()?,
            reader.read_s16()?,
            reader.read_s16()?,
        ]),
        FieldKind::Str(width) => {
            let len = reader.read_len(*width)?;
            check_claim(len, reader.remaining())?;
            FieldValue::Bytes(reader.take(len)?.to_vec())
        }
        FieldKind::FixedStr(n) => {
            let raw = reader.take(*n)?;
            let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            FieldValue::Bytes(raw[..end].to_vec())
        }
        FieldKind::List(width, element) => {
            let count = reader.read_len(*width)?;
            let per_item = element.iter().map(FieldKind::min_size).sum::<usize>().max(1);
            check_claim(count.saturating_mul(per_item), reader.remaining())?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let mut item = Vec::with_capacity(element.len());
                for k in element.iter() {
                    item.push(decode_field(reader, k)?);
                }
                items.push(item);
            }
            FieldValue::List(items)
        }
        FieldKind::Switch(cases, fallback) => {
            let tag = reader.read_u8()?;
            let inner = decode_field(reader, &FieldKind::switch_case(cases, fallback, tag))?;
            FieldValue::Switch(tag, Box::new(inner))
        }
    })
}

/// Encode a single value on its own.
pub fn encode(kind: &FieldKind, value: &FieldValue) -> Result<Vec<u8>> {
    let mut out = BytesMut::with_capacity(kind.min_size());
    encode_field(&mut out, kind, value)?;
    Ok(out.to_vec())
}

/// Decode a single value, returning it with the number of bytes consumed.
pub fn decode(bytes: &[u8], kind: &FieldKind) -> Result<(FieldValue, usize)> {
    let mut reader = FieldReader::new(bytes);
    let value = decode_field(&mut reader, kind)?;
    Ok((value, reader.position()))
}

#[inline]
fn to_fixed(value: f32, scale: u32) -> i32 {
    // `as` saturates out-of-range values and maps NaN to zero.
    (f64::from(value) * f64::from(scale)).round() as i32
}

fn put_len(out: &mut BytesMut, width: LenWidth, len: usize) -> Result<()> {
    if len > width.max_value() {
        return Err(ProtocolError::InvalidLength {
            claimed: len,
            remaining: width.max_value(),
        });
    }
    match width {
        LenWidth::U8 => out.put_u8(len as u8),
        LenWidth::U16 => out.put_u16(len as u16),
        LenWidth::U32 => out.put_u32(len as u32),
    }
    Ok(())
}

#[inline]
fn check_claim(claimed: usize, remaining: usize) -> Result<()> {
    if claimed > remaining {
        Err(ProtocolError::InvalidLength { claimed, remaining })
    } else {
        Ok(())
    }
}
