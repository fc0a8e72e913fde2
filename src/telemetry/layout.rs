//! Positional field codec for the simulator's shared memory structs.
//!
//! The simulator publishes its telemetry as C structs compiled with
//! `#pragma pack(4)`: little-endian 32-bit scalars, `wchar_t` strings stored as
//! UTF-16 code units, and two bytes of padding after every odd-length wide
//! string. Decoding walks the declared fields in order with a [`FieldReader`];
//! encoding replays the same order through a [`FieldWriter`]. Padding is kept as
//! explicit fields so a decode/encode pair reproduces the source bytes exactly.

use crate::{Result, SyncError};

use super::SegmentKind;

/// A fixed-layout struct published in one shared memory segment.
pub trait SharedMemoryStruct: Sized + Send + Sync + 'static {
    /// Struct name used in diagnostics.
    const NAME: &'static str;

    /// Declared size in bytes, including trailing padding.
    const SIZE: usize;

    /// Segment the struct is published in.
    const SEGMENT: SegmentKind;

    /// Read every field in declaration order.
    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self>;

    /// Write every field in declaration order.
    fn write_fields(&self, writer: &mut FieldWriter);

    /// Decode a struct from the start of `bytes`.
    ///
    /// Bytes past [`Self::SIZE`] are ignored. Fails with
    /// [`SyncError::SizeMismatch`] when the region is shorter than the struct.
    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(SyncError::SizeMismatch {
                structure: Self::NAME,
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }

        let mut reader = FieldReader::new(Self::NAME, &bytes[..Self::SIZE]);
        let value = Self::read_fields(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }

    /// Encode the struct back into its exact memory representation.
    fn encode(&self) -> Vec<u8> {
        let mut writer = FieldWriter::with_capacity(Self::SIZE);
        self.write_fields(&mut writer);
        writer.into_bytes()
    }
}

/// Cursor over a struct-sized byte region.
#[derive(Debug)]
pub struct FieldReader<'a> {
    structure: &'static str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(structure: &'static str, bytes: &'a [u8]) -> Self {
        Self { structure, bytes, pos: 0 }
    }

    /// Current offset from the start of the struct.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let chunk = self.bytes.get(self.pos..end).ok_or(SyncError::SizeMismatch {
            structure: self.structure,
            expected: end,
            actual: self.bytes.len(),
        })?;

        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        self.pos = end;
        Ok(out)
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    pub fn f32s<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0.0; N];
        for value in &mut out {
            *value = self.f32()?;
        }
        Ok(out)
    }

    /// Read `N` consecutive `float[3]` vectors.
    pub fn vec3s<const N: usize>(&mut self) -> Result<[[f32; 3]; N]> {
        let mut out = [[0.0; 3]; N];
        for vector in &mut out {
            *vector = self.f32s::<3>()?;
        }
        Ok(out)
    }

    pub fn wide<const N: usize>(&mut self) -> Result<WideString<N>> {
        let mut units = [0u16; N];
        for unit in &mut units {
            *unit = u16::from_le_bytes(self.take::<2>()?);
        }
        Ok(WideString(units))
    }

    pub fn pad<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.take::<N>()
    }

    /// Fails unless every byte of the region was consumed.
    pub fn finish(self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(SyncError::SizeMismatch {
                structure: self.structure,
                expected: self.bytes.len(),
                actual: self.pos,
            });
        }
        Ok(())
    }
}

/// Append-only writer mirroring [`FieldReader`].
#[derive(Debug, Default)]
pub struct FieldWriter {
    bytes: Vec<u8>,
}

impl FieldWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { bytes: Vec::with_capacity(capacity) }
    }

    pub fn put_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f32s(&mut self, values: &[f32]) {
        for value in values {
            self.put_f32(*value);
        }
    }

    pub fn put_vec3s(&mut self, vectors: &[[f32; 3]]) {
        for vector in vectors {
            self.put_f32s(vector);
        }
    }

    pub fn put_wide<const N: usize>(&mut self, value: &WideString<N>) {
        for unit in value.units() {
            self.bytes.extend_from_slice(&unit.to_le_bytes());
        }
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Fixed-capacity `wchar_t[N]` string kept as raw UTF-16 code units.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WideString<const N: usize>(pub [u16; N]);

impl<const N: usize> WideString<N> {
    /// Encode `text`, truncating so a NUL terminator always fits.
    pub fn from_text(text: &str) -> Self {
        let mut units = [0u16; N];
        for (slot, unit) in units.iter_mut().zip(text.encode_utf16().take(N.saturating_sub(1))) {
            *slot = unit;
        }
        Self(units)
    }

    pub fn units(&self) -> &[u16; N] {
        &self.0
    }

    /// Text up to the first NUL, with invalid surrogates replaced.
    pub fn to_string_lossy(&self) -> String {
        let end = self.0.iter().position(|&unit| unit == 0).unwrap_or(N);
        String::from_utf16_lossy(&self.0[..end])
    }
}

impl<const N: usize> Default for WideString<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> std::fmt::Debug for WideString<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}
