//! Low-level DMAP wire codec.
//!
//! A stream is a short preamble (`b"DMAP"` plus a little-endian `u16`
//! version) followed by self-describing records:
//!
//! ```text
//! RecordHeader { i32 total_length; i32 scalar_count; i32 array_count }
//! ScalarField  { u32 name_len; name; u8 type_code; value }
//! ArrayField   { u32 name_len; name; u8 type_code; u8 rank; i32 dims[rank]; data }
//! ```
//!
//! `total_length` covers the header itself. String values are written as a
//! `u32` length followed by UTF-8 bytes.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::models::{ArrayValue, Field, Record, ScalarValue, MAX_RANK};
use crate::types::{ArrayData, Primitive, TypeTag};

pub const MAGIC: &[u8; 4] = b"DMAP";
pub const VERSION: u16 = 0x0001;
pub const PREAMBLE_LEN: usize = 6;
pub const RECORD_HEADER_LEN: usize = 12;

type Endian = LittleEndian;

pub struct DmapReader<'a> {
    data: &'a [u8],
}

impl<'a> DmapReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn is_valid(&self) -> bool {
        self.data.len() >= PREAMBLE_LEN && &self.data[0..4] == MAGIC && self.get_version() == VERSION
    }

    pub fn get_version(&self) -> u16 {
        if self.data.len() < PREAMBLE_LEN {
            return 0;
        }
        let mut cursor = Cursor::new(&self.data[4..6]);
        cursor.read_u16::<Endian>().unwrap_or(0)
    }

    pub(crate) fn check_preamble(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(Error::EmptyFile);
        }
        if self.data.len() < PREAMBLE_LEN || &self.data[0..4] != MAGIC {
            return Err(Error::InvalidFormat("missing DMAP magic".to_string()));
        }
        let version = self.get_version();
        if version != VERSION {
            return Err(Error::InvalidFormat(format!(
                "unsupported version {:#06x}",
                version
            )));
        }
        Ok(())
    }

    /// Lazily decode the records in the buffer.
    ///
    /// A preamble problem (including an empty buffer) is reported as the
    /// single item of the sequence.
    pub fn records(&self) -> RecordIterator<'a> {
        match self.check_preamble() {
            Ok(()) => RecordIterator {
                data: self.data,
                pos: PREAMBLE_LEN,
                pending: None,
                done: false,
            },
            Err(err) => RecordIterator {
                data: self.data,
                pos: self.data.len(),
                pending: Some(err),
                done: false,
            },
        }
    }
}

/// Cursor over the records of one buffer.
///
/// After an error confined to one record the iterator moves on to the next
/// record boundary, so callers may skip or abort. After a header-level
/// error (truncation, bad preamble) the sequence ends.
pub struct RecordIterator<'a> {
    data: &'a [u8],
    pos: usize,
    pending: Option<Error>,
    done: bool,
}

impl<'a> RecordIterator<'a> {
    /// Byte offset of the next record header.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for RecordIterator<'a> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            self.done = true;
            return Some(Err(err));
        }
        if self.done || self.pos >= self.data.len() {
            return None;
        }

        let available = self.data.len() - self.pos;
        let declared = match read_header_length(&self.data[self.pos..]) {
            Some(len) if len >= RECORD_HEADER_LEN as i64 && len as usize <= available => len as usize,
            other => {
                self.done = true;
                let needed = match other {
                    Some(len) if len >= RECORD_HEADER_LEN as i64 => len as usize,
                    _ => RECORD_HEADER_LEN,
                };
                return Some(Err(Error::TruncatedRecord {
                    offset: self.pos,
                    needed,
                    available,
                }));
            }
        };

        let start = self.pos;
        self.pos += declared;
        Some(decode_record(&self.data[start..start + declared], start))
    }
}

fn read_header_length(data: &[u8]) -> Option<i64> {
    if data.len() < RECORD_HEADER_LEN {
        return None;
    }
    let mut cursor = Cursor::new(&data[0..4]);
    cursor.read_i32::<Endian>().ok().map(i64::from)
}

/// Bounds-checked view of one record's bytes.
struct FieldCursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> FieldCursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(Error::TruncatedRecord {
                offset: self.base + self.pos,
                needed: n,
                available,
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(Cursor::new(self.take(4)?).read_i32::<Endian>()?)
    }

    fn string(&mut self) -> Result<String> {
        let offset = self.offset();
        let len = Cursor::new(self.take(4)?).read_u32::<Endian>()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidString { offset })
    }

    fn primitive(&mut self, tag: TypeTag) -> Result<Primitive> {
        Ok(match tag {
            TypeTag::Char => Primitive::Char(self.take(1)?[0] as i8),
            TypeTag::UChar => Primitive::UChar(self.take(1)?[0]),
            TypeTag::Short => Primitive::Short(Cursor::new(self.take(2)?).read_i16::<Endian>()?),
            TypeTag::UShort => Primitive::UShort(Cursor::new(self.take(2)?).read_u16::<Endian>()?),
            TypeTag::Int => Primitive::Int(Cursor::new(self.take(4)?).read_i32::<Endian>()?),
            TypeTag::UInt => Primitive::UInt(Cursor::new(self.take(4)?).read_u32::<Endian>()?),
            TypeTag::Long => Primitive::Long(Cursor::new(self.take(8)?).read_i64::<Endian>()?),
            TypeTag::ULong => Primitive::ULong(Cursor::new(self.take(8)?).read_u64::<Endian>()?),
            TypeTag::Float => Primitive::Float(Cursor::new(self.take(4)?).read_f32::<Endian>()?),
            TypeTag::Double => Primitive::Double(Cursor::new(self.take(8)?).read_f64::<Endian>()?),
            TypeTag::String => Primitive::String(self.string()?),
        })
    }

    fn type_tag(&mut self, field: &str) -> Result<TypeTag> {
        let offset = self.offset();
        let code = self.u8()?;
        TypeTag::from_code(code).ok_or_else(|| Error::UnknownTypeTag {
            offset,
            code,
            field: field.to_string(),
        })
    }
}

fn decode_record(data: &[u8], base: usize) -> Result<Record> {
    let mut cursor = FieldCursor { data, pos: 4, base };
    let scalar_count = cursor.i32()?;
    let array_count = cursor.i32()?;
    if scalar_count < 0 || array_count < 0 {
        return Err(Error::TruncatedRecord {
            offset: base,
            needed: RECORD_HEADER_LEN,
            available: data.len(),
        });
    }

    let capacity = (scalar_count as usize)
        .saturating_add(array_count as usize)
        .min(data.len());
    let mut fields = Vec::with_capacity(capacity);

    for _ in 0..scalar_count {
        let name = cursor.string()?;
        let tag = cursor.type_tag(&name)?;
        let value = cursor.primitive(tag)?;
        fields.push(Field::Scalar(ScalarValue::new(name, value)));
    }

    for _ in 0..array_count {
        let name = cursor.string()?;
        let tag = cursor.type_tag(&name)?;
        fields.push(Field::Array(decode_array(&mut cursor, name, tag)?));
    }

    if cursor.pos != data.len() {
        return Err(Error::RecordLengthMismatch {
            offset: base,
            declared: data.len(),
            consumed: cursor.pos,
        });
    }

    Ok(Record::from_fields(fields)?.with_byte_len(data.len()))
}

fn decode_array(cursor: &mut FieldCursor<'_>, name: String, tag: TypeTag) -> Result<ArrayValue> {
    let rank = cursor.u8()? as usize;
    if rank == 0 || rank > MAX_RANK {
        return Err(Error::CorruptArrayShape {
            name,
            reason: format!("rank {} outside 1..={}", rank, MAX_RANK),
        });
    }

    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        let extent = cursor.i32()?;
        if extent <= 0 {
            return Err(Error::CorruptArrayShape {
                name,
                reason: format!("non-positive extent {}", extent),
            });
        }
        dims.push(extent as usize);
    }

    let count = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| Error::CorruptArrayShape {
            name: name.clone(),
            reason: format!("element count of {:?} overflows", dims),
        })?;

    // Every element takes at least its fixed width (strings at least their prefix).
    let min_bytes = count.checked_mul(tag.width().unwrap_or(4));
    if min_bytes.map_or(true, |n| n > cursor.remaining()) {
        return Err(Error::CorruptArrayShape {
            name,
            reason: format!(
                "data for dims {:?} exceeds the {} bytes left in the record",
                dims,
                cursor.remaining()
            ),
        });
    }

    let mut data = ArrayData::with_capacity(tag, count);
    for _ in 0..count {
        let value = cursor.primitive(tag)?;
        data.push(value);
    }

    ArrayValue::new(name, dims, data)
}

fn write_string(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u32::try_from(s.len()).map_err(|_| Error::RecordTooLarge(s.len()))?;
    out.write_u32::<Endian>(len)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn write_primitive(out: &mut Vec<u8>, value: &Primitive) -> Result<()> {
    match value {
        Primitive::Char(v) => out.write_i8(*v)?,
        Primitive::UChar(v) => out.write_u8(*v)?,
        Primitive::Short(v) => out.write_i16::<Endian>(*v)?,
        Primitive::UShort(v) => out.write_u16::<Endian>(*v)?,
        Primitive::Int(v) => out.write_i32::<Endian>(*v)?,
        Primitive::UInt(v) => out.write_u32::<Endian>(*v)?,
        Primitive::Long(v) => out.write_i64::<Endian>(*v)?,
        Primitive::ULong(v) => out.write_u64::<Endian>(*v)?,
        Primitive::Float(v) => out.write_f32::<Endian>(*v)?,
        Primitive::Double(v) => out.write_f64::<Endian>(*v)?,
        Primitive::String(s) => write_string(out, s)?,
    }
    Ok(())
}

fn name_size(name: &str) -> usize {
    4 + name.len()
}

fn primitive_size(value: &Primitive) -> usize {
    match value {
        Primitive::String(s) => 4 + s.len(),
        other => other.tag().width().unwrap_or(0),
    }
}

fn data_size(data: &ArrayData) -> usize {
    match data {
        ArrayData::String(values) => values.iter().map(|s| 4 + s.len()).sum(),
        other => other.len() * other.tag().width().unwrap_or(0),
    }
}

/// Encoded size of `record` in bytes, header included.
pub fn encoded_len(record: &Record) -> usize {
    let fields: usize = record
        .fields()
        .map(|field| match field {
            Field::Scalar(s) => name_size(s.name()) + 1 + primitive_size(s.value()),
            Field::Array(a) => name_size(a.name()) + 2 + 4 * a.rank() + data_size(a.data()),
        })
        .sum();
    RECORD_HEADER_LEN + fields
}

/// Append one encoded record to `out`.
///
/// Scalars are written before arrays regardless of their order in the
/// record, matching the header's two counts.
pub fn encode_record(record: &Record, out: &mut Vec<u8>) -> Result<()> {
    let total = encoded_len(record);
    let total_i32 = i32::try_from(total).map_err(|_| Error::RecordTooLarge(total))?;
    let scalar_count = record.scalars().count() as i32;
    let array_count = record.arrays().count() as i32;

    out.reserve(total);
    let start = out.len();
    out.write_i32::<Endian>(total_i32)?;
    out.write_i32::<Endian>(scalar_count)?;
    out.write_i32::<Endian>(array_count)?;

    for scalar in record.scalars() {
        write_string(out, scalar.name())?;
        out.write_u8(scalar.tag().code())?;
        write_primitive(out, scalar.value())?;
    }

    for array in record.arrays() {
        write_string(out, array.name())?;
        out.write_u8(array.tag().code())?;
        out.write_u8(array.rank() as u8)?;
        for &extent in array.dims() {
            let extent = i32::try_from(extent).map_err(|_| Error::RecordTooLarge(total))?;
            out.write_i32::<Endian>(extent)?;
        }
        for i in 0..array.data().len() {
            if let Some(value) = array.data().get(i) {
                write_primitive(out, &value)?;
            }
        }
    }

    debug_assert_eq!(out.len() - start, total);
    Ok(())
}

pub fn write_preamble(out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(MAGIC);
    out.write_u16::<Endian>(VERSION)?;
    Ok(())
}

/// Lazily decode the records of a complete stream.
pub fn decode_stream(data: &[u8]) -> RecordIterator<'_> {
    DmapReader::new(data).records()
}

/// Encode `records` as a complete stream, preamble included.
pub fn encode_stream<'r, I>(records: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'r Record>,
{
    let mut out = Vec::new();
    write_preamble(&mut out)?;
    for record in records {
        encode_record(record, &mut out)?;
    }
    Ok(out)
}
