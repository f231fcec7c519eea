//! Type code registry and the primitive value containers it describes.
//!
//! The DMAP type table is closed: each code maps to exactly one primitive
//! kind with a fixed byte width (strings excepted, which carry a length
//! prefix). Adding a code is a format version bump.

use serde::Serialize;
use std::fmt;

/// Primitive kind of a DMAP field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Char,
    Short,
    Int,
    Long,
    UChar,
    UShort,
    UInt,
    ULong,
    Float,
    Double,
    String,
}

impl TypeTag {
    /// Every known tag, in code order.
    pub const ALL: [TypeTag; 11] = [
        TypeTag::Char,
        TypeTag::Short,
        TypeTag::Int,
        TypeTag::Long,
        TypeTag::UChar,
        TypeTag::UShort,
        TypeTag::UInt,
        TypeTag::ULong,
        TypeTag::Float,
        TypeTag::Double,
        TypeTag::String,
    ];

    /// Resolve a wire type code. Returns `None` for codes outside the table.
    pub fn from_code(code: u8) -> Option<TypeTag> {
        match code {
            1 => Some(TypeTag::Char),
            2 => Some(TypeTag::Short),
            3 => Some(TypeTag::Int),
            4 => Some(TypeTag::Long),
            5 => Some(TypeTag::UChar),
            6 => Some(TypeTag::UShort),
            7 => Some(TypeTag::UInt),
            8 => Some(TypeTag::ULong),
            9 => Some(TypeTag::Float),
            10 => Some(TypeTag::Double),
            11 => Some(TypeTag::String),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            TypeTag::Char => 1,
            TypeTag::Short => 2,
            TypeTag::Int => 3,
            TypeTag::Long => 4,
            TypeTag::UChar => 5,
            TypeTag::UShort => 6,
            TypeTag::UInt => 7,
            TypeTag::ULong => 8,
            TypeTag::Float => 9,
            TypeTag::Double => 10,
            TypeTag::String => 11,
        }
    }

    /// Encoded width of one value in bytes, or `None` for length-prefixed strings.
    pub fn width(self) -> Option<usize> {
        match self {
            TypeTag::Char | TypeTag::UChar => Some(1),
            TypeTag::Short | TypeTag::UShort => Some(2),
            TypeTag::Int | TypeTag::UInt | TypeTag::Float => Some(4),
            TypeTag::Long | TypeTag::ULong | TypeTag::Double => Some(8),
            TypeTag::String => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Char => "char",
            TypeTag::Short => "short",
            TypeTag::Int => "int",
            TypeTag::Long => "long",
            TypeTag::UChar => "uchar",
            TypeTag::UShort => "ushort",
            TypeTag::UInt => "uint",
            TypeTag::ULong => "ulong",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::String => "string",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Primitive {
    Char(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    UChar(u8),
    UShort(u16),
    UInt(u32),
    ULong(u64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Primitive {
    pub fn tag(&self) -> TypeTag {
        match self {
            Primitive::Char(_) => TypeTag::Char,
            Primitive::Short(_) => TypeTag::Short,
            Primitive::Int(_) => TypeTag::Int,
            Primitive::Long(_) => TypeTag::Long,
            Primitive::UChar(_) => TypeTag::UChar,
            Primitive::UShort(_) => TypeTag::UShort,
            Primitive::UInt(_) => TypeTag::UInt,
            Primitive::ULong(_) => TypeTag::ULong,
            Primitive::Float(_) => TypeTag::Float,
            Primitive::Double(_) => TypeTag::Double,
            Primitive::String(_) => TypeTag::String,
        }
    }

    /// Numeric value widened to `f64`; `None` for strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Primitive::Char(v) => Some(*v as f64),
            Primitive::Short(v) => Some(*v as f64),
            Primitive::Int(v) => Some(*v as f64),
            Primitive::Long(v) => Some(*v as f64),
            Primitive::UChar(v) => Some(*v as f64),
            Primitive::UShort(v) => Some(*v as f64),
            Primitive::UInt(v) => Some(*v as f64),
            Primitive::ULong(v) => Some(*v as f64),
            Primitive::Float(v) => Some(*v as f64),
            Primitive::Double(v) => Some(*v),
            Primitive::String(_) => None,
        }
    }

    /// Integer value, if this is an integer kind that fits in `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Primitive::Char(v) => Some(*v as i64),
            Primitive::Short(v) => Some(*v as i64),
            Primitive::Int(v) => Some(*v as i64),
            Primitive::Long(v) => Some(*v),
            Primitive::UChar(v) => Some(*v as i64),
            Primitive::UShort(v) => Some(*v as i64),
            Primitive::UInt(v) => Some(*v as i64),
            Primitive::ULong(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Primitive::String(s) => Some(s),
            _ => None,
        }
    }

    /// Build a value of `tag` from an `f64`, truncating toward zero for
    /// integer kinds and saturating at the kind's bounds.
    pub fn from_f64(tag: TypeTag, v: f64) -> Option<Primitive> {
        Some(match tag {
            TypeTag::Char => Primitive::Char(v as i8),
            TypeTag::Short => Primitive::Short(v as i16),
            TypeTag::Int => Primitive::Int(v as i32),
            TypeTag::Long => Primitive::Long(v as i64),
            TypeTag::UChar => Primitive::UChar(v as u8),
            TypeTag::UShort => Primitive::UShort(v as u16),
            TypeTag::UInt => Primitive::UInt(v as u32),
            TypeTag::ULong => Primitive::ULong(v as u64),
            TypeTag::Float => Primitive::Float(v as f32),
            TypeTag::Double => Primitive::Double(v),
            TypeTag::String => return None,
        })
    }

    /// Like [`Primitive::from_f64`], but `None` when `v` is not finite or
    /// falls outside the range of an integer kind.
    pub fn checked_from_f64(tag: TypeTag, v: f64) -> Option<Primitive> {
        let (min, max) = match tag {
            TypeTag::Char => (i8::MIN as f64, i8::MAX as f64),
            TypeTag::Short => (i16::MIN as f64, i16::MAX as f64),
            TypeTag::Int => (i32::MIN as f64, i32::MAX as f64),
            TypeTag::Long => (i64::MIN as f64, i64::MAX as f64),
            TypeTag::UChar => (0.0, u8::MAX as f64),
            TypeTag::UShort => (0.0, u16::MAX as f64),
            TypeTag::UInt => (0.0, u32::MAX as f64),
            TypeTag::ULong => (0.0, u64::MAX as f64),
            TypeTag::Float | TypeTag::Double => return Primitive::from_f64(tag, v),
            TypeTag::String => return None,
        };
        if !v.is_finite() || v.trunc() < min || v.trunc() > max {
            return None;
        }
        Primitive::from_f64(tag, v)
    }
}

/// Flat, homogeneously typed storage for an array field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArrayData {
    Char(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    UChar(Vec<u8>),
    UShort(Vec<u16>),
    UInt(Vec<u32>),
    ULong(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
}

macro_rules! for_each_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Char($v) => $body,
            ArrayData::Short($v) => $body,
            ArrayData::Int($v) => $body,
            ArrayData::Long($v) => $body,
            ArrayData::UChar($v) => $body,
            ArrayData::UShort($v) => $body,
            ArrayData::UInt($v) => $body,
            ArrayData::ULong($v) => $body,
            ArrayData::Float($v) => $body,
            ArrayData::Double($v) => $body,
            ArrayData::String($v) => $body,
        }
    };
}

impl ArrayData {
    /// Empty storage of the given kind with room for `capacity` elements.
    pub fn with_capacity(tag: TypeTag, capacity: usize) -> ArrayData {
        match tag {
            TypeTag::Char => ArrayData::Char(Vec::with_capacity(capacity)),
            TypeTag::Short => ArrayData::Short(Vec::with_capacity(capacity)),
            TypeTag::Int => ArrayData::Int(Vec::with_capacity(capacity)),
            TypeTag::Long => ArrayData::Long(Vec::with_capacity(capacity)),
            TypeTag::UChar => ArrayData::UChar(Vec::with_capacity(capacity)),
            TypeTag::UShort => ArrayData::UShort(Vec::with_capacity(capacity)),
            TypeTag::UInt => ArrayData::UInt(Vec::with_capacity(capacity)),
            TypeTag::ULong => ArrayData::ULong(Vec::with_capacity(capacity)),
            TypeTag::Float => ArrayData::Float(Vec::with_capacity(capacity)),
            TypeTag::Double => ArrayData::Double(Vec::with_capacity(capacity)),
            TypeTag::String => ArrayData::String(Vec::with_capacity(capacity)),
        }
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            ArrayData::Char(_) => TypeTag::Char,
            ArrayData::Short(_) => TypeTag::Short,
            ArrayData::Int(_) => TypeTag::Int,
            ArrayData::Long(_) => TypeTag::Long,
            ArrayData::UChar(_) => TypeTag::UChar,
            ArrayData::UShort(_) => TypeTag::UShort,
            ArrayData::UInt(_) => TypeTag::UInt,
            ArrayData::ULong(_) => TypeTag::ULong,
            ArrayData::Float(_) => TypeTag::Float,
            ArrayData::Double(_) => TypeTag::Double,
            ArrayData::String(_) => TypeTag::String,
        }
    }

    pub fn len(&self) -> usize {
        for_each_variant!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index` as a [`Primitive`].
    pub fn get(&self, index: usize) -> Option<Primitive> {
        match self {
            ArrayData::Char(v) => v.get(index).map(|x| Primitive::Char(*x)),
            ArrayData::Short(v) => v.get(index).map(|x| Primitive::Short(*x)),
            ArrayData::Int(v) => v.get(index).map(|x| Primitive::Int(*x)),
            ArrayData::Long(v) => v.get(index).map(|x| Primitive::Long(*x)),
            ArrayData::UChar(v) => v.get(index).map(|x| Primitive::UChar(*x)),
            ArrayData::UShort(v) => v.get(index).map(|x| Primitive::UShort(*x)),
            ArrayData::UInt(v) => v.get(index).map(|x| Primitive::UInt(*x)),
            ArrayData::ULong(v) => v.get(index).map(|x| Primitive::ULong(*x)),
            ArrayData::Float(v) => v.get(index).map(|x| Primitive::Float(*x)),
            ArrayData::Double(v) => v.get(index).map(|x| Primitive::Double(*x)),
            ArrayData::String(v) => v.get(index).map(|x| Primitive::String(x.clone())),
        }
    }

    /// Copy of the contiguous elements `start..end`, keeping the kind.
    pub fn slice(&self, start: usize, end: usize) -> ArrayData {
        match self {
            ArrayData::Char(v) => ArrayData::Char(v[start..end].to_vec()),
            ArrayData::Short(v) => ArrayData::Short(v[start..end].to_vec()),
            ArrayData::Int(v) => ArrayData::Int(v[start..end].to_vec()),
            ArrayData::Long(v) => ArrayData::Long(v[start..end].to_vec()),
            ArrayData::UChar(v) => ArrayData::UChar(v[start..end].to_vec()),
            ArrayData::UShort(v) => ArrayData::UShort(v[start..end].to_vec()),
            ArrayData::UInt(v) => ArrayData::UInt(v[start..end].to_vec()),
            ArrayData::ULong(v) => ArrayData::ULong(v[start..end].to_vec()),
            ArrayData::Float(v) => ArrayData::Float(v[start..end].to_vec()),
            ArrayData::Double(v) => ArrayData::Double(v[start..end].to_vec()),
            ArrayData::String(v) => ArrayData::String(v[start..end].to_vec()),
        }
    }

    /// All numeric elements widened to `f64`; `None` for string arrays.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            ArrayData::String(_) => None,
            ArrayData::Double(v) => Some(v.clone()),
            _ => Some(
                (0..self.len())
                    .filter_map(|i| self.get(i).and_then(|p| p.as_f64()))
                    .collect(),
            ),
        }
    }

    /// Convert numeric data to another numeric kind, element by element,
    /// truncating toward zero. `None` if any element is not finite or does
    /// not fit the target kind.
    pub fn checked_cast(&self, tag: TypeTag) -> Option<ArrayData> {
        if tag == self.tag() {
            return Some(self.clone());
        }
        let values = self.to_f64_vec()?;
        let mut out = ArrayData::with_capacity(tag, values.len());
        for v in values {
            out.push(Primitive::checked_from_f64(tag, v)?);
        }
        Some(out)
    }

    /// Append a value of the matching kind. Returns `false` on a kind mismatch.
    pub fn push(&mut self, value: Primitive) -> bool {
        match (self, value) {
            (ArrayData::Char(v), Primitive::Char(x)) => v.push(x),
            (ArrayData::Short(v), Primitive::Short(x)) => v.push(x),
            (ArrayData::Int(v), Primitive::Int(x)) => v.push(x),
            (ArrayData::Long(v), Primitive::Long(x)) => v.push(x),
            (ArrayData::UChar(v), Primitive::UChar(x)) => v.push(x),
            (ArrayData::UShort(v), Primitive::UShort(x)) => v.push(x),
            (ArrayData::UInt(v), Primitive::UInt(x)) => v.push(x),
            (ArrayData::ULong(v), Primitive::ULong(x)) => v.push(x),
            (ArrayData::Float(v), Primitive::Float(x)) => v.push(x),
            (ArrayData::Double(v), Primitive::Double(x)) => v.push(x),
            (ArrayData::String(v), Primitive::String(x)) => v.push(x),
            _ => return false,
        }
        true
    }
}
