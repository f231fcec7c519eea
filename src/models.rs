use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::profile::ProfileName;
use crate::types::{ArrayData, Primitive, TypeTag};

/// Largest array rank the format allows.
pub const MAX_RANK: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarValue {
    name: String,
    value: Primitive,
}

impl ScalarValue {
    pub fn new(name: impl Into<String>, value: Primitive) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> TypeTag {
        self.value.tag()
    }

    pub fn value(&self) -> &Primitive {
        &self.value
    }
}

/// A multi-dimensional array stored flat in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayValue {
    name: String,
    dims: Vec<usize>,
    data: ArrayData,
}

impl ArrayValue {
    /// Build an array, checking that `dims` is a valid shape for `data`.
    pub fn new(name: impl Into<String>, dims: Vec<usize>, data: ArrayData) -> Result<Self> {
        let name = name.into();
        if dims.is_empty() || dims.len() > MAX_RANK {
            return Err(Error::CorruptArrayShape {
                name,
                reason: format!("rank {} outside 1..={}", dims.len(), MAX_RANK),
            });
        }
        if dims.contains(&0) {
            return Err(Error::CorruptArrayShape {
                name,
                reason: format!("zero extent in {:?}", dims),
            });
        }
        let expected: usize = dims.iter().product();
        if expected != data.len() {
            return Err(Error::CorruptArrayShape {
                name,
                reason: format!("dims {:?} need {} elements, data has {}", dims, expected, data.len()),
            });
        }
        Ok(Self { name, dims, data })
    }

    /// Rank-1 array over all of `data`.
    pub fn vector(name: impl Into<String>, data: ArrayData) -> Result<Self> {
        let len = data.len();
        Self::new(name, vec![len], data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> TypeTag {
        self.data.tag()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Sub-array at `index` along the first axis, with that axis dropped.
    ///
    /// Slicing a rank-1 array yields a one-element rank-1 array.
    pub fn select_first_axis(&self, index: usize) -> Result<ArrayValue> {
        let outer = self.dims[0];
        if index >= outer {
            return Err(Error::CorruptArrayShape {
                name: self.name.clone(),
                reason: format!("index {} outside first axis of length {}", index, outer),
            });
        }
        let inner_dims: Vec<usize> = if self.dims.len() > 1 {
            self.dims[1..].to_vec()
        } else {
            vec![1]
        };
        let stride: usize = inner_dims.iter().product();
        let start = index * stride;
        ArrayValue::new(self.name.clone(), inner_dims, self.data.slice(start, start + stride))
    }

    fn nested_json(&self) -> serde_json::Value {
        let flat: Vec<serde_json::Value> = (0..self.data.len())
            .filter_map(|i| self.data.get(i))
            .map(|p| json!(p))
            .collect();
        nest(&flat, &self.dims)
    }
}

fn nest(flat: &[serde_json::Value], dims: &[usize]) -> serde_json::Value {
    if dims.len() <= 1 {
        return serde_json::Value::Array(flat.to_vec());
    }
    let stride: usize = dims[1..].iter().product();
    serde_json::Value::Array(flat.chunks(stride).map(|c| nest(c, &dims[1..])).collect())
}

/// One named field of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Field {
    Scalar(ScalarValue),
    Array(ArrayValue),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Field::Scalar(s) => s.name(),
            Field::Array(a) => a.name(),
        }
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            Field::Scalar(s) => s.tag(),
            Field::Array(a) => a.tag(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Field::Array(_))
    }
}

/// An ordered set of uniquely named fields.
///
/// Fields are kept in wire order: every scalar before every array, each
/// group in insertion order. Records are built once (by the decoder or a
/// [`RecordBuilder`]) and never modified afterwards; transformations produce
/// new records.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
    byte_len: Option<usize>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Record {
    pub fn builder() -> RecordBuilder {
        RecordBuilder::new()
    }

    /// Build a record from fields, rejecting duplicate names.
    ///
    /// Scalars are moved ahead of arrays; relative order within each group
    /// is preserved.
    pub fn from_fields(fields: Vec<Field>) -> Result<Self> {
        let (mut fields, arrays): (Vec<Field>, Vec<Field>) =
            fields.into_iter().partition(|f| !f.is_array());
        fields.extend(arrays);

        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if index.insert(field.name().to_string(), i).is_some() {
                return Err(Error::DuplicateField(field.name().to_string()));
            }
        }
        Ok(Self {
            fields,
            index,
            byte_len: None,
        })
    }

    pub(crate) fn with_byte_len(mut self, byte_len: usize) -> Self {
        self.byte_len = Some(byte_len);
        self
    }

    /// Encoded length in bytes, when this record came from the decoder.
    pub fn byte_len(&self) -> Option<usize> {
        self.byte_len
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn scalars(&self) -> impl Iterator<Item = &ScalarValue> {
        self.fields.iter().filter_map(|f| match f {
            Field::Scalar(s) => Some(s),
            Field::Array(_) => None,
        })
    }

    pub fn arrays(&self) -> impl Iterator<Item = &ArrayValue> {
        self.fields.iter().filter_map(|f| match f {
            Field::Array(a) => Some(a),
            Field::Scalar(_) => None,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn scalar(&self, name: &str) -> Option<&ScalarValue> {
        match self.get(name)? {
            Field::Scalar(s) => Some(s),
            Field::Array(_) => None,
        }
    }

    pub fn array(&self, name: &str) -> Option<&ArrayValue> {
        match self.get(name)? {
            Field::Array(a) => Some(a),
            Field::Scalar(_) => None,
        }
    }

    /// JSON object keyed by field name; arrays are nested by their dims.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = match field {
                Field::Scalar(s) => json!(s.value()),
                Field::Array(a) => a.nested_json(),
            };
            map.insert(field.name().to_string(), value);
        }
        serde_json::Value::Object(map)
    }

    /// Rebuild a record from its JSON view.
    ///
    /// A field named by `profile` takes the kind its rule gives. Other
    /// fields are inferred: strings stay strings, integers become `Int`
    /// when every value fits (then `Long`, then `ULong`), anything else
    /// becomes `Double`. Array dims come from the nesting, which must be
    /// rectangular and non-empty.
    pub fn from_json(value: &Value, profile: ProfileName) -> Result<Record> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid_json("record", "expected a JSON object"))?;
        let profile = profile.profile();

        let mut builder = Record::builder();
        for (name, value) in object {
            let ruled = profile.rule(name).map(|rule| rule.tag);
            if value.is_array() {
                let mut dims = Vec::new();
                let mut leaves = Vec::new();
                flatten_json(name, value, 0, &mut dims, &mut leaves)?;
                let tag = ruled.unwrap_or_else(|| infer_tag(&leaves));
                let mut data = ArrayData::with_capacity(tag, leaves.len());
                for leaf in leaves {
                    data.push(primitive_from_json(name, leaf, tag)?);
                }
                builder = builder.array(name.as_str(), dims, data);
            } else {
                let tag = ruled.unwrap_or_else(|| infer_tag(&[value]));
                builder = builder.scalar(name.as_str(), primitive_from_json(name, value, tag)?);
            }
        }
        builder.build()
    }
}

fn invalid_json(name: &str, reason: &str) -> Error {
    Error::InvalidFormat(format!("JSON field '{}': {}", name, reason))
}

/// Walk a nested JSON array, recording its dims and collecting leaves in
/// row-major order.
fn flatten_json<'v>(
    name: &str,
    value: &'v Value,
    depth: usize,
    dims: &mut Vec<usize>,
    leaves: &mut Vec<&'v Value>,
) -> Result<()> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(invalid_json(name, "empty array"));
            }
            match dims.get(depth) {
                Some(&n) if n == items.len() => {}
                None if depth == dims.len() && leaves.is_empty() => dims.push(items.len()),
                _ => return Err(invalid_json(name, "ragged array")),
            }
            for item in items {
                flatten_json(name, item, depth + 1, dims, leaves)?;
            }
        }
        leaf => {
            if depth != dims.len() {
                return Err(invalid_json(name, "ragged array"));
            }
            leaves.push(leaf);
        }
    }
    Ok(())
}

fn infer_tag(values: &[&Value]) -> TypeTag {
    if values.iter().any(|v| v.is_string()) {
        return TypeTag::String;
    }
    let ints: Option<Vec<i64>> = values.iter().map(|v| v.as_i64()).collect();
    match ints {
        Some(ints) if ints.iter().all(|&v| i32::try_from(v).is_ok()) => TypeTag::Int,
        Some(_) => TypeTag::Long,
        None if values.iter().all(|v| v.is_u64()) => TypeTag::ULong,
        None => TypeTag::Double,
    }
}

fn primitive_from_json(name: &str, value: &Value, tag: TypeTag) -> Result<Primitive> {
    let mismatch = || invalid_json(name, &format!("{} is not a valid {}", value, tag));
    let primitive = match tag {
        TypeTag::String => value.as_str().map(|s| Primitive::String(s.to_string())),
        TypeTag::Float => value.as_f64().map(|v| Primitive::Float(v as f32)),
        TypeTag::Double => value.as_f64().map(Primitive::Double),
        TypeTag::ULong => value.as_u64().map(Primitive::ULong),
        TypeTag::Char => value.as_i64().and_then(|v| i8::try_from(v).ok()).map(Primitive::Char),
        TypeTag::Short => value.as_i64().and_then(|v| i16::try_from(v).ok()).map(Primitive::Short),
        TypeTag::Int => value.as_i64().and_then(|v| i32::try_from(v).ok()).map(Primitive::Int),
        TypeTag::Long => value.as_i64().map(Primitive::Long),
        TypeTag::UChar => value.as_u64().and_then(|v| u8::try_from(v).ok()).map(Primitive::UChar),
        TypeTag::UShort => value.as_u64().and_then(|v| u16::try_from(v).ok()).map(Primitive::UShort),
        TypeTag::UInt => value.as_u64().and_then(|v| u32::try_from(v).ok()).map(Primitive::UInt),
    };
    primitive.ok_or_else(mismatch)
}

/// Incremental construction of a [`Record`].
///
/// Shape and duplicate-name errors are deferred to [`RecordBuilder::build`]
/// so calls can be chained.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    fields: Vec<Field>,
    error: Option<Error>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(mut self, name: impl Into<String>, value: Primitive) -> Self {
        self.fields.push(Field::Scalar(ScalarValue::new(name, value)));
        self
    }

    pub fn array(mut self, name: impl Into<String>, dims: Vec<usize>, data: ArrayData) -> Self {
        match ArrayValue::new(name, dims, data) {
            Ok(array) => self.fields.push(Field::Array(array)),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<Record> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Record::from_fields(self.fields)
    }
}
