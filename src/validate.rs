//! Profile-driven record validation.
//!
//! Validation only reads the record. Fields the profile does not mention
//! are allowed through untouched.

use crate::error::{Error, Result};
use crate::models::{Field, Record};
use crate::profile::{Extent, FieldRule, FormatProfile, ProfileName, Shape};

/// Check `record` against a named profile, stopping at the first violation.
pub fn validate(record: &Record, profile: ProfileName) -> Result<()> {
    validate_with(record, profile.profile())
}

/// Check `record` against an explicit profile, stopping at the first violation.
pub fn validate_with(record: &Record, profile: &FormatProfile) -> Result<()> {
    for rule in profile.rules() {
        check_rule(record, rule)?;
    }
    Ok(())
}

/// Every violation of `profile` in `record`, in rule order.
pub fn validate_all(record: &Record, profile: ProfileName) -> Vec<Error> {
    profile
        .profile()
        .rules()
        .filter_map(|rule| check_rule(record, rule).err())
        .collect()
}

fn check_rule(record: &Record, rule: &FieldRule) -> Result<()> {
    let field = match record.get(rule.name) {
        Some(field) => field,
        None if rule.required => return Err(Error::MissingField(rule.name.to_string())),
        None => return Ok(()),
    };

    if field.tag() != rule.tag {
        return Err(Error::TypeMismatch {
            name: rule.name.to_string(),
            expected: rule.tag,
            actual: field.tag(),
        });
    }

    let (extents, dims) = match (rule.shape, field) {
        (Shape::Scalar, Field::Scalar(_)) => return Ok(()),
        (Shape::Array(extents), Field::Array(array)) => (extents, array.dims()),
        _ => return Err(shape_mismatch(rule, field)),
    };
    if dims.len() != extents.len() {
        return Err(shape_mismatch(rule, field));
    }
    for (extent, &actual) in extents.iter().zip(dims) {
        if let Some(expected) = resolve_extent(record, extent) {
            if expected != actual {
                return Err(shape_mismatch(rule, field));
            }
        }
    }
    Ok(())
}

/// Concrete value an extent must take, or `None` when unconstrained.
///
/// A reference to a field that is absent or of the wrong kind leaves the
/// extent unconstrained; that field's own rule reports the problem.
fn resolve_extent(record: &Record, extent: &Extent) -> Option<usize> {
    match *extent {
        Extent::Any => None,
        Extent::Fixed(n) => Some(n),
        Extent::ValueOf(name) => scalar_count(record, name),
        Extent::LengthOf(name) => record.array(name).map(|a| a.dims()[0]),
        Extent::PairsOf(name) => scalar_count(record, name).and_then(|n| n.checked_mul(2)),
    }
}

fn scalar_count(record: &Record, name: &str) -> Option<usize> {
    record
        .scalar(name)
        .and_then(|s| s.value().as_i64())
        .and_then(|v| usize::try_from(v).ok())
}

fn shape_mismatch(rule: &FieldRule, field: &Field) -> Error {
    let actual = match field {
        Field::Scalar(_) => "scalar".to_string(),
        Field::Array(array) => format!("{:?}", array.dims()),
    };
    Error::ShapeMismatch {
        name: rule.name.to_string(),
        expected: rule.shape.to_string(),
        actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArrayData, Primitive, TypeTag};

    fn ranges_record(pwr0_dims: Vec<usize>, nrang: i16) -> Record {
        let count = pwr0_dims.iter().product();
        Record::builder()
            .scalar("nrang", Primitive::Short(nrang))
            .array("pwr0", pwr0_dims, ArrayData::Float(vec![0.0; count]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_value_of_extent() {
        let rule = crate::profile::RAWACF.rule("pwr0").unwrap();
        assert!(check_rule(&ranges_record(vec![5], 5), rule).is_ok());
        let err = check_rule(&ranges_record(vec![4], 5), rule).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { ref name, .. } if name == "pwr0"));
    }

    #[test]
    fn test_pairs_extent() {
        let samples = |width: usize| {
            Record::builder()
                .scalar("num_samps", Primitive::UInt(3))
                .array("iq", vec![width], ArrayData::Float(vec![0.0; width]))
                .build()
                .unwrap()
        };
        let rule = FieldRule {
            name: "iq",
            required: true,
            tag: TypeTag::Float,
            shape: Shape::Array(&[Extent::PairsOf("num_samps")]),
        };
        assert!(check_rule(&samples(6), &rule).is_ok());
        let err = check_rule(&samples(3), &rule).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { ref expected, .. } if expected == "[2*num_samps]"));
    }

    #[test]
    fn test_scalar_where_array_expected() {
        let record = Record::builder()
            .scalar("pwr0", Primitive::Float(1.0))
            .build()
            .unwrap();
        let rule = crate::profile::RAWACF.rule("pwr0").unwrap();
        let err = check_rule(&record, rule).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { ref actual, .. } if actual == "scalar"));
    }

    #[test]
    fn test_type_checked_before_shape() {
        let record = Record::builder()
            .array("pwr0", vec![2, 2], ArrayData::Double(vec![0.0; 4]))
            .build()
            .unwrap();
        let rule = crate::profile::RAWACF.rule("pwr0").unwrap();
        let err = check_rule(&record, rule).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch { expected: TypeTag::Float, actual: TypeTag::Double, .. }
        ));
    }
}
