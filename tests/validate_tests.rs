mod common;

use common::{
    array_field, borealis_bfiq_record, borealis_record, scalar_field, with_field, without_field,
};
use superdarn_dmap::profile::BOREALIS_RAWACF;
use superdarn_dmap::{
    convert, validate, validate_all, validate_with, ArrayData, Error, ErrorClass, Primitive,
    ProfileName, Record, TypeTag,
};

fn rawacf_record() -> Record {
    let borealis = borealis_record(&[0]);
    convert(&borealis, ProfileName::BorealisRawacf, ProfileName::Rawacf)
        .unwrap()
        .remove(0)
}

/// A two-station grid record with three merged vectors
fn grid_record() -> Record {
    let mut builder = Record::builder();
    for (prefix, minute) in [("start", 0), ("end", 2)] {
        builder = builder
            .scalar(format!("{}.year", prefix), Primitive::Short(2023))
            .scalar(format!("{}.month", prefix), Primitive::Short(11))
            .scalar(format!("{}.day", prefix), Primitive::Short(14))
            .scalar(format!("{}.hour", prefix), Primitive::Short(12))
            .scalar(format!("{}.minute", prefix), Primitive::Short(minute))
            .scalar(format!("{}.second", prefix), Primitive::Double(0.0));
    }
    for name in ["channel", "nvec", "major.revision", "minor.revision", "program.id", "gsct"] {
        builder = builder.array(name, vec![2], ArrayData::Short(vec![1, 2]));
    }
    for name in [
        "freq", "noise.mean", "noise.sd", "v.min", "v.max", "p.min", "p.max", "w.min", "w.max",
        "ve.min", "ve.max",
    ] {
        builder = builder.array(name, vec![2], ArrayData::Float(vec![0.0, 1.0]));
    }
    builder
        .array("stid", vec![2], ArrayData::Short(vec![5, 65]))
        .array("vector.mlat", vec![3], ArrayData::Float(vec![70.5, 71.5, 72.5]))
        .array("vector.mlon", vec![3], ArrayData::Float(vec![10.0, 12.0, 14.0]))
        .array("vector.stid", vec![3], ArrayData::Short(vec![5, 5, 65]))
        .array("vector.index", vec![3], ArrayData::Int(vec![1001, 1002, 2001]))
        .build()
        .unwrap()
}

fn map_record() -> Record {
    let mut builder = Record::builder();
    for field in grid_record().fields() {
        builder = builder.field(field.clone());
    }
    for name in [
        "map.major.revision", "map.minor.revision", "doping.level", "model.wt", "error.wt",
        "IMF.flag", "hemisphere", "fit.order",
    ] {
        builder = builder.scalar(name, Primitive::Short(1));
    }
    for name in ["latmin", "lon.shft", "lat.shft"] {
        builder = builder.scalar(name, Primitive::Float(60.0));
    }
    for name in [
        "chi.sqr", "chi.sqr.dat", "rms.err", "mlt.start", "mlt.end", "mlt.av", "pot.drop",
        "pot.drop.err", "pot.max", "pot.max.err", "pot.min", "pot.min.err",
    ] {
        builder = builder.scalar(name, Primitive::Double(1.0));
    }
    builder
        .scalar("source", Primitive::String("map_grd".into()))
        .scalar("model.angle", Primitive::String("Bz+".into()))
        .scalar("model.level", Primitive::String("2<BT<4".into()))
        .array("N", vec![4], ArrayData::Double(vec![0.0; 4]))
        .array("N+1", vec![4], ArrayData::Double(vec![1.0; 4]))
        .array("N+2", vec![4], ArrayData::Double(vec![2.0; 4]))
        .array("N+3", vec![4], ArrayData::Double(vec![3.0; 4]))
        .build()
        .unwrap()
}

// ============================================================================
// CONFORMING RECORDS
// ============================================================================

#[test]
fn test_borealis_fixture_is_valid() {
    let record = borealis_record(&[0, 1, 2]);
    assert!(validate(&record, ProfileName::BorealisRawacf).is_ok());
    assert!(validate_with(&record, &BOREALIS_RAWACF).is_ok());
}

#[test]
fn test_bfiq_fixture_is_valid() {
    let record = borealis_bfiq_record(&[0, 1]);
    assert!(validate(&record, ProfileName::BorealisBfiq).is_ok());
    assert!(matches!(
        validate(&record, ProfileName::BorealisRawacf),
        Err(Error::MissingField(name)) if name == "main_acfs"
    ));
}

#[test]
fn test_grid_and_map_records() {
    assert!(validate(&grid_record(), ProfileName::Grid).is_ok());
    assert!(validate(&map_record(), ProfileName::Grid).is_ok());
    assert!(validate(&map_record(), ProfileName::Map).is_ok());
    assert!(matches!(
        validate(&grid_record(), ProfileName::Map),
        Err(Error::MissingField(name)) if name == "map.major.revision"
    ));
}

#[test]
fn test_grid_columns_follow_station_count() {
    let record = with_field(&grid_record(), array_field("nvec", vec![3], ArrayData::Short(vec![1, 2, 3])));
    assert!(matches!(
        validate(&record, ProfileName::Grid),
        Err(Error::ShapeMismatch { name, .. }) if name == "nvec"
    ));

    let record = with_field(&grid_record(), array_field("vector.stid", vec![2], ArrayData::Short(vec![5, 5])));
    assert!(matches!(
        validate(&record, ProfileName::Grid),
        Err(Error::ShapeMismatch { name, .. }) if name == "vector.stid"
    ));
}

#[test]
fn test_any_record_satisfies_dmap_profile() {
    let empty = Record::builder().build().unwrap();
    assert!(validate(&empty, ProfileName::Dmap).is_ok());
    assert!(validate(&borealis_record(&[3]), ProfileName::Dmap).is_ok());
}

#[test]
fn test_extra_fields_are_allowed() {
    let record = with_field(
        &borealis_record(&[0]),
        scalar_field("site_note", Primitive::String("extra".into())),
    );
    assert!(validate(&record, ProfileName::BorealisRawacf).is_ok());
}

#[test]
fn test_optional_fields_may_be_absent() {
    let record = without_field(&borealis_record(&[0]), "xcfs");
    assert!(validate(&record, ProfileName::BorealisRawacf).is_ok());
}

#[test]
fn test_validation_is_repeatable() {
    let record = rawacf_record();
    let before = record.clone();
    assert!(validate(&record, ProfileName::Rawacf).is_ok());
    assert!(validate(&record, ProfileName::Rawacf).is_ok());
    assert_eq!(record, before);
}

// ============================================================================
// VIOLATIONS
// ============================================================================

#[test]
fn test_missing_field() {
    let record = without_field(&rawacf_record(), "pwr0");
    match validate(&record, ProfileName::Rawacf) {
        Err(Error::MissingField(name)) => assert_eq!(name, "pwr0"),
        other => panic!("expected MissingField, got {:?}", other),
    }
}

#[test]
fn test_type_mismatch() {
    let record = with_field(&borealis_record(&[0]), scalar_field("station", Primitive::Int(5)));
    match validate(&record, ProfileName::BorealisRawacf) {
        Err(Error::TypeMismatch { name, expected, actual }) => {
            assert_eq!(name, "station");
            assert_eq!(expected, TypeTag::String);
            assert_eq!(actual, TypeTag::Int);
        }
        other => panic!("expected TypeMismatch, got {:?}", other),
    }
}

#[test]
fn test_rank_two_where_rank_one_expected() {
    let record = with_field(
        &borealis_record(&[0]),
        array_field("pulses", vec![7, 1], ArrayData::UInt(vec![0, 9, 12, 20, 22, 26, 27])),
    );
    let err = validate(&record, ProfileName::BorealisRawacf).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
    match err {
        Error::ShapeMismatch { name, expected, actual } => {
            assert_eq!(name, "pulses");
            assert_eq!(expected, "[*]");
            assert_eq!(actual, "[7, 1]");
        }
        other => panic!("expected ShapeMismatch, got {:?}", other),
    }
}

#[test]
fn test_scalar_where_array_expected() {
    let record = with_field(&borealis_record(&[0]), scalar_field("pulses", Primitive::UInt(0)));
    assert!(matches!(
        validate(&record, ProfileName::BorealisRawacf),
        Err(Error::ShapeMismatch { name, .. }) if name == "pulses"
    ));
}

#[test]
fn test_extent_tied_to_scalar_value() {
    let record = with_field(
        &borealis_record(&[0]),
        array_field("sqn_timestamps", vec![3], ArrayData::Double(vec![0.0, 1.0, 2.0])),
    );
    assert!(matches!(
        validate(&record, ProfileName::BorealisRawacf),
        Err(Error::ShapeMismatch { name, .. }) if name == "sqn_timestamps"
    ));
}

#[test]
fn test_extent_tied_to_other_array() {
    let record = with_field(
        &borealis_record(&[0, 1]),
        array_field("beam_azms", vec![3], ArrayData::Double(vec![0.0, 1.0, 2.0])),
    );
    assert!(matches!(
        validate(&record, ProfileName::BorealisRawacf),
        Err(Error::ShapeMismatch { name, .. }) if name == "beam_azms"
    ));
}

#[test]
fn test_fixed_extent() {
    let record = rawacf_record();
    let ltab = with_field(&record, array_field("ltab", vec![2, 4], ArrayData::Short(vec![0; 8])));
    assert!(matches!(
        validate(&ltab, ProfileName::Rawacf),
        Err(Error::ShapeMismatch { name, .. }) if name == "ltab"
    ));
}

#[test]
fn test_validate_all_reports_every_violation_in_rule_order() {
    let record = without_field(&without_field(&rawacf_record(), "stid"), "pwr0");
    let record = with_field(&record, scalar_field("cp", Primitive::Int(1)));

    let errors = validate_all(&record, ProfileName::Rawacf);
    assert_eq!(errors.len(), 3);
    assert!(matches!(&errors[0], Error::TypeMismatch { name, .. } if name == "cp"));
    assert!(matches!(&errors[1], Error::MissingField(name) if name == "stid"));
    assert!(matches!(&errors[2], Error::MissingField(name) if name == "pwr0"));

    // validate stops at the first of them
    assert!(matches!(
        validate(&record, ProfileName::Rawacf),
        Err(Error::TypeMismatch { name, .. }) if name == "cp"
    ));
}

#[test]
fn test_profile_names_parse() {
    assert_eq!("rawacf".parse::<ProfileName>().unwrap(), ProfileName::Rawacf);
    assert_eq!(
        "borealis-rawacf".parse::<ProfileName>().unwrap(),
        ProfileName::BorealisRawacf
    );
    assert_eq!("map".parse::<ProfileName>().unwrap(), ProfileName::Map);
    assert!(matches!(
        "fitex".parse::<ProfileName>(),
        Err(Error::UnmappedValue { field, .. }) if field == "profile"
    ));
}
