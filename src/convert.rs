//! Borealis → SuperDARN conversion.
//!
//! A Borealis record holds every beam of an averaging period; SuperDARN
//! files hold one beam per record. [`convert`] fans one input record out
//! into one output record per entry of `beam_nums`, in that order.
//! Supported pairs are Borealis rawacf → rawacf and Borealis bfiq → iqdat.
//!
//! Output fields come from four places:
//!
//! - [`DERIVATIONS`], a fixed table of `source → target` with a transform,
//! - values computed from several inputs (time, station id, `pwr0`, …),
//! - [`constants`] that Borealis does not record,
//! - input scalars passed through under their own names.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::{Error, Result};
use crate::models::{ArrayValue, Field, Record, ScalarValue};
use crate::profile::{FormatProfile, ProfileName};
use crate::types::{ArrayData, Primitive, TypeTag};
use crate::validate::validate;

/// How a source field becomes a target field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Same value, converted to the target kind.
    Identity,
    /// Value multiplied by a factor.
    Scale(f64),
    /// `factor / value`.
    Reciprocal(f64),
    /// Element of an array at the beam index being converted.
    BeamSelect,
    /// Fixed element of an array.
    Element(usize),
    /// Integer part of a value in seconds.
    WholeSeconds,
    /// Fractional part of a value in seconds, as microseconds.
    FractionalMicros,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivation {
    pub source: &'static str,
    pub target: &'static str,
    pub tag: TypeTag,
    pub transform: Transform,
}

const fn derive(source: &'static str, target: &'static str, tag: TypeTag, transform: Transform) -> Derivation {
    Derivation {
        source,
        target,
        tag,
        transform,
    }
}

/// Header derivations. Every source is a field all Borealis file types carry.
pub const DERIVATIONS: &[Derivation] = &[
    derive("experiment_id", "cp", TypeTag::Short, Transform::Identity),
    derive("num_sequences", "nave", TypeTag::Short, Transform::Identity),
    derive("first_range_rtt", "lagfr", TypeTag::Short, Transform::Identity),
    derive("rx_sample_rate", "smsep", TypeTag::Short, Transform::Reciprocal(1e6)),
    derive("noise_at_freq", "noise.search", TypeTag::Float, Transform::Element(0)),
    derive("slice_id", "channel", TypeTag::Short, Transform::Identity),
    derive("beam_nums", "bmnum", TypeTag::Short, Transform::BeamSelect),
    derive("beam_azms", "bmazm", TypeTag::Float, Transform::BeamSelect),
    derive("scan_start_marker", "scan", TypeTag::Short, Transform::Identity),
    derive("int_time", "intt.sc", TypeTag::Short, Transform::WholeSeconds),
    derive("int_time", "intt.us", TypeTag::Int, Transform::FractionalMicros),
    derive("tx_pulse_len", "txpl", TypeTag::Short, Transform::Identity),
    derive("tau_spacing", "mpinc", TypeTag::Short, Transform::Identity),
    derive("first_range", "frang", TypeTag::Short, Transform::Identity),
    derive("range_sep", "rsep", TypeTag::Short, Transform::Identity),
    derive("freq", "tfreq", TypeTag::Short, Transform::Identity),
    derive("pulses", "ptab", TypeTag::Short, Transform::Identity),
    derive("lags", "ltab", TypeTag::Short, Transform::Identity),
];

/// Station code → SuperDARN station id.
const STATION_IDS: &[(&str, i16)] = &[
    ("gbr", 1),
    ("sch", 2),
    ("kap", 3),
    ("hal", 4),
    ("sas", 5),
    ("pgr", 6),
    ("kod", 7),
    ("sto", 8),
    ("pyk", 9),
    ("han", 10),
    ("inv", 64),
    ("rkn", 65),
    ("cly", 66),
];

/// `origin.code` value marking a record produced by conversion.
pub const ORIGIN_CODE_CONVERTED: i8 = 100;

/// Revision written into `rawacf.revision.*` and `iqdata.revision.*`.
pub const CONVERTED_REVISION: i32 = 255;

/// SuperDARN header fields Borealis does not record, with the values written for them.
pub fn constants() -> Vec<ScalarValue> {
    vec![
        ScalarValue::new("origin.code", Primitive::Char(ORIGIN_CODE_CONVERTED)),
        ScalarValue::new("txpow", Primitive::Short(9000)),
        ScalarValue::new("atten", Primitive::Short(0)),
        ScalarValue::new("ercod", Primitive::Short(0)),
        ScalarValue::new("stat.agc", Primitive::Short(0)),
        ScalarValue::new("stat.lopwr", Primitive::Short(0)),
        ScalarValue::new("noise.mean", Primitive::Float(0.0)),
        ScalarValue::new("offset", Primitive::Short(0)),
        ScalarValue::new("rxrise", Primitive::Short(0)),
        ScalarValue::new("mxpwr", Primitive::Int(1 << 30)),
        ScalarValue::new("lvmax", Primitive::Int(20000)),
    ]
}

fn rawacf_constants() -> Vec<ScalarValue> {
    vec![
        ScalarValue::new("rawacf.revision.major", Primitive::Int(CONVERTED_REVISION)),
        ScalarValue::new("rawacf.revision.minor", Primitive::Int(CONVERTED_REVISION)),
        ScalarValue::new("thr", Primitive::Float(0.0)),
    ]
}

/// Convert `record` from `source` to `target` format.
pub fn convert(record: &Record, source: ProfileName, target: ProfileName) -> Result<Vec<Record>> {
    match (source, target) {
        (ProfileName::BorealisRawacf, ProfileName::Rawacf) => borealis_rawacf_to_rawacf(record),
        (ProfileName::BorealisBfiq, ProfileName::Iqdat) => borealis_bfiq_to_iqdat(record),
        _ => Err(Error::UnsupportedConversion {
            from: source.to_string(),
            to: target.to_string(),
        }),
    }
}

/// Convert each record independently; results stay in input order.
pub fn convert_all(records: &[Record], source: ProfileName, target: ProfileName) -> Vec<Result<Vec<Record>>> {
    records.iter().map(|r| convert(r, source, target)).collect()
}

/// One SuperDARN rawacf record per Borealis beam.
pub fn borealis_rawacf_to_rawacf(record: &Record) -> Result<Vec<Record>> {
    validate(record, ProfileName::BorealisRawacf)?;

    let acfs = required_array(record, "main_acfs")?;
    let (nrang, mplgs) = (acfs.dims()[1], acfs.dims()[2]);
    let mut shared = header_fields(record, nrang, mplgs, record.contains("xcfs"))?;
    shared.extend(rawacf_constants().into_iter().map(Field::Scalar));

    fan_out(record, ProfileName::Rawacf, &shared, |beam| {
        let acfs = acfs.select_first_axis(beam)?;
        let mut fields = vec![
            Field::Array(lag_zero_power("pwr0", &acfs, nrang, mplgs)?),
            Field::Array(ArrayValue::vector(
                "slist",
                ArrayData::Short((0..nrang as i16).collect()),
            )?),
            Field::Array(rename(acfs, "acfd")?),
        ];
        if let Some(xcfs) = record.array("xcfs") {
            fields.push(Field::Array(rename(xcfs.select_first_axis(beam)?, "xcfd")?));
        }
        Ok(fields)
    })
}

/// One SuperDARN iqdat record per Borealis beam.
///
/// Samples are truncated to `i16` and laid out flat as
/// `[sequence][antenna array][sample][re, im]`.
pub fn borealis_bfiq_to_iqdat(record: &Record) -> Result<Vec<Record>> {
    validate(record, ProfileName::BorealisBfiq)?;

    let data = required_array(record, "data")?;
    let (chnnum, seqnum, beams, width) = match *data.dims() {
        [chnnum, seqnum, beams, width] => (chnnum, seqnum, beams, width),
        _ => return Err(unmapped("data", &format!("{:?}", data.dims()))),
    };
    let samples = match data.data() {
        ArrayData::Float(values) => values,
        _ => return Err(unmapped("data", "non-float data")),
    };

    let nrang = required_count(record, "num_ranges")?;
    let mplgs = required_array(record, "lags")?.dims()[0];
    let mut shared = header_fields(record, nrang, mplgs, chnnum > 1)?;
    shared.extend(sequence_fields(record, seqnum, chnnum, width / 2)?);

    fan_out(record, ProfileName::Iqdat, &shared, |beam| {
        let mut iq = Vec::with_capacity(seqnum * chnnum * width);
        for sequence in 0..seqnum {
            for antenna in 0..chnnum {
                let base = ((antenna * seqnum + sequence) * beams + beam) * width;
                for &v in &samples[base..base + width] {
                    match Primitive::checked_from_f64(TypeTag::Short, v as f64) {
                        Some(Primitive::Short(x)) => iq.push(x),
                        _ => return Err(unmapped("data", &v.to_string())),
                    }
                }
            }
        }
        Ok(vec![Field::Array(ArrayValue::vector("data", ArrayData::Short(iq))?)])
    })
}

/// Build one output record per beam and check each against `target`.
///
/// `shared` holds fields identical for every beam; `beam_fields` produces
/// the ones that differ.
fn fan_out<F>(record: &Record, target: ProfileName, shared: &[Field], beam_fields: F) -> Result<Vec<Record>>
where
    F: Fn(usize) -> Result<Vec<Field>>,
{
    let beams = required_array(record, "beam_nums")?.dims()[0];

    let mut out = Vec::with_capacity(beams);
    for beam in 0..beams {
        let converted = convert_beam(record, target.profile(), shared, beam_fields(beam)?, beam)?;
        validate(&converted, target).map_err(|err| Error::ConversionInvariantViolation {
            beam,
            source: Box::new(err),
        })?;
        out.push(converted);
    }
    Ok(out)
}

fn convert_beam(
    record: &Record,
    target: &FormatProfile,
    shared: &[Field],
    beam_fields: Vec<Field>,
    beam: usize,
) -> Result<Record> {
    let mut fields = shared.to_vec();

    for derivation in DERIVATIONS {
        let source = record
            .get(derivation.source)
            .ok_or_else(|| Error::MissingField(derivation.source.to_string()))?;
        fields.push(apply(derivation, source, beam)?);
    }
    fields.extend(beam_fields);

    let produced: Vec<String> = fields.iter().map(|f| f.name().to_string()).collect();
    for scalar in record.scalars() {
        if !produced.iter().any(|name| name == scalar.name()) {
            fields.push(Field::Scalar(scalar.clone()));
        }
    }

    order_like(target, &mut fields);
    Record::from_fields(fields)
}

/// Header scalars that are identical for every beam of one input record.
fn header_fields(record: &Record, nrang: usize, mplgs: usize, xcf: bool) -> Result<Vec<Field>> {
    let mppul = required_array(record, "pulses")?.dims()[0];

    let hash = required_string(record, "borealis_git_hash")?;
    let (major, minor) = revision_from_git_hash(hash).ok_or_else(|| unmapped("borealis_git_hash", hash))?;

    let station = required_string(record, "station")?;
    let stid = STATION_IDS
        .iter()
        .find(|(code, _)| *code == station)
        .map(|&(_, id)| id)
        .ok_or_else(|| unmapped("station", station))?;

    let start = first_sequence_time(record)?;
    let experiment = required_string(record, "experiment_name")?;

    let mut scalars = constants();
    scalars.extend([
        ScalarValue::new("radar.revision.major", Primitive::Char(major)),
        ScalarValue::new("radar.revision.minor", Primitive::Char(minor)),
        ScalarValue::new(
            "origin.time",
            Primitive::String(start.format("%a %b %e %H:%M:%S %Y").to_string()),
        ),
        ScalarValue::new(
            "origin.command",
            Primitive::String(format!("Borealis {} {}", hash, experiment)),
        ),
        ScalarValue::new("stid", Primitive::Short(stid)),
        ScalarValue::new("time.yr", Primitive::Short(start.year() as i16)),
        ScalarValue::new("time.mo", Primitive::Short(start.month() as i16)),
        ScalarValue::new("time.dy", Primitive::Short(start.day() as i16)),
        ScalarValue::new("time.hr", Primitive::Short(start.hour() as i16)),
        ScalarValue::new("time.mt", Primitive::Short(start.minute() as i16)),
        ScalarValue::new("time.sc", Primitive::Short(start.second() as i16)),
        ScalarValue::new("time.us", Primitive::Int(start.timestamp_subsec_micros() as i32)),
        ScalarValue::new("nrang", short_count("nrang", nrang)?),
        ScalarValue::new("mplgs", short_count("mplgs", mplgs)?),
        ScalarValue::new("mppul", short_count("mppul", mppul)?),
        ScalarValue::new("xcf", Primitive::Short(xcf as i16)),
        ScalarValue::new(
            "combf",
            Primitive::String(format!("Converted from Borealis experiment {}", experiment)),
        ),
    ]);

    Ok(scalars.into_iter().map(Field::Scalar).collect())
}

/// iqdat counts and per-sequence arrays, identical for every beam.
fn sequence_fields(record: &Record, seqnum: usize, chnnum: usize, smpnum: usize) -> Result<Vec<Field>> {
    let first_range = required_f64(record, "first_range")?;
    let range_sep = required_f64(record, "range_sep")?;
    if range_sep <= 0.0 {
        return Err(unmapped("range_sep", &range_sep.to_string()));
    }
    let skpnum = (first_range / range_sep).ceil();
    let skpnum = match Primitive::checked_from_f64(TypeTag::Int, skpnum) {
        Some(Primitive::Int(n)) => n,
        _ => return Err(unmapped("skpnum", &skpnum.to_string())),
    };

    let sequence_len = chnnum
        .checked_mul(2 * smpnum)
        .ok_or_else(|| unmapped("tsze", "overflow"))?;
    let tsze = int_count("tsze", sequence_len)?;

    let mut tsc = Vec::with_capacity(seqnum);
    let mut tus = Vec::with_capacity(seqnum);
    for t in sequence_timestamps(record)? {
        let whole = t.floor();
        match Primitive::checked_from_f64(TypeTag::Int, whole) {
            Some(Primitive::Int(seconds)) => tsc.push(seconds),
            _ => return Err(unmapped("sqn_timestamps", &t.to_string())),
        }
        tus.push(((t - whole) * 1e6).round().min(999_999.0) as i32);
    }

    let noise = required_array(record, "noise_at_freq")?
        .data()
        .to_f64_vec()
        .ok_or_else(|| unmapped("noise_at_freq", "string"))?;

    let toff = (0..seqnum)
        .map(|s| int_count("toff", s * sequence_len))
        .collect::<Result<Vec<i32>>>()?;

    let revision = |name: &str| ScalarValue::new(name, Primitive::Int(CONVERTED_REVISION));
    let fields = vec![
        Field::Scalar(revision("iqdata.revision.major")),
        Field::Scalar(revision("iqdata.revision.minor")),
        Field::Scalar(ScalarValue::new("seqnum", Primitive::Int(int_count("seqnum", seqnum)?))),
        Field::Scalar(ScalarValue::new("chnnum", Primitive::Int(int_count("chnnum", chnnum)?))),
        Field::Scalar(ScalarValue::new("smpnum", Primitive::Int(int_count("smpnum", smpnum)?))),
        Field::Scalar(ScalarValue::new("skpnum", Primitive::Int(skpnum))),
        Field::Array(ArrayValue::vector("tsc", ArrayData::Int(tsc))?),
        Field::Array(ArrayValue::vector("tus", ArrayData::Int(tus))?),
        Field::Array(ArrayValue::vector("tatten", ArrayData::Short(vec![0; seqnum]))?),
        Field::Array(ArrayValue::vector(
            "tnoise",
            ArrayData::Float(noise.iter().map(|&n| n as f32).collect()),
        )?),
        Field::Array(ArrayValue::vector("toff", ArrayData::Int(toff))?),
        Field::Array(ArrayValue::vector("tsze", ArrayData::Int(vec![tsze; seqnum]))?),
    ];
    Ok(fields)
}

fn apply(derivation: &Derivation, source: &Field, beam: usize) -> Result<Field> {
    let target = derivation.target;
    let value = match (source, derivation.transform) {
        (Field::Array(array), Transform::Identity) => {
            let data = array
                .data()
                .checked_cast(derivation.tag)
                .ok_or_else(|| unmapped(target, "element out of range"))?;
            return Ok(Field::Array(ArrayValue::new(target, array.dims().to_vec(), data)?));
        }
        (Field::Array(array), Transform::BeamSelect) => element(array, beam)?,
        (Field::Array(array), Transform::Element(index)) => element(array, index)?,
        (Field::Scalar(scalar), transform) => {
            let v = scalar
                .value()
                .as_f64()
                .ok_or_else(|| unmapped(derivation.source, "string"))?;
            match transform {
                Transform::Identity => v,
                Transform::Scale(factor) => v * factor,
                Transform::Reciprocal(factor) if v != 0.0 => factor / v,
                Transform::Reciprocal(_) => return Err(unmapped(derivation.source, "0")),
                Transform::WholeSeconds => v.floor(),
                Transform::FractionalMicros => ((v - v.floor()) * 1e6).round(),
                Transform::BeamSelect | Transform::Element(_) => {
                    return Err(Error::ShapeMismatch {
                        name: derivation.source.to_string(),
                        expected: "array".to_string(),
                        actual: "scalar".to_string(),
                    })
                }
            }
        }
        (Field::Array(array), _) => {
            return Err(Error::ShapeMismatch {
                name: derivation.source.to_string(),
                expected: "scalar".to_string(),
                actual: format!("{:?}", array.dims()),
            })
        }
    };

    let primitive = Primitive::checked_from_f64(derivation.tag, value)
        .ok_or_else(|| unmapped(target, &value.to_string()))?;
    Ok(Field::Scalar(ScalarValue::new(target, primitive)))
}

fn element(array: &ArrayValue, index: usize) -> Result<f64> {
    array
        .data()
        .get(index)
        .and_then(|p| p.as_f64())
        .ok_or_else(|| Error::ShapeMismatch {
            name: array.name().to_string(),
            expected: format!("element {}", index),
            actual: format!("{:?}", array.dims()),
        })
}

/// Magnitude of the lag-0 correlation for each range of a `[ranges, lags, 2]` slice.
fn lag_zero_power(name: &str, acfs: &ArrayValue, nrang: usize, mplgs: usize) -> Result<ArrayValue> {
    let values = match acfs.data() {
        ArrayData::Float(values) => values,
        _ => return Err(unmapped("main_acfs", "non-float data")),
    };
    let power = (0..nrang)
        .map(|range| {
            let base = range * mplgs * 2;
            values[base].hypot(values[base + 1])
        })
        .collect();
    ArrayValue::vector(name, ArrayData::Float(power))
}

fn rename(array: ArrayValue, name: &str) -> Result<ArrayValue> {
    ArrayValue::new(name, array.dims().to_vec(), array.data().clone())
}

/// Sort fields into the rule order of `profile`; fields it does not name go last.
fn order_like(profile: &FormatProfile, fields: &mut [Field]) {
    let position = |name: &str| profile.rules().position(|r| r.name == name).unwrap_or(usize::MAX);
    fields.sort_by_key(|f| position(f.name()));
}

fn short_count(name: &str, n: usize) -> Result<Primitive> {
    i16::try_from(n)
        .map(Primitive::Short)
        .map_err(|_| unmapped(name, &n.to_string()))
}

fn int_count(name: &str, n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| unmapped(name, &n.to_string()))
}

fn required_count(record: &Record, name: &str) -> Result<usize> {
    record
        .scalar(name)
        .and_then(|s| s.value().as_i64())
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| Error::MissingField(name.to_string()))
}

fn required_f64(record: &Record, name: &str) -> Result<f64> {
    record
        .scalar(name)
        .and_then(|s| s.value().as_f64())
        .ok_or_else(|| Error::MissingField(name.to_string()))
}

fn required_array<'r>(record: &'r Record, name: &str) -> Result<&'r ArrayValue> {
    record.array(name).ok_or_else(|| Error::MissingField(name.to_string()))
}

fn required_string<'r>(record: &'r Record, name: &str) -> Result<&'r str> {
    record
        .scalar(name)
        .and_then(|s| s.value().as_str())
        .ok_or_else(|| Error::MissingField(name.to_string()))
}

fn unmapped(field: &str, value: &str) -> Error {
    Error::UnmappedValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Sequence start times in epoch seconds; every one must be finite.
fn sequence_timestamps(record: &Record) -> Result<Vec<f64>> {
    let times = required_array(record, "sqn_timestamps")?
        .data()
        .to_f64_vec()
        .ok_or_else(|| unmapped("sqn_timestamps", "string"))?;
    match times.iter().find(|t| !t.is_finite()) {
        Some(bad) => Err(unmapped("sqn_timestamps", &bad.to_string())),
        None => Ok(times),
    }
}

fn first_sequence_time(record: &Record) -> Result<DateTime<Utc>> {
    let seconds = element(required_array(record, "sqn_timestamps")?, 0)?;
    if !seconds.is_finite() {
        return Err(unmapped("sqn_timestamps", &seconds.to_string()));
    }
    let whole = seconds.floor();
    let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos).ok_or_else(|| unmapped("sqn_timestamps", &seconds.to_string()))
}

/// Release numbers from a `git describe` string such as `v0.6-42-gabc123`.
fn revision_from_git_hash(hash: &str) -> Option<(i8, i8)> {
    let start = hash.find('v')?;
    let rest = &hash[start + 1..];
    let (major, rest) = rest.split_once('.')?;
    let minor: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    Some((major.parse().ok()?, minor.parse().ok()?))
}
