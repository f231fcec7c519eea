//! Test utilities for building DMAP streams and sample records
#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use superdarn_dmap::{ArrayData, ArrayValue, Field, Primitive, Record, ScalarValue};

/// Builder for raw DMAP byte streams, including deliberately broken ones
pub struct DmapBuilder {
    data: Vec<u8>,
}

impl DmapBuilder {
    /// Create a stream with the standard preamble (version 1)
    pub fn new() -> Self {
        Self::with_version(0x0001)
    }

    /// Create a stream with a specific preamble version
    pub fn with_version(version: u16) -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(b"DMAP");
        data.write_u16::<LittleEndian>(version).unwrap();
        Self { data }
    }

    /// Append a record, computing its declared length from its contents
    pub fn record(mut self, record: RawRecord) -> Self {
        let declared = record.declared_len.unwrap_or(record.encoded_len() as i32);
        self.data.write_i32::<LittleEndian>(declared).unwrap();
        self.data.write_i32::<LittleEndian>(record.scalar_count).unwrap();
        self.data.write_i32::<LittleEndian>(record.array_count).unwrap();
        self.data.extend_from_slice(&record.scalars);
        self.data.extend_from_slice(&record.arrays);
        self.data.extend_from_slice(&record.padding);
        self
    }

    /// Append arbitrary bytes
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

impl Default for DmapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Field bytes of one record, before its header is written
pub struct RawRecord {
    scalar_count: i32,
    array_count: i32,
    scalars: Vec<u8>,
    arrays: Vec<u8>,
    padding: Vec<u8>,
    declared_len: Option<i32>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self {
            scalar_count: 0,
            array_count: 0,
            scalars: Vec::new(),
            arrays: Vec::new(),
            padding: Vec::new(),
            declared_len: None,
        }
    }

    fn write_name(buf: &mut Vec<u8>, name: &[u8]) {
        buf.write_u32::<LittleEndian>(name.len() as u32).unwrap();
        buf.extend_from_slice(name);
    }

    /// Add a scalar with an arbitrary type code and value bytes
    pub fn scalar_raw(mut self, name: &[u8], code: u8, value: &[u8]) -> Self {
        Self::write_name(&mut self.scalars, name);
        self.scalars.push(code);
        self.scalars.extend_from_slice(value);
        self.scalar_count += 1;
        self
    }

    pub fn scalar_i32(self, name: &str, value: i32) -> Self {
        self.scalar_raw(name.as_bytes(), 3, &value.to_le_bytes())
    }

    pub fn scalar_char(self, name: &str, value: i8) -> Self {
        self.scalar_raw(name.as_bytes(), 1, &value.to_le_bytes())
    }

    pub fn scalar_string(self, name: &str, value: &str) -> Self {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(value.len() as u32).unwrap();
        bytes.extend_from_slice(value.as_bytes());
        self.scalar_raw(name.as_bytes(), 11, &bytes)
    }

    /// Add an array with an arbitrary type code, rank and dims
    pub fn array_raw(mut self, name: &str, code: u8, dims: &[i32], data: &[u8]) -> Self {
        Self::write_name(&mut self.arrays, name.as_bytes());
        self.arrays.push(code);
        self.arrays.push(dims.len() as u8);
        for &d in dims {
            self.arrays.write_i32::<LittleEndian>(d).unwrap();
        }
        self.arrays.extend_from_slice(data);
        self.array_count += 1;
        self
    }

    pub fn array_f32(self, name: &str, dims: &[i32], values: &[f32]) -> Self {
        let mut data = Vec::new();
        for &v in values {
            data.write_f32::<LittleEndian>(v).unwrap();
        }
        self.array_raw(name, 9, dims, &data)
    }

    /// Append unread bytes inside the record body
    pub fn padding(mut self, bytes: usize) -> Self {
        self.padding = vec![0; bytes];
        self
    }

    /// Override the length written into the record header
    pub fn declared_len(mut self, len: i32) -> Self {
        self.declared_len = Some(len);
        self
    }

    pub fn encoded_len(&self) -> usize {
        12 + self.scalars.len() + self.arrays.len() + self.padding.len()
    }
}

impl Default for RawRecord {
    fn default() -> Self {
        Self::new()
    }
}

pub const NUM_RANGES: usize = 5;
pub const PULSES: [u32; 7] = [0, 9, 12, 20, 22, 26, 27];
pub const LAGS: [[u32; 2]; 4] = [[0, 0], [26, 27], [20, 22], [9, 12]];

/// Real part of a correlation sample in the Borealis fixture.
pub fn acf_value(beam: usize, range: usize, lag: usize) -> f32 {
    (beam * 100 + range * 10 + lag) as f32
}

/// A Borealis rawacf record holding one averaging period over `beam_nums`
pub fn borealis_record(beam_nums: &[u32]) -> Record {
    borealis_builder(beam_nums).build().unwrap()
}

pub fn borealis_builder(beam_nums: &[u32]) -> superdarn_dmap::RecordBuilder {
    let beams = beam_nums.len();
    let lags = LAGS.len();

    let mut acfs = Vec::with_capacity(beams * NUM_RANGES * lags * 2);
    let mut xcfs = Vec::with_capacity(beams * NUM_RANGES * lags * 2);
    for beam in 0..beams {
        for range in 0..NUM_RANGES {
            for lag in 0..lags {
                acfs.push(acf_value(beam, range, lag));
                acfs.push(0.0);
                xcfs.push(-acf_value(beam, range, lag));
                xcfs.push(1.0);
            }
        }
    }

    borealis_header(beam_nums)
        .array("main_acfs", vec![beams, NUM_RANGES, lags, 2], ArrayData::Float(acfs))
        .array("xcfs", vec![beams, NUM_RANGES, lags, 2], ArrayData::Float(xcfs))
}

/// Fields every Borealis file type carries, for one averaging period over `beam_nums`
pub fn borealis_header(beam_nums: &[u32]) -> superdarn_dmap::RecordBuilder {
    let beams = beam_nums.len();
    let lags = LAGS.len();

    Record::builder()
        .scalar("borealis_git_hash", Primitive::String("v0.6-12-gdeadbee".into()))
        .scalar("experiment_id", Primitive::Long(3503))
        .scalar("experiment_name", Primitive::String("normalscan".into()))
        .scalar("experiment_comment", Primitive::String("".into()))
        .scalar("num_slices", Primitive::Long(1))
        .scalar("slice_id", Primitive::UInt(0))
        .scalar("station", Primitive::String("sas".into()))
        .scalar("num_sequences", Primitive::Long(2))
        .scalar("range_sep", Primitive::Float(44.96))
        .scalar("first_range_rtt", Primitive::Float(1200.0))
        .scalar("first_range", Primitive::Float(180.0))
        .scalar("rx_sample_rate", Primitive::Double(3333.3333))
        .scalar("scan_start_marker", Primitive::Char(1))
        .scalar("int_time", Primitive::Float(3.7))
        .scalar("tx_pulse_len", Primitive::UInt(300))
        .scalar("tau_spacing", Primitive::UInt(2400))
        .scalar("main_antenna_count", Primitive::UInt(16))
        .scalar("intf_antenna_count", Primitive::UInt(4))
        .scalar("freq", Primitive::UInt(10500))
        .array("pulses", vec![PULSES.len()], ArrayData::UInt(PULSES.to_vec()))
        .array(
            "lags",
            vec![lags, 2],
            ArrayData::UInt(LAGS.iter().flatten().copied().collect()),
        )
        .array(
            "sqn_timestamps",
            vec![2],
            ArrayData::Double(vec![1_700_000_000.25, 1_700_000_003.75]),
        )
        .array("beam_nums", vec![beams], ArrayData::UInt(beam_nums.to_vec()))
        .array(
            "beam_azms",
            vec![beams],
            ArrayData::Double(beam_nums.iter().map(|&b| -26.25 + 3.24 * b as f64).collect()),
        )
        .array("noise_at_freq", vec![2], ArrayData::Double(vec![12.5, 13.0]))
}

pub const NUM_SAMPS: usize = 3;
pub const ANTENNA_ARRAYS: [&str; 2] = ["main", "intf"];

/// Beamformed I/Q sample in the Borealis bfiq fixture; `k` walks the
/// interleaved re/im axis.
pub fn iq_value(array: usize, sequence: usize, beam: usize, k: usize) -> f32 {
    (array * 1000 + sequence * 100 + beam * 10 + k) as f32 + 0.5
}

/// A Borealis bfiq record holding one averaging period over `beam_nums`
pub fn borealis_bfiq_record(beam_nums: &[u32]) -> Record {
    borealis_bfiq_builder(beam_nums).build().unwrap()
}

pub fn borealis_bfiq_builder(beam_nums: &[u32]) -> superdarn_dmap::RecordBuilder {
    let beams = beam_nums.len();
    let sequences = 2;
    let width = 2 * NUM_SAMPS;

    let mut data = Vec::with_capacity(ANTENNA_ARRAYS.len() * sequences * beams * width);
    for array in 0..ANTENNA_ARRAYS.len() {
        for sequence in 0..sequences {
            for beam in 0..beams {
                for k in 0..width {
                    data.push(iq_value(array, sequence, beam, k));
                }
            }
        }
    }

    borealis_header(beam_nums)
        .scalar("num_samps", Primitive::UInt(NUM_SAMPS as u32))
        .scalar("num_ranges", Primitive::UInt(NUM_RANGES as u32))
        .array("blanked_samples", vec![3], ArrayData::UInt(vec![0, 27, 36]))
        .array(
            "antenna_arrays_order",
            vec![ANTENNA_ARRAYS.len()],
            ArrayData::String(ANTENNA_ARRAYS.iter().map(|a| a.to_string()).collect()),
        )
        .array(
            "data",
            vec![ANTENNA_ARRAYS.len(), sequences, beams, width],
            ArrayData::Float(data),
        )
}

/// A small record exercising every type tag, scalar and array
pub fn every_type_record() -> Record {
    Record::builder()
        .scalar("char", Primitive::Char(-5))
        .scalar("short", Primitive::Short(-1234))
        .scalar("int", Primitive::Int(123_456))
        .scalar("long", Primitive::Long(-9_000_000_000))
        .scalar("uchar", Primitive::UChar(250))
        .scalar("ushort", Primitive::UShort(65_000))
        .scalar("uint", Primitive::UInt(4_000_000_000))
        .scalar("ulong", Primitive::ULong(u64::MAX))
        .scalar("float", Primitive::Float(1.5))
        .scalar("double", Primitive::Double(-2.25e10))
        .scalar("string", Primitive::String("Saskatoon ✓".into()))
        .array("chars", vec![3], ArrayData::Char(vec![-1, 0, 1]))
        .array("shorts", vec![2, 3], ArrayData::Short(vec![1, 2, 3, 4, 5, 6]))
        .array("ints", vec![1, 2, 2], ArrayData::Int(vec![7, 8, 9, 10]))
        .array("longs", vec![2], ArrayData::Long(vec![i64::MIN, i64::MAX]))
        .array("uchars", vec![2], ArrayData::UChar(vec![0, 255]))
        .array("ushorts", vec![2], ArrayData::UShort(vec![0, 65_535]))
        .array("uints", vec![1], ArrayData::UInt(vec![42]))
        .array("ulongs", vec![1], ArrayData::ULong(vec![7]))
        .array("floats", vec![2, 1, 1, 2], ArrayData::Float(vec![0.5, -0.5, 1.0, 2.0]))
        .array("doubles", vec![2], ArrayData::Double(vec![1e-300, 1e300]))
        .array(
            "strings",
            vec![2, 2],
            ArrayData::String(vec!["a".into(), "".into(), "ccc".into(), "漢字".into()]),
        )
        .build()
        .unwrap()
}

/// Copy of `record` with `field` replacing the field of the same name (or appended)
pub fn with_field(record: &Record, field: Field) -> Record {
    let mut fields: Vec<Field> = record.fields().cloned().collect();
    match fields.iter().position(|f| f.name() == field.name()) {
        Some(idx) => fields[idx] = field,
        None => fields.push(field),
    }
    Record::from_fields(fields).unwrap()
}

/// Copy of `record` without the field called `name`
pub fn without_field(record: &Record, name: &str) -> Record {
    Record::from_fields(record.fields().filter(|f| f.name() != name).cloned().collect()).unwrap()
}

pub fn scalar_field(name: &str, value: Primitive) -> Field {
    Field::Scalar(ScalarValue::new(name, value))
}

pub fn array_field(name: &str, dims: Vec<usize>, data: ArrayData) -> Field {
    Field::Array(ArrayValue::new(name, dims, data).unwrap())
}
