//! Declarative field rules for each record flavour.
//!
//! A profile never comes from the stream: callers pick one by
//! [`ProfileName`] and the validator walks its rule table. Adding a flavour
//! means adding a table here, not new control flow.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::types::TypeTag;

/// Constraint on one array extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    Any,
    Fixed(usize),
    /// Equal to the integer value of the named scalar field.
    ValueOf(&'static str),
    /// Equal to the first extent of the named array field.
    LengthOf(&'static str),
    /// Twice the integer value of the named scalar field: interleaved
    /// real/imaginary pairs.
    PairsOf(&'static str),
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extent::Any => f.write_str("*"),
            Extent::Fixed(n) => write!(f, "{}", n),
            Extent::ValueOf(name) => f.write_str(name),
            Extent::LengthOf(name) => write!(f, "len({})", name),
            Extent::PairsOf(name) => write!(f, "2*{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    /// Array whose rank is the number of extents given.
    Array(&'static [Extent]),
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => f.write_str("scalar"),
            Shape::Array(extents) => {
                let parts: Vec<String> = extents.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub tag: TypeTag,
    pub shape: Shape,
}

const fn scalar(name: &'static str, tag: TypeTag) -> FieldRule {
    FieldRule {
        name,
        required: true,
        tag,
        shape: Shape::Scalar,
    }
}

const fn array(name: &'static str, tag: TypeTag, extents: &'static [Extent]) -> FieldRule {
    FieldRule {
        name,
        required: true,
        tag,
        shape: Shape::Array(extents),
    }
}

const fn optional(rule: FieldRule) -> FieldRule {
    FieldRule {
        required: false,
        ..rule
    }
}

/// A named, static set of field rules.
#[derive(Debug)]
pub struct FormatProfile {
    pub name: ProfileName,
    groups: &'static [&'static [FieldRule]],
}

impl FormatProfile {
    pub fn rules(&self) -> impl Iterator<Item = &'static FieldRule> {
        self.groups.iter().flat_map(|group| group.iter())
    }

    pub fn rule(&self, name: &str) -> Option<&'static FieldRule> {
        self.rules().find(|rule| rule.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileName {
    /// Plain DMAP: structure only, no field requirements.
    Dmap,
    Rawacf,
    Fitacf,
    Iqdat,
    Grid,
    Map,
    BorealisRawacf,
    BorealisBfiq,
}

impl ProfileName {
    pub const ALL: [ProfileName; 8] = [
        ProfileName::Dmap,
        ProfileName::Rawacf,
        ProfileName::Fitacf,
        ProfileName::Iqdat,
        ProfileName::Grid,
        ProfileName::Map,
        ProfileName::BorealisRawacf,
        ProfileName::BorealisBfiq,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileName::Dmap => "dmap",
            ProfileName::Rawacf => "rawacf",
            ProfileName::Fitacf => "fitacf",
            ProfileName::Iqdat => "iqdat",
            ProfileName::Grid => "grid",
            ProfileName::Map => "map",
            ProfileName::BorealisRawacf => "borealis-rawacf",
            ProfileName::BorealisBfiq => "borealis-bfiq",
        }
    }

    pub fn profile(self) -> &'static FormatProfile {
        match self {
            ProfileName::Dmap => &DMAP,
            ProfileName::Rawacf => &RAWACF,
            ProfileName::Fitacf => &FITACF,
            ProfileName::Iqdat => &IQDAT,
            ProfileName::Grid => &GRID,
            ProfileName::Map => &MAP,
            ProfileName::BorealisRawacf => &BOREALIS_RAWACF,
            ProfileName::BorealisBfiq => &BOREALIS_BFIQ,
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProfileName::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::UnmappedValue {
                field: "profile".to_string(),
                value: s.to_string(),
            })
    }
}

use Extent::{Any, Fixed, LengthOf, PairsOf, ValueOf};
use TypeTag::{Char, Double, Float, Int, Long, Short, UInt};

pub static DMAP: FormatProfile = FormatProfile {
    name: ProfileName::Dmap,
    groups: &[],
};

/// Header scalars shared by every SuperDARN record flavour.
const SUPERDARN_HEADER: &[FieldRule] = &[
    scalar("radar.revision.major", Char),
    scalar("radar.revision.minor", Char),
    scalar("origin.code", Char),
    scalar("origin.time", TypeTag::String),
    scalar("origin.command", TypeTag::String),
    scalar("cp", Short),
    scalar("stid", Short),
    scalar("time.yr", Short),
    scalar("time.mo", Short),
    scalar("time.dy", Short),
    scalar("time.hr", Short),
    scalar("time.mt", Short),
    scalar("time.sc", Short),
    scalar("time.us", Int),
    scalar("txpow", Short),
    scalar("nave", Short),
    scalar("atten", Short),
    scalar("lagfr", Short),
    scalar("smsep", Short),
    scalar("ercod", Short),
    scalar("stat.agc", Short),
    scalar("stat.lopwr", Short),
    scalar("noise.search", Float),
    scalar("noise.mean", Float),
    scalar("channel", Short),
    scalar("bmnum", Short),
    scalar("bmazm", Float),
    scalar("scan", Short),
    scalar("offset", Short),
    scalar("rxrise", Short),
    scalar("intt.sc", Short),
    scalar("intt.us", Int),
    scalar("txpl", Short),
    scalar("mpinc", Short),
    scalar("mppul", Short),
    scalar("mplgs", Short),
    optional(scalar("mplgexs", Short)),
    optional(scalar("ifmode", Short)),
    scalar("nrang", Short),
    scalar("frang", Short),
    scalar("rsep", Short),
    scalar("xcf", Short),
    scalar("tfreq", Short),
    scalar("mxpwr", Int),
    scalar("lvmax", Int),
    scalar("combf", TypeTag::String),
];

const PULSE_TABLES: &[FieldRule] = &[
    array("ptab", Short, &[ValueOf("mppul")]),
    array("ltab", Short, &[Any, Fixed(2)]),
];

const RAWACF_FIELDS: &[FieldRule] = &[
    scalar("rawacf.revision.major", Int),
    scalar("rawacf.revision.minor", Int),
    scalar("thr", Float),
    array("pwr0", Float, &[ValueOf("nrang")]),
    optional(array("slist", Short, &[Any])),
    optional(array("acfd", Float, &[LengthOf("slist"), ValueOf("mplgs"), Fixed(2)])),
    optional(array("xcfd", Float, &[LengthOf("slist"), ValueOf("mplgs"), Fixed(2)])),
];

const PER_RANGE: &[Extent] = &[LengthOf("slist")];

const FITACF_FIELDS: &[FieldRule] = &[
    scalar("fitacf.revision.major", Int),
    scalar("fitacf.revision.minor", Int),
    scalar("noise.sky", Float),
    scalar("noise.lag0", Float),
    scalar("noise.vel", Float),
    array("pwr0", Float, &[ValueOf("nrang")]),
    optional(array("slist", Short, &[Any])),
    optional(array("nlag", Short, PER_RANGE)),
    optional(array("qflg", Char, PER_RANGE)),
    optional(array("gflg", Char, PER_RANGE)),
    optional(array("p_l", Float, PER_RANGE)),
    optional(array("p_l_e", Float, PER_RANGE)),
    optional(array("p_s", Float, PER_RANGE)),
    optional(array("p_s_e", Float, PER_RANGE)),
    optional(array("v", Float, PER_RANGE)),
    optional(array("v_e", Float, PER_RANGE)),
    optional(array("w_l", Float, PER_RANGE)),
    optional(array("w_l_e", Float, PER_RANGE)),
    optional(array("w_s", Float, PER_RANGE)),
    optional(array("w_s_e", Float, PER_RANGE)),
    optional(array("sd_l", Float, PER_RANGE)),
    optional(array("sd_s", Float, PER_RANGE)),
    optional(array("sd_phi", Float, PER_RANGE)),
];

const PER_SEQUENCE: &[Extent] = &[ValueOf("seqnum")];

const IQDAT_FIELDS: &[FieldRule] = &[
    scalar("iqdata.revision.major", Int),
    scalar("iqdata.revision.minor", Int),
    scalar("seqnum", Int),
    scalar("chnnum", Int),
    scalar("smpnum", Int),
    scalar("skpnum", Int),
    array("tsc", Int, PER_SEQUENCE),
    array("tus", Int, PER_SEQUENCE),
    array("tatten", Short, PER_SEQUENCE),
    array("tnoise", Float, PER_SEQUENCE),
    array("toff", Int, PER_SEQUENCE),
    array("tsze", Int, PER_SEQUENCE),
    array("data", Short, &[Any]),
];

pub static RAWACF: FormatProfile = FormatProfile {
    name: ProfileName::Rawacf,
    groups: &[SUPERDARN_HEADER, PULSE_TABLES, RAWACF_FIELDS],
};

pub static FITACF: FormatProfile = FormatProfile {
    name: ProfileName::Fitacf,
    groups: &[SUPERDARN_HEADER, PULSE_TABLES, FITACF_FIELDS],
};

pub static IQDAT: FormatProfile = FormatProfile {
    name: ProfileName::Iqdat,
    groups: &[SUPERDARN_HEADER, PULSE_TABLES, IQDAT_FIELDS],
};

/// Correlation arrays: `[beams, ranges, lags, re/im]`.
const CORRELATION: &[Extent] = &[LengthOf("beam_nums"), Any, LengthOf("lags"), Fixed(2)];

/// Fields every Borealis file type records for an averaging period.
const BOREALIS_COMMON: &[FieldRule] = &[
    scalar("borealis_git_hash", TypeTag::String),
    scalar("experiment_id", Long),
    scalar("experiment_name", TypeTag::String),
    optional(scalar("experiment_comment", TypeTag::String)),
    optional(scalar("slice_comment", TypeTag::String)),
    scalar("num_slices", Long),
    scalar("slice_id", UInt),
    scalar("station", TypeTag::String),
    scalar("num_sequences", Long),
    scalar("range_sep", Float),
    scalar("first_range_rtt", Float),
    scalar("first_range", Float),
    scalar("rx_sample_rate", Double),
    scalar("scan_start_marker", Char),
    scalar("int_time", Float),
    scalar("tx_pulse_len", UInt),
    scalar("tau_spacing", UInt),
    scalar("main_antenna_count", UInt),
    scalar("intf_antenna_count", UInt),
    scalar("freq", UInt),
    array("pulses", UInt, &[Any]),
    array("lags", UInt, &[Any, Fixed(2)]),
    array("sqn_timestamps", Double, &[ValueOf("num_sequences")]),
    array("beam_nums", UInt, &[Any]),
    array("beam_azms", Double, &[LengthOf("beam_nums")]),
    array("noise_at_freq", Double, &[ValueOf("num_sequences")]),
];

const BOREALIS_RAWACF_FIELDS: &[FieldRule] = &[
    optional(scalar("averaging_method", TypeTag::String)),
    array("main_acfs", Float, CORRELATION),
    optional(array("intf_acfs", Float, CORRELATION)),
    optional(array("xcfs", Float, CORRELATION)),
];

pub static BOREALIS_RAWACF: FormatProfile = FormatProfile {
    name: ProfileName::BorealisRawacf,
    groups: &[BOREALIS_COMMON, BOREALIS_RAWACF_FIELDS],
};

const BOREALIS_BFIQ_FIELDS: &[FieldRule] = &[
    scalar("num_samps", UInt),
    scalar("num_ranges", UInt),
    optional(array("pulse_phase_offset", Float, &[Any])),
    array("blanked_samples", UInt, &[Any]),
    array("antenna_arrays_order", TypeTag::String, &[Any]),
    // [antenna arrays, sequences, beams, re/im samples]
    array(
        "data",
        Float,
        &[
            LengthOf("antenna_arrays_order"),
            ValueOf("num_sequences"),
            LengthOf("beam_nums"),
            PairsOf("num_samps"),
        ],
    ),
];

pub static BOREALIS_BFIQ: FormatProfile = FormatProfile {
    name: ProfileName::BorealisBfiq,
    groups: &[BOREALIS_COMMON, BOREALIS_BFIQ_FIELDS],
};

const GRID_TIME: &[FieldRule] = &[
    scalar("start.year", Short),
    scalar("start.month", Short),
    scalar("start.day", Short),
    scalar("start.hour", Short),
    scalar("start.minute", Short),
    scalar("start.second", Double),
    scalar("end.year", Short),
    scalar("end.month", Short),
    scalar("end.day", Short),
    scalar("end.hour", Short),
    scalar("end.minute", Short),
    scalar("end.second", Double),
];

const PER_STATION: &[Extent] = &[LengthOf("stid")];
const PER_VECTOR: &[Extent] = &[LengthOf("vector.mlat")];

const GRID_FIELDS: &[FieldRule] = &[
    array("stid", Short, &[Any]),
    array("channel", Short, PER_STATION),
    array("nvec", Short, PER_STATION),
    array("freq", Float, PER_STATION),
    array("major.revision", Short, PER_STATION),
    array("minor.revision", Short, PER_STATION),
    array("program.id", Short, PER_STATION),
    array("noise.mean", Float, PER_STATION),
    array("noise.sd", Float, PER_STATION),
    array("gsct", Short, PER_STATION),
    array("v.min", Float, PER_STATION),
    array("v.max", Float, PER_STATION),
    array("p.min", Float, PER_STATION),
    array("p.max", Float, PER_STATION),
    array("w.min", Float, PER_STATION),
    array("w.max", Float, PER_STATION),
    array("ve.min", Float, PER_STATION),
    array("ve.max", Float, PER_STATION),
    optional(array("vector.mlat", Float, &[Any])),
    optional(array("vector.mlon", Float, PER_VECTOR)),
    optional(array("vector.kvect", Float, PER_VECTOR)),
    optional(array("vector.stid", Short, PER_VECTOR)),
    optional(array("vector.channel", Short, PER_VECTOR)),
    optional(array("vector.index", Int, PER_VECTOR)),
    optional(array("vector.vel.median", Float, PER_VECTOR)),
    optional(array("vector.vel.sd", Float, PER_VECTOR)),
    optional(array("vector.pwr.median", Float, PER_VECTOR)),
    optional(array("vector.pwr.sd", Float, PER_VECTOR)),
    optional(array("vector.wdt.median", Float, PER_VECTOR)),
    optional(array("vector.wdt.sd", Float, PER_VECTOR)),
];

pub static GRID: FormatProfile = FormatProfile {
    name: ProfileName::Grid,
    groups: &[GRID_TIME, GRID_FIELDS],
};

const PER_COEFFICIENT: &[Extent] = &[LengthOf("N")];
const PER_MODEL_VECTOR: &[Extent] = &[LengthOf("model.mlat")];

const MAP_FIELDS: &[FieldRule] = &[
    scalar("map.major.revision", Short),
    scalar("map.minor.revision", Short),
    scalar("source", TypeTag::String),
    scalar("doping.level", Short),
    scalar("model.wt", Short),
    scalar("error.wt", Short),
    scalar("IMF.flag", Short),
    optional(scalar("IMF.delay", Short)),
    optional(scalar("IMF.Bx", Double)),
    optional(scalar("IMF.By", Double)),
    optional(scalar("IMF.Bz", Double)),
    optional(scalar("IMF.Vx", Double)),
    optional(scalar("IMF.tilt", Double)),
    optional(scalar("IMF.Kp", Double)),
    scalar("model.angle", TypeTag::String),
    scalar("model.level", TypeTag::String),
    scalar("hemisphere", Short),
    optional(scalar("noigrf", Short)),
    scalar("fit.order", Short),
    scalar("latmin", Float),
    scalar("chi.sqr", Double),
    scalar("chi.sqr.dat", Double),
    scalar("rms.err", Double),
    scalar("lon.shft", Float),
    scalar("lat.shft", Float),
    scalar("mlt.start", Double),
    scalar("mlt.end", Double),
    scalar("mlt.av", Double),
    scalar("pot.drop", Double),
    scalar("pot.drop.err", Double),
    scalar("pot.max", Double),
    scalar("pot.max.err", Double),
    scalar("pot.min", Double),
    scalar("pot.min.err", Double),
    optional(array("model.mlat", Float, &[Any])),
    optional(array("model.mlon", Float, PER_MODEL_VECTOR)),
    optional(array("model.kvect", Float, PER_MODEL_VECTOR)),
    optional(array("model.vel.median", Float, PER_MODEL_VECTOR)),
    array("N", Double, &[Any]),
    array("N+1", Double, PER_COEFFICIENT),
    array("N+2", Double, PER_COEFFICIENT),
    array("N+3", Double, PER_COEFFICIENT),
    optional(array("boundary.mlat", Float, &[Any])),
    optional(array("boundary.mlon", Float, &[LengthOf("boundary.mlat")])),
];

pub static MAP: FormatProfile = FormatProfile {
    name: ProfileName::Map,
    groups: &[GRID_TIME, GRID_FIELDS, MAP_FIELDS],
};
