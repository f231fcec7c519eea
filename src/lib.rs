//! # SuperDARN DMAP
//!
//! A Rust library for decoding, validating, converting and encoding
//! SuperDARN radar data stored in DMAP, the self-describing binary record
//! format used across the SuperDARN network, and for reshaping Borealis
//! instrument records into SuperDARN-compatible ones.
//!
//! ## Features
//!
//! - **Streaming decode**: records are decoded lazily from an in-memory or
//!   memory-mapped buffer, with every structural invariant checked
//! - **Round-trip encode**: `read(write(records)) == records`, field for field
//! - **Declarative profiles**: rawacf, fitacf, iqdat, grid, map and Borealis
//!   rawacf/bfiq rule tables drive validation
//! - **Borealis conversion**: one SuperDARN rawacf or iqdat record per
//!   Borealis beam
//! - **JSON view**: records to and from nested JSON
//! - **Parquet export**: one row per record, one column per field
//!
//! ## Quick Start
//!
//! ```no_run
//! use superdarn_dmap::{DmapFileReader, ProfileName};
//!
//! let reader = DmapFileReader::from_file("20240101.0000.00.sas.rawacf.dmap")?;
//! let records = reader.read_validated(ProfileName::Rawacf)?;
//!
//! println!("Read {} records", records.len());
//! # Ok::<(), superdarn_dmap::Error>(())
//! ```
//!
//! ## Converting Borealis Data
//!
//! ```no_run
//! use superdarn_dmap::{convert, write, DmapFileReader, ProfileName};
//!
//! let borealis = DmapFileReader::from_file("borealis.rawacf.dmap")?.read_all()?;
//! let mut rawacf = Vec::new();
//! for record in &borealis {
//!     rawacf.extend(convert(record, ProfileName::BorealisRawacf, ProfileName::Rawacf)?);
//! }
//! let bytes = write(&rawacf)?;
//! # Ok::<(), superdarn_dmap::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Decode errors confined to one record leave the reader positioned at the
//! next record, so the caller chooses between aborting and skipping:
//!
//! ```no_run
//! use superdarn_dmap::{read_lenient, ErrorClass};
//!
//! let bytes = std::fs::read("data.dmap")?;
//! let (records, errors) = read_lenient(&bytes);
//! for err in &errors {
//!     assert_eq!(err.class(), ErrorClass::Decode);
//!     eprintln!("skipped: {}", err);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Public API modules
pub mod convert;
pub mod error;
pub mod reader;
pub mod validate;
pub mod writer;

// Re-export commonly used types
pub use convert::{convert, convert_all};
pub use error::{Error, ErrorClass, Result};
pub use models::{ArrayValue, Field, Record, RecordBuilder, ScalarValue};
pub use profile::{FormatProfile, ProfileName};
pub use reader::{read, read_lenient, DmapFileReader};
pub use types::{ArrayData, Primitive, TypeTag};
pub use validate::{validate, validate_all, validate_with};
pub use writer::{write, DmapWriter, ParquetWriter, WriteStats};

// Internal modules (public but not part of the high-level API)
pub mod dmap;
pub mod formats;
pub mod models;
pub mod profile;
pub mod types;

pub use dmap::{decode_stream, encode_stream};
