//! High-level API for reading DMAP files.

use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use crate::dmap::{DmapReader, RecordIterator};
use crate::error::{Error, Result};
use crate::models::Record;
use crate::profile::ProfileName;
use crate::validate::validate;

#[derive(Debug)]
enum Buffer {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Buffer::Owned(data) => data,
            Buffer::Mapped(map) => map,
        }
    }
}

/// A reader for DMAP files that provides a high-level API for decoding.
///
/// # Examples
///
/// ```no_run
/// use superdarn_dmap::DmapFileReader;
///
/// let reader = DmapFileReader::from_file("20240101.sas.rawacf.dmap")?;
/// let records = reader.read_all()?;
/// println!("Read {} records", records.len());
/// # Ok::<(), superdarn_dmap::Error>(())
/// ```
#[derive(Debug)]
pub struct DmapFileReader {
    data: Buffer,
}

impl DmapFileReader {
    /// Open and memory-map a DMAP file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyFile`] for a zero-length file and
    /// [`Error::InvalidFormat`] if the stream preamble is wrong.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        if file.metadata()?.len() == 0 {
            return Err(Error::EmptyFile);
        }
        // SAFETY: the map is read-only and lives no longer than this reader;
        // concurrent truncation of the file by another process is not supported.
        let map = unsafe { Mmap::map(&file)? };
        DmapReader::new(&map).check_preamble()?;
        Ok(Self {
            data: Buffer::Mapped(map),
        })
    }

    /// Create a reader over bytes already in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        DmapReader::new(&data).check_preamble()?;
        Ok(Self {
            data: Buffer::Owned(data),
        })
    }

    /// Stream format version from the preamble.
    pub fn version(&self) -> u16 {
        DmapReader::new(&self.data).get_version()
    }

    /// Size of the underlying buffer in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Lazily decode records.
    pub fn records(&self) -> RecordIterator<'_> {
        DmapReader::new(&self.data).records()
    }

    /// Decode every record, failing on the first bad one.
    pub fn read_all(&self) -> Result<Vec<Record>> {
        self.records().collect()
    }

    /// Decode every record that can be decoded, collecting the errors of
    /// the ones that could not.
    pub fn read_lenient(&self) -> (Vec<Record>, Vec<Error>) {
        split_results(self.records())
    }

    /// Decode every record and check each against `profile`.
    pub fn read_validated(&self, profile: ProfileName) -> Result<Vec<Record>> {
        self.records()
            .map(|record| {
                let record = record?;
                validate(&record, profile)?;
                Ok(record)
            })
            .collect()
    }
}

fn split_results(results: impl Iterator<Item = Result<Record>>) -> (Vec<Record>, Vec<Error>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(record) => records.push(record),
            Err(err) => errors.push(err),
        }
    }
    (records, errors)
}

/// Decode a complete DMAP stream, failing on the first bad record.
pub fn read(bytes: &[u8]) -> Result<Vec<Record>> {
    DmapReader::new(bytes).records().collect()
}

/// Decode a DMAP stream, skipping records that fail to decode.
///
/// Decoding still stops at a damaged record header, since no later offset
/// can be trusted after one.
pub fn read_lenient(bytes: &[u8]) -> (Vec<Record>, Vec<Error>) {
    split_results(DmapReader::new(bytes).records())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmap::{MAGIC, VERSION};

    #[test]
    fn test_reader_is_debug() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        let reader = DmapFileReader::from_bytes(bytes).unwrap();
        assert!(format!("{:?}", reader).contains("Owned"));
        assert!(reader.read_all().unwrap().is_empty());
    }
}
