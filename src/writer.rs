//! High-level API for writing records as DMAP or exporting them to Parquet.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::dmap::{encode_record, write_preamble};
use crate::error::{Error, Result};
use crate::formats::parquet::{part_path, ParquetFormatter};
use crate::models::Record;
use crate::profile::ProfileName;
use crate::validate::validate;

/// Encode records into a complete DMAP stream.
pub fn write(records: &[Record]) -> Result<Vec<u8>> {
    DmapWriter::new().to_bytes(records)
}

/// Writer for DMAP streams.
///
/// # Examples
///
/// ```no_run
/// use superdarn_dmap::{DmapFileReader, DmapWriter, ProfileName};
///
/// let records = DmapFileReader::from_file("in.dmap")?.read_all()?;
/// DmapWriter::new()
///     .validate_against(ProfileName::Rawacf)
///     .write_file("out.rawacf.dmap", &records)?;
/// # Ok::<(), superdarn_dmap::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DmapWriter {
    profile: Option<ProfileName>,
}

impl DmapWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any record that does not satisfy `profile` before writing.
    pub fn validate_against(mut self, profile: ProfileName) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Encode `records` into a new buffer.
    ///
    /// Nothing is returned if any record fails validation or encoding.
    pub fn to_bytes(&self, records: &[Record]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        write_preamble(&mut out)?;
        for record in records {
            if let Some(profile) = self.profile {
                validate(record, profile)?;
            }
            encode_record(record, &mut out)?;
        }
        Ok(out)
    }

    /// Encode `records` and write them to `path`, replacing any existing file.
    pub fn write_file<P: AsRef<Path>>(&self, path: P, records: &[Record]) -> Result<WriteStats> {
        let bytes = self.to_bytes(records)?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(&bytes)?;
        Ok(WriteStats {
            num_records: records.len(),
            num_bytes: bytes.len(),
            num_chunks: 1,
        })
    }
}

/// Writer for exporting decoded records to Apache Parquet.
///
/// Each record becomes one row; each field name becomes a column.
///
/// # Examples
///
/// ```no_run
/// use superdarn_dmap::{DmapFileReader, ParquetWriter};
///
/// let records = DmapFileReader::from_file("data.rawacf.dmap")?.read_all()?;
/// ParquetWriter::new("output_dir")
///     .chunk_size(10_000)
///     .write(&records)?;
/// # Ok::<(), superdarn_dmap::Error>(())
/// ```
pub struct ParquetWriter {
    output_directory: String,
    chunk_size: usize,
}

impl ParquetWriter {
    /// Create a new Parquet writer that will write to the specified directory.
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_string_lossy().to_string(),
            chunk_size: 50_000,
        }
    }

    /// Set the number of rows per Parquet file. Default is 50,000.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Write the records to Parquet files named `file_part000.parquet`,
    /// `file_part001.parquet`, etc.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory cannot be created, the
    /// files cannot be written, or `records` is empty.
    pub fn write(self, records: &[Record]) -> Result<()> {
        let formatter = ParquetFormatter::new(self.output_directory, self.chunk_size);

        formatter
            .convert(records)
            .map_err(|e| Error::OutputError(e.to_string()))?;

        Ok(())
    }

    /// Write records to Parquet and return statistics about the write operation.
    pub fn write_with_stats(self, records: &[Record]) -> Result<WriteStats> {
        let num_records = records.len();
        let num_chunks = num_records.div_ceil(self.chunk_size);
        let output_directory = self.output_directory.clone();

        self.write(records)?;

        let mut num_bytes = 0;
        for index in 0..num_chunks {
            let path = part_path(Path::new(&output_directory), index);
            num_bytes += std::fs::metadata(path)?.len() as usize;
        }

        Ok(WriteStats {
            num_records,
            num_bytes,
            num_chunks,
        })
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStats {
    /// Total number of records written
    pub num_records: usize,
    /// Bytes written across all output files
    pub num_bytes: usize,
    /// Number of files created
    pub num_chunks: usize,
}

impl WriteStats {
    /// Get a human-readable summary of the write operation.
    pub fn summary(&self) -> String {
        format!(
            "Wrote {} records ({} bytes) across {} file(s)",
            self.num_records, self.num_bytes, self.num_chunks
        )
    }
}
