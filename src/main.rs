//! Command-line interface for the DMAP library.
//!
//! Wires file access, validation, Borealis conversion and Parquet export
//! together; the library itself never touches paths or logging.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use superdarn_dmap::{
    convert, validate_all, DmapFileReader, DmapWriter, ParquetWriter, ProfileName, Record,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Inspect, validate and convert SuperDARN DMAP files",
    long_about = "Reads DMAP record streams, checks them against SuperDARN and Borealis \
                  format profiles, converts Borealis rawacf and bfiq to SuperDARN rawacf and \
                  iqdat, and \
                  exports records to Apache Parquet."
)]
struct Args {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise the records in a file
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Check every record against a format profile
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// dmap, rawacf, fitacf, iqdat, grid, map, borealis-rawacf or borealis-bfiq
        #[arg(short, long, default_value = "dmap")]
        profile: String,
    },
    /// Convert a Borealis file to its SuperDARN counterpart
    Convert {
        #[arg(value_name = "IN_FILE")]
        input: PathBuf,

        #[arg(value_name = "OUT_FILE")]
        output: PathBuf,

        /// Input profile: borealis-rawacf or borealis-bfiq
        #[arg(long, default_value = "borealis-rawacf")]
        from: String,

        /// Output profile: rawacf or iqdat
        #[arg(long, default_value = "rawacf")]
        to: String,
    },
    /// Export records to Parquet
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output directory for Parquet files
        #[arg(short, long, value_name = "OUT_DIR")]
        out_dir: PathBuf,

        /// Number of rows per Parquet file chunk
        #[arg(long, default_value = "50000")]
        chunk_size: usize,
    },
}

fn read_records(path: &Path) -> Result<Vec<Record>> {
    let t0 = Instant::now();
    let reader = DmapFileReader::from_file(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let (records, errors) = reader.read_lenient();
    for err in &errors {
        warn!("   ├─ skipped record: {}", err);
    }
    info!(
        "   ├─ Read {} records ({} bytes) in {:.2?}",
        records.len(),
        reader.len(),
        t0.elapsed()
    );
    if records.is_empty() && !errors.is_empty() {
        anyhow::bail!("no readable records in {}", path.display());
    }
    Ok(records)
}

fn info_command(file: &Path) -> Result<()> {
    info!("📄 {}", file.display());
    let records = read_records(file)?;

    let mut field_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in &records {
        for name in record.names() {
            *field_counts.entry(name).or_default() += 1;
        }
    }

    let matching: Vec<_> = ProfileName::ALL
        .into_iter()
        .filter(|&p| p != ProfileName::Dmap)
        .filter(|&p| records.iter().all(|r| validate_all(r, p).is_empty()))
        .collect();

    info!("   ├─ {} distinct fields", field_counts.len());
    for (name, count) in &field_counts {
        log::debug!("   │    {} ({} records)", name, count);
    }
    if matching.is_empty() {
        info!("   └─ Matches no SuperDARN or Borealis profile");
    } else {
        let names: Vec<_> = matching.iter().map(|p| p.as_str()).collect();
        info!("   └─ Matches profiles: {}", names.join(", "));
    }
    Ok(())
}

fn validate_command(file: &Path, profile: &str) -> Result<()> {
    let profile: ProfileName = profile.parse()?;
    info!("📄 {} against {}", file.display(), profile);
    let records = read_records(file)?;

    let mut failures = 0;
    for (idx, record) in records.iter().enumerate() {
        let errors = validate_all(record, profile);
        if !errors.is_empty() {
            failures += 1;
            for err in errors {
                log::error!("   ├─ record {}: {}", idx, err);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} records failed {} validation", failures, records.len(), profile);
    }
    info!("   └─ ✓ All {} records valid", records.len());
    Ok(())
}

fn convert_command(input: &Path, output: &Path, from: &str, to: &str) -> Result<()> {
    let from: ProfileName = from.parse()?;
    let to: ProfileName = to.parse()?;
    info!("📄 {} ({}) → {} ({})", input.display(), from, output.display(), to);
    let records = read_records(input)?;

    let t0 = Instant::now();
    let mut converted = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let beams = convert(record, from, to)
            .with_context(|| format!("converting record {}", idx))?;
        converted.extend(beams);
    }
    info!(
        "   ├─ Converted {} {} records into {} {} records in {:.2?}",
        records.len(),
        from,
        converted.len(),
        to,
        t0.elapsed()
    );

    let stats = DmapWriter::new()
        .validate_against(to)
        .write_file(output, &converted)?;
    info!("   └─ {}", stats.summary());
    Ok(())
}

fn export_command(file: &Path, out_dir: &Path, chunk_size: usize) -> Result<()> {
    info!("📄 {}", file.display());
    let records = read_records(file)?;

    let t1 = Instant::now();
    let stats = ParquetWriter::new(out_dir)
        .chunk_size(chunk_size)
        .write_with_stats(&records)?;
    info!("   ├─ Wrote Parquet in {:.2?}", t1.elapsed());
    info!("   └─ {}", stats.summary());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format_timestamp(None)
        .init();

    let start = Instant::now();
    match &args.command {
        Command::Info { file } => info_command(file)?,
        Command::Validate { file, profile } => validate_command(file, profile)?,
        Command::Convert {
            input,
            output,
            from,
            to,
        } => convert_command(input, output, from, to)?,
        Command::Export {
            file,
            out_dir,
            chunk_size,
        } => export_command(file, out_dir, *chunk_size)?,
    }
    info!("🏁 Done in {:.2?}", start.elapsed());

    Ok(())
}
