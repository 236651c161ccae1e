use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;

use mtag::accumulator::DataChunk;
use mtag::error::Result as MtagResult;
use mtag::header::FileHeader;
use mtag::sink::Sink;
use mtag::FileParser;

/// MTAG Info Tool — parse and display MTAG file structure.
#[derive(Parser)]
#[command(name = "mtag-info", about = "Parse and display MTAG file structure")]
struct Args {
    /// Input .mtag file
    #[arg(short = 'f', long = "file")]
    file: Option<String>,

    /// Input .mtag file (positional)
    #[arg(conflicts_with = "file", required_unless_present_any = ["file", "schema", "version"])]
    input: Option<String>,

    /// External JSON header to use instead of the one embedded in the file
    #[arg(long = "header")]
    header: Option<PathBuf>,

    /// Filter by device name
    #[arg(short = 'd', long = "device")]
    device_filter: Option<String>,

    /// Print the first N decoded samples per device instead of just counts
    #[arg(long = "head")]
    head: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Print JSON schema for the file header and exit
    #[arg(long)]
    schema: bool,

    /// Display version and quit
    #[arg(long)]
    version: bool,
}

/// One device's stats, collected while draining the file once.
#[derive(Debug, Serialize)]
struct DeviceReport {
    total_samples: u64,
    num_channels: usize,
    chunk_hint: usize,
    head: Vec<(f64, Vec<f64>)>,
}

#[derive(Default)]
struct InspectSink {
    head_limit: usize,
    devices: HashMap<String, DeviceReport>,
    metadata: serde_json::Value,
}

impl Sink for InspectSink {
    fn preallocate(
        &mut self,
        device_name: &str,
        total_samples: u64,
        num_channels: usize,
        chunk_hint: usize,
    ) -> MtagResult<()> {
        self.devices.insert(
            device_name.to_string(),
            DeviceReport {
                total_samples,
                num_channels,
                chunk_hint,
                head: Vec::new(),
            },
        );
        Ok(())
    }

    fn write_metadata(&mut self, metadata: &serde_json::Value) -> MtagResult<()> {
        self.metadata = metadata.clone();
        Ok(())
    }

    fn append(&mut self, device_name: &str, chunk: &DataChunk) -> MtagResult<()> {
        if self.head_limit == 0 {
            return Ok(());
        }
        if let Some(report) = self.devices.get_mut(device_name) {
            let remaining = self.head_limit.saturating_sub(report.head.len());
            for (t, row) in chunk.time.iter().zip(&chunk.data).take(remaining) {
                report.head.push((*t, row.clone()));
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> MtagResult<()> {
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Reset SIGPIPE to default so piped output (e.g. head/tail) exits cleanly
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    if args.version {
        mtag::version::print_cli_version_banner(
            "MTAG Info Tool",
            env!("CARGO_PKG_VERSION"),
            env!("RELEASE_VERSION"),
            env!("GIT_COMMIT"),
        );
        return Ok(());
    }

    if args.schema {
        let schema = schemars::schema_for!(FileHeader);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let file = args.file.clone().or_else(|| args.input.clone()).expect("file argument required");

    let mut sink = InspectSink {
        head_limit: args.head.unwrap_or(0),
        ..Default::default()
    };
    FileParser::new().parse(Path::new(&file), args.header.as_deref(), &mut sink)?;

    let devices: HashMap<&String, &DeviceReport> = sink
        .devices
        .iter()
        .filter(|(name, _)| args.device_filter.as_ref().map_or(true, |f| *name == f))
        .collect();

    if args.json {
        #[derive(Serialize)]
        struct Report<'a> {
            metadata: &'a serde_json::Value,
            devices: HashMap<&'a String, &'a DeviceReport>,
        }
        println!(
            "{}",
            serde_json::to_string(&Report {
                metadata: &sink.metadata,
                devices,
            })?
        );
        return Ok(());
    }

    println!("Metadata: {}", sink.metadata);
    println!(
        "{:>20} {:>14} {:>10} {:>10}",
        "Device", "Samples", "Channels", "ChunkHint"
    );
    let mut names: Vec<&&String> = devices.keys().collect();
    names.sort();
    for name in names {
        let report = devices[*name];
        println!(
            "{:>20} {:>14} {:>10} {:>10}",
            name, report.total_samples, report.num_channels, report.chunk_hint
        );
        for (t, row) in &report.head {
            println!("    t={t:.6}  {row:?}");
        }
    }

    Ok(())
}
