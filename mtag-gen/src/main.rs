use std::path::PathBuf;

use clap::Parser;
use rand::Rng;

/// Synthesise an MTAG test file for a single device.
///
/// Only single-device files can be generated from the command line; for
/// multi-device fixtures, use this crate as a library and call
/// `mtag_gen::write_interleaved` directly.
#[derive(Parser)]
#[command(name = "mtag-gen", about = "Generate synthetic MTAG files for testing")]
struct Args {
    /// Device id to assign to the generated buffers
    #[arg(short = 'i', long = "id", default_value_t = 1)]
    id: u8,

    /// Value written to every non-time, non-padding channel
    #[arg(short = 'v', long = "val", default_value_t = 1.0)]
    value: f64,

    /// Nominal microseconds between buffer writes
    #[arg(short = 't', long = "time", default_value_t = 1000)]
    time: u32,

    /// Data format string (MTAG tag alphabet)
    #[arg(short = 'f', long = "format", default_value = "H")]
    format: String,

    /// Sub-header format string; must start with 'B' and contain one 'T'
    #[arg(short = 'H', long = "header-format", default_value = "BTx")]
    header_format: String,

    /// Size of each buffer, in bytes
    #[arg(short = 'd', long = "data-size", default_value_t = 8192)]
    buffer_size: u32,

    /// Split named channels into separate output files downstream
    #[arg(short = 's', long = "split-channel")]
    split_channel: bool,

    /// Output file path
    #[arg(short = 'o', long = "output-file", default_value = "test_output.bin")]
    output_file: PathBuf,

    /// Name of the device's buffer entry in the header
    #[arg(short = 'I', long = "buffer-name", default_value = "device")]
    buffer_name: String,

    /// Number of buffers to write
    #[arg(short = 'n', long = "num-buffers", default_value_t = 1)]
    num_buffers: u32,

    /// Channel names, one per non-time channel
    #[arg(short = 'c', long = "channel-names", num_args = 1.., default_value = "ch1")]
    channel_names: Vec<String>,

    /// Animal name, recorded in file metadata
    #[arg(short = 'N', long = "name", default_value = "Lono")]
    name: String,

    /// Animal species, recorded in file metadata
    #[arg(short = 'S', long = "species", default_value = "Tursiops truncatus")]
    species: String,

    /// Experiment date, recorded in file metadata
    #[arg(short = 'D', long = "date", default_value = "1995/10/26 14:15:00")]
    date: String,

    /// Randomise the channel value per buffer instead of using a fixed one
    #[arg(long)]
    randomise_value: bool,

    /// Display version and quit
    #[arg(long)]
    version: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    if args.version {
        mtag::version::print_cli_version_banner(
            "MTAG Fixture Generator",
            env!("CARGO_PKG_VERSION"),
            env!("RELEASE_VERSION"),
            env!("GIT_COMMIT"),
        );
        return;
    }

    if let Err(e) = run(args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let value = if args.randomise_value {
        rand::thread_rng().gen_range(0.0..=255.0)
    } else {
        args.value
    };

    let fixture = mtag_gen::DeviceFixture {
        name: args.buffer_name,
        id: args.id,
        time: args.time,
        header_format: args.header_format,
        data_format: args.format,
        buffer_size: args.buffer_size,
        value,
        split_channel: args.split_channel,
        channel_names: args.channel_names,
        num_buffers: args.num_buffers,
    };

    let metadata = serde_json::json!({
        "name": args.name,
        "species": args.species,
        "date": args.date,
    });

    log::info!(
        "Writing {} buffer(s) for device '{}' (id={}) to {}",
        fixture.num_buffers,
        fixture.name,
        fixture.id,
        args.output_file.display()
    );

    mtag_gen::write_sequential(&args.output_file, metadata, std::slice::from_ref(&fixture))?;

    log::info!("Done, wrote {}", args.output_file.display());
    Ok(())
}
