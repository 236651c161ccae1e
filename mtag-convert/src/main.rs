use std::path::{Path, PathBuf};

use clap::Parser;

use mtag::FileParser;
use mtag_hdf5::Hdf5Sink;

/// MTAG Convert Tool — decodes MTAG animal-tag logs into HDF5.
#[derive(Parser)]
#[command(name = "mtag-convert")]
struct Args {
    /// External JSON header to use instead of the one embedded in the file
    #[arg(long = "header")]
    header: Option<PathBuf>,

    /// Buffers to drain at once once a device's pop boundary is reached
    #[arg(long = "num-to-pop", default_value_t = mtag::parser::DEFAULT_NUM_TO_POP)]
    num_to_pop: u64,

    /// Buffered-buffer count that triggers a drain
    #[arg(long = "pop-boundary", default_value_t = mtag::parser::DEFAULT_POP_BOUNDARY)]
    pop_boundary: u64,

    /// Output directory ("SRC-FOLDER" = alongside the input file)
    #[arg(long = "output-folder", default_value = "./")]
    output_folder: String,

    /// Display version and quit
    #[arg(long = "version")]
    version: bool,

    /// Input .mtag files
    files: Vec<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    if args.version {
        mtag::version::print_cli_version_banner(
            "MTAG Convert Tool",
            env!("CARGO_PKG_VERSION"),
            env!("RELEASE_VERSION"),
            env!("GIT_COMMIT"),
        );
        return;
    }

    if let Err(e) = run(&args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn output_path(input: &str, output_folder: &str) -> PathBuf {
    let folder = output_folder.trim_end_matches(['/', '\\']);
    let dir = if folder == "SRC-FOLDER" {
        Path::new(input)
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        PathBuf::from(folder)
    };

    let stem = Path::new(input)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    dir.join(format!("{stem}.h5"))
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.files.is_empty() {
        return Err("Expected at least one .mtag file as input!".into());
    }

    let parser = FileParser::with_tunables(args.num_to_pop, args.pop_boundary)?;

    for input in &args.files {
        let out_path = output_path(input, &args.output_folder);
        log::info!("Converting {input} -> {}", out_path.display());

        let mut sink = Hdf5Sink::create(&out_path)?;
        let mut last_logged_pct = 0u64;
        parser.parse_with_progress(
            Path::new(input),
            args.header.as_deref(),
            &mut sink,
            |progress| {
                if progress.total_bytes == 0 {
                    return;
                }
                let pct = progress.bytes_read * 100 / progress.total_bytes;
                if pct >= last_logged_pct + 10 {
                    log::info!("{input}: {pct}% ({} / {} bytes)", progress.bytes_read, progress.total_bytes);
                    last_logged_pct = pct;
                }
            },
        )?;

        log::info!("Wrote {}", out_path.display());
    }

    Ok(())
}
