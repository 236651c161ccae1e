use std::fs;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(about = "Null sample payload bytes in an MTAG file, preserving header and buffer framing")]
struct Args {
    /// Display version and quit
    #[arg(long)]
    version: bool,

    /// Also zero the trailing overflow padding of each buffer (it should
    /// already be zero-filled per spec; use this to scrub files that
    /// aren't)
    #[arg(long)]
    redact_overflow: bool,

    /// Input .mtag file
    input: Option<PathBuf>,
    /// Output .mtag file (redacted copy); if omitted, writes
    /// redacted-<name>.mtag.gz in the current directory
    output: Option<PathBuf>,
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.version {
        mtag::version::print_cli_version_banner(
            "MTAG Redact Tool",
            env!("CARGO_PKG_VERSION"),
            env!("RELEASE_VERSION"),
            env!("GIT_COMMIT"),
        );
        return Ok(());
    }

    let input = args.input.ok_or("INPUT is required unless --version is specified")?;

    let gzip_output = args.output.is_none();
    let output = args.output.unwrap_or_else(|| mtag_redact::default_output_path(&input));

    // When gzipping, redact to a temp .mtag file first, then compress.
    let working_file = if gzip_output {
        output.with_extension("")
    } else {
        output.clone()
    };

    if input.to_string_lossy().ends_with(".mtag.gz") {
        return Err(format!(
            "'{}': .mtag.gz input is not supported for redaction; provide an uncompressed .mtag file",
            input.display()
        )
        .into());
    }

    log::info!("Copying {} -> {}...", input.display(), working_file.display());
    fs::copy(&input, &working_file).map_err(|e| {
        format!("Copying '{}' to '{}': {}", input.display(), working_file.display(), e)
    })?;

    log::info!("Redacting sample payloads...");
    let (buffers_zeroed, bytes_zeroed) = mtag_redact::redact(&input, &working_file, args.redact_overflow)?;

    log::info!(
        "Redacted {} buffers, zeroed {} bytes ({:.1} MB)",
        buffers_zeroed,
        bytes_zeroed,
        bytes_zeroed as f64 / (1024.0 * 1024.0)
    );

    if gzip_output {
        mtag_redact::gzip_and_cleanup(&working_file, &output)?;
    }

    log::info!("Done, wrote {}", output.display());

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
