//! Core of `mtag-redact`: zero sample-payload bytes in an MTAG file
//! while leaving the header line and every buffer's id byte and
//! sub-header (hence its timestamp) untouched. Separated from `main.rs`
//! so it can be exercised directly from `tests/integration.rs`, the
//! same split `mtag-gen` uses between its library and CLI.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use mtag::decoder::{self, DecoderTable};
use mtag::header::FileHeader;
use mtag::reader::{Reader, Whence};

/// Zero out a region of the file at the given offset and size.
fn zero_region(file: &mut File, offset: u64, size: u64) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    let buf = [0u8; 65536];
    let mut remaining = size as usize;
    while remaining > 0 {
        let chunk = remaining.min(buf.len());
        file.write_all(&buf[..chunk])?;
        remaining -= chunk;
    }
    Ok(())
}

/// Derive a default output path: `redacted-<stem>.mtag.gz` in the
/// current directory.
pub fn default_output_path(input: &Path) -> std::path::PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    std::path::PathBuf::from(format!("redacted-{stem}.mtag.gz"))
}

/// Redact `working_file` in place (it must already be a byte-for-byte
/// copy of `input`): walk `input`'s buffers via its decoder table, and
/// for each one zero the corresponding sample-payload region in
/// `working_file`. The id byte and sub-header — and hence every
/// buffer's timestamp — are never touched, so the redacted file still
/// parses to the same buffer counts and the same dense time axis.
///
/// Returns `(buffers_zeroed, bytes_zeroed)`.
pub fn redact(
    input: &Path,
    working_file: &Path,
    redact_overflow: bool,
) -> Result<(u64, u64), Box<dyn std::error::Error>> {
    let mut reader =
        Reader::open(input).map_err(|e| format!("Opening input '{}': {}", input.display(), e))?;
    let mut out = OpenOptions::new()
        .write(true)
        .open(working_file)
        .map_err(|e| format!("Opening output '{}' for writing: {}", working_file.display(), e))?;

    let total_bytes = fs::metadata(input)?.len();

    let line = reader.readline()?;
    let header_text = String::from_utf8_lossy(&line);
    let header = FileHeader::parse(header_text.trim_end_matches('\n'))?;
    let table: DecoderTable = decoder::build_decoder_table(&header);

    let mut buffers_zeroed: u64 = 0;
    let mut bytes_zeroed: u64 = 0;

    loop {
        let offset = reader.tell()?;
        if offset >= total_bytes {
            break;
        }
        let id = reader.read(1)?[0];
        let entry = table.get(&id).ok_or_else(|| {
            format!("'{}': unknown device id {id} at offset 0x{offset:X}", input.display())
        })?;

        let payload_offset = offset + entry.header_size as u64;
        let payload_size = entry.data_packet_size as u64 * entry.num_packets as u64;
        if payload_size > 0 {
            zero_region(&mut out, payload_offset, payload_size).map_err(|e| {
                format!(
                    "Zeroing buffer at offset 0x{offset:X} (device '{}', id={id}): {e}",
                    entry.name
                )
            })?;
            buffers_zeroed += 1;
            bytes_zeroed += payload_size;
        }

        if redact_overflow && entry.num_overflow_bytes > 0 {
            let overflow_offset = payload_offset + payload_size;
            zero_region(&mut out, overflow_offset, entry.num_overflow_bytes as u64)?;
            bytes_zeroed += entry.num_overflow_bytes as u64;
        }

        reader.seek((entry.spec.buffer_size - 1) as i64, Whence::Cur)?;
    }

    Ok((buffers_zeroed, bytes_zeroed))
}

/// Gzip compress `src` to `dst`, then remove `src`.
pub fn gzip_and_cleanup(src: &Path, dst: &Path) -> Result<(), Box<dyn std::error::Error>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{BufReader, BufWriter, Read as _};

    let src_size = fs::metadata(src).map(|m| m.len()).unwrap_or(0);
    log::info!(
        "Compressing {} ({:.1} MB) -> {}...",
        src.display(),
        src_size as f64 / (1024.0 * 1024.0),
        dst.display()
    );

    let input = File::open(src)
        .map_err(|e| format!("Opening '{}' for gzip compression: {}", src.display(), e))?;
    let mut reader = BufReader::new(input);

    let output = File::create(dst).map_err(|e| format!("Creating '{}': {}", dst.display(), e))?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());

    let mut buf = [0u8; 65536];
    let mut bytes_compressed: u64 = 0;
    let mut last_log_mb: u64 = 0;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        encoder.write_all(&buf[..n])?;
        bytes_compressed += n as u64;

        let current_mb = bytes_compressed / (100 * 1024 * 1024);
        if current_mb > last_log_mb {
            log::info!(
                "Compressing: {:.0} MB processed...",
                bytes_compressed as f64 / (1024.0 * 1024.0)
            );
            last_log_mb = current_mb;
        }
    }
    encoder.finish()?;

    let dst_size = fs::metadata(dst).map(|m| m.len()).unwrap_or(0);
    log::info!(
        "Compressed {:.1} MB -> {:.1} MB",
        src_size as f64 / (1024.0 * 1024.0),
        dst_size as f64 / (1024.0 * 1024.0)
    );

    fs::remove_file(src)
        .map_err(|e| format!("Removing temp file '{}': {}", src.display(), e))?;

    Ok(())
}
