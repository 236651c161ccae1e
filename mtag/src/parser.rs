//! The two-pass file parser (§4.E): reads the text header, builds the
//! decoder table, indexes the file by device, then streams each buffer
//! through the byte unpacker into the matching per-device accumulator,
//! draining chunks into the sink as buffers accumulate.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::accumulator::DeviceAccumulator;
use crate::decoder::{self, DecoderTable};
use crate::error::{MtagError, Result};
use crate::header::FileHeader;
use crate::reader::{Reader, Whence};
use crate::sink::Sink;
use crate::unpack;

/// Default `num_to_pop`: how many buffers' worth of samples to drain at
/// once once a device's `pop_boundary` is reached.
pub const DEFAULT_NUM_TO_POP: u64 = 1024;
/// Default `pop_boundary`: how many buffered buffers trigger a drain.
pub const DEFAULT_POP_BOUNDARY: u64 = 1280;

/// Progress snapshot emitted during pass 2, driven off the reader's
/// `bytes_read` counter (not `tell()`). The progress-bar front-end
/// itself is out of scope; this is the hook it would consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseProgress {
    pub bytes_read: u64,
    pub total_bytes: u64,
}

/// Parses one MTAG file into a [`Sink`].
pub struct FileParser {
    num_to_pop: u64,
    pop_boundary: u64,
}

impl Default for FileParser {
    fn default() -> Self {
        FileParser {
            num_to_pop: DEFAULT_NUM_TO_POP,
            pop_boundary: DEFAULT_POP_BOUNDARY,
        }
    }
}

impl FileParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a parser with explicit tunables. `pop_boundary` must be at
    /// least `num_to_pop`, per §6.
    pub fn with_tunables(num_to_pop: u64, pop_boundary: u64) -> Result<Self> {
        if pop_boundary < num_to_pop {
            return Err(MtagError::BadSpec {
                device: String::new(),
                reason: format!(
                    "buffer_pop_boundary ({pop_boundary}) must be >= num_to_pop ({num_to_pop})"
                ),
            });
        }
        Ok(FileParser {
            num_to_pop,
            pop_boundary,
        })
    }

    /// Parse `path` into `sink`, reading the header from the file itself
    /// (or from `header_override` if given), with no progress reporting.
    pub fn parse(
        &self,
        path: &Path,
        header_override: Option<&Path>,
        sink: &mut dyn Sink,
    ) -> Result<()> {
        self.parse_with_progress(path, header_override, sink, |_| {})
    }

    /// As [`FileParser::parse`], but invokes `progress` after every
    /// buffer consumed in pass 2.
    pub fn parse_with_progress<F>(
        &self,
        path: &Path,
        header_override: Option<&Path>,
        sink: &mut dyn Sink,
        mut progress: F,
    ) -> Result<()>
    where
        F: FnMut(ParseProgress),
    {
        let total_bytes = fs::metadata(path)?.len();
        let mut reader = Reader::open(path)?;

        let header = match header_override {
            Some(override_path) => FileHeader::load_external(override_path)?,
            None => {
                let line = reader.readline()?;
                let text = String::from_utf8_lossy(&line);
                FileHeader::parse(text.trim_end_matches('\n'))?
            }
        };

        let mut table: DecoderTable = decoder::build_decoder_table(&header);

        // Pass 1: index the file by device, without decoding payloads.
        let post_header_offset = reader.save_current_loc()?;
        let mut tot_buffers: u64 = 0;
        loop {
            let offset = reader.tell()?;
            if offset >= total_bytes {
                break;
            }
            let id = reader.read(1)?[0];
            let buffer_size = {
                let entry = table
                    .get_mut(&id)
                    .ok_or(MtagError::UnknownId { id, offset })?;
                entry.num_buffers += 1;
                entry.spec.buffer_size
            };
            tot_buffers += 1;
            reader.seek((buffer_size - 1) as i64, Whence::Cur)?;
        }
        reader.restore(post_header_offset)?;

        for entry in table.values() {
            if entry.num_buffers == 0 {
                continue;
            }
            let total_samples = entry.num_packets as u64 * entry.num_buffers;
            sink.preallocate(&entry.name, total_samples, entry.num_channels, entry.num_packets as usize)?;
        }
        sink.write_metadata(&header.metadata)?;

        let mut accumulators: HashMap<u8, DeviceAccumulator> = table
            .iter()
            .map(|(id, entry)| {
                let acc = DeviceAccumulator::new(
                    entry.name.clone(),
                    entry.num_channels,
                    entry.num_packets as usize,
                    self.pop_boundary,
                );
                (*id, acc)
            })
            .collect();

        // Pass 2: stream-decode every buffer and feed its accumulator.
        for _ in 0..tot_buffers {
            let offset = reader.tell()?;
            let id = reader.read(1)?[0];
            let entry = table
                .get(&id)
                .ok_or(MtagError::UnknownId { id, offset })?;

            let header_bytes = reader.read((entry.header_size - 1) as usize)?;
            let payload_len = (entry.data_packet_size * entry.num_packets) as usize;
            let payload_bytes = reader.read(payload_len)?;
            if entry.num_overflow_bytes > 0 {
                reader.read(entry.num_overflow_bytes as usize)?;
            }

            let (header_data, header_time) =
                unpack::unpack_header(&header_bytes, &entry.header_tags[1..], offset + 1)?;
            let payload = unpack::unpack_payload(
                &payload_bytes,
                &entry.data_tags,
                entry.num_packets,
                entry.data_packet_size,
                offset + entry.header_size as u64,
            )?;

            let acc = accumulators
                .get_mut(&id)
                .expect("accumulator exists for every id in the decoder table");
            let ready = acc.append(header_data, header_time, payload.channels, payload.time);
            if ready {
                let n = self.num_to_pop.min(acc.num_buffers());
                let chunk = acc.drain(n, entry.num_packets)?;
                sink.append(&entry.name, &chunk)?;
            }

            progress(ParseProgress {
                bytes_read: reader.bytes_read(),
                total_bytes,
            });
        }

        // Final flush: drain whatever is left in every accumulator.
        for (id, entry) in &table {
            let acc = accumulators
                .get_mut(id)
                .expect("accumulator exists for every id in the decoder table");
            let remaining = acc.num_buffers();
            if remaining > 0 {
                let chunk = acc.drain(remaining, entry.num_packets)?;
                sink.append(&entry.name, &chunk)?;
            }
        }

        sink.finalize()?;
        Ok(())
    }
}
