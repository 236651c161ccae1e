//! Synthetic MTAG file generator — the Rust counterpart of the Python
//! reference test-fixture generator (`buffer_generator.py`). Not a
//! production serializer (see `spec.md` §1 Non-goals: "no
//! writer/serializer of MTAG files"); this crate exists solely to
//! manufacture regression fixtures for `mtag`'s integration tests and
//! for `mtag-gen`'s own CLI.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use mtag::format::{self, Tag};
use mtag::header::{DeviceSpec, FileHeader};
use serde_json::Value;

/// One device's buffer-generation parameters: enough to build both its
/// `DeviceSpec` header entry and its synthesized binary buffers.
#[derive(Debug, Clone)]
pub struct DeviceFixture {
    pub name: String,
    pub id: u8,
    /// Nominal microseconds between buffers.
    pub time: u32,
    pub header_format: String,
    pub data_format: String,
    pub buffer_size: u32,
    /// Value written to every non-time, non-padding channel.
    pub value: f64,
    pub split_channel: bool,
    pub channel_names: Vec<String>,
    pub num_buffers: u32,
}

impl DeviceFixture {
    pub fn device_spec(&self) -> DeviceSpec {
        DeviceSpec {
            id: self.id,
            time: self.time,
            header: self.header_format.clone(),
            data: self.data_format.clone(),
            buffer_size: self.buffer_size,
            split_channel: self.split_channel,
            channel_names: self.channel_names.clone(),
        }
    }
}

fn write_tag(out: &mut Vec<u8>, tag: Tag, numeric: f64, time: Option<u64>) {
    match tag {
        Tag::Pad => out.push(0),
        Tag::B | Tag::LowerB => out.push(numeric as i64 as u8),
        Tag::H | Tag::LowerH => out.extend_from_slice(&(numeric as i64 as u16).to_le_bytes()),
        Tag::U | Tag::LowerU => {
            let v = numeric as i64 as u32;
            out.extend_from_slice(&v.to_le_bytes()[..3]);
        }
        Tag::I | Tag::LowerI => out.extend_from_slice(&(numeric as i64 as u32).to_le_bytes()),
        Tag::F => out.extend_from_slice(&(numeric as f32).to_le_bytes()),
        Tag::T => {
            let t = time.expect("a 'T' tag requires a timestamp") as u32;
            out.extend_from_slice(&t.to_le_bytes());
        }
    }
}

/// Synthesize one device's `num_buffers` buffers as individual,
/// `buffer_size`-byte frames: `id | sub-header | payload | padding`,
/// mirroring `buffer_generator.py`'s `DataBuffer.create_buffer`.
///
/// Buffer `n` (1-indexed) carries sub-header timestamp `n * time`. If
/// the data format carries a per-sample `T`, sample `p` (1-indexed,
/// within a buffer of `num_packets` samples) carries timestamp
/// `(n-1)*time + p*time/num_packets`, matching the reference
/// generator's interpolation.
pub fn device_buffer_frames(fixture: &DeviceFixture) -> Vec<Vec<u8>> {
    let header_tags = format::parse_format(&fixture.header_format).expect("valid header format");
    let data_tags = format::parse_format(&fixture.data_format).expect("valid data format");
    let header_size: u32 = header_tags.iter().map(|t| format::tag_size(*t)).sum();
    let data_packet_size: u32 = data_tags.iter().map(|t| format::tag_size(*t)).sum();
    let num_packets = (fixture.buffer_size - header_size) / data_packet_size;
    let num_overflow = fixture.buffer_size - header_size - num_packets * data_packet_size;

    (1..=fixture.num_buffers)
        .map(|n| {
            let buffer_time = n as u64 * fixture.time as u64;
            let mut buf = Vec::with_capacity(fixture.buffer_size as usize);
            buf.push(fixture.id);
            for &tag in &header_tags[1..] {
                match tag {
                    Tag::T => write_tag(&mut buf, tag, 0.0, Some(buffer_time)),
                    _ => write_tag(&mut buf, tag, 0.0, None),
                }
            }
            for p in 1..=num_packets {
                let sample_time = (n - 1) as f64 * fixture.time as f64
                    + p as f64 * fixture.time as f64 / num_packets as f64;
                for &tag in &data_tags {
                    match tag {
                        Tag::T => write_tag(&mut buf, tag, 0.0, Some(sample_time.round() as u64)),
                        Tag::Pad => write_tag(&mut buf, tag, 0.0, None),
                        _ => write_tag(&mut buf, tag, fixture.value, None),
                    }
                }
            }
            buf.extend(std::iter::repeat(0u8).take(num_overflow as usize));
            buf
        })
        .collect()
}

/// Build the JSON file header for a set of device fixtures.
pub fn build_header(metadata: Value, devices: &[DeviceFixture]) -> FileHeader {
    let buffers: HashMap<String, DeviceSpec> = devices
        .iter()
        .map(|d| (d.name.clone(), d.device_spec()))
        .collect();
    FileHeader { metadata, buffers }
}

fn write_header_line(f: &mut File, header: &FileHeader) -> io::Result<()> {
    let line = serde_json::to_string(header).expect("FileHeader always serializes");
    f.write_all(line.as_bytes())?;
    f.write_all(b"\n")
}

/// Write an MTAG file with each device's buffers written back to back
/// (device order as given, no interleaving) — the layout
/// `buffer_generator.py`'s single-device `write_file` produces,
/// generalised here to multiple devices.
pub fn write_sequential(path: &Path, metadata: Value, devices: &[DeviceFixture]) -> io::Result<()> {
    let header = build_header(metadata, devices);
    let mut f = File::create(path)?;
    write_header_line(&mut f, &header)?;
    for device in devices {
        for frame in device_buffer_frames(device) {
            f.write_all(&frame)?;
        }
    }
    Ok(())
}

/// Write an MTAG file with every device's buffers interleaved in
/// round-robin order, simulating a realistic multi-device recorder and
/// exercising the parser's per-device demultiplexing (seed scenario S6).
pub fn write_interleaved(path: &Path, metadata: Value, devices: &[DeviceFixture]) -> io::Result<()> {
    let header = build_header(metadata, devices);
    let mut f = File::create(path)?;
    write_header_line(&mut f, &header)?;

    let frames: Vec<Vec<Vec<u8>>> = devices.iter().map(device_buffer_frames).collect();
    let max_len = frames.iter().map(|f| f.len()).max().unwrap_or(0);
    for i in 0..max_len {
        for device_frames in &frames {
            if let Some(frame) = device_frames.get(i) {
                f.write_all(frame)?;
            }
        }
    }
    Ok(())
}
