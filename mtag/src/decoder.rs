//! Decoder table: one entry per device id, derived from its `DeviceSpec`
//! plus the sizes and counts needed to index and unpack its buffers.

use std::collections::HashMap;

use crate::format::{self, Tag};
use crate::header::{DeviceSpec, FileHeader};

/// A device's `DeviceSpec` plus everything derivable from it: byte
/// offsets, packet counts, and the running buffer count from pass 1.
#[derive(Debug, Clone)]
pub struct DecoderEntry {
    pub name: String,
    pub spec: DeviceSpec,
    /// Size in bytes of the whole sub-header region, including the
    /// leading id byte (the header format string's first `B` tag stands
    /// for that same byte; it is not counted twice).
    pub header_size: u32,
    pub data_packet_size: u32,
    pub num_packets: u32,
    pub num_overflow_bytes: u32,
    pub header_has_time: bool,
    pub data_has_time: bool,
    pub num_channels: usize,
    /// Populated by pass 1.
    pub num_buffers: u64,
    /// Parsed header format, including the leading `B` tag that stands
    /// for the id byte. The unpacker is handed `&header_tags[1..]` since
    /// the id byte itself is read separately by the parser.
    pub header_tags: Vec<Tag>,
    pub data_tags: Vec<Tag>,
}

impl DecoderEntry {
    /// Build a decoder entry from an already-validated `DeviceSpec`
    /// (`FileHeader::validate` must have been run first — this does not
    /// re-check the format strings).
    fn from_spec(name: String, spec: DeviceSpec) -> Self {
        let header_tags =
            format::parse_format(&spec.header).expect("DeviceSpec validated before decoding");
        let data_tags =
            format::parse_format(&spec.data).expect("DeviceSpec validated before decoding");

        // The header format's leading `B` tag stands for the id byte
        // itself (read separately by the parser via a single-byte read),
        // so header_size is just the format string's packet size with no
        // additional +1 for the id.
        let header_size: u32 = header_tags.iter().map(|t| format::tag_size(*t)).sum();
        let data_packet_size: u32 = data_tags.iter().map(|t| format::tag_size(*t)).sum();

        let num_packets = (spec.buffer_size - header_size) / data_packet_size;
        let num_overflow_bytes =
            spec.buffer_size - header_size - num_packets * data_packet_size;

        let header_has_time = header_tags.iter().any(|t| *t == Tag::T);
        let data_has_time = data_tags.iter().any(|t| *t == Tag::T);
        let num_channels = data_tags.iter().filter(|t| **t != Tag::T).count();

        DecoderEntry {
            name,
            spec,
            header_size,
            data_packet_size,
            num_packets,
            num_overflow_bytes,
            header_has_time,
            data_has_time,
            num_channels,
            num_buffers: 0,
            header_tags,
            data_tags,
        }
    }
}

pub type DecoderTable = HashMap<u8, DecoderEntry>;

/// Build the id-keyed decoder table from a validated file header.
pub fn build_decoder_table(header: &FileHeader) -> DecoderTable {
    header
        .buffers
        .iter()
        .map(|(name, spec)| {
            let entry = DecoderEntry::from_spec(name.clone(), spec.clone());
            (spec.id, entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::DeviceSpec;
    use std::collections::HashMap as StdHashMap;

    fn header_with(spec: DeviceSpec) -> FileHeader {
        let mut buffers = StdHashMap::new();
        buffers.insert("dev".to_string(), spec);
        FileHeader {
            metadata: serde_json::json!({}),
            buffers,
        }
    }

    #[test]
    fn derives_packet_counts_from_seed_scenario_s1() {
        let spec = DeviceSpec {
            id: 1,
            time: 4093,
            header: "BTx".to_string(),
            data: "H".to_string(),
            buffer_size: 10,
            split_channel: false,
            channel_names: vec!["ch0".to_string()],
        };
        let header = header_with(spec);
        header.validate().unwrap();
        let table = build_decoder_table(&header);
        let entry = &table[&1];

        assert_eq!(entry.header_size, 6); // B(1) + T(4) + x(1); the B byte is the id itself
        assert_eq!(entry.data_packet_size, 2);
        assert_eq!(entry.num_packets, (10 - 6) / 2);
        assert_eq!(entry.num_channels, 1);
        assert!(entry.header_has_time);
        assert!(!entry.data_has_time);
    }

    #[test]
    fn derives_packet_counts_from_seed_scenario_s2() {
        let spec = DeviceSpec {
            id: 2,
            time: 4093,
            header: "BTx".to_string(),
            data: "HB".to_string(),
            buffer_size: 8192,
            split_channel: false,
            channel_names: vec!["ch0".to_string(), "ch1".to_string()],
        };
        let header = header_with(spec);
        header.validate().unwrap();
        let table = build_decoder_table(&header);
        let entry = &table[&2];

        // (8192 - header_size(6)) / data_packet_size(3), floor division.
        assert_eq!(entry.num_packets, 2728);
        assert_eq!(entry.num_channels, 2);
    }
}
