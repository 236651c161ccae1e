//! The in-file (or side-channel) JSON header: `{metadata, buffers}`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{MtagError, Result};
use crate::format::{self, FormatError, Tag};

/// One device's buffer layout, as declared under `buffers.<device_name>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct DeviceSpec {
    pub id: u8,
    /// Nominal microseconds between buffers.
    pub time: u32,
    /// Sub-header format string; must start with `B` and contain exactly one `T`.
    pub header: String,
    /// Payload format string; contains at most one `T`.
    pub data: String,
    pub buffer_size: u32,
    #[serde(default)]
    pub split_channel: bool,
    #[serde(default)]
    pub channel_names: Vec<String>,
}

/// The file-level header: device declarations plus free-form metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct FileHeader {
    pub metadata: serde_json::Value,
    pub buffers: HashMap<String, DeviceSpec>,
}

fn format_error(format: &str, err: FormatError) -> MtagError {
    match err {
        FormatError::UnknownTag(tag) => MtagError::UnknownTag {
            tag,
            format: format.to_string(),
        },
        FormatError::MultipleTime => MtagError::BadSpec {
            device: String::new(),
            reason: format!("format string \"{format}\" contains more than one 'T' tag"),
        },
    }
}

/// Validate one device's spec against the invariants in the format
/// description: `header` begins with `B` and carries exactly one `T`,
/// `data` carries at most one `T`, the declared sizes fit in one buffer,
/// and `channel_names` matches the data format's channel count.
pub fn validate_device(name: &str, spec: &DeviceSpec) -> Result<()> {
    let bad = |reason: String| MtagError::BadSpec {
        device: name.to_string(),
        reason,
    };

    if !spec.header.starts_with('B') {
        return Err(bad(format!(
            "header format \"{}\" must begin with 'B'",
            spec.header
        )));
    }

    let header_tags = format::parse_format(&spec.header).map_err(|e| format_error(&spec.header, e))?;
    let header_time_count = header_tags.iter().filter(|t| **t == Tag::T).count();
    if header_time_count != 1 {
        return Err(bad(format!(
            "header format \"{}\" must contain exactly one 'T' tag, found {header_time_count}",
            spec.header
        )));
    }

    let data_tags = format::parse_format(&spec.data).map_err(|e| format_error(&spec.data, e))?;
    let data_time_count = data_tags.iter().filter(|t| **t == Tag::T).count();
    if data_time_count > 1 {
        return Err(bad(format!(
            "data format \"{}\" contains more than one 'T' tag",
            spec.data
        )));
    }

    let header_size: u64 = header_tags.iter().map(|t| format::tag_size(*t) as u64).sum();
    let data_packet_size: u64 = data_tags.iter().map(|t| format::tag_size(*t) as u64).sum();
    if header_size + data_packet_size > spec.buffer_size as u64 {
        return Err(bad(format!(
            "header_size ({header_size}) + data_packet_size ({data_packet_size}) exceeds buffer_size ({})",
            spec.buffer_size
        )));
    }

    let data_channels = data_tags.len() - data_time_count;
    if spec.channel_names.len() != data_channels {
        return Err(bad(format!(
            "channel_names has {} entries but data format \"{}\" declares {data_channels} channels",
            spec.channel_names.len(),
            spec.data
        )));
    }

    Ok(())
}

impl FileHeader {
    /// Check the whole-file invariants: at least one device, and device
    /// ids unique across `buffers`.
    pub fn validate(&self) -> Result<()> {
        if self.buffers.is_empty() {
            return Err(MtagError::HeaderParse(
                "header declares no devices under \"buffers\"".to_string(),
            ));
        }

        let mut seen_ids = HashSet::new();
        for (name, spec) in &self.buffers {
            validate_device(name, spec)?;
            if !seen_ids.insert(spec.id) {
                return Err(MtagError::BadSpec {
                    device: name.clone(),
                    reason: format!("device id {} is used by more than one device", spec.id),
                });
            }
        }

        Ok(())
    }

    /// Parse and validate a header from one line of the MTAG file (or the
    /// contents of an external-header file).
    pub fn parse(text: &str) -> Result<Self> {
        let header: FileHeader =
            serde_json::from_str(text).map_err(|e| MtagError::HeaderParse(e.to_string()))?;
        header.validate()?;
        Ok(header)
    }

    /// Read a side-channel JSON header from a filesystem path (§4.G),
    /// used when the in-file header is absent or must be overridden for
    /// recovery. Same shape and same validation as the in-file header.
    pub fn load_external(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(header: &str, data: &str, buffer_size: u32, channel_names: Vec<&str>) -> DeviceSpec {
        DeviceSpec {
            id: 1,
            time: 4093,
            header: header.to_string(),
            data: data.to_string(),
            buffer_size,
            split_channel: false,
            channel_names: channel_names.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn accepts_well_formed_spec() {
        let s = spec("BTx", "H", 10, vec!["ch0"]);
        assert!(validate_device("dev", &s).is_ok());
    }

    #[test]
    fn rejects_header_not_starting_with_b() {
        let mut s = spec("BTx", "H", 10, vec!["ch0"]);
        s.header = "TBx".to_string();
        assert!(validate_device("dev", &s).is_err());
    }

    #[test]
    fn rejects_header_without_exactly_one_time_tag() {
        let mut s = spec("BTx", "H", 10, vec!["ch0"]);
        s.header = "Bx".to_string();
        assert!(validate_device("dev", &s).is_err());
    }

    #[test]
    fn rejects_oversize_packet() {
        let s = spec("BTx", "H", 3, vec!["ch0"]);
        assert!(validate_device("dev", &s).is_err());
    }

    #[test]
    fn rejects_channel_name_count_mismatch() {
        let s = spec("BTx", "HB", 10, vec!["ch0"]);
        assert!(validate_device("dev", &s).is_err());
    }

    #[test]
    fn file_header_rejects_duplicate_ids() {
        let mut buffers = HashMap::new();
        buffers.insert("a".to_string(), spec("BTx", "H", 10, vec!["ch0"]));
        let mut b = spec("BTx", "H", 10, vec!["ch0"]);
        b.id = 1;
        buffers.insert("b".to_string(), b);

        let header = FileHeader {
            metadata: serde_json::json!({}),
            buffers,
        };
        assert!(header.validate().is_err());
    }

    #[test]
    fn file_header_rejects_empty_buffers() {
        let header = FileHeader {
            metadata: serde_json::json!({}),
            buffers: HashMap::new(),
        };
        assert!(header.validate().is_err());
    }
}
