//! End-to-end coverage for `mtag_redact::redact`: synthesize a fixture
//! with `mtag-gen`, redact a copy, then re-parse the redacted copy and
//! check that sample values are gone but the time axis survives intact.

use std::collections::HashMap;
use std::fs;

use mtag::accumulator::DataChunk;
use mtag::error::Result as MtagResult;
use mtag::sink::Sink;
use mtag_gen::DeviceFixture;

#[derive(Default)]
struct RecordingSink {
    chunks: HashMap<String, Vec<DataChunk>>,
}

impl Sink for RecordingSink {
    fn preallocate(&mut self, _: &str, _: u64, _: usize, _: usize) -> MtagResult<()> {
        Ok(())
    }
    fn write_metadata(&mut self, _: &serde_json::Value) -> MtagResult<()> {
        Ok(())
    }
    fn append(&mut self, device_name: &str, chunk: &DataChunk) -> MtagResult<()> {
        self.chunks.entry(device_name.to_string()).or_default().push(chunk.clone());
        Ok(())
    }
    fn finalize(&mut self) -> MtagResult<()> {
        Ok(())
    }
}

impl RecordingSink {
    fn all_time(&self, device: &str) -> Vec<f64> {
        self.chunks.get(device).into_iter().flatten().flat_map(|c| c.time.iter().copied()).collect()
    }
    fn all_data(&self, device: &str) -> Vec<Vec<f64>> {
        self.chunks.get(device).into_iter().flatten().flat_map(|c| c.data.iter().cloned()).collect()
    }
}

fn seed_scenario_s1() -> DeviceFixture {
    DeviceFixture {
        name: "dev".to_string(),
        id: 1,
        time: 4093,
        header_format: "BTx".to_string(),
        data_format: "H".to_string(),
        buffer_size: 10,
        value: 2.0,
        split_channel: false,
        channel_names: vec!["ch0".to_string()],
        num_buffers: 3,
    }
}

#[test]
fn redacts_payload_but_preserves_header_and_timestamps() {
    let fixture = seed_scenario_s1();
    let input = tempfile::NamedTempFile::new().unwrap();
    mtag_gen::write_sequential(input.path(), serde_json::json!({"name": "Lono"}), &[fixture]).unwrap();

    let working = tempfile::NamedTempFile::new().unwrap();
    fs::copy(input.path(), working.path()).unwrap();

    let (buffers_zeroed, bytes_zeroed) = mtag_redact::redact(input.path(), working.path(), false).unwrap();
    assert_eq!(buffers_zeroed, 3);
    assert!(bytes_zeroed > 0);

    // Re-parse the redacted file: same buffer counts, channel values all
    // zeroed, but the time axis (derived from the untouched sub-header)
    // is unaffected.
    let mut sink = RecordingSink::default();
    mtag::FileParser::new().parse(working.path(), None, &mut sink).unwrap();
    assert!(sink.all_data("dev").iter().all(|row| row == &vec![0.0]));
    let time = sink.all_time("dev");
    assert_eq!(time.len(), 6);
    for w in time.windows(2) {
        assert!(w[1] > w[0]);
    }
}

#[test]
fn redact_overflow_flag_zeros_padding_too() {
    // buffer_size=11: header(6) + 2*data_packet_size(2) = 10, leaving a
    // 1-byte overflow per buffer that `redact_overflow` covers.
    let mut fixture = seed_scenario_s1();
    fixture.buffer_size = 11;
    let input = tempfile::NamedTempFile::new().unwrap();
    mtag_gen::write_sequential(input.path(), serde_json::json!({}), &[fixture]).unwrap();

    let working = tempfile::NamedTempFile::new().unwrap();
    fs::copy(input.path(), working.path()).unwrap();
    let (_, bytes_zeroed_without) = mtag_redact::redact(input.path(), working.path(), false).unwrap();

    fs::copy(input.path(), working.path()).unwrap();
    let (_, bytes_zeroed_with) = mtag_redact::redact(input.path(), working.path(), true).unwrap();

    assert_eq!(bytes_zeroed_with, bytes_zeroed_without + 3 * 1);
}

#[test]
fn default_output_path_uses_redacted_prefix_and_gz_suffix() {
    let path = mtag_redact::default_output_path(std::path::Path::new("/tmp/dive-042.mtag"));
    assert_eq!(path, std::path::PathBuf::from("redacted-dive-042.mtag.gz"));
}
