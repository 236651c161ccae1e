//! End-to-end tests assembled from the seed scenarios in spec.md §8:
//! synthesize a file with `mtag-gen`, parse it with `FileParser`, and
//! check the decoded output against a test-double `Sink` that just
//! records everything it's handed.

use std::collections::HashMap;
use std::path::Path;

use mtag::accumulator::DataChunk;
use mtag::error::Result;
use mtag::sink::Sink;
use mtag::FileParser;
use mtag_gen::DeviceFixture;

#[derive(Default)]
struct RecordingSink {
    preallocated: HashMap<String, (u64, usize, usize)>,
    chunks: HashMap<String, Vec<DataChunk>>,
    metadata: Option<serde_json::Value>,
    finalized: bool,
}

impl RecordingSink {
    fn all_time(&self, device: &str) -> Vec<f64> {
        self.chunks
            .get(device)
            .into_iter()
            .flatten()
            .flat_map(|c| c.time.iter().copied())
            .collect()
    }

    fn all_data(&self, device: &str) -> Vec<Vec<f64>> {
        self.chunks
            .get(device)
            .into_iter()
            .flatten()
            .flat_map(|c| c.data.iter().cloned())
            .collect()
    }
}

impl Sink for RecordingSink {
    fn preallocate(
        &mut self,
        device_name: &str,
        total_samples: u64,
        num_channels: usize,
        chunk_hint: usize,
    ) -> Result<()> {
        self.preallocated
            .insert(device_name.to_string(), (total_samples, num_channels, chunk_hint));
        Ok(())
    }

    fn write_metadata(&mut self, metadata: &serde_json::Value) -> Result<()> {
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    fn append(&mut self, device_name: &str, chunk: &DataChunk) -> Result<()> {
        self.chunks
            .entry(device_name.to_string())
            .or_default()
            .push(chunk.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        Ok(())
    }
}

fn parse_fixture(path: &Path) -> RecordingSink {
    let mut sink = RecordingSink::default();
    FileParser::new().parse(path, None, &mut sink).unwrap();
    assert!(sink.finalized);
    sink
}

/// S1: header="BTx", data="H", buffer_size=10, num_buffers=3, time=4093,
/// value=2, id=1. num_packets = (10-6)/2 = 2, so emitted length = 3*2=6.
#[test]
fn seed_scenario_s1_mode1_single_device() {
    let fixture = DeviceFixture {
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
    };

    let tmp = tempfile::NamedTempFile::new().unwrap();
    mtag_gen::write_sequential(tmp.path(), serde_json::json!({"name": "Lono"}), &[fixture])
        .unwrap();

    let sink = parse_fixture(tmp.path());
    let (total_samples, num_channels, chunk_hint) = sink.preallocated["dev"];
    assert_eq!(total_samples, 6);
    assert_eq!(num_channels, 1);
    assert_eq!(chunk_hint, 2);

    let time = sink.all_time("dev");
    assert_eq!(time.len(), 6);
    let data = sink.all_data("dev");
    assert!(data.iter().all(|row| row == &vec![2.0]));

    // Last emitted microsecond equals 3*4093.
    let last_micros = time.last().unwrap() * 1_000_000.0;
    assert!((last_micros - 3.0 * 4093.0).abs() < 1e-6);

    assert_eq!(sink.metadata, Some(serde_json::json!({"name": "Lono"})));
}

/// S2: header="BTx", data="HB", buffer_size=8192, num_buffers=4.
/// num_packets = (8192-6)/3 = 2728; two channels, all values equal 2.
#[test]
fn seed_scenario_s2_two_channel_device() {
    let fixture = DeviceFixture {
        name: "dev".to_string(),
        id: 2,
        time: 4093,
        header_format: "BTx".to_string(),
        data_format: "HB".to_string(),
        buffer_size: 8192,
        value: 2.0,
        split_channel: false,
        channel_names: vec!["ch0".to_string(), "ch1".to_string()],
        num_buffers: 4,
    };

    let tmp = tempfile::NamedTempFile::new().unwrap();
    mtag_gen::write_sequential(tmp.path(), serde_json::json!({}), &[fixture]).unwrap();

    let sink = parse_fixture(tmp.path());
    let (total_samples, num_channels, _) = sink.preallocated["dev"];
    assert_eq!(num_channels, 2);
    assert_eq!(total_samples, 4 * 2728);

    let data = sink.all_data("dev");
    assert_eq!(data.len(), 4 * 2728);
    assert!(data.iter().all(|row| row == &vec![2.0, 2.0]));
}

/// S3: header="BTx", data="TH", buffer_size=12, num_buffers=2, time=4093.
/// Data carries its own 'T', so Mode 2 is taken.
#[test]
fn seed_scenario_s3_mode2_per_sample_time() {
    let fixture = DeviceFixture {
        name: "dev".to_string(),
        id: 3,
        time: 4093,
        header_format: "BTx".to_string(),
        data_format: "TH".to_string(),
        buffer_size: 12,
        value: 2.0,
        split_channel: false,
        channel_names: vec!["ch0".to_string()],
        num_buffers: 2,
    };

    let tmp = tempfile::NamedTempFile::new().unwrap();
    mtag_gen::write_sequential(tmp.path(), serde_json::json!({}), &[fixture]).unwrap();

    let sink = parse_fixture(tmp.path());
    let time = sink.all_time("dev");
    // num_packets = (12-6)/5 = 1 per buffer, so 2 samples total.
    assert_eq!(time.len(), 2);
    for w in time.windows(2) {
        assert!(w[1] > w[0]);
    }
}

/// S6: two devices interleaved; each device's time axis is independently
/// strictly monotone, and per-device buffer counts match.
#[test]
fn seed_scenario_s6_two_devices_interleaved() {
    let a = DeviceFixture {
        name: "a".to_string(),
        id: 1,
        time: 1000,
        header_format: "BTx".to_string(),
        data_format: "H".to_string(),
        buffer_size: 10,
        value: 5.0,
        split_channel: false,
        channel_names: vec!["ch0".to_string()],
        num_buffers: 3,
    };
    let b = DeviceFixture {
        name: "b".to_string(),
        id: 2,
        time: 2000,
        header_format: "BTx".to_string(),
        data_format: "H".to_string(),
        buffer_size: 10,
        value: 7.0,
        split_channel: false,
        channel_names: vec!["ch0".to_string()],
        num_buffers: 3,
    };

    let tmp = tempfile::NamedTempFile::new().unwrap();
    mtag_gen::write_interleaved(tmp.path(), serde_json::json!({}), &[a, b]).unwrap();

    let sink = parse_fixture(tmp.path());
    for device in ["a", "b"] {
        let time = sink.all_time(device);
        assert_eq!(time.len(), 6);
        for w in time.windows(2) {
            assert!(w[1] > w[0]);
        }
    }
    assert!(sink.all_data("a").iter().all(|row| row == &vec![5.0]));
    assert!(sink.all_data("b").iter().all(|row| row == &vec![7.0]));
}

/// Devices with zero buffers in the file are skipped by preallocate and
/// never appear in the sink.
#[test]
fn device_with_no_buffers_is_skipped() {
    let present = DeviceFixture {
        name: "present".to_string(),
        id: 1,
        time: 1000,
        header_format: "BTx".to_string(),
        data_format: "H".to_string(),
        buffer_size: 10,
        value: 1.0,
        split_channel: false,
        channel_names: vec!["ch0".to_string()],
        num_buffers: 1,
    };

    let header = mtag_gen::build_header(
        serde_json::json!({}),
        &[
            present.clone(),
            DeviceFixture {
                name: "absent".to_string(),
                id: 9,
                ..present.clone()
            },
        ],
    );
    let tmp = tempfile::NamedTempFile::new().unwrap();
    {
        use std::io::Write;
        let mut f = std::fs::File::create(tmp.path()).unwrap();
        writeln!(f, "{}", serde_json::to_string(&header).unwrap()).unwrap();
        for frame in mtag_gen::device_buffer_frames(&present) {
            f.write_all(&frame).unwrap();
        }
    }

    let sink = parse_fixture(tmp.path());
    assert!(sink.preallocated.contains_key("present"));
    assert!(!sink.preallocated.contains_key("absent"));
}
