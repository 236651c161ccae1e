//! HDF5 sink adapter (§4.F): implements `mtag::sink::Sink` against an
//! HDF5 file, one group per device holding resizable `time`/`data`
//! datasets, plus a `metadata` group mirroring the file header's
//! free-form JSON object (nested objects become subgroups, scalars
//! become attributes, `null` becomes NaN).

use std::collections::HashMap;
use std::path::Path;

use hdf5_metno::types::VarLenUnicode;
use hdf5_metno::{Dataset, Extents, File as H5File, Group};
use serde_json::Value;

use mtag::accumulator::DataChunk;
use mtag::error::{MtagError, Result};
use mtag::sink::Sink;

fn h5_err(context: &str, e: hdf5_metno::Error) -> MtagError {
    MtagError::SinkError(format!("{context}: {e}"))
}

struct DeviceColumns {
    time: Dataset,
    data: Dataset,
    len: u64,
    capacity: u64,
    num_channels: usize,
}

impl DeviceColumns {
    fn ensure_capacity(&mut self, additional: u64) -> Result<()> {
        if self.len + additional <= self.capacity {
            return Ok(());
        }
        let mut new_cap = self.capacity.max(1);
        while new_cap < self.len + additional {
            new_cap *= 2;
        }
        self.time
            .resize((new_cap as usize,))
            .map_err(|e| h5_err("resizing time dataset", e))?;
        self.data
            .resize((new_cap as usize, self.num_channels))
            .map_err(|e| h5_err("resizing data dataset", e))?;
        self.capacity = new_cap;
        Ok(())
    }
}

/// An HDF5-backed `Sink`: one file, one group per device.
pub struct Hdf5Sink {
    file: H5File,
    devices: HashMap<String, DeviceColumns>,
}

impl Hdf5Sink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = H5File::create(path).map_err(|e| h5_err("creating HDF5 file", e))?;
        Ok(Hdf5Sink {
            file,
            devices: HashMap::new(),
        })
    }
}

impl Sink for Hdf5Sink {
    fn preallocate(
        &mut self,
        device_name: &str,
        total_samples: u64,
        num_channels: usize,
        chunk_hint: usize,
    ) -> Result<()> {
        let group = self
            .file
            .create_group(device_name)
            .map_err(|e| h5_err("creating device group", e))?;
        let chunk = chunk_hint.max(1);
        let initial = total_samples.max(1) as usize;

        let time = group
            .new_dataset::<f64>()
            .shape(Extents::resizable(vec![initial]))
            .chunk((chunk,))
            .create("time")
            .map_err(|e| h5_err("creating time dataset", e))?;

        let data = group
            .new_dataset::<f64>()
            .shape(Extents::resizable(vec![initial, num_channels]))
            .chunk((chunk, num_channels.max(1)))
            .create("data")
            .map_err(|e| h5_err("creating data dataset", e))?;

        self.devices.insert(
            device_name.to_string(),
            DeviceColumns {
                time,
                data,
                len: 0,
                capacity: initial as u64,
                num_channels,
            },
        );
        Ok(())
    }

    fn write_metadata(&mut self, metadata: &Value) -> Result<()> {
        let group = self
            .file
            .create_group("metadata")
            .map_err(|e| h5_err("creating metadata group", e))?;
        write_json_tree(&group, metadata).map_err(|e| h5_err("writing metadata", e))
    }

    fn append(&mut self, device_name: &str, chunk: &DataChunk) -> Result<()> {
        let columns = self.devices.get_mut(device_name).ok_or_else(|| {
            MtagError::SinkError(format!("append before preallocate for device '{device_name}'"))
        })?;

        for (sub_time, sub_data) in chunk.sub_chunks() {
            if sub_time.is_empty() {
                continue;
            }
            columns.ensure_capacity(sub_time.len() as u64)?;
            let start = columns.len as usize;
            let end = start + sub_time.len();

            columns
                .time
                .write_slice(sub_time, start..end)
                .map_err(|e| h5_err("writing time slice", e))?;

            let mut flat = Vec::with_capacity(sub_data.len() * columns.num_channels);
            for row in sub_data {
                flat.extend(row.iter().copied());
            }
            let array =
                ndarray::Array2::from_shape_vec((sub_data.len(), columns.num_channels), flat)
                    .map_err(|e| MtagError::SinkError(format!("reshaping data chunk: {e}")))?;
            columns
                .data
                .write_slice(&array, (start..end, ..))
                .map_err(|e| h5_err("writing data slice", e))?;

            columns.len = end as u64;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        for columns in self.devices.values_mut() {
            columns
                .time
                .resize((columns.len as usize,))
                .map_err(|e| h5_err("truncating time dataset", e))?;
            columns
                .data
                .resize((columns.len as usize, columns.num_channels))
                .map_err(|e| h5_err("truncating data dataset", e))?;
        }
        self.file
            .flush()
            .map_err(|e| h5_err("flushing HDF5 file", e))?;
        Ok(())
    }
}

/// Mirror a JSON object into an HDF5 group tree: nested objects become
/// subgroups, scalars become attributes, arrays are stashed as their
/// JSON encoding, and `null` becomes NaN.
fn write_json_tree(group: &Group, value: &Value) -> hdf5_metno::Result<()> {
    let map = match value {
        Value::Object(map) => map,
        _ => return Ok(()),
    };

    for (key, v) in map {
        match v {
            Value::Object(_) => {
                let child = group.create_group(key)?;
                write_json_tree(&child, v)?;
            }
            Value::Null => {
                group
                    .new_attr::<f64>()
                    .create(key.as_str())?
                    .write_scalar(&f64::NAN)?;
            }
            Value::Bool(b) => {
                group
                    .new_attr::<i8>()
                    .create(key.as_str())?
                    .write_scalar(&(*b as i8))?;
            }
            Value::Number(n) => {
                let f = n.as_f64().unwrap_or(f64::NAN);
                group
                    .new_attr::<f64>()
                    .create(key.as_str())?
                    .write_scalar(&f)?;
            }
            Value::String(s) => {
                let text: VarLenUnicode = s.parse().unwrap_or_default();
                group
                    .new_attr::<VarLenUnicode>()
                    .create(key.as_str())?
                    .write_scalar(&text)?;
            }
            Value::Array(_) => {
                let encoded = serde_json::to_string(v).unwrap_or_default();
                let text: VarLenUnicode = encoded.parse().unwrap_or_default();
                group
                    .new_attr::<VarLenUnicode>()
                    .create(key.as_str())?
                    .write_scalar(&text)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtag_gen::DeviceFixture;

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
    fn parses_fixture_into_hdf5_file() {
        let fixture = seed_scenario_s1();
        let input = tempfile::NamedTempFile::new().unwrap();
        mtag_gen::write_sequential(
            input.path(),
            serde_json::json!({"name": "Lono"}),
            &[fixture],
        )
        .unwrap();

        let output = tempfile::NamedTempFile::new().unwrap();
        let mut sink = Hdf5Sink::create(output.path()).unwrap();
        mtag::FileParser::new()
            .parse(input.path(), None, &mut sink)
            .unwrap();
        sink.finalize().unwrap();

        let file = hdf5_metno::File::open(output.path()).unwrap();
        let group = file.group("dev").unwrap();
        let time: Vec<f64> = group.dataset("time").unwrap().read_raw().unwrap();
        assert_eq!(time.len(), 6);
        for w in time.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn writes_null_metadata_as_nan() {
        let output = tempfile::NamedTempFile::new().unwrap();
        let mut sink = Hdf5Sink::create(output.path()).unwrap();
        sink.write_metadata(&serde_json::json!({"name": "Lono", "notes": null}))
            .unwrap();
        sink.finalize().unwrap();

        let file = hdf5_metno::File::open(output.path()).unwrap();
        let group = file.group("metadata").unwrap();
        let notes: f64 = group.attr("notes").unwrap().read_scalar().unwrap();
        assert!(notes.is_nan());
    }
}
