//! The contract the core library expects of a concrete columnar output
//! store (§4.F). This crate specifies the shape only; `mtag-hdf5`
//! implements it against an HDF5 file.

use serde_json::Value;

use crate::accumulator::DataChunk;
use crate::error::Result;

/// Destination for decoded per-device sample streams.
///
/// The `FileParser` treats the sink as exclusively owned for the
/// duration of `parse()`: `preallocate` is called once per non-empty
/// device right after pass 1, `write_metadata` once for the whole file,
/// `append` once per drain, and `finalize` once at the very end (or
/// after an aborted parse, so partial output can still be closed
/// cleanly).
pub trait Sink {
    /// Create `time`/`data` columns for `device_name` sized for
    /// `total_samples` rows and `num_channels` columns. `chunk_hint` is
    /// the device's natural sub-chunk size (the decoder's `num_packets`)
    /// so the sink can size its own write granularity without depending
    /// on `DataChunk::sub_chunks`.
    fn preallocate(
        &mut self,
        device_name: &str,
        total_samples: u64,
        num_channels: usize,
        chunk_hint: usize,
    ) -> Result<()>;

    /// Mirror the file header's free-form `metadata` object into the
    /// output's own metadata tree. JSON `null` is treated as NaN.
    fn write_metadata(&mut self, metadata: &Value) -> Result<()>;

    /// Append one drained chunk to `device_name`'s columns, growing them
    /// (typically by doubling) when capacity is exceeded.
    fn append(&mut self, device_name: &str, chunk: &DataChunk) -> Result<()>;

    /// Truncate every column to its final written length and flush.
    fn finalize(&mut self) -> Result<()>;
}
