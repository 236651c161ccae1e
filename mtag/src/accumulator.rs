//! Per-device accumulator: a bounded buffer pool that interleaves raw
//! samples with sub-header-derived timing, reconstructs a dense time axis
//! by interpolation, and corrects 32-bit timestamp overflow via the time
//! unwrapper (§4.D).

use std::collections::VecDeque;

use crate::error::{MtagError, Result};
use crate::unwrap::{unwrap, DEFAULT_BAD_FRAC, MAX_TIME};

/// One drained window: a dense time axis in seconds and a `len x
/// num_channels` sample matrix, row-major (one inner `Vec` per sample).
#[derive(Debug, Clone, PartialEq)]
pub struct DataChunk {
    pub time: Vec<f64>,
    pub data: Vec<Vec<f64>>,
    /// The decoder's `num_packets` for this device — the natural
    /// sub-chunk size the reference generator re-slices into before
    /// handing data to the sink one buffer's worth at a time.
    pub chunk_size: usize,
}

impl DataChunk {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn num_channels(&self) -> usize {
        self.data.first().map(|row| row.len()).unwrap_or(0)
    }

    /// Iterate `chunk_size`-row slices of this chunk's time axis and data
    /// matrix, mirroring the reference generator's `DataWrite.sub_chunks`.
    pub fn sub_chunks(&self) -> impl Iterator<Item = (&[f64], &[Vec<f64>])> + '_ {
        let step = self.chunk_size.max(1);
        let total = self.time.len();
        (0..total.div_ceil(step)).map(move |i| {
            let start = i * step;
            let end = (start + step).min(total);
            (&self.time[start..end], &self.data[start..end])
        })
    }
}

/// Accumulates one device's decoded buffers between drains.
pub struct DeviceAccumulator {
    name: String,
    header_data: VecDeque<Vec<f64>>,
    header_time: VecDeque<u64>,
    data: Vec<VecDeque<f64>>,
    time: VecDeque<u64>,
    time_offset: u64,
    last_time: u64,
    num_buffers: u64,
    pop_boundary: u64,
    chunk_size: usize,
}

impl DeviceAccumulator {
    pub fn new(name: String, num_channels: usize, chunk_size: usize, pop_boundary: u64) -> Self {
        DeviceAccumulator {
            name,
            header_data: VecDeque::new(),
            header_time: VecDeque::new(),
            data: (0..num_channels).map(|_| VecDeque::new()).collect(),
            time: VecDeque::new(),
            time_offset: 0,
            last_time: 0,
            num_buffers: 0,
            pop_boundary,
            chunk_size,
        }
    }

    pub fn num_buffers(&self) -> u64 {
        self.num_buffers
    }

    /// Push one buffer's decoded output. Returns `true` once `num_buffers`
    /// reaches `pop_boundary`, signalling the caller should drain.
    pub fn append(
        &mut self,
        header_data: Vec<f64>,
        header_time: Option<u64>,
        per_channel_data: Vec<Vec<f64>>,
        per_sample_time: Vec<u64>,
    ) -> bool {
        if !header_data.is_empty() {
            self.header_data.push_back(header_data);
        }
        if let Some(t) = header_time {
            self.header_time.push_back(t);
        }
        for (queue, samples) in self.data.iter_mut().zip(per_channel_data) {
            queue.extend(samples);
        }
        if !per_sample_time.is_empty() {
            self.time.extend(per_sample_time);
        }

        self.num_buffers += 1;
        debug_assert_eq!(
            self.num_buffers,
            self.header_time.len() as u64,
            "every physical buffer must carry exactly one sub-header timestamp"
        );

        self.num_buffers >= self.pop_boundary
    }

    /// Drain `n_buffers` buffers' worth of samples (`n_buffers *
    /// num_packets_per_buffer` rows) into one [`DataChunk`].
    pub fn drain(&mut self, n_buffers: u64, num_packets_per_buffer: u32) -> Result<DataChunk> {
        if n_buffers == 0 {
            return Ok(DataChunk {
                time: Vec::new(),
                data: Vec::new(),
                chunk_size: num_packets_per_buffer as usize,
            });
        }

        let total = (n_buffers * num_packets_per_buffer as u64) as usize;
        let mode1 = !self.header_time.is_empty() && self.time.is_empty();
        let mode2 = !self.time.is_empty();

        let (raw_time, overflows) = if mode1 {
            self.drain_mode1(n_buffers, num_packets_per_buffer)
        } else if mode2 {
            self.drain_mode2(total)?
        } else {
            return Err(MtagError::NoTimeSource {
                device: self.name.clone(),
            });
        };

        if !self.header_data.is_empty() {
            for _ in 0..n_buffers {
                self.header_data.pop_front();
            }
        }

        self.time_offset += overflows as u64 * MAX_TIME as u64;

        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.data.len());
        for queue in self.data.iter_mut() {
            let mut col = Vec::with_capacity(total);
            for _ in 0..total {
                col.push(queue.pop_front().unwrap_or(f64::NAN));
            }
            columns.push(col);
        }

        let mut rows = Vec::with_capacity(total);
        for i in 0..total {
            rows.push(columns.iter().map(|c| c[i]).collect());
        }

        self.num_buffers -= n_buffers;

        Ok(DataChunk {
            time: raw_time.into_iter().map(|t| t / 1_000_000.0).collect(),
            data: rows,
            chunk_size: num_packets_per_buffer as usize,
        })
    }

    /// Mode 1: sub-header time only. Anchors on `last_time` plus the next
    /// `n_buffers` sub-header timestamps, unwraps them, and interpolates
    /// `num_packets_per_buffer` samples between each anchor pair
    /// (excluding the left endpoint, including the right). The anchors
    /// themselves are integer microseconds, but the interpolated samples
    /// between them are not — `np.linspace`-style, carried as `f64`
    /// microseconds with no rounding, so a sub-step below 1us still moves
    /// the axis forward.
    fn drain_mode1(&mut self, n_buffers: u64, num_packets_per_buffer: u32) -> (Vec<f64>, usize) {
        let mut anchors = Vec::with_capacity(n_buffers as usize + 1);
        anchors.push(self.last_time as i64);
        for _ in 0..n_buffers {
            let t = self.header_time.pop_front().expect("caller verified header_time is non-empty");
            anchors.push(t as i64);
        }

        let (unwrapped, overflows) = unwrap(&anchors, MAX_TIME, DEFAULT_BAD_FRAC);

        let np = num_packets_per_buffer as f64;
        let mut time = Vec::with_capacity(n_buffers as usize * num_packets_per_buffer as usize);
        for k in 0..n_buffers as usize {
            let t0 = unwrapped[k] as f64;
            let t1 = unwrapped[k + 1] as f64;
            for j in 1..=num_packets_per_buffer as usize {
                let frac = j as f64 / np;
                time.push(t0 * (1.0 - frac) + t1 * frac);
            }
        }

        self.last_time = unwrapped[n_buffers as usize] as u64;
        (time, overflows)
    }

    /// Mode 2: per-sample time present. Pops `total` entries from `time`,
    /// applies the running `time_offset`, and unwraps. Also drops
    /// `n_buffers` stale `header_time` entries (if any) so that queue does
    /// not grow unbounded while unused.
    fn drain_mode2(&mut self, total: usize) -> Result<(Vec<f64>, usize)> {
        let mut popped = Vec::with_capacity(total);
        for _ in 0..total {
            let t = self.time.pop_front().ok_or_else(|| MtagError::NoTimeSource {
                device: self.name.clone(),
            })?;
            popped.push(t as i64 + self.time_offset as i64);
        }

        let (unwrapped, overflows) = unwrap(&popped, MAX_TIME, DEFAULT_BAD_FRAC);
        let unwrapped: Vec<f64> = unwrapped.into_iter().map(|t| t as f64).collect();

        if !self.header_time.is_empty() {
            let n_buffers = total as u64 / self.chunk_size.max(1) as u64;
            for _ in 0..n_buffers {
                self.header_time.pop_front();
            }
        }

        Ok((unwrapped, overflows))
    }
}
