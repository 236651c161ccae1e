//! Deserializer for MTAG animal-tag binary telemetry logs.
//!
//! A minimal pipeline for one file: read the JSON header
//! ([`header::FileHeader`]), build a [`decoder::DecoderTable`], and hand
//! both to a [`parser::FileParser`] along with a [`sink::Sink`]
//! implementation (see `mtag-hdf5` for a concrete one). The parser
//! indexes the file by device, then streams every buffer through
//! [`unpack`] into the matching [`accumulator::DeviceAccumulator`],
//! which reconstructs a dense time axis (unwrapping 32-bit microsecond
//! overflow via [`unwrap`]) and drains [`accumulator::DataChunk`]s to
//! the sink as it goes.

pub mod accumulator;
pub mod decoder;
pub mod error;
pub mod format;
pub mod header;
pub mod parser;
pub mod reader;
pub mod sink;
pub mod unpack;
pub mod unwrap;
pub mod version;

pub use error::{MtagError, Result};
pub use parser::{FileParser, ParseProgress};
pub use sink::Sink;
