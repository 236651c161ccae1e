use thiserror::Error;

#[derive(Error, Debug)]
pub enum MtagError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("header parse error: {0}")]
    HeaderParse(String),

    #[error("unknown format tag '{tag}' in format string \"{format}\"")]
    UnknownTag { tag: char, format: String },

    #[error("invalid device spec for '{device}': {reason}")]
    BadSpec { device: String, reason: String },

    #[error("unknown device id {id} at file offset 0x{offset:X}")]
    UnknownId { id: u8, offset: u64 },

    #[error("short read at offset 0x{offset:X}: expected {expected} bytes, got {got}")]
    ShortRead {
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("no time source available for device '{device}': neither header_time nor per-sample time is populated")]
    NoTimeSource { device: String },

    #[error("sink error: {0}")]
    SinkError(String),
}

pub type Result<T> = std::result::Result<T, MtagError>;
