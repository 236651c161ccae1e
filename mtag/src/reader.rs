//! Sequential byte source over an MTAG file (§4.H).
//!
//! Exposes `read`/`readline`/`tell`/`seek` plus a `bytes_read` counter
//! that is independent of `tell()`: it only advances on `read`/`readline`
//! and exists purely so a caller (the progress-bar front-end, out of
//! scope here) can report progress without caring about seeks. A
//! bookmark captured by `save_current_loc` lets the two-pass file parser
//! return to its pass-1 starting offset after indexing the file.

use std::fs::File;
use std::io::{self, BufReader, Read as _, Seek, SeekFrom};
use std::path::Path;

use crate::error::{MtagError, Result};

/// Where a `seek` offset is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// A bookmark captured by [`Reader::save_current_loc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookmark(u64);

/// Sequential + seek/tell byte source over an MTAG file.
pub struct Reader {
    inner: BufReader<File>,
    bytes_read: u64,
}

impl Reader {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Reader {
            inner: BufReader::new(File::open(path)?),
            bytes_read: 0,
        })
    }

    /// Read exactly `n` bytes. A short read (EOF before `n` bytes) is
    /// `MtagError::ShortRead`, carrying the offset the read started at.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        let offset = self.tell()?;
        let mut buf = vec![0u8; n];
        let mut got = 0usize;
        while got < n {
            let m = self.inner.read(&mut buf[got..])?;
            if m == 0 {
                break;
            }
            got += m;
        }
        self.bytes_read += got as u64;
        if got < n {
            return Err(MtagError::ShortRead {
                offset,
                expected: n,
                got,
            });
        }
        Ok(buf)
    }

    /// Read up to and including the next `0x0A`, or to EOF if the file
    /// ends first. The terminator, if present, is included in the result.
    pub fn readline(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = self.inner.read(&mut byte)?;
            if n == 0 {
                break;
            }
            self.bytes_read += 1;
            buf.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        Ok(buf)
    }

    /// Current absolute offset. Does not affect `bytes_read`.
    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Seek relative to `whence`. Does not affect `bytes_read`.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let pos = match whence {
            Whence::Set => SeekFrom::Start(offset as u64),
            Whence::Cur => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        Ok(self.inner.seek(pos)?)
    }

    /// Bytes consumed via `read`/`readline` since the reader was opened,
    /// independent of `tell()` (which moves on `seek` too). Used to
    /// drive progress reporting, not parser logic.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Capture the current offset for a later [`Reader::restore`].
    pub fn save_current_loc(&mut self) -> Result<Bookmark> {
        Ok(Bookmark(self.tell()?))
    }

    /// Return to a previously captured bookmark.
    pub fn restore(&mut self, bookmark: Bookmark) -> Result<u64> {
        self.seek(bookmark.0 as i64, Whence::Set)
    }
}
