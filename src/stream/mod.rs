//! Seekable byte streams backing the virtual filesystem.
pub mod disk;
pub mod memory;
pub mod view;

pub use disk::DiskStream;
pub use memory::{MemStream, MemStreamRef};
pub use view::BoundedView;

use std::io::{Read, Result, Seek, SeekFrom};

pub trait ReadSeek: Read + Seek + std::fmt::Debug {}

impl<T: Read + Seek + std::fmt::Debug> ReadSeek for T {}

/// Chunk size used by the line scanner.
const LINE_CHUNK: usize = 128;
/// Buffer size of a single bounded line read inside [`VfsStream::get_line`].
const LINE_BUF: usize = 512;

/// A stream opened through the virtual filesystem.
///
/// `Read`/`Seek` supply the primitive operations; everything else is built
/// on top of them. A stream knows its total length up front, so reads are
/// clamped to the declared size and end-of-stream is a position check.
///
/// After [`close`](VfsStream::close), reads return 0 bytes and seeks fail;
/// nothing panics.
pub trait VfsStream: Read + Seek + std::fmt::Debug {
    /// Declared size of the stream in bytes.
    fn len(&self) -> u64;

    /// Whether the stream is still usable.
    fn is_open(&self) -> bool;

    /// Releases the underlying storage. Further operations are no-ops.
    fn close(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_eof(&mut self) -> bool {
        if !self.is_open() {
            return true;
        }
        match self.stream_position() {
            Ok(pos) => pos >= self.len(),
            Err(_) => true,
        }
    }

    /// Reads bytes up to the next `delim` byte, scanning at most `max_count`
    /// bytes in fixed-size chunks.
    ///
    /// Returns the bytes before the delimiter and repositions the stream one
    /// byte past it. If no delimiter occurs within `max_count` scanned bytes
    /// (or before end of stream), returns everything scanned and leaves the
    /// position after the last scanned byte.
    fn read_line(&mut self, max_count: usize, delim: u8) -> Result<Vec<u8>> {
        let size = self.len();
        let mut out = Vec::new();
        while out.len() < max_count {
            let pos = self.stream_position()?;
            let want = LINE_CHUNK
                .min(max_count - out.len())
                .min(size.saturating_sub(pos) as usize);
            if want == 0 {
                break;
            }
            let mut chunk = vec![0u8; want];
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            match memchr::memchr(delim, &chunk[..n]) {
                Some(d) => {
                    out.extend_from_slice(&chunk[..d]);
                    self.seek(SeekFrom::Start(pos + d as u64 + 1))?;
                    return Ok(out);
                }
                None => out.extend_from_slice(&chunk[..n]),
            }
        }
        Ok(out)
    }

    /// Reads a whole line regardless of length, assembling it from bounded
    /// [`read_line`](VfsStream::read_line) calls.
    fn get_line(&mut self, delim: u8) -> Result<String> {
        let mut line = Vec::new();
        loop {
            let part = self.read_line(LINE_BUF, delim)?;
            let done = part.len() < LINE_BUF;
            line.extend_from_slice(&part);
            if done {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Skips past the next `delim` byte without materializing the content.
    /// Stops at end of stream if no delimiter is found.
    fn skip_line(&mut self, delim: u8) -> Result<()> {
        let size = self.len();
        loop {
            let pos = self.stream_position()?;
            let want = LINE_CHUNK.min(size.saturating_sub(pos) as usize);
            if want == 0 {
                return Ok(());
            }
            let mut chunk = vec![0u8; want];
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(());
            }
            if let Some(d) = memchr::memchr(delim, &chunk[..n]) {
                self.seek(SeekFrom::Start(pos + d as u64 + 1))?;
                return Ok(());
            }
        }
    }

    /// Reads the entire stream into a buffer sized to the declared length.
    fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.len() as usize];
        self.seek(SeekFrom::Start(0))?;
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}
