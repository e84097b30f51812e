//! Streams over in-memory byte buffers.
use super::VfsStream;
use std::io::{Read, Result, Seek, SeekFrom};
use std::sync::Arc;

/// A stream over an in-memory buffer.
///
/// Constructed either from an owned `Vec<u8>` (the stream is the sole owner
/// and the buffer is released on close) or from a shared `Arc` so several
/// streams can serve the same bytes. Reads never copy past the buffer
/// bounds and seeks are clamped into `[0, len]`.
pub struct MemStream {
    data: Arc<Vec<u8>>,
    pos: usize,
    open: bool,
}

pub struct MemStreamRef<'a> {
    data: &'a [u8],
    pos: usize,
}

impl std::fmt::Debug for MemStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStream")
            .field("pos", &self.pos)
            .field("data_length", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for MemStreamRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStreamRef")
            .field("pos", &self.pos)
            .field("data_length", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl MemStream {
    /// Creates a stream that owns its buffer.
    pub fn new(data: Vec<u8>) -> Self {
        Self::from_shared(Arc::new(data))
    }

    /// Creates a stream over a buffer shared with other owners.
    pub fn from_shared(data: Arc<Vec<u8>>) -> Self {
        MemStream {
            data,
            pos: 0,
            open: true,
        }
    }
}

impl<'a> MemStreamRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        MemStreamRef { data, pos: 0 }
    }
}

impl Read for MemStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.open || self.pos >= self.data.len() {
            return Ok(0);
        }
        let bytes_to_read = buf.len().min(self.data.len() - self.pos);
        buf[..bytes_to_read].copy_from_slice(&self.data[self.pos..self.pos + bytes_to_read]);
        self.pos += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl Seek for MemStream {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if !self.open {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Stream is closed",
            ));
        }
        let len = self.data.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset.min(len as u64) as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        self.pos = target.clamp(0, len) as usize;
        Ok(self.pos as u64)
    }

    fn stream_position(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn rewind(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }
}

impl VfsStream for MemStream {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
        self.data = Arc::new(Vec::new());
        self.pos = 0;
    }
}

impl<'a> Read for MemStreamRef<'a> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pos >= self.data.len() {
            return Ok(0);
        }
        let bytes_to_read = buf.len().min(self.data.len() - self.pos);
        buf[..bytes_to_read].copy_from_slice(&self.data[self.pos..self.pos + bytes_to_read]);
        self.pos += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl<'a> Seek for MemStreamRef<'a> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match pos {
            SeekFrom::Start(offset) => {
                if offset > self.data.len() as u64 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "Seek position is beyond the end of the data",
                    ));
                }
                self.pos = offset as usize;
            }
            SeekFrom::End(offset) => {
                let end_pos = self.data.len() as i64 + offset;
                if end_pos < 0 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "Seek from end resulted in negative position",
                    ));
                }
                self.pos = end_pos as usize;
            }
            SeekFrom::Current(offset) => {
                let new_pos = (self.pos as i64 + offset) as usize;
                if new_pos > self.data.len() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "Seek position is beyond the end of the data",
                    ));
                }
                self.pos = new_pos;
            }
        }
        Ok(self.pos as u64)
    }

    fn stream_position(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn rewind(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_clamps_to_size() {
        let mut stream = MemStream::new(b"abcde".to_vec());
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"abcde");
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        assert!(stream.is_eof());
    }

    #[test]
    fn test_last_byte_is_readable() {
        let mut stream = MemStream::new(b"xyz".to_vec());
        stream.seek(SeekFrom::Start(2)).unwrap();
        assert!(!stream.is_eof());
        let mut buf = [0u8; 1];
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'z');
        assert!(stream.is_eof());
    }

    #[test]
    fn test_seek_clamps() {
        let mut stream = MemStream::new(b"abcde".to_vec());
        assert_eq!(stream.seek(SeekFrom::Start(100)).unwrap(), 5);
        assert_eq!(stream.seek(SeekFrom::End(-100)).unwrap(), 0);
        assert_eq!(stream.seek(SeekFrom::Current(3)).unwrap(), 3);
        assert_eq!(stream.seek(SeekFrom::Current(100)).unwrap(), 5);
    }

    #[test]
    fn test_shared_buffer() {
        let data = Arc::new(b"shared".to_vec());
        let mut a = MemStream::from_shared(data.clone());
        let mut b = MemStream::from_shared(data);
        assert_eq!(a.read_all().unwrap(), b"shared");
        assert_eq!(b.read_all().unwrap(), b"shared");
    }

    #[test]
    fn test_close() {
        let mut stream = MemStream::new(b"abc".to_vec());
        stream.close();
        assert!(!stream.is_open());
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        assert!(stream.seek(SeekFrom::Start(0)).is_err());
        assert!(stream.is_eof());
    }
}
