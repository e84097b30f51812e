//! Bounded window over a shared container stream.
use super::VfsStream;
use std::io::{Read, Result, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

/// A fixed `(offset, size)` window into another open stream.
///
/// The container handle is shared between all views opened from the same
/// indexer; each read locks it, seeks to the translated absolute position
/// and reads at most the bytes remaining in the window. Local positions are
/// independent per view.
pub struct BoundedView<T: Read + Seek> {
    reader: Arc<Mutex<T>>,
    offset: u64,
    size: u64,
    pos: u64,
    open: bool,
}

impl<T: Read + Seek> std::fmt::Debug for BoundedView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedView")
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

impl<T: Read + Seek> BoundedView<T> {
    /// Creates a view over `reader` covering `size` bytes starting at
    /// absolute position `offset`.
    pub fn new(reader: Arc<Mutex<T>>, offset: u64, size: u64) -> Self {
        Self {
            reader,
            offset,
            size,
            pos: 0,
            open: true,
        }
    }
}

impl<T: Read + Seek> Read for BoundedView<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.open {
            return Ok(0);
        }
        let remaining = self.size.saturating_sub(self.pos);
        let bytes_to_read = (buf.len() as u64).min(remaining) as usize;
        if bytes_to_read == 0 {
            return Ok(0);
        }
        let mut reader = self.reader.lock().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to lock mutex: {}", e),
            )
        })?;
        reader.seek(SeekFrom::Start(self.offset + self.pos))?;
        let bytes_read = reader.read(&mut buf[..bytes_to_read])?;
        self.pos += bytes_read as u64;
        Ok(bytes_read)
    }
}

impl<T: Read + Seek> Seek for BoundedView<T> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if !self.open {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Stream is closed",
            ));
        }
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::End(offset) => {
                let target = self.size as i64 + offset;
                if target < 0 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "Seek from end resulted in negative position",
                    ));
                }
                target as u64
            }
            SeekFrom::Current(offset) => {
                let target = self.pos as i64 + offset;
                if target < 0 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "Seek before the start of the view",
                    ));
                }
                target as u64
            }
        };
        self.pos = new_pos;
        Ok(self.pos)
    }

    fn stream_position(&mut self) -> Result<u64> {
        Ok(self.pos)
    }
}

impl<T: Read + Seek> VfsStream for BoundedView<T> {
    fn len(&self) -> u64 {
        self.size
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemStream;

    fn container() -> Arc<Mutex<MemStream>> {
        Arc::new(Mutex::new(MemStream::new(b"0123456789abcdef".to_vec())))
    }

    #[test]
    fn test_window_read() {
        let mut view = BoundedView::new(container(), 4, 6);
        assert_eq!(view.len(), 6);
        let mut buf = [0u8; 16];
        assert_eq!(view.read(&mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], b"456789");
        assert_eq!(view.read(&mut buf).unwrap(), 0);
        assert!(view.is_eof());
    }

    #[test]
    fn test_window_seek() {
        let mut view = BoundedView::new(container(), 10, 6);
        view.seek(SeekFrom::End(-2)).unwrap();
        let mut buf = [0u8; 2];
        view.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ef");
        view.seek(SeekFrom::Start(2)).unwrap();
        view.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"cd");
    }

    #[test]
    fn test_interleaved_views() {
        let shared = container();
        let mut a = BoundedView::new(shared.clone(), 0, 4);
        let mut b = BoundedView::new(shared, 12, 4);
        let mut buf = [0u8; 2];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"01");
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"cd");
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"23");
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ef");
    }

    #[test]
    fn test_seek_past_window_reads_nothing() {
        let mut view = BoundedView::new(container(), 0, 4);
        view.seek(SeekFrom::Start(100)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(view.read(&mut buf).unwrap(), 0);
        assert!(view.is_eof());
    }

    #[test]
    fn test_closed_view() {
        let mut view = BoundedView::new(container(), 0, 4);
        view.close();
        let mut buf = [0u8; 4];
        assert_eq!(view.read(&mut buf).unwrap(), 0);
        assert!(view.seek(SeekFrom::Start(0)).is_err());
    }
}
