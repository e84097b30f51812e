//! Stream backed by a file on the real filesystem.
use super::VfsStream;
use anyhow::Result;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

/// A read-only stream over an OS file.
///
/// The file size is determined once at open time; the handle is released by
/// [`close`](VfsStream::close) or on drop.
#[derive(Debug)]
pub struct DiskStream {
    reader: Option<BufReader<File>>,
    size: u64,
}

impl DiskStream {
    /// Opens `path` for binary reading.
    pub fn open(path: &str) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open file '{}': {}", path, e))?;
        let mut reader = BufReader::new(file);
        let size = reader.seek(SeekFrom::End(0))?;
        reader.rewind()?;
        Ok(Self {
            reader: Some(reader),
            size,
        })
    }
}

impl Read for DiskStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.reader {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }
}

impl Seek for DiskStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match &mut self.reader {
            Some(reader) => reader.seek(pos),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Stream is closed",
            )),
        }
    }

    fn stream_position(&mut self) -> std::io::Result<u64> {
        match &mut self.reader {
            Some(reader) => reader.stream_position(),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Stream is closed",
            )),
        }
    }
}

impl VfsStream for DiskStream {
    fn len(&self) -> u64 {
        self.size
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn close(&mut self) {
        self.reader = None;
    }
}
