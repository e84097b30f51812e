//! POSIX USTAR container indexer (.tar)
use super::base::*;
use crate::ext::io::*;
use crate::stream::{BoundedView, ReadSeek, VfsStream};
use crate::types::*;
use anyhow::Result;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

/// TAR containers are sequences of 512-byte records.
const RECORD_SIZE: u64 = 512;
/// Byte range of the `name` header field.
const NAME_LEN: usize = 100;
/// Offset of the 12-byte octal `size` header field.
const SIZE_OFFSET: usize = 124;
/// Offset of the `magic` header field.
const MAGIC_OFFSET: usize = 257;

#[derive(Debug)]
/// USTAR Container Indexer Builder
pub struct TarIndexerBuilder {}

impl TarIndexerBuilder {
    /// Creates a new instance of `TarIndexerBuilder`.
    pub fn new() -> Self {
        Self {}
    }
}

impl IndexerBuilder for TarIndexerBuilder {
    fn build_from_file(
        &self,
        filename: &str,
        encoding: Encoding,
        config: &VfsConfig,
    ) -> Result<Box<dyn ArchiveIndexer>> {
        let f = std::fs::File::open(filename)
            .map_err(|e| anyhow::anyhow!("Failed to open container '{}': {}", filename, e))?;
        let reader = std::io::BufReader::new(f);
        Ok(Box::new(TarIndexer::new(reader, "", encoding, config)?))
    }

    fn build_from_reader(
        &self,
        reader: Box<dyn ReadSeek>,
        _filename: &str,
        encoding: Encoding,
        config: &VfsConfig,
    ) -> Result<Box<dyn ArchiveIndexer>> {
        Ok(Box::new(TarIndexer::new(reader, "", encoding, config)?))
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tar"]
    }

    fn is_this_format(&self, _filename: &str, buf: &[u8], buf_len: usize) -> Option<u8> {
        if buf_len >= MAGIC_OFFSET + 5 && &buf[MAGIC_OFFSET..MAGIC_OFFSET + 5] == b"ustar" {
            Some(10)
        } else {
            None
        }
    }

    fn format(&self) -> &'static ArchiveFormat {
        &ArchiveFormat::Tar
    }
}

/// Decodes the 12-byte size field: 11 octal ASCII digits, most significant
/// first, followed by a terminator byte that is ignored.
fn decode_octal_size(field: &[u8]) -> Result<u64> {
    let mut size = 0u64;
    for &b in &field[..11] {
        if !b.is_ascii_digit() || b > b'7' {
            anyhow::bail!("Invalid octal digit {:#04x} in size field", b);
        }
        size = size * 8 + u64::from(b - b'0');
    }
    Ok(size)
}

#[derive(Debug)]
/// USTAR Container Indexer
pub struct TarIndexer<T: Read + Seek + std::fmt::Debug> {
    reader: Arc<Mutex<T>>,
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl<T: Read + Seek + std::fmt::Debug> TarIndexer<T> {
    /// Creates a new `TarIndexer` by scanning the whole container once.
    ///
    /// * `reader` - The container stream.
    /// * `root` - Prefix prepended to every member name.
    /// * `encoding` - The encoding of member names.
    /// * `config` - Extra configuration options.
    pub fn new(mut reader: T, root: &str, encoding: Encoding, _config: &VfsConfig) -> Result<Self> {
        let entries = Self::read_index(&mut reader, root, encoding)?;
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        let reader = Arc::new(Mutex::new(reader));
        Ok(Self {
            reader,
            entries,
            index,
        })
    }

    fn read_index(reader: &mut T, root: &str, encoding: Encoding) -> Result<Vec<ArchiveEntry>> {
        let container_len = reader.stream_length()?;
        reader.rewind()?;
        let mut entries = Vec::new();
        let mut record = [0u8; RECORD_SIZE as usize];
        loop {
            match reader.read_exact(&mut record) {
                Ok(()) => {}
                // No zero-record terminator, the container just ends.
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            if record.iter().all(|&b| b == 0) {
                break;
            }
            let name_field = &record[..NAME_LEN];
            let name_len = name_field
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(NAME_LEN);
            let name = crate::utils::encoding::decode_to_string(encoding, &name_field[..name_len])
                .map_err(|e| anyhow::anyhow!("Failed to decode member name: {}", e))?;
            let size = decode_octal_size(&record[SIZE_OFFSET..SIZE_OFFSET + 12])
                .map_err(|e| anyhow::anyhow!("Bad header for member '{}': {}", name, e))?;
            let offset = reader.stream_position()?;
            if offset + size > container_len {
                anyhow::bail!(
                    "Member '{}' ({} bytes at {:#x}) extends past the end of the container",
                    name,
                    size,
                    offset
                );
            }
            // Directories and other zero-length members are not indexed.
            if size > 0 {
                entries.push(ArchiveEntry {
                    name: format!("{}{}", root, name),
                    offset,
                    size,
                    method: CompressionMethod::Stored,
                });
            }
            let blocks = size.div_ceil(RECORD_SIZE);
            reader.seek(SeekFrom::Current((blocks * RECORD_SIZE) as i64))?;
        }
        Ok(entries)
    }
}

impl<T: Read + Seek + std::fmt::Debug + 'static> ArchiveIndexer for TarIndexer<T> {
    fn iter_names<'a>(&'a self) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        Box::new(self.entries.iter().map(|e| e.name.as_str()))
    }

    fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    fn open(&self, name: &str) -> Result<Box<dyn VfsStream>> {
        let entry = self
            .entry(name)
            .ok_or_else(|| anyhow::anyhow!("Member '{}' not found in TAR container", name))?;
        Ok(Box::new(BoundedView::new(
            self.reader.clone(),
            entry.offset,
            entry.size,
        )))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
