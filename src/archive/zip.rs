//! ZIP container indexer (.zip, .3dp)
use super::base::*;
use crate::ext::io::*;
use crate::stream::{BoundedView, MemStreamRef, ReadSeek, VfsStream};
use crate::types::*;
use anyhow::Result;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

#[cfg(feature = "deflate")]
use crate::stream::MemStream;

const LOCAL_FILE_SIG: u32 = 0x04034b50;
const CENTRAL_DIR_SIG: u32 = 0x02014b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x06054b50;
/// Fixed size of the end-of-central-directory record.
const END_RECORD_SIZE: u64 = 22;
/// An archive comment can push the end record back by at most this much.
const MAX_COMMENT_LEN: u64 = 65535;

#[derive(Debug)]
/// ZIP Container Indexer Builder
pub struct ZipIndexerBuilder {}

impl ZipIndexerBuilder {
    /// Creates a new instance of `ZipIndexerBuilder`.
    pub fn new() -> Self {
        Self {}
    }
}

impl IndexerBuilder for ZipIndexerBuilder {
    fn build_from_file(
        &self,
        filename: &str,
        encoding: Encoding,
        config: &VfsConfig,
    ) -> Result<Box<dyn ArchiveIndexer>> {
        let f = std::fs::File::open(filename)
            .map_err(|e| anyhow::anyhow!("Failed to open container '{}': {}", filename, e))?;
        let reader = std::io::BufReader::new(f);
        Ok(Box::new(ZipIndexer::new(reader, encoding, config)?))
    }

    fn build_from_reader(
        &self,
        reader: Box<dyn ReadSeek>,
        _filename: &str,
        encoding: Encoding,
        config: &VfsConfig,
    ) -> Result<Box<dyn ArchiveIndexer>> {
        Ok(Box::new(ZipIndexer::new(reader, encoding, config)?))
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["zip", "3dp"]
    }

    fn is_this_format(&self, _filename: &str, buf: &[u8], buf_len: usize) -> Option<u8> {
        if buf_len >= 4 && buf.starts_with(&LOCAL_FILE_SIG.to_le_bytes()) {
            Some(10)
        } else if buf_len >= 4 && buf.starts_with(&END_OF_CENTRAL_DIR_SIG.to_le_bytes()) {
            // An empty archive starts directly with the end record.
            Some(5)
        } else {
            None
        }
    }

    fn format(&self) -> &'static ArchiveFormat {
        &ArchiveFormat::Zip
    }
}

#[derive(Debug)]
/// ZIP Container Indexer
pub struct ZipIndexer<T: Read + Seek + std::fmt::Debug> {
    reader: Arc<Mutex<T>>,
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl<T: Read + Seek + std::fmt::Debug> ZipIndexer<T> {
    /// Creates a new `ZipIndexer` by walking the central directory once.
    ///
    /// * `reader` - The container stream.
    /// * `encoding` - The encoding of member names.
    /// * `config` - Extra configuration options.
    pub fn new(mut reader: T, encoding: Encoding, _config: &VfsConfig) -> Result<Self> {
        let entries = Self::read_index(&mut reader, encoding)?;
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

    fn read_index(reader: &mut T, encoding: Encoding) -> Result<Vec<ArchiveEntry>> {
        let container_len = reader.stream_length()?;
        let (cd_offset, entry_count) = Self::find_end_record(reader, container_len)?;
        reader.seek(SeekFrom::Start(cd_offset as u64))?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let sig = reader.read_u32()?;
            if sig != CENTRAL_DIR_SIG {
                anyhow::bail!("Bad central directory signature {:#010x}", sig);
            }
            reader.seek_relative(2 + 2 + 2)?; // version made by, version needed, flags
            let method = reader.read_u16()?;
            reader.seek_relative(2 + 2 + 4 + 4)?; // mod time, mod date, crc32, compressed size
            let uncompressed_size = reader.read_u32()?;
            let name_len = reader.read_u16()? as usize;
            let extra_len = reader.read_u16()? as i64;
            let comment_len = reader.read_u16()? as i64;
            reader.seek_relative(2 + 2 + 4)?; // disk number start, internal attrs, external attrs
            let local_offset = reader.read_u32()?;
            let name = reader.read_fstring(name_len, encoding, false)?;
            match method {
                0 => entries.push(ArchiveEntry {
                    name,
                    offset: local_offset as u64,
                    size: uncompressed_size as u64,
                    method: CompressionMethod::Stored,
                }),
                #[cfg(feature = "deflate")]
                8 => entries.push(ArchiveEntry {
                    name,
                    offset: local_offset as u64,
                    size: uncompressed_size as u64,
                    method: CompressionMethod::Deflate,
                }),
                #[cfg(not(feature = "deflate"))]
                8 => {
                    eprintln!(
                        "Warning: Skipping member '{}': deflate support is not compiled in",
                        name
                    );
                    crate::COUNTER.inc_warning();
                }
                m => {
                    eprintln!(
                        "Warning: Skipping member '{}': unsupported compression method {} ({})",
                        name,
                        m,
                        zip_method_name(m)
                    );
                    crate::COUNTER.inc_warning();
                }
            }
            reader.seek_relative(extra_len + comment_len)?;
        }
        Ok(entries)
    }

    /// Locates the end-of-central-directory record and returns the central
    /// directory offset and total entry count.
    ///
    /// Archives without a trailing comment have the record in the last 22
    /// bytes; otherwise the tail is scanned backward for a signature whose
    /// comment length reaches exactly to the end of the container.
    fn find_end_record(reader: &mut T, container_len: u64) -> Result<(u32, u16)> {
        if container_len < END_RECORD_SIZE {
            anyhow::bail!("Container is too small to hold an end-of-central-directory record");
        }
        reader.seek(SeekFrom::Start(container_len - END_RECORD_SIZE))?;
        if reader.read_u32()? == END_OF_CENTRAL_DIR_SIG {
            return Self::read_end_record(reader);
        }
        let tail_len = container_len.min(END_RECORD_SIZE + MAX_COMMENT_LEN);
        let tail_start = container_len - tail_len;
        reader.seek(SeekFrom::Start(tail_start))?;
        let tail = reader.read_exact_vec(tail_len as usize)?;
        let mut tail_reader = MemStreamRef::new(&tail);
        let needle = END_OF_CENTRAL_DIR_SIG.to_le_bytes();
        for pos in memchr::memmem::rfind_iter(&tail, &needle) {
            if pos as u64 + END_RECORD_SIZE > tail_len {
                continue;
            }
            let comment_len = tail_reader.peek_u16_at(pos + 20)? as u64;
            if tail_start + pos as u64 + END_RECORD_SIZE + comment_len == container_len {
                reader.seek(SeekFrom::Start(tail_start + pos as u64 + 4))?;
                return Self::read_end_record(reader);
            }
        }
        anyhow::bail!("End-of-central-directory signature not found")
    }

    /// Reads the fields after the signature of an end record.
    fn read_end_record(reader: &mut T) -> Result<(u32, u16)> {
        reader.seek_relative(2 + 2 + 2)?; // disk number, disk with CD start, entries on this disk
        let entry_count = reader.read_u16()?;
        reader.seek_relative(4)?; // central directory size
        let cd_offset = reader.read_u32()?;
        Ok((cd_offset, entry_count))
    }

    fn open_entry(&self, entry: &ArchiveEntry) -> Result<Box<dyn VfsStream>>
    where
        T: 'static,
    {
        let mut reader = self
            .reader
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock mutex: {}", e))?;
        reader.seek(SeekFrom::Start(entry.offset))?;
        let sig = reader.read_u32()?;
        if sig != LOCAL_FILE_SIG {
            anyhow::bail!(
                "Bad local file header signature {:#010x} for member '{}'",
                sig,
                entry.name
            );
        }
        // The local header is authoritative at open time; well-formed
        // archives match the central directory copy.
        reader.seek_relative(2 + 2)?; // version needed, flags
        let method = reader.read_u16()?;
        reader.seek_relative(2 + 2 + 4)?; // mod time, mod date, crc32
        let compressed_size = reader.read_u32()? as u64;
        let uncompressed_size = reader.read_u32()? as u64;
        let name_len = reader.read_u16()? as i64;
        let extra_len = reader.read_u16()? as i64;
        reader.seek_relative(name_len + extra_len)?;
        match method {
            0 => {
                let data_offset = reader.stream_position()?;
                drop(reader);
                Ok(Box::new(BoundedView::new(
                    self.reader.clone(),
                    data_offset,
                    uncompressed_size,
                )))
            }
            #[cfg(feature = "deflate")]
            8 => {
                let compressed = reader.read_exact_vec(compressed_size as usize)?;
                drop(reader);
                let mut data = Vec::with_capacity(uncompressed_size as usize);
                let mut decoder = flate2::read::DeflateDecoder::new(&compressed[..]);
                decoder
                    .read_to_end(&mut data)
                    .map_err(|e| anyhow::anyhow!("Failed to inflate member '{}': {}", entry.name, e))?;
                if data.len() as u64 != uncompressed_size {
                    anyhow::bail!(
                        "Member '{}' inflated to {} bytes, expected {}",
                        entry.name,
                        data.len(),
                        uncompressed_size
                    );
                }
                Ok(Box::new(MemStream::new(data)))
            }
            m => anyhow::bail!(
                "Unsupported compression method {} ({}) for member '{}'",
                m,
                zip_method_name(m),
                entry.name
            ),
        }
    }
}

impl<T: Read + Seek + std::fmt::Debug + 'static> ArchiveIndexer for ZipIndexer<T> {
    fn iter_names<'a>(&'a self) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        Box::new(self.entries.iter().map(|e| e.name.as_str()))
    }

    fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    fn open(&self, name: &str) -> Result<Box<dyn VfsStream>> {
        let entry = self
            .entry(name)
            .ok_or_else(|| anyhow::anyhow!("Member '{}' not found in ZIP container", name))?;
        self.open_entry(entry)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemStream;

    fn push_u16(out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn push_u32(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    struct Member {
        name: &'static str,
        method: u16,
        data: Vec<u8>,
        uncompressed_size: u32,
    }

    impl Member {
        fn stored(name: &'static str, data: &[u8]) -> Self {
            Self {
                name,
                method: 0,
                data: data.to_vec(),
                uncompressed_size: data.len() as u32,
            }
        }
    }

    fn build_zip(members: &[Member], comment: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut local_offsets = Vec::new();
        for m in members {
            local_offsets.push(out.len() as u32);
            push_u32(&mut out, LOCAL_FILE_SIG);
            push_u16(&mut out, 20); // version needed
            push_u16(&mut out, 0); // flags
            push_u16(&mut out, m.method);
            push_u16(&mut out, 0); // mod time
            push_u16(&mut out, 0); // mod date
            push_u32(&mut out, 0); // crc32
            push_u32(&mut out, m.data.len() as u32);
            push_u32(&mut out, m.uncompressed_size);
            push_u16(&mut out, m.name.len() as u16);
            push_u16(&mut out, 0); // extra field length
            out.extend_from_slice(m.name.as_bytes());
            out.extend_from_slice(&m.data);
        }
        let cd_start = out.len() as u32;
        for (m, offset) in members.iter().zip(&local_offsets) {
            push_u32(&mut out, CENTRAL_DIR_SIG);
            push_u16(&mut out, 20); // version made by
            push_u16(&mut out, 20); // version needed
            push_u16(&mut out, 0); // flags
            push_u16(&mut out, m.method);
            push_u16(&mut out, 0); // mod time
            push_u16(&mut out, 0); // mod date
            push_u32(&mut out, 0); // crc32
            push_u32(&mut out, m.data.len() as u32);
            push_u32(&mut out, m.uncompressed_size);
            push_u16(&mut out, m.name.len() as u16);
            push_u16(&mut out, 0); // extra field length
            push_u16(&mut out, 0); // comment length
            push_u16(&mut out, 0); // disk number start
            push_u16(&mut out, 0); // internal attrs
            push_u32(&mut out, 0); // external attrs
            push_u32(&mut out, *offset);
            out.extend_from_slice(m.name.as_bytes());
        }
        let cd_size = out.len() as u32 - cd_start;
        push_u32(&mut out, END_OF_CENTRAL_DIR_SIG);
        push_u16(&mut out, 0); // disk number
        push_u16(&mut out, 0); // disk with CD start
        push_u16(&mut out, members.len() as u16);
        push_u16(&mut out, members.len() as u16);
        push_u32(&mut out, cd_size);
        push_u32(&mut out, cd_start);
        push_u16(&mut out, comment.len() as u16);
        out.extend_from_slice(comment);
        out
    }

    fn indexer(data: Vec<u8>) -> Result<ZipIndexer<MemStream>> {
        ZipIndexer::new(MemStream::new(data), Encoding::Utf8, &VfsConfig::default())
    }

    #[test]
    fn test_end_record_parsing() {
        let zip = build_zip(&[Member::stored("a.txt", b"stored data")], b"");
        let indexer = indexer(zip).unwrap();
        assert_eq!(indexer.len(), 1);
        let entry = indexer.entry("a.txt").unwrap();
        assert_eq!(entry.size, 11);
        assert_eq!(entry.method, CompressionMethod::Stored);
    }

    #[test]
    fn test_stored_round_trip() {
        let zip = build_zip(&[Member::stored("a.txt", b"stored data")], b"");
        let indexer = indexer(zip).unwrap();
        let mut stream = indexer.open("a.txt").unwrap();
        assert_eq!(stream.read_all().unwrap(), b"stored data");
        assert!(stream.is_eof());
    }

    #[test]
    fn test_trailing_comment() {
        let zip = build_zip(
            &[Member::stored("a.txt", b"with comment")],
            b"archive comment that pushes the end record back",
        );
        let indexer = indexer(zip).unwrap();
        let mut stream = indexer.open("a.txt").unwrap();
        assert_eq!(stream.read_all().unwrap(), b"with comment");
    }

    #[test]
    fn test_unsupported_method_skipped() {
        let imploded = Member {
            name: "legacy.bin",
            method: 6,
            data: b"not really imploded".to_vec(),
            uncompressed_size: 19,
        };
        let zip = build_zip(&[imploded, Member::stored("ok.txt", b"ok")], b"");
        let indexer = indexer(zip).unwrap();
        assert_eq!(indexer.len(), 1);
        assert!(indexer.entry("legacy.bin").is_none());
        assert!(indexer.entry("ok.txt").is_some());
    }

    #[test]
    fn test_not_a_zip() {
        assert!(indexer(b"this is not a zip container at all".to_vec()).is_err());
    }

    #[test]
    fn test_empty_container_rejected() {
        assert!(indexer(Vec::new()).is_err());
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_deflate_round_trip() {
        use std::io::Write;
        let plain = b"deflate round trip payload, repeated: deflate round trip payload";
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(plain).unwrap();
        let compressed = encoder.finish().unwrap();
        let member = Member {
            name: "packed.txt",
            method: 8,
            data: compressed,
            uncompressed_size: plain.len() as u32,
        };
        let zip = build_zip(&[member], b"");
        let indexer = indexer(zip).unwrap();
        let entry = indexer.entry("packed.txt").unwrap();
        assert_eq!(entry.method, CompressionMethod::Deflate);
        let mut stream = indexer.open("packed.txt").unwrap();
        assert_eq!(stream.read_all().unwrap(), plain);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_inflate_size_mismatch() {
        use std::io::Write;
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"short").unwrap();
        let compressed = encoder.finish().unwrap();
        let member = Member {
            name: "bad.bin",
            method: 8,
            data: compressed,
            uncompressed_size: 999,
        };
        let zip = build_zip(&[member], b"");
        let indexer = indexer(zip).unwrap();
        assert!(indexer.open("bad.bin").is_err());
    }
}
