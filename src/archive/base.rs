use crate::stream::{ReadSeek, VfsStream};
use crate::types::*;
use anyhow::Result;

#[derive(Debug, Clone)]
/// Location of one member inside a container.
///
/// For TAR members `offset` points at the member's data. For ZIP members it
/// points at the local file header; the data position is resolved again when
/// the member is opened.
pub struct ArchiveEntry {
    pub name: String,
    pub offset: u64,
    pub size: u64,
    pub method: CompressionMethod,
}

/// An indexed container: scanned once at construction, read-only afterwards.
///
/// Opening a member never mutates the index; every returned stream is solely
/// owned by the caller.
pub trait ArchiveIndexer: std::fmt::Debug {
    /// Member names in the order they were indexed.
    fn iter_names<'a>(&'a self) -> Box<dyn Iterator<Item = &'a str> + 'a>;

    /// Looks up the index record for `name`.
    fn entry(&self, name: &str) -> Option<&ArchiveEntry>;

    /// Opens the member `name` as a fresh stream.
    fn open(&self, name: &str) -> Result<Box<dyn VfsStream>>;

    /// Number of indexed members.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait IndexerBuilder: std::fmt::Debug {
    fn default_encoding(&self) -> Encoding {
        Encoding::Auto
    }

    fn build_from_file(
        &self,
        filename: &str,
        encoding: Encoding,
        config: &VfsConfig,
    ) -> Result<Box<dyn ArchiveIndexer>>;

    fn build_from_reader(
        &self,
        reader: Box<dyn ReadSeek>,
        filename: &str,
        encoding: Encoding,
        config: &VfsConfig,
    ) -> Result<Box<dyn ArchiveIndexer>>;

    fn extensions(&self) -> &'static [&'static str];

    fn is_this_format(&self, _filename: &str, _buf: &[u8], _buf_len: usize) -> Option<u8> {
        None
    }

    fn format(&self) -> &'static ArchiveFormat;
}
