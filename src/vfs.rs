//! Registry overlaying logical file names onto containers, memory blobs
//! and the real filesystem.
use crate::archive::{self, ArchiveEntry, ArchiveIndexer};
use crate::ext::io::Peek;
use crate::stream::{DiskStream, MemStream, VfsStream};
use crate::types::*;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// An indexer that serves a single name from an in-memory buffer.
struct MemoryIndexer {
    entry: ArchiveEntry,
    data: Arc<Vec<u8>>,
}

impl std::fmt::Debug for MemoryIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndexer")
            .field("name", &self.entry.name)
            .field("data_length", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl MemoryIndexer {
    fn new(name: &str, data: Arc<Vec<u8>>) -> Self {
        Self {
            entry: ArchiveEntry {
                name: name.to_string(),
                offset: 0,
                size: data.len() as u64,
                method: CompressionMethod::Stored,
            },
            data,
        }
    }
}

impl ArchiveIndexer for MemoryIndexer {
    fn iter_names<'a>(&'a self) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        Box::new(std::iter::once(self.entry.name.as_str()))
    }

    fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        (name == self.entry.name).then_some(&self.entry)
    }

    fn open(&self, name: &str) -> Result<Box<dyn VfsStream>> {
        if name != self.entry.name {
            anyhow::bail!("Member '{}' not found in memory entry", name);
        }
        Ok(Box::new(MemStream::from_shared(self.data.clone())))
    }

    fn len(&self) -> usize {
        1
    }
}

/// The virtual filesystem.
///
/// Logical names registered through containers or memory entries resolve to
/// their indexer; everything else falls back to the real filesystem. The
/// registry owns every indexer it registers and drops them all at teardown.
#[derive(Debug)]
pub struct VirtualFileSystem {
    indexers: Vec<Box<dyn ArchiveIndexer>>,
    // logical name -> (indexer slot, name inside the indexer)
    registry: HashMap<String, (usize, String)>,
    config: VfsConfig,
}

impl VirtualFileSystem {
    pub fn new(config: VfsConfig) -> Self {
        Self {
            indexers: Vec::new(),
            registry: HashMap::new(),
            config,
        }
    }

    /// Opens a logical name, falling back to the real filesystem for
    /// unregistered names.
    pub fn open(&self, name: &str) -> Result<Box<dyn VfsStream>> {
        match self.registry.get(name) {
            Some((slot, inner)) => self.indexers[*slot].open(inner),
            None => Ok(Box::new(DiskStream::open(name)?)),
        }
    }

    /// Whether `name` is registered or exists on the real filesystem.
    pub fn exists(&self, name: &str) -> bool {
        self.registry.contains_key(name) || std::fs::File::open(name).is_ok()
    }

    /// Indexes the container at `path` and registers every member under
    /// `mount_prefix`. The format is chosen by file extension.
    ///
    /// Returns the number of registered names.
    pub fn register_container(&mut self, path: &str, mount_prefix: &str) -> Result<usize> {
        let builder = archive::builder_for_extension(path).ok_or_else(|| {
            anyhow::anyhow!(
                "No indexer for '{}': expected one of the extensions {}",
                path,
                archive::ARCHIVE_EXTS.join(", ")
            )
        })?;
        let encoding = self
            .config
            .archive_encoding
            .unwrap_or_else(|| builder.default_encoding());
        let indexer = builder.build_from_file(path, encoding, &self.config)?;
        Ok(self.register_indexer(indexer, mount_prefix))
    }

    /// Like [`register_container`](Self::register_container), but sniffs the
    /// format from the first bytes of the file instead of the extension.
    pub fn register_container_auto(&mut self, path: &str, mount_prefix: &str) -> Result<usize> {
        let mut probe = DiskStream::open(path)?;
        let mut buf = [0u8; 512];
        let buf_len = probe.peek(&mut buf)?;
        probe.close();
        let builder = archive::detect_builder(path, &buf, buf_len)
            .ok_or_else(|| anyhow::anyhow!("Unrecognized container format in '{}'", path))?;
        let encoding = self
            .config
            .archive_encoding
            .unwrap_or_else(|| builder.default_encoding());
        let indexer = builder.build_from_file(path, encoding, &self.config)?;
        Ok(self.register_indexer(indexer, mount_prefix))
    }

    /// Takes ownership of `indexer` and registers all of its names under
    /// `mount_prefix`. Later registrations win on name collisions.
    pub fn register_indexer(
        &mut self,
        indexer: Box<dyn ArchiveIndexer>,
        mount_prefix: &str,
    ) -> usize {
        let slot = self.indexers.len();
        let names: Vec<String> = indexer.iter_names().map(|n| n.to_string()).collect();
        self.indexers.push(indexer);
        for inner in &names {
            self.registry
                .insert(format!("{}{}", mount_prefix, inner), (slot, inner.clone()));
        }
        names.len()
    }

    /// Registers `name` to serve `data` from memory; the registry owns the
    /// buffer.
    pub fn register_memory_entry(&mut self, name: &str, data: Vec<u8>) {
        self.register_shared_memory_entry(name, Arc::new(data));
    }

    /// Registers `name` to serve a buffer shared with the caller.
    pub fn register_shared_memory_entry(&mut self, name: &str, data: Arc<Vec<u8>>) {
        self.register_indexer(Box::new(MemoryIndexer::new(name, data)), "");
    }

    /// All registered logical names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(|s| s.as_str())
    }

    /// Removes every registered name starting with `prefix` and returns how
    /// many were dropped. Indexers stay owned until teardown.
    pub fn unregister_prefix(&mut self, prefix: &str) -> usize {
        let before = self.registry.len();
        self.registry.retain(|name, _| !name.starts_with(prefix));
        before - self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tar::TarIndexer;

    fn tar_with_member(name: &str, data: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; 512];
        out[..name.len()].copy_from_slice(name.as_bytes());
        let octal = format!("{:011o}", data.len());
        out[124..135].copy_from_slice(octal.as_bytes());
        out[257..262].copy_from_slice(b"ustar");
        out.extend_from_slice(data);
        out.resize(512 + data.len().next_multiple_of(512), 0);
        out.extend_from_slice(&[0u8; 1024]);
        out
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("arc_vfs_vfs_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_memory_entry_round_trip() {
        let mut vfs = VirtualFileSystem::new(VfsConfig::default());
        vfs.register_memory_entry("config/startup.txt", b"memory bytes".to_vec());
        assert!(vfs.exists("config/startup.txt"));
        let mut stream = vfs.open("config/startup.txt").unwrap();
        assert_eq!(stream.read_all().unwrap(), b"memory bytes");
        // A second open gets an independent stream over the same bytes.
        let mut again = vfs.open("config/startup.txt").unwrap();
        assert_eq!(again.read_all().unwrap(), b"memory bytes");
    }

    #[test]
    fn test_shared_memory_entry() {
        let data = Arc::new(b"shared blob".to_vec());
        let mut vfs = VirtualFileSystem::new(VfsConfig::default());
        vfs.register_shared_memory_entry("blob.bin", data.clone());
        let mut stream = vfs.open("blob.bin").unwrap();
        assert_eq!(stream.read_all().unwrap(), &data[..]);
    }

    #[test]
    fn test_mount_prefix() {
        let tar = tar_with_member("model.bin", b"geometry");
        let indexer = TarIndexer::new(
            MemStream::new(tar),
            "",
            Encoding::Utf8,
            &VfsConfig::default(),
        )
        .unwrap();
        let mut vfs = VirtualFileSystem::new(VfsConfig::default());
        assert_eq!(vfs.register_indexer(Box::new(indexer), "assets/"), 1);
        assert!(vfs.exists("assets/model.bin"));
        assert!(!vfs.exists("model.bin"));
        let mut stream = vfs.open("assets/model.bin").unwrap();
        assert_eq!(stream.read_all().unwrap(), b"geometry");
    }

    #[test]
    fn test_last_registration_wins() {
        let mut vfs = VirtualFileSystem::new(VfsConfig::default());
        vfs.register_memory_entry("name.txt", b"first".to_vec());
        vfs.register_memory_entry("name.txt", b"second".to_vec());
        let mut stream = vfs.open("name.txt").unwrap();
        assert_eq!(stream.read_all().unwrap(), b"second");
    }

    #[test]
    fn test_disk_fallback() {
        let path = temp_path("fallback.bin");
        std::fs::write(&path, b"on disk").unwrap();
        let vfs = VirtualFileSystem::new(VfsConfig::default());
        let name = path.to_str().unwrap();
        assert!(vfs.exists(name));
        let mut stream = vfs.open(name).unwrap();
        assert_eq!(stream.read_all().unwrap(), b"on disk");
        std::fs::remove_file(&path).unwrap();
        assert!(vfs.open("notInAnyArchive.bin").is_err());
        assert!(!vfs.exists("notInAnyArchive.bin"));
    }

    #[test]
    fn test_register_container_by_extension() {
        let path = temp_path("pack.tar");
        std::fs::write(&path, tar_with_member("inner.txt", b"tar on disk")).unwrap();
        let mut vfs = VirtualFileSystem::new(VfsConfig::default());
        let count = vfs
            .register_container(path.to_str().unwrap(), "mounted/")
            .unwrap();
        assert_eq!(count, 1);
        let mut stream = vfs.open("mounted/inner.txt").unwrap();
        assert_eq!(stream.read_all().unwrap(), b"tar on disk");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_register_container_auto() {
        // A tar without the .tar extension is still recognized by its magic.
        let path = temp_path("pack.res");
        std::fs::write(&path, tar_with_member("inner.txt", b"sniffed")).unwrap();
        let mut vfs = VirtualFileSystem::new(VfsConfig::default());
        assert!(vfs.register_container(path.to_str().unwrap(), "").is_err());
        vfs.register_container_auto(path.to_str().unwrap(), "")
            .unwrap();
        let mut stream = vfs.open("inner.txt").unwrap();
        assert_eq!(stream.read_all().unwrap(), b"sniffed");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_unregister_prefix() {
        let mut vfs = VirtualFileSystem::new(VfsConfig::default());
        vfs.register_memory_entry("keep/a.txt", b"a".to_vec());
        vfs.register_memory_entry("drop/b.txt", b"b".to_vec());
        vfs.register_memory_entry("drop/c.txt", b"c".to_vec());
        assert_eq!(vfs.unregister_prefix("drop/"), 2);
        assert!(vfs.exists("keep/a.txt"));
        assert!(!vfs.exists("drop/b.txt"));
        assert_eq!(vfs.names().count(), 1);
    }
}
