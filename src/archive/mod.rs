pub mod base;
pub mod tar;
pub mod zip;

pub use base::{ArchiveEntry, ArchiveIndexer, IndexerBuilder};

use crate::types::ArchiveFormat;

lazy_static::lazy_static! {
    pub static ref BUILDERS: Vec<Box<dyn IndexerBuilder + Sync + Send>> = vec![
        Box::new(tar::TarIndexerBuilder::new()),
        Box::new(zip::ZipIndexerBuilder::new()),
    ];
    pub static ref ARCHIVE_EXTS: Vec<String> =
        BUILDERS.iter().flat_map(|b| b.extensions()).map(|s| s.to_string()).collect();
}

/// Finds the builder whose extension list matches `filename`.
pub fn builder_for_extension(
    filename: &str,
) -> Option<&'static Box<dyn IndexerBuilder + Sync + Send>> {
    let lower = filename.to_lowercase();
    BUILDERS
        .iter()
        .find(|b| {
            b.extensions()
                .iter()
                .any(|ext| lower.ends_with(&format!(".{}", ext)))
        })
}

/// Finds the builder for an explicitly requested format.
pub fn builder_for_format(
    format: ArchiveFormat,
) -> &'static Box<dyn IndexerBuilder + Sync + Send> {
    BUILDERS
        .iter()
        .find(|b| *b.format() == format)
        .expect("every format has a registered builder")
}

/// Sniffs the container format from the first bytes of the file, picking the
/// builder with the highest score.
pub fn detect_builder(
    filename: &str,
    buf: &[u8],
    buf_len: usize,
) -> Option<&'static Box<dyn IndexerBuilder + Sync + Send>> {
    BUILDERS
        .iter()
        .filter_map(|b| b.is_this_format(filename, buf, buf_len).map(|score| (score, b)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, b)| b)
}
