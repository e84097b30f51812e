use clap::ValueEnum;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Text Encoding
pub enum Encoding {
    /// Automatically detect encoding
    Auto,
    /// UTF-8 encoding
    Utf8,
    /// Shift-JIS encoding
    Cp932,
    /// GB2312 encoding
    Gb2312,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Auto
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
/// Text Encoding
pub enum TextEncoding {
    /// Use container's default encoding
    Default,
    /// Automatically detect encoding
    Auto,
    /// UTF-8 encoding
    Utf8,
    #[value(alias("jis"))]
    /// Shift-JIS encoding
    Cp932,
    #[value(alias("gbk"))]
    /// GB2312 encoding
    Gb2312,
}

impl TextEncoding {
    pub fn to_encoding(&self, default: Encoding) -> Encoding {
        match self {
            TextEncoding::Default => default,
            TextEncoding::Auto => Encoding::Auto,
            TextEncoding::Utf8 => Encoding::Utf8,
            TextEncoding::Cp932 => Encoding::Cp932,
            TextEncoding::Gb2312 => Encoding::Gb2312,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
/// Container format
pub enum ArchiveFormat {
    /// POSIX USTAR container
    Tar,
    /// ZIP container (also application .3dp packages)
    Zip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Storage method of an indexed archive member.
pub enum CompressionMethod {
    /// Raw bytes at a fixed offset, no decompression needed.
    Stored,
    /// Deflate-compressed bytes (ZIP method 8).
    Deflate,
}

/// ZIP compression method codes that this crate knows by name.
///
/// Only `Stored` and `Deflated` are supported; the rest are historical
/// PKZIP methods kept for warning messages.
pub fn zip_method_name(method: u16) -> &'static str {
    match method {
        0 => "stored",
        1 => "shrunk",
        2..=5 => "reduced",
        6 => "imploded",
        7 => "tokenized",
        8 => "deflated",
        9 => "deflate64",
        10 => "PKWARE DCL imploded",
        12 => "bzip2",
        14 => "LZMA",
        _ => "unknown",
    }
}

#[derive(Clone, Debug, Default)]
/// Extra configuration options shared by all indexers.
pub struct VfsConfig {
    /// Encoding of member names inside containers.
    pub archive_encoding: Option<Encoding>,
}
