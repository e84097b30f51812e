use anyhow::Result;
use arc_vfs::COUNTER;
use arc_vfs::archive::{self, ArchiveIndexer, IndexerBuilder};
use arc_vfs::args;
use arc_vfs::ext::io::Peek;
use arc_vfs::stream::{DiskStream, VfsStream};
use arc_vfs::types::*;
use arc_vfs::utils::files::{make_sure_dir_exists, write_file};
use std::io::Write;
use std::path::{Path, PathBuf};

fn resolve_builder(
    arg: &args::Arg,
    path: &str,
) -> Result<&'static Box<dyn IndexerBuilder + Sync + Send>> {
    if let Some(format) = arg.format {
        return Ok(archive::builder_for_format(format));
    }
    if let Some(builder) = archive::builder_for_extension(path) {
        return Ok(builder);
    }
    let mut probe = DiskStream::open(path)?;
    let mut buf = [0u8; 512];
    let buf_len = probe.peek(&mut buf)?;
    probe.close();
    archive::detect_builder(path, &buf, buf_len)
        .ok_or_else(|| anyhow::anyhow!("Unrecognized container format in '{}'", path))
}

fn build_indexer(arg: &args::Arg, path: &str) -> Result<Box<dyn ArchiveIndexer>> {
    let builder = resolve_builder(arg, path)?;
    let encoding = match &arg.encoding {
        Some(enc) => enc.to_encoding(builder.default_encoding()),
        None => builder.default_encoding(),
    };
    let config = VfsConfig {
        archive_encoding: Some(encoding),
    };
    builder.build_from_file(path, encoding, &config)
}

/// Member names come from untrusted containers; keep them inside the
/// output directory.
fn sanitize_member_path(name: &str) -> PathBuf {
    name.split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect()
}

fn list_archive(arg: &args::Arg, path: &str) -> Result<()> {
    let indexer = build_indexer(arg, path)?;
    for name in indexer.iter_names() {
        match indexer.entry(name) {
            Some(entry) => println!("{:>12}  {}", entry.size, name),
            None => println!("{}", name),
        }
    }
    if COUNTER.warnings() > 0 {
        eprintln!("{}", *COUNTER);
    }
    Ok(())
}

fn extract_member(indexer: &dyn ArchiveIndexer, name: &str, out_dir: &Path) -> Result<()> {
    let relative = sanitize_member_path(name);
    if relative.as_os_str().is_empty() {
        anyhow::bail!("Member name '{}' leaves no usable output path", name);
    }
    let mut stream = indexer.open(name)?;
    let data = stream.read_all()?;
    let target = out_dir.join(relative);
    make_sure_dir_exists(&target)?;
    std::fs::write(&target, data)?;
    Ok(())
}

fn unpack_archive(arg: &args::Arg, path: &str, output: &Option<String>) -> Result<()> {
    let indexer = build_indexer(arg, path)?;
    let out_dir = match output {
        Some(output) => PathBuf::from(output),
        None => Path::new(path).with_extension(""),
    };
    let names: Vec<String> = indexer.iter_names().map(String::from).collect();
    for name in names.iter() {
        match extract_member(indexer.as_ref(), name, &out_dir) {
            Ok(()) => COUNTER.inc_ok(),
            Err(e) => {
                eprintln!("Error extracting {}: {}", name, e);
                COUNTER.inc_error();
            }
        }
    }
    eprintln!("{}", *COUNTER);
    Ok(())
}

fn cat_member(arg: &args::Arg, path: &str, name: &str, output: &Option<String>) -> Result<()> {
    let indexer = build_indexer(arg, path)?;
    let mut stream = indexer.open(name)?;
    let data = stream.read_all()?;
    let mut writer = write_file(output.as_deref().unwrap_or("-"))?;
    writer.write_all(&data)?;
    Ok(())
}

fn main() {
    let arg = args::parse_args();
    if arg.backtrace {
        unsafe { std::env::set_var("RUST_LIB_BACKTRACE", "1") };
    }
    let re = match &arg.command {
        args::Command::List { archive } => list_archive(&arg, archive),
        args::Command::Unpack { archive, output } => unpack_archive(&arg, archive, output),
        args::Command::Cat {
            archive,
            name,
            output,
        } => cat_member(&arg, archive, name, output),
    };
    match re {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            if arg.backtrace {
                eprintln!("Backtrace: {}", e.backtrace());
            }
            std::process::exit(1);
        }
    }
}
