use crate::types::*;
use clap::{ArgAction, Parser, Subcommand};

/// Tools for listing and extracting virtual filesystem containers
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Arg {
    #[arg(short = 't', long, value_enum, global = true)]
    /// Container format (detected from extension or magic when omitted)
    pub format: Option<ArchiveFormat>,
    #[arg(short = 'e', long, value_enum, global = true)]
    /// Encoding of member names inside containers
    pub encoding: Option<TextEncoding>,
    #[arg(global = true, action = ArgAction::SetTrue, short, long)]
    /// Print backtrace on error
    pub backtrace: bool,
    #[command(subcommand)]
    /// Command
    pub command: Command,
}

#[derive(Subcommand, Debug)]
/// Commands
pub enum Command {
    /// List the members of a container
    List {
        /// Container file
        archive: String,
    },
    /// Extract every member of a container
    Unpack {
        /// Container file
        archive: String,
        #[arg(short, long)]
        /// Output directory (defaults to the container name without extension)
        output: Option<String>,
    },
    /// Write a single member to a file or stdout
    Cat {
        /// Container file
        archive: String,
        /// Member name
        name: String,
        #[arg(short, long)]
        /// Output file ("-" for stdout, the default)
        output: Option<String>,
    },
}

pub fn parse_args() -> Arg {
    Arg::parse()
}
