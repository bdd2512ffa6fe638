use clap::Parser;
use std::path::PathBuf;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Source: JSON site fixture\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Content editor core: browse a site, open a file, edit its lists
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Site fixture (JSON) to serve as the remote source
    #[arg(value_name = "SITE")]
    pub site: PathBuf,

    /// File to open after the listing loads
    #[arg(short = 'o', long = "open", value_name = "PATH")]
    pub open: Option<String>,

    /// Check out this workspace before listing files
    #[arg(short = 'w', long = "workspace", value_name = "NAME")]
    pub workspace: Option<String>,

    /// Duplicate the first item of this list field and save (exercises the lock cycle)
    #[arg(short = 'd', long = "duplicate", value_name = "FIELD")]
    pub duplicate: Option<String>,

    /// Enable debug logging to file (default: quill.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Worker threads override (0 = auto); takes precedence over settings
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<u32>,
}
