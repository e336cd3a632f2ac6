//! srpack CLI - repack sigrok capture archives
//!
//! Converts `.sr` archives between the interleaved sample layout (version 2)
//! and the per-probe bit-plane layout (version 3).

mod utils;

use clap::{Parser, ValueEnum};
use srpack_archive::Codec;
use srpack_repack::{RepackEngine, RepackOptions};
use std::path::{Path, PathBuf};
use utils::{create_progress_bar, init_logging, update_progress};

#[derive(Parser, Debug)]
#[command(name = "srpack")]
#[command(
    author,
    version,
    about = "Repack logic-analyzer capture archives into per-probe bit-planes and back"
)]
#[command(long_about = "
srpack reads a sigrok session archive and writes it in the other layout.
Version 2 archives (interleaved sample words) are split into one bit-plane
stream per probe; version 3 archives are merged back into sample words.

Examples:
  srpack -f capture.sr
  srpack -f capture.sr --remap -c lzma
  srpack -f capture.sr.zip.sr2
  srpack -f capture.sr --raw -o planes/
")]
struct Cli {
    /// Capture archive to repack
    #[arg(short, long)]
    file: PathBuf,

    /// Show debug diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Renumber active probes contiguously (may halve the sample width)
    #[arg(short = 'm', long)]
    remap: bool,

    /// Write plain .raw files instead of archives
    #[arg(short, long)]
    raw: bool,

    /// Codec for output archives (repeatable; default depends on direction)
    #[arg(short, long, value_enum)]
    codec: Vec<CodecArg>,

    /// Directory for output files (default: next to the input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Do not show a progress bar
    #[arg(long)]
    no_progress: bool,

    /// Process segments in parallel (needs the `parallel` feature)
    #[arg(long)]
    parallel: bool,
}

/// Output archive codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CodecArg {
    /// Store without compression
    Store,
    /// DEFLATE
    Deflate,
    /// BZip2
    Bzip2,
    /// LZMA
    Lzma,
}

impl From<CodecArg> for Codec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Store => Codec::Store,
            CodecArg::Deflate => Codec::Deflate,
            CodecArg::Bzip2 => Codec::Bzip2,
            CodecArg::Lzma => Codec::Lzma,
        }
    }
}

impl Cli {
    fn options(&self) -> RepackOptions {
        let mut options = RepackOptions::new()
            .remap(self.remap)
            .raw(self.raw)
            .codecs(self.codec.iter().copied().map(Codec::from))
            .parallel(self.parallel);
        if let Some(dir) = &self.output_dir {
            options = options.output_dir(dir);
        }
        options
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cmd_repack(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_repack(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    check_input(&cli.file)?;

    let options = cli.options();
    if options.parallel && !options.use_parallel() {
        tracing::warn!("built without the `parallel` feature, processing sequentially");
    }

    let pb = create_progress_bar(!cli.verbose && !cli.no_progress);
    let result = RepackEngine::new(options)
        .run_with_progress(&cli.file, |event| update_progress(&pb, event));
    pb.finish_and_clear();
    let report = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

fn check_input(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("input file not found: {}", path.display()).into());
    }
    if !path.is_file() {
        return Err(format!("input is not a file: {}", path.display()).into());
    }
    Ok(())
}
