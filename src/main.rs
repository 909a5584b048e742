use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use casmextract::export::convert::TargetFormat;
use casmextract::{ExtractOptions, Extractor};

/// Extract models, textures, and other assets from a Xenoblade X `.casmhd` map container
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Write textures as PNG instead of DDS
    #[clap(short = 'u', long)]
    png: bool,

    /// Rebuild the blue channel of two-channel normal maps
    #[clap(short, long)]
    blue: bool,

    /// Number of texture conversion threads. Defaults to one per core
    #[clap(short = 'j', long)]
    threads: Option<usize>,

    /// Output directory. Defaults to a directory named after the container, next to it
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Keep textures as raw MTXT blobs
    #[clap(long)]
    raw_textures: bool,

    /// Log every extracted entry
    #[clap(short, long)]
    verbose: bool,

    /// .casmhd container. The .casmda data file must sit next to it
    casmhd: PathBuf,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        concat!(env!("CARGO_CRATE_NAME"), "=debug")
    } else {
        concat!(env!("CARGO_CRATE_NAME"), "=info")
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let options = ExtractOptions::builder()
        .target_format(if args.png {
            TargetFormat::Png
        } else {
            TargetFormat::Dds
        })
        .synthesize_blue_channel(args.blue)
        .maybe_threads(args.threads)
        .maybe_output_dir(args.output)
        .raw_textures(args.raw_textures)
        .build();

    let summary = match Extractor::open(&args.casmhd, options).and_then(|mut e| e.run()) {
        Ok(summary) => summary,
        Err(report) => {
            error!("{report}");
            return ExitCode::FAILURE;
        }
    };

    if summary.is_complete() {
        ExitCode::SUCCESS
    } else {
        let aborted: Vec<_> = summary.aborted.iter().map(ToString::to_string).collect();
        warn!("some resource kinds were not fully extracted: {}", aborted.join(", "));
        ExitCode::FAILURE
    }
}
