use std::fs::File;
use std::io::{self, Read};

use anyhow::{bail, Context};
use clap::Parser;
use webmstream::{remux, PipeSink, Writer};

/// Rewrite a WebM stream with keyframe-aligned clusters, a seek head
/// and a cue table.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Input WebM file, or "-" for stdin
    infile: String,

    /// Output file, or "-" for stdout
    outfile: String,

    /// Minimum cluster duration in milliseconds
    #[clap(long = "cm", default_value_t = 250,
           value_parser = clap::value_parser!(u64).range(0..=30000))]
    min_cluster_duration: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if args.infile != "-" && args.infile == args.outfile {
        bail!("input and output can't be the same file");
    }
    if args.outfile.starts_with("ws://") {
        bail!("websocket outputs are not supported; pipe to a relay instead");
    }

    let input: Box<dyn Read> = if args.infile == "-" {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&args.infile)
            .with_context(|| format!("failed to open '{}'", args.infile))?;
        Box::new(file)
    };

    if args.outfile == "-" {
        // stdout can't seek; sizes stay unknown and cues are skipped.
        let writer = Writer::new(PipeSink::new(io::stdout().lock()));
        remux(input, writer, args.min_cluster_duration)
            .with_context(|| format!("failed to remux '{}'", args.infile))?;
    } else {
        let out = File::create(&args.outfile)
            .with_context(|| format!("failed to create '{}'", args.outfile))?;
        remux(input, Writer::new(out), args.min_cluster_duration)
            .with_context(|| format!("failed to remux '{}'", args.infile))?;
    }

    Ok(())
}
