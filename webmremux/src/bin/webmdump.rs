use std::fs::File;
use std::io::{self, Read};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use webmstream::{DumpClient, ElementParser, Schema, UnknownSizeInfo};

/// Dump the elements of a WebM file as a linear event list.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Name of the WebM file to be dumped, or "-" for stdin
    filename: String,

    /// Output format
    #[clap(value_enum, short, long, default_value = "yaml")]
    format: Format,
}

#[derive(ValueEnum, Clone, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut input: Box<dyn Read> = if args.filename == "-" {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&args.filename)
            .with_context(|| format!("failed to open '{}'", args.filename))?;
        Box::new(file)
    };

    let mut parser = webmstream::Parser::new(
        Schema::webm(),
        UnknownSizeInfo::webm(),
        ElementParser::new(DumpClient::new(), Schema::webm()),
    );

    let mut buf = [0u8; 4096];
    loop {
        let bytes_read = input.read(&mut buf)?;
        if bytes_read == 0 {
            parser.end_of_data();
            break;
        }
        if !parser.append(&buf[..bytes_read]) {
            bail!("failed to parse '{}'", args.filename);
        }
    }

    let records = parser.into_client().into_client().into_records();
    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        Format::Yaml => println!("{}", serde_yaml::to_string(&records)?),
    }

    Ok(())
}
