use ante::convert;

use clap::{CommandFactory, Parser};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::prelude::*;

use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Hash, PartialEq, Eq)]
#[command(version, about, long_about)]
struct Args {
    source_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    #[arg(short, long)]
    include: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG selects which trace messages get printed; the default keeps
    // the per-conversion summary visible.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .into_diagnostic()?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let Some(source_path) = args.source_path else {
        Args::command().print_help().into_diagnostic()?;
        return Ok(());
    };

    let output_path = args
        .output_path
        .unwrap_or_else(|| convert::output_path(&source_path));

    let includes: Vec<&str> = if args.include.is_empty() {
        convert::DEFAULT_INCLUDES.to_vec()
    } else {
        args.include.iter().map(String::as_str).collect()
    };

    convert::convert_file(&source_path, &output_path, &includes)
}
