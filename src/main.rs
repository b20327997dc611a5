use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use roi_extract::{Cli, Pipeline, PipelineResult};

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.pipeline_config();
    if !config.include_circle && !config.include_rect {
        eprintln!("Both crops disabled (--no-circle --no-rect), nothing to do");
        return Ok(());
    }

    let pipeline = Pipeline::new(config);
    let result = pipeline
        .process_path(&cli.input)
        .with_context(|| format!("Failed to process {:?}", cli.input))?;

    let (kind, image) = match &result {
        PipelineResult::Single(img) => ("single crop", img),
        PipelineResult::Composite(img) => ("composite", img),
        PipelineResult::NoResult => {
            eprintln!("No region found in {:?}", cli.input);
            return Ok(());
        }
    };

    let output_path = cli.output_path();
    result
        .save(&output_path)
        .with_context(|| format!("Failed to save output: {:?}", output_path))?;

    eprintln!("Saved {}: {:?}", kind, output_path);
    eprintln!("Dimensions: {}x{}", image.width(), image.height());

    Ok(())
}
