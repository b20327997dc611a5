use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::PipelineConfig;

#[derive(Parser, Debug)]
#[command(name = "roi-extract")]
#[command(version, about = "Crop a wafer disk and/or histogram panel out of a scanned image")]
pub struct Cli {
    /// Input image path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output path [default: input_roi.png]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip the circular (disk) crop
    #[arg(long)]
    pub no_circle: bool,

    /// Skip the rectangular (panel) crop
    #[arg(long)]
    pub no_rect: bool,

    /// Show detection details
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self.input.file_stem().unwrap_or_default().to_string_lossy();
            let parent = self.input.parent().unwrap_or(std::path::Path::new("."));
            parent.join(format!("{}_roi.png", stem))
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            include_circle: !self.no_circle,
            include_rect: !self.no_rect,
        }
    }
}
