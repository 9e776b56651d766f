//! kpbench - detector/descriptor sweep over a numbered image sequence

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use kpb_cli::{BenchConfig, ConsoleReport, CsvReport, MultiReport, Outcome, Sweep};
use kpb_core::{default_threads, init_thread_pool};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML or JSON configuration file; built-in defaults otherwise.
    #[arg(long, env = "KPBENCH_CONFIG")]
    config: Option<PathBuf>,
    /// Directory the image prefix is resolved against.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// CSV file the per-frame rows are appended to.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Comma-separated detector names (HARRIS, SHITOMASI, FAST, BRISK, ORB, AKAZE, SIFT).
    #[arg(long, value_delimiter = ',')]
    detectors: Option<Vec<String>>,
    /// Comma-separated descriptor names (BRIEF, ORB, FREAK, AKAZE, SIFT, BRISK).
    #[arg(long, value_delimiter = ',')]
    descriptors: Option<Vec<String>>,
    /// Neighbour search (MAT_BF|MAT_FLANN)
    #[arg(long, value_name = "KIND")]
    matcher: Option<String>,
    /// Match selection (SEL_NN|SEL_KNN)
    #[arg(long, value_name = "KIND")]
    selector: Option<String>,
    /// Distance ratio for SEL_KNN.
    #[arg(long)]
    ratio: Option<f32>,
    /// First image index.
    #[arg(long)]
    start: Option<usize>,
    /// Last image index, inclusive.
    #[arg(long)]
    end: Option<usize>,
    /// Keep keypoints outside the region of interest.
    #[arg(long)]
    no_roi: bool,
    /// Write side-by-side match images into this directory.
    #[arg(long)]
    visualize: Option<PathBuf>,
    /// Worker threads, 0 for one per core.
    #[arg(long)]
    threads: Option<usize>,
    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn into_config(self) -> Result<(BenchConfig, bool)> {
        let mut cfg = match &self.config {
            Some(path) => BenchConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => BenchConfig::default(),
        };
        if let Some(dir) = self.data_dir {
            cfg.source.base_path = dir;
        }
        if let Some(output) = self.output {
            cfg.output = output;
        }
        if let Some(detectors) = self.detectors {
            cfg.detectors = detectors;
        }
        if let Some(descriptors) = self.descriptors {
            cfg.descriptors = descriptors;
        }
        if let Some(matcher) = self.matcher {
            cfg.matcher.kind = matcher.parse()?;
        }
        if let Some(selector) = self.selector {
            cfg.matcher.selector = selector.parse()?;
        }
        if let Some(ratio) = self.ratio {
            cfg.matcher.ratio = ratio;
        }
        if let Some(start) = self.start {
            cfg.source.start_index = start;
        }
        if let Some(end) = self.end {
            cfg.source.end_index = end;
        }
        if self.no_roi {
            cfg.filter_to_roi = false;
        }
        if self.visualize.is_some() {
            cfg.visualize = self.visualize;
        }
        if let Some(threads) = self.threads {
            cfg.threads = threads;
        }
        cfg.validate()?;
        Ok((cfg, self.print_config))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (cfg, print_config) = Args::parse().into_config()?;
    if print_config {
        print!("{}", cfg.to_toml()?);
        return Ok(());
    }

    let threads = if cfg.threads == 0 { default_threads() } else { cfg.threads };
    init_thread_pool(threads).context("building thread pool")?;
    log::info!("using {} worker threads", threads);

    let csv = CsvReport::append(&cfg.output)
        .with_context(|| format!("opening report {}", cfg.output.display()))?;
    let mut report = MultiReport::new()
        .with(Box::new(csv))
        .with(Box::new(ConsoleReport));

    let outcomes = Sweep::new(&cfg).run(&cfg.source, &mut report);

    let mut completed = 0;
    for outcome in &outcomes {
        match outcome {
            Outcome::Completed { .. } => completed += 1,
            Outcome::Skipped { detector, descriptor, reason } => {
                println!("skipped {} + {}: {}", detector, descriptor, reason)
            }
            Outcome::Failed { detector, descriptor, error } => {
                println!("failed {} + {}: {}", detector, descriptor, error)
            }
        }
    }
    println!(
        "{} of {} configurations completed, rows appended to {}",
        completed,
        outcomes.len(),
        cfg.output.display()
    );

    let failed = outcomes.iter().any(|o| matches!(o, Outcome::Failed { .. }));
    if completed == 0 && failed {
        return Err(anyhow!("no configuration completed"));
    }
    Ok(())
}
