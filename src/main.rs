//! melprep - build vocoder training pairs from a directory of recordings

use anyhow::{Context, Result};
use clap::Parser;
use melprep::{init_logging, Args, Config, DatasetBuilder};
use std::process;

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if let Some(path) = &args.dump_config {
        Config::create_default_config(path)
            .with_context(|| format!("writing default config to {}", path.display()))?;
        println!("Default config written to {}", path.display());
        return Ok(());
    }

    if args.verbose {
        println!("{}", melprep::get_library_info());
        println!();
    }

    let config = Config::from_args_and_config(args).context("invalid configuration")?;

    println!("=== melprep ===");
    println!("Input: {}", config.input_dir.display());
    println!("Output: {}", config.output_dir.display());
    println!(
        "Features: {} mels, fft {}, hop {}, {} @ {} Hz",
        config.features.num_mels,
        config.fft_size(),
        config.hop_size(),
        config.features.mel_method,
        config.sample_rate()
    );
    println!("Target: {}, workers: {}", config.waveform.input_type, config.worker_pool_size());
    println!("===============\n");

    let builder = DatasetBuilder::new(config)?;
    let report = builder
        .build()
        .with_context(|| format!("building dataset from {}", builder.config().input_dir.display()))?;

    println!("=== Processing Complete ===");
    println!("Files: {}", report.len());
    println!("Accepted: {} ({} frames)", report.accepted_count(), report.total_frames());
    println!("Rejected (clipping): {}", report.rejected_count());
    println!("Failed: {}", report.failures().count());
    println!("Time: {:.2}s", report.elapsed.as_secs_f64());

    Ok(())
}
