//! Corpus-level orchestration over a rayon worker pool

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::config::Config;
use crate::error::{PrepError, Result};
use crate::features::MelSpectrogramExtractor;
use crate::processing::pipeline::{ProcessingResult, UtteranceRecord, UtterancePipeline};

/// Outcome of one discovered file, in discovery order.
#[derive(Debug)]
pub struct UtteranceOutcome {
    /// 1-based position in the sorted file list.
    pub index: usize,
    pub path: PathBuf,
    pub result: Result<ProcessingResult>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct DatasetReport {
    pub outcomes: Vec<UtteranceOutcome>,
    pub elapsed: Duration,
    pub worker_count: usize,
}

impl DatasetReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &UtteranceRecord> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().and_then(ProcessingResult::record))
    }

    pub fn accepted_count(&self) -> usize {
        self.records().count()
    }

    pub fn rejected_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(&o.result, Ok(r) if r.is_sentinel()))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &PrepError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.path.as_path(), e)))
    }

    pub fn total_frames(&self) -> usize {
        self.records().map(|r| r.frames).sum()
    }
}

/// Discovers the corpus and runs every utterance through a shared
/// [`UtterancePipeline`].
#[derive(Debug)]
pub struct DatasetBuilder {
    config: Config,
}

impl DatasetBuilder {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Files under `input_dir` with the configured extension, sorted by path
    /// string. Dot-prefixed entries are skipped and symlinked directories are
    /// not descended.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.input_dir;
        if !root.is_dir() {
            return Err(PrepError::io(format!("Input directory not found: {}", root.display())));
        }

        let extension = self.config.extension.trim_start_matches('.').to_ascii_lowercase();
        let mut files = Vec::new();
        walk(root, &extension, &mut files)?;
        files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        Ok(files)
    }

    pub fn build(&self) -> Result<DatasetReport> {
        let start = Instant::now();
        let files = self.discover()?;
        let workers = self.config.worker_pool_size();

        log::info!(
            "Found {} files in {}, {} worker(s)",
            files.len(),
            self.config.input_dir.display(),
            workers
        );

        let extractor = Arc::new(MelSpectrogramExtractor::new(
            &self.config.features,
            self.config.sample_rate(),
        ));
        let pipeline = UtterancePipeline::new(&self.config, extractor)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("melprep-worker-{}", i))
            .build()
            .map_err(|e| PrepError::processing(format!("Failed to build worker pool: {}", e)))?;

        // indexed collect keeps discovery order whatever the completion order
        let outcomes: Vec<UtteranceOutcome> = pool.install(|| {
            files
                .par_iter()
                .enumerate()
                .map(|(i, path)| run_one(&pipeline, i + 1, path))
                .collect()
        });

        for outcome in &outcomes {
            match &outcome.result {
                Ok(ProcessingResult::Accepted(record)) => log::debug!(
                    "[{}/{}] {} -> {} frames", outcome.index, outcomes.len(), record.wave_filename, record.frames
                ),
                Ok(ProcessingResult::Rejected(rejection)) => log::warn!("{}", rejection),
                Err(e) => log::error!("{}: {}", outcome.path.display(), e),
            }
        }

        let report = DatasetReport { outcomes, elapsed: start.elapsed(), worker_count: workers };
        log::info!(
            "Processed {} files in {:.2}s: {} accepted, {} rejected, {} failed",
            report.len(),
            report.elapsed.as_secs_f64(),
            report.accepted_count(),
            report.rejected_count(),
            report.failures().count()
        );
        Ok(report)
    }
}

fn run_one(pipeline: &UtterancePipeline, index: usize, path: &Path) -> UtteranceOutcome {
    let start = Instant::now();
    let result = pipeline.process(path);
    UtteranceOutcome { index, path: path.to_path_buf(), result, elapsed: start.elapsed() }
}

fn walk(dir: &Path, extension: &str, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| PrepError::io(format!("Failed to read directory {}: {}", dir.display(), e)))?;

    for entry in entries {
        let entry = entry.map_err(|e| PrepError::io(format!("Failed to read directory entry: {}", e)))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry
            .file_type()
            .map_err(|e| PrepError::io(format!("Failed to stat {}: {}", entry.path().display(), e)))?;
        let path = entry.path();
        if file_type.is_dir() {
            walk(&path, extension, files)?;
        } else if (file_type.is_file() || (file_type.is_symlink() && path.is_file()))
            && path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().to_ascii_lowercase() == extension)
        {
            files.push(path);
        }
    }
    Ok(())
}
