use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use jwalk::WalkDir;
use ssrpack_core::types::Encoding;
use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::encoders::encode;

/// Extensions worth pre-compressing
pub const COMPRESSIBLE_EXTENSIONS: [&str; 6] = ["js", "css", "html", "json", "svg", "ico"];

/// A compression unit running longer than this is abandoned and reported as failed
pub const COMPRESSION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CompressionOptions {
  /// Upper bound of compression units running at once
  pub concurrency: usize,
  pub timeout: Duration,
  pub encodings: Vec<Encoding>,
}

impl Default for CompressionOptions {
  fn default() -> Self {
    Self {
      concurrency: num_cpus::get(),
      timeout: COMPRESSION_TIMEOUT,
      encodings: Encoding::PRIORITY.to_vec(),
    }
  }
}

#[derive(Debug, Error)]
pub enum CompressionError {
  #[error("Cannot compress {}: not an existing directory", .0.display())]
  NotADirectory(PathBuf),
  #[error("Failed to list {}: {source}", .dir.display())]
  Walk {
    dir: PathBuf,
    #[source]
    source: anyhow::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantOutcome {
  /// The sibling was written
  Written {
    path: PathBuf,
    original_size: usize,
    compressed_size: usize,
  },
  /// Compression did not pay off, no sibling exists
  Skipped {
    original_size: usize,
    compressed_size: usize,
  },
  Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantResult {
  pub source: PathBuf,
  pub encoding: Encoding,
  pub outcome: VariantOutcome,
}

#[derive(Debug, Default)]
pub struct CompressionReport {
  pub results: Vec<VariantResult>,
}

impl CompressionReport {
  pub fn written(&self) -> impl Iterator<Item = &VariantResult> {
    self
      .results
      .iter()
      .filter(|result| matches!(result.outcome, VariantOutcome::Written { .. }))
  }

  pub fn skipped(&self) -> impl Iterator<Item = &VariantResult> {
    self
      .results
      .iter()
      .filter(|result| matches!(result.outcome, VariantOutcome::Skipped { .. }))
  }

  pub fn failed(&self) -> impl Iterator<Item = &VariantResult> {
    self
      .results
      .iter()
      .filter(|result| matches!(result.outcome, VariantOutcome::Failed(_)))
  }
}

pub fn is_compressible(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| {
      COMPRESSIBLE_EXTENSIONS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    })
}

fn collect_compressible_files(dir: &Path) -> Result<Vec<PathBuf>, CompressionError> {
  let mut files = Vec::new();
  for entry in WalkDir::new(dir).sort(true) {
    let entry = entry.map_err(|err| CompressionError::Walk {
      dir: dir.to_path_buf(),
      source: err.into(),
    })?;
    if entry.file_type().is_file() && is_compressible(&entry.path()) {
      files.push(entry.path());
    }
  }
  Ok(files)
}

/// Write `.gz`, `.zst` and `.br` siblings for every compressible file under `dir`.
///
/// Work is spread over the blocking pool and never more than
/// `options.concurrency` compression units run at once. Files and encodings
/// complete in no particular order. A failing or timed out unit only affects
/// its own variant: it is logged, reported and the rest of the pass carries on.
#[tracing::instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn compress_files_in_dir(
  dir: &Path,
  options: &CompressionOptions,
) -> Result<CompressionReport, CompressionError> {
  let is_dir = tokio::fs::metadata(dir)
    .await
    .map(|metadata| metadata.is_dir())
    .unwrap_or(false);
  if !is_dir {
    return Err(CompressionError::NotADirectory(dir.to_path_buf()));
  }

  let start = Instant::now();
  let walk_dir = dir.to_path_buf();
  let files = tokio::task::spawn_blocking(move || collect_compressible_files(&walk_dir))
    .await
    .map_err(|err| CompressionError::Walk {
      dir: dir.to_path_buf(),
      source: err.into(),
    })??;

  let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
  let mut tasks = JoinSet::new();

  for file in files {
    for encoding in options.encodings.iter().copied() {
      let semaphore = semaphore.clone();
      let file = file.clone();
      let timeout = options.timeout;
      tasks.spawn(async move {
        let outcome = compress_variant(&file, encoding, semaphore, timeout).await;
        VariantResult {
          source: file,
          encoding,
          outcome,
        }
      });
    }
  }

  let mut report = CompressionReport::default();
  while let Some(joined) = tasks.join_next().await {
    match joined {
      Ok(result) => report.results.push(result),
      Err(err) => tracing::error!("Compression task panicked: {err}"),
    }
  }

  tracing::info!(
    written = report.written().count(),
    skipped = report.skipped().count(),
    failed = report.failed().count(),
    elapsed = ?start.elapsed(),
    "Compressed build output"
  );

  Ok(report)
}

async fn compress_variant(
  file: &Path,
  encoding: Encoding,
  semaphore: Arc<Semaphore>,
  timeout: Duration,
) -> VariantOutcome {
  let Ok(permit) = semaphore.acquire_owned().await else {
    return VariantOutcome::Failed("compression pool closed".to_string());
  };

  match run_variant(file, encoding, timeout, permit).await {
    Ok(outcome) => outcome,
    Err(err) => {
      tracing::warn!(
        file = %file.display(),
        encoding = encoding.token(),
        "Compression failed: {err:#}"
      );
      VariantOutcome::Failed(format!("{err:#}"))
    }
  }
}

/// The permit moves into the encoder task. A timed out encoder cannot be
/// cancelled and keeps its slot until it returns.
async fn run_variant(
  file: &Path,
  encoding: Encoding,
  timeout: Duration,
  permit: OwnedSemaphorePermit,
) -> anyhow::Result<VariantOutcome> {
  let source = tokio::fs::read(file).await?;
  let original_size = source.len();

  let compressed = tokio::time::timeout(
    timeout,
    tokio::task::spawn_blocking(move || {
      let _permit = permit;
      encode(encoding, &source)
    }),
  )
  .await
  .map_err(|_| anyhow::anyhow!("timed out after {timeout:?}"))???;
  let compressed_size = compressed.len();

  if compressed_size >= original_size {
    tracing::debug!(
      file = %file.display(),
      encoding = encoding.token(),
      original_size,
      compressed_size,
      "Skipping variant that does not shrink the file"
    );
    return Ok(VariantOutcome::Skipped {
      original_size,
      compressed_size,
    });
  }

  let path = encoding.sibling_path(file);
  tokio::fs::write(&path, &compressed).await?;
  tracing::debug!(
    file = %path.display(),
    original_size,
    compressed_size,
    "Wrote compressed variant"
  );

  Ok(VariantOutcome::Written {
    path,
    original_size,
    compressed_size,
  })
}
