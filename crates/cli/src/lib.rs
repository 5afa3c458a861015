//! Pagedeck CLI
//!
//! Renders every page of a PDF to PNG thumbnails by driving the full
//! pipeline: one thumbnail unit per page, marked visible and ticked with
//! synthetic time until it settles. By default each page is written from
//! the fast first-pass render; `--high` waits out the quality promotion
//! and writes the full-resolution render instead.

use anyhow::{Context, Result};
use clap::Parser;
use pagedeck_cache::{BitmapCache, CacheConfig, RenderRequest};
use pagedeck_core::{
    PresentError, PresentOutcome, RenderPhase, ThumbnailPipeline, ThumbnailUnit,
};
use pagedeck_scheduler::Quality;
use pagedeck_worker::{LopdfWorker, Rotation};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Synthetic time step per pump tick. Small enough that the first-pass
/// render settles before the quality promotion deadline.
const PUMP_STEP: Duration = Duration::from_millis(50);

/// Pump bound; covers the worst case of a full retry ladder plus promotion.
const MAX_PUMP_TICKS: u32 = 256;

#[derive(Debug, Parser)]
#[command(name = "pagedeck")]
#[command(about = "Render PDF page thumbnails through the pagedeck pipeline")]
#[command(version)]
pub struct Cli {
    /// Input PDF file.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Output directory (default: `<stem>-pages` next to the input).
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Thumbnail width in pixels, before resolution scaling.
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Page rotation in degrees (0, 90, 180 or 270).
    #[arg(long, default_value_t = 0)]
    rotate: u16,

    /// Write the full-quality render instead of the fast first pass.
    #[arg(long)]
    high: bool,

    /// Print a JSON report of pipeline and cache counters.
    #[arg(long)]
    stats: bool,

    /// Verbose logging to stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    pages: u32,
    decode_attempts: u64,
    cache_hits: u64,
    documents_loaded: u64,
    retries_scheduled: u64,
    terminal_errors: u64,
    cache_entries: usize,
    cache_bytes: usize,
    cache_usage_percent: f64,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    let rotation = Rotation::from_degrees(cli.rotate)
        .ok_or_else(|| anyhow::anyhow!("--rotate must be 0, 90, 180 or 270"))?;

    ensure_pdf_exists(&cli.file)?;
    let bytes =
        fs::read(&cli.file).with_context(|| format!("failed to read {}", cli.file.display()))?;

    let config = CacheConfig::from_env().context("invalid cache configuration")?;
    let worker = Arc::new(LopdfWorker::new());
    let pipeline = ThumbnailPipeline::new(BitmapCache::with_config(&config), worker);
    let source_id = pipeline.add_source(bytes);

    let page_count = pipeline.page_count(source_id).context("failed to open PDF")?;

    let out_dir = cli.out.clone().unwrap_or_else(|| default_output_dir(&cli.file));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    for page_index in 0..page_count {
        let request = RenderRequest {
            source_id,
            page_index,
            target_width: cli.width,
            resolution_scale: 1.0,
            rotation,
        };
        let path = out_dir.join(format!("page-{:03}.png", page_index + 1));
        render_page(&pipeline, request, cli.high, &path)
            .with_context(|| format!("page {}", page_index + 1))?;
        println!("{}", path.display());
    }

    if cli.stats {
        let stats = pipeline.stats();
        let cache = pipeline.cache().stats();
        let report = StatsReport {
            pages: page_count,
            decode_attempts: stats.decode_attempts,
            cache_hits: stats.cache_hits,
            documents_loaded: stats.documents_loaded,
            retries_scheduled: stats.retries_scheduled,
            terminal_errors: stats.terminal_errors,
            cache_entries: cache.size,
            cache_bytes: cache.memory_bytes,
            cache_usage_percent: cache.usage_percent,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level =
        if verbose { simplelog::LevelFilter::Debug } else { simplelog::LevelFilter::Warn };
    let _ = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    );
}

/// Drive one page's unit to a settled state and write its bitmap.
fn render_page(
    pipeline: &ThumbnailPipeline,
    request: RenderRequest,
    high: bool,
    path: &Path,
) -> Result<()> {
    let mut unit = ThumbnailUnit::new(request);
    let mut now = Instant::now();
    unit.observe_visibility(true, now);

    for _ in 0..MAX_PUMP_TICKS {
        pipeline.tick(&mut unit, now);
        match unit.phase() {
            RenderPhase::Rendered if !high || unit.quality() == Quality::High => {
                return write_png(pipeline, &mut unit, now, path);
            }
            RenderPhase::Errored(error) => anyhow::bail!("{}", error.label()),
            _ => {}
        }
        now += PUMP_STEP;
    }

    anyhow::bail!("render did not settle")
}

/// Write the unit's displayed bitmap through the presentation boundary.
fn write_png(
    pipeline: &ThumbnailPipeline,
    unit: &mut ThumbnailUnit,
    now: Instant,
    path: &Path,
) -> Result<()> {
    let outcome = pipeline.present_with(unit, now, |bitmap| {
        let image =
            image::RgbaImage::from_raw(bitmap.width, bitmap.height, bitmap.pixels.clone())
                .ok_or_else(|| PresentError::new("pixel buffer does not match dimensions"))?;
        image.save(path).map_err(|err| PresentError::new(err.to_string()))
    });

    match outcome {
        PresentOutcome::Presented => Ok(()),
        PresentOutcome::RetryScheduled | PresentOutcome::Suppressed => {
            anyhow::bail!("failed to write image to {}", path.display())
        }
        PresentOutcome::NotRendered => anyhow::bail!("nothing rendered for {}", path.display()),
    }
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_output_dir(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("pagedeck");

    file.with_file_name(format!("{stem}-pages"))
}
