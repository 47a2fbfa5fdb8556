mod config;

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, bail, ensure, Context, Result};
use clap::{Parser, ValueEnum};
use client_core::{HttpMosaicApi, ProgressCallback, SessionController, SessionState, UploadFile};
use config::load_settings;
use shared::{
    domain::{ColorMode, DziMetadata, Resolution},
    protocol::SettingsUpdate,
};
use tokio::sync::watch;
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CLOSE_GRACE: Duration = Duration::from_secs(3);
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(
    name = "mosaic",
    version,
    about = "Build a photo mosaic through a remote mosaic service session"
)]
struct Args {
    /// Base URL of the mosaic service API
    #[arg(long)]
    server_url: Option<String>,
    /// Config file (defaults to ./mosaic.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Target image the mosaic should reproduce
    #[arg(long)]
    target: PathBuf,
    /// Output width in pixels; defaults to the target image width
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Tile image files or directories of tile images
    #[arg(long, required = true, num_args = 1..)]
    tiles: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = ResolutionArg::Low)]
    resolution: ResolutionArg,
    #[arg(long)]
    use_all_tiles: bool,
    #[arg(long)]
    manual: bool,
    #[arg(long)]
    nine_x_detail: bool,

    #[arg(long, action = clap::ArgAction::Set)]
    allow_duplicates: Option<bool>,
    #[arg(long, action = clap::ArgAction::Set)]
    allow_tinting: Option<bool>,
    /// Tint strength, 0-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    tint: Option<u8>,
    #[arg(long)]
    tile_size: Option<u32>,
    #[arg(long)]
    max_repeats: Option<u32>,
    #[arg(long, value_enum)]
    color_mode: Option<ColorModeArg>,
}

impl Args {
    fn settings_update(&self) -> SettingsUpdate {
        SettingsUpdate {
            allow_duplicates: self.allow_duplicates,
            allow_tinting: self.allow_tinting,
            tint_percentage: self.tint,
            tile_size: self.tile_size,
            max_repeats_per_tile: self.max_repeats,
            color_mode: self.color_mode.map(Into::into),
            nine_x_detail: self.nine_x_detail.then_some(true),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResolutionArg {
    Low,
    High,
}

impl From<ResolutionArg> for Resolution {
    fn from(value: ResolutionArg) -> Self {
        match value {
            ResolutionArg::Low => Resolution::Low,
            ResolutionArg::High => Resolution::High,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorModeArg {
    Blend,
    Tint,
    Original,
}

impl From<ColorModeArg> for ColorMode {
    fn from(value: ColorModeArg) -> Self {
        match value {
            ColorModeArg::Blend => ColorMode::Blend,
            ColorModeArg::Tint => ColorMode::Tint,
            ColorModeArg::Original => ColorMode::Original,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(server_url) = &args.server_url {
        settings.server_url = server_url.clone();
    }
    if let Some(timeout_secs) = args.timeout_secs {
        settings.request_timeout_secs = timeout_secs;
    }
    let api = HttpMosaicApi::with_timeout(
        &settings.server_url,
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    info!(server_url = %api.base_url(), "using mosaic service");
    let controller = SessionController::spawn(Arc::new(api));
    let beacon = controller.beacon();
    tokio::spawn(log_steps(controller.subscribe()));

    let outcome = tokio::select! {
        outcome = run_wizard(&controller, &args) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(outcome) = outcome else {
        warn!("interrupted; abandoning session");
        beacon.fire();
        if tokio::time::timeout(CLOSE_GRACE, controller.close())
            .await
            .is_err()
        {
            warn!("session teardown did not finish in time");
        }
        bail!("interrupted");
    };

    controller.close().await;
    let metadata = outcome?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

async fn run_wizard(controller: &SessionController, args: &Args) -> Result<DziMetadata> {
    let Some(session_id) = controller.wait_for_session().await else {
        bail!(current_error(controller));
    };
    info!(%session_id, "session ready");

    let target = UploadFile::from_path(&args.target).await?;
    controller.upload_target(target).settled().await;
    let state = checked(controller)?;
    if let Some(dimensions) = state.target_image_dimensions {
        info!(
            width = dimensions.width,
            height = dimensions.height,
            "target image accepted"
        );
    }

    let width = args.width.unwrap_or(state.desired_width);
    let height = args.height.unwrap_or(state.desired_height);
    controller.set_dimensions(width, height).settled().await;
    let state = checked(controller)?;
    if let Some(requirements) = &state.requirements {
        info!(requirements = %requirements.0, "output requirements");
    }

    let files = collect_tiles(&args.tiles).await?;
    ensure!(!files.is_empty(), "no tile images found");
    info!(count = files.len(), "uploading tile images");
    controller
        .upload_tiles(files, Some(progress_logger()))
        .settled()
        .await;
    let state = checked(controller)?;
    info!(total = state.tile_count, "tile images held by the service");

    controller.set_resolution(args.resolution.into()).settled().await;
    controller.set_use_all_tiles(args.use_all_tiles).settled().await;
    controller.set_manual_mode(args.manual).settled().await;
    let update = args.settings_update();
    if update != SettingsUpdate::default() {
        controller.update_settings(update).settled().await;
        checked(controller)?;
    }

    info!("generating mosaic");
    controller.generate_mosaic().settled().await;
    checked(controller)?
        .dzi_metadata
        .ok_or_else(|| anyhow!("service returned no mosaic metadata"))
}

/// `RUST_LOG` directives when present and valid, `info` otherwise.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn checked(controller: &SessionController) -> Result<SessionState> {
    let state = controller.state();
    if let Some(message) = &state.error {
        bail!("{message}");
    }
    Ok(state)
}

fn current_error(controller: &SessionController) -> String {
    controller
        .state()
        .error
        .unwrap_or_else(|| "session ended unexpectedly".to_string())
}

async fn collect_tiles(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    let mut files = Vec::new();
    for path in paths {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("cannot access '{}'", path.display()))?;
        if metadata.is_dir() {
            for entry in list_dir(path).await? {
                files.push(UploadFile::from_path(entry).await?);
            }
        } else {
            files.push(UploadFile::from_path(path).await?);
        }
    }
    Ok(files)
}

async fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot read directory '{}'", dir.display()))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn progress_logger() -> ProgressCallback {
    let last_decile = Arc::new(AtomicU64::new(0));
    Arc::new(move |fraction| {
        let decile = (fraction * 10.0).floor() as u64;
        if decile > last_decile.fetch_max(decile, Ordering::Relaxed) {
            info!(percent = decile * 10, "tile upload progress");
        }
    })
}

async fn log_steps(updates: watch::Receiver<SessionState>) {
    let mut updates = WatchStream::new(updates);
    let mut last_step = 0;
    while let Some(state) = updates.next().await {
        if state.step != last_step {
            info!(step = state.step, "wizard step");
            last_step = state.step;
        }
    }
}
