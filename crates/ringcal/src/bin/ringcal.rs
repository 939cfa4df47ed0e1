//! ringcal CLI: ring-grid center detection and synthetic board rendering.

use clap::{Args, Parser, Subcommand};
use ringcal::detect::{gray_view, load_gray, to_image_gray};
use ringcal::rings::synthetic::{render_board, RenderParams};
use ringcal::{RingBoardSpec, RingGridDetectConfig, RingGridDetectReport};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[cfg(feature = "tracing")]
use tracing_log::LogTracer;
#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ringcal")]
#[command(about = "Detect concentric ring calibration grids and their projected centers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the ring grid described by a JSON config and write a JSON report.
    Detect(DetectArgs),

    /// Render a synthetic ring board to a PNG.
    Render(RenderArgs),
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Detection config (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Report path; overrides `output_path` from the config.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct RenderArgs {
    /// Board spec (JSON). When given, the size flags are ignored.
    #[arg(long)]
    board: Option<PathBuf>,

    #[arg(long, default_value = "3")]
    rows: u32,

    #[arg(long, default_value = "4")]
    cols: u32,

    /// Node pitch in board units.
    #[arg(long, default_value = "80.0")]
    spacing: f32,

    /// Four ascending boundary radii, comma separated.
    #[arg(long, value_delimiter = ',', num_args = 4, default_value = "10,16,24,30")]
    radii: Vec<f32>,

    #[arg(long, default_value = "1.0")]
    px_per_unit: f32,

    /// Border around the outer node centers, in pixels.
    #[arg(long, default_value = "60.0")]
    margin: f32,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Render(args) => run_render(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    #[cfg(feature = "tracing")]
    {
        let _ = LogTracer::init();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = ringcal::init_from_env(log::LevelFilter::Info);
    }
}

// ── detect ─────────────────────────────────────────────────────────────

/// Once the config parses, every failure lands in the report before the
/// command exits nonzero. An unreadable config has no report to write.
fn run_detect(args: &DetectArgs) -> CliResult<()> {
    let cfg = RingGridDetectConfig::load_json(&args.config)?;
    let out = args.out.clone().unwrap_or_else(|| cfg.output_path());
    let mut report = RingGridDetectReport::new(&cfg, &args.config);

    let failure = match detect_into(&cfg, &args.config, &mut report) {
        Ok(()) => None,
        Err(err) => {
            report.set_error(&err);
            Some(err)
        }
    };

    report.write_json(&out)?;
    log::info!("wrote report JSON to {}", out.display());

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn detect_into(
    cfg: &RingGridDetectConfig,
    config_path: &Path,
    report: &mut RingGridDetectReport,
) -> CliResult<()> {
    let detector = cfg.build_detector()?;
    let image_path = resolve_relative(config_path, &cfg.image_path);
    let img = load_gray(&image_path)?;
    report.image_size = Some([img.width() as usize, img.height() as usize]);

    let detection = detector.detect(&gray_view(&img))?;
    log::info!(
        "{} ring centers detected ({:?} coarse strategy)",
        detection.points.len(),
        detection.strategy
    );
    report.set_detection(detection);
    Ok(())
}

/// Image paths in a config are relative to the config file.
fn resolve_relative(config: &Path, image: &str) -> PathBuf {
    let path = PathBuf::from(image);
    if path.is_absolute() {
        return path;
    }
    config
        .parent()
        .map(|dir| dir.join(&path))
        .unwrap_or(path)
}

// ── render ─────────────────────────────────────────────────────────────

fn run_render(args: &RenderArgs) -> CliResult<()> {
    let board: RingBoardSpec = match &args.board {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => {
            let radii: [f32; 4] = args
                .radii
                .as_slice()
                .try_into()
                .map_err(|_| "exactly four radii are required")?;
            RingBoardSpec {
                rows: args.rows,
                cols: args.cols,
                spacing: args.spacing,
                radii,
            }
        }
    };
    board.validate()?;

    let params = RenderParams {
        px_per_unit: args.px_per_unit,
        margin: args.margin,
        ..RenderParams::default()
    };
    let img = to_image_gray(&render_board(&board, &params))?;
    img.save(&args.out)?;
    log::info!(
        "rendered {}x{} board ({}x{} px) to {}",
        board.rows,
        board.cols,
        img.width(),
        img.height(),
        args.out.display()
    );
    Ok(())
}
