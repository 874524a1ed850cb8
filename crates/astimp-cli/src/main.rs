//! astimp CLI: measure inhibition zones in disk-diffusion plate photographs.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use astimp::{AnalysisConfig, AnalysisReport, Analyzer, Calibration, Image, Point};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "astimp")]
#[command(about = "Measure antibiotic inhibition zones on disk-diffusion agar plates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one or more plate images.
    Analyze(CliAnalyzeArgs),

    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Input image(s). Failing images are reported and skipped.
    #[arg(long, required = true, num_args = 1..)]
    image: Vec<PathBuf>,

    /// Path to write the per-image reports (JSON array).
    #[arg(long)]
    out: PathBuf,

    /// Configuration file (JSON); missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fallback scale in mm/px when no calibration reference is given.
    #[arg(long)]
    scale_mm_per_px: Option<f64>,

    /// Reference segment start x (pixels).
    #[arg(long, requires_all = ["ref_y0", "ref_x1", "ref_y1", "ref_length_mm"])]
    ref_x0: Option<f64>,

    /// Reference segment start y (pixels).
    #[arg(long)]
    ref_y0: Option<f64>,

    /// Reference segment end x (pixels).
    #[arg(long)]
    ref_x1: Option<f64>,

    /// Reference segment end y (pixels).
    #[arg(long)]
    ref_y1: Option<f64>,

    /// Physical length of the reference segment in millimeters.
    #[arg(long, requires = "ref_x0")]
    ref_length_mm: Option<f64>,

    /// Calibrate from the disks themselves, all of this diameter (mm).
    #[arg(long, conflicts_with = "ref_x0")]
    disk_diameter_mm: Option<f64>,
}

impl CliAnalyzeArgs {
    fn calibration(&self) -> Option<Calibration> {
        if let (Some(x0), Some(y0), Some(x1), Some(y1), Some(length_mm)) = (
            self.ref_x0,
            self.ref_y0,
            self.ref_x1,
            self.ref_y1,
            self.ref_length_mm,
        ) {
            return Some(Calibration::ReferenceLength {
                from: Point::new(x0, y0),
                to: Point::new(x1, y1),
                length_mm,
            });
        }
        self.disk_diameter_mm
            .map(|diameter_mm| Calibration::KnownDiskDiameter { diameter_mm })
    }

    fn analysis_config(&self) -> CliResult<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(scale) = self.scale_mm_per_px {
            config.default_scale_mm_per_px = Some(scale);
        }
        Ok(config)
    }
}

/// One entry of the output array.
#[derive(serde::Serialize)]
struct ImageResult {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<AnalysisReport>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

fn run_default_config() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&AnalysisConfig::default())?);
    Ok(())
}

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let analyzer = Analyzer::with_config(args.analysis_config()?)?;
    let calibration = args.calibration();
    if let Some(cal) = &calibration {
        cal.validate()?;
    }

    let mut results = Vec::with_capacity(args.image.len());
    let mut n_failed = 0usize;
    for path in &args.image {
        tracing::info!("Loading image: {}", path.display());
        let img = match image::open(path) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!("Failed to open {}: {}", path.display(), e);
                n_failed += 1;
                results.push(ImageResult {
                    image: path.display().to_string(),
                    load_error: Some(e.to_string()),
                    report: None,
                });
                continue;
            }
        };
        let image = Image::from_dynamic(&img);
        let (w, h) = image.dimensions();
        tracing::info!("Image size: {}x{}", w, h);

        let report = analyzer.analyze_image_report(&image, calibration.as_ref());
        match (&report.failure, &report.measurements) {
            (Some(failure), _) => {
                n_failed += 1;
                tracing::warn!("{}: {}", path.display(), failure.message);
            }
            (None, Some(set)) => {
                for m in set {
                    tracing::info!(
                        "  disk {}: {:.*} mm ({:?})",
                        m.disk_id,
                        set.decimals as usize,
                        m.diameter_mm,
                        m.quality
                    );
                }
            }
            (None, None) => {}
        }
        results.push(ImageResult {
            image: path.display().to_string(),
            load_error: None,
            report: Some(report),
        });
    }

    let json = serde_json::to_string_pretty(&results)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!(
        "Results for {} image(s) ({} failed) written to {}",
        results.len(),
        n_failed,
        args.out.display()
    );
    Ok(())
}
