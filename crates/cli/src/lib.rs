use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plan_render::default_renderer;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use takeoff_core::{
    ledger_to_csv_string, ActionOutcome, CsvExportConfig, LedgerTotals, Measurement, PlanKind,
    PlanSource, Shape, TakeoffConfig, TakeoffSession, ToolAction, Unit,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "takeoff-cli")]
#[command(about = "Measure lengths, areas and counts off plan drawings")]
pub struct Cli {
    /// Log debug output to stderr.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable plan metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Replay a script of drawn paths and tool actions, then print the ledger.
    Run {
        #[arg(value_name = "PLAN")]
        file: PathBuf,
        #[arg(long, value_name = "JSON")]
        script: PathBuf,
        #[command(flatten)]
        plan: PlanArgs,
        /// Unit the calibration starts in (m, ft, cm, mm, in, yd, ...).
        #[arg(long)]
        unit: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Abort on the first rejected action.
        #[arg(long)]
        strict: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, clap::Args)]
struct PlanArgs {
    /// PDF page, 1-based.
    #[arg(long)]
    page: Option<u32>,
    /// PDF render resolution.
    #[arg(long)]
    dpi: Option<f32>,
    /// Config file (`key = value` lines).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    kind: PlanKind,
    page_count: u32,
    page_index: u32,
    width_px: u32,
    height_px: u32,
}

#[derive(Debug, Serialize)]
struct LedgerOutput<'a> {
    unit: &'a Unit,
    pixels_per_unit: f64,
    measurements: &'a [Measurement],
    totals: LedgerTotals,
}

#[derive(Debug, Deserialize)]
struct ScriptStep {
    #[serde(default)]
    draw: Vec<Shape>,
    #[serde(default)]
    action: Option<ScriptAction>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
enum ScriptAction {
    Calibrate {
        reference_length: f64,
    },
    Length {
        #[serde(default)]
        label: String,
    },
    Area {
        #[serde(default)]
        label: String,
    },
    Count {
        #[serde(default)]
        label: String,
        count: i64,
    },
}

impl From<ScriptAction> for ToolAction {
    fn from(action: ScriptAction) -> Self {
        match action {
            ScriptAction::Calibrate { reference_length } => {
                ToolAction::Calibrate { reference_length }
            }
            ScriptAction::Length { label } => ToolAction::Length { label },
            ScriptAction::Area { label } => ToolAction::Area { label },
            ScriptAction::Count { label, count } => ToolAction::Count { label, count },
        }
    }
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { file, plan } => run_info(&file, &plan),
        Commands::Run { file, script, plan, unit, format, output, strict } => {
            let options = RunOptions { unit, format, output, strict };
            run_script(&file, &script, &plan, &options)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // stdout carries command output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(args: &PlanArgs) -> Result<TakeoffConfig> {
    let mut config = TakeoffConfig::from_env().context("invalid TAKEOFF_* environment")?;

    if let Some(path) = &args.config {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        config = TakeoffConfig::parse(&contents, config)
            .with_context(|| format!("invalid config {}", path.display()))?;
    }

    if let Some(page) = args.page {
        if page == 0 {
            anyhow::bail!("--page is 1-based and must be >= 1");
        }
        config = config.with_page(page - 1);
    }

    if let Some(dpi) = args.dpi {
        config = config.with_pdf_dpi(dpi).context("--dpi must be positive")?;
    }

    Ok(config)
}

fn open_session(file: &Path, config: TakeoffConfig) -> Result<TakeoffSession> {
    ensure_file_exists(file)?;

    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let source = PlanSource::sniff(bytes, config.default_page, config.pdf_dpi);

    let mut session = TakeoffSession::with_config(config);
    session.load_plan(&default_renderer(), &source).context("failed to load plan")?;

    Ok(session)
}

fn run_info(file: &Path, args: &PlanArgs) -> Result<()> {
    let session = open_session(file, load_config(args)?)?;
    let plan = session.plan().context("failed to load plan")?;

    let payload = InfoOutput {
        path: file.display().to_string(),
        kind: plan.kind(),
        page_count: plan.page_count(),
        page_index: plan.page_index(),
        width_px: plan.width(),
        height_px: plan.height(),
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

struct RunOptions {
    unit: Option<String>,
    format: OutputFormat,
    output: Option<PathBuf>,
    strict: bool,
}

fn run_script(file: &Path, script: &Path, args: &PlanArgs, options: &RunOptions) -> Result<()> {
    let mut config = load_config(args)?;
    if let Some(unit) = &options.unit {
        let unit: Unit = unit.parse().context("--unit must not be empty")?;
        config = config.with_unit(unit);
    }

    let steps = read_script(script)?;
    let mut session = open_session(file, config)?;

    for (index, step) in steps.into_iter().enumerate() {
        let number = index + 1;
        session.surface_mut().extend(step.draw);

        let Some(action) = step.action else {
            continue;
        };

        match session.apply(action.into()) {
            Ok(ActionOutcome::Calibrated { pixels_per_unit }) => {
                tracing::info!(step = number, pixels_per_unit, "calibrated");
            }
            Ok(ActionOutcome::Recorded(measurement)) => {
                tracing::info!(step = number, value = %measurement.formatted(), "recorded");
            }
            Err(error) if options.strict => {
                return Err(error).with_context(|| format!("step {number} rejected"));
            }
            Err(error) => eprintln!("step {number}: {error}"),
        }
    }

    let rendered = match options.format {
        OutputFormat::Csv => ledger_to_csv_string(session.ledger(), &CsvExportConfig::default())?,
        OutputFormat::Json => {
            let payload = LedgerOutput {
                unit: session.calibration().unit(),
                pixels_per_unit: session.calibration().pixels_per_unit(),
                measurements: session.ledger().all(),
                totals: session.ledger().totals(),
            };
            serde_json::to_string_pretty(&payload)? + "\n"
        }
    };

    match &options.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, rendered)
                .with_context(|| format!("failed to write ledger to {}", path.display()))?;
            println!("{}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}

fn read_script(path: &Path) -> Result<Vec<ScriptStep>> {
    ensure_file_exists(path)?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid script {}", path.display()))
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
