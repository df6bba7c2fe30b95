use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use scenaria_config::ScenariaConfig;
use scenaria_engine::document::NodeMode;
use scenaria_engine::random::SeededSource;
use scenaria_engine::runner::{self, ChoicePolicy};
use scenaria_engine::{LoadOptions, RunError, Scenario, Simulation};
use scenaria_telemetry::{EventLogger, MetricsRecorder};

use crate::{play, render};

#[derive(Parser, Debug)]
#[command(name = "scenaria", version, about)]
pub struct Cli {
    /// Configuration file; defaults to `config/scenaria.yaml` when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and check a scenario document
    Validate(ValidateArgs),
    /// Run a scenario to the end without interaction
    Run(RunArgs),
    /// Play a scenario interactively
    Play(PlayArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    pub document: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    pub document: PathBuf,
    /// Seed for bonus draws and random choices; overrides `engine.seed`
    #[arg(long)]
    pub seed: Option<u64>,
    /// Option ids to pick at successive choice nodes
    #[arg(long, value_delimiter = ',', conflicts_with = "random")]
    pub choose: Vec<String>,
    /// Pick uniformly among the available options
    #[arg(long)]
    pub random: bool,
    /// Fail unless the run digest equals this hash
    #[arg(long)]
    pub validate_hash: Option<String>,
    /// Print the final state
    #[arg(long)]
    pub show_state: bool,
    /// Overrides `engine.max_steps`
    #[arg(long)]
    pub max_steps: Option<usize>,
}

impl RunArgs {
    fn policy(&self) -> ChoicePolicy {
        if !self.choose.is_empty() {
            ChoicePolicy::Scripted(self.choose.clone())
        } else if self.random {
            ChoicePolicy::Random
        } else {
            ChoicePolicy::First
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
    pub document: PathBuf,
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ScenariaConfig::load_from_path(path),
        None => ScenariaConfig::load(),
    }
    .context("failed to load configuration")?;
    EventLogger::init(&config.telemetry.log_level, config.telemetry.json)?;
    let metrics = MetricsRecorder::new()?;

    let result = match cli.command {
        Commands::Validate(args) => validate(&args, &config),
        Commands::Run(args) => run(&args, &config, &metrics),
        Commands::Play(args) => interactive(&args, &config, &metrics),
    };

    if config.telemetry.metrics {
        print!("{}", metrics.gather_metrics()?);
    }
    result
}

fn load(path: &Path, config: &ScenariaConfig) -> anyhow::Result<Scenario> {
    Scenario::load(path, &LoadOptions::from(&config.engine))
        .with_context(|| format!("failed to load scenario {}", path.display()))
}

fn rng(seed: Option<u64>, config: &ScenariaConfig) -> SeededSource {
    match seed.or(config.engine.seed) {
        Some(seed) => {
            info!(seed, "Using seeded random source");
            SeededSource::from_seed(seed)
        }
        None => SeededSource::from_entropy(),
    }
}

fn validate(args: &ValidateArgs, config: &ScenariaConfig) -> anyhow::Result<()> {
    let scenario = load(&args.document, config)?;
    let mut out = io::stdout().lock();

    writeln!(out, "{}: ok", args.document.display())?;
    if !scenario.title().is_empty() {
        writeln!(out, "title: {}", scenario.title())?;
    }
    writeln!(
        out,
        "{} nodes, {} derived fields, start `{}`",
        scenario.nodes().len(),
        scenario.derived().len(),
        scenario.start()
    )?;
    for node in scenario.nodes() {
        let mode = match node.mode {
            NodeMode::Auto => "auto",
            NodeMode::Choice => "choice",
        };
        let ids: Vec<&str> = node.options.iter().map(|o| o.id.as_str()).collect();
        let fallback = node
            .fallback
            .as_ref()
            .map(|f| format!(" (fallback `{}`)", f.id))
            .unwrap_or_default();
        writeln!(out, "  {} [{}]: {}{}", node.id, mode, ids.join(", "), fallback)?;
    }
    let unreachable = scenario.unreachable();
    if !unreachable.is_empty() {
        writeln!(out, "unreachable: {}", unreachable.join(", "))?;
    }
    Ok(())
}

fn run(args: &RunArgs, config: &ScenariaConfig, metrics: &MetricsRecorder) -> anyhow::Result<()> {
    let scenario = Arc::new(load(&args.document, config)?);
    let mut simulation = Simulation::new(Arc::clone(&scenario));
    let mut rng = rng(args.seed, config);
    let max_steps = args.max_steps.unwrap_or(config.engine.max_steps);

    let report = runner::run(&mut simulation, &args.policy(), &mut rng, max_steps);
    for step in simulation.history() {
        render::record(metrics, step);
    }
    let report = match report {
        Ok(report) => report,
        Err(err) => {
            if matches!(err, RunError::Simulation(_)) {
                metrics.failed_transitions.inc();
            }
            error!(error = %err, "Run failed");
            return Err(err.into());
        }
    };

    let mut out = io::stdout().lock();
    for step in &report.steps {
        render::resolution(&mut out, step)?;
    }
    if args.show_state {
        writeln!(out, "final state:")?;
        render::state(&mut out, &simulation)?;
        writeln!(out, "store: {}", report.final_store)?;
    }
    writeln!(out, "steps: {}", report.steps.len())?;
    writeln!(out, "digest: {}", report.digest)?;
    EventLogger::log_run(scenario.title(), report.steps.len(), &report.digest);

    if let Some(expected) = &args.validate_hash {
        if !expected.eq_ignore_ascii_case(&report.digest) {
            error!("Hash mismatch! Expected: {}", expected);
            bail!(
                "state hash mismatch: expected {}, got {}",
                expected,
                report.digest
            );
        }
        info!("Run digest verified");
    }
    Ok(())
}

fn interactive(
    args: &PlayArgs,
    config: &ScenariaConfig,
    metrics: &MetricsRecorder,
) -> anyhow::Result<()> {
    let scenario = load(&args.document, config)?;
    let mut simulation = Simulation::new(Arc::new(scenario));
    let mut rng = rng(args.seed, config);
    play::play(
        &mut simulation,
        &mut rng,
        metrics,
        &mut io::stdin().lock(),
        &mut io::stdout().lock(),
    )
}
