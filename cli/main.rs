#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use crashrisk::chain::{ChainStep, Direction};
use crashrisk::config::{ConfigError, EngineConfig};
use crashrisk::data::load_records;
use crashrisk::diagnostics::evaluate;
use crashrisk::progress::{EpochSummary, TrainingProgressObserver};
use crashrisk::record::Conditions;
use crashrisk::session::RiskSession;

#[derive(Clone, Copy, ValueEnum)]
pub enum DirectionCli {
    Worst,
    Best,
    Both,
}

impl DirectionCli {
    fn directions(self) -> &'static [Direction] {
        match self {
            Self::Worst => &[Direction::Worst],
            Self::Best => &[Direction::Best],
            Self::Both => &[Direction::Worst, Direction::Best],
        }
    }
}

/// Configuration file and per-run hyperparameter overrides.
#[derive(Args)]
pub struct EngineArgs {
    /// Path to a TOML configuration file (defaults are used when omitted)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of hash buckets in the feature space
    #[arg(long, global = true)]
    pub dimension: Option<usize>,

    /// Number of SGD passes over the records
    #[arg(long, global = true)]
    pub epochs: Option<usize>,

    /// Learning rate of the first epoch
    #[arg(long, global = true)]
    pub learning_rate: Option<f64>,

    /// L2 weight decay strength
    #[arg(long, global = true)]
    pub l2_lambda: Option<f64>,

    /// Maximum number of assignments in a risk chain
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Minimum number of matching records for a chain step
    #[arg(long, global = true)]
    pub min_support: Option<usize>,

    /// Minimum directional improvement for a chain step
    #[arg(long, global = true)]
    pub min_delta: Option<f64>,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Vehicle type, e.g. "Sedan"
    #[arg(long)]
    pub vehicle_type: Option<String>,

    /// Pre-crash action, e.g. "Going Straight Ahead"
    #[arg(long)]
    pub pre_crash: Option<String>,

    /// Borough, e.g. "BROOKLYN"
    #[arg(long)]
    pub borough: Option<String>,

    /// Hour of day (0-23)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=23))]
    pub hour: Option<u8>,

    /// Day of week (0-6, Sunday = 0)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=6))]
    pub dow: Option<u8>,
}

impl QueryArgs {
    fn into_conditions(self) -> Conditions {
        Conditions {
            vehicle_type: self.vehicle_type,
            pre_crash: self.pre_crash,
            borough: self.borough,
            hour: self.hour,
            dow: self.dow,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "crashrisk",
    about = "Injury-risk estimation and risk-chain search for traffic collisions",
    long_about = "Trains a hashed-feature logistic regression on collision records and \
                 walks the fitted model to find the conditions that raise or lower the \
                 probability that a collision involves an injury."
)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model and report in-sample diagnostics
    #[command(about = "Train a model and print a summary")]
    Train {
        /// Path to the collision table (CSV, or TSV with a .tsv extension)
        data: PathBuf,
    },

    /// Estimate the injury probability for a set of conditions
    #[command(about = "Estimate injury risk for the given conditions")]
    Predict {
        /// Path to the collision table
        data: PathBuf,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Build the worst and/or best risk chains
    #[command(about = "Search for the riskiest and safest condition chains (outputs TSV)")]
    Chains {
        /// Path to the collision table
        data: PathBuf,

        #[arg(long, value_enum, default_value_t = DirectionCli::Both)]
        direction: DirectionCli,

        /// Write the chains to this file instead of standard output
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List the most frequent values of each field
    #[command(about = "Print the selectable values of each field")]
    Domains {
        /// Path to the collision table
        data: PathBuf,
    },

    /// Score every record of a table
    #[command(about = "Predict every record (outputs: predictions.tsv)")]
    Score {
        /// Path to the collision table
        data: PathBuf,

        #[arg(long, default_value = "predictions.tsv")]
        output: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Show version information
    Version,
}

fn resolve_config(args: &EngineArgs) -> Result<EngineConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(dimension) = args.dimension {
        config.hashing.dimension = dimension;
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(rate) = args.learning_rate {
        config.training.learning_rate = rate;
    }
    if let Some(lambda) = args.l2_lambda {
        config.training.l2_lambda = lambda;
    }
    if let Some(depth) = args.max_depth {
        config.chain.max_depth = depth;
    }
    if let Some(support) = args.min_support {
        config.chain.min_support = support;
    }
    if let Some(delta) = args.min_delta {
        config.chain.min_delta = delta;
    }

    config.validate()?;
    Ok(config)
}

/// Destination of human-readable status lines. Commands that stream a table
/// to stdout report on stderr instead.
#[derive(Clone, Copy)]
enum StatusStream {
    Stdout,
    Stderr,
}

impl StatusStream {
    fn line(self, message: impl fmt::Display) {
        match self {
            Self::Stdout => println!("{message}"),
            Self::Stderr => eprintln!("{message}"),
        }
    }
}

fn open_session(
    data: &Path,
    config: EngineConfig,
    status: StatusStream,
) -> Result<RiskSession, Box<dyn std::error::Error>> {
    status.line(format_args!("Loading collision records from: {}", data.display()));
    let records = load_records(data)?;
    status.line(format_args!("Loaded {} records", records.len()));
    Ok(RiskSession::new(config, records))
}

/// Draws a progress bar over all epochs when stderr is a terminal.
struct EpochProgressBar {
    bar: Option<ProgressBar>,
    total_records: u64,
}

impl EpochProgressBar {
    fn new() -> Self {
        Self {
            bar: None,
            total_records: 0,
        }
    }
}

impl TrainingProgressObserver for EpochProgressBar {
    fn on_training_start(&mut self, total_records: usize, epochs: usize) {
        let draw_target = if io::stderr().is_terminal() {
            ProgressDrawTarget::stderr_with_hz(20)
        } else {
            ProgressDrawTarget::hidden()
        };
        self.total_records = total_records as u64;
        let bar = ProgressBar::with_draw_target(Some(self.total_records * epochs as u64), draw_target);
        if let Ok(style) = ProgressStyle::with_template(
            "> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        ) {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        bar.set_message("training");
        self.bar = Some(bar);
    }

    fn on_epoch_advance(&mut self, epoch: usize, processed_records: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(epoch as u64 * self.total_records + processed_records as u64);
        }
    }

    fn on_epoch_finish(&mut self, summary: &EpochSummary) {
        if let Some(bar) = &self.bar {
            bar.println(summary.to_string());
        }
    }

    fn on_training_finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn run_train(data: &Path, config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(data, config, StatusStream::Stdout)?;
    println!(
        "Training with dimension {}, {} epochs, learning rate {}, L2 lambda {}",
        session.config().hashing.dimension,
        session.config().training.epochs,
        session.config().training.learning_rate,
        session.config().training.l2_lambda
    );

    let mut progress = EpochProgressBar::new();
    let Some(model) = session.model_with_progress(&mut progress) else {
        println!("Not enough data: no records to train on.");
        return Ok(());
    };

    println!("Base rate: {:.4}", model.base_rate());
    println!("Bias (log-odds): {:.5}", model.bias());
    println!(
        "Active buckets: {} of {}",
        model.active_buckets(),
        model.dimension()
    );
    if let Some(evaluation) = evaluate(model, session.records()) {
        println!("{evaluation}");
    }
    Ok(())
}

fn run_predict(
    data: &Path,
    query: QueryArgs,
    config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(data, config, StatusStream::Stdout)?;
    let conditions = query.into_conditions();
    let described = conditions
        .constrained_fields()
        .filter_map(|field| {
            conditions
                .get(field)
                .map(|value| format!("{}={}", field.describe(), field.format_value(&value)))
        })
        .join(", ");
    let scope = if described.is_empty() {
        "all collisions".to_string()
    } else {
        described
    };
    let support = crashrisk::chain::support_count(session.records(), &conditions);

    println!("Conditions: {scope}");
    println!("Matching records: {support}");
    println!("Estimated injury risk: {}", session.estimate(&conditions));
    Ok(())
}

fn write_chain(
    out: &mut dyn Write,
    direction: Direction,
    steps: &[ChainStep],
) -> Result<(), io::Error> {
    for (index, step) in steps.iter().enumerate() {
        let field = step.field.map(|f| f.key()).unwrap_or("");
        let value = step.value.as_ref().map(ToString::to_string).unwrap_or_default();
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{:.6}\t{}",
            direction, index, step.label, field, value, step.probability, step.support
        )?;
    }
    Ok(())
}

fn run_chains(
    data: &Path,
    direction: DirectionCli,
    output: Option<PathBuf>,
    config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = if output.is_some() {
        StatusStream::Stdout
    } else {
        StatusStream::Stderr
    };
    let session = open_session(data, config, status)?;
    if session.model().is_none() {
        status.line("Not enough data: chains contain only the Start step.");
    }

    let mut out: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    writeln!(out, "direction\tstep\tlabel\tfield\tvalue\tprobability\tsupport")?;
    for &dir in direction.directions() {
        let steps = session.chain(dir);
        write_chain(&mut out, dir, &steps)?;
    }
    out.flush()?;

    if let Some(path) = output {
        println!("Chains saved to: {}", path.display());
    }
    Ok(())
}

fn run_domains(data: &Path, config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(data, config, StatusStream::Stdout)?;
    let domains = session.display_domains();
    for (field, values) in domains.iter() {
        let rendered = values.iter().map(|v| field.format_value(v)).join(", ");
        println!("{} ({}): {}", field.describe(), values.len(), rendered);
    }
    Ok(())
}

fn run_score(data: &Path, output: &Path, config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(data, config, StatusStream::Stdout)?;
    let Some(model) = session.model() else {
        println!("Not enough data: no predictions written.");
        return Ok(());
    };

    let predictions = model.predict_many(session.records());
    let mut file = BufWriter::new(File::create(output)?);
    writeln!(file, "row\tinjured\tprediction")?;
    for (row, (record, p)) in session.records().iter().zip(&predictions).enumerate() {
        writeln!(file, "{}\t{}\t{}", row + 1, u8::from(record.injured), p)?;
    }
    file.flush()?;
    println!("Predictions saved to: {}", output.display());
    Ok(())
}

fn run_config(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn print_version_info() {
    println!("crashrisk {}", env!("CARGO_PKG_VERSION"));
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let Cli { engine, command } = cli;

    let Some(command) = command else {
        if Cli::command().print_help().is_ok() {
            println!();
        }
        return;
    };

    let result = resolve_config(&engine)
        .map_err(Into::into)
        .and_then(|config| run_command(command, config));

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Commands, config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Train { data } => run_train(&data, config),
        Commands::Predict { data, query } => run_predict(&data, query, config),
        Commands::Chains {
            data,
            direction,
            output,
        } => run_chains(&data, direction, output, config),
        Commands::Domains { data } => run_domains(&data, config),
        Commands::Score { data, output } => run_score(&data, &output, config),
        Commands::Config => run_config(&config),
        Commands::Version => {
            print_version_info();
            Ok(())
        }
    }
}
