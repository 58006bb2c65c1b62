//! Shotmaker CLI - few-shot prompt rendering and parsing
//!
//! Command-line interface over the shotmaker engine: renders prompts from
//! JSON inputs, parses model responses and whole prompts back into fields,
//! normalizes engine configuration files and produces evaluation splits.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use shotmaker_core::splits::{DEFAULT_SEED, DEFAULT_SHOTS};
use shotmaker_core::{EngineConfig, Example, FewShotSplits, PromptEngine, to_representation};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Shotmaker - bidirectional few-shot prompt codec
///
/// Renders structured examples into prompts and recovers structured data
/// from text laid out the same way.
#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available shotmaker commands
#[derive(Subcommand)]
enum Commands {
    /// Render a prompt
    ///
    /// Reads `{ "context": {...}, "examples": [...], "query": {...} }` from
    /// the input file and prints the rendered prompt.
    Render {
        /// Engine configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,

        /// Render input file (JSON)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Parse a model response
    ///
    /// Prints the recovered fields as JSON.
    Parse {
        /// Engine configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,

        /// Response file; stdin when omitted
        #[arg(short, long)]
        response: Option<PathBuf>,
    },

    /// Parse a whole prompt back into its examples and query
    ///
    /// Prints a JSON array with the examples in order and the query last.
    Load {
        /// Engine configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,

        /// Prompt file
        #[arg(short, long)]
        prompt: PathBuf,
    },

    /// Print the normalized engine configuration
    ///
    /// Builds the engine, then writes its configuration back out with every
    /// parameter spelled out.
    Config {
        /// Engine configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Produce leave-one-out few-shot splits
    ///
    /// Reads a JSON array of records and prints `{ "query", "shots" }` pairs.
    Splits {
        /// Records file (JSON array)
        #[arg(short, long)]
        input: PathBuf,

        /// Field copied into each query; repeat for several
        #[arg(short = 'q', long = "query-field", required = true)]
        query_fields: Vec<String>,

        /// Maximum number of shots per split
        #[arg(short, long, default_value_t = DEFAULT_SHOTS)]
        shots: usize,

        /// Sampling seed
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
}

/// Configuration document format
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Toml,
}

/// Contents of a `render` input file
#[derive(Deserialize)]
struct RenderInput {
    #[serde(default)]
    context: shotmaker_core::Context,
    #[serde(default)]
    examples: Vec<Example>,
    #[serde(default)]
    query: Example,
}

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing subscriber
    init_tracing(cli.verbose);

    // Execute command
    match run_command(cli.command) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for structured logging on stderr
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        EnvFilter::new("shotmaker=debug,shotmaker_core=debug,shotmaker_pm=debug")
    } else {
        EnvFilter::new("shotmaker=info,shotmaker_core=info,shotmaker_pm=info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}

/// Execute the specified command and return what it prints
fn run_command(command: Commands) -> Result<String> {
    match command {
        Commands::Render { config, input } => {
            info!("Rendering prompt from {}", input.display());
            run_render(&config, &input)
        }
        Commands::Parse { config, response } => {
            info!("Parsing response");
            run_parse(&config, response.as_deref())
        }
        Commands::Load { config, prompt } => {
            info!("Loading prompt from {}", prompt.display());
            run_load(&config, &prompt)
        }
        Commands::Config { config, format } => run_config(&config, format),
        Commands::Splits {
            input,
            query_fields,
            shots,
            seed,
        } => {
            info!("Splitting records from {}", input.display());
            run_splits(&input, query_fields, shots, seed)
        }
    }
}

/// Load a configuration file and build its engine
fn load_engine(path: &Path) -> Result<PromptEngine> {
    let config = EngineConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    let engine = config
        .build()
        .with_context(|| format!("Invalid engine configuration in {}", path.display()))?;
    debug!(
        fields = engine.formatter().converters().len(),
        "engine ready"
    );
    Ok(engine)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn run_render(config: &Path, input: &Path) -> Result<String> {
    let engine = load_engine(config)?;
    let input: RenderInput = serde_json::from_str(&read_file(input)?)
        .with_context(|| format!("Invalid render input in {}", input.display()))?;

    engine
        .generate_prompt(&input.context, &input.examples, &input.query)
        .context("Failed to render prompt")
}

fn run_parse(config: &Path, response: Option<&Path>) -> Result<String> {
    let engine = load_engine(config)?;
    let text = match response {
        Some(path) => read_file(path)?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read response from stdin")?;
            text
        }
    };

    let fields = engine
        .parse_result(&text)
        .context("Failed to parse response")?;
    Ok(serde_json::to_string_pretty(&fields)?)
}

fn run_load(config: &Path, prompt: &Path) -> Result<String> {
    let engine = load_engine(config)?;
    let examples = engine
        .load(&read_file(prompt)?)
        .with_context(|| format!("Failed to load prompt from {}", prompt.display()))?;
    Ok(serde_json::to_string_pretty(&examples)?)
}

fn run_config(config: &Path, format: Format) -> Result<String> {
    let engine = load_engine(config)?;
    let normalized = to_representation(&engine);
    let text = match format {
        Format::Json => normalized.to_json(),
        Format::Toml => normalized.to_toml(),
    };
    text.context("Failed to write configuration")
}

fn run_splits(input: &Path, query_fields: Vec<String>, shots: usize, seed: u64) -> Result<String> {
    let records: Vec<Example> = serde_json::from_str(&read_file(input)?)
        .with_context(|| format!("Invalid records in {}", input.display()))?;

    let splits = FewShotSplits::new(records, query_fields, shots, seed);
    let splits: Vec<_> = splits.iter().collect();
    Ok(serde_json::to_string_pretty(&splits)?)
}
