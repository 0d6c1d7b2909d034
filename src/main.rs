//! Narrator CLI Entry Point

use std::path::PathBuf;

use clap::Parser;
use narrator::Config;
use tracing_subscriber::EnvFilter;

mod cli;

/// Narrator: turn user stories into a conceptual model
#[derive(Parser, Debug)]
#[command(name = "narrator")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input file with one user story per line
    #[arg(value_name = "INPUT FILE")]
    input: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// System name, as used in the ontology and output files
    #[arg(short = 'n', long = "name")]
    system_name: Option<String>,

    /// Print data per user story
    #[arg(short = 'u', long = "print-us")]
    print_us: bool,

    /// Print the ontology
    #[arg(short = 'o', long = "print-ont")]
    print_ont: bool,

    /// Link ontology classes to the user stories they originate from
    #[arg(short, long)]
    link: bool,

    /// Generate Prolog facts
    #[arg(long)]
    prolog: bool,

    /// Export user stories as JSON
    #[arg(long)]
    json: bool,

    /// Show user story set statistics
    #[arg(short, long)]
    statistics: bool,

    /// Create an additional conceptual model per role
    #[arg(short, long = "per-role")]
    per_role: bool,

    /// Threshold for conceptual model generation
    #[arg(short = 't', long)]
    threshold: Option<f64>,

    /// Base weight
    #[arg(short = 'b', long = "base-weight")]
    base_weight: Option<u32>,

    /// Weight of the functional role
    #[arg(long = "wfr")]
    weight_func_role: Option<f64>,

    /// Weight of the main object
    #[arg(long = "wdo")]
    weight_main_obj: Option<f64>,

    /// Weight of a noun in the free-form means
    #[arg(long = "wffm")]
    weight_ff_means: Option<f64>,

    /// Weight of a noun in the free-form ends
    #[arg(long = "wffe")]
    weight_ff_ends: Option<f64>,

    /// Weight of compound modifiers relative to their head
    #[arg(long = "wcompound")]
    weight_compound: Option<f64>,

    /// Pre-computed parser annotations (JSON)
    #[arg(long)]
    parses: Option<PathBuf>,

    /// Write the full report as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Apply command-line overrides on top of file configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(name) = &self.system_name {
            config.system_name = name.clone();
        }

        let output = &mut config.output;
        output.print_stories |= self.print_us;
        output.print_ontology |= self.print_ont;
        output.link |= self.link;
        output.prolog |= self.prolog;
        output.json |= self.json;
        output.statistics |= self.statistics;
        output.per_role |= self.per_role;

        let generation = &mut config.generation;
        if let Some(t) = self.threshold {
            generation.threshold = t;
        }
        if let Some(b) = self.base_weight {
            generation.base_weight = b;
        }
        let weights = &mut generation.weights;
        if let Some(w) = self.weight_func_role {
            weights.role = w;
        }
        if let Some(w) = self.weight_main_obj {
            weights.main_object = w;
        }
        if let Some(w) = self.weight_ff_means {
            weights.free_form_means_noun = w;
        }
        if let Some(w) = self.weight_ff_ends {
            weights.free_form_ends_noun = w;
        }
        if let Some(w) = self.weight_compound {
            weights.compound_relative_to_head = w;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = if let Some(path) = &args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };
    args.apply(&mut config);
    config.validate()?;

    tracing::debug!(
        system_name = %config.system_name,
        threshold = config.generation.threshold,
        base_weight = config.generation.base_weight,
        "Configuration loaded"
    );

    cli::run_generate(
        config,
        &args.input,
        args.parses.as_deref(),
        args.output.as_deref(),
    )
    .await
}
