//! Gaze Sequencer CLI
//!
//! Snippet feature sequences from annotated eye fixations.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use gaze_sequencer::{
    config::{parse_passthroughs, parse_transforms, Config},
    core::{Aggregate, OffsetWindow},
    export::{write_features_jsonl, write_sequences_json, write_windowed_jsonl},
    input::{read_fixations, FixationTable, IndexBase},
    progress::{create_shared_log_with_persistence, SharedRunLog},
    ConllExporter, Pipeline, VERSION,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gaze-seq")]
#[command(version = VERSION)]
#[command(about = "Snippet feature sequences from annotated eye fixations", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the windowed snippet table as JSON Lines
    Window {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (defaults to the configured output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write grouped and pairwise-combined features as JSON Lines
    Combine {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        combine: CombineArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write per-trial feature, label and region sequences as JSON
    Sequences {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        combine: CombineArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a CoNLL-style sequence file
    Conll {
        #[command(flatten)]
        input: InputArgs,

        /// Transforms written per line (comma-separated)
        #[arg(long)]
        prefixes: Option<String>,

        /// Offsets written per transform, as start:end
        #[arg(long, allow_hyphen_values = true)]
        window: Option<OffsetWindow>,

        /// Passthrough columns after the label (comma-separated)
        #[arg(long)]
        aux: Option<String>,

        /// Field separator
        #[arg(long)]
        delimiter: Option<String>,

        /// Token for missing values
        #[arg(long)]
        missing: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or initialise the configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },

    /// Show cumulative run statistics
    Stats {
        /// Zero the persisted counters first
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Annotated fixations (.json array or .jsonl)
    #[arg(short, long)]
    input: PathBuf,

    /// Numbering of fixID / aoi_id: auto, 0 or 1
    #[arg(long)]
    index_base: Option<IndexBase>,

    /// Transforms to window (comma-separated, or "all")
    #[arg(long)]
    transforms: Option<String>,

    /// Derive rel_dur from per-subject mean durations when the input lacks it
    #[arg(long)]
    derive_rel_dur: bool,
}

#[derive(Args)]
struct CombineArgs {
    /// Transforms to group (comma-separated)
    #[arg(long)]
    prefixes: Option<String>,

    /// Offsets included in each group, as start:end
    #[arg(long, allow_hyphen_values = true)]
    window: Option<OffsetWindow>,

    /// Auxiliary passthrough columns (comma-separated)
    #[arg(long)]
    aux: Option<String>,

    /// How values are fused: sum or concat
    #[arg(long)]
    aggregate: Option<Aggregate>,

    /// Leave out the raw offset columns
    #[arg(long)]
    no_raw: bool,

    /// Leave out offset-aligned pairs
    #[arg(long)]
    no_offset_pairs: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config = Config::load_from(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    match cli.command {
        Commands::Window { input, output } => {
            let table = load_input(&input, &mut config)?;
            let log = run_log(&config);
            let windowed = Pipeline::new(config.pipeline())
                .with_observer(log.clone())
                .window(&table)?;

            let path = output_path(&config, output, "windowed", "jsonl")?;
            let rows = write_windowed_jsonl(&windowed, create(&path)?)?;
            println!("Wrote {rows} windowed rows to {}", path.display());
            finish(&log)?;
        }
        Commands::Combine {
            input,
            combine,
            output,
        } => {
            let table = load_input(&input, &mut config)?;
            apply_combine_args(&combine, &mut config)?;
            let log = run_log(&config);
            let pipeline = Pipeline::new(config.pipeline()).with_observer(log.clone());
            let windowed = pipeline.window(&table)?;
            let features = pipeline.combiner().combine(&windowed)?;

            let path = output_path(&config, output, "features", "jsonl")?;
            let rows = write_features_jsonl(&features, create(&path)?)?;
            println!(
                "Wrote {rows} rows x {} columns to {}",
                features.columns().len(),
                path.display()
            );
            finish(&log)?;
        }
        Commands::Sequences {
            input,
            combine,
            output,
        } => {
            let table = load_input(&input, &mut config)?;
            apply_combine_args(&combine, &mut config)?;
            let log = run_log(&config);
            let result = Pipeline::new(config.pipeline())
                .with_observer(log.clone())
                .run(&table)?;

            let path = output_path(&config, output, "sequences", "json")?;
            write_sequences_json(&result.sequences, create(&path)?)?;
            println!(
                "Wrote {} sequences ({} fixations) to {}",
                result.sequences.len(),
                result.sequences.fixation_count(),
                path.display()
            );
            finish(&log)?;
        }
        Commands::Conll {
            input,
            prefixes,
            window,
            aux,
            delimiter,
            missing,
            output,
        } => {
            let table = load_input(&input, &mut config)?;
            if let Some(prefixes) = prefixes {
                config.export.prefixes = parse_transforms(&prefixes)?;
            }
            if let Some(window) = window {
                config.export.window = window;
            }
            if let Some(aux) = aux {
                config.export.auxiliary = parse_passthroughs(&aux)?;
            }
            if let Some(delimiter) = delimiter {
                config.export.delimiter = delimiter;
            }
            if let Some(missing) = missing {
                config.export.missing = missing;
            }

            let log = run_log(&config);
            let windowed = Pipeline::new(config.pipeline())
                .with_observer(log.clone())
                .window(&table)?;

            let path = output_path(&config, output, "sequences", "conll")?;
            let lines = ConllExporter::new(config.export.clone())
                .with_observer(log.clone())
                .write_to_path(&windowed, &path)?;
            println!("Wrote {lines} lines to {}", path.display());
            finish(&log)?;
        }
        Commands::Config { init } => {
            if init {
                config
                    .save_to(&config_path)
                    .with_context(|| format!("writing config to {}", config_path.display()))?;
                config.ensure_directories()?;
                println!("Wrote {}", config_path.display());
            }
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file: {}", config_path.display());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Stats { reset } => {
            let log = run_log(&config);
            if reset {
                log.reset();
                log.save().context("saving run statistics")?;
                println!("Reset statistics in {}", config.stats_path.display());
            }
            println!("{}", log.summary());
        }
    }

    Ok(())
}

fn load_input(args: &InputArgs, config: &mut Config) -> Result<FixationTable> {
    if let Some(base) = args.index_base {
        config.window.index_base = base;
    }
    if let Some(ref transforms) = args.transforms {
        config.window.transforms = parse_transforms(transforms)?;
    }

    let table = read_fixations(&args.input)
        .with_context(|| format!("reading fixations from {}", args.input.display()))?;

    if args.derive_rel_dur && !table.has_rel_dur() {
        tracing::info!("deriving rel_dur from per-subject mean durations");
        return Ok(table.with_relative_durations());
    }
    Ok(table)
}

fn apply_combine_args(args: &CombineArgs, config: &mut Config) -> Result<()> {
    if let Some(ref prefixes) = args.prefixes {
        config.combine.prefixes = parse_transforms(prefixes)?;
    }
    if let Some(window) = args.window {
        config.combine.window = window;
    }
    if let Some(ref aux) = args.aux {
        config.combine.auxiliary = parse_passthroughs(aux)?;
    }
    if let Some(aggregate) = args.aggregate {
        config.combine.aggregate = aggregate;
    }
    if args.no_raw {
        config.combine.include_raw = false;
    }
    if args.no_offset_pairs {
        config.combine.offset_pairs = false;
    }
    Ok(())
}

fn run_log(config: &Config) -> SharedRunLog {
    create_shared_log_with_persistence(config.stats_path.clone())
}

fn finish(log: &SharedRunLog) -> Result<()> {
    log.save().context("saving run statistics")?;
    tracing::debug!("{}", log.summary());
    Ok(())
}

fn output_path(config: &Config, output: Option<PathBuf>, stem: &str, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path);
    }
    config.ensure_directories()?;
    Ok(config.output_path.join(format!(
        "{stem}_{}.{ext}",
        Utc::now().format("%Y%m%d_%H%M%S")
    )))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file =
        File::create(path).with_context(|| format!("creating output {}", path.display()))?;
    Ok(BufWriter::new(file))
}

