mod run;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use datagen_config::{ConfigError, Loader, SerializeOptions, TagPolicy};
use datagen_core::{Error as CoreError, SchemaDocument};
use datagen_generate::{GenerationError, LayoutBuilder, Randomizer, seed_from_str};
use run::{RunError, init_run_logging, write_binary_artifacts, write_header_artifact};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("run error: {0}")]
    Run(#[from] RunError),
    #[error("schema error: {0}")]
    Core(#[from] CoreError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
}

/// Load YAML test parameters, randomize them and emit native artifacts.
#[derive(Parser, Debug)]
#[command(name = "datagen", version, about = "Datagen test-parameter generator")]
struct Cli {
    /// Input YAML file.
    input_yaml: PathBuf,
    /// Output YAML file.
    output_yaml: PathBuf,
    /// Directory receiving datagen_types.h.
    #[arg(long = "header_path", default_value = ".")]
    header_path: PathBuf,
    /// Deterministic random seed; numeric strings are used as-is.
    #[arg(long)]
    seed: Option<String>,
    /// TOML document declaring constants, enums and records.
    #[arg(long, default_value = "datagen.toml")]
    schema: PathBuf,
    /// Directory receiving binary dumps of records flagged `binary`.
    #[arg(long = "binary_dir")]
    binary_dir: Option<PathBuf>,
    /// Keep the DatagenClass key on dumped records.
    #[arg(long = "keep_tags", default_value_t = false)]
    keep_tags: bool,
    /// Append JSON log lines to this file.
    #[arg(long = "log_file")]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.input_yaml.is_file() {
        println!(
            "ERROR: input_yaml is not a valid path {}",
            cli.input_yaml.display()
        );
        return ExitCode::from(1);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(event = "run_failed", error = %err);
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        input_yaml,
        output_yaml,
        header_path,
        seed,
        schema,
        binary_dir,
        keep_tags,
        log_file,
    } = cli;

    init_run_logging(log_file.as_deref())?;
    tracing::info!(
        event = "run_started",
        input = %input_yaml.display(),
        output = %output_yaml.display()
    );
    let timer = Instant::now();

    let catalog = SchemaDocument::load(&schema)?.into_catalog()?;
    tracing::info!(
        event = "schema_loaded",
        path = %schema.display(),
        constants = catalog.constants().len(),
        enums = catalog.enums().count(),
        records = catalog.records().count()
    );

    let options = SerializeOptions {
        tag: if keep_tags {
            TagPolicy::Preserve
        } else {
            TagPolicy::Strip
        },
    };
    let loader = Loader::new(&catalog).with_options(options);
    let mut node = loader.load_path(&input_yaml)?;

    let mut randomizer = match seed.as_deref() {
        Some(seed) => Randomizer::new(seed_from_str(seed)),
        None => Randomizer::from_entropy(),
    };
    tracing::info!(event = "randomizer_seeded", seed = randomizer.seed());
    let mut randomized = 0;
    for record in node.records_mut() {
        randomizer.apply(&catalog, record)?;
        randomized += 1;
    }
    tracing::info!(event = "records_randomized", records = randomized);

    let mut builder = LayoutBuilder::new();
    write_header_artifact(&catalog, &mut builder, &header_path)?;
    if let Some(dir) = binary_dir.as_deref() {
        let written = write_binary_artifacts(&catalog, &builder, &node, dir)?;
        tracing::info!(event = "binaries_written", count = written.len());
    }

    loader.dump_path(&node, &output_yaml)?;
    tracing::info!(
        event = "run_finished",
        output = %output_yaml.display(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(())
}
