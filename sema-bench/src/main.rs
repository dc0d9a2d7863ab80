//! sema-bench CLI

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use sema_bench::{
    agents::{Agent, AgentConfig, AgentCore, DirectAnswerAgent},
    benchmarks::{Benchmark, BenchmarkError, BenchmarkManifest, DatasetScope, HotpotQa, Partition},
    config::{sample_registry, save_toml, ConfigStore},
    logging::{self, LogOptions},
    providers::{ollama, ModelFactory},
    reporting::{print_console_report, JsonSummary},
};

#[derive(Parser)]
#[command(name = "sema-bench")]
#[command(about = "Evaluate question-answering LLM agents on benchmark datasets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Model registry file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also append logs to this file (default: ~/.sema/logs/sema.log)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark against a configured model
    Run {
        /// Model key from the registry
        #[arg(short, long)]
        model: String,

        /// Benchmark name
        #[arg(short, long, default_value = "hotpotqa")]
        benchmark: String,

        /// Partition to evaluate (train, validate, test)
        #[arg(short, long, default_value = "validate")]
        partition: String,

        /// Evaluate only the first N samples
        #[arg(short = 'n', long)]
        samples: Option<usize>,

        /// Dataset folder (default: ~/.sema/benchmarks)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Benchmark manifest overriding the built-in one
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Maximum agent steps per question
        #[arg(long, default_value = "5")]
        max_steps: u32,

        /// Re-download dataset files
        #[arg(long)]
        force_reload: bool,

        /// Write the full JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List models in the registry
    ListModels,

    /// Generate sample model registry
    InitConfig {
        /// Output path for the registry file
        #[arg(short, long, default_value = "config/models.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Environment writes must happen before the runtime starts worker threads
    ollama::exempt_loopback_from_proxy();

    tokio::runtime::Runtime::new()?.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut log_options = LogOptions::default().with_verbose(cli.verbose);
    if let Some(path) = &cli.log_file {
        log_options = log_options.with_log_file(path);
    }
    logging::init(&log_options.or_default_log_file())?;

    match cli.command {
        Commands::Run {
            model,
            benchmark,
            partition,
            samples,
            data_dir,
            manifest,
            max_steps,
            force_reload,
            output,
        } => {
            let options = RunOptions {
                model,
                benchmark,
                partition,
                samples,
                data_dir,
                manifest,
                max_steps,
                force_reload,
                output,
            };
            run_benchmark(options, cli.config, cli.verbose).await?;
        }

        Commands::ListModels => {
            list_models(cli.config)?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

struct RunOptions {
    model: String,
    benchmark: String,
    partition: String,
    samples: Option<usize>,
    data_dir: Option<PathBuf>,
    manifest: Option<PathBuf>,
    max_steps: u32,
    force_reload: bool,
    output: Option<PathBuf>,
}

async fn run_benchmark(
    options: RunOptions,
    config_path: Option<PathBuf>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !options.benchmark.eq_ignore_ascii_case("hotpotqa") {
        return Err(BenchmarkError::UnknownBenchmark(options.benchmark).into());
    }
    let partition: Partition = options
        .partition
        .parse()
        .map_err(|_| BenchmarkError::UnknownPartition(options.partition.clone()))?;

    let mut benchmark = HotpotQa::new(options.data_dir, DatasetScope::from(partition))?;
    if let Some(path) = &options.manifest {
        benchmark = benchmark.with_manifest(BenchmarkManifest::from_file(path)?);
    }
    println!(
        "Loading {} {} data from {}",
        benchmark.name(),
        partition,
        benchmark.data_folder().display()
    );
    benchmark.load_data(options.force_reload).await?;

    let mut agent_config = AgentConfig::new(&options.model)?;
    agent_config.set_max_steps(options.max_steps)?;
    agent_config.set_verbose(verbose)?;

    let factory = Arc::new(ModelFactory::shared());
    let mut core = AgentCore::new(agent_config, factory);
    if let Some(path) = config_path {
        core = core.with_config_path(path);
    }
    let agent = DirectAnswerAgent::from_core(core);
    // Fail on a bad model name before touching any sample
    agent.core().client()?;

    let report = benchmark
        .run(
            |question, context| {
                let agent = &agent;
                async move { agent.run(&question, &context).await }
            },
            partition.as_str(),
            options.samples,
            verbose,
        )
        .await?
        .with_model(&options.model);

    print_console_report(&report);

    if let Some(path) = options.output {
        report.write_to_file(&path)?;
        let summary_path = path.with_extension("summary.json");
        JsonSummary::from_report(&report, Some(path.display().to_string()))
            .write_to_file(&summary_path)?;
        println!("Results written to: {}", path.display());
        println!("Summary written to: {}", summary_path.display());
    }

    Ok(())
}

fn list_models(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let store = ConfigStore::shared();
    let registry = store.registry(config_path.as_deref())?;

    println!("Available Models ({}):", registry.len());
    println!("{:-<60}", "");

    for (name, entry) in registry.iter() {
        println!("  {} | {} | {}", name, entry.provider, entry.description);
    }

    Ok(())
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    save_toml(&output, &sample_registry())?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
