use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use coldstart::bench::{self, Benchmark};
use coldstart::catalog::DirectoryCatalog;
use coldstart::config::load_settings;
use coldstart::display;
use coldstart::http::HttpPlatform;
use coldstart::input::{load_input, validate};
use coldstart::shutdown::start_shutdown_listener;
use coldstart::sink::JsonlSink;
use coldstart::state::{FileStateStore, StateStore};
use coldstart::template::entrypoint_source;

#[derive(Parser)]
#[command(
    name = "coldstart",
    version,
    about = "Measure cold-start latency of remote tasks across dependency sets and memory limits"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (default: <config dir>/coldstart/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a task, benchmark every memory configuration, then delete the task
    Run {
        /// Benchmark input (TOML)
        input: PathBuf,

        /// Append records to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not delete the task afterwards
        #[arg(long)]
        keep_task: bool,

        /// Skip the summary table
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the entry point that would be generated for an input
    Entrypoint { input: PathBuf },
    /// Show the persisted provisioning state
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Delete the task recorded in the provisioning state
    Teardown,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            input,
            output,
            keep_task,
            quiet,
        } => {
            let settings = load_settings(cli.config.as_deref())?;
            let bench_input = load_input(&input)?;

            let platform = HttpPlatform::new(
                &settings.api_url,
                settings.api_token.clone(),
                settings.request_timeout(),
            )?
            .with_resource_retry(settings.retry_on_resource_exhaustion);
            let catalog = DirectoryCatalog::new(&settings.template_catalog);
            let store = FileStateStore::new(&settings.state_dir);

            let benchmark = Benchmark {
                platform: &platform,
                catalog: &catalog,
                store: &store,
                settings: &settings,
                cancel: start_shutdown_listener(),
                keep_task,
            };

            let records = match output {
                Some(path) => {
                    let file = OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .with_context(|| format!("Failed to open output file {}", path.display()))?;
                    let mut sink = JsonlSink::new(BufWriter::new(file));
                    benchmark.run(&bench_input, &mut sink).await?
                }
                None => {
                    let mut sink = JsonlSink::new(std::io::stdout());
                    benchmark.run(&bench_input, &mut sink).await?
                }
            };

            if !quiet {
                eprint!("{}", display::format_summary(&records));
            }
        }
        Commands::Entrypoint { input } => {
            let bench_input = load_input(&input)?;
            validate(&bench_input)?;
            print!("{}", entrypoint_source(&bench_input));
        }
        Commands::Status { json } => {
            let settings = load_settings(cli.config.as_deref())?;
            let store = FileStateStore::new(&settings.state_dir);
            let state = store.load().await?;
            let location = store.path().display().to_string();

            let output = if json {
                display::format_state_json(&state, &location)
            } else {
                display::format_state(&state, &location)
            };
            println!("{}", output.trim_end());
        }
        Commands::Teardown => {
            let settings = load_settings(cli.config.as_deref())?;
            let store = FileStateStore::new(&settings.state_dir);
            let state = store.load().await?;

            match state.task_id {
                None => {
                    println!("Nothing to tear down.");
                    if !state.is_empty() {
                        store.clear().await?;
                    }
                }
                Some(task_id) => {
                    let platform = HttpPlatform::new(
                        &settings.api_url,
                        settings.api_token.clone(),
                        settings.request_timeout(),
                    )?;
                    bench::teardown(&platform, &store, &task_id).await?;
                    println!("Deleted task {}.", task_id);
                }
            }
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}
