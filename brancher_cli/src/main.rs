use brancher_core::config::{BrancherConfig, DedupMode};
use brancher_core::coverage::{CoverageSet, CoverageSink};
use brancher_core::path_tree::PathTree;
use brancher_core::pool::WorkerPool;
use brancher_core::result::ExplorationResult;
use brancher_core::scripted::{ScriptedBackend, ScriptedProgram, ScriptedState};
use brancher_core::{InitialStateCache, worker::Explorer};

use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// Scripted program description (TOML) providing the target and its test cases.
    #[clap(short, long, value_parser)]
    program: PathBuf,
    #[clap(long, allow_hyphen_values = true)]
    max_depth: Option<i64>,
    #[clap(short, long)]
    threads: Option<usize>,
    /// Print one JSON object per generated path condition.
    #[clap(long)]
    json: bool,
    #[clap(short, long)]
    verbose: bool,
}

fn load_config(config_file: Option<PathBuf>) -> Result<(BrancherConfig, String), anyhow::Error> {
    match config_file {
        Some(config_path) => {
            let config = BrancherConfig::load_from_file(&config_path)?;
            Ok((
                config,
                format!("Loaded configuration from specified path: {config_path:?}"),
            ))
        }
        None => {
            let default_config_path = PathBuf::from("brancher.toml");
            if default_config_path.exists() {
                let config = BrancherConfig::load_from_file(&default_config_path)?;
                Ok((
                    config,
                    format!("No config file specified, loaded default: {default_config_path:?}"),
                ))
            } else {
                Ok((
                    BrancherConfig::default(),
                    "No config file specified and default 'brancher.toml' not found, using built-in defaults."
                        .to_string(),
                ))
            }
        }
    }
}

fn print_result(result: &ExplorationResult<ScriptedState>, json: bool) -> Result<(), anyhow::Error> {
    let summary = result.summary();
    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!(
            "[{}] depth {}: {}{}",
            summary.test_case,
            summary.depth,
            summary.path_condition,
            summary
                .target_branch
                .map(|branch| format!(" (aimed at {branch})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let (mut config, config_origin) = load_config(cli.config_file)?;
    if let Some(max_depth) = cli.max_depth {
        config.explorer.max_depth = max_depth;
    }
    if let Some(threads) = cli.threads {
        config.explorer.threads = threads;
    }

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        config.log_level.into()
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    info!("{config_origin}");
    info!("Effective configuration: {config:#?}");

    let program = ScriptedProgram::load_from_file(&cli.program)?;
    let tasks = program.tasks();
    if tasks.is_empty() {
        warn!("Program {:?} declares no test cases, nothing to explore", cli.program);
    }
    let backend = ScriptedBackend::new(program);

    let (task_tx, task_rx) = crossbeam_channel::bounded(config.queues.task_capacity.max(1));
    let (result_tx, result_rx) =
        crossbeam_channel::bounded::<ExplorationResult<ScriptedState>>(
            config.queues.result_capacity.max(1),
        );

    let coverage = Arc::new(CoverageSet::new());
    let cache = Arc::new(InitialStateCache::new());
    let mut explorer = Explorer::new(backend, config.explorer.max_depth, result_tx)
        .with_cache(Arc::clone(&cache))
        .with_coverage(Arc::clone(&coverage) as Arc<dyn CoverageSink>);
    let tree = Arc::new(PathTree::new());
    if config.explorer.dedup == DedupMode::Global {
        explorer = explorer.with_global_dedup(Arc::clone(&tree));
    }

    let producer = thread::spawn(move || {
        for task in tasks {
            if task_tx.send(task).is_err() {
                break;
            }
        }
    });
    let json = cli.json;
    let consumer = thread::spawn(move || -> Result<usize, anyhow::Error> {
        let mut printed = 0;
        for result in result_rx.iter() {
            print_result(&result, json)?;
            printed += 1;
        }
        Ok(printed)
    });

    let pool = WorkerPool::new(config.explorer.threads, config.budget.as_duration());
    let start_time = Instant::now();
    let report = pool.run(&explorer, task_rx);
    drop(explorer);

    if producer.join().is_err() {
        warn!("Task producer terminated abnormally");
    }
    let printed = consumer
        .join()
        .map_err(|_| anyhow::anyhow!("Result consumer terminated abnormally"))??;

    let elapsed_total = start_time.elapsed();
    println!("\nExploration finished in {elapsed_total:.2?}.");
    println!(
        "Tasks: {} completed, {} failed, {} cancelled. Path conditions: {}. Coverage: {} branch{}. Cached initial states: {}.{}",
        report.completed,
        report.failed,
        report.cancelled,
        printed,
        coverage.size(),
        if coverage.size() == 1 { "" } else { "es" },
        cache.len(),
        if report.budget_expired {
            " Time budget expired."
        } else {
            ""
        }
    );
    if config.explorer.dedup == DedupMode::Global {
        println!("Distinct path conditions recorded: {}", tree.path_count());
    }

    Ok(())
}
