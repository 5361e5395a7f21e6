//! CLI binary for the pathflip test generator.
//!
//! Generates a test suite for a program given as a JSON control-flow graph.
//!
//! # Usage
//!
//! ```bash
//! # Branch coverage with the generational strategy
//! pathflip run --program prog.json --output suite/
//!
//! # Search for a call to the error function, depth-first
//! pathflip run --program prog.json --criterion error --strategy dfs
//!
//! # Stop after 60 seconds of wall-clock time
//! pathflip run --program prog.json --time-limit 60
//!
//! # Show what the explorer will see
//! pathflip inspect --program prog.json
//! ```
//!
//! The exit code is 1 when the run fails or when the error call was reached
//! under the error criterion.

use clap::{Parser, Subcommand};
use pathflip_explore::explorer::{
    Explorer, ExplorerConfig, SolverKind, StrategyKind, COVERAGE_CRITERION_OPTION,
};
use pathflip_explore::report::format_report;
use pathflip_explore::CoverageCriterion;
use pathflip_program::{Program, ShutdownNotifier, ShutdownReason};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pathflip")]
#[command(about = "Concolic test-suite generation by branch flipping")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a test suite.
    Run {
        /// Program to explore (JSON control-flow graph).
        #[arg(short, long)]
        program: String,

        /// Coverage criterion: "branch" or "error".
        #[arg(short, long)]
        criterion: Option<String>,

        /// Search strategy: "generational", "random" or "dfs".
        #[arg(long, default_value = "generational")]
        strategy: String,

        /// Constraint solver: "candidate", or "z3" when built with the z3 feature.
        #[arg(long, default_value = "candidate")]
        solver: String,

        /// Random seed for the random strategy.
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Step limit per execution.
        #[arg(long, default_value = "10000")]
        max_steps: usize,

        /// Maximum number of test cases.
        #[arg(long, default_value = "99000")]
        max_test_cases: usize,

        /// Time limit in seconds, measured on the wall clock.
        #[arg(short, long)]
        time_limit: Option<u64>,

        /// Extra options as key=value (e.g. coverageCriterion=error).
        #[arg(long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,

        /// Output directory for test cases and the report.
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Print a summary of a program.
    Inspect {
        /// Program to inspect (JSON control-flow graph).
        #[arg(short, long)]
        program: String,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            program,
            criterion,
            strategy,
            solver,
            seed,
            max_steps,
            max_test_cases,
            time_limit,
            options,
            output,
        } => cmd_run(
            program,
            criterion,
            strategy,
            solver,
            seed,
            max_steps,
            max_test_cases,
            time_limit,
            options,
            output,
        ),
        Commands::Inspect { program } => cmd_inspect(program),
    }
}

fn load_program(path: &str) -> Arc<Program> {
    match Program::load(Path::new(path)) {
        Ok(program) => Arc::new(program),
        Err(e) => {
            eprintln!("Error: failed to load program {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn parse_options(options: &[String], criterion: Option<String>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for option in options {
        match option.split_once('=') {
            Some((key, value)) => {
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => {
                eprintln!("Error: option '{}' is not of the form key=value", option);
                std::process::exit(1);
            }
        }
    }
    if let Some(criterion) = criterion {
        map.insert(COVERAGE_CRITERION_OPTION.to_string(), criterion);
    }
    map
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    program_path: String,
    criterion: Option<String>,
    strategy: String,
    solver: String,
    seed: u64,
    max_steps: usize,
    max_test_cases: usize,
    time_limit: Option<u64>,
    options: Vec<String>,
    output: Option<String>,
) {
    let program = load_program(&program_path);

    let mut config = match ExplorerConfig::from_options(&parse_options(&options, criterion)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    config.strategy = match strategy.parse::<StrategyKind>() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    config.solver = match solver.parse::<SolverKind>() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    config.seed = seed;
    config.max_steps = max_steps;
    config.max_test_cases = max_test_cases;
    config.output_dir = output.clone();

    if let Some(ref output_dir) = output {
        if let Err(e) = fs::create_dir_all(output_dir) {
            eprintln!("Error: failed to create output directory: {}", e);
            std::process::exit(1);
        }
    }

    eprintln!("═══════════════════════════════════════════════════════════════════════");
    eprintln!("  Pathflip Test Generation");
    eprintln!("═══════════════════════════════════════════════════════════════════════");
    eprintln!();
    eprintln!("Configuration:");
    eprintln!("  Program:        {}", program_path);
    eprintln!("  Criterion:      {}", config.criterion);
    eprintln!("  Strategy:       {}", config.strategy);
    eprintln!("  Solver:         {}", config.solver);
    eprintln!("  Seed:           {}", config.seed);
    eprintln!("  Max steps:      {}", config.max_steps);
    eprintln!("  Max tests:      {}", config.max_test_cases);
    if let Some(limit) = time_limit {
        eprintln!("  Time limit:     {}s (wall clock)", limit);
    }
    if let Some(ref output_dir) = output {
        eprintln!("  Output:         {}", output_dir);
    }
    eprintln!();
    eprintln!("Starting exploration...");
    eprintln!();

    let notifier = ShutdownNotifier::new();
    // Wall-clock watchdog; the run reports it as the CPU-time limit.
    if let Some(limit) = time_limit {
        let watchdog = notifier.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(limit));
            watchdog.request(ShutdownReason::CpuTimeLimit);
        });
    }

    let criterion = config.criterion;
    let mut explorer = match Explorer::new(program, config, notifier) {
        Ok(explorer) => explorer,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let report = match explorer.run() {
        Ok(r) => r,
        Err(e) => {
            eprintln!();
            eprintln!("Exploration failed: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!();
    eprintln!("Exploration complete!");
    eprintln!();

    let formatted = format_report(&report);
    println!("{}", formatted);

    if let Some(output_dir) = output {
        let report_path = format!("{}/report.txt", output_dir);
        if let Err(e) = fs::write(&report_path, &formatted) {
            eprintln!("Warning: failed to save report: {}", e);
        } else {
            eprintln!("Saved report to: {}", report_path);
        }
    }

    if criterion == CoverageCriterion::Error && report.error_reached {
        std::process::exit(1);
    }
}

fn cmd_inspect(program_path: String) {
    let program = load_program(&program_path);

    println!("Program:        {}", program.name());
    println!("Entry:          {}", program.entry_function());
    println!("Error function: {}", program.error_function());
    println!("Nodes:          {}", program.node_count());
    println!("Edges:          {}", program.edges().len());
    println!("Branch edges:   {}", program.assume_edges().count());
    println!("Error calls:    {}", program.error_edges().count());
    println!("Variables:");
    for (name, var) in program.variables() {
        println!("  {:<14} {:?}", name, var.ty);
    }
    let locations = program.nondet_locations();
    println!("Nondet sites:   {}", locations.len());
    for location in &locations {
        println!("  {}", location);
    }
}
