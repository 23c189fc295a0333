use clap::{Parser, Subcommand};
use sourcesched_core::{
    analyze_script, build_simulation_context_from_source, format_parse_error, parse_script,
    run_script, ConfigOverrides, RunError,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sourcesched")]
#[command(about = "Schedule and replicate particle sources over run timing intervals", long_about = None)]
struct Cli {
    /// Log source scheduling details (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source script through the statistics engine
    Run {
        /// Path to the script
        file: PathBuf,
        /// Number of threads, overriding the script setting
        #[arg(short, long)]
        threads: Option<usize>,
        /// Master seed, overriding the script setting
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Parse and analyze a script without running it
    Check {
        file: PathBuf,
    },
    /// Print the sources a script defines
    Dump {
        file: PathBuf,
        /// 0: one line, 1: one block per source
        #[arg(short, long, default_value_t = 1)]
        level: u8,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            file,
            threads,
            seed,
        } => run_file(&file, ConfigOverrides { threads, seed }),
        Commands::Check { file } => check_file(&file),
        Commands::Dump { file, level } => dump_file(&file, level),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,source=info"),
    );
    match verbose {
        0 => {}
        1 => {
            builder.filter_module("source", log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_module("source", log::LevelFilter::Trace);
        }
    }
    builder.init();
}

fn read_source(file: &PathBuf) -> Result<String, Box<dyn std::error::Error>> {
    fs::read_to_string(file).map_err(|e| format!("cannot read {}: {}", file.display(), e).into())
}

/// Turn a run error into a message carrying the script context
fn describe(error: RunError, source: &str) -> Box<dyn std::error::Error> {
    match error {
        RunError::Parse(e) => format_parse_error(&e, source).into(),
        RunError::Analysis(diagnostics) => diagnostics.render(source).trim_end().to_string().into(),
        other => other.into(),
    }
}

fn run_file(file: &PathBuf, overrides: ConfigOverrides) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_source(file)?;
    let outcome = run_script(&source, overrides).map_err(|e| describe(e, &source))?;

    println!("{}", outcome.statistics);
    println!(
        "delivered {} / {} primaries in {} batch(es){}",
        outcome.summary.total_delivered(),
        outcome.summary.total_expected(),
        outcome.summary.total_batches(),
        if outcome.summary.aborted { " (aborted)" } else { "" }
    );
    for (idx, counters) in outcome.summary.source_counters().iter().enumerate() {
        if counters.skipped > 0 || counters.zero_energy > 0 {
            let name = outcome
                .statistics
                .source_names
                .get(idx)
                .map(String::as_str)
                .unwrap_or("?");
            println!(
                "  {}: {} skipped, {} zero energy",
                name, counters.skipped, counters.zero_energy
            );
        }
    }

    Ok(())
}

fn check_file(file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_source(file)?;
    let script = parse_script(&source).map_err(|e| format_parse_error(&e, &source))?;
    let diagnostics = analyze_script(&script);

    print!("{}", diagnostics.render(&source));
    if diagnostics.has_errors() {
        return Err(format!("{} has {} error(s)", file.display(), diagnostics.errors().count()).into());
    }
    println!("{}: ok, {} source(s)", file.display(), script.sources.len());
    Ok(())
}

fn dump_file(file: &PathBuf, level: u8) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_source(file)?;
    let context = build_simulation_context_from_source(&source, ConfigOverrides::default())
        .map_err(|e| describe(e, &source))?;

    println!("{}", context.manager.dump(level));
    if let Some(plan) = context.manager.plan() {
        for (idx, interval) in plan.intervals().iter().enumerate() {
            println!("run {} {}", idx, interval);
        }
    }
    Ok(())
}
