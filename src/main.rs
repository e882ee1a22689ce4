//! meritsim entry point: CLI wiring and config-driven system construction.

use std::path::{Path, PathBuf};
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use meritsim::config::{RunMode, ScenarioConfig};
use meritsim::error::Result;
use meritsim::io::{export_csv, write_document};
use meritsim::optimize::ClarabelSolver;
use meritsim::sim::{OptimizeOutcome, System, load_resources};

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    mode: Option<RunMode>,
    seed_override: Option<u64>,
    out: Option<PathBuf>,
    csv: Option<PathBuf>,
}

fn print_help() {
    eprintln!("meritsim: merit-order dispatch and capacity sizing for hybrid energy systems");
    eprintln!();
    eprintln!("Usage: meritsim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --mode <mode>            Override run mode (merit_order, optimize)");
    eprintln!("  --seed <u64>             Override synthetic resource seed");
    eprintln!("  --out <path>             Write the JSON result document");
    eprintln!("  --csv <path>             Export component state columns to CSV");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the island preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

/// Returns the value following flag `args[*i]`, exiting if it is missing.
fn take_value(args: &[String], i: &mut usize, what: &str) -> String {
    *i += 1;
    match args.get(*i) {
        Some(value) => value.clone(),
        None => {
            eprintln!("error: {} requires {what}", args[*i - 1]);
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        mode: None,
        seed_override: None,
        out: None,
        csv: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => cli.scenario_path = Some(take_value(&args, &mut i, "a path argument")),
            "--preset" => cli.preset = Some(take_value(&args, &mut i, "a name argument")),
            "--mode" => {
                let value = take_value(&args, &mut i, "a mode argument");
                cli.mode = match value.as_str() {
                    "merit_order" => Some(RunMode::MeritOrder),
                    "optimize" => Some(RunMode::Optimize),
                    _ => {
                        eprintln!("error: --mode value \"{value}\" is not merit_order or optimize");
                        process::exit(1);
                    }
                };
            }
            "--seed" => {
                let value = take_value(&args, &mut i, "a u64 argument");
                if let Ok(s) = value.parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{value}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--out" => cli.out = Some(PathBuf::from(take_value(&args, &mut i, "a path argument"))),
            "--csv" => cli.csv = Some(PathBuf::from(take_value(&args, &mut i, "a path argument"))),
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Builds the system, runs the configured path, and prints a summary.
fn run(scenario: &ScenarioConfig, cli: &CliArgs) -> Result<()> {
    let mut system = System::from_config(scenario)?;
    let resources = load_resources(&scenario.system)?;
    system.attach_resources(&resources)?;

    match scenario.system.mode {
        RunMode::MeritOrder => {
            let table = system.run_merit_order()?;
            println!("Merit-order dispatch: {}", system.name());
            for (column, values) in &table.columns {
                let surplus: f64 = values.iter().filter(|v| **v > 0.0).sum();
                let shortfall: f64 = values.iter().filter(|v| **v < 0.0).sum();
                println!("  {column:<10} surplus {surplus:>12.3}  shortfall {shortfall:>12.3}");
            }
        }
        RunMode::Optimize => match system.optimize(&ClarabelSolver)? {
            OptimizeOutcome::Solved { summary, duration } => {
                println!(
                    "Optimal solution for {} in {:.2} s",
                    system.name(),
                    duration.as_secs_f64()
                );
                println!("  objective {:.3}", summary.objective);
                for (name, capacity) in &summary.capacities.rows {
                    println!("  {name:<20} {capacity:>12.3}");
                }
            }
            OptimizeOutcome::NonOptimal { reason, .. } => {
                // Non-optimal results are not persisted.
                eprintln!("warning: solver did not reach an optimal point: {reason}");
                return Ok(());
            }
        },
    }

    if let Some(path) = &cli.out {
        write_document(&system, path)?;
        info!(path = %path.display(), "result document written");
    }
    if let Some(path) = &cli.csv {
        export_csv(&system, path)?;
        info!(path = %path.display(), "state columns written");
    }
    Ok(())
}

fn main() {
    let cli = parse_args();
    init_tracing();

    // --scenario takes priority, then --preset, then the island default
    let mut scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::island()
    };

    if let Some(mode) = cli.mode {
        scenario.system.mode = mode;
    }
    if let Some(seed) = cli.seed_override {
        scenario.system.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    if let Err(e) = run(&scenario, &cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
