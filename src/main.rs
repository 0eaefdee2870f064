//! V2G simulation demo entry point — CLI wiring and config-driven runner
//! construction, grounded on the teacher's own `main.rs` argument-parsing
//! style (hand-rolled, no `clap`).

use std::path::Path;
use std::process;

use chrono::{TimeZone, Utc};
use tracing_subscriber::EnvFilter;

use v2g_sim::config::ScenarioConfig;
use v2g_sim::runner::Runner;

struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
}

fn print_help() {
    eprintln!("v2g-sim — Vehicle-to-Grid charging network co-simulation demo");
    eprintln!();
    eprintln!("Usage: v2g-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>   Load scenario from a TOML config file");
    eprintln!("  --preset <name>     Use a built-in preset (baseline, contention, discharge_heavy)");
    eprintln!("  --help              Show this help message");
    eprintln!();
    eprintln!("If neither --scenario nor --preset is given, the baseline preset is used.");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --scenario requires a path argument");
                    process::exit(1);
                }
                cli.scenario_path = Some(args[i].clone());
            }
            "--preset" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --preset requires a name argument");
                    process::exit(1);
                }
                cli.preset = Some(args[i].clone());
            }
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

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = parse_args();

    let scenario = if let Some(ref path) = cli.scenario_path {
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
        ScenarioConfig::baseline()
    };

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    let mut runner = match Runner::from_config(&scenario, start) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("error: failed to start simulation: {e}");
            process::exit(1);
        }
    };

    for summary in runner.run() {
        println!(
            "epoch {}: {} messages published, complete={}",
            summary.epoch_number, summary.messages_published, summary.epoch_complete
        );
        for (user_id, soc) in &summary.final_state_of_charge {
            println!("  user {user_id}: soc={soc:.1}%");
        }
    }
}
