//! `kiosk-sim`: run simulated kiosk sessions and check settings files

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use kiosk_core::test_harness::{run_simulator, SimulatorConfig};
use kiosk_core::KioskSettings;
use kiosk_types::{ProfileId, TargetId};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// One week of kiosk time
const MAX_MINUTES: u64 = 7 * 24 * 60;

fn cli() -> Command {
    Command::new("kiosk-sim")
        .version(kiosk_core::VERSION)
        .about("Briefing kiosk session simulator")
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Run one kiosk session against a simulated backend")
                .arg(
                    Arg::new("target")
                        .long("target")
                        .default_value("KSTS")
                        .help("Airport to display"),
                )
                .arg(
                    Arg::new("profile")
                        .long("profile")
                        .default_value("medium")
                        .help("Aircraft profile"),
                )
                .arg(
                    Arg::new("minutes")
                        .long("minutes")
                        .default_value("30")
                        .value_parser(value_parser!(u64).range(1..=MAX_MINUTES))
                        .help("Kiosk minutes to simulate (at most one week)"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("time-scale")
                        .long("time-scale")
                        .default_value("100")
                        .value_parser(value_parser!(u32).range(1..=1000))
                        .help("Run this many times faster than real time"),
                )
                .arg(
                    Arg::new("viewport")
                        .long("viewport")
                        .default_value("800")
                        .value_parser(value_parser!(u32).range(1..))
                        .help("Initial viewport extent"),
                )
                .arg(
                    Arg::new("churn")
                        .long("churn")
                        .default_value("0.2")
                        .value_parser(value_parser!(f64))
                        .help("Chance that a probe sees a new observation"),
                )
                .arg(
                    Arg::new("failure-rate")
                        .long("failure-rate")
                        .default_value("0.1")
                        .value_parser(value_parser!(f64))
                        .help("Chance that a backend call fails"),
                )
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .help("TOML settings file"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("check-settings")
                .about("Validate a settings file and print the effective settings")
                .arg(Arg::new("path").required(true).help("TOML settings file")),
        )
}

fn probability(name: &str, value: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&value) {
        bail!("--{name} must be between 0 and 1, got {value}");
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let target = TargetId::new(args.get_one::<String>("target").map_or("KSTS", String::as_str))?;
            let profile = ProfileId::new(args.get_one::<String>("profile").map_or("medium", String::as_str))?;
            let minutes = args.get_one::<u64>("minutes").copied().unwrap_or(30);
            let duration = minutes
                .checked_mul(60)
                .map(Duration::from_secs)
                .context("--minutes is too large")?;
            let failure_rate = probability("failure-rate", args.get_one::<f64>("failure-rate").copied().unwrap_or(0.1))?;

            let settings = match args.get_one::<String>("settings") {
                Some(path) => KioskSettings::load(path).with_context(|| format!("loading {path}"))?,
                None => KioskSettings::default(),
            };

            let config = SimulatorConfig {
                seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
                duration,
                time_scale: args.get_one::<u32>("time-scale").copied().unwrap_or(100),
                viewport_extent: args.get_one::<u32>("viewport").copied().unwrap_or(800),
                observation_change_rate: probability("churn", args.get_one::<f64>("churn").copied().unwrap_or(0.2))?,
                probe_failure_rate: failure_rate,
                load_failure_rate: failure_rate,
                settings,
                ..SimulatorConfig::new(target, profile)
            };

            let json = args.get_flag("json");
            if !json {
                println!("Running kiosk simulator...");
                println!("Target: {} ({})", config.target, config.profile);
                println!("Minutes: {}", minutes);
                println!("Seed: {}", config.seed);
                println!();
            }

            let report = run_simulator(config).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            } else {
                println!("{}", report.generate_text());
            }

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("check-settings", args)) => {
            let path = args
                .get_one::<String>("path")
                .context("settings path is required")?;
            let settings = KioskSettings::load(path).with_context(|| format!("loading {path}"))?;

            println!("Settings OK: {}", path);
            println!();
            println!("{}", settings.to_toml_string()?);
        }
        _ => bail!("unknown command"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulate(extra: &[&str]) -> Result<clap::ArgMatches, clap::Error> {
        let argv = ["kiosk-sim", "simulate"].into_iter().chain(extra.iter().copied());
        cli().try_get_matches_from(argv)
    }

    #[test]
    fn minutes_default_and_upper_bound() {
        let matches = simulate(&[]).unwrap();
        let args = matches.subcommand_matches("simulate").unwrap();
        assert_eq!(args.get_one::<u64>("minutes").copied(), Some(30));

        assert!(simulate(&["--minutes", "10080"]).is_ok());
        assert!(simulate(&["--minutes", "10081"]).is_err());
        assert!(simulate(&["--minutes", "0"]).is_err());
        assert!(simulate(&["--minutes", "307445734561825861"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }
}
