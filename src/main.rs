// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::{ArgAction, Parser};
use figment::providers::Serialized;
use serde::Serialize;

use modbus_conformance::{
    harness::{Harness, ScenarioKind, TestContext},
    settings::Settings,
    sim::{Quirk, SimulatedDevice},
};

/// Run the Modbus RTU conformance scenarios.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed of the random generator
    #[arg(long)]
    seed: Option<u64>,

    /// Random trials per parameter combination
    #[arg(long)]
    trials: Option<usize>,

    /// Bound of every wait for a device status signal
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Scenario to run, may be repeated (default: all)
    #[arg(long = "scenario", value_name = "NAME")]
    scenarios: Vec<ScenarioKind>,

    /// Make the simulated device misbehave, may be repeated
    #[arg(long = "quirk", value_name = "QUIRK")]
    quirks: Vec<Quirk>,

    /// More output, repeat for trace level
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Less output
    #[arg(short, long, action = ArgAction::Count)]
    quiet: u8,
}

/// Command line values that take precedence over all other sources.
#[derive(Debug, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trials: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    scenarios: Vec<ScenarioKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    quirks: Vec<Quirk>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            seed: self.seed,
            trials: self.trials,
            status_timeout_ms: self.timeout_ms,
            scenarios: self.scenarios.clone(),
            quirks: self.quirks.clone(),
        }
    }

    const fn log_level(&self) -> &'static str {
        match (self.verbose, self.quiet) {
            (0, 0) => "info",
            (1, _) => "debug",
            (_, 0) => "trace",
            (_, 1) => "warn",
            _ => "error",
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let env = env_logger::Env::default().default_filter_or(args.log_level());
    env_logger::Builder::from_env(env).init();

    let settings: Settings = Settings::figment(args.config.as_deref())
        .merge(Serialized::defaults(args.overrides()))
        .extract()
        .context("Failed to load settings")?;
    log::debug!("{settings:?}");

    let seed = settings.seed.unwrap_or_else(rand::random);
    log::info!("Random seed: {seed}");
    if !settings.quirks.is_empty() {
        log::warn!("Simulated device quirks: {:?}", settings.quirks);
    }

    let device = SimulatedDevice::with_quirks(settings.quirks.iter().copied());
    let ctx = TestContext::new(seed, settings.status_timeout(), settings.settle());
    let mut harness = Harness::new(device, ctx);
    let report = harness.run_suite(&settings.scenarios, &settings.suite_options());

    for scenario in &report.reports {
        println!("{scenario}\n");
    }
    println!("{report}");
    for scenario in report.failed() {
        for failure in &scenario.failures {
            println!("{}: {failure}", scenario.scenario);
        }
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
