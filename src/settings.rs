// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run settings.
//!
//! Sources, later ones win: built-in defaults, an optional TOML file and
//! `MBCT_*` environment variables. The command line is merged on top by the
//! binary.

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    frame::FunctionCode,
    harness::{ScenarioKind, SuiteOptions},
    sim::Quirk,
};

/// Prefix of the environment variables read by [`Settings::figment`].
pub const ENV_PREFIX: &str = "MBCT_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seed of the random generator; a random seed is drawn and logged if
    /// unset.
    pub seed: Option<u64>,
    /// Random trials per parameter combination and per fault step.
    pub trials: usize,
    /// Bound of every wait for a device status signal.
    pub status_timeout_ms: u64,
    /// Time the slave gets to process an injected frame.
    pub settle_ms: u64,
    pub scenarios: Vec<ScenarioKind>,
    /// Function codes swept by the normal exchange.
    pub functions: Vec<u8>,
    /// Misbehaviour of the simulated device.
    pub quirks: Vec<Quirk>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: None,
            trials: 1,
            status_timeout_ms: 5_000,
            settle_ms: 500,
            scenarios: ScenarioKind::ALL.to_vec(),
            functions: FunctionCode::SUPPORTED.iter().map(|f| f.value()).collect(),
            quirks: Vec::new(),
        }
    }
}

impl Settings {
    /// Defaults, then `config` (if any), then the environment.
    #[must_use]
    pub fn figment(config: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        let figment = match config {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        };
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load(config: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(config).extract()
    }

    #[must_use]
    pub const fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    #[must_use]
    pub fn suite_options(&self) -> SuiteOptions {
        SuiteOptions {
            trials: self.trials,
            functions: self.functions.iter().copied().map(FunctionCode::new).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<Settings, figment::Error> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::string(toml))
            .extract()
    }

    #[test]
    fn defaults() {
        let settings = from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.status_timeout(), Duration::from_secs(5));
        assert_eq!(settings.settle(), Duration::from_millis(500));
        assert_eq!(settings.scenarios.len(), 6);
        assert_eq!(settings.suite_options(), SuiteOptions::default());
    }

    #[test]
    fn toml_overrides_defaults() {
        let settings = from_toml(
            r#"
            seed = 99
            trials = 3
            scenarios = ["crc", "slave-address"]
            functions = [16]
            quirks = ["reply-to-broadcast"]
            "#,
        )
        .unwrap();
        assert_eq!(settings.seed, Some(99));
        assert_eq!(settings.trials, 3);
        assert_eq!(settings.scenarios, vec![ScenarioKind::Crc, ScenarioKind::SlaveAddress]);
        assert_eq!(
            settings.suite_options().functions,
            vec![FunctionCode::WriteMultipleRegisters]
        );
        assert_eq!(settings.quirks, vec![Quirk::ReplyToBroadcast]);
        assert_eq!(settings.status_timeout_ms, 5_000);
    }

    #[test]
    fn unknown_scenario_is_rejected() {
        assert!(from_toml(r#"scenarios = ["baud"]"#).is_err());
        assert!(from_toml("trials = -1").is_err());
    }
}
