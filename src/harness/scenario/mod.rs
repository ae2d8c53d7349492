// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conformance scenarios.

use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{Harness, SuiteOptions};
use crate::device::Device;

mod address;
mod crc;
mod exchange;
mod interface;
mod parity;
mod speed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    /// Control/status register readback.
    Interface,
    /// Normal exchange over the whole parameter space.
    Exchange,
    /// Corrupted CRC towards slave and master.
    Crc,
    /// Wrong slave address towards slave and master.
    SlaveAddress,
    /// Mismatched parity type.
    Parity,
    /// Mismatched baud rate.
    Speed,
}

impl ScenarioKind {
    /// All scenarios in their default order.
    pub const ALL: [Self; 6] = [
        Self::Interface,
        Self::Exchange,
        Self::Crc,
        Self::SlaveAddress,
        Self::Parity,
        Self::Speed,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Interface => "interface",
            Self::Exchange => "exchange",
            Self::Crc => "crc",
            Self::SlaveAddress => "slave-address",
            Self::Parity => "parity",
            Self::Speed => "speed",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scenario: {0}")]
pub struct UnknownScenario(pub String);

impl FromStr for ScenarioKind {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownScenario(s.to_owned()))
    }
}

pub(super) fn run<D: Device>(kind: ScenarioKind, harness: &mut Harness<D>, options: &SuiteOptions) {
    match kind {
        ScenarioKind::Interface => interface::run(harness),
        ScenarioKind::Exchange => exchange::run(harness, options),
        ScenarioKind::Crc => crc::run(harness, options),
        ScenarioKind::SlaveAddress => address::run(harness, options),
        ScenarioKind::Parity => parity::run(harness),
        ScenarioKind::Speed => speed::run(harness),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in ScenarioKind::ALL {
            assert_eq!(kind.to_string().parse::<ScenarioKind>().unwrap(), kind);
        }
        assert_eq!(
            "baud".parse::<ScenarioKind>(),
            Err(UnknownScenario("baud".to_owned()))
        );
    }
}
