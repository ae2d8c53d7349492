// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of the raw error counters reported by a device.

use core::fmt;

/// The two cores under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    pub const ALL: [Self; 2] = [Self::Master, Self::Slave];

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Master => Self::Slave,
            Self::Slave => Self::Master,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Slave => "slave",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which counters a [`ErrorSnapshot::total`] sums up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Master,
    Slave,
    Both,
}

impl From<Role> for Scope {
    fn from(role: Role) -> Self {
        match role {
            Role::Master => Self::Master,
            Role::Slave => Self::Slave,
        }
    }
}

/// Frame level error detected by a core.
///
/// The discriminant is the position of the counter in the raw snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parity = 0,
    StartBit = 1,
    StopBit = 2,
    Address = 3,
    Crc = 4,
}

impl ErrorKind {
    pub const ALL: [Self; 5] = [
        Self::Parity,
        Self::StartBit,
        Self::StopBit,
        Self::Address,
        Self::Crc,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Parity => "parity",
            Self::StartBit => "start bit",
            Self::StopBit => "stop bit",
            Self::Address => "address",
            Self::Crc => "crc",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counters of one role in the fixed device order
/// `parity, start bit, stop bit, address, crc`.
pub type RawTally = [u32; 5];

/// Master counters followed by slave counters.
pub type RawErrorCounts = (RawTally, RawTally);

/// The five error counters of one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorTally {
    pub parity: u32,
    pub start_bit: u32,
    pub stop_bit: u32,
    pub address: u32,
    pub crc: u32,
}

impl ErrorTally {
    #[must_use]
    pub const fn get(&self, kind: ErrorKind) -> u32 {
        match kind {
            ErrorKind::Parity => self.parity,
            ErrorKind::StartBit => self.start_bit,
            ErrorKind::StopBit => self.stop_bit,
            ErrorKind::Address => self.address,
            ErrorKind::Crc => self.crc,
        }
    }

    /// Increment one counter, saturating at `u32::MAX`.
    pub fn bump(&mut self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::Parity => &mut self.parity,
            ErrorKind::StartBit => &mut self.start_bit,
            ErrorKind::StopBit => &mut self.stop_bit,
            ErrorKind::Address => &mut self.address,
            ErrorKind::Crc => &mut self.crc,
        };
        *counter = counter.saturating_add(1);
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        ErrorKind::ALL.iter().map(|k| u64::from(self.get(*k))).sum()
    }

    #[must_use]
    pub const fn raw(&self) -> RawTally {
        [
            self.parity,
            self.start_bit,
            self.stop_bit,
            self.address,
            self.crc,
        ]
    }
}

impl From<RawTally> for ErrorTally {
    fn from(raw: RawTally) -> Self {
        let [parity, start_bit, stop_bit, address, crc] = raw;
        Self {
            parity,
            start_bit,
            stop_bit,
            address,
            crc,
        }
    }
}

/// Classified counters of both cores at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorSnapshot {
    pub master: ErrorTally,
    pub slave: ErrorTally,
}

/// Turn the raw device counters into named tallies.
#[must_use]
pub fn classify(raw: RawErrorCounts) -> ErrorSnapshot {
    let (master, slave) = raw;
    ErrorSnapshot {
        master: master.into(),
        slave: slave.into(),
    }
}

impl ErrorSnapshot {
    #[must_use]
    pub const fn tally(&self, role: Role) -> &ErrorTally {
        match role {
            Role::Master => &self.master,
            Role::Slave => &self.slave,
        }
    }

    /// Sum of all counters in `scope`.
    #[must_use]
    pub fn total(&self, scope: impl Into<Scope>) -> u64 {
        match scope.into() {
            Scope::Master => self.master.total(),
            Scope::Slave => self.slave.total(),
            Scope::Both => self.master.total() + self.slave.total(),
        }
    }

    #[must_use]
    pub const fn single(&self, role: Role, kind: ErrorKind) -> u32 {
        self.tally(role).get(kind)
    }

    /// All counters that are not zero.
    pub fn nonzero(&self) -> impl Iterator<Item = (Role, ErrorKind, u32)> + '_ {
        Role::ALL.into_iter().flat_map(move |role| {
            ErrorKind::ALL.into_iter().filter_map(move |kind| {
                let count = self.single(role, kind);
                (count > 0).then_some((role, kind, count))
            })
        })
    }
}

impl fmt::Display for ErrorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for role in Role::ALL {
            for kind in ErrorKind::ALL {
                writeln!(f, "{role} {kind} error count = {}", self.single(role, kind))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: RawErrorCounts = ([1, 2, 3, 4, 5], [10, 20, 30, 40, 50]);

    #[test]
    fn classify_keeps_device_order() {
        let snapshot = classify(RAW);
        assert_eq!(snapshot.master.parity, 1);
        assert_eq!(snapshot.master.start_bit, 2);
        assert_eq!(snapshot.master.stop_bit, 3);
        assert_eq!(snapshot.master.address, 4);
        assert_eq!(snapshot.master.crc, 5);
        assert_eq!(snapshot.slave.raw(), RAW.1);
    }

    #[test]
    fn totals_per_scope() {
        let snapshot = classify(RAW);
        assert_eq!(snapshot.total(Scope::Master), 15);
        assert_eq!(snapshot.total(Role::Slave), 150);
        assert_eq!(snapshot.total(Scope::Both), 165);
        assert_eq!(classify(Default::default()).total(Scope::Both), 0);
    }

    #[test]
    fn totals_do_not_overflow() {
        let snapshot = classify(([u32::MAX; 5], [u32::MAX; 5]));
        assert_eq!(snapshot.total(Scope::Both), 10 * u64::from(u32::MAX));
    }

    #[test]
    fn single_counters() {
        let snapshot = classify(RAW);
        assert_eq!(snapshot.single(Role::Master, ErrorKind::Crc), 5);
        assert_eq!(snapshot.single(Role::Slave, ErrorKind::Parity), 10);
        assert_eq!(snapshot.single(Role::Slave, ErrorKind::Address), 40);
    }

    #[test]
    fn nonzero_counters() {
        let snapshot = classify(([0, 0, 0, 0, 1], [0, 2, 0, 0, 0]));
        let found: Vec<_> = snapshot.nonzero().collect();
        assert_eq!(
            found,
            vec![
                (Role::Master, ErrorKind::Crc, 1),
                (Role::Slave, ErrorKind::StartBit, 2)
            ]
        );
    }

    #[test]
    fn bump_saturates() {
        let mut tally = ErrorTally {
            crc: u32::MAX,
            ..Default::default()
        };
        tally.bump(ErrorKind::Crc);
        tally.bump(ErrorKind::Address);
        assert_eq!(tally.crc, u32::MAX);
        assert_eq!(tally.address, 1);
    }

    #[test]
    fn display_lists_all_counters() {
        let text = classify(RAW).to_string();
        assert_eq!(text.lines().count(), 10);
        assert!(text.contains("slave crc error count = 50"));
        assert!(text.contains("master start bit error count = 2"));
    }

    #[test]
    fn opposite_role() {
        assert_eq!(Role::Master.opposite(), Role::Slave);
        assert_eq!(Role::Slave.opposite(), Role::Master);
    }
}
