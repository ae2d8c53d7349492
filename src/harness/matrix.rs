// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parameter space of the normal exchange sweep.

use core::fmt;

use rand::{Rng, SeedableRng as _, rngs::StdRng};

use crate::{
    codec::Request,
    frame::{
        Address, BROADCAST, FunctionCode, MAX_READ_REGISTERS, MAX_SLAVE_ID, MAX_WRITE_REGISTERS,
        MIN_SLAVE_ID, Quantity, SlaveId, Word,
    },
    line::{BaudSelector, LineConfig, SerialFormat},
};

/// Everything that determines the expected outcome of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub request: Request,
    /// Address the master sends to, [`BROADCAST`] for broadcast.
    pub master_addr: SlaveId,
    pub slave_addr: SlaveId,
    pub master_line: LineConfig,
    pub slave_line: LineConfig,
}

impl TestCase {
    /// Master and slave share address and line configuration.
    #[must_use]
    pub const fn matched(request: Request, address: SlaveId, line: LineConfig) -> Self {
        Self {
            request,
            master_addr: address,
            slave_addr: address,
            master_line: line,
            slave_line: line,
        }
    }

    /// The same request sent as broadcast.
    #[must_use]
    pub fn into_broadcast(self) -> Self {
        Self {
            master_addr: BROADCAST,
            ..self
        }
    }

    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.master_addr == BROADCAST
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fcode = {}, address = 0x{:04X}, regnum = {}, master = {} ({}), slave = {} ({})",
            self.request.function(),
            self.request.address(),
            self.request.quantity(),
            self.master_addr,
            self.master_line,
            self.slave_addr,
            self.slave_line,
        )
    }
}

pub(crate) fn random_slave(rng: &mut impl Rng) -> SlaveId {
    rng.gen_range(MIN_SLAVE_ID..=MAX_SLAVE_ID)
}

/// A unicast address different from `other`.
pub(crate) fn random_other_slave(rng: &mut impl Rng, other: SlaveId) -> SlaveId {
    loop {
        let slave = random_slave(rng);
        if slave != other {
            return slave;
        }
    }
}

pub(crate) fn random_values(rng: &mut impl Rng, count: Quantity) -> Vec<Word> {
    (0..count).map(|_| rng.gen_range(0..=Word::MAX)).collect()
}

pub(crate) fn random_baud(rng: &mut impl Rng) -> BaudSelector {
    BaudSelector::ALL[rng.gen_range(0..BaudSelector::ALL.len())]
}

pub(crate) fn random_line(rng: &mut impl Rng) -> LineConfig {
    LineConfig::new(random_baud(rng), SerialFormat::from_bits(rng.gen_range(0..8)))
}

/// First register address that keeps `count` registers inside the address
/// space.
fn random_start(rng: &mut impl Rng, count: Quantity) -> Address {
    let last = u32::from(Address::MAX) + 1 - u32::from(count);
    rng.gen_range(0..=last) as Address
}

fn build_request(rng: &mut impl Rng, function: FunctionCode, count: Quantity) -> Request {
    let address = random_start(rng, count);
    match function {
        FunctionCode::ReadHoldingRegisters => Request::ReadHoldingRegisters(address, count),
        FunctionCode::WriteSingleRegister => {
            Request::WriteSingleRegister(address, rng.gen_range(0..=Word::MAX))
        }
        FunctionCode::WriteMultipleRegisters | FunctionCode::Custom(_) => {
            Request::WriteMultipleRegisters(address, random_values(rng, count))
        }
    }
}

/// The same request shape carrying fresh values, so a write that is not
/// stored can't be hidden by an earlier one.
fn refresh_values(rng: &mut impl Rng, request: &Request) -> Request {
    match request {
        Request::ReadHoldingRegisters(..) => request.clone(),
        Request::WriteSingleRegister(address, _) => {
            Request::WriteSingleRegister(*address, rng.gen_range(0..=Word::MAX))
        }
        Request::WriteMultipleRegisters(address, _) => {
            Request::WriteMultipleRegisters(*address, random_values(rng, request.quantity()))
        }
    }
}

fn random_request(rng: &mut impl Rng, function: FunctionCode) -> Request {
    let count = rng.gen_range(1..=function.max_quantity());
    build_request(rng, function, count)
}

/// Largest requests appended after the sweep.
const FULL_SIZE: [(FunctionCode, Quantity); 2] = [
    (FunctionCode::ReadHoldingRegisters, MAX_READ_REGISTERS),
    (FunctionCode::WriteMultipleRegisters, MAX_WRITE_REGISTERS),
];

/// Lazy, finite and restartable sequence of matched-configuration test cases.
///
/// For every function code, every one of the 32 line configurations and
/// every trial it yields a random unicast case followed by a broadcast of
/// the same shape (function, register address and count). The sweep ends
/// with full-size `0x03` and `0x10` unicast cases on the last line
/// configuration. Iterating twice yields the same cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMatrix {
    seed: u64,
    functions: Vec<FunctionCode>,
    trials: usize,
}

impl TestMatrix {
    /// Function codes without a request shape are dropped.
    #[must_use]
    pub fn new(seed: u64, mut functions: Vec<FunctionCode>, trials: usize) -> Self {
        functions.retain(|f| {
            let supported = FunctionCode::SUPPORTED.contains(f);
            if !supported {
                log::warn!("Function code {f} is not supported by the sweep");
            }
            supported
        });
        Self {
            seed,
            functions,
            trials,
        }
    }

    fn lines() -> Vec<LineConfig> {
        LineConfig::all().collect()
    }

    fn combinations(&self) -> usize {
        self.functions.len() * Self::lines().len() * self.trials
    }

    fn tail(&self) -> impl Iterator<Item = (FunctionCode, Quantity)> + '_ {
        FULL_SIZE
            .into_iter()
            .filter(|(function, _)| self.functions.contains(function))
    }

    /// Total number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.combinations() * 2 + self.tail().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the sweep from the beginning.
    #[must_use]
    pub fn iter(&self) -> Cases<'_> {
        Cases {
            matrix: self,
            lines: Self::lines(),
            rng: StdRng::seed_from_u64(self.seed),
            position: 0,
            tail: 0,
            pending: None,
            last: (MIN_SLAVE_ID, LineConfig::default()),
        }
    }
}

impl<'a> IntoIterator for &'a TestMatrix {
    type Item = TestCase;
    type IntoIter = Cases<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the cases of a [`TestMatrix`].
#[derive(Debug)]
pub struct Cases<'a> {
    matrix: &'a TestMatrix,
    lines: Vec<LineConfig>,
    rng: StdRng,
    position: usize,
    tail: usize,
    pending: Option<TestCase>,
    last: (SlaveId, LineConfig),
}

impl Iterator for Cases<'_> {
    type Item = TestCase;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(case) = self.pending.take() {
            return Some(case);
        }
        let trials = self.matrix.trials;
        if self.position < self.matrix.combinations() {
            let combination = self.position / trials;
            let function = self.matrix.functions[combination / self.lines.len()];
            let line = self.lines[combination % self.lines.len()];
            self.position += 1;
            let request = random_request(&mut self.rng, function);
            let slave = random_slave(&mut self.rng);
            let case = TestCase::matched(request, slave, line);
            self.last = (slave, line);
            let broadcast = TestCase {
                request: refresh_values(&mut self.rng, &case.request),
                ..case.clone()
            };
            self.pending = Some(broadcast.into_broadcast());
            return Some(case);
        }
        let (function, count) = self.matrix.tail().nth(self.tail)?;
        self.tail += 1;
        let (slave, line) = self.last;
        let request = build_request(&mut self.rng, function, count);
        Some(TestCase::matched(request, slave, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(trials: usize) -> TestMatrix {
        TestMatrix::new(42, FunctionCode::SUPPORTED.to_vec(), trials)
    }

    #[test]
    fn case_count() {
        let m = matrix(1);
        assert_eq!(m.len(), 3 * 32 * 2 + 2);
        assert_eq!(m.iter().count(), m.len());
        assert_eq!(matrix(3).iter().count(), 3 * 32 * 3 * 2 + 2);
        assert!(matrix(0).iter().all(|case| case.request.quantity() > 100));
    }

    #[test]
    fn restart_yields_same_cases() {
        let m = matrix(2);
        let first: Vec<_> = m.iter().collect();
        let second: Vec<_> = (&m).into_iter().collect();
        assert_eq!(first, second);
        let other: Vec<_> = TestMatrix::new(43, FunctionCode::SUPPORTED.to_vec(), 2)
            .iter()
            .collect();
        assert_ne!(first, other);
    }

    #[test]
    fn unicast_then_broadcast() {
        let cases: Vec<_> = matrix(1).iter().collect();
        let (sweep, tail) = cases.split_at(cases.len() - 2);
        for pair in sweep.chunks(2) {
            let (unicast, broadcast) = (&pair[0], &pair[1]);
            assert!(!unicast.is_broadcast());
            assert!(broadcast.is_broadcast());
            assert_eq!(unicast.request.function(), broadcast.request.function());
            assert_eq!(unicast.request.address(), broadcast.request.address());
            assert_eq!(unicast.request.quantity(), broadcast.request.quantity());
            assert_eq!(unicast.slave_addr, broadcast.slave_addr);
            assert_eq!(unicast.master_line, unicast.slave_line);
        }
        assert_eq!(tail[0].request.quantity(), MAX_READ_REGISTERS);
        assert_eq!(tail[1].request.quantity(), MAX_WRITE_REGISTERS);
        assert!(tail.iter().all(|case| !case.is_broadcast()));
    }

    #[test]
    fn every_line_configuration_is_covered() {
        let m = TestMatrix::new(1, vec![FunctionCode::WriteSingleRegister], 1);
        let lines: Vec<_> = m.iter().step_by(2).map(|case| case.master_line).collect();
        assert_eq!(lines, LineConfig::all().collect::<Vec<_>>());
    }

    #[test]
    fn requests_stay_in_range() {
        for case in &matrix(2) {
            let request = &case.request;
            let max = request.function().max_quantity();
            assert!((1..=max).contains(&request.quantity()), "{case}");
            assert!(usize::from(request.address()) + usize::from(request.quantity()) <= 0x1_0000);
            assert!((MIN_SLAVE_ID..=MAX_SLAVE_ID).contains(&case.slave_addr));
            assert!(request.encode().is_ok());
        }
    }

    #[test]
    fn unsupported_functions_are_dropped() {
        let m = TestMatrix::new(1, vec![FunctionCode::Custom(0x2B)], 1);
        assert!(m.is_empty());
        assert_eq!(m.iter().next(), None);
    }

    #[test]
    fn random_other_slave_differs() {
        let mut rng = StdRng::seed_from_u64(5);
        for slave in [MIN_SLAVE_ID, 100, MAX_SLAVE_ID] {
            for _ in 0..50 {
                assert_ne!(random_other_slave(&mut rng, slave), slave);
            }
        }
    }
}
