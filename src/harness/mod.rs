// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conformance test orchestration.
//!
//! A [`Harness`] drives one transaction at a time through a [`Device`]:
//!
//! ```text
//! Idle -> Configured -> Sent -> AwaitingCompletion -> Completed{Success|Timeout} -> Validated
//! ```
//!
//! Every problem it observes is recorded as a [`Failure`] in the
//! [`TestContext`] and the sweep carries on with the next case. Expired waits
//! are tallied separately from all other failures.

use core::{
    fmt,
    ops::{Deref, DerefMut},
};
use std::{
    thread,
    time::{Duration, Instant},
};

use rand::{SeedableRng as _, rngs::StdRng};

use crate::{
    classify::{ErrorKind, ErrorSnapshot, Role, classify},
    codec::{Mismatch, validate_response},
    device::{Device, InjectorFrame, Register, StatusKind},
    error::Error,
    frame::{Address, FunctionCode, Word},
    line::LineConfig,
    wait::{TimeoutLatch, WaitStatus},
};

pub mod matrix;
pub mod scenario;

pub use self::{
    matrix::{TestCase, TestMatrix},
    scenario::{ScenarioKind, UnknownScenario},
};

/// Anything that makes a test case fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    #[error("{role} {kind} error count = {count}, expected {expected}")]
    FrameError {
        role: Role,
        kind: ErrorKind,
        count: u32,
        expected: u32,
    },
    #[error("expected a {role} {} error, none was counted", .kind.map_or("frame", ErrorKind::name))]
    MissingFrameError {
        role: Role,
        kind: Option<ErrorKind>,
    },
    #[error("{0} timeout")]
    DeviceTimeout(StatusKind),
    #[error(transparent)]
    ResponseMismatch(Mismatch),
    #[error("unexpected response received: {0:02X?}")]
    UnexpectedResponse(Vec<u8>),
    #[error("no response received")]
    MissingResponse,
    #[error(
        "broadcast write to 0x{address:04X} not stored: expected {expected:04X?}, slave holds {observed:04X?}"
    )]
    BroadcastWriteMismatch {
        address: Address,
        expected: Vec<Word>,
        observed: Vec<Word>,
    },
    #[error(
        "{role} {register} register: wrote 0x{written:X}, expected 0x{expected:X}, read 0x{observed:X}"
    )]
    RegisterInterfaceMismatch {
        role: Role,
        register: Register,
        written: u32,
        expected: u32,
        observed: u32,
    },
    #[error("invalid test case: {0}")]
    InvalidCase(Error),
}

/// The error counters a transaction is expected to leave behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// All ten counters stay at zero.
    Clean,
    /// The targeted counter is exactly one, every other counter is zero.
    Exactly { role: Role, kind: ErrorKind },
    /// The targeted counter is non-zero, every other counter is zero.
    ///
    /// Cores that count parity and address errors per character may count
    /// more than one for a single bad frame.
    AtLeastOne { role: Role, kind: ErrorKind },
    /// Some counter of `role` is non-zero, the other role stays clean.
    AnyOn { role: Role },
}

impl Expectation {
    /// Compare a snapshot against the expectation.
    #[must_use]
    pub fn evaluate(&self, snapshot: &ErrorSnapshot) -> Vec<Failure> {
        let mut failures = Vec::new();
        for (role, kind, count) in snapshot.nonzero() {
            let expected = match *self {
                Self::Exactly { role: r, kind: k } if (r, k) == (role, kind) => 1,
                Self::AtLeastOne { role: r, kind: k } if (r, k) == (role, kind) => continue,
                Self::AnyOn { role: r } if r == role => continue,
                _ => 0,
            };
            if count != expected {
                failures.push(Failure::FrameError {
                    role,
                    kind,
                    count,
                    expected,
                });
            }
        }
        match *self {
            Self::Clean => {}
            Self::Exactly { role, kind } | Self::AtLeastOne { role, kind } => {
                if snapshot.single(role, kind) == 0 {
                    failures.push(Failure::MissingFrameError {
                        role,
                        kind: Some(kind),
                    });
                }
            }
            Self::AnyOn { role } => {
                if snapshot.total(role) == 0 {
                    failures.push(Failure::MissingFrameError { role, kind: None });
                }
            }
        }
        failures
    }
}

/// Outcome of a bounded wait as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Success,
    Timeout,
}

/// Mutable state of a test run.
///
/// Owns the random generator, the timing parameters, the collected failures
/// and the timeout latch. Nothing in here is global.
#[derive(Debug)]
pub struct TestContext {
    rng: StdRng,
    timeout: Duration,
    settle: Duration,
    latch: TimeoutLatch,
    failures: Vec<Failure>,
    timeouts: usize,
    cases: usize,
}

impl TestContext {
    #[must_use]
    pub fn new(seed: u64, timeout: Duration, settle: Duration) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            timeout,
            settle,
            latch: TimeoutLatch::default(),
            failures: Vec::new(),
            timeouts: 0,
            cases: 0,
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub const fn settle(&self) -> Duration {
        self.settle
    }

    /// Record a failure; timeouts are tallied on their own.
    pub fn record(&mut self, failure: Failure) {
        log::error!("Test FAILED: {failure}");
        if let Failure::DeviceTimeout(_) = failure {
            self.timeouts += 1;
        } else {
            self.failures.push(failure);
        }
    }

    #[must_use]
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    #[must_use]
    pub const fn timeouts(&self) -> usize {
        self.timeouts
    }

    #[must_use]
    pub const fn cases(&self) -> usize {
        self.cases
    }

    pub fn count_case(&mut self) {
        self.cases += 1;
    }

    fn problems(&self) -> usize {
        self.failures.len() + self.timeouts
    }

    /// Start a new scenario with no failures, no timeouts and a clear latch.
    pub fn reset(&mut self) {
        self.failures.clear();
        self.timeouts = 0;
        self.cases = 0;
        self.latch.reset();
    }

    /// Latch an expired wait and turn the latch into a counted timeout.
    fn observe(&mut self, kind: StatusKind, status: WaitStatus) -> Completion {
        if status == WaitStatus::Timeout {
            self.latch.set();
        }
        if self.latch.take_and_clear() {
            self.record(Failure::DeviceTimeout(kind));
            Completion::Timeout
        } else {
            Completion::Success
        }
    }
}

/// Runs test cases against a device.
#[derive(Debug)]
pub struct Harness<D> {
    device: D,
    ctx: TestContext,
}

impl<D: Device> Harness<D> {
    pub const fn new(device: D, ctx: TestContext) -> Self {
        Self { device, ctx }
    }

    pub fn device(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn context(&mut self) -> &mut TestContext {
        &mut self.ctx
    }

    pub fn into_parts(self) -> (D, TestContext) {
        (self.device, self.ctx)
    }

    /// Wait for `kind` with the context's timeout.
    pub fn await_status(&mut self, kind: StatusKind) -> Completion {
        let status = self.device.wait_for_status(kind, self.ctx.timeout);
        self.ctx.observe(kind, status)
    }

    /// Classified error counters of both cores.
    pub fn errors(&mut self) -> ErrorSnapshot {
        classify(self.device.read_error_counts())
    }

    /// Evaluate the current counters and record any deviation.
    pub fn check_errors(&mut self, expectation: Expectation) {
        let snapshot = self.errors();
        let failures = expectation.evaluate(&snapshot);
        if failures.is_empty() {
            return;
        }
        log::warn!("Error counters:\n{snapshot}");
        for failure in failures {
            self.ctx.record(failure);
        }
    }

    fn configure_role(&mut self, role: Role, line: LineConfig, slave: u8) {
        self.device.write_register(role, Register::Config, line.word());
        self.device.write_register(role, Register::SlaveAddr, u32::from(slave));
    }

    /// `Idle -> Configured`: program both cores for `case`.
    pub fn configure(&mut self, case: &TestCase, request: &[u8]) {
        self.await_status(StatusKind::Fsm);
        self.configure_role(Role::Master, case.master_line, case.master_addr);
        self.device
            .write_register(Role::Master, Register::PduSize, request.len() as u32);
        self.device.write_request_pdu(request);
        self.configure_role(Role::Slave, case.slave_line, case.slave_addr);
        log::trace!("Idle -> Configured");
    }

    /// `Configured -> Sent`
    pub fn send(&mut self) {
        self.device.write_register(Role::Master, Register::Cs, 1);
        log::trace!("Configured -> Sent");
    }

    fn prepare(&mut self, case: &TestCase) -> Option<Vec<u8>> {
        self.ctx.count_case();
        log::debug!("Case: {case}");
        match case.request.encode() {
            Ok(pair) => {
                self.device.reset_error_counts();
                self.configure(case, &pair.request);
                self.send();
                Some(pair.reference)
            }
            Err(err) => {
                self.ctx.record(Failure::InvalidCase(err));
                None
            }
        }
    }

    /// Run one matched-configuration transaction and validate everything
    /// about it. Returns `true` if the case passed.
    pub fn run_case(&mut self, case: &TestCase) -> bool {
        let before = self.ctx.problems();
        let Some(reference) = self.prepare(case) else {
            return false;
        };
        log::trace!("Sent -> AwaitingCompletion");
        if case.is_broadcast() {
            self.validate_broadcast(case);
        } else {
            self.validate_unicast(&reference);
        }
        self.check_errors(Expectation::Clean);
        self.ctx.problems() == before
    }

    fn validate_unicast(&mut self, reference: &[u8]) {
        if self.await_status(StatusKind::Pdu) == Completion::Timeout {
            log::trace!("Completed{{Timeout}}");
            return;
        }
        log::trace!("Completed{{Success}}");
        let size = self.device.read_register(Role::Master, Register::PduSize) as usize;
        if size == 0 {
            self.ctx.record(Failure::MissingResponse);
            return;
        }
        let response = self.device.read_response_pdu(size);
        if let Err(mismatch) = validate_response(reference, &response) {
            self.ctx.record(Failure::ResponseMismatch(mismatch));
        }
        log::trace!("Validated");
    }

    fn validate_broadcast(&mut self, case: &TestCase) {
        if self.await_status(StatusKind::Fsm) == Completion::Timeout {
            log::trace!("Completed{{Timeout}}");
            return;
        }
        log::trace!("Completed{{Success}}");
        if self.device.pdu_received(Role::Master, StatusKind::Pdu) {
            let failure = Failure::UnexpectedResponse(self.response());
            self.ctx.record(failure);
            return;
        }
        if case.request.function().is_write() {
            let address = case.request.address();
            let expected = case.request.values().to_vec();
            let observed = self
                .device
                .direct_read_slave_registers(address, case.request.quantity());
            if observed != expected {
                self.ctx.record(Failure::BroadcastWriteMismatch {
                    address,
                    expected,
                    observed,
                });
            }
        }
        log::trace!("Validated");
    }

    fn response(&mut self) -> Vec<u8> {
        let size = self.device.read_register(Role::Master, Register::PduSize) as usize;
        self.device.read_response_pdu(size)
    }

    /// Run a transaction that must not produce a response and must leave the
    /// counters as described by `expectation`.
    pub fn run_faulted(&mut self, case: &TestCase, expectation: Expectation) -> bool {
        let before = self.ctx.problems();
        if self.prepare(case).is_none() {
            return false;
        }
        if self.await_status(StatusKind::Fsm) == Completion::Success
            && self.device.pdu_received(Role::Master, StatusKind::Pdu)
        {
            let failure = Failure::UnexpectedResponse(self.response());
            self.ctx.record(failure);
        }
        self.check_errors(expectation);
        self.ctx.problems() == before
    }

    /// Send `frame` from the injector straight to a slave configured with
    /// `line` and `slave`.
    pub fn inject(
        &mut self,
        line: LineConfig,
        slave: u8,
        frame: &InjectorFrame,
        expectation: Expectation,
    ) -> bool {
        let before = self.ctx.problems();
        self.ctx.count_case();
        log::debug!("Injecting {:02X?} into slave {slave} ({line})", frame.adu());
        self.device.reset_error_counts();
        self.await_status(StatusKind::Fsm);
        self.configure_role(Role::Slave, line, slave);
        self.device.arm_injector(frame);
        self.device.trigger_injector();
        thread::sleep(self.ctx.settle);
        self.check_errors(expectation);
        self.ctx.problems() == before
    }

    /// Route the injector to the master until the session is dropped.
    pub fn injector_session(&mut self, frame: &InjectorFrame) -> InjectorSession<'_, D> {
        InjectorSession::open(self, frame)
    }

    /// Run one scenario from a clean context.
    pub fn run_scenario(&mut self, kind: ScenarioKind, options: &SuiteOptions) -> ScenarioReport {
        log::info!("*** Start {kind} test ***");
        self.ctx.reset();
        self.device.reset_error_counts();
        let started = Instant::now();
        scenario::run(kind, self, options);
        let report = ScenarioReport {
            scenario: kind,
            cases: self.ctx.cases,
            failures: self.ctx.failures.clone(),
            timeouts: self.ctx.timeouts,
            elapsed: started.elapsed(),
        };
        if report.passed() {
            log::info!("{kind} test passed ({} cases)", report.cases);
        } else {
            log::warn!(
                "{kind} test failed: {} failure(s), {} timeout(s)",
                report.failures.len(),
                report.timeouts
            );
        }
        report
    }

    /// Run `scenarios` in order. A failing scenario never stops the suite.
    pub fn run_suite(&mut self, scenarios: &[ScenarioKind], options: &SuiteOptions) -> SuiteReport {
        let reports = scenarios
            .iter()
            .map(|kind| self.run_scenario(*kind, options))
            .collect();
        SuiteReport { reports }
    }
}

/// The injector is connected to the master's receive line for the lifetime
/// of this guard.
#[derive(Debug)]
pub struct InjectorSession<'a, D: Device> {
    harness: &'a mut Harness<D>,
}

impl<'a, D: Device> InjectorSession<'a, D> {
    pub fn open(harness: &'a mut Harness<D>, frame: &InjectorFrame) -> Self {
        harness.device.arm_injector(frame);
        harness.device.select_injector(true);
        log::trace!("Injector selected");
        Self { harness }
    }
}

impl<D: Device> Deref for InjectorSession<'_, D> {
    type Target = Harness<D>;

    fn deref(&self) -> &Self::Target {
        self.harness
    }
}

impl<D: Device> DerefMut for InjectorSession<'_, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.harness
    }
}

impl<D: Device> Drop for InjectorSession<'_, D> {
    fn drop(&mut self) {
        self.harness.device.select_injector(false);
        log::trace!("Injector deselected");
    }
}

/// Parameters shared by all scenarios of a suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteOptions {
    /// Random trials per parameter combination and per fault step.
    pub trials: usize,
    /// Function codes swept by the normal exchange.
    pub functions: Vec<FunctionCode>,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            trials: 1,
            functions: FunctionCode::SUPPORTED.to_vec(),
        }
    }
}

/// Verdict of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub scenario: ScenarioKind,
    pub cases: usize,
    pub failures: Vec<Failure>,
    pub timeouts: usize,
    pub elapsed: Duration,
}

impl ScenarioReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty() && self.timeouts == 0
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*** {} test ***", self.scenario)?;
        writeln!(
            f,
            "cases = {}, failures = {}, timeout error count = {}, elapsed = {:.2?}",
            self.cases,
            self.failures.len(),
            self.timeouts,
            self.elapsed
        )?;
        writeln!(f, "***************************")?;
        writeln!(
            f,
            "\tTest {}",
            if self.passed() { "Successful" } else { "FAILED" }
        )?;
        write!(f, "***************************")
    }
}

/// Verdicts of all scenarios of a run.
#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    pub reports: Vec<ScenarioReport>,
}

impl SuiteReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.reports.iter().all(ScenarioReport::passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.reports.iter().filter(|r| !r.passed())
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let passed = self.reports.iter().filter(|r| r.passed()).count();
        write!(f, "{passed} of {} scenario(s) passed", self.reports.len())
    }
}
