// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use rand::Rng as _;

use crate::{
    classify::{ErrorKind, Role},
    codec::Request,
    device::{Device, InjectorFrame},
    frame::MAX_WRITE_REGISTERS,
    harness::{
        Expectation, Harness, SuiteOptions, TestCase,
        matrix::{random_line, random_other_slave, random_slave, random_values},
    },
};

/// Slave addressed with the wrong id, then the master answered by the
/// wrong id, each followed by a recovery exchange.
pub(super) fn run<D: Device>(h: &mut Harness<D>, options: &SuiteOptions) {
    let rng = h.context().rng();
    let count = rng.gen_range(1..=MAX_WRITE_REGISTERS);
    let values = random_values(rng, count);
    let line = random_line(rng);
    let address = random_slave(rng);
    let normal = TestCase::matched(Request::WriteMultipleRegisters(0, values), address, line);
    log::info!("Slave address test with address {address} on {line}");

    h.run_case(&normal);
    for _ in 0..options.trials {
        let slave_addr = random_other_slave(h.context().rng(), address);
        log::debug!("Slave listens on {slave_addr}");
        let case = TestCase {
            slave_addr,
            ..normal.clone()
        };
        h.run_faulted(
            &case,
            Expectation::AtLeastOne {
                role: Role::Slave,
                kind: ErrorKind::Address,
            },
        );
    }

    h.run_case(&normal);
    let probe = TestCase::matched(Request::WriteSingleRegister(0, 0), address, line);
    for _ in 0..options.trials {
        let responder = random_other_slave(h.context().rng(), address);
        let frame = InjectorFrame::new(responder, line, 0, 0);
        let mut session = h.injector_session(&frame);
        session.run_faulted(
            &probe,
            Expectation::AtLeastOne {
                role: Role::Master,
                kind: ErrorKind::Address,
            },
        );
    }

    h.run_case(&normal);
}
