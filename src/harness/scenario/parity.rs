// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use rand::Rng as _;

use crate::{
    classify::{ErrorKind, Role},
    codec::Request,
    device::{Device, InjectorFrame},
    frame::MAX_WRITE_REGISTERS,
    harness::{
        Expectation, Harness, TestCase,
        matrix::{random_baud, random_slave, random_values},
    },
    line::{LineConfig, Parity, SerialFormat},
};

/// Every pair of parity types with parity enabled on both sides.
pub(super) fn run<D: Device>(h: &mut Harness<D>) {
    let rng = h.context().rng();
    let address = random_slave(rng);
    let count = rng.gen_range(1..=MAX_WRITE_REGISTERS);
    let values = random_values(rng, count);
    let baud = random_baud(rng);
    let request = Request::WriteMultipleRegisters(0, values);

    for master_parity in [Parity::Even, Parity::Odd] {
        for slave_parity in [Parity::Even, Parity::Odd] {
            log::info!("Master parity {master_parity:?}, slave parity {slave_parity:?}");
            let master_line = LineConfig::new(baud, SerialFormat::with_parity(master_parity));
            let slave_line = LineConfig::new(baud, SerialFormat::with_parity(slave_parity));
            let case = TestCase {
                slave_line,
                ..TestCase::matched(request.clone(), address, master_line)
            };
            if master_parity == slave_parity {
                h.run_case(&case);
                continue;
            }
            h.run_faulted(
                &case,
                Expectation::AtLeastOne {
                    role: Role::Slave,
                    kind: ErrorKind::Parity,
                },
            );

            let probe = TestCase::matched(Request::WriteSingleRegister(0, 0), address, master_line);
            let frame = InjectorFrame::new(address, slave_line, 0, 0);
            let mut session = h.injector_session(&frame);
            session.run_faulted(
                &probe,
                Expectation::AtLeastOne {
                    role: Role::Master,
                    kind: ErrorKind::Parity,
                },
            );
        }
    }
}
