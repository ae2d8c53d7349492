// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use rand::Rng as _;

use crate::{
    classify::Role,
    codec::Request,
    device::{Device, InjectorFrame},
    frame::MAX_WRITE_REGISTERS,
    harness::{
        Expectation, Harness, TestCase,
        matrix::{random_slave, random_values},
    },
    line::{BaudSelector, LineConfig, SerialFormat},
};

/// Every pair of baud rates, without parity and with one stop bit.
///
/// Which frame error a baud mismatch produces depends on the rates, so only
/// the affected role is checked, not the kind.
pub(super) fn run<D: Device>(h: &mut Harness<D>) {
    let rng = h.context().rng();
    let address = random_slave(rng);
    let count = rng.gen_range(1..=MAX_WRITE_REGISTERS);
    let request = Request::WriteMultipleRegisters(0, random_values(rng, count));

    for master_baud in BaudSelector::ALL {
        for slave_baud in BaudSelector::ALL {
            log::info!("Master baud #{master_baud}, slave baud #{slave_baud}");
            let master_line = LineConfig::new(master_baud, SerialFormat::default());
            let slave_line = LineConfig::new(slave_baud, SerialFormat::default());
            let case = TestCase {
                slave_line,
                ..TestCase::matched(request.clone(), address, master_line)
            };
            if master_baud == slave_baud {
                h.run_case(&case);
                continue;
            }
            h.run_faulted(&case, Expectation::AnyOn { role: Role::Slave });

            let probe = TestCase::matched(Request::WriteSingleRegister(0, 0), address, master_line);
            let frame = InjectorFrame::new(address, slave_line, 0, 0);
            let mut session = h.injector_session(&frame);
            session.run_faulted(&probe, Expectation::AnyOn { role: Role::Master });
        }
    }
}
