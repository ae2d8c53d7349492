// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use rand::Rng as _;

use crate::{
    classify::Role,
    device::{Device, Register},
    frame::{MAX_PDU_SIZE, MAX_SLAVE_ID, MIN_PDU_SIZE, MIN_SLAVE_ID},
    harness::{Failure, Harness},
    line::{self, LineConfig},
};

/// Write `value` and compare the readback with `expected`.
fn check<D: Device>(
    h: &mut Harness<D>,
    role: Role,
    register: Register,
    value: u32,
    expected: u32,
) -> bool {
    h.device().write_register(role, register, value);
    let observed = h.device().read_register(role, register);
    if observed == expected {
        return true;
    }
    h.context().record(Failure::RegisterInterfaceMismatch {
        role,
        register,
        written: value,
        expected,
        observed,
    });
    false
}

/// PDU_SIZE reports the size of the last received PDU, writes must not
/// change it.
fn pdu_size<D: Device>(h: &mut Harness<D>, role: Role) -> bool {
    h.context().count_case();
    let current = h.device().read_register(role, Register::PduSize);
    let written = loop {
        let size = h.context().rng().gen_range(MIN_PDU_SIZE..=MAX_PDU_SIZE) as u32;
        if size != current {
            break size;
        }
    };
    check(h, role, Register::PduSize, written, current)
}

/// Every valid configuration reads back unchanged, anything else is masked.
fn config<D: Device>(h: &mut Harness<D>, role: Role) -> bool {
    h.context().count_case();
    let valid: Vec<u32> = LineConfig::all().map(LineConfig::word).collect();
    let mut ok = true;
    for word in &valid {
        ok &= check(h, role, Register::Config, *word, *word);
    }
    let fake = loop {
        let word = h.context().rng().gen_range(0..=u32::MAX);
        if !valid.contains(&word) {
            break word;
        }
    };
    ok & check(h, role, Register::Config, fake, line::mask(fake))
}

/// Every unicast address reads back unchanged, an invalid one is ignored.
fn slave_addr<D: Device>(h: &mut Harness<D>, role: Role) -> bool {
    h.context().count_case();
    let mut ok = true;
    for address in MIN_SLAVE_ID..=MAX_SLAVE_ID {
        ok &= check(h, role, Register::SlaveAddr, u32::from(address), u32::from(address));
    }
    let current = h.device().read_register(role, Register::SlaveAddr);
    let fake = h.context().rng().gen_range(u32::from(MAX_SLAVE_ID) + 1..=u32::MAX);
    ok & check(h, role, Register::SlaveAddr, fake, current)
}

/// Control/status register readback on master and slave.
pub(super) fn run<D: Device>(h: &mut Harness<D>) {
    for role in Role::ALL {
        log::info!("Test control and status interface for {role}");
        for (register, ok) in [
            (Register::PduSize, pdu_size(h, role)),
            (Register::Config, config(h, role)),
            (Register::SlaveAddr, slave_addr(h, role)),
        ] {
            if ok {
                log::info!("{role} {register} register test successful");
            }
        }
    }
}
