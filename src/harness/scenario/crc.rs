// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use rand::Rng;

use crate::{
    classify::{ErrorKind, Role},
    codec::Request,
    device::{Device, InjectorFrame},
    frame::MIN_SLAVE_ID,
    harness::{Expectation, Harness, SuiteOptions, TestCase, matrix::random_baud},
    line::{LineConfig, SerialFormat},
};

/// A CRC trailer that differs from `true_crc`.
fn fake_crc(rng: &mut impl Rng, true_crc: u16) -> u16 {
    loop {
        let crc = rng.gen_range(0..=u16::MAX);
        if crc != true_crc {
            return crc;
        }
    }
}

fn corrupted_frame<D: Device>(h: &mut Harness<D>, line: LineConfig) -> InjectorFrame {
    let frame = InjectorFrame::new(MIN_SLAVE_ID, line, 0, 0);
    let crc = fake_crc(h.context().rng(), frame.true_crc());
    frame.with_crc(crc)
}

/// Normal exchange, corrupted frame to the slave, normal exchange,
/// corrupted reply to the master, normal exchange.
pub(super) fn run<D: Device>(h: &mut Harness<D>, options: &SuiteOptions) {
    // parity off so only the CRC can fail
    let line = LineConfig::new(random_baud(h.context().rng()), SerialFormat::default());
    let normal = TestCase::matched(Request::WriteSingleRegister(0, 0), MIN_SLAVE_ID, line);
    log::info!("CRC test on {line}");

    h.run_case(&normal);
    for _ in 0..options.trials {
        let frame = corrupted_frame(h, line);
        h.inject(
            line,
            MIN_SLAVE_ID,
            &frame,
            Expectation::Exactly {
                role: Role::Slave,
                kind: ErrorKind::Crc,
            },
        );
    }

    h.run_case(&normal);
    for _ in 0..options.trials {
        let frame = corrupted_frame(h, line);
        let mut session = h.injector_session(&frame);
        session.run_faulted(
            &normal,
            Expectation::Exactly {
                role: Role::Master,
                kind: ErrorKind::Crc,
            },
        );
    }

    h.run_case(&normal);
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng as _, rngs::StdRng};

    use super::*;

    #[test]
    fn fake_crc_never_matches() {
        let mut rng = StdRng::seed_from_u64(0);
        for true_crc in [0, 0x89CA, u16::MAX] {
            for _ in 0..100 {
                assert_ne!(fake_crc(&mut rng, true_crc), true_crc);
            }
        }
    }
}
