// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use rand::Rng as _;

use crate::{
    device::Device,
    harness::{Harness, SuiteOptions, TestMatrix},
};

/// Sweep function codes, baud rates and serial formats with matched master
/// and slave configuration.
pub(super) fn run<D: Device>(h: &mut Harness<D>, options: &SuiteOptions) {
    let seed = h.context().rng().gen_range(0..=u64::MAX);
    let matrix = TestMatrix::new(seed, options.functions.clone(), options.trials);
    log::info!("Normal exchange: {} cases (matrix seed {seed})", matrix.len());
    for case in &matrix {
        h.run_case(&case);
    }
}
