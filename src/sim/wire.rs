// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Character level model of the serial line between two cores.

use crate::{
    classify::ErrorKind,
    line::{LineConfig, StopBits},
};

/// Decide how a receiver configured with `rx` sees a frame sent with `tx`.
///
/// A frame either arrives intact or the receiver records exactly one frame
/// error and drops it:
///
/// * different baud rates: a receiver sampling faster than the sender loses
///   the start bit, a slower one the stop bit,
/// * parity present on one side only shifts the stop bit,
/// * different parity types fail the parity check,
/// * a receiver expecting two stop bits finds the next start bit instead.
pub(crate) fn receive(tx: LineConfig, rx: LineConfig) -> Result<(), ErrorKind> {
    if tx.baud != rx.baud {
        return Err(if rx.baud > tx.baud {
            ErrorKind::StartBit
        } else {
            ErrorKind::StopBit
        });
    }
    if tx.format.parity_enabled != rx.format.parity_enabled {
        return Err(ErrorKind::StopBit);
    }
    if rx.format.parity_enabled && tx.format.parity != rx.format.parity {
        return Err(ErrorKind::Parity);
    }
    if rx.format.stop_bits == StopBits::Two && tx.format.stop_bits == StopBits::One {
        return Err(ErrorKind::StopBit);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{BaudSelector, Parity, SerialFormat};

    fn line(baud: usize, bits: u8) -> LineConfig {
        LineConfig::new(BaudSelector::ALL[baud], SerialFormat::from_bits(bits))
    }

    #[test]
    fn identical_lines_never_fail() {
        for cfg in LineConfig::all() {
            assert_eq!(receive(cfg, cfg), Ok(()));
        }
    }

    #[test]
    fn baud_mismatch() {
        assert_eq!(receive(line(0, 0), line(3, 0)), Err(ErrorKind::StartBit));
        assert_eq!(receive(line(3, 0), line(0, 0)), Err(ErrorKind::StopBit));
    }

    #[test]
    fn parity_mismatch() {
        let even = LineConfig::new(BaudSelector::ALL[1], SerialFormat::with_parity(Parity::Even));
        let odd = LineConfig::new(BaudSelector::ALL[1], SerialFormat::with_parity(Parity::Odd));
        assert_eq!(receive(even, odd), Err(ErrorKind::Parity));
        assert_eq!(receive(odd, even), Err(ErrorKind::Parity));
        assert_eq!(receive(line(1, 0b001), line(1, 0b000)), Err(ErrorKind::StopBit));
        // parity type is irrelevant while parity is disabled
        assert_eq!(receive(line(1, 0b000), line(1, 0b010)), Ok(()));
    }

    #[test]
    fn stop_bit_mismatch() {
        assert_eq!(receive(line(2, 0b000), line(2, 0b100)), Err(ErrorKind::StopBit));
        assert_eq!(receive(line(2, 0b100), line(2, 0b000)), Ok(()));
    }
}
