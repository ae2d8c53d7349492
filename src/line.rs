// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serial line configuration and its packing into the CONFIG register.
//!
//! Layout of the configuration word:
//!
//! | bits   | meaning                          |
//! |--------|----------------------------------|
//! | 0..=1  | baud rate selector               |
//! | 8      | parity enable                    |
//! | 9      | parity type (`0` even, `1` odd)  |
//! | 10     | stop bits (`0` one, `1` two)     |
//!
//! All other bits are ignored by the cores and read back as zero.

use core::fmt;

use crate::error::Error;

/// Significant bits of the configuration word.
pub const CONFIG_MASK: u32 = (0x7 << 8) | 0x3;

const FORMAT_SHIFT: u32 = 8;

/// Clear all bits a core is required to ignore.
#[must_use]
pub const fn mask(word: u32) -> u32 {
    word & CONFIG_MASK
}

/// Index into the core's baud rate table (`0..=3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BaudSelector(u8);

impl BaudSelector {
    pub const MAX: u8 = 3;

    pub const ALL: [Self; 4] = [Self(0), Self(1), Self(2), Self(3)];

    pub fn new(selector: u32) -> Result<Self, Error> {
        if selector > u32::from(Self::MAX) {
            return Err(Error::BaudSelector(selector));
        }
        Ok(Self(selector as u8))
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for BaudSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Parity {
    #[default]
    Even = 0,
    Odd = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StopBits {
    #[default]
    One = 0,
    Two = 1,
}

/// Character format bits (parity enable, parity type, stop bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SerialFormat {
    pub parity_enabled: bool,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl SerialFormat {
    /// Decode the three format bits, higher bits are ignored.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            parity_enabled: bits & 0x1 != 0,
            parity: if bits & 0x2 != 0 { Parity::Odd } else { Parity::Even },
            stop_bits: if bits & 0x4 != 0 { StopBits::Two } else { StopBits::One },
        }
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        ((self.stop_bits as u8) << 2) | ((self.parity as u8) << 1) | self.parity_enabled as u8
    }

    /// All eight format combinations in ascending bit order.
    pub fn all() -> impl Iterator<Item = Self> + Clone {
        (0..8).map(Self::from_bits)
    }

    /// Parity enabled with the given parity type and a single stop bit.
    #[must_use]
    pub const fn with_parity(parity: Parity) -> Self {
        Self {
            parity_enabled: true,
            parity,
            stop_bits: StopBits::One,
        }
    }
}

impl fmt::Display for SerialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match (self.parity_enabled, self.parity) {
            (false, _) => 'N',
            (true, Parity::Even) => 'E',
            (true, Parity::Odd) => 'O',
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(f, "8{parity}{stop}")
    }
}

/// Complete serial line configuration of one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LineConfig {
    pub baud: BaudSelector,
    pub format: SerialFormat,
}

impl LineConfig {
    #[must_use]
    pub const fn new(baud: BaudSelector, format: SerialFormat) -> Self {
        Self { baud, format }
    }

    /// The configuration word written to the CONFIG register.
    #[must_use]
    pub const fn word(self) -> u32 {
        ((self.format.bits() as u32) << FORMAT_SHIFT) | self.baud.0 as u32
    }

    /// Decode a (possibly unmasked) configuration word.
    #[must_use]
    pub const fn decode(word: u32) -> Self {
        let word = mask(word);
        Self {
            baud: BaudSelector((word & 0x3) as u8),
            format: SerialFormat::from_bits((word >> FORMAT_SHIFT) as u8),
        }
    }

    /// Every valid configuration, baud selector major.
    pub fn all() -> impl Iterator<Item = Self> {
        BaudSelector::ALL
            .into_iter()
            .flat_map(|baud| SerialFormat::all().map(move |format| Self::new(baud, format)))
    }
}

impl fmt::Display for LineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "baud #{} {}", self.baud, self.format)
    }
}

/// Pack the line parameters into a configuration word.
pub fn encode_config(
    baud_selector: u32,
    parity_enabled: bool,
    parity_type: Parity,
    stop_bits: StopBits,
) -> Result<u32, Error> {
    let baud = BaudSelector::new(baud_selector)?;
    let format = SerialFormat {
        parity_enabled,
        parity: parity_type,
        stop_bits,
    };
    Ok(LineConfig::new(baud, format).word())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_known_words() {
        assert_eq!(encode_config(0, false, Parity::Even, StopBits::One).unwrap(), 0x000);
        assert_eq!(encode_config(3, false, Parity::Even, StopBits::One).unwrap(), 0x003);
        assert_eq!(encode_config(1, true, Parity::Even, StopBits::One).unwrap(), 0x101);
        assert_eq!(encode_config(2, true, Parity::Odd, StopBits::One).unwrap(), 0x302);
        assert_eq!(encode_config(0, false, Parity::Even, StopBits::Two).unwrap(), 0x400);
        assert_eq!(encode_config(3, true, Parity::Odd, StopBits::Two).unwrap(), 0x703);
    }

    #[test]
    fn reject_baud_selector_out_of_range() {
        assert_eq!(
            encode_config(4, false, Parity::Even, StopBits::One).err().unwrap(),
            Error::BaudSelector(4)
        );
        assert!(BaudSelector::new(3).is_ok());
    }

    #[test]
    fn decode_reproduces_every_valid_configuration() {
        let all: Vec<_> = LineConfig::all().collect();
        assert_eq!(all.len(), 32);
        for line in all {
            let word = line.word();
            assert_eq!(mask(word), word);
            assert_eq!(LineConfig::decode(word), line);
        }
    }

    #[test]
    fn format_bits_round_trip() {
        for bits in 0..8 {
            assert_eq!(SerialFormat::from_bits(bits).bits(), bits);
        }
        assert_eq!(SerialFormat::from_bits(0xF8), SerialFormat::default());
    }

    #[test]
    fn non_significant_bits_are_masked() {
        for word in [0xFFFF_FFFF, 0x1234_5678, 0x0000_00FC, 0x8000_0704] {
            assert_eq!(mask(word), word & 0x703);
            assert_eq!(LineConfig::decode(word).word(), word & 0x703);
        }
    }

    #[test]
    fn display_line() {
        let line = LineConfig::new(BaudSelector::ALL[2], SerialFormat::with_parity(Parity::Odd));
        assert_eq!(line.to_string(), "baud #2 8O1");
        assert_eq!(SerialFormat::from_bits(0x4).to_string(), "8N2");
    }
}
