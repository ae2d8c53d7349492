// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request PDUs and the reference responses they are checked against.
//!
//! The reference for a `0x03` request is an all-zero payload of the right
//! length. The harness cannot know the slave's register contents, so read
//! validation only looks at the function code, the byte count and the
//! overall length. Payload bytes of read responses are never compared; this
//! is a known coverage gap of the conformance sweep, not an oversight.

use core::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::{error::*, frame::*};

pub mod rtu;

type Result<T> = core::result::Result<T, Error>;

/// A request PDU together with the response a conforming slave must send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduPair {
    pub request: Vec<u8>,
    pub reference: Vec<u8>,
}

impl PduPair {
    #[must_use]
    pub fn function(&self) -> FunctionCode {
        FunctionCode::new(self.request[0])
    }
}

/// A register request sent by the master under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadHoldingRegisters(Address, Quantity),
    WriteSingleRegister(Address, Word),
    WriteMultipleRegisters(Address, Vec<Word>),
}

impl Request {
    #[must_use]
    pub const fn function(&self) -> FunctionCode {
        match self {
            Self::ReadHoldingRegisters(..) => FunctionCode::ReadHoldingRegisters,
            Self::WriteSingleRegister(..) => FunctionCode::WriteSingleRegister,
            Self::WriteMultipleRegisters(..) => FunctionCode::WriteMultipleRegisters,
        }
    }

    #[must_use]
    pub const fn address(&self) -> Address {
        match self {
            Self::ReadHoldingRegisters(addr, _)
            | Self::WriteSingleRegister(addr, _)
            | Self::WriteMultipleRegisters(addr, _) => *addr,
        }
    }

    /// Number of registers touched by the request, saturating at
    /// `Quantity::MAX`.
    #[must_use]
    pub fn quantity(&self) -> Quantity {
        match self {
            Self::ReadHoldingRegisters(_, cnt) => *cnt,
            Self::WriteSingleRegister(..) => 1,
            Self::WriteMultipleRegisters(_, values) => {
                Quantity::try_from(values.len()).unwrap_or(Quantity::MAX)
            }
        }
    }

    /// Values written by the request; empty for reads.
    #[must_use]
    pub fn values(&self) -> &[Word] {
        match self {
            Self::ReadHoldingRegisters(..) => &[],
            Self::WriteSingleRegister(_, value) => core::slice::from_ref(value),
            Self::WriteMultipleRegisters(_, values) => values,
        }
    }

    /// Number of bytes required for the serialized request PDU.
    #[must_use]
    pub fn pdu_len(&self) -> usize {
        match self {
            Self::ReadHoldingRegisters(..) | Self::WriteSingleRegister(..) => 5,
            Self::WriteMultipleRegisters(_, values) => 6 + values.len() * 2,
        }
    }

    /// Build the request PDU and its reference response.
    pub fn encode(&self) -> Result<PduPair> {
        match self {
            Self::ReadHoldingRegisters(addr, cnt) => encode_read(*addr, *cnt),
            Self::WriteSingleRegister(addr, value) => Ok(encode_write_single(*addr, *value)),
            Self::WriteMultipleRegisters(addr, values) => {
                let count = Quantity::try_from(values.len()).map_err(|_| Error::ValueCount {
                    count: Quantity::MAX,
                    values: values.len(),
                })?;
                encode_write_multiple(*addr, count, values)
            }
        }
    }
}

fn check_quantity(count: Quantity, max: Quantity) -> Result<()> {
    if count == 0 || count > max {
        return Err(Error::RegisterCount { count, max });
    }
    Ok(())
}

fn header(fn_code: FunctionCode, address: Address, word: Word) -> [u8; 5] {
    let mut buf = [fn_code.value(), 0, 0, 0, 0];
    BigEndian::write_u16(&mut buf[1..3], address);
    BigEndian::write_u16(&mut buf[3..5], word);
    buf
}

/// Read holding registers (`0x03`).
///
/// The reference carries `count * 2` zero bytes after the byte count.
pub fn encode_read(address: Address, count: Quantity) -> Result<PduPair> {
    check_quantity(count, MAX_READ_REGISTERS)?;
    let request = header(FunctionCode::ReadHoldingRegisters, address, count).to_vec();
    let byte_count = count as usize * 2;
    let mut reference = Vec::with_capacity(2 + byte_count);
    reference.push(FunctionCode::ReadHoldingRegisters.value());
    reference.push(byte_count as u8);
    reference.resize(2 + byte_count, 0);
    Ok(PduPair { request, reference })
}

/// Write single register (`0x06`). The correct response is an exact echo.
#[must_use]
pub fn encode_write_single(address: Address, value: Word) -> PduPair {
    let request = header(FunctionCode::WriteSingleRegister, address, value).to_vec();
    PduPair {
        reference: request.clone(),
        request,
    }
}

/// Write multiple registers (`0x10`).
///
/// The reference is the echo of function code, address and count.
pub fn encode_write_multiple(
    address: Address,
    count: Quantity,
    values: &[Word],
) -> Result<PduPair> {
    check_quantity(count, MAX_WRITE_REGISTERS)?;
    if values.len() != count as usize {
        return Err(Error::ValueCount {
            count,
            values: values.len(),
        });
    }
    let hdr = header(FunctionCode::WriteMultipleRegisters, address, count);
    let reference = hdr.to_vec();
    let mut request = Vec::with_capacity(6 + values.len() * 2);
    request.extend_from_slice(&hdr);
    request.push((count * 2) as u8);
    for v in values {
        let mut word = [0; 2];
        BigEndian::write_u16(&mut word, *v);
        request.extend_from_slice(&word);
    }
    Ok(PduPair { request, reference })
}

/// Register payload of a read response.
///
/// Skips function code and byte count. An odd payload length can't be
/// split into registers, so the trailing byte is dropped.
#[must_use]
pub fn register_body(pdu: &[u8]) -> &[u8] {
    let body = pdu.get(2..).unwrap_or_default();
    &body[..body.len() & !1]
}

/// Decode the registers of a read response, see [`register_body`].
#[must_use]
pub fn register_words(pdu: &[u8]) -> Vec<Word> {
    register_body(pdu)
        .chunks_exact(2)
        .map(BigEndian::read_u16)
        .collect()
}

/// An observed response that differs from its reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: Vec<u8>,
    pub observed: Vec<u8>,
}

impl Mismatch {
    #[must_use]
    pub fn function(&self) -> FunctionCode {
        self.expected
            .first()
            .copied()
            .map_or(FunctionCode::Custom(0), FunctionCode::new)
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "response to {} does not match reference: expected {:02X?}, observed {:02X?}",
            self.function(),
            self.expected,
            self.observed
        )?;
        if let Ok(ex) = ExceptionResponse::try_from(self.observed.as_slice()) {
            write!(f, " ({ex})")?;
        } else if self.function() == FunctionCode::ReadHoldingRegisters {
            write!(f, " (registers {:04X?})", register_words(&self.observed))?;
        }
        Ok(())
    }
}

impl std::error::Error for Mismatch {}

/// Compare an observed response PDU with its reference.
///
/// For `0x03` only the function code, the declared byte count and the
/// overall length are compared, every other function is compared byte by
/// byte.
pub fn validate_response(reference: &[u8], observed: &[u8]) -> core::result::Result<(), Mismatch> {
    let matches = match reference.first().copied().map(FunctionCode::new) {
        Some(FunctionCode::ReadHoldingRegisters) => {
            reference.get(0..2) == observed.get(0..2) && reference.len() == observed.len()
        }
        _ => reference == observed,
    };
    if matches {
        Ok(())
    } else {
        Err(Mismatch {
            expected: reference.to_vec(),
            observed: observed.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod serialize_requests {
        use super::*;

        #[test]
        fn read_holding_registers() {
            let pair = encode_read(0x1234, 2).unwrap();
            assert_eq!(pair.request, &[0x03, 0x12, 0x34, 0x00, 0x02]);
            assert_eq!(pair.reference, &[0x03, 0x04, 0, 0, 0, 0]);
            assert_eq!(pair.function(), FunctionCode::ReadHoldingRegisters);
        }

        #[test]
        fn read_reference_byte_count() {
            for count in [1, 2, 63, 124, MAX_READ_REGISTERS] {
                let pair = encode_read(0, count).unwrap();
                assert_eq!(pair.reference[1] as u16, count * 2);
                assert_eq!(register_body(&pair.reference).len(), pair.reference[1] as usize);
                assert!(pair.reference[2..].iter().all(|b| *b == 0));
            }
        }

        #[test]
        fn read_register_count_out_of_range() {
            assert_eq!(
                encode_read(0, 0).err().unwrap(),
                Error::RegisterCount { count: 0, max: 125 }
            );
            assert_eq!(
                encode_read(0, 126).err().unwrap(),
                Error::RegisterCount { count: 126, max: 125 }
            );
        }

        #[test]
        fn write_single_register_is_echoed() {
            let pair = encode_write_single(0, 0);
            assert_eq!(pair.request, &[0x06, 0x00, 0x00, 0x00, 0x00]);
            assert_eq!(pair.reference, pair.request);

            let pair = encode_write_single(0xFFFF, 0xABCD);
            assert_eq!(pair.request, &[0x06, 0xFF, 0xFF, 0xAB, 0xCD]);
        }

        #[test]
        fn write_multiple_registers() {
            let pair = encode_write_multiple(0x0006, 2, &[0xABCD, 0xEF12]).unwrap();
            assert_eq!(
                pair.request,
                &[0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12]
            );
            assert_eq!(pair.reference, &[0x10, 0x00, 0x06, 0x00, 0x02]);
        }

        #[test]
        fn write_multiple_echo_keeps_address_and_count() {
            for count in [1, 17, 122, MAX_WRITE_REGISTERS] {
                let values: Vec<Word> = (0..count).map(|i| i.wrapping_mul(0x0101)).collect();
                let pair = encode_write_multiple(0x4321, count, &values).unwrap();
                assert_eq!(pair.request.len(), 6 + count as usize * 2);
                assert_eq!(pair.request[5] as u16, count * 2);
                let echo = &pair.request[..5];
                assert!(validate_response(&pair.reference, echo).is_ok());
                assert_eq!(BigEndian::read_u16(&echo[1..3]), 0x4321);
                assert_eq!(BigEndian::read_u16(&echo[3..5]), count);
            }
        }

        #[test]
        fn write_multiple_rejects_bad_counts() {
            assert_eq!(
                encode_write_multiple(0, 124, &[0; 124]).err().unwrap(),
                Error::RegisterCount { count: 124, max: 123 }
            );
            assert_eq!(
                encode_write_multiple(0, 0, &[]).err().unwrap(),
                Error::RegisterCount { count: 0, max: 123 }
            );
            assert_eq!(
                encode_write_multiple(0, 3, &[1, 2]).err().unwrap(),
                Error::ValueCount { count: 3, values: 2 }
            );
        }

        #[test]
        fn request_dispatch() {
            let req = Request::WriteMultipleRegisters(7, vec![1, 2, 3]);
            assert_eq!(req.function(), FunctionCode::WriteMultipleRegisters);
            assert_eq!(req.address(), 7);
            assert_eq!(req.quantity(), 3);
            assert_eq!(req.values(), &[1, 2, 3]);
            assert_eq!(req.pdu_len(), 12);
            assert_eq!(req.encode().unwrap().request.len(), req.pdu_len());

            let req = Request::WriteSingleRegister(7, 99);
            assert_eq!(req.values(), &[99]);
            assert_eq!(req.quantity(), 1);

            let req = Request::WriteMultipleRegisters(0, vec![0; 70_000]);
            assert_eq!(req.quantity(), Quantity::MAX);
            assert_eq!(
                req.encode().err().unwrap(),
                Error::ValueCount {
                    count: Quantity::MAX,
                    values: 70_000
                }
            );

            let req = Request::ReadHoldingRegisters(7, 125);
            assert!(req.values().is_empty());
            assert_eq!(req.encode().unwrap().reference.len(), 252);
        }
    }

    mod validate_responses {
        use super::*;

        #[test]
        fn read_compares_header_and_length_only() {
            let pair = encode_read(0, 2).unwrap();
            let rsp = [0x03, 0x04, 0xAA, 0xBB, 0xCC, 0xDD];
            assert!(validate_response(&pair.reference, &rsp).is_ok());
            let rsp = [0x03, 0x02, 0xAA, 0xBB, 0xCC, 0xDD];
            assert!(validate_response(&pair.reference, &rsp).is_err());
            assert!(validate_response(&pair.reference, &[0x03, 0x04, 0xAA, 0xBB, 0xCC]).is_err());
            assert!(validate_response(&pair.reference, &[0x04, 0x04, 0, 0, 0, 0]).is_err());
            assert!(validate_response(&pair.reference, &[]).is_err());
        }

        #[test]
        fn writes_compare_every_byte() {
            let pair = encode_write_single(0x10, 0x55);
            assert!(validate_response(&pair.reference, &pair.request).is_ok());
            assert!(validate_response(&pair.reference, &[0x06, 0x00, 0x10, 0x00, 0x56]).is_err());

            let pair = encode_write_multiple(0x10, 1, &[0x55]).unwrap();
            assert!(validate_response(&pair.reference, &pair.request).is_err());
            assert!(validate_response(&pair.reference, &pair.request[..5]).is_ok());
        }

        #[test]
        fn odd_response_length_drops_trailing_byte() {
            let rsp = [0x03, 0x04, 0x12, 0x34, 0x56, 0x78, 0x9A];
            assert_eq!(register_body(&rsp), &[0x12, 0x34, 0x56, 0x78]);
            assert_eq!(register_words(&rsp), vec![0x1234, 0x5678]);
            assert!(register_body(&[0x03]).is_empty());
        }

        #[test]
        fn mismatch_display_names_the_exception() {
            let pair = encode_read(0, 1).unwrap();
            let err = validate_response(&pair.reference, &[0x83, 0x02]).unwrap_err();
            assert_eq!(err.function(), FunctionCode::ReadHoldingRegisters);
            let msg = err.to_string();
            assert!(msg.contains("Illegal data address"), "{msg}");
        }

        #[test]
        fn mismatch_display_lists_read_registers() {
            let pair = encode_read(0, 1).unwrap();
            let rsp = [0x03, 0x04, 0xAB, 0xCD, 0x00, 0x01];
            let err = validate_response(&pair.reference, &rsp).unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("ABCD"), "{msg}");
        }
    }
}
