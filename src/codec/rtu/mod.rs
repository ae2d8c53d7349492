// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU framing: slave id, PDU and a trailing CRC.

use super::*;
use crate::frame::SlaveId;

// [MODBUS over Serial Line Specification and Implementation Guide V1.02](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf), page 13
// "The maximum size of a MODBUS RTU frame is 256 bytes."
pub const MAX_FRAME_LEN: usize = 256;

/// Slave id and CRC around the PDU.
const ADU_OVERHEAD: usize = 3;

/// An extracted RTU PDU frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub slave: SlaveId,
    pub pdu: &'a [u8],
}

/// Calculate the CRC (Cyclic Redundancy Check) sum.
///
/// The result is in wire order: written big-endian it yields the bytes
/// as they are transmitted.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            // if we followed clippy's suggestion to move out the crc >>= 1, the condition may not be met any more
            // the recommended action therefore makes no sense and it is better to allow this lint
            #[allow(clippy::branches_sharing_code)]
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc.rotate_right(8)
}

/// Build an RTU frame with the given trailer instead of the computed CRC.
#[must_use]
pub fn encode_adu_with_crc(slave: SlaveId, pdu: &[u8], crc: u16) -> Vec<u8> {
    let mut adu = Vec::with_capacity(pdu.len() + ADU_OVERHEAD);
    adu.push(slave);
    adu.extend_from_slice(pdu);
    let mut trailer = [0; 2];
    BigEndian::write_u16(&mut trailer, crc);
    adu.extend_from_slice(&trailer);
    adu
}

/// Build an RTU frame for `pdu`.
#[must_use]
pub fn encode_adu(slave: SlaveId, pdu: &[u8]) -> Vec<u8> {
    let mut head = Vec::with_capacity(pdu.len() + 1);
    head.push(slave);
    head.extend_from_slice(pdu);
    encode_adu_with_crc(slave, pdu, crc16(&head))
}

/// The CRC a correct frame for `pdu` must carry.
#[must_use]
pub fn adu_crc(slave: SlaveId, pdu: &[u8]) -> u16 {
    let adu = encode_adu(slave, pdu);
    BigEndian::read_u16(&adu[adu.len() - 2..])
}

/// Split a complete RTU frame into slave id and PDU and verify its CRC.
pub fn split_adu(adu: &[u8]) -> Result<DecodedFrame<'_>> {
    if adu.len() < ADU_OVERHEAD + 1 || adu.len() > MAX_FRAME_LEN {
        return Err(Error::BufferSize);
    }
    let (head, crc_buf) = adu.split_at(adu.len() - 2);
    let expected_crc = BigEndian::read_u16(crc_buf);
    let actual_crc = crc16(head);
    if expected_crc != actual_crc {
        return Err(Error::Crc(expected_crc, actual_crc));
    }
    let (slave_id, pdu) = head.split_at(1);
    Ok(DecodedFrame {
        slave: slave_id[0],
        pdu,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_crc16() {
        let msg = &[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02];
        assert_eq!(crc16(msg), 0xB663);

        let msg = &[0x01, 0x03, 0x04, 0x00, 0x20, 0x00, 0x00];
        assert_eq!(crc16(msg), 0xFBF9);
    }

    #[test]
    fn encode_write_single_register_frame() {
        let adu = encode_adu(0x12, &[0x06, 0x22, 0x22, 0xAB, 0xCD]);
        assert_eq!(adu, &[0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD, 0x9F, 0xBE]);
        assert_eq!(adu_crc(0x12, &[0x06, 0x22, 0x22, 0xAB, 0xCD]), 0x9FBE);
    }

    #[test]
    fn split_valid_frame() {
        let adu = encode_adu(0x01, &[0x03, 0x00, 0x00, 0x00, 0x01]);
        let frame = split_adu(&adu).unwrap();
        assert_eq!(frame.slave, 0x01);
        assert_eq!(frame.pdu, &[0x03, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn split_frame_with_wrong_crc() {
        let adu = encode_adu_with_crc(0x12, &[0x06, 0x22, 0x22, 0xAB, 0xCD], 0x1234);
        assert_eq!(split_adu(&adu).err().unwrap(), Error::Crc(0x1234, 0x9FBE));
    }

    #[test]
    fn split_short_frame() {
        assert_eq!(split_adu(&[0x01, 0xFF, 0xFF]).err().unwrap(), Error::BufferSize);
        assert_eq!(split_adu(&[0; 300]).err().unwrap(), Error::BufferSize);
    }

    mod frame_decoder {

        use super::*;

        #[test]
        fn frame_missing_crc_byte() {
            let buf = &[
                0x12, // slave address
                0x03, // function code
                0x02, // byte count
                0x00, // data
                0x00, // data
                0x00, // CRC first byte
                      // missing crc second byte
            ];
            assert!(matches!(split_adu(buf), Err(Error::Crc(..))));
        }

        #[test]
        fn split_usual_rtu_response_frame() {
            let buf = &[
                0x01, // slave address
                0x03, // function code
                0x04, // byte count
                0x89, //
                0x02, //
                0x42, //
                0xC7, //
                0x00, // crc
                0x9D, // crc
            ];
            let DecodedFrame { slave, pdu } = split_adu(buf).unwrap();
            assert_eq!(slave, 0x01);
            assert_eq!(pdu.len(), 6);
        }
    }
}
