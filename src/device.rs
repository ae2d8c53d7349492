// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access to the cores under test.
//!
//! A [`Device`] exposes the control/status registers of the master and the
//! slave core, the master's PDU buffers, status signals, error counters and
//! the fault injector. The harness never talks to hardware in any other way.

use core::fmt;
use std::time::Duration;

use crate::{
    classify::{RawErrorCounts, Role},
    codec::rtu::{adu_crc, encode_adu_with_crc},
    frame::{Address, FunctionCode, Quantity, SlaveId, Word},
    line::LineConfig,
    wait::WaitStatus,
};

/// Control/status registers of a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Written: size of the request PDU (master). Read: size of the last
    /// received PDU.
    PduSize = 0,
    /// Line configuration word, see [`crate::line`].
    Config = 1,
    /// Slave address; `0` selects broadcast on the master.
    SlaveAddr = 2,
    /// Control/start register, master only. Any write starts a transaction.
    Cs = 3,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PduSize => "PDU_SIZE",
            Self::Config => "CONFIG",
            Self::SlaveAddr => "SLAVE_ADDR",
            Self::Cs => "CS",
        })
    }
}

/// Status signals that can be waited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// The master's state machine is idle.
    Fsm,
    /// A PDU has been received.
    Pdu,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fsm => "FSM status",
            Self::Pdu => "PDU status",
        })
    }
}

/// Parameters of the `0x06` frame sent by the fault injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectorFrame {
    pub slave: SlaveId,
    pub line: LineConfig,
    pub register_address: Address,
    pub register_value: Word,
    /// CRC trailer in wire order, see [`crate::codec::rtu::crc16`].
    pub crc: u16,
}

impl InjectorFrame {
    /// A well-formed frame carrying the correct CRC.
    #[must_use]
    pub fn new(
        slave: SlaveId,
        line: LineConfig,
        register_address: Address,
        register_value: Word,
    ) -> Self {
        let mut frame = Self {
            slave,
            line,
            register_address,
            register_value,
            crc: 0,
        };
        frame.crc = frame.true_crc();
        frame
    }

    /// The same frame with a different CRC trailer.
    #[must_use]
    pub const fn with_crc(self, crc: u16) -> Self {
        Self { crc, ..self }
    }

    #[must_use]
    pub fn pdu(&self) -> [u8; 5] {
        let [a_hi, a_lo] = self.register_address.to_be_bytes();
        let [v_hi, v_lo] = self.register_value.to_be_bytes();
        [FunctionCode::WriteSingleRegister.value(), a_hi, a_lo, v_hi, v_lo]
    }

    /// The CRC a correct frame with these fields carries.
    #[must_use]
    pub fn true_crc(&self) -> u16 {
        adu_crc(self.slave, &self.pdu())
    }

    /// The frame as it goes on the wire, trailer included.
    #[must_use]
    pub fn adu(&self) -> Vec<u8> {
        encode_adu_with_crc(self.slave, &self.pdu(), self.crc)
    }
}

/// The hardware-access capability the harness drives.
///
/// Implementations own the error counters; the harness only reads and resets
/// them.
pub trait Device {
    fn read_register(&mut self, role: Role, register: Register) -> u32;

    fn write_register(&mut self, role: Role, register: Register, value: u32);

    /// Load the master's request PDU buffer.
    fn write_request_pdu(&mut self, pdu: &[u8]);

    /// Read `size` bytes of the master's response PDU buffer.
    fn read_response_pdu(&mut self, size: usize) -> Vec<u8>;

    /// Block until the master signals `kind` or `timeout` expires.
    fn wait_for_status(&mut self, kind: StatusKind, timeout: Duration) -> WaitStatus;

    fn pdu_received(&self, role: Role, kind: StatusKind) -> bool;

    /// Read slave holding registers without going through the bus.
    fn direct_read_slave_registers(&mut self, address: Address, count: Quantity) -> Vec<Word>;

    fn read_error_counts(&mut self) -> RawErrorCounts;

    fn reset_error_counts(&mut self);

    /// Route the injector to the master's receive line instead of the slave.
    fn select_injector(&mut self, active: bool);

    fn arm_injector(&mut self, frame: &InjectorFrame);

    /// Send the armed frame to the slave.
    fn trigger_injector(&mut self);
}

impl<D: Device + ?Sized> Device for &mut D {
    fn read_register(&mut self, role: Role, register: Register) -> u32 {
        (**self).read_register(role, register)
    }

    fn write_register(&mut self, role: Role, register: Register, value: u32) {
        (**self).write_register(role, register, value);
    }

    fn write_request_pdu(&mut self, pdu: &[u8]) {
        (**self).write_request_pdu(pdu);
    }

    fn read_response_pdu(&mut self, size: usize) -> Vec<u8> {
        (**self).read_response_pdu(size)
    }

    fn wait_for_status(&mut self, kind: StatusKind, timeout: Duration) -> WaitStatus {
        (**self).wait_for_status(kind, timeout)
    }

    fn pdu_received(&self, role: Role, kind: StatusKind) -> bool {
        (**self).pdu_received(role, kind)
    }

    fn direct_read_slave_registers(&mut self, address: Address, count: Quantity) -> Vec<Word> {
        (**self).direct_read_slave_registers(address, count)
    }

    fn read_error_counts(&mut self) -> RawErrorCounts {
        (**self).read_error_counts()
    }

    fn reset_error_counts(&mut self) {
        (**self).reset_error_counts();
    }

    fn select_injector(&mut self, active: bool) {
        (**self).select_injector(active);
    }

    fn arm_injector(&mut self, frame: &InjectorFrame) {
        (**self).arm_injector(frame);
    }

    fn trigger_injector(&mut self) {
        (**self).trigger_injector();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injector_frame_carries_true_crc() {
        let frame = InjectorFrame::new(1, LineConfig::default(), 0, 0);
        assert_eq!(frame.pdu(), [0x06, 0, 0, 0, 0]);
        // 01 06 00 00 00 00 89 CA
        assert_eq!(frame.crc, 0x89CA);
        assert_eq!(frame.with_crc(0x1234).true_crc(), 0x89CA);
    }

    #[test]
    fn injector_pdu_is_big_endian() {
        let frame = InjectorFrame::new(0x12, LineConfig::default(), 0x2222, 0xABCD);
        assert_eq!(frame.pdu(), [0x06, 0x22, 0x22, 0xAB, 0xCD]);
        assert_eq!(frame.crc, 0x9FBE);
    }

    #[test]
    fn register_names() {
        assert_eq!(Register::SlaveAddr.to_string(), "SLAVE_ADDR");
        assert_eq!(StatusKind::Pdu.to_string(), "PDU status");
    }
}
