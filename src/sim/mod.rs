// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory master/slave core pair.
//!
//! [`SimulatedDevice`] implements [`Device`] with a pair of cores connected
//! by a modelled serial line. Frames are assembled with real CRCs, checked
//! by the receiver and counted as frame errors exactly like the hardware
//! does. Every transaction completes synchronously when CS is written.

use core::{fmt, str::FromStr};
use std::{collections::HashSet, time::Duration};

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::{
    classify::{ErrorKind, ErrorTally, RawErrorCounts, Role},
    codec::rtu::{self, split_adu},
    device::{Device, InjectorFrame, Register, StatusKind},
    error::Error,
    frame::{
        Address, Exception, ExceptionResponse, FunctionCode, MAX_PDU_SIZE, MAX_READ_REGISTERS,
        MAX_WRITE_REGISTERS, MIN_PDU_SIZE, MIN_SLAVE_ID, Quantity, SlaveId, Word, is_broadcast,
        rtu::is_unicast,
    },
    line::{self, LineConfig},
    wait::{self, Deadline, WaitStatus},
};

mod wire;

const HOLDING_REGISTERS: usize = 0x1_0000;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Deliberate misbehaviour of the simulated cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quirk {
    /// The master never returns to idle.
    Stalled,
    /// Read responses declare a byte count one too small.
    WrongReadByteCount,
    /// The slave answers broadcast requests.
    ReplyToBroadcast,
    /// CONFIG keeps every written bit.
    UnmaskedConfig,
    /// Broadcast writes are acknowledged internally but not stored.
    DropBroadcastWrites,
}

impl Quirk {
    pub const ALL: [Self; 5] = [
        Self::Stalled,
        Self::WrongReadByteCount,
        Self::ReplyToBroadcast,
        Self::UnmaskedConfig,
        Self::DropBroadcastWrites,
    ];

    const fn name(self) -> &'static str {
        match self {
            Self::Stalled => "stalled",
            Self::WrongReadByteCount => "wrong-read-byte-count",
            Self::ReplyToBroadcast => "reply-to-broadcast",
            Self::UnmaskedConfig => "unmasked-config",
            Self::DropBroadcastWrites => "drop-broadcast-writes",
        }
    }
}

impl fmt::Display for Quirk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quirk: {0}")]
pub struct UnknownQuirk(pub String);

impl FromStr for Quirk {
    type Err = UnknownQuirk;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.name() == s)
            .ok_or_else(|| UnknownQuirk(s.to_owned()))
    }
}

/// Control/status registers shared by both cores.
#[derive(Debug, Clone, Copy)]
struct CoreRegisters {
    config: u32,
    slave_addr: SlaveId,
}

impl Default for CoreRegisters {
    fn default() -> Self {
        Self {
            config: 0,
            slave_addr: MIN_SLAVE_ID,
        }
    }
}

impl CoreRegisters {
    fn line(&self) -> LineConfig {
        LineConfig::decode(self.config)
    }
}

#[derive(Debug, Default)]
struct MasterCore {
    regs: CoreRegisters,
    request_size: usize,
    request: Vec<u8>,
    response: Vec<u8>,
    response_ready: bool,
    busy: bool,
    errors: ErrorTally,
}

#[derive(Debug)]
struct SlaveCore {
    regs: CoreRegisters,
    holding: Vec<Word>,
    request_size: usize,
    request_received: bool,
    errors: ErrorTally,
}

impl Default for SlaveCore {
    fn default() -> Self {
        Self {
            regs: CoreRegisters::default(),
            holding: vec![0; HOLDING_REGISTERS],
            request_size: 0,
            request_received: false,
            errors: ErrorTally::default(),
        }
    }
}

type ExceptionResult = Result<Vec<u8>, Exception>;

fn address_and_quantity(pdu: &[u8]) -> (Address, Quantity) {
    (BigEndian::read_u16(&pdu[1..3]), BigEndian::read_u16(&pdu[3..5]))
}

fn check_range(address: Address, count: Quantity, max: Quantity) -> Result<(), Exception> {
    if count == 0 || count > max {
        return Err(Exception::IllegalDataValue);
    }
    if usize::from(address) + usize::from(count) > HOLDING_REGISTERS {
        return Err(Exception::IllegalDataAddress);
    }
    Ok(())
}

impl SlaveCore {
    fn execute(&mut self, pdu: &[u8], broadcast: bool, quirks: &HashSet<Quirk>) -> Vec<u8> {
        let function = FunctionCode::new(pdu[0]);
        let store = !(broadcast && quirks.contains(&Quirk::DropBroadcastWrites));
        let result = match function {
            FunctionCode::ReadHoldingRegisters => self.read(pdu, quirks),
            FunctionCode::WriteSingleRegister => self.write_single(pdu, store),
            FunctionCode::WriteMultipleRegisters => self.write_multiple(pdu, store),
            FunctionCode::Custom(_) => Err(Exception::IllegalFunction),
        };
        result.unwrap_or_else(|exception| {
            log::debug!("Slave answers {function} with {exception}");
            <[u8; 2]>::from(ExceptionResponse {
                function,
                exception,
            })
            .to_vec()
        })
    }

    fn read(&self, pdu: &[u8], quirks: &HashSet<Quirk>) -> ExceptionResult {
        if pdu.len() != 5 {
            return Err(Exception::IllegalDataValue);
        }
        let (address, count) = address_and_quantity(pdu);
        check_range(address, count, MAX_READ_REGISTERS)?;
        let start = usize::from(address);
        let byte_count = count as usize * 2;
        let mut rsp = Vec::with_capacity(2 + byte_count);
        rsp.push(FunctionCode::ReadHoldingRegisters.value());
        rsp.push(byte_count as u8);
        for value in &self.holding[start..start + usize::from(count)] {
            rsp.extend_from_slice(&value.to_be_bytes());
        }
        if quirks.contains(&Quirk::WrongReadByteCount) {
            rsp[1] = rsp[1].wrapping_sub(1);
        }
        Ok(rsp)
    }

    fn write_single(&mut self, pdu: &[u8], store: bool) -> ExceptionResult {
        if pdu.len() != 5 {
            return Err(Exception::IllegalDataValue);
        }
        let (address, value) = address_and_quantity(pdu);
        if store {
            self.holding[usize::from(address)] = value;
        }
        Ok(pdu.to_vec())
    }

    fn write_multiple(&mut self, pdu: &[u8], store: bool) -> ExceptionResult {
        if pdu.len() < 6 {
            return Err(Exception::IllegalDataValue);
        }
        let (address, count) = address_and_quantity(pdu);
        let byte_count = usize::from(pdu[5]);
        if byte_count != count as usize * 2 || pdu.len() != 6 + byte_count {
            return Err(Exception::IllegalDataValue);
        }
        check_range(address, count, MAX_WRITE_REGISTERS)?;
        if store {
            let start = usize::from(address);
            for (reg, chunk) in self.holding[start..start + usize::from(count)]
                .iter_mut()
                .zip(pdu[6..].chunks_exact(2))
            {
                *reg = BigEndian::read_u16(chunk);
            }
        }
        Ok(pdu[..5].to_vec())
    }
}

#[derive(Debug, Default)]
struct Injector {
    selected: bool,
    frame: Option<InjectorFrame>,
}

/// A master and a slave core connected back to back, plus a fault injector.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    master: MasterCore,
    slave: SlaveCore,
    injector: Injector,
    quirks: HashSet<Quirk>,
}

impl SimulatedDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quirks(quirks: impl IntoIterator<Item = Quirk>) -> Self {
        Self {
            quirks: quirks.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_quirk(&self, quirk: Quirk) -> bool {
        self.quirks.contains(&quirk)
    }

    /// The slave's holding registers.
    pub fn slave_memory_mut(&mut self) -> &mut [Word] {
        &mut self.slave.holding
    }

    fn start_transaction(&mut self) {
        self.master.response.clear();
        self.master.response_ready = false;
        self.slave.request_received = false;
        if self.quirks.contains(&Quirk::Stalled) {
            log::trace!("Master stalled");
            self.master.busy = true;
            return;
        }
        let size = self.master.request_size.min(self.master.request.len());
        let target = self.master.regs.slave_addr;
        let adu = rtu::encode_adu(target, &self.master.request[..size]);
        log::trace!("Master sends {adu:02X?}");
        let reply = self.slave_receive(self.master.regs.line(), &adu);
        let reply = if self.injector.selected {
            self.injector.frame.map(|frame| (frame.line, frame.adu()))
        } else {
            reply
        };
        if let Some((line, adu)) = reply {
            self.master_receive(line, &adu);
        }
    }

    /// Deliver a frame to the slave and return its reply, if any.
    fn slave_receive(&mut self, tx: LineConfig, adu: &[u8]) -> Option<(LineConfig, Vec<u8>)> {
        let slave = &mut self.slave;
        let rx = slave.regs.line();
        if let Err(kind) = wire::receive(tx, rx) {
            log::trace!("Slave {kind} error ({tx} -> {rx})");
            slave.errors.bump(kind);
            return None;
        }
        let frame = match split_adu(adu) {
            Ok(frame) => frame,
            Err(err) => {
                log::trace!("Slave drops frame: {err}");
                if let Error::Crc(..) = err {
                    slave.errors.bump(ErrorKind::Crc);
                }
                return None;
            }
        };
        let broadcast = is_broadcast(frame.slave);
        if !broadcast && frame.slave != slave.regs.slave_addr {
            log::trace!("Slave {} ignores frame for {}", slave.regs.slave_addr, frame.slave);
            slave.errors.bump(ErrorKind::Address);
            return None;
        }
        if frame.pdu[0] >= 0x80 {
            return None;
        }
        slave.request_received = true;
        slave.request_size = frame.pdu.len();
        let rsp = slave.execute(frame.pdu, broadcast, &self.quirks);
        if broadcast && !self.quirks.contains(&Quirk::ReplyToBroadcast) {
            return None;
        }
        Some((rx, rtu::encode_adu(slave.regs.slave_addr, &rsp)))
    }

    fn master_receive(&mut self, tx: LineConfig, adu: &[u8]) {
        let master = &mut self.master;
        let rx = master.regs.line();
        if let Err(kind) = wire::receive(tx, rx) {
            log::trace!("Master {kind} error ({tx} -> {rx})");
            master.errors.bump(kind);
            return;
        }
        let frame = match split_adu(adu) {
            Ok(frame) => frame,
            Err(err) => {
                log::trace!("Master drops frame: {err}");
                if let Error::Crc(..) = err {
                    master.errors.bump(ErrorKind::Crc);
                }
                return;
            }
        };
        let target = master.regs.slave_addr;
        if !is_broadcast(target) && frame.slave != target {
            log::trace!("Master expected a reply from {target}, got {}", frame.slave);
            master.errors.bump(ErrorKind::Address);
            return;
        }
        master.response = frame.pdu.to_vec();
        master.response_ready = true;
    }

    fn status(&self, kind: StatusKind) -> bool {
        match kind {
            StatusKind::Fsm => !self.master.busy,
            StatusKind::Pdu => self.master.response_ready,
        }
    }
}

impl Device for SimulatedDevice {
    fn read_register(&mut self, role: Role, register: Register) -> u32 {
        match (role, register) {
            (Role::Master, Register::PduSize) => self.master.response.len() as u32,
            (Role::Slave, Register::PduSize) => self.slave.request_size as u32,
            (Role::Master, Register::Config) => self.master.regs.config,
            (Role::Slave, Register::Config) => self.slave.regs.config,
            (Role::Master, Register::SlaveAddr) => u32::from(self.master.regs.slave_addr),
            (Role::Slave, Register::SlaveAddr) => u32::from(self.slave.regs.slave_addr),
            (Role::Master, Register::Cs) => u32::from(self.master.busy),
            (Role::Slave, Register::Cs) => 0,
        }
    }

    fn write_register(&mut self, role: Role, register: Register, value: u32) {
        let regs = match role {
            Role::Master => &mut self.master.regs,
            Role::Slave => &mut self.slave.regs,
        };
        match register {
            Register::Config => {
                regs.config = if self.quirks.contains(&Quirk::UnmaskedConfig) {
                    value
                } else {
                    line::mask(value)
                };
            }
            Register::SlaveAddr => {
                let accepted = is_unicast(value) || (role == Role::Master && value == 0);
                if accepted {
                    regs.slave_addr = value as SlaveId;
                } else {
                    log::debug!("{role} ignores slave address {value}");
                }
            }
            Register::PduSize => {
                let size = value as usize;
                if role == Role::Master && (MIN_PDU_SIZE..=MAX_PDU_SIZE).contains(&size) {
                    self.master.request_size = size;
                }
            }
            Register::Cs => {
                if role == Role::Master {
                    self.start_transaction();
                }
            }
        }
    }

    fn write_request_pdu(&mut self, pdu: &[u8]) {
        let len = pdu.len().min(MAX_PDU_SIZE);
        self.master.request = pdu[..len].to_vec();
    }

    fn read_response_pdu(&mut self, size: usize) -> Vec<u8> {
        self.master.response.iter().take(size).copied().collect()
    }

    fn wait_for_status(&mut self, kind: StatusKind, timeout: Duration) -> WaitStatus {
        wait::poll_until(Deadline::after(timeout), POLL_INTERVAL, || self.status(kind))
    }

    fn pdu_received(&self, role: Role, kind: StatusKind) -> bool {
        match role {
            Role::Master => self.status(kind),
            Role::Slave => match kind {
                StatusKind::Fsm => true,
                StatusKind::Pdu => self.slave.request_received,
            },
        }
    }

    fn direct_read_slave_registers(&mut self, address: Address, count: Quantity) -> Vec<Word> {
        let start = usize::from(address);
        let end = (start + usize::from(count)).min(HOLDING_REGISTERS);
        self.slave.holding[start..end].to_vec()
    }

    fn read_error_counts(&mut self) -> RawErrorCounts {
        (self.master.errors.raw(), self.slave.errors.raw())
    }

    fn reset_error_counts(&mut self) {
        self.master.errors = ErrorTally::default();
        self.slave.errors = ErrorTally::default();
    }

    fn select_injector(&mut self, active: bool) {
        self.injector.selected = active;
    }

    fn arm_injector(&mut self, frame: &InjectorFrame) {
        self.injector.frame = Some(*frame);
    }

    fn trigger_injector(&mut self) {
        let Some(frame) = self.injector.frame else {
            log::warn!("Injector triggered without an armed frame");
            return;
        };
        if self.slave_receive(frame.line, &frame.adu()).is_some() {
            log::trace!("Reply to injected frame discarded");
        }
    }
}
