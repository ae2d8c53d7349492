// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

use crate::error::Error;

pub mod rtu;

pub use self::rtu::{BROADCAST, MAX_SLAVE_ID, MIN_SLAVE_ID, SlaveId, is_broadcast};

/// A Modbus function code.
///
/// Only the register functions exercised by the harness have their own
/// variant; everything else is carried as [`FunctionCode::Custom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// Modbus Function Code: `03` (`0x03`).
    ReadHoldingRegisters,

    /// Modbus Function Code: `06` (`0x06`).
    WriteSingleRegister,

    /// Modbus Function Code: `16` (`0x10`).
    WriteMultipleRegisters,

    /// Custom Modbus Function Code.
    Custom(u8),
}

impl FunctionCode {
    /// The function codes covered by the conformance sweeps.
    pub const SUPPORTED: [Self; 3] = [
        Self::ReadHoldingRegisters,
        Self::WriteSingleRegister,
        Self::WriteMultipleRegisters,
    ];

    /// Create a new [`FunctionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x03 => Self::ReadHoldingRegisters,
            0x06 => Self::WriteSingleRegister,
            0x10 => Self::WriteMultipleRegisters,
            code => Self::Custom(code),
        }
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadHoldingRegisters => 0x03,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleRegisters => 0x10,
            Self::Custom(code) => code,
        }
    }

    /// `true` for the functions that modify slave registers.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::WriteSingleRegister | Self::WriteMultipleRegisters)
    }

    /// The largest register count a single request may carry.
    #[must_use]
    pub const fn max_quantity(self) -> Quantity {
        match self {
            Self::ReadHoldingRegisters => MAX_READ_REGISTERS,
            Self::WriteMultipleRegisters => MAX_WRITE_REGISTERS,
            Self::WriteSingleRegister | Self::Custom(_) => 1,
        }
    }
}

impl From<u8> for FunctionCode {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<FunctionCode> for u8 {
    fn from(code: FunctionCode) -> Self {
        code.value()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:0>2X}", self.value())
    }
}

/// A Modbus address is represented by 16 bit (from `0` to `65535`).
pub type Address = u16;

/// Modbus uses 16 bit for its data items (big-endian representation).
pub type Word = u16;

/// Number of items to process (`0` - `65535`).
pub type Quantity = u16;

/// Maximum number of registers a `0x03` request may read.
pub const MAX_READ_REGISTERS: Quantity = 125;

/// Maximum number of registers a `0x10` request may write.
pub const MAX_WRITE_REGISTERS: Quantity = 123;

/// Smallest PDU the cores accept.
pub const MIN_PDU_SIZE: usize = 1;

// [MODBUS over Serial Line Specification and Implementation Guide V1.02](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf), page 13
// "The maximum size of a MODBUS RTU frame is 256 bytes."
/// Largest PDU that fits into an RTU frame.
pub const MAX_PDU_SIZE: usize = 253;

/// A server (slave) exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDevice = 0x0B,
}

impl Exception {
    const fn get_name(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal function",
            Self::IllegalDataAddress => "Illegal data address",
            Self::IllegalDataValue => "Illegal data value",
            Self::ServerDeviceFailure => "Server device failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server device busy",
            Self::MemoryParityError => "Memory parity error",
            Self::GatewayPathUnavailable => "Gateway path unavailable",
            Self::GatewayTargetDevice => "Gateway target device failed to respond",
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get_name())
    }
}

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        use Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(Error::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

/// A server (slave) exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: FunctionCode,
    pub exception: Exception,
}

impl From<ExceptionResponse> for [u8; 2] {
    fn from(ex: ExceptionResponse) -> [u8; 2] {
        let fn_code = ex.function.value();
        debug_assert!(fn_code < 0x80);
        [fn_code + 0x80, ex.exception as u8]
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < 2 {
            return Err(Error::BufferSize);
        }
        let fn_err_code = bytes[0];
        if fn_err_code < 0x80 {
            return Err(Error::ExceptionFnCode(fn_err_code));
        }
        let function = (fn_err_code - 0x80).into();
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exception for function {}: {}", self.function, self.exception)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn function_code_into_u8() {
        let x: u8 = FunctionCode::WriteMultipleRegisters.value();
        assert_eq!(x, 16);
        let x: u8 = FunctionCode::Custom(0xBB).value();
        assert_eq!(x, 0xBB);
    }

    #[test]
    fn function_code_from_u8() {
        assert_eq!(FunctionCode::new(3), FunctionCode::ReadHoldingRegisters);
        assert_eq!(FunctionCode::new(6), FunctionCode::WriteSingleRegister);
        assert_eq!(FunctionCode::new(0x10), FunctionCode::WriteMultipleRegisters);
        assert_eq!(FunctionCode::new(0x0F), FunctionCode::Custom(0x0F));
    }

    #[test]
    fn function_code_display() {
        assert_eq!(FunctionCode::WriteMultipleRegisters.to_string(), "0x10");
        assert_eq!(FunctionCode::ReadHoldingRegisters.to_string(), "0x03");
    }

    #[test]
    fn register_limits_per_function() {
        assert_eq!(FunctionCode::ReadHoldingRegisters.max_quantity(), 125);
        assert_eq!(FunctionCode::WriteMultipleRegisters.max_quantity(), 123);
        assert_eq!(FunctionCode::WriteSingleRegister.max_quantity(), 1);
        assert!(!FunctionCode::ReadHoldingRegisters.is_write());
        assert!(FunctionCode::WriteSingleRegister.is_write());
    }

    #[test]
    fn exception_response_into_bytes() {
        let bytes: [u8; 2] = ExceptionResponse {
            function: 0x03.into(),
            exception: Exception::IllegalDataAddress,
        }
        .into();
        assert_eq!(bytes[0], 0x83);
        assert_eq!(bytes[1], 0x02);
    }

    #[test]
    fn exception_response_from_bytes() {
        let data: &[u8] = &[0x79, 0x02];
        assert!(ExceptionResponse::try_from(data).is_err());

        let data: &[u8] = &[0x90];
        assert_eq!(ExceptionResponse::try_from(data), Err(Error::BufferSize));

        let bytes: &[u8] = &[0x83, 0x02];
        let rsp = ExceptionResponse::try_from(bytes).unwrap();
        assert_eq!(
            rsp,
            ExceptionResponse {
                function: 0x03.into(),
                exception: Exception::IllegalDataAddress,
            }
        );
    }

    #[test]
    fn unknown_exception_code() {
        assert_eq!(Exception::try_from(0x07), Err(Error::ExceptionCode(0x07)));
    }
}
