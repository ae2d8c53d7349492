// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error as ThisError;

/// modbus-conformance Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum Error {
    /// Invalid buffer size
    #[error("Invalid buffer size")]
    BufferSize,
    /// Invalid exception code
    #[error("Invalid exception code: 0x{0:0>2X}")]
    ExceptionCode(u8),
    /// Invalid exception function code
    #[error("Invalid exception function code: 0x{0:0>2X}")]
    ExceptionFnCode(u8),
    /// Invalid CRC
    #[error("Invalid CRC: expected = 0x{0:0>4X}, actual = 0x{1:0>4X}")]
    Crc(u16, u16),
    /// Register count outside of the range allowed for the function code
    #[error("Invalid register count: {count} (allowed 1..={max})")]
    RegisterCount { count: u16, max: u16 },
    /// Number of register values does not match the register count
    #[error("Register count {count} does not match {values} register value(s)")]
    ValueCount { count: u16, values: usize },
    /// Baud rate selector outside of `0..=3`
    #[error("Invalid baud rate selector: {0}")]
    BaudSelector(u32),
}
