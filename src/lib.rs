// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

pub mod classify;
pub mod codec;
pub mod device;
mod error;
pub mod frame;
pub mod harness;
pub mod line;
pub mod settings;
pub mod sim;
pub mod wait;

pub use codec::rtu;
pub use error::*;
pub use frame::*;
