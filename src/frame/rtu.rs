// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Slave ID
pub type SlaveId = u8;

/// Requests sent to this address are executed by every slave and never answered.
pub const BROADCAST: SlaveId = 0;

/// Lowest unicast slave address.
pub const MIN_SLAVE_ID: SlaveId = 1;

/// Highest unicast slave address.
pub const MAX_SLAVE_ID: SlaveId = 247;

#[must_use]
pub const fn is_broadcast(slave: SlaveId) -> bool {
    slave == BROADCAST
}

/// `true` if `value` may be written to a slave address register.
#[must_use]
pub const fn is_unicast(value: u32) -> bool {
    value >= MIN_SLAVE_ID as u32 && value <= MAX_SLAVE_ID as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicast_range() {
        assert!(!is_unicast(0));
        assert!(is_unicast(1));
        assert!(is_unicast(247));
        assert!(!is_unicast(248));
        assert!(!is_unicast(u32::MAX));
        assert!(is_broadcast(0));
        assert!(!is_broadcast(1));
    }
}
