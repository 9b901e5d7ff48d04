// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Tuner chip access: register map, hardware transactions and the
//! transport seam to the native driver.

use serde::{Deserialize, Serialize};

pub mod command;
pub mod registers;

pub use command::{Command, CommandOutcome, ExecContext, Reading};

/// Response delivered asynchronously by the transport.
///
/// There is no request id; a callback is matched purely against the
/// command that is currently waiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunerCallback {
    /// Power state report following an enable/disable request.
    PowerState { payload: Vec<u8> },
    /// Software delay elapsed.
    DelayElapsed,
    /// Vendor command completion.
    Vendor { opcode: u16, payload: Vec<u8> },
}

impl TunerCallback {
    pub fn vendor(opcode: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self::Vendor {
            opcode,
            payload: payload.into(),
        }
    }

    pub fn power(on: bool) -> Self {
        Self::PowerState {
            payload: vec![u8::from(on)],
        }
    }
}

/// Outbound side of the driver. Every call returns whether the request
/// was accepted; the result arrives later as a [`TunerCallback`].
pub trait TunerTransport: Send {
    /// Power up the tuner core.
    fn enable(&mut self) -> bool;

    /// Power down the tuner core.
    fn disable(&mut self) -> bool;

    /// Send a vendor command.
    fn execute_command(&mut self, opcode: u8, payload: &[u8]) -> bool;
}
