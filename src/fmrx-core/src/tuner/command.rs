// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Atomic hardware transactions.
//!
//! A [`Command`] is sent once through the transport and then validates the
//! single callback that completes it. Any response whose opcode or payload
//! shape does not match is a protocol error, never a negotiated outcome.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::radio::freq::{Band, Freq};

use super::registers::{
    ACCESS_READ, ACCESS_WRITE, FLAG_SEARCH_TUNE_FAIL, FLAG_SEARCH_TUNE_FINISHED,
    FLAG_STEREO_ACTIVE, OPCODE_REGISTER_ACCESS, OPCODE_REGISTER_ACCESS_COMPLETE, REG_FLAG,
    REG_FREQ, REG_RSSI,
};
use super::{TunerCallback, TunerTransport};

/// Result of issuing or validating a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Cancel,
    Fail,
    Error,
}

/// Value decoded by a read command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    /// Tuned frequency, already snapped to the band grid.
    Frequency(Freq),
    /// Received signal strength.
    Signal(u8),
    /// Search/tune status with the stereo indication.
    ScanStatus { stereo: bool },
}

/// What a read command decodes from its register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    Frequency,
    Signal,
    ScanStatus,
}

/// State needed while issuing commands.
pub struct ExecContext<'a> {
    pub transport: &'a mut dyn TunerTransport,
    /// Software delays armed by delay commands during this step.
    pub delays: Vec<Duration>,
}

impl<'a> ExecContext<'a> {
    pub fn new(transport: &'a mut dyn TunerTransport) -> Self {
        Self {
            transport,
            delays: Vec::new(),
        }
    }
}

/// One hardware transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Power the tuner core up or down.
    Power { enable: bool },
    /// Wait without touching the hardware.
    Delay { duration: Duration },
    /// Write one register.
    Write { register: u8, value: Vec<u8> },
    /// Read `len` bytes of one register.
    Read {
        register: u8,
        len: u8,
        kind: ReadKind,
        reading: Option<Reading>,
    },
}

impl Command {
    pub fn enable() -> Self {
        Self::Power { enable: true }
    }

    pub fn disable() -> Self {
        Self::Power { enable: false }
    }

    pub fn delay(duration: Duration) -> Self {
        Self::Delay { duration }
    }

    pub fn write(register: u8, value: u8) -> Self {
        Self::Write {
            register,
            value: vec![value],
        }
    }

    pub fn write_freq(freq: Freq) -> Self {
        Self::Write {
            register: REG_FREQ,
            value: freq.to_register().to_le_bytes().to_vec(),
        }
    }

    pub fn read_frequency() -> Self {
        Self::read(REG_FREQ, 2, ReadKind::Frequency)
    }

    pub fn read_signal() -> Self {
        Self::read(REG_RSSI, 1, ReadKind::Signal)
    }

    pub fn poll_status() -> Self {
        Self::read(REG_FLAG, 2, ReadKind::ScanStatus)
    }

    fn read(register: u8, len: u8, kind: ReadKind) -> Self {
        Self::Read {
            register,
            len,
            kind,
            reading: None,
        }
    }

    /// Value decoded from the validated response, if this is a read.
    pub fn reading(&self) -> Option<Reading> {
        match self {
            Self::Read { reading, .. } => *reading,
            _ => None,
        }
    }

    /// Payload sent with the vendor opcode, if any.
    pub fn payload(&self) -> Option<Vec<u8>> {
        match self {
            Self::Write { register, value } => {
                let mut payload = vec![*register, ACCESS_WRITE];
                payload.extend_from_slice(value);
                Some(payload)
            }
            Self::Read { register, len, .. } => Some(vec![*register, ACCESS_READ, *len]),
            _ => None,
        }
    }

    /// Issue the transaction. The transport only reports acceptance; the
    /// actual result arrives through [`Command::on_callback`].
    pub fn execute(&self, ctx: &mut ExecContext<'_>) -> CommandOutcome {
        let accepted = match self {
            Self::Power { enable: true } => ctx.transport.enable(),
            Self::Power { enable: false } => ctx.transport.disable(),
            Self::Delay { duration } => {
                ctx.delays.push(*duration);
                true
            }
            Self::Write { .. } | Self::Read { .. } => {
                let payload = self.payload().unwrap_or_default();
                debug!("Command: {:02x} {:02x?}", OPCODE_REGISTER_ACCESS, payload);
                ctx.transport
                    .execute_command(OPCODE_REGISTER_ACCESS, &payload)
            }
        };
        if accepted {
            CommandOutcome::Success
        } else {
            CommandOutcome::Error
        }
    }

    /// Validate the callback completing this command.
    pub fn on_callback(&mut self, callback: &TunerCallback, band: &Band) -> CommandOutcome {
        match (&mut *self, callback) {
            (Self::Power { enable }, TunerCallback::PowerState { payload }) => {
                match payload.as_slice() {
                    [state] if (*state != 0) == *enable => CommandOutcome::Success,
                    _ => CommandOutcome::Error,
                }
            }
            (Self::Delay { .. }, TunerCallback::DelayElapsed) => CommandOutcome::Success,
            (Self::Write { register, .. }, TunerCallback::Vendor { opcode, payload }) => {
                if *opcode != OPCODE_REGISTER_ACCESS_COMPLETE {
                    return CommandOutcome::Error;
                }
                match payload.as_slice() {
                    [0, echoed, ACCESS_WRITE] if *echoed == *register => CommandOutcome::Success,
                    _ => CommandOutcome::Error,
                }
            }
            (
                Self::Read {
                    register,
                    len,
                    kind,
                    reading,
                },
                TunerCallback::Vendor { opcode, payload },
            ) => {
                if *opcode != OPCODE_REGISTER_ACCESS_COMPLETE
                    || payload.len() != 3 + usize::from(*len)
                    || payload[0] != 0
                    || payload[1] != *register
                    || payload[2] != ACCESS_READ
                {
                    return CommandOutcome::Error;
                }
                let (outcome, decoded) = decode(*kind, &payload[3..], band);
                *reading = decoded;
                outcome
            }
            _ => CommandOutcome::Error,
        }
    }
}

fn decode(kind: ReadKind, data: &[u8], band: &Band) -> (CommandOutcome, Option<Reading>) {
    match kind {
        ReadKind::Frequency => {
            let raw = u16::from_le_bytes([data[0], data[1]]);
            match band.snap(Freq::from_register(raw)) {
                Some(freq) => (CommandOutcome::Success, Some(Reading::Frequency(freq))),
                None => (CommandOutcome::Fail, None),
            }
        }
        ReadKind::Signal => (CommandOutcome::Success, Some(Reading::Signal(data[0]))),
        ReadKind::ScanStatus => {
            let flags = u16::from_le_bytes([data[0], data[1]]);
            if flags & FLAG_SEARCH_TUNE_FINISHED == 0 {
                (CommandOutcome::Cancel, None)
            } else if flags & FLAG_SEARCH_TUNE_FAIL != 0 {
                (CommandOutcome::Fail, None)
            } else {
                let stereo = flags & FLAG_STEREO_ACTIVE != 0;
                (CommandOutcome::Success, Some(Reading::ScanStatus { stereo }))
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Power { enable: true } => write!(f, "enable"),
            Self::Power { enable: false } => write!(f, "disable"),
            Self::Delay { duration } => write!(f, "delay {:?}", duration),
            Self::Write { register, value } => write!(f, "write {:#04x} {:02x?}", register, value),
            Self::Read { register, len, .. } => write!(f, "read {:#04x} x{}", register, len),
        }
    }
}
