// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod controller;
pub mod radio;
pub mod request;
pub mod response;
pub mod state;
pub mod tuner;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use controller::{Notification, OperatingState, RadioEventEmitter, RadioListener};
pub use radio::freq::{Band, Freq};
pub use request::{RadioRequest, RequestId, RequestKind, RequestOutcome, TunerRequest};
pub use response::{RadioError, RadioResult};
pub use state::{RadioAttributes, RadioSnapshot};
pub use tuner::{TunerCallback, TunerTransport};
