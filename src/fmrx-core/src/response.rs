// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::time::Duration;

use thiserror::Error;

use crate::request::RequestOutcome;

/// Error type returned by radio requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("tuner task is not running")]
    TaskClosed,

    #[error("{request} did not complete within {budget:?}")]
    WaitTimedOut {
        request: &'static str,
        budget: Duration,
    },

    #[error("{request} finished with {outcome:?}")]
    Outcome {
        request: &'static str,
        outcome: RequestOutcome,
    },
}

pub type RadioResult<T> = Result<T, RadioError>;
