// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Serial tuner task and the handle host code uses to drive it.

pub mod config;
pub mod tuner_handle;
pub mod tuner_task;

pub use config::ServerConfig;
pub use tuner_handle::RadioHandle;
pub use tuner_task::{run_tuner_task, TunerTaskConfig};
