// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Radio controller components.
//!
//! This module contains the core control logic: actions and the factory
//! that builds them, the state machine that sequences them, event
//! fan-out and timing policy.

pub mod action;
pub mod events;
pub mod factory;
pub mod machine;
pub mod policies;

pub use action::{Action, ActionContext, ActionStatus, CompletionHook};
pub use events::{ListenerCategory, ListenerId, Notification, RadioEventEmitter, RadioListener};
pub use factory::{ActionFactory, BuiltAction};
pub use machine::{
    route, Effect, FmEvent, OperatingState, PendingId, PendingTransition, RadioStateMachine,
    Route, FORCED_RESET_NORMAL,
};
pub use policies::{TimingPolicy, DEFAULT_MAX_STATIONS};
