// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Radio control state machine.
//!
//! The machine owns the operating state, the single in-flight
//! [`PendingTransition`] and the queue of deferred requests. It never
//! sleeps or spawns anything itself: [`RadioStateMachine::step`] consumes
//! one [`FmEvent`] and returns the [`Effect`]s the caller has to carry out
//! (timers to arm, notifications to publish, outcomes to report).

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::request::{RadioRequest, RequestId, RequestKind, RequestOutcome, ScanMode};
use crate::state::{RadioAttributes, RadioSnapshot};
use crate::tuner::{ExecContext, TunerCallback, TunerTransport};

use super::action::{Action, ActionContext, ActionStatus};
use super::events::Notification;
use super::factory::{ActionFactory, BuiltAction};
use super::policies::TimingPolicy;

/// Reason reported with the forced-reset notification when entering idle.
pub const FORCED_RESET_NORMAL: u32 = 0;

/// Externally visible radio state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperatingState {
    Invalid,
    Idle,
    /// Only reported as the activity of an in-flight start.
    Starting,
    Started,
    Paused,
    Scanning,
    Error,
}

impl fmt::Display for OperatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invalid => "Invalid",
            Self::Idle => "Idle",
            Self::Starting => "Starting",
            Self::Started => "Started",
            Self::Paused => "Paused",
            Self::Scanning => "Scanning",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Identifies one pending transition, so stale timeouts can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingId(u64);

/// Everything the machine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FmEvent {
    /// The tuner driver is up. Consumed once to leave `Invalid`.
    HardwareReady,
    Request(RadioRequest),
    Callback(TunerCallback),
    /// The budget of the given pending transition ran out.
    Timeout(PendingId),
    /// A scan poll armed under the given generation is due.
    ScanPollDue(u64),
}

/// Work the caller performs on behalf of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notify(Notification),
    /// Deliver `Timeout(pending)` after the duration, replacing any armed timeout.
    ArmTimeout { pending: PendingId, after: Duration },
    /// Drop the armed timeout.
    DisarmTimeout,
    /// Deliver a `DelayElapsed` callback after the duration.
    ArmDelay { after: Duration },
    /// Deliver `ScanPollDue(generation)` after the duration.
    SchedulePoll { generation: u64, after: Duration },
    /// Report the final outcome of a client request.
    Complete { id: RequestId, outcome: RequestOutcome },
}

/// The in-flight action with the states it resolves to.
#[derive(Debug, Clone)]
pub struct PendingTransition {
    pub id: PendingId,
    pub action: Action,
    /// Re-entered on cancel or failure.
    pub source: OperatingState,
    /// Entered on success.
    pub destination: OperatingState,
    pub request_id: Option<RequestId>,
    armed: bool,
    signal_before: Option<u8>,
    stereo_before: bool,
}

/// Decision of the transition table for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Build an action that ends in the given state on success.
    Accept(OperatingState),
    /// Legal here, nothing to do.
    Ignore,
    /// Keep queued until the machine reaches a state that accepts it.
    Defer,
    /// Not legal here.
    Reject,
}

/// Transition table.
pub fn route(state: OperatingState, kind: &RequestKind) -> Route {
    use OperatingState as S;
    use RequestKind as K;

    match (state, kind) {
        (S::Invalid, _) => Route::Defer,
        (S::Error | S::Starting, _) => Route::Reject,

        (S::Idle, K::Start { .. }) => Route::Accept(S::Started),
        (S::Idle, K::Reset | K::StopScan) => Route::Ignore,

        (S::Started | S::Paused | S::Scanning, K::Reset) => Route::Accept(S::Idle),

        (S::Started, K::Pause) => Route::Accept(S::Paused),
        (S::Started, K::Resume | K::StopScan) => Route::Ignore,
        (S::Paused, K::Resume) => Route::Accept(S::Started),
        (S::Paused, K::Pause | K::StopScan) => Route::Ignore,

        (S::Started | S::Paused, K::ScanUp | K::ScanDown | K::FullScan) => {
            Route::Accept(S::Scanning)
        }
        (
            S::Started | S::Paused,
            K::SetFrequency(_)
            | K::SetThreshold(_)
            | K::SetForceMono(_)
            | K::SetAutoAfSwitch(_)
            | K::SetAutoTaSwitch(_),
        ) => Route::Accept(state),

        (
            S::Scanning,
            K::StopScan
            | K::SetThreshold(_)
            | K::SetForceMono(_)
            | K::SetAutoAfSwitch(_)
            | K::SetAutoTaSwitch(_)
            | K::PollScan(_)
            | K::ScanStep,
        ) => Route::Accept(S::Scanning),
        (S::Scanning, K::ScanDone { .. }) => Route::Accept(S::Started),
        (
            S::Scanning,
            K::SetFrequency(_) | K::Pause | K::Resume | K::ScanUp | K::ScanDown | K::FullScan,
        ) => Route::Defer,

        _ => Route::Reject,
    }
}

/// The radio state machine.
#[derive(Debug)]
pub struct RadioStateMachine {
    state: OperatingState,
    pending: Option<PendingTransition>,
    /// Deferred requests followed by hook follow-ups, oldest first.
    queue: VecDeque<RadioRequest>,
    attrs: RadioAttributes,
    scan_mode: Option<ScanMode>,
    poll_generation: u64,
    next_pending: u64,
    factory: ActionFactory,
    timing: TimingPolicy,
    transition_count: u64,
}

impl Default for RadioStateMachine {
    fn default() -> Self {
        Self::new(TimingPolicy::default())
    }
}

impl RadioStateMachine {
    /// Create a machine in the `Invalid` state.
    pub fn new(timing: TimingPolicy) -> Self {
        Self {
            state: OperatingState::Invalid,
            pending: None,
            queue: VecDeque::new(),
            attrs: RadioAttributes::default(),
            scan_mode: None,
            poll_generation: 0,
            next_pending: 0,
            factory: ActionFactory::new(timing.clone()),
            timing,
            transition_count: 0,
        }
    }

    pub fn state(&self) -> OperatingState {
        self.state
    }

    pub fn attributes(&self) -> &RadioAttributes {
        &self.attrs
    }

    pub fn pending(&self) -> Option<&PendingTransition> {
        self.pending.as_ref()
    }

    /// Scan running while in `Scanning`.
    pub fn scan_mode(&self) -> Option<ScanMode> {
        self.scan_mode
    }

    /// Number of requests waiting behind the pending transition.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Get the number of state changes that have occurred.
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Consistent copy of the state for readers outside the machine.
    pub fn snapshot(&self) -> RadioSnapshot {
        let activity = match &self.pending {
            Some(p) if matches!(p.action.kind(), RequestKind::Start { .. }) => {
                OperatingState::Starting
            }
            _ => self.state,
        };
        RadioSnapshot {
            state: self.state,
            activity,
            pending: self.pending.as_ref().map(|p| p.action.kind().name()),
            attributes: self.attrs.clone(),
        }
    }

    /// Process one event and return the effects it produced.
    pub fn step(&mut self, event: FmEvent, transport: &mut dyn TunerTransport) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            FmEvent::HardwareReady => {
                if self.state != OperatingState::Invalid {
                    debug!("Hardware ready ignored in {}", self.state);
                    return effects;
                }
                self.enter(OperatingState::Idle, &mut effects);
            }
            FmEvent::Request(request) => {
                debug!("Request queued: {}", request.kind);
                self.queue.push_back(request);
            }
            FmEvent::Callback(callback) => self.on_callback(callback, transport, &mut effects),
            FmEvent::Timeout(id) => self.on_timeout(id, transport, &mut effects),
            FmEvent::ScanPollDue(generation) => {
                self.on_poll_due(generation, transport, &mut effects)
            }
        }
        self.drain(transport, &mut effects);
        effects
    }

    fn on_callback(
        &mut self,
        callback: TunerCallback,
        transport: &mut dyn TunerTransport,
        effects: &mut Vec<Effect>,
    ) {
        let Some(pending) = self.pending.as_mut() else {
            debug!("Callback without pending action: {:?}", callback);
            return;
        };
        let mut ctx = ActionContext::new(ExecContext::new(transport), &mut self.attrs);
        pending.action.callback(&callback, &mut ctx);
        collect(ctx, &mut self.queue, effects);

        if pending.action.status().is_terminal() {
            if let Some(pending) = self.pending.take() {
                self.resolve(pending, false, effects);
            }
        }
    }

    fn on_timeout(
        &mut self,
        id: PendingId,
        transport: &mut dyn TunerTransport,
        effects: &mut Vec<Effect>,
    ) {
        match self.pending.take() {
            Some(mut pending) if pending.id == id => {
                warn!(
                    "{} timed out in {}",
                    pending.action.kind().name(),
                    self.state
                );
                let mut ctx = ActionContext::new(ExecContext::new(transport), &mut self.attrs);
                pending.action.abort(ActionStatus::Error, &mut ctx);
                collect(ctx, &mut self.queue, effects);
                self.resolve(pending, true, effects);
            }
            other => {
                debug!("Ignoring stale timeout {:?}", id);
                self.pending = other;
            }
        }
    }

    fn on_poll_due(
        &mut self,
        generation: u64,
        transport: &mut dyn TunerTransport,
        effects: &mut Vec<Effect>,
    ) {
        if generation != self.poll_generation
            || self.pending.is_some()
            || self.state != OperatingState::Scanning
        {
            debug!("Ignoring stale scan poll {}", generation);
            return;
        }
        if let Some(mode) = self.scan_mode {
            let poll = RadioRequest::internal(RequestKind::PollScan(mode));
            self.dispatch(poll, transport, effects);
        }
    }

    /// Process queued requests until one leaves a transition pending.
    /// Requests the current state defers stay queued in order, and are
    /// retried whenever the state changes.
    fn drain(&mut self, transport: &mut dyn TunerTransport, effects: &mut Vec<Effect>) {
        let mut skipped: VecDeque<RadioRequest> = VecDeque::new();
        while self.pending.is_none() {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            if route(self.state, &request.kind) == Route::Defer {
                skipped.push_back(request);
                continue;
            }
            let before = self.state;
            self.dispatch(request, transport, effects);
            if self.state != before {
                requeue(&mut self.queue, &mut skipped);
            }
        }
        requeue(&mut self.queue, &mut skipped);
    }

    fn dispatch(
        &mut self,
        request: RadioRequest,
        transport: &mut dyn TunerTransport,
        effects: &mut Vec<Effect>,
    ) {
        match route(self.state, &request.kind) {
            Route::Defer => {
                debug!("{} deferred in {}", request.kind, self.state);
                self.queue.push_back(request);
            }
            Route::Ignore => {
                debug!("{} ignored in {}", request.kind, self.state);
                complete(effects, request.id, RequestOutcome::Ignored);
            }
            Route::Reject => {
                if request.id.is_some() {
                    warn!("{} not handled in {}", request.kind, self.state);
                } else {
                    debug!("Dropping {} in {}", request.kind, self.state);
                }
                complete(effects, request.id, RequestOutcome::NotHandled);
            }
            Route::Accept(destination) => {
                match self
                    .factory
                    .build(&request.kind, &self.attrs, self.scan_mode)
                {
                    Some(built) => self.begin(request, destination, built, transport, effects),
                    None => complete(effects, request.id, RequestOutcome::NotHandled),
                }
            }
        }
    }

    fn begin(
        &mut self,
        request: RadioRequest,
        destination: OperatingState,
        built: BuiltAction,
        transport: &mut dyn TunerTransport,
        effects: &mut Vec<Effect>,
    ) {
        // Any scan poll armed before this point is stale.
        self.poll_generation += 1;
        self.next_pending += 1;

        let timeout = self.timing.timeout_for(&request.kind);
        let mut pending = PendingTransition {
            id: PendingId(self.next_pending),
            action: built.action,
            source: self.state,
            destination,
            request_id: request.id,
            armed: false,
            signal_before: self.attrs.signal_strength,
            stereo_before: self.attrs.stereo,
        };
        debug!(
            "Pending {}: {} -> {} ({} commands)",
            request.kind,
            pending.source,
            pending.destination,
            pending.action.commands().len()
        );
        effects.extend(built.notices.into_iter().map(Effect::Notify));

        let mut ctx = ActionContext::new(ExecContext::new(transport), &mut self.attrs);
        pending.action.execute(&mut ctx);
        collect(ctx, &mut self.queue, effects);

        if pending.action.status().is_terminal() {
            self.resolve(pending, false, effects);
        } else {
            pending.armed = true;
            effects.push(Effect::ArmTimeout {
                pending: pending.id,
                after: timeout,
            });
            self.pending = Some(pending);
        }
    }

    fn resolve(&mut self, pending: PendingTransition, timed_out: bool, effects: &mut Vec<Effect>) {
        if pending.armed {
            effects.push(Effect::DisarmTimeout);
        }
        let status = pending.action.status();
        let (target, outcome) = match status {
            ActionStatus::Done => (pending.destination, RequestOutcome::Done),
            ActionStatus::Cancel => (pending.source, RequestOutcome::Cancelled),
            ActionStatus::Fail => (pending.source, RequestOutcome::Failed),
            ActionStatus::Error | ActionStatus::Idle | ActionStatus::Running => {
                let outcome = if timed_out {
                    RequestOutcome::TimedOut
                } else {
                    RequestOutcome::Error
                };
                (OperatingState::Error, outcome)
            }
        };
        debug!(
            "{} resolved {:?} in {}",
            pending.action.kind(),
            status,
            self.state
        );

        let kind = pending.action.kind();
        if status == ActionStatus::Done {
            if let Some(mode) = kind.scan_mode() {
                self.scan_mode = Some(mode);
            }
        }
        self.enter(target, effects);
        if status == ActionStatus::Done && matches!(kind, RequestKind::Start { .. }) {
            info!(
                "Radio started on {}..{}",
                self.attrs.band.min, self.attrs.band.max
            );
            effects.push(Effect::Notify(Notification::Started));
        }

        if let Some(signal) = self.attrs.signal_strength {
            if pending.signal_before != Some(signal) {
                effects.push(Effect::Notify(Notification::SignalStrengthChanged(signal)));
            }
        }
        if pending.stereo_before != self.attrs.stereo {
            effects.push(Effect::Notify(Notification::StereoChanged(self.attrs.stereo)));
        }

        complete(effects, pending.request_id, outcome);
    }

    fn enter(&mut self, target: OperatingState, effects: &mut Vec<Effect>) {
        let old = self.state;
        if target != old {
            info!("Radio state {} -> {}", old, target);
            self.state = target;
            self.transition_count += 1;
            effects.push(Effect::Notify(Notification::StateChanged { old, new: target }));
            match target {
                OperatingState::Idle => effects.push(Effect::Notify(Notification::ForcedReset {
                    reason: FORCED_RESET_NORMAL,
                })),
                OperatingState::Error => effects.push(Effect::Notify(Notification::Error)),
                _ => {}
            }
        }
        if target == OperatingState::Scanning {
            effects.push(Effect::SchedulePoll {
                generation: self.poll_generation,
                after: self.timing.scan_poll_interval,
            });
        } else {
            self.scan_mode = None;
        }
    }
}

fn collect(ctx: ActionContext<'_>, queue: &mut VecDeque<RadioRequest>, effects: &mut Vec<Effect>) {
    let ActionContext {
        exec, followups, ..
    } = ctx;
    effects.extend(
        exec.delays
            .into_iter()
            .map(|after| Effect::ArmDelay { after }),
    );
    queue.extend(followups);
}

fn requeue(queue: &mut VecDeque<RadioRequest>, skipped: &mut VecDeque<RadioRequest>) {
    while let Some(request) = skipped.pop_back() {
        queue.push_front(request);
    }
}

fn complete(effects: &mut Vec<Effect>, id: Option<RequestId>, outcome: RequestOutcome) {
    if let Some(id) = id {
        effects.push(Effect::Complete { id, outcome });
    }
}
