// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Tuner task: the single context that advances the radio state machine.
//!
//! Client requests, transport callbacks and timer expiries are all turned
//! into [`FmEvent`]s and fed to [`RadioStateMachine::step`] one at a time.
//! The task then carries out the returned effects.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fmrx_backend::{BackendOptions, RegistrationContext, SimConfig};
use fmrx_core::controller::{Effect, FmEvent, RadioStateMachine, TimingPolicy};
use fmrx_core::{
    DynResult, RadioEventEmitter, RadioSnapshot, RequestId, RequestOutcome, TunerCallback,
    TunerRequest, TunerTransport,
};

/// Configuration for the tuner task.
pub struct TunerTaskConfig {
    pub registry: Arc<RegistrationContext>,
    pub backend: String,
    pub timing: TimingPolicy,
    pub sim: SimConfig,
    /// Fan-out shared with every handle.
    pub emitter: Arc<RadioEventEmitter>,
}

impl Default for TunerTaskConfig {
    fn default() -> Self {
        let mut registry = RegistrationContext::new();
        fmrx_backend::register_builtin_backends_on(&mut registry);
        Self {
            registry: Arc::new(registry),
            backend: "sim".to_string(),
            timing: TimingPolicy::default_tuner(),
            sim: SimConfig::default(),
            emitter: Arc::new(RadioEventEmitter::new()),
        }
    }
}

/// Timers armed on behalf of the machine.
struct Timers {
    events: mpsc::UnboundedSender<FmEvent>,
    callbacks: mpsc::UnboundedSender<TunerCallback>,
    timeout: Option<JoinHandle<()>>,
}

impl Timers {
    fn arm_timeout(&mut self, event: FmEvent, after: Duration) {
        self.disarm_timeout();
        let tx = self.events.clone();
        self.timeout = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(event);
        }));
    }

    fn disarm_timeout(&mut self) {
        if let Some(handle) = self.timeout.take() {
            handle.abort();
        }
    }

    fn schedule(&self, event: FmEvent, after: Duration) {
        let tx = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(event);
        });
    }

    fn delay(&self, after: Duration) {
        let tx = self.callbacks.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(TunerCallback::DelayElapsed);
        });
    }
}

/// Run the tuner task until every request sender is dropped.
pub async fn run_tuner_task(
    config: TunerTaskConfig,
    mut rx: mpsc::Receiver<TunerRequest>,
    snapshot_tx: watch::Sender<RadioSnapshot>,
) -> DynResult<()> {
    info!("Opening tuner backend {}", config.backend);

    let (callback_tx, mut callback_rx) = mpsc::unbounded_channel::<TunerCallback>();
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<FmEvent>();

    let mut transport: Box<dyn TunerTransport> = config.registry.build_transport(
        &config.backend,
        BackendOptions {
            callbacks: callback_tx.clone(),
            sim: config.sim.clone(),
        },
    )?;
    info!("Tuner backend ready");

    let emitter = config.emitter;
    let mut machine = RadioStateMachine::new(config.timing);
    let mut timers = Timers {
        events: timer_tx,
        callbacks: callback_tx,
        timeout: None,
    };
    let mut waiting: HashMap<RequestId, oneshot::Sender<RequestOutcome>> = HashMap::new();

    let effects = machine.step(FmEvent::HardwareReady, transport.as_mut());
    snapshot_tx.send_replace(machine.snapshot());
    apply_effects(effects, &mut timers, &emitter, &mut waiting);

    loop {
        let event = tokio::select! {
            request = rx.recv() => {
                let Some(TunerRequest { request, respond_to }) = request else {
                    break;
                };
                match (request.id, respond_to) {
                    (Some(id), Some(tx)) => {
                        waiting.insert(id, tx);
                    }
                    (None, Some(_)) => debug!("Responder dropped for internal {}", request.kind),
                    _ => {}
                }
                FmEvent::Request(request)
            }
            Some(callback) = callback_rx.recv() => FmEvent::Callback(callback),
            Some(event) = timer_rx.recv() => event,
        };

        let effects = machine.step(event, transport.as_mut());
        // Publish before completing requests so a woken caller sees the result.
        snapshot_tx.send_if_modified(|current| {
            let next = machine.snapshot();
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        apply_effects(effects, &mut timers, &emitter, &mut waiting);
    }

    timers.disarm_timeout();
    if !waiting.is_empty() {
        warn!("{} request(s) still waiting at shutdown", waiting.len());
    }
    info!("tuner_task shutting down (channel closed)");
    Ok(())
}

fn apply_effects(
    effects: Vec<Effect>,
    timers: &mut Timers,
    emitter: &RadioEventEmitter,
    waiting: &mut HashMap<RequestId, oneshot::Sender<RequestOutcome>>,
) {
    for effect in effects {
        match effect {
            Effect::Notify(notification) => emitter.emit(&notification),
            Effect::ArmTimeout { pending, after } => {
                timers.arm_timeout(FmEvent::Timeout(pending), after)
            }
            Effect::DisarmTimeout => timers.disarm_timeout(),
            Effect::ArmDelay { after } => timers.delay(after),
            Effect::SchedulePoll { generation, after } => {
                timers.schedule(FmEvent::ScanPollDue(generation), after)
            }
            Effect::Complete { id, outcome } => match waiting.remove(&id) {
                Some(tx) => {
                    if tx.send(outcome).is_err() {
                        debug!("Requester for {:?} went away before {:?}", id, outcome);
                    }
                }
                None => debug!("No requester waiting for {:?} ({:?})", id, outcome),
            },
        }
    }
}
