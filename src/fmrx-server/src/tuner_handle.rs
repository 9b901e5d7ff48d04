// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Host-facing handle to the tuner task.
//!
//! Every request is submitted together with a oneshot sender that the task
//! fulfils once the machine reports the request's outcome. The blocking
//! variants wait on that receiver from a plain thread, bounded by the
//! request's timeout budget.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};

use fmrx_core::controller::{ListenerCategory, ListenerId, TimingPolicy};
use fmrx_core::{
    Band, Freq, RadioError, RadioEventEmitter, RadioListener, RadioRequest, RadioResult,
    RadioSnapshot, RequestKind, RequestOutcome, TunerRequest,
};

/// A handle to the running tuner task. Cheap to clone.
#[derive(Clone)]
pub struct RadioHandle {
    /// Send requests to the tuner task.
    tx: mpsc::Sender<TunerRequest>,
    /// Latest published snapshot.
    snapshot_rx: watch::Receiver<RadioSnapshot>,
    emitter: Arc<RadioEventEmitter>,
    timing: TimingPolicy,
    runtime: Handle,
}

impl RadioHandle {
    /// Must be called from within a tokio runtime.
    pub fn new(
        tx: mpsc::Sender<TunerRequest>,
        snapshot_rx: watch::Receiver<RadioSnapshot>,
        emitter: Arc<RadioEventEmitter>,
        timing: TimingPolicy,
    ) -> Self {
        Self {
            tx,
            snapshot_rx,
            emitter,
            timing,
            runtime: Handle::current(),
        }
    }

    /// Queue a request and return the receiver of its outcome.
    pub async fn submit(&self, kind: RequestKind) -> RadioResult<oneshot::Receiver<RequestOutcome>> {
        let (respond_to, outcome_rx) = oneshot::channel();
        self.tx
            .send(TunerRequest {
                request: RadioRequest::new(kind),
                respond_to: Some(respond_to),
            })
            .await
            .map_err(|_| RadioError::TaskClosed)?;
        Ok(outcome_rx)
    }

    /// Submit a request and wait for its outcome, however long it takes.
    pub async fn request(&self, kind: RequestKind) -> RadioResult<RequestOutcome> {
        let outcome_rx = self.submit(kind).await?;
        outcome_rx.await.map_err(|_| RadioError::TaskClosed)
    }

    /// Submit a request and block the calling thread until it resolves or
    /// its timeout budget elapses.
    ///
    /// Must not be called from an async context; use [`Self::request`] there.
    pub fn request_blocking(&self, kind: RequestKind) -> RadioResult<RequestOutcome> {
        let budget = self.timing.timeout_for(&kind);
        let name = kind.name();
        self.runtime.block_on(async {
            let outcome_rx = self.submit(kind).await?;
            match tokio::time::timeout(budget, outcome_rx).await {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(_)) => Err(RadioError::TaskClosed),
                Err(_) => Err(RadioError::WaitTimedOut {
                    request: name,
                    budget,
                }),
            }
        })
    }

    async fn expect_success(&self, kind: RequestKind) -> RadioResult<()> {
        let name = kind.name();
        check(name, self.request(kind).await?)
    }

    pub async fn start(&self, band: Band) -> RadioResult<()> {
        self.expect_success(RequestKind::Start { band }).await
    }

    pub async fn reset(&self) -> RadioResult<()> {
        self.expect_success(RequestKind::Reset).await
    }

    pub async fn pause(&self) -> RadioResult<()> {
        self.expect_success(RequestKind::Pause).await
    }

    pub async fn resume(&self) -> RadioResult<()> {
        self.expect_success(RequestKind::Resume).await
    }

    pub async fn set_frequency(&self, freq: Freq) -> RadioResult<()> {
        self.expect_success(RequestKind::SetFrequency(freq)).await
    }

    pub async fn scan_up(&self) -> RadioResult<()> {
        self.expect_success(RequestKind::ScanUp).await
    }

    pub async fn scan_down(&self) -> RadioResult<()> {
        self.expect_success(RequestKind::ScanDown).await
    }

    pub async fn full_scan(&self) -> RadioResult<()> {
        self.expect_success(RequestKind::FullScan).await
    }

    pub async fn stop_scan(&self) -> RadioResult<()> {
        self.expect_success(RequestKind::StopScan).await
    }

    pub async fn set_threshold(&self, threshold: u32) -> RadioResult<()> {
        self.expect_success(RequestKind::SetThreshold(threshold))
            .await
    }

    pub async fn set_force_mono(&self, mono: bool) -> RadioResult<()> {
        self.expect_success(RequestKind::SetForceMono(mono)).await
    }

    pub async fn set_auto_af_switch(&self, enabled: bool) -> RadioResult<()> {
        self.expect_success(RequestKind::SetAutoAfSwitch(enabled))
            .await
    }

    pub async fn set_auto_ta_switch(&self, enabled: bool) -> RadioResult<()> {
        self.expect_success(RequestKind::SetAutoTaSwitch(enabled))
            .await
    }

    /// Blocking start, see [`Self::request_blocking`].
    pub fn start_blocking(&self, band: Band) -> RadioResult<()> {
        check("start", self.request_blocking(RequestKind::Start { band })?)
    }

    /// Blocking tune, see [`Self::request_blocking`].
    pub fn set_frequency_blocking(&self, freq: Freq) -> RadioResult<()> {
        check(
            "set-frequency",
            self.request_blocking(RequestKind::SetFrequency(freq))?,
        )
    }

    /// Latest consistent view of the radio.
    pub fn snapshot(&self) -> RadioSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Whether the last published frequency is a channel of the started band.
    pub fn is_tuned_to_valid_channel(&self) -> bool {
        self.snapshot_rx.borrow().attributes.is_tuned_to_valid_channel()
    }

    /// Receiver that observes every published snapshot.
    pub fn watch(&self) -> watch::Receiver<RadioSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn add_listener(
        &self,
        listener: Arc<dyn RadioListener>,
        categories: &[ListenerCategory],
    ) -> ListenerId {
        self.emitter.register(listener, categories)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.emitter.unregister(id);
    }
}

fn check(request: &'static str, outcome: RequestOutcome) -> RadioResult<()> {
    if outcome.is_success() {
        Ok(())
    } else {
        Err(RadioError::Outcome { request, outcome })
    }
}
