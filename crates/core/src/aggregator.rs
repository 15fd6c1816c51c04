//! Dual-provider assessment aggregation.
//!
//! An [`Aggregator`] owns at most one in-flight attempt. Each attempt calls both
//! calculators concurrently under one [`CancellationToken`]; a newer payload
//! supersedes (cancels) the running attempt before the next one starts. Results
//! are applied through a generation check so a superseded attempt can never
//! overwrite the state of a newer one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use api_shared::{
    ClinCalcContribution, ClinCalcPreventRequest, MdCalcAssessment, MdCalcPreventRequest,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::cancellation::CancellationToken;
use crate::error::ProviderError;
use crate::payload::ProviderPayloads;
use crate::provider::RiskCalculator;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Partial,
    Error,
}

/// Observable aggregation state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregationState {
    /// Bumped on every supersede or reset; results tagged with an older value are stale.
    pub generation: u64,
    pub status: AssessmentStatus,
    /// Provider failure messages, deduplicated by text in first-seen order.
    pub errors: Vec<String>,
    pub mdcalc: Option<MdCalcAssessment>,
    pub clincalc: Option<Vec<ClinCalcContribution>>,
}

impl AggregationState {
    /// Results are only shown once an attempt has resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(
            self.status,
            AssessmentStatus::Success | AssessmentStatus::Partial | AssessmentStatus::Error
        )
    }
}

/// Settled results of both calls of one attempt.
#[derive(Debug)]
pub struct AttemptOutcome {
    pub mdcalc: Result<MdCalcAssessment, ProviderError>,
    pub clincalc: Result<Vec<ClinCalcContribution>, ProviderError>,
}

/// Applies a finished attempt to `state` if it is still the current one.
///
/// Returns `false`, leaving `state` untouched, when `generation` is stale or the
/// state is no longer loading.
pub fn apply_outcome(
    state: &watch::Sender<AggregationState>,
    generation: u64,
    outcome: AttemptOutcome,
) -> bool {
    state.send_if_modified(|current| {
        if current.generation != generation || current.status != AssessmentStatus::Loading {
            tracing::debug!(generation, current = current.generation, "discarding stale attempt");
            return false;
        }

        let mut errors = Vec::new();
        let mdcalc = settle(outcome.mdcalc, &mut errors);
        let clincalc = settle(outcome.clincalc, &mut errors);

        current.status = match (mdcalc.is_some(), clincalc.is_some()) {
            (true, true) => AssessmentStatus::Success,
            (false, false) => AssessmentStatus::Error,
            _ => AssessmentStatus::Partial,
        };
        current.mdcalc = mdcalc;
        current.clincalc = clincalc;
        current.errors = errors;

        tracing::info!(generation, status = ?current.status, "assessment attempt resolved");
        true
    })
}

fn settle<T>(result: Result<T, ProviderError>, errors: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(provider = %err.provider(), error = %err, "provider call failed");
            let message = err.user_message();
            if !errors.contains(&message) {
                errors.push(message);
            }
            None
        }
    }
}

struct Attempt {
    payloads: ProviderPayloads,
    token: CancellationToken,
}

/// Runs both calculators for the current payloads.
///
/// Must be used from within a Tokio runtime: attempts are spawned as tasks.
pub struct Aggregator<A, B> {
    mdcalc: Arc<A>,
    clincalc: Arc<B>,
    state: Arc<watch::Sender<AggregationState>>,
    current: Mutex<Option<Attempt>>,
}

impl<A, B> Aggregator<A, B>
where
    A: RiskCalculator<Request = MdCalcPreventRequest, Output = MdCalcAssessment>,
    B: RiskCalculator<Request = ClinCalcPreventRequest, Output = Vec<ClinCalcContribution>>,
{
    pub fn new(mdcalc: A, clincalc: B) -> Self {
        Self::from_shared(Arc::new(mdcalc), Arc::new(clincalc))
    }

    /// Builds an aggregator around clients shared with other aggregators.
    pub fn from_shared(mdcalc: Arc<A>, clincalc: Arc<B>) -> Self {
        let (state, _rx) = watch::channel(AggregationState::default());
        Self {
            mdcalc,
            clincalc,
            state: Arc::new(state),
            current: Mutex::new(None),
        }
    }

    /// Feeds the latest payloads in.
    ///
    /// `None` cancels any running attempt and resets to idle. Payloads equal to
    /// the ones that started the current attempt are ignored; anything else
    /// supersedes it.
    pub fn set_payloads(&self, payloads: Option<ProviderPayloads>) {
        match payloads {
            None => self.reset(),
            Some(payloads) => {
                let unchanged = self
                    .lock_current()
                    .as_ref()
                    .is_some_and(|attempt| attempt.payloads == payloads);
                if !unchanged {
                    self.supersede(payloads);
                }
            }
        }
    }

    /// Cancels the running attempt, if any, and starts a new one for `payloads`.
    pub fn supersede(&self, payloads: ProviderPayloads) {
        let mut current = self.lock_current();
        if let Some(previous) = current.take() {
            previous.token.cancel();
        }

        let token = CancellationToken::new();
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.status = AssessmentStatus::Loading;
            state.errors.clear();
            generation = state.generation;
        });
        *current = Some(Attempt {
            payloads: payloads.clone(),
            token: token.clone(),
        });
        drop(current);

        tracing::info!(generation, "starting assessment attempt");

        let mdcalc = Arc::clone(&self.mdcalc);
        let clincalc = Arc::clone(&self.clincalc);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let calls = async {
                let (mdcalc, clincalc) = tokio::join!(
                    mdcalc.calculate(&payloads.mdcalc),
                    clincalc.calculate(&payloads.clincalc),
                );
                AttemptOutcome { mdcalc, clincalc }
            };

            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(generation, "assessment attempt cancelled");
                }
                outcome = calls => {
                    if !token.is_cancelled() {
                        apply_outcome(&state, generation, outcome);
                    }
                }
            }
        });
    }

    fn reset(&self) {
        let mut current = self.lock_current();
        if let Some(previous) = current.take() {
            previous.token.cancel();
        }

        self.state.send_if_modified(|state| {
            let already_idle = state.status == AssessmentStatus::Idle
                && state.errors.is_empty()
                && state.mdcalc.is_none()
                && state.clincalc.is_none();
            if already_idle {
                return false;
            }
            state.generation += 1;
            state.status = AssessmentStatus::Idle;
            state.errors.clear();
            state.mdcalc = None;
            state.clincalc = None;
            true
        });
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AggregationState {
        self.state.borrow().clone()
    }

    /// Waits until no attempt is loading and returns the state at that point.
    pub async fn settled(&self) -> AggregationState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(|s| s.status != AssessmentStatus::Loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<Attempt>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A, B> Drop for Aggregator<A, B> {
    fn drop(&mut self) {
        let current = self
            .current
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(attempt) = current.take() {
            attempt.token.cancel();
        }
    }
}
