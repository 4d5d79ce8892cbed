//! The reconciliation engine: read, diff, apply.
//!
//! One algorithm serves every resource kind. The backend observes the
//! current state, the engine compares it structurally against the desired
//! state, and only when they differ does it issue the single create, update,
//! or delete call that converges them. Check mode stops after the
//! comparison; diff mode attaches the before/after pair either way.
//!
//! Failures never abort the sequence: each one is appended to the report's
//! `error_messages` and the caller decides at the end whether a non-empty
//! list constitutes overall failure.

use serde::Serialize;
use tracing::debug;

use crate::client::AdminBackend;

/// Desired end state for one resource.
#[derive(Debug, Clone)]
pub enum Desired<S> {
    /// The resource should exist with this (normalized) state.
    Present(S),
    /// The resource should not exist.
    Absent,
}

/// Execution switches carried from the CLI into the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Compute and report, but never mutate.
    pub check_mode: bool,
    /// Attach the before/after pair to the report.
    pub diff_mode: bool,
}

/// Before/after pair of normalized states; `None` means non-existence.
#[derive(Debug, Clone, Serialize)]
pub struct StateDiff<S> {
    pub before: Option<S>,
    pub after: Option<S>,
}

/// Outcome of one reconciliation.
#[derive(Debug, Serialize)]
pub struct ReconcileReport<S> {
    /// Whether observed and desired state differ (existence counts).
    pub changed: bool,
    /// Every backend failure encountered, in order. Non-empty means the
    /// invocation failed, even if later calls succeeded.
    pub error_messages: Vec<String>,
    /// Present only when diff reporting was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<StateDiff<S>>,
    /// State reported back by a mutating call (e.g. generated credentials).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<S>,
    /// Raw observation, kept for resource-specific echoes; not part of the
    /// wire-level report.
    #[serde(skip)]
    pub observed: Option<S>,
}

impl<S> ReconcileReport<S> {
    fn new() -> Self {
        Self {
            changed: false,
            error_messages: Vec::new(),
            diff: None,
            state: None,
            observed: None,
        }
    }

    pub fn failed(&self) -> bool {
        !self.error_messages.is_empty()
    }
}

/// Converge one resource toward its desired state.
pub async fn reconcile<B: AdminBackend>(
    backend: &B,
    desired: Desired<B::State>,
    opts: ReconcileOptions,
) -> ReconcileReport<B::State> {
    let mut report = ReconcileReport::new();

    // Read before write. A fetch failure short-circuits: nothing is mutated
    // on a backend whose state is unknown.
    let observed = match backend.fetch().await {
        Ok(observed) => observed,
        Err(err) => {
            report.error_messages.push(err.to_string());
            return report;
        }
    };

    // Comparison and diff use a masked view; apply calls get the raw
    // observation (a masked state may lack the fields needed to address the
    // resource, e.g. a server-assigned ARN).
    let masked = observed.clone().map(|mut state| {
        if let Desired::Present(desired_state) = &desired {
            backend.mask_unmanaged(&mut state, desired_state);
        }
        state
    });

    report.changed = match &desired {
        Desired::Present(desired_state) => masked.as_ref() != Some(desired_state),
        Desired::Absent => masked.is_some(),
    };
    debug!(
        changed = report.changed,
        exists = observed.is_some(),
        "reconcile comparison"
    );

    if opts.diff_mode {
        report.diff = Some(StateDiff {
            before: masked,
            after: match &desired {
                Desired::Present(desired_state) => Some(desired_state.clone()),
                Desired::Absent => None,
            },
        });
    }

    if opts.check_mode || !report.changed {
        report.observed = observed;
        return report;
    }

    match (&desired, &observed) {
        (Desired::Present(desired_state), None) => match backend.create(desired_state).await {
            Ok(state) => report.state = state,
            Err(err) => report.error_messages.push(err.to_string()),
        },
        (Desired::Present(desired_state), Some(observed_state)) => {
            let (state, errors) = backend.update(observed_state, desired_state).await;
            report.state = state;
            report
                .error_messages
                .extend(errors.iter().map(ToString::to_string));
        }
        (Desired::Absent, Some(observed_state)) => {
            if let Err(err) = backend.delete(observed_state).await {
                report.error_messages.push(err.to_string());
            }
        }
        // changed implies an existence mismatch, so absent+missing cannot
        // reach the apply step.
        (Desired::Absent, None) => {}
    }

    report.observed = observed;
    report
}
