//! Tests for the reconciliation engine against an in-memory backend.
//!
//! These verify the engine's contract:
//! - idempotency: a second run after the backend converged reports no change
//! - state=absent with no existing resource is a no-op
//! - check mode never issues mutating calls
//! - backend failures are aggregated, never raised

use std::sync::Mutex;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde::Serialize;

use rgwible::client::iam::PolicyState;
use rgwible::client::s3::BucketState;
use rgwible::client::{AdminBackend, ClientError, ClientResult};
use rgwible::reconcile::{reconcile, Desired, ReconcileOptions};

/// In-memory backend: mutating calls actually converge the stored state, so
/// back-to-back reconciliations behave like a real gateway would.
struct MemoryBackend<S> {
    store: Mutex<Option<S>>,
    calls: Mutex<Vec<&'static str>>,
    delete_error: Option<String>,
}

impl<S: Clone> MemoryBackend<S> {
    fn with(stored: Option<S>) -> Self {
        Self {
            store: Mutex::new(stored),
            calls: Mutex::new(Vec::new()),
            delete_error: None,
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn stored(&self) -> Option<S> {
        self.store.lock().unwrap().clone()
    }
}

#[async_trait]
impl<S> AdminBackend for MemoryBackend<S>
where
    S: Clone + PartialEq + std::fmt::Debug + Serialize + Send + Sync,
{
    type State = S;

    async fn fetch(&self) -> ClientResult<Option<S>> {
        self.calls.lock().unwrap().push("fetch");
        Ok(self.store.lock().unwrap().clone())
    }

    async fn create(&self, desired: &S) -> ClientResult<Option<S>> {
        self.calls.lock().unwrap().push("create");
        *self.store.lock().unwrap() = Some(desired.clone());
        Ok(Some(desired.clone()))
    }

    async fn update(&self, _observed: &S, desired: &S) -> (Option<S>, Vec<ClientError>) {
        self.calls.lock().unwrap().push("update");
        *self.store.lock().unwrap() = Some(desired.clone());
        (Some(desired.clone()), Vec::new())
    }

    async fn delete(&self, _observed: &S) -> ClientResult<()> {
        self.calls.lock().unwrap().push("delete");
        if let Some(message) = &self.delete_error {
            return Err(ClientError::domain("BucketNotEmpty", message.clone()));
        }
        *self.store.lock().unwrap() = None;
        Ok(())
    }
}

fn bucket(name: &str) -> BucketState {
    BucketState {
        name: name.to_string(),
    }
}

#[tokio::test]
async fn test_bucket_create_scenario() {
    // Bucket absent on the backend, desired present: exactly one create.
    let backend = MemoryBackend::with(None);
    let report = reconcile(
        &backend,
        Desired::Present(bucket("my-test-bucket")),
        ReconcileOptions::default(),
    )
    .await;

    assert!(report.changed);
    assert!(!report.failed());
    assert_eq!(backend.calls(), vec!["fetch", "create"]);
    assert_eq!(backend.stored(), Some(bucket("my-test-bucket")));
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let backend = MemoryBackend::with(None);
    let desired = bucket("my-test-bucket");

    let first = reconcile(
        &backend,
        Desired::Present(desired.clone()),
        ReconcileOptions::default(),
    )
    .await;
    assert!(first.changed);

    let second = reconcile(
        &backend,
        Desired::Present(desired),
        ReconcileOptions::default(),
    )
    .await;
    assert!(!second.changed);
    assert!(!second.failed());
    assert_eq!(backend.calls(), vec!["fetch", "create", "fetch"]);
}

#[tokio::test]
async fn test_absent_with_no_resource_is_noop() {
    let backend = MemoryBackend::<BucketState>::with(None);
    let report = reconcile(&backend, Desired::Absent, ReconcileOptions::default()).await;

    assert!(!report.changed);
    assert!(!report.failed());
    assert_eq!(backend.calls(), vec!["fetch"]);
}

#[tokio::test]
async fn test_present_with_identical_resource_is_noop() {
    let backend = MemoryBackend::with(Some(bucket("data")));
    let report = reconcile(
        &backend,
        Desired::Present(bucket("data")),
        ReconcileOptions::default(),
    )
    .await;

    assert!(!report.changed);
    assert_eq!(backend.calls(), vec!["fetch"]);
}

#[tokio::test]
async fn test_check_mode_never_mutates() {
    let opts = ReconcileOptions {
        check_mode: true,
        diff_mode: true,
    };

    // Pending create
    let backend = MemoryBackend::with(None);
    let report = reconcile(&backend, Desired::Present(bucket("new")), opts).await;
    assert!(report.changed);
    assert_eq!(backend.calls(), vec!["fetch"]);
    assert_eq!(backend.stored(), None);

    // Pending delete
    let backend = MemoryBackend::with(Some(bucket("old")));
    let report = reconcile(&backend, Desired::<BucketState>::Absent, opts).await;
    assert!(report.changed);
    assert_eq!(backend.calls(), vec!["fetch"]);
    assert_eq!(backend.stored(), Some(bucket("old")));

    // Diff still reports the pending change
    let diff = report.diff.expect("diff requested");
    assert_eq!(diff.before, Some(bucket("old")));
    assert_eq!(diff.after, None);
}

#[tokio::test]
async fn test_policy_delete_scenario() {
    let backend = MemoryBackend::with(Some(PolicyState {
        name: "my-test-policy".to_string(),
        arn: Some("arn:aws:iam::aws:policy/my-test-policy".to_string()),
    }));

    let report = reconcile(
        &backend,
        Desired::<PolicyState>::Absent,
        ReconcileOptions::default(),
    )
    .await;

    assert!(report.changed);
    assert!(!report.failed());
    assert_eq!(backend.calls(), vec!["fetch", "delete"]);
    assert_eq!(backend.stored(), None);
}

#[tokio::test]
async fn test_delete_failure_is_aggregated() {
    let backend = MemoryBackend {
        store: Mutex::new(Some(bucket("stuck"))),
        calls: Mutex::new(Vec::new()),
        delete_error: Some("bucket not empty".to_string()),
    };

    let report = reconcile(
        &backend,
        Desired::<BucketState>::Absent,
        ReconcileOptions::default(),
    )
    .await;

    assert!(report.changed);
    assert!(report.failed());
    assert_eq!(report.error_messages.len(), 1);
    assert!(report.error_messages[0].contains("BucketNotEmpty"));
}

proptest! {
    /// Idempotency over arbitrary bucket names: once the first run converges
    /// the backend, the second run never reports a change.
    #[test]
    fn prop_second_run_reports_no_change(name in "[a-z][a-z0-9-]{2,20}[a-z0-9]") {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let backend = MemoryBackend::with(None);
            let desired = bucket(&name);

            let first = reconcile(
                &backend,
                Desired::Present(desired.clone()),
                ReconcileOptions::default(),
            )
            .await;
            let second = reconcile(
                &backend,
                Desired::Present(desired),
                ReconcileOptions::default(),
            )
            .await;

            prop_assert!(first.changed);
            prop_assert!(!second.changed);
            prop_assert!(!second.failed());
            Ok(())
        })?;
    }
}
