//! # rgwible - Declarative State Management for Ceph RADOS Gateway
//!
//! rgwible converges RADOS Gateway resources toward a declared desired
//! state: S3 buckets, IAM-style policies, and gateway user accounts are
//! reconciled as `present` or `absent` against the gateway's admin surfaces.
//!
//! ## Core Concepts
//!
//! - **Modules**: Declarative units of work, one per resource kind
//!   (`rgw_bucket`, `rgw_policy`, `rgw_user`), dispatched by name through
//!   the [`modules::ModuleRegistry`]
//! - **Reconciliation**: The read-diff-apply cycle in [`reconcile`]: observe
//!   the backend, compare structurally, mutate only on difference
//! - **Backends**: One [`client::AdminBackend`] implementation per admin
//!   surface, wrapping the external client libraries that own HTTP signing
//!   and wire formats
//! - **Check mode**: Compute and report the pending change without touching
//!   the backend; diff mode attaches the before/after pair either way
//!
//! ## Architecture Overview
//!
//! ```text
//! CLI (clap) ──> ModuleRegistry ──> rgw_bucket / rgw_policy / rgw_user
//!                                        │
//!                                        ▼
//!                               reconcile() engine
//!                                        │
//!                    ┌───────────────────┼───────────────────┐
//!                    ▼                   ▼                   ▼
//!              BucketBackend      PolicyBackend        UserBackend
//!              (aws-sdk-s3)       (aws-sdk-iam)    (reqwest + sigv4)
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rgwible::prelude::*;
//!
//! let registry = ModuleRegistry::with_builtins();
//! let context = ModuleContext::new().with_check_mode(true);
//! let output = registry.execute("rgw_bucket", &params, &context)?;
//! println!("changed: {}", output.changed);
//! ```

#![warn(clippy::all)]

pub mod apply;
pub mod client;
pub mod modules;
pub mod reconcile;

/// Convenient re-exports of commonly used types and traits.
pub mod prelude {
    pub use crate::client::{AdminBackend, ClientError, ClientResult, ConnectionInfo};
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
        ModuleStatus,
    };
    pub use crate::reconcile::{reconcile, Desired, ReconcileOptions, ReconcileReport};
}
