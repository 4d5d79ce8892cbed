//! Backend clients for the RADOS Gateway admin surfaces.
//!
//! This module provides the seam between the reconciliation engine and the
//! external admin APIs. Each backend wraps a pre-built client library and is
//! bound to a single resource identifier at construction time:
//!
//! - [`s3::BucketBackend`]: S3 buckets via `aws-sdk-s3`
//! - [`iam::PolicyBackend`]: IAM-style policies via `aws-sdk-iam`
//! - [`admin::UserBackend`]: gateway user accounts via the RGW admin ops API
//!   (`reqwest` + SigV4-signed requests)
//!
//! Backends never retry and never raise across the reconciliation boundary:
//! every failure is a [`ClientError`] value the engine aggregates.

pub mod admin;
pub mod iam;
pub mod s3;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Failure taxonomy for backend calls.
///
/// `NotFound` is an expected outcome, not a failure: `fetch` maps it to
/// `Ok(None)` and `delete` treats it as already-converged. The other variants
/// are captured as messages by the engine; none of them triggers a retry.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The resource does not exist on the backend.
    #[error("resource not found")]
    NotFound,

    /// Connection-level failure: refused, DNS, timeout, TLS.
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend-reported error with its own code (duplicate entity, invalid
    /// policy document, access denied).
    #[error("{code}: {message}")]
    Domain { code: String, message: String },

    /// Rejected locally before any network call was made.
    #[error("invalid parameters: {0}")]
    Validation(String),
}

impl ClientError {
    /// Build a domain error from a backend code/message pair.
    pub fn domain(code: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::Domain {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }
}

/// Result type for backend operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// One admin-API backend, bound to a single resource identifier.
///
/// `State` is the normalized, comparable representation of the resource:
/// exactly the fields under desired-state control, with empty values already
/// collapsed to `None`. The engine compares these structurally to decide
/// whether a change is needed.
#[async_trait]
pub trait AdminBackend: Send + Sync {
    type State: Clone + PartialEq + std::fmt::Debug + Serialize + Send + Sync;

    /// Read the current state of the bound resource.
    ///
    /// A missing resource is a valid outcome and yields `Ok(None)`; any other
    /// failure is returned as-is.
    async fn fetch(&self) -> ClientResult<Option<Self::State>>;

    /// Create the resource. Returns the resulting state when the backend
    /// reports one (e.g. generated credentials).
    async fn create(&self, desired: &Self::State) -> ClientResult<Option<Self::State>>;

    /// Converge an existing resource toward `desired`.
    ///
    /// May issue several sequential calls; failures are collected rather than
    /// short-circuited, so a partial failure still attempts the remaining
    /// calls and reports everything that went wrong.
    async fn update(
        &self,
        observed: &Self::State,
        desired: &Self::State,
    ) -> (Option<Self::State>, Vec<ClientError>);

    /// Delete the resource. Deleting a resource that is already gone is a
    /// no-op, not a failure.
    async fn delete(&self, observed: &Self::State) -> ClientResult<()>;

    /// Strip observed fields that the desired state does not manage, so they
    /// cannot produce a spurious difference (e.g. server-generated
    /// credentials when the caller did not pin a key pair).
    fn mask_unmanaged(&self, _observed: &mut Self::State, _desired: &Self::State) {}
}

/// Connection parameters shared by every backend.
///
/// The secret key is deliberately excluded from `Debug` output; connection
/// details are logged as endpoint + access key only.
#[derive(Clone)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: Option<u16>,
    pub use_ssl: bool,
    pub verify_ssl: bool,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

impl std::fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("verify_ssl", &self.verify_ssl)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .finish()
    }
}

impl ConnectionInfo {
    /// Endpoint URL for this gateway, `scheme://host[:port]`.
    pub fn endpoint_url(&self) -> ClientResult<Url> {
        let scheme = if self.use_ssl { "https" } else { "http" };
        let raw = match self.port {
            Some(port) => format!("{}://{}:{}/", scheme, self.host, port),
            None => format!("{}://{}/", scheme, self.host),
        };
        Url::parse(&raw)
            .map_err(|e| ClientError::Validation(format!("invalid endpoint '{}': {}", raw, e)))
    }

    /// Signing/SDK region; RGW accepts any consistent value, default AWS.
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or("us-east-1")
    }

    pub(crate) fn credentials(&self) -> aws_credential_types::Credentials {
        aws_credential_types::Credentials::new(
            self.access_key.clone(),
            self.secret_key.clone(),
            None,
            None,
            "rgwible",
        )
    }
}
