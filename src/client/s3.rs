//! S3 bucket backend over `aws-sdk-s3`.
//!
//! Buckets carry a single managed field (the name), so reconciliation is
//! existence-only: HeadBucket to observe, CreateBucket/DeleteBucket to
//! converge. Path-style addressing is forced because RGW endpoints do not
//! resolve virtual-hosted bucket names.

use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use serde::Serialize;
use tracing::debug;

use super::{AdminBackend, ClientError, ClientResult, ConnectionInfo};

/// Normalized bucket state: the name is the only field under desired-state
/// control; creation dates and ownership are server-generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketState {
    pub name: String,
}

/// Bucket backend bound to one bucket name.
pub struct BucketBackend {
    client: aws_sdk_s3::Client,
    name: String,
}

impl BucketBackend {
    pub fn new(conn: &ConnectionInfo, name: impl Into<String>) -> ClientResult<Self> {
        let endpoint = conn.endpoint_url()?;
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(conn.region().to_string()))
            .endpoint_url(endpoint.as_str())
            .credentials_provider(conn.credentials())
            .force_path_style(true)
            // transient failures surface to the caller; they are never retried
            .retry_config(RetryConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            name: name.into(),
        })
    }
}

fn map_sdk_err<E>(err: SdkError<E>) -> ClientError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if matches!(err, SdkError::ServiceError(_)) {
        ClientError::Domain {
            code: err.code().unwrap_or("ServiceError").to_string(),
            message: err
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string()),
        }
    } else {
        ClientError::Transport(DisplayErrorContext(&err).to_string())
    }
}

#[async_trait]
impl AdminBackend for BucketBackend {
    type State = BucketState;

    async fn fetch(&self) -> ClientResult<Option<BucketState>> {
        debug!(bucket = %self.name, "HeadBucket");
        match self.client.head_bucket().bucket(&self.name).send().await {
            Ok(_) => Ok(Some(BucketState {
                name: self.name.clone(),
            })),
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false) =>
            {
                Ok(None)
            }
            Err(err) => Err(map_sdk_err(err)),
        }
    }

    async fn create(&self, desired: &BucketState) -> ClientResult<Option<BucketState>> {
        debug!(bucket = %desired.name, "CreateBucket");
        self.client
            .create_bucket()
            .bucket(&desired.name)
            .send()
            .await
            .map_err(map_sdk_err)?;
        Ok(Some(desired.clone()))
    }

    async fn update(
        &self,
        _observed: &BucketState,
        _desired: &BucketState,
    ) -> (Option<BucketState>, Vec<ClientError>) {
        // Unreachable through the engine: an existing bucket with a matching
        // name never differs from the desired state.
        (
            None,
            vec![ClientError::domain(
                "NotSupported",
                "buckets have no updatable fields",
            )],
        )
    }

    async fn delete(&self, observed: &BucketState) -> ClientResult<()> {
        debug!(bucket = %observed.name, "DeleteBucket");
        match self
            .client
            .delete_bucket()
            .bucket(&observed.name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            // Gone between fetch and delete: already converged.
            Err(err) if err.code() == Some("NoSuchBucket") => Ok(()),
            Err(err) => Err(map_sdk_err(err)),
        }
    }
}
