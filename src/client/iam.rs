//! IAM-style policy backend over `aws-sdk-iam`.
//!
//! Policies are observed by ARN when one is given, otherwise by listing and
//! matching on name. The policy document is opaque text: comparison is on
//! the name only, so an existing policy with the desired name is already
//! converged regardless of its document.

use async_trait::async_trait;
use aws_sdk_iam::config::retry::RetryConfig;
use aws_sdk_iam::config::{BehaviorVersion, Region};
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use serde::Serialize;
use tracing::debug;

use super::{AdminBackend, ClientError, ClientResult, ConnectionInfo};

/// Normalized policy state. The ARN is server-assigned and excluded from
/// comparison unless the desired state pins one; it is carried so deletion
/// can address the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyState {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

/// Policy backend bound to one policy, addressed by name and/or ARN.
pub struct PolicyBackend {
    client: aws_sdk_iam::Client,
    name: Option<String>,
    arn: Option<String>,
    document: Option<String>,
}

impl PolicyBackend {
    pub fn new(
        conn: &ConnectionInfo,
        name: Option<String>,
        arn: Option<String>,
        document: Option<String>,
    ) -> ClientResult<Self> {
        if name.is_none() && arn.is_none() {
            return Err(ClientError::Validation(
                "a policy name or ARN is required".to_string(),
            ));
        }

        let endpoint = conn.endpoint_url()?;
        let config = aws_sdk_iam::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(conn.region().to_string()))
            .endpoint_url(endpoint.as_str())
            .credentials_provider(conn.credentials())
            // transient failures surface to the caller; they are never retried
            .retry_config(RetryConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_iam::Client::from_conf(config),
            name,
            arn,
            document,
        })
    }

    async fn fetch_by_arn(&self, arn: &str) -> ClientResult<Option<PolicyState>> {
        debug!(%arn, "GetPolicy");
        match self.client.get_policy().policy_arn(arn).send().await {
            Ok(output) => Ok(output.policy().map(|p| PolicyState {
                name: p.policy_name().unwrap_or_default().to_string(),
                arn: p.arn().map(str::to_string),
            })),
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_no_such_entity_exception())
                    .unwrap_or(false) =>
            {
                Ok(None)
            }
            Err(err) => Err(map_sdk_err(err)),
        }
    }

    async fn fetch_by_name(&self, name: &str) -> ClientResult<Option<PolicyState>> {
        debug!(%name, "ListPolicies");
        let mut marker: Option<String> = None;
        loop {
            let mut request = self.client.list_policies();
            if let Some(m) = &marker {
                request = request.marker(m);
            }
            let page = request.send().await.map_err(map_sdk_err)?;

            for policy in page.policies() {
                if policy.policy_name() == Some(name) {
                    return Ok(Some(PolicyState {
                        name: name.to_string(),
                        arn: policy.arn().map(str::to_string),
                    }));
                }
            }

            if page.is_truncated() {
                marker = page.marker().map(str::to_string);
            } else {
                return Ok(None);
            }
        }
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
impl AdminBackend for PolicyBackend {
    type State = PolicyState;

    async fn fetch(&self) -> ClientResult<Option<PolicyState>> {
        if let Some(arn) = &self.arn {
            self.fetch_by_arn(arn).await
        } else if let Some(name) = &self.name {
            self.fetch_by_name(name).await
        } else {
            Ok(None)
        }
    }

    async fn create(&self, desired: &PolicyState) -> ClientResult<Option<PolicyState>> {
        let document = self.document.as_deref().ok_or_else(|| {
            ClientError::Validation("a policy document is required to create a policy".to_string())
        })?;

        debug!(name = %desired.name, "CreatePolicy");
        let output = self
            .client
            .create_policy()
            .policy_name(&desired.name)
            .policy_document(document)
            .send()
            .await
            .map_err(map_sdk_err)?;

        Ok(output.policy().map(|p| PolicyState {
            name: desired.name.clone(),
            arn: p.arn().map(str::to_string),
        }))
    }

    async fn update(
        &self,
        _observed: &PolicyState,
        _desired: &PolicyState,
    ) -> (Option<PolicyState>, Vec<ClientError>) {
        // Unreachable through the engine: policies compare on name only.
        (
            None,
            vec![ClientError::domain(
                "NotSupported",
                "policy documents are opaque; recreate the policy to change one",
            )],
        )
    }

    async fn delete(&self, observed: &PolicyState) -> ClientResult<()> {
        let arn = self
            .arn
            .as_deref()
            .or(observed.arn.as_deref())
            .ok_or_else(|| {
                ClientError::Validation("cannot delete a policy without an ARN".to_string())
            })?;

        debug!(%arn, "DeletePolicy");
        match self.client.delete_policy().policy_arn(arn).send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_no_such_entity_exception())
                    .unwrap_or(false) =>
            {
                Ok(())
            }
            Err(err) => Err(map_sdk_err(err)),
        }
    }

    fn mask_unmanaged(&self, observed: &mut PolicyState, desired: &PolicyState) {
        // The ARN is server-assigned; only compare it when the caller pinned
        // one in the desired state.
        if desired.arn.is_none() {
            observed.arn = None;
        }
    }
}
