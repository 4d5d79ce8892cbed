//! IAM policy module - policy lifecycle management
//!
//! Reconciles an IAM-style policy toward present or absent against an RGW
//! (or any IAM-compatible) endpoint. Policy documents are opaque JSON text:
//! they are syntax-checked locally and passed through unmodified.
//!
//! ## Parameters
//!
//! - `policy_name`: Policy name (required for present)
//! - `policy_document`: JSON policy document (required for present)
//! - `policy_arn`: Policy ARN (addresses the policy for absent)
//! - `state`: Desired state (present, absent) (default: "present")
//! - Connection group: `host` (required), `port`, `access_key`, `secret_key`,
//!   `use_ssl`/`is_secure`, `verify`/`verify_ssl`, `region`
//!
//! ## Example
//!
//! ```yaml
//! - name: Create an IAM policy
//!   module: rgw_policy
//!   params:
//!     policy_name: my-test-policy
//!     policy_document: >
//!       {
//!         "Version": "2012-10-17",
//!         "Statement": [
//!           {"Effect": "Allow", "Action": "s3:*",
//!            "Resource": "arn:aws:s3:::my-test-bucket/*"}
//!         ]
//!       }
//!     host: iam.example.com
//!     access_key: "{{ rgw_access_key }}"
//!     secret_key: "{{ rgw_secret_key }}"
//!
//! - name: Delete a policy by ARN
//!   module: rgw_policy
//!   params:
//!     state: absent
//!     policy_arn: arn:aws:iam::aws:policy/my-test-policy
//!     host: iam.example.com
//!     access_key: "{{ rgw_access_key }}"
//!     secret_key: "{{ rgw_secret_key }}"
//! ```

use crate::client::iam::{PolicyBackend, PolicyState};
use crate::modules::{
    connection_from_params, report_to_output, run_async, Module, ModuleContext, ModuleError,
    ModuleOutput, ModuleParams, ModuleResult, ParamExt, TargetState,
};
use crate::reconcile::{reconcile, Desired, ReconcileOptions};

/// Policy module configuration
#[derive(Debug, Clone)]
struct PolicyConfig {
    name: Option<String>,
    document: Option<String>,
    arn: Option<String>,
    state: TargetState,
}

impl PolicyConfig {
    fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let name = params.get_string("policy_name")?;
        let document = params.get_string("policy_document")?;
        let arn = params.get_string("policy_arn")?;
        let state_str = params
            .get_string("state")?
            .unwrap_or_else(|| "present".to_string());
        let state = TargetState::from_str(&state_str)?;

        match state {
            TargetState::Present => {
                if name.is_none() {
                    return Err(ModuleError::MissingParameter("policy_name".to_string()));
                }
                match &document {
                    None => {
                        return Err(ModuleError::MissingParameter(
                            "policy_document".to_string(),
                        ))
                    }
                    Some(doc) => {
                        serde_json::from_str::<serde_json::Value>(doc).map_err(|e| {
                            ModuleError::InvalidParameter(format!(
                                "policy_document is not valid JSON: {}",
                                e
                            ))
                        })?;
                    }
                }
            }
            TargetState::Absent => {
                if name.is_none() && arn.is_none() {
                    return Err(ModuleError::InvalidParameter(
                        "state=absent requires policy_name or policy_arn".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            name,
            document,
            arn,
            state,
        })
    }

    /// Identifier used in messages: the name when known, else the ARN.
    fn display_id(&self) -> &str {
        self.name
            .as_deref()
            .or(self.arn.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Module for IAM policy management
pub struct RgwPolicyModule;

impl RgwPolicyModule {
    async fn execute_async(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let config = PolicyConfig::from_params(params)?;
        let conn = connection_from_params(params)?;

        let backend = PolicyBackend::new(
            &conn,
            config.name.clone(),
            config.arn.clone(),
            config.document.clone(),
        )
        .map_err(|e| ModuleError::ExecutionFailed(e.to_string()))?;

        let desired = match config.state {
            TargetState::Present => Desired::Present(PolicyState {
                // required=present validation guarantees the name here
                name: config.name.clone().unwrap_or_default(),
                arn: None,
            }),
            TargetState::Absent => Desired::Absent,
        };

        let report = reconcile(
            &backend,
            desired,
            ReconcileOptions {
                check_mode: context.check_mode,
                diff_mode: context.diff_mode,
            },
        )
        .await;

        Ok(report_to_output("policy", config.display_id(), report))
    }
}

impl Module for RgwPolicyModule {
    fn name(&self) -> &'static str {
        "rgw_policy"
    }

    fn description(&self) -> &'static str {
        "Manage IAM-style policies on a RADOS Gateway"
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        PolicyConfig::from_params(params).map(|_| ())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        run_async(self.execute_async(params, context))
    }
}
