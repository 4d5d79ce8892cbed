//! S3 bucket module - bucket existence management
//!
//! Reconciles a bucket toward present or absent against an RGW (or any
//! S3-compatible) endpoint.
//!
//! ## Parameters
//!
//! - `bucket_name`: Bucket name (required)
//! - `state`: Desired state (present, absent) (default: "present")
//! - Connection group: `host` (required), `port`, `access_key`, `secret_key`,
//!   `use_ssl`/`is_secure`, `verify`/`verify_ssl`, `region`
//!
//! ## Example
//!
//! ```yaml
//! - name: Create an S3 bucket
//!   module: rgw_bucket
//!   params:
//!     bucket_name: my-test-bucket
//!     state: present
//!     host: s3.example.com
//!     port: 443
//!     access_key: "{{ rgw_access_key }}"
//!     secret_key: "{{ rgw_secret_key }}"
//! ```

use crate::client::s3::{BucketBackend, BucketState};
use crate::modules::{
    connection_from_params, report_to_output, run_async, Module, ModuleContext, ModuleError,
    ModuleOutput, ModuleParams, ModuleResult, ParamExt, TargetState,
};
use crate::reconcile::{reconcile, Desired, ReconcileOptions};

/// Bucket module configuration
#[derive(Debug, Clone)]
struct BucketConfig {
    name: String,
    state: TargetState,
}

impl BucketConfig {
    fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let name = params.get_string_required("bucket_name")?;
        let state_str = params
            .get_string("state")?
            .unwrap_or_else(|| "present".to_string());
        let state = TargetState::from_str(&state_str)?;

        validate_bucket_name(&name)?;

        Ok(Self { name, state })
    }
}

/// Validate a bucket name against the S3 naming rules RGW enforces.
fn validate_bucket_name(name: &str) -> ModuleResult<()> {
    if name.len() < 3 || name.len() > 63 {
        return Err(ModuleError::InvalidParameter(
            "Bucket name must be between 3 and 63 characters".to_string(),
        ));
    }

    if !name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphanumeric())
        .unwrap_or(false)
        || !name
            .chars()
            .last()
            .map(|c| c.is_ascii_alphanumeric())
            .unwrap_or(false)
    {
        return Err(ModuleError::InvalidParameter(
            "Bucket name must start and end with a letter or number".to_string(),
        ));
    }

    for c in name.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.' {
            return Err(ModuleError::InvalidParameter(format!(
                "Bucket name contains invalid character '{}'. Only lowercase letters, numbers, hyphens, and periods are allowed",
                c
            )));
        }
    }

    if name.contains("..") {
        return Err(ModuleError::InvalidParameter(
            "Bucket name cannot contain consecutive periods".to_string(),
        ));
    }

    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        return Err(ModuleError::InvalidParameter(
            "Bucket name cannot be formatted as an IP address".to_string(),
        ));
    }

    Ok(())
}

/// Module for bucket existence management
pub struct RgwBucketModule;

impl RgwBucketModule {
    async fn execute_async(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let config = BucketConfig::from_params(params)?;
        let conn = connection_from_params(params)?;

        let backend = BucketBackend::new(&conn, config.name.clone())
            .map_err(|e| ModuleError::ExecutionFailed(e.to_string()))?;

        let desired = match config.state {
            TargetState::Present => Desired::Present(BucketState {
                name: config.name.clone(),
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

        Ok(report_to_output("bucket", &config.name, report))
    }
}

impl Module for RgwBucketModule {
    fn name(&self) -> &'static str {
        "rgw_bucket"
    }

    fn description(&self) -> &'static str {
        "Manage S3 bucket existence on a RADOS Gateway"
    }

    fn required_params(&self) -> &[&'static str] {
        &["bucket_name"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        BucketConfig::from_params(params).map(|_| ())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        run_async(self.execute_async(params, context))
    }
}
