//! RGW user module - gateway user account management
//!
//! Reconciles a RADOS Gateway user account toward present or absent through
//! the admin ops API. The effective identifier is `tenant$user_id` when a
//! tenant is set and is used for every backend call of the invocation.
//!
//! Credentials are managed only when an explicit pair is supplied: without
//! one, whatever keys the gateway holds (or generates on create) are left
//! alone, excluded from the comparison, and echoed back as `user_keys`.
//! Supplying a pair with a new access key revokes the previous key before
//! the update is applied.
//!
//! ## Parameters
//!
//! - `user_id`: User id (required)
//! - `user_tenant`: Tenant the user belongs to
//! - `user_display_name`: Display name
//! - `user_email`: Email address
//! - `user_max_buckets`: Bucket quota (default: 1000)
//! - `user_suspended`: 0 or 1
//! - `user_access_key` / `user_secret_key`: Explicit credential pair
//!   (must be supplied together)
//! - `admin_caps`: Admin capability string, e.g. "users=read;buckets=*"
//! - `state`: Desired state (present, absent) (default: "present")
//! - Connection group: `host` (required), `port`, `access_key`, `secret_key`,
//!   `use_ssl`/`is_secure`, `verify`/`verify_ssl`, `region`
//!
//! ## Example
//!
//! ```yaml
//! - name: Ensure alice exists under tenant t1
//!   module: rgw_user
//!   params:
//!     user_id: alice
//!     user_tenant: t1
//!     user_display_name: Alice
//!     user_email: alice@example.com
//!     host: rgw.example.com
//!     port: 8000
//!     is_secure: false
//!     access_key: "{{ rgw_admin_access_key }}"
//!     secret_key: "{{ rgw_admin_secret_key }}"
//! ```

use crate::client::admin::{effective_uid, KeyPair, UserBackend, UserState};
use crate::modules::{
    connection_from_params, report_to_output, run_async, Module, ModuleContext, ModuleError,
    ModuleOutput, ModuleParams, ModuleResult, ParamExt, TargetState,
};
use crate::reconcile::{reconcile, Desired, ReconcileOptions};

const DEFAULT_MAX_BUCKETS: i64 = 1000;

/// User module configuration
#[derive(Debug, Clone)]
struct UserConfig {
    user_id: String,
    tenant: Option<String>,
    display_name: Option<String>,
    email: Option<String>,
    max_buckets: i64,
    suspended: Option<i64>,
    keys: Option<KeyPair>,
    admin_caps: Option<String>,
    state: TargetState,
}

/// Collapse empty parameter strings so "unset" and "" compare equal.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl UserConfig {
    fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let user_id = params.get_string_required("user_id")?;
        let state_str = params
            .get_string("state")?
            .unwrap_or_else(|| "present".to_string());
        let state = TargetState::from_str(&state_str)?;

        let access_key = non_empty(params.get_string("user_access_key")?);
        let secret_key = non_empty(params.get_string("user_secret_key")?);
        let keys = match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Some(KeyPair {
                access_key,
                secret_key,
            }),
            (None, None) => None,
            _ => {
                return Err(ModuleError::InvalidParameter(
                    "user_access_key and user_secret_key must be supplied together".to_string(),
                ))
            }
        };

        let suspended = params.get_i64("user_suspended")?;
        if let Some(flag) = suspended {
            if flag != 0 && flag != 1 {
                return Err(ModuleError::InvalidParameter(
                    "user_suspended must be 0 or 1".to_string(),
                ));
            }
        }

        Ok(Self {
            user_id,
            tenant: non_empty(params.get_string("user_tenant")?),
            display_name: non_empty(params.get_string("user_display_name")?),
            email: non_empty(params.get_string("user_email")?),
            max_buckets: params
                .get_i64("user_max_buckets")?
                .unwrap_or(DEFAULT_MAX_BUCKETS),
            suspended,
            keys,
            admin_caps: non_empty(params.get_string("admin_caps")?),
            state,
        })
    }

    /// Effective identifier, derived once and used for every backend call.
    fn uid(&self) -> String {
        effective_uid(self.tenant.as_deref(), &self.user_id)
    }

    fn desired_state(&self) -> UserState {
        UserState {
            user_id: self.user_id.clone(),
            tenant: self.tenant.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            max_buckets: Some(self.max_buckets),
            suspended: self.suspended,
            keys: self.keys.clone(),
            caps: self.admin_caps.clone(),
        }
    }
}

/// Module for gateway user account management
pub struct RgwUserModule;

impl RgwUserModule {
    async fn execute_async(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let config = UserConfig::from_params(params)?;
        let conn = connection_from_params(params)?;
        let uid = config.uid();

        let backend = UserBackend::new(&conn, uid.clone())
            .map_err(|e| ModuleError::ExecutionFailed(e.to_string()))?;

        let desired = match config.state {
            TargetState::Present => Desired::Present(config.desired_state()),
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

        // Unmanaged keys never enter the comparison, but the caller still
        // gets to see what the gateway holds.
        let observed_keys = if config.keys.is_none() {
            report
                .observed
                .as_ref()
                .and_then(|state| state.keys.clone())
        } else {
            None
        };

        let mut output = report_to_output("user", &uid, report);
        if let Some(keys) = observed_keys {
            if let Ok(value) = serde_json::to_value(&keys) {
                output = output.with_data("user_keys", value);
            }
        }
        Ok(output)
    }
}

impl Module for RgwUserModule {
    fn name(&self) -> &'static str {
        "rgw_user"
    }

    fn description(&self) -> &'static str {
        "Manage user accounts on a RADOS Gateway"
    }

    fn required_params(&self) -> &[&'static str] {
        &["user_id"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        UserConfig::from_params(params).map(|_| ())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        run_async(self.execute_async(params, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> ModuleParams {
        let mut params = ModuleParams::new();
        params.insert("user_id".to_string(), serde_json::json!("alice"));
        params
    }

    #[test]
    fn test_uid_with_tenant() {
        let mut params = base_params();
        params.insert("user_tenant".to_string(), serde_json::json!("t1"));

        let config = UserConfig::from_params(&params).unwrap();
        assert_eq!(config.uid(), "t1$alice");
    }

    #[test]
    fn test_uid_without_tenant() {
        let config = UserConfig::from_params(&base_params()).unwrap();
        assert_eq!(config.uid(), "alice");
    }

    #[test]
    fn test_credential_pair_required_together() {
        let mut params = base_params();
        params.insert("user_access_key".to_string(), serde_json::json!("AK1"));

        assert!(matches!(
            UserConfig::from_params(&params),
            Err(ModuleError::InvalidParameter(_))
        ));

        params.insert("user_secret_key".to_string(), serde_json::json!("SK1"));
        let config = UserConfig::from_params(&params).unwrap();
        assert_eq!(config.keys.as_ref().unwrap().access_key, "AK1");
    }

    #[test]
    fn test_suspended_flag_range() {
        let mut params = base_params();
        params.insert("user_suspended".to_string(), serde_json::json!(2));
        assert!(UserConfig::from_params(&params).is_err());

        params.insert("user_suspended".to_string(), serde_json::json!(1));
        let config = UserConfig::from_params(&params).unwrap();
        assert_eq!(config.suspended, Some(1));
    }

    #[test]
    fn test_empty_fields_normalized_away() {
        let mut params = base_params();
        params.insert("user_display_name".to_string(), serde_json::json!(""));
        params.insert("user_email".to_string(), serde_json::json!(""));
        params.insert("user_tenant".to_string(), serde_json::json!(""));

        let config = UserConfig::from_params(&params).unwrap();
        assert_eq!(config.display_name, None);
        assert_eq!(config.email, None);
        assert_eq!(config.tenant, None);

        let desired = config.desired_state();
        assert_eq!(desired.display_name, None);
        assert_eq!(desired.max_buckets, Some(DEFAULT_MAX_BUCKETS));
    }

    #[test]
    fn test_module_metadata() {
        let module = RgwUserModule;
        assert_eq!(module.name(), "rgw_user");
        assert_eq!(module.required_params(), &["user_id"]);
    }
}
