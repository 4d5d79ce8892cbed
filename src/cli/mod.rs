//! CLI module for rgwible
//!
//! Argument parsing and the mapping from parsed arguments to module
//! parameter maps. Connection flags fall back to `RGWIBLE_*` environment
//! variables, then to the config file's `[connection]` defaults.

pub mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::ConnectionDefaults;
use rgwible::modules::ModuleParams;

/// rgwible - Declarative state management for Ceph RADOS Gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "rgwible")]
#[command(version)]
#[command(about = "Declarative state management for Ceph RADOS Gateway", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Compute and report changes without applying them (dry run)
    #[arg(long = "check", global = true)]
    pub check_mode: bool,

    /// Report before/after state for each resource
    #[arg(long = "diff", global = true)]
    pub diff_mode: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "RGWIBLE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Reconcile an S3 bucket
    Bucket(BucketArgs),

    /// Reconcile an IAM-style policy
    Policy(PolicyArgs),

    /// Reconcile a gateway user account
    User(UserArgs),

    /// Run a YAML task file through the module registry
    Apply(ApplyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Connection parameter group shared by every resource subcommand
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Gateway host
    #[arg(long, env = "RGWIBLE_HOST")]
    pub host: Option<String>,

    /// Gateway port
    #[arg(long, env = "RGWIBLE_PORT")]
    pub port: Option<u16>,

    /// Admin access key
    #[arg(long, env = "RGWIBLE_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Admin secret key
    #[arg(long, env = "RGWIBLE_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Signing/SDK region
    #[arg(long, env = "RGWIBLE_REGION")]
    pub region: Option<String>,

    /// Connect over plain HTTP instead of HTTPS
    #[arg(long)]
    pub no_ssl: bool,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub no_verify: bool,
}

impl ConnectionArgs {
    /// Connection parameters with config-file defaults filling the gaps.
    pub fn to_params(&self, defaults: &ConnectionDefaults) -> ModuleParams {
        let mut params = ModuleParams::new();

        if let Some(host) = self.host.clone().or_else(|| defaults.host.clone()) {
            params.insert("host".to_string(), serde_json::json!(host));
        }
        if let Some(port) = self.port.or(defaults.port) {
            params.insert("port".to_string(), serde_json::json!(port));
        }
        if let Some(key) = self.access_key.clone().or_else(|| defaults.access_key.clone()) {
            params.insert("access_key".to_string(), serde_json::json!(key));
        }
        if let Some(key) = self.secret_key.clone().or_else(|| defaults.secret_key.clone()) {
            params.insert("secret_key".to_string(), serde_json::json!(key));
        }
        if let Some(region) = self.region.clone().or_else(|| defaults.region.clone()) {
            params.insert("region".to_string(), serde_json::json!(region));
        }

        let use_ssl = if self.no_ssl {
            false
        } else {
            defaults.use_ssl.unwrap_or(true)
        };
        let verify = if self.no_verify {
            false
        } else {
            defaults.verify.unwrap_or(true)
        };
        params.insert("use_ssl".to_string(), serde_json::json!(use_ssl));
        params.insert("verify".to_string(), serde_json::json!(verify));

        params
    }
}

/// Arguments for the bucket subcommand
#[derive(Args, Debug, Clone)]
pub struct BucketArgs {
    /// Bucket name
    #[arg(long = "name")]
    pub bucket_name: String,

    /// Desired state (present, absent)
    #[arg(long, default_value = "present")]
    pub state: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl BucketArgs {
    pub fn to_params(&self, defaults: &ConnectionDefaults) -> ModuleParams {
        let mut params = self.connection.to_params(defaults);
        params.insert(
            "bucket_name".to_string(),
            serde_json::json!(self.bucket_name),
        );
        params.insert("state".to_string(), serde_json::json!(self.state));
        params
    }
}

/// Arguments for the policy subcommand
#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Policy name
    #[arg(long = "name")]
    pub policy_name: Option<String>,

    /// JSON policy document
    #[arg(long = "document")]
    pub policy_document: Option<String>,

    /// Policy ARN (addresses the policy for state=absent)
    #[arg(long = "arn")]
    pub policy_arn: Option<String>,

    /// Desired state (present, absent)
    #[arg(long, default_value = "present")]
    pub state: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl PolicyArgs {
    pub fn to_params(&self, defaults: &ConnectionDefaults) -> ModuleParams {
        let mut params = self.connection.to_params(defaults);
        if let Some(name) = &self.policy_name {
            params.insert("policy_name".to_string(), serde_json::json!(name));
        }
        if let Some(document) = &self.policy_document {
            params.insert("policy_document".to_string(), serde_json::json!(document));
        }
        if let Some(arn) = &self.policy_arn {
            params.insert("policy_arn".to_string(), serde_json::json!(arn));
        }
        params.insert("state".to_string(), serde_json::json!(self.state));
        params
    }
}

/// Arguments for the user subcommand
#[derive(Args, Debug, Clone)]
pub struct UserArgs {
    /// User id
    #[arg(long = "user-id")]
    pub user_id: String,

    /// Tenant the user belongs to (effective id becomes tenant$user_id)
    #[arg(long = "tenant")]
    pub user_tenant: Option<String>,

    /// Display name
    #[arg(long = "display-name")]
    pub user_display_name: Option<String>,

    /// Email address
    #[arg(long = "email")]
    pub user_email: Option<String>,

    /// Bucket quota
    #[arg(long = "max-buckets")]
    pub user_max_buckets: Option<i64>,

    /// Suspension flag (0 or 1)
    #[arg(long = "suspended")]
    pub user_suspended: Option<i64>,

    /// Explicit access key for the user (requires --user-secret-key)
    #[arg(long = "user-access-key")]
    pub user_access_key: Option<String>,

    /// Explicit secret key for the user (requires --user-access-key)
    #[arg(long = "user-secret-key")]
    pub user_secret_key: Option<String>,

    /// Admin capability string, e.g. "users=read;buckets=*"
    #[arg(long = "admin-caps")]
    pub admin_caps: Option<String>,

    /// Desired state (present, absent)
    #[arg(long, default_value = "present")]
    pub state: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl UserArgs {
    pub fn to_params(&self, defaults: &ConnectionDefaults) -> ModuleParams {
        let mut params = self.connection.to_params(defaults);
        params.insert("user_id".to_string(), serde_json::json!(self.user_id));
        params.insert("state".to_string(), serde_json::json!(self.state));

        let optional_strings = [
            ("user_tenant", &self.user_tenant),
            ("user_display_name", &self.user_display_name),
            ("user_email", &self.user_email),
            ("user_access_key", &self.user_access_key),
            ("user_secret_key", &self.user_secret_key),
            ("admin_caps", &self.admin_caps),
        ];
        for (key, value) in optional_strings {
            if let Some(value) = value {
                params.insert(key.to_string(), serde_json::json!(value));
            }
        }
        if let Some(max_buckets) = self.user_max_buckets {
            params.insert(
                "user_max_buckets".to_string(),
                serde_json::json!(max_buckets),
            );
        }
        if let Some(suspended) = self.user_suspended {
            params.insert("user_suspended".to_string(), serde_json::json!(suspended));
        }
        params
    }
}

/// Arguments for the apply subcommand
#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Path to the YAML task file
    pub file: PathBuf,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_connection() -> ConnectionArgs {
        ConnectionArgs {
            host: None,
            port: None,
            access_key: None,
            secret_key: None,
            region: None,
            no_ssl: false,
            no_verify: false,
        }
    }

    #[test]
    fn test_connection_defaults_fill_gaps() {
        let mut args = bare_connection();
        args.host = Some("flag.host".to_string());

        let defaults = ConnectionDefaults {
            host: Some("file.host".to_string()),
            port: Some(8000),
            use_ssl: Some(false),
            ..Default::default()
        };

        let params = args.to_params(&defaults);
        assert_eq!(params.get("host"), Some(&serde_json::json!("flag.host")));
        assert_eq!(params.get("port"), Some(&serde_json::json!(8000)));
        assert_eq!(params.get("use_ssl"), Some(&serde_json::json!(false)));
        assert_eq!(params.get("verify"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_no_ssl_flag_wins_over_defaults() {
        let mut args = bare_connection();
        args.no_ssl = true;

        let defaults = ConnectionDefaults {
            use_ssl: Some(true),
            ..Default::default()
        };

        let params = args.to_params(&defaults);
        assert_eq!(params.get("use_ssl"), Some(&serde_json::json!(false)));
    }

    #[test]
    fn test_user_args_to_params() {
        let args = UserArgs {
            user_id: "alice".to_string(),
            user_tenant: Some("t1".to_string()),
            user_display_name: None,
            user_email: None,
            user_max_buckets: Some(500),
            user_suspended: None,
            user_access_key: None,
            user_secret_key: None,
            admin_caps: None,
            state: "present".to_string(),
            connection: bare_connection(),
        };

        let params = args.to_params(&ConnectionDefaults::default());
        assert_eq!(params.get("user_id"), Some(&serde_json::json!("alice")));
        assert_eq!(params.get("user_tenant"), Some(&serde_json::json!("t1")));
        assert_eq!(
            params.get("user_max_buckets"),
            Some(&serde_json::json!(500))
        );
        assert!(!params.contains_key("user_email"));
    }
}
