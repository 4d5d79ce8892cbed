//! Module system for rgwible.
//!
//! Modules are the declarative surface over the reconciliation engine: each
//! one validates its parameter map, builds the matching backend, runs a
//! reconciliation, and maps the report into a [`ModuleOutput`]. The registry
//! dispatches by module name, which is how task files address them.

pub mod rgw_bucket;
pub mod rgw_policy;
pub mod rgw_user;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::client::ConnectionInfo;
use crate::reconcile::ReconcileReport;

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Status of a module execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Module executed successfully and made (or would make) changes
    Changed,
    /// Module executed successfully but no changes were needed
    Ok,
    /// Module execution failed
    Failed,
    /// Module was skipped
    Skipped,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Changed => write!(f, "changed"),
            ModuleStatus::Ok => write!(f, "ok"),
            ModuleStatus::Failed => write!(f, "failed"),
            ModuleStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Represents a difference between current and desired state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diff {
    /// Rendered current state ("absent" when the resource does not exist)
    pub before: String,
    /// Rendered desired state
    pub after: String,
}

impl Diff {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }
}

/// Result of a module execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutput {
    /// Whether the resource differs from its desired state
    pub changed: bool,
    /// Human-readable message about what happened
    pub msg: String,
    /// Status of the execution
    pub status: ModuleStatus,
    /// Optional diff showing what changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
    /// Additional data returned by the module (echoed state, error messages)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
}

impl ModuleOutput {
    /// Create a new successful output with no changes
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: msg.into(),
            status: ModuleStatus::Ok,
            diff: None,
            data: HashMap::new(),
        }
    }

    /// Create a new successful output with changes
    pub fn changed(msg: impl Into<String>) -> Self {
        Self {
            changed: true,
            msg: msg.into(),
            status: ModuleStatus::Changed,
            diff: None,
            data: HashMap::new(),
        }
    }

    /// Create a failed output
    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: msg.into(),
            status: ModuleStatus::Failed,
            diff: None,
            data: HashMap::new(),
        }
    }

    /// Add a diff to the output
    pub fn with_diff(mut self, diff: Diff) -> Self {
        self.diff = Some(diff);
        self
    }

    /// Add data to the output
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Parameters passed to a module
pub type ModuleParams = HashMap<String, serde_json::Value>;

/// Context for module execution
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleContext {
    /// Whether to run in check mode (dry run)
    pub check_mode: bool,
    /// Whether to report diffs
    pub diff_mode: bool,
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_diff_mode(mut self, diff_mode: bool) -> Self {
        self.diff_mode = diff_mode;
        self
    }
}

/// Trait that all modules must implement
pub trait Module: Send + Sync {
    /// Returns the name of the module
    fn name(&self) -> &'static str;

    /// Returns a description of what the module does
    fn description(&self) -> &'static str;

    /// Execute the module with the given parameters
    fn execute(&self, params: &ModuleParams, context: &ModuleContext)
        -> ModuleResult<ModuleOutput>;

    /// Check what would change without making changes (for check mode)
    fn check(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        let check_context = ModuleContext {
            check_mode: true,
            ..*context
        };
        self.execute(params, &check_context)
    }

    /// Validate the parameters before execution
    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let _ = params;
        Ok(())
    }

    /// Returns the list of required parameters
    fn required_params(&self) -> &[&'static str] {
        &[]
    }
}

/// Desired end state shared by every resource module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Present,
    Absent,
}

impl TargetState {
    pub fn from_str(s: &str) -> ModuleResult<Self> {
        match s.to_lowercase().as_str() {
            "present" => Ok(TargetState::Present),
            "absent" => Ok(TargetState::Absent),
            _ => Err(ModuleError::InvalidParameter(format!(
                "Invalid state '{}'. Valid states: present, absent",
                s
            ))),
        }
    }
}

/// Helper trait for extracting parameters
pub trait ParamExt {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>>;
    fn get_string_required(&self, key: &str) -> ModuleResult<String>;
    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>>;
    fn get_bool_or(&self, key: &str, default: bool) -> bool;
    fn get_i64(&self, key: &str) -> ModuleResult<Option<i64>>;
    fn get_u16(&self, key: &str) -> ModuleResult<Option<u16>>;
}

impl ParamExt for ModuleParams {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>> {
        match self.get(key) {
            Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            Some(serde_json::Value::Null) => Ok(None),
            Some(v) => Ok(Some(v.to_string().trim_matches('"').to_string())),
            None => Ok(None),
        }
    }

    fn get_string_required(&self, key: &str) -> ModuleResult<String> {
        self.get_string(key)?
            .ok_or_else(|| ModuleError::MissingParameter(key.to_string()))
    }

    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>> {
        match self.get(key) {
            Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
            Some(serde_json::Value::String(s)) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Some(true)),
                "false" | "no" | "0" | "off" => Ok(Some(false)),
                _ => Err(ModuleError::InvalidParameter(format!(
                    "{} must be a boolean",
                    key
                ))),
            },
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be a boolean",
                key
            ))),
        }
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).ok().flatten().unwrap_or(default)
    }

    fn get_i64(&self, key: &str) -> ModuleResult<Option<i64>> {
        match self.get(key) {
            Some(serde_json::Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| {
                ModuleError::InvalidParameter(format!("{} must be an integer", key))
            }),
            Some(serde_json::Value::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|_| ModuleError::InvalidParameter(format!("{} must be an integer", key))),
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be an integer",
                key
            ))),
        }
    }

    fn get_u16(&self, key: &str) -> ModuleResult<Option<u16>> {
        match self.get_i64(key)? {
            Some(n) => u16::try_from(n).map(Some).map_err(|_| {
                ModuleError::InvalidParameter(format!("{} must be a port number", key))
            }),
            None => Ok(None),
        }
    }
}

/// Extract the shared connection parameter group.
///
/// `use_ssl`/`is_secure` and `verify`/`verify_ssl` are accepted as synonyms;
/// both default to true. Credentials are required and never logged.
pub fn connection_from_params(params: &ModuleParams) -> ModuleResult<ConnectionInfo> {
    let use_ssl = match params.get_bool("use_ssl")? {
        Some(v) => v,
        None => params.get_bool_or("is_secure", true),
    };
    let verify_ssl = match params.get_bool("verify")? {
        Some(v) => v,
        None => params.get_bool_or("verify_ssl", true),
    };

    Ok(ConnectionInfo {
        host: params.get_string_required("host")?,
        port: params.get_u16("port")?,
        use_ssl,
        verify_ssl,
        access_key: params.get_string_required("access_key")?,
        secret_key: params.get_string_required("secret_key")?,
        region: params.get_string("region")?,
    })
}

/// Run an async reconciliation from a synchronous module entry point.
///
/// Reuses the ambient tokio runtime when there is one (driving the future on
/// a scoped thread so the executor is not blocked from within), and spins up
/// a fresh runtime otherwise.
pub(crate) fn run_async<F, T>(f: F) -> ModuleResult<T>
where
    F: std::future::Future<Output = ModuleResult<T>> + Send,
    T: Send,
{
    if let Ok(handle) = Handle::try_current() {
        std::thread::scope(|s| {
            s.spawn(|| handle.block_on(f))
                .join()
                .expect("Thread panicked")
        })
    } else {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| ModuleError::ExecutionFailed(format!("Failed to create runtime: {}", e)))?;
        rt.block_on(f)
    }
}

/// Map a reconciliation report into the module output contract.
///
/// `changed` always reflects the computed difference, even when apply calls
/// failed; the error messages ride along in `data` and decide the status.
pub(crate) fn report_to_output<S: Serialize>(
    resource: &str,
    id: &str,
    report: ReconcileReport<S>,
) -> ModuleOutput {
    let mut output = if report.failed() {
        let mut failed = ModuleOutput::failed(report.error_messages.join("; "));
        failed.changed = report.changed;
        failed
    } else if report.changed {
        ModuleOutput::changed(format!("{} '{}' reconciled", resource, id))
    } else {
        ModuleOutput::ok(format!("{} '{}' already in desired state", resource, id))
    };

    if !report.error_messages.is_empty() {
        output = output.with_data("error_messages", serde_json::json!(report.error_messages));
    }

    if let Some(diff) = report.diff {
        let render = |state: &Option<S>| match state {
            Some(s) => serde_json::to_string_pretty(s).unwrap_or_else(|_| "<unrenderable>".into()),
            None => "absent".to_string(),
        };
        output = output.with_diff(Diff::new(render(&diff.before), render(&diff.after)));
    }

    if let Some(state) = report.state {
        if let Ok(value) = serde_json::to_value(&state) {
            output = output.with_data("state", value);
        }
    }

    output
}

/// Registry for looking up modules by name
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Create a registry with all built-in modules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(rgw_bucket::RgwBucketModule));
        registry.register(Arc::new(rgw_policy::RgwPolicyModule));
        registry.register(Arc::new(rgw_user::RgwUserModule));
        registry
    }

    /// Register a module
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Get a module by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Check if a module exists
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Get all module names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Execute a module by name
    pub fn execute(
        &self,
        name: &str,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let module = self
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;

        module.validate_params(params)?;

        for param in module.required_params() {
            if !params.contains_key(*param) {
                return Err(ModuleError::MissingParameter((*param).to_string()));
            }
        }

        if context.check_mode {
            module.check(params, context)
        } else {
            module.execute(params, context)
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
