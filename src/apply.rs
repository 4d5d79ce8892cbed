//! Task-file runner.
//!
//! A task file is a YAML list of module invocations, executed strictly in
//! order through the registry:
//!
//! ```yaml
//! - name: Ensure the upload bucket exists
//!   module: rgw_bucket
//!   params:
//!     bucket_name: uploads
//!
//! - name: Ensure alice exists
//!   module: rgw_user
//!   params:
//!     user_id: alice
//!     user_display_name: Alice
//! ```
//!
//! Connection defaults (from the CLI or config file) fill parameter gaps in
//! each task; a task's own params always win.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::modules::{ModuleContext, ModuleOutput, ModuleParams, ModuleRegistry, ModuleResult};

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Failed to read task file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse task file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// One entry of a task file.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDef {
    #[serde(default)]
    pub name: Option<String>,
    pub module: String,
    #[serde(default)]
    pub params: ModuleParams,
}

impl TaskDef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.module)
    }
}

/// Result of one executed task.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: TaskDef,
    pub result: ModuleResult<ModuleOutput>,
}

/// Load a task file from disk.
pub fn load_tasks(path: &Path) -> Result<Vec<TaskDef>, ApplyError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Execute tasks in order. A failed task does not stop the run; every
/// outcome is reported and the caller decides the overall verdict.
pub fn run_tasks(
    registry: &ModuleRegistry,
    tasks: Vec<TaskDef>,
    context: &ModuleContext,
    defaults: &ModuleParams,
) -> Vec<TaskOutcome> {
    tasks
        .into_iter()
        .map(|task| {
            let mut params = task.params.clone();
            for (key, value) in defaults {
                params
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
            let result = registry.execute(&task.module, &params, context);
            TaskOutcome { task, result }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_file() {
        let yaml = r#"
- name: Ensure the upload bucket exists
  module: rgw_bucket
  params:
    bucket_name: uploads
    state: present

- module: rgw_user
  params:
    user_id: alice
"#;
        let tasks: Vec<TaskDef> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].display_name(), "Ensure the upload bucket exists");
        assert_eq!(tasks[1].display_name(), "rgw_user");
        assert_eq!(
            tasks[0].params.get("bucket_name"),
            Some(&serde_json::json!("uploads"))
        );
    }

    #[test]
    fn test_defaults_do_not_override_task_params() {
        let registry = ModuleRegistry::new();
        let mut defaults = ModuleParams::new();
        defaults.insert("host".to_string(), serde_json::json!("default.host"));

        let tasks = vec![TaskDef {
            name: None,
            module: "missing_module".to_string(),
            params: {
                let mut p = ModuleParams::new();
                p.insert("host".to_string(), serde_json::json!("task.host"));
                p
            },
        }];

        let outcomes = run_tasks(&registry, tasks, &ModuleContext::default(), &defaults);
        assert_eq!(outcomes.len(), 1);
        // Unknown module surfaces as an error outcome rather than a panic.
        assert!(outcomes[0].result.is_err());
        assert_eq!(
            outcomes[0].task.params.get("host"),
            Some(&serde_json::json!("task.host"))
        );
    }
}
