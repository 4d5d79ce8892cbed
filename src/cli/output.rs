//! Output formatting for rgwible
//!
//! Renders module results as colored status lines (the default) or as JSON
//! for scripting. Respects the NO_COLOR convention.

use colored::Colorize;

use rgwible::modules::{ModuleOutput, ModuleStatus};

/// Output formatter for different output modes
pub struct OutputFormatter {
    use_color: bool,
    json_mode: bool,
    verbosity: u8,
}

impl OutputFormatter {
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        if !use_color {
            colored::control::set_override(false);
        }

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    fn status_string(&self, status: ModuleStatus) -> String {
        if !self.use_color {
            return status.to_string();
        }
        match status {
            ModuleStatus::Ok => "ok".green().to_string(),
            ModuleStatus::Changed => "changed".yellow().to_string(),
            ModuleStatus::Failed => "failed".red().bold().to_string(),
            ModuleStatus::Skipped => "skipped".cyan().to_string(),
        }
    }

    /// Render one module result.
    pub fn module_result(&self, label: &str, output: &ModuleOutput) {
        if self.json_mode {
            match serde_json::to_string_pretty(output) {
                Ok(rendered) => println!("{}", rendered),
                Err(e) => eprintln!("failed to render output: {}", e),
            }
            return;
        }

        println!(
            "{}: [{}] {}",
            self.status_string(output.status),
            label,
            output.msg
        );

        if let Some(diff) = &output.diff {
            println!("--- before");
            println!("{}", diff.before);
            println!("+++ after");
            println!("{}", diff.after);
        }

        if self.verbosity >= 1 && !output.data.is_empty() {
            if let Ok(rendered) = serde_json::to_string_pretty(&output.data) {
                println!("{}", rendered);
            }
        }
    }

    /// Render a fatal error.
    pub fn error(&self, message: &str) {
        if self.json_mode {
            eprintln!(
                "{}",
                serde_json::json!({ "failed": true, "msg": message })
            );
        } else if self.use_color {
            eprintln!("{}: {}", "error".red().bold(), message);
        } else {
            eprintln!("error: {}", message);
        }
    }

    /// Summary line after a task-file run.
    pub fn recap(&self, ok: usize, changed: usize, failed: usize) {
        if self.json_mode {
            return;
        }
        println!();
        println!("recap: ok={} changed={} failed={}", ok, changed, failed);
    }
}
