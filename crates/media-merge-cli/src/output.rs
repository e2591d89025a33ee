use clap::ValueEnum;
use owo_colors::OwoColorize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Success,
    Info,
    Warning,
    Error,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

/// Status lines and results for the merge and config commands
pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        self.emit(Level::Success, msg.as_ref());
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.emit(Level::Info, msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.emit(Level::Warning, msg.as_ref());
    }

    /// Shown even in quiet mode
    pub fn error(&self, msg: impl AsRef<str>) {
        self.emit(Level::Error, msg.as_ref());
    }

    /// Structured result; suppressed only for quiet machine output
    pub fn json(&self, data: &serde_json::Value) {
        if self.quiet && self.format != OutputFormat::Human {
            return;
        }
        self.print_json(data);
    }

    fn shows(&self, level: Level) -> bool {
        !self.quiet || level == Level::Error
    }

    fn emit(&self, level: Level, msg: &str) {
        if !self.shows(level) {
            return;
        }
        match self.format {
            OutputFormat::Human => match level {
                Level::Success => println!("{} {}", "✓".green(), msg),
                Level::Info => println!("{}", msg),
                Level::Warning => println!("{} {}", "⚠".yellow(), msg),
                Level::Error => eprintln!("{} {}", "✗".red(), msg),
            },
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({ "type": level.label(), "message": msg }));
            }
        }
    }

    fn print_json(&self, data: &serde_json::Value) {
        let rendered = match self.format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(data),
            OutputFormat::Json | OutputFormat::Human => serde_json::to_string(data),
        };
        println!("{}", rendered.unwrap_or_default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_keeps_only_errors() {
        let quiet = Output::new(OutputFormat::Human, true);
        assert!(quiet.shows(Level::Error));
        assert!(!quiet.shows(Level::Success));
        assert!(!quiet.shows(Level::Info));
        assert!(!quiet.shows(Level::Warning));

        let loud = Output::new(OutputFormat::Json, false);
        assert!(loud.shows(Level::Info));
        assert!(!loud.is_quiet());
        assert_eq!(loud.format(), OutputFormat::Json);
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(Level::Success.label(), "success");
        assert_eq!(Level::Warning.label(), "warning");
        assert_eq!(Level::Error.label(), "error");
    }
}
