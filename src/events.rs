//! Application event space for a modular terminal
//!
//! The prompt, output pane, directory tree, status bar and completion list
//! talk to each other only through these events. Each variant carries a
//! stable string id so handlers and trace logs can name it.

use crate::types::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Severity of a [`AppEvent::LogMessage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Which stream of a running command produced a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// UI module that can hold keyboard focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusTarget {
    Prompt,
    Output,
    DirTree,
    Completion,
}

/// Root event enum for the terminal application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "id", content = "payload")]
pub enum AppEvent {
    /// The shell's working directory changed
    WorkDirChange { path: PathBuf },

    /// Text destined for the output pane
    OutputMessage { text: String },

    /// Diagnostic message; collaborator failures travel as these
    LogMessage { level: LogLevel, text: String },

    /// A shell command was launched
    CommandStarted { command: String },

    /// One line streamed by a running command
    CommandOutput { line: String, stream: OutputStream },

    /// A shell command exited
    CommandFinished {
        command: String,
        exit_code: Option<i32>,
    },

    /// The user submitted the prompt line
    PromptSubmit { line: String },

    /// The prompt text or cursor moved
    PromptChange { line: String, cursor: usize },

    /// Completions were requested for the prompt line
    CompletionRequest { line: String, cursor: usize },

    /// Completion candidates are available
    CompletionResult { candidates: Vec<String> },

    /// A line was appended to command history
    HistoryAppend { line: String },

    /// The directory tree should be rebuilt from `root`
    DirTreeRefresh { root: PathBuf },

    /// Keyboard focus moved to another module
    FocusChange { target: FocusTarget },

    /// The application is shutting down
    Quit,
}

impl AppEvent {
    /// Stable id of each variant
    pub const WORK_DIR_CHANGE: &'static str = "work_dir_change";
    pub const OUTPUT_MESSAGE: &'static str = "output_message";
    pub const LOG_MESSAGE: &'static str = "log_message";
    pub const COMMAND_STARTED: &'static str = "command_started";
    pub const COMMAND_OUTPUT: &'static str = "command_output";
    pub const COMMAND_FINISHED: &'static str = "command_finished";
    pub const PROMPT_SUBMIT: &'static str = "prompt_submit";
    pub const PROMPT_CHANGE: &'static str = "prompt_change";
    pub const COMPLETION_REQUEST: &'static str = "completion_request";
    pub const COMPLETION_RESULT: &'static str = "completion_result";
    pub const HISTORY_APPEND: &'static str = "history_append";
    pub const DIR_TREE_REFRESH: &'static str = "dir_tree_refresh";
    pub const FOCUS_CHANGE: &'static str = "focus_change";
    pub const QUIT: &'static str = "quit";

    /// Build a log event
    pub fn log(level: LogLevel, text: impl Into<String>) -> Self {
        AppEvent::LogMessage {
            level,
            text: text.into(),
        }
    }

    /// Turn a collaborator failure into an error-level log event
    pub fn error(err: impl fmt::Display) -> Self {
        AppEvent::log(LogLevel::Error, err.to_string())
    }

    /// Build an output pane event
    pub fn output(text: impl Into<String>) -> Self {
        AppEvent::OutputMessage { text: text.into() }
    }

    /// Build a working-directory change event
    pub fn work_dir(path: impl Into<PathBuf>) -> Self {
        AppEvent::WorkDirChange { path: path.into() }
    }

    /// True for error-level log messages
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            AppEvent::LogMessage {
                level: LogLevel::Error,
                ..
            }
        )
    }

    /// Short human-readable description for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::WorkDirChange { path } => format!("cd {}", path.display()),
            AppEvent::OutputMessage { text } => format!("output ({} bytes)", text.len()),
            AppEvent::LogMessage { level, text } => format!("[{}] {}", level, text),
            AppEvent::CommandStarted { command } => format!("started: {}", command),
            AppEvent::CommandOutput { stream, line } => {
                format!("{:?} line ({} bytes)", stream, line.len())
            }
            AppEvent::CommandFinished { command, exit_code } => match exit_code {
                Some(code) => format!("finished: {} (exit {})", command, code),
                None => format!("finished: {} (killed)", command),
            },
            AppEvent::PromptSubmit { line } => format!("submit: {}", line),
            AppEvent::PromptChange { cursor, .. } => format!("prompt edit at {}", cursor),
            AppEvent::CompletionRequest { cursor, .. } => {
                format!("complete at {}", cursor)
            }
            AppEvent::CompletionResult { candidates } => {
                format!("{} completion candidates", candidates.len())
            }
            AppEvent::HistoryAppend { line } => format!("history += {}", line),
            AppEvent::DirTreeRefresh { root } => format!("refresh tree {}", root.display()),
            AppEvent::FocusChange { target } => format!("focus {:?}", target),
            AppEvent::Quit => "quit".to_string(),
        }
    }
}

impl Message for AppEvent {
    fn id(&self) -> &str {
        match self {
            AppEvent::WorkDirChange { .. } => Self::WORK_DIR_CHANGE,
            AppEvent::OutputMessage { .. } => Self::OUTPUT_MESSAGE,
            AppEvent::LogMessage { .. } => Self::LOG_MESSAGE,
            AppEvent::CommandStarted { .. } => Self::COMMAND_STARTED,
            AppEvent::CommandOutput { .. } => Self::COMMAND_OUTPUT,
            AppEvent::CommandFinished { .. } => Self::COMMAND_FINISHED,
            AppEvent::PromptSubmit { .. } => Self::PROMPT_SUBMIT,
            AppEvent::PromptChange { .. } => Self::PROMPT_CHANGE,
            AppEvent::CompletionRequest { .. } => Self::COMPLETION_REQUEST,
            AppEvent::CompletionResult { .. } => Self::COMPLETION_RESULT,
            AppEvent::HistoryAppend { .. } => Self::HISTORY_APPEND,
            AppEvent::DirTreeRefresh { .. } => Self::DIR_TREE_REFRESH,
            AppEvent::FocusChange { .. } => Self::FOCUS_CHANGE,
            AppEvent::Quit => Self::QUIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_snake_case() {
        let events = vec![
            AppEvent::work_dir("/tmp"),
            AppEvent::output("hi"),
            AppEvent::log(LogLevel::Info, "ready"),
            AppEvent::CommandFinished {
                command: "ls".to_string(),
                exit_code: Some(0),
            },
            AppEvent::FocusChange {
                target: FocusTarget::DirTree,
            },
            AppEvent::Quit,
        ];
        let ids: Vec<&str> = events.iter().map(|e| e.id()).collect();
        assert_eq!(
            ids,
            vec![
                "work_dir_change",
                "output_message",
                "log_message",
                "command_finished",
                "focus_change",
                "quit"
            ]
        );
    }

    #[test]
    fn test_error_helper() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "history locked");
        let event = AppEvent::error(io);
        assert!(event.is_error());
        assert_eq!(event.id(), AppEvent::LOG_MESSAGE);
        assert!(event.description().contains("history locked"));
        assert!(!AppEvent::log(LogLevel::Warn, "slow").is_error());
    }

    #[test]
    fn test_serialization_is_tagged() {
        let event = AppEvent::CommandOutput {
            line: "total 0".to_string(),
            stream: OutputStream::Stdout,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], event.id());
        assert_eq!(json["payload"]["stream"], "stdout");

        let back: AppEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_description() {
        let event = AppEvent::CommandFinished {
            command: "sleep 10".to_string(),
            exit_code: None,
        };
        assert_eq!(event.description(), "finished: sleep 10 (killed)");
        assert_eq!(AppEvent::work_dir("/srv").description(), "cd /srv");
    }
}
