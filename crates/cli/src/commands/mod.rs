pub mod doctor;
pub mod migrate;

use serde::Serialize;

/// Process exit codes. Failure classes map onto these through [`ErrorClass::exit_code`].
pub mod exit {
    pub const OK: u8 = 0;
    pub const CHECK_FAILED: u8 = 1;
    pub const CONFIG: u8 = 2;
    pub const RUNTIME: u8 = 3;
    pub const DB_CONNECTIVITY: u8 = 4;
    pub const MIGRATION: u8 = 5;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    ConfigValidation,
    RuntimeInit,
    DbConnectivity,
    Migration,
}

impl ErrorClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => exit::CONFIG,
            Self::RuntimeInit => exit::RUNTIME,
            Self::DbConnectivity => exit::DB_CONNECTIVITY,
            Self::Migration => exit::MIGRATION,
        }
    }
}

/// Rendered output plus the code the process exits with.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct StatusLine<'a> {
    command: &'a str,
    status: &'static str,
    error_class: Option<ErrorClass>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let line = StatusLine { command, status: "ok", error_class: None, message: message.into() };
        Self { exit_code: exit::OK, output: render(&line) }
    }

    pub fn failure(command: &str, class: ErrorClass, message: impl Into<String>) -> Self {
        let line =
            StatusLine { command, status: "error", error_class: Some(class), message: message.into() };
        Self { exit_code: class.exit_code(), output: render(&line) }
    }
}

fn render(line: &StatusLine<'_>) -> String {
    serde_json::to_string(line).unwrap_or_else(|error| {
        serde_json::json!({
            "command": line.command,
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}

pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}
