//! JSON envelope written to stdout and the exit code that goes with it.

use std::io::{self, Write};

use obscura::error::Hint;
use obscura::{Error, ErrorCode, Result};
use serde::Serialize;

/// `{"success": true, "data": ...}` or `{"success": false, "error": ...}`.
#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
}

impl From<&Error> for CliError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
            details: err.details.clone(),
            hints: err.hints.clone(),
        }
    }
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError::from(err)),
        }
    }
}

fn emit<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    let payload = serde_json::to_string_pretty(response).map_err(|e| {
        Error::internal_json(e.to_string(), Some("serialize response".to_string()))
    })?;

    match writeln!(io::stdout().lock(), "{}", payload) {
        Ok(()) => Ok(()),
        // Downstream pipe closed (`obscura ... | head`).
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(Error::internal_io(e.to_string(), Some("write stdout".to_string()))),
    }
}

/// Serialize a command's output, or pick the exit code for its error.
pub fn map_cmd_result_to_json<T: Serialize>(
    result: Result<(T, i32)>,
) -> (Result<serde_json::Value>, i32) {
    let (data, exit_code) = match result {
        Ok(ok) => ok,
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            return (Err(err), exit_code);
        }
    };

    match serde_json::to_value(data) {
        Ok(value) => (Ok(value), exit_code),
        Err(e) => (
            Err(Error::internal_json(e.to_string(), Some("serialize response".to_string()))),
            1,
        ),
    }
}

/// Exit code per error family. Precondition failures (nothing was touched)
/// are distinct from failures during mutation.
pub fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationMissingArgument
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::ProjectNotFound => 4,

        ErrorCode::DiscoveryNoDeclarations
        | ErrorCode::DiscoveryNoReferences
        | ErrorCode::IndexerFailed => 10,

        ErrorCode::NameGenerationExhausted
        | ErrorCode::MapConflict
        | ErrorCode::MapInvalidFormat => 11,

        ErrorCode::RunCancelled => 12,

        ErrorCode::RewriteIoFailure | ErrorCode::ManifestPatchFailure => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

pub fn print_json_result(result: Result<serde_json::Value>) -> Result<()> {
    match result {
        Ok(data) => emit(&CliResponse::success(data)),
        Err(err) => emit(&CliResponse::from_error(&err)),
    }
}
