use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    ProjectNotFound,

    DiscoveryNoDeclarations,
    DiscoveryNoReferences,
    IndexerFailed,

    NameGenerationExhausted,

    MapConflict,
    MapInvalidFormat,

    RewriteIoFailure,
    ManifestPatchFailure,

    RunCancelled,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::ProjectNotFound => "project.not_found",

            ErrorCode::DiscoveryNoDeclarations => "discovery.no_declarations",
            ErrorCode::DiscoveryNoReferences => "discovery.no_references",
            ErrorCode::IndexerFailed => "indexer.failed",

            ErrorCode::NameGenerationExhausted => "names.generation_exhausted",

            ErrorCode::MapConflict => "map.conflict",
            ErrorCode::MapInvalidFormat => "map.invalid_format",

            ErrorCode::RewriteIoFailure => "rewrite.io_failure",
            ErrorCode::ManifestPatchFailure => "rewrite.manifest_patch_failure",

            ErrorCode::RunCancelled => "run.cancelled",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

const PARTIAL_RENAME_HINT: &str =
    "The project may be partially renamed; restore it from version control before re-running";

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoDeclarationsDetails {
    pub strategy: String,
    pub modules_scanned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoReferencesDetails {
    pub symbols_queried: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationExhaustedDetails {
    pub length: usize,
    pub excluded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConflictDetails {
    pub obfuscated: String,
    pub originals: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapInvalidFormatDetails {
    pub line: usize,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteFailureDetails {
    pub file: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerFailedDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usr: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
    ) -> Self {
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            to_details(InvalidArgumentDetails {
                field: field.into(),
                problem: problem.into(),
                id,
            }),
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            to_details(ConfigInvalidJsonDetails {
                path: path.into(),
                error: err.to_string(),
            }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            to_details(ConfigInvalidValueDetails {
                key: key.into(),
                value,
                problem: problem.into(),
            }),
        )
    }

    pub fn project_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ProjectNotFound,
            format!("Project not found at '{}'", path),
            serde_json::json!({ "path": path }),
        )
        .with_hint("Pass --root with the directory that contains the .xcodeproj")
    }

    pub fn no_declarations_found(
        strategy: impl Into<String>,
        modules_scanned: usize,
        tag: Option<String>,
    ) -> Self {
        let hint = match &tag {
            Some(tag) => format!("Mark identifiers for renaming by ending them with '{}'", tag),
            None => "Check that the index snapshot covers the project's modules".to_string(),
        };
        Self::new(
            ErrorCode::DiscoveryNoDeclarations,
            "No declarations found to obfuscate",
            to_details(NoDeclarationsDetails {
                strategy: strategy.into(),
                modules_scanned,
                tag,
            }),
        )
        .with_hint(hint)
    }

    pub fn no_references_found(symbols_queried: usize) -> Self {
        Self::new(
            ErrorCode::DiscoveryNoReferences,
            "No references found for any indexed declaration",
            to_details(NoReferencesDetails { symbols_queried }),
        )
    }

    pub fn indexer_failed(
        error: impl Into<String>,
        module: Option<String>,
        usr: Option<String>,
    ) -> Self {
        Self::new(
            ErrorCode::IndexerFailed,
            "Indexer request failed",
            to_details(IndexerFailedDetails {
                error: error.into(),
                module,
                usr,
            }),
        )
    }

    pub fn generation_exhausted(length: usize, excluded: usize, symbol: Option<String>) -> Self {
        Self::new(
            ErrorCode::NameGenerationExhausted,
            format!(
                "Cannot generate a unique {}-character name: {} names already issued",
                length, excluded
            ),
            to_details(GenerationExhaustedDetails {
                length,
                excluded,
                symbol,
            }),
        )
        .with_hint("Increase --character-count")
    }

    pub fn map_conflict(obfuscated: impl Into<String>, mut originals: Vec<String>) -> Self {
        originals.sort();
        let obfuscated = obfuscated.into();
        Self::new(
            ErrorCode::MapConflict,
            format!(
                "Obfuscated name '{}' would be shared by {}",
                obfuscated,
                originals.join(", ")
            ),
            to_details(MapConflictDetails {
                obfuscated,
                originals,
            }),
        )
    }

    pub fn map_invalid_format(
        line: usize,
        content: impl Into<String>,
        path: Option<String>,
    ) -> Self {
        Self::new(
            ErrorCode::MapInvalidFormat,
            format!("Malformed map entry at line {}", line),
            to_details(MapInvalidFormatDetails {
                line,
                content: content.into(),
                path,
            }),
        )
    }

    pub fn rewrite_io(
        file: impl Into<String>,
        error: impl Into<String>,
        symbol: Option<String>,
    ) -> Self {
        Self::new(
            ErrorCode::RewriteIoFailure,
            "Failed to rewrite file",
            to_details(RewriteFailureDetails {
                file: file.into(),
                error: error.into(),
                symbol,
            }),
        )
        .with_hint(PARTIAL_RENAME_HINT)
    }

    pub fn manifest_patch(
        file: impl Into<String>,
        error: impl Into<String>,
        symbol: Option<String>,
    ) -> Self {
        Self::new(
            ErrorCode::ManifestPatchFailure,
            "Failed to patch project manifest",
            to_details(RewriteFailureDetails {
                file: file.into(),
                error: error.into(),
                symbol,
            }),
        )
        .with_hint(PARTIAL_RENAME_HINT)
    }

    pub fn run_cancelled(stage: impl Into<String>) -> Self {
        let stage = stage.into();
        Self::new(
            ErrorCode::RunCancelled,
            format!("Run cancelled during {}", stage),
            serde_json::json!({ "stage": stage }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalJsonErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// True for errors raised before any file was touched.
    pub fn is_precondition(&self) -> bool {
        !matches!(
            self.code,
            ErrorCode::RewriteIoFailure | ErrorCode::ManifestPatchFailure
        )
    }
}
