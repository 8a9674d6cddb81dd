//! The module stdout envelope.

use serde::Deserialize;

/// What a module prints on stdout: `{"success": bool, "data": any, "errors": [string]}`.
///
/// `success` is mandatory; `data` and `errors` default to `null` and `[]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleOutput {
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Parse stdout as a module envelope.
///
/// On failure the error message carries both the parse error and the raw
/// output, so it can be surfaced to the user unchanged.
pub fn parse_output(stdout: &str) -> Result<ModuleOutput, String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err("failed to parse module output: no output on stdout".to_string());
    }
    serde_json::from_str(trimmed)
        .map_err(|e| format!("failed to parse module output: {e}; output: {trimmed}"))
}
