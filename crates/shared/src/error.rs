use serde::Deserialize;
use serde_json::Value;

/// A rejected request as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn code_text(code: Value) -> Option<String> {
    match code {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Reads `{ "message": .. }` or `{ "error": .. }` with an optional `code`.
/// Blank messages count as absent.
pub fn parse_error_body(body: &str) -> Option<ApiError> {
    let raw: ErrorBody = serde_json::from_str(body).ok()?;
    let message = [raw.message, raw.error]
        .into_iter()
        .flatten()
        .map(|message| message.trim().to_string())
        .find(|message| !message.is_empty())?;
    Some(ApiError {
        code: raw.code.and_then(code_text),
        message,
    })
}
