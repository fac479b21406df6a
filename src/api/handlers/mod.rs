//! HTTP handlers.

mod metrics;
mod register;
mod status;
mod task;

pub use metrics::metrics_handler;
pub use register::register_handler;
pub use status::status_handler;
pub use task::task_handler;

use serde_json::Value;

/// Parses a JSON body, treating an empty or unreadable body as having no fields.
fn parse_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        if !body.is_empty() {
            log::debug!("Ignoring malformed request body: {e}");
        }
        Value::Null
    })
}

/// Reads one field as a string, independently of the other fields.
///
/// Falsy values (absent, `null`, `false`, `0`, `""`) count as missing. Any
/// other value is used as the string JavaScript would coerce it to, so
/// `42` and `"42"` name the same client.
fn string_field(body: &Value, key: &str) -> Option<String> {
    let value = body.get(key)?;
    let truthy = match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Bool(true) | Value::Array(_) | Value::Object(_) => true,
    };
    truthy.then(|| coerce_to_string(value))
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(coerce_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}
